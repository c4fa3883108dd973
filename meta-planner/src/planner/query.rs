//! A validated trip request and the per-leg backend queries derived from it.

use crate::backend::{
    Algorithm, ItineraryRequest, QueryOption, SelfDriveCondition, TimeConstraint, TripPart,
};
use crate::domain::{Location, Mode};

/// Everything the planner needs from one client request.
#[derive(Debug, Clone, PartialEq)]
pub struct TripQuery {
    pub origin: Location,
    pub destination: Location,
    /// Depart-at or arrive-by bound for the whole trip.
    pub time: TimeConstraint,
    pub algorithm: Algorithm,
    pub modes: Vec<Mode>,
    pub self_drive_conditions: Vec<SelfDriveCondition>,
    pub accessibility_constraint: bool,
    pub language: String,
}

impl TripQuery {
    /// Build the backend request for leg `index` of a chain of `leg_count`
    /// legs.
    ///
    /// Departure-side self-drive conditions only reach the first leg and
    /// arrival-side ones only the last.
    pub fn leg_request(
        &self,
        index: usize,
        leg_count: usize,
        departures: Vec<Location>,
        arrivals: Vec<Location>,
        time: TimeConstraint,
        options: Vec<QueryOption>,
    ) -> ItineraryRequest {
        let first = index == 0;
        let last = index + 1 == leg_count;
        let self_drive_conditions = self
            .self_drive_conditions
            .iter()
            .filter(|c| match c.trip_part {
                TripPart::Departure => first,
                TripPart::Arrival => last,
            })
            .copied()
            .collect();

        ItineraryRequest {
            departures,
            arrivals,
            time,
            algorithm: self.algorithm,
            modes: self.modes.clone(),
            self_drive_conditions,
            accessibility_constraint: self.accessibility_constraint,
            language: self.language.clone(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::stop;
    use crate::domain::SelfDriveMode;
    use chrono::NaiveDate;

    fn query() -> TripQuery {
        TripQuery {
            origin: stop("O"),
            destination: stop("D"),
            time: TimeConstraint::DepartureTime(
                NaiveDate::from_ymd_opt(2024, 3, 15)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            ),
            algorithm: Algorithm::Fastest,
            modes: vec![Mode::Bus],
            self_drive_conditions: vec![
                SelfDriveCondition {
                    trip_part: TripPart::Departure,
                    self_drive_mode: SelfDriveMode::Bike,
                },
                SelfDriveCondition {
                    trip_part: TripPart::Arrival,
                    self_drive_mode: SelfDriveMode::Walk,
                },
            ],
            accessibility_constraint: true,
            language: "fr".into(),
        }
    }

    fn parts(request: &ItineraryRequest) -> Vec<TripPart> {
        request
            .self_drive_conditions
            .iter()
            .map(|c| c.trip_part)
            .collect()
    }

    #[test]
    fn self_drive_conditions_follow_trip_ends() {
        let q = query();
        let req = |i, n| q.leg_request(i, n, vec![], vec![], q.time, vec![]);

        assert_eq!(parts(&req(0, 1)), vec![TripPart::Departure, TripPart::Arrival]);
        assert_eq!(parts(&req(0, 3)), vec![TripPart::Departure]);
        assert!(parts(&req(1, 3)).is_empty());
        assert_eq!(parts(&req(2, 3)), vec![TripPart::Arrival]);
    }

    #[test]
    fn request_fields_are_carried() {
        let q = query();
        let req = q.leg_request(
            1,
            2,
            vec![stop("A")],
            vec![stop("D")],
            q.time,
            vec![QueryOption::DepartureArrivalOptimized],
        );

        assert_eq!(req.algorithm, Algorithm::Fastest);
        assert_eq!(req.modes, vec![Mode::Bus]);
        assert!(req.accessibility_constraint);
        assert_eq!(req.language, "fr");
        assert!(req.is_jointly_optimized());
    }
}
