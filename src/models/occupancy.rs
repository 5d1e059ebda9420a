/// Occupancy levels reported by vehicle position feeds.
///
/// Feeds routinely omit the field or send codes outside the published range;
/// both collapse to `Unknown`, which is stored as SQL NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyStatus {
    Empty,
    ManySeatsAvailable,
    FewSeatsAvailable,
    StandingRoomOnly,
    CrushedStandingRoomOnly,
    Full,
    NotAcceptingPassengers,
    NoDataAvailable,
    NotBoardable,
    Unknown,
}

impl OccupancyStatus {
    pub fn from_feed(raw: Option<i32>) -> Self {
        match raw {
            Some(0) => Self::Empty,
            Some(1) => Self::ManySeatsAvailable,
            Some(2) => Self::FewSeatsAvailable,
            Some(3) => Self::StandingRoomOnly,
            Some(4) => Self::CrushedStandingRoomOnly,
            Some(5) => Self::Full,
            Some(6) => Self::NotAcceptingPassengers,
            Some(7) => Self::NoDataAvailable,
            Some(8) => Self::NotBoardable,
            _ => Self::Unknown,
        }
    }

    /// Raw GTFS code as stored in `vehicle_positions.occupancy_status`.
    pub fn code(self) -> Option<i16> {
        match self {
            Self::Empty => Some(0),
            Self::ManySeatsAvailable => Some(1),
            Self::FewSeatsAvailable => Some(2),
            Self::StandingRoomOnly => Some(3),
            Self::CrushedStandingRoomOnly => Some(4),
            Self::Full => Some(5),
            Self::NotAcceptingPassengers => Some(6),
            Self::NoDataAvailable => Some(7),
            Self::NotBoardable => Some(8),
            Self::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip() {
        for code in 0..=8i32 {
            let status = OccupancyStatus::from_feed(Some(code));
            assert_eq!(status.code(), Some(code as i16));
        }
    }

    #[test]
    fn absent_is_unknown() {
        assert_eq!(OccupancyStatus::from_feed(None), OccupancyStatus::Unknown);
        assert_eq!(OccupancyStatus::from_feed(None).code(), None);
    }

    #[test]
    fn unrecognized_codes_are_unknown() {
        assert_eq!(OccupancyStatus::from_feed(Some(9)), OccupancyStatus::Unknown);
        assert_eq!(OccupancyStatus::from_feed(Some(-1)), OccupancyStatus::Unknown);
        assert_eq!(OccupancyStatus::from_feed(Some(255)), OccupancyStatus::Unknown);
    }
}
