use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use thiserror::Error;

pub mod resolver;
pub mod trip_updates;
pub mod vehicle_positions;

/// Errors raised while turning a decoded snapshot into rows. An identity
/// failure costs one entity; everything else costs the feed's whole poll.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("unknown feed timezone {0:?}")]
    UnknownTimezone(String),
    #[error("could not resolve vehicle {vehicle_gtfs_id} in feed {feed_id}")]
    IdentityResolution { feed_id: i64, vehicle_gtfs_id: i64 },
    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

/// Header timestamp as the naive UTC datetime stored on every row of the
/// snapshot.
pub fn feed_timestamp(epoch_secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(epoch_secs, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .naive_utc()
}

/// Calendar day of `epoch_secs` in the feed's own timezone. Vehicles carry
/// no timezone of their own; the feed's registry entry decides which date a
/// record belongs to.
pub fn local_service_day(epoch_secs: i64, tz: Tz) -> NaiveDate {
    DateTime::from_timestamp(epoch_secs, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .with_timezone(&tz)
        .date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::America::New_York;
    use chrono_tz::Tz;

    #[test]
    fn service_day_shifts_behind_utc_overnight() {
        // 2024-01-15 03:00 UTC is still 2024-01-14 22:00 in New York.
        let epoch = 1_705_287_600;
        assert_eq!(
            local_service_day(epoch, New_York),
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap()
        );
    }

    #[test]
    fn service_day_matches_utc_in_the_evening() {
        // 2024-06-01 23:50 UTC is 19:50 the same day in New York.
        let epoch = 1_717_285_800;
        assert_eq!(
            local_service_day(epoch, New_York),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn utc_feed_day_is_the_utc_date() {
        let epoch = 1_705_287_600;
        let utc: Tz = "UTC".parse().unwrap();
        assert_eq!(
            local_service_day(epoch, utc),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn feed_timestamp_is_naive_utc() {
        let ts = feed_timestamp(1_705_287_600);
        assert_eq!(ts.to_string(), "2024-01-15 03:00:00");
    }
}
