use chrono::{NaiveDate, NaiveDateTime};

/// Insert-side trip progress row. `vehicle_id` is NULL both for canceled
/// trips and for records whose stop data was unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTripRecord {
    pub vehicle_id: Option<i64>,
    pub trip_id: String,
    pub timestamp: NaiveDateTime,
    pub time_recorded: NaiveDateTime,
    pub day: NaiveDate,
}

/// Signed seconds between the snapshot moment and a stop arrival; positive
/// means the stop is still ahead, zero or negative that it was passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStopDistance {
    pub stop_id: String,
    pub time_till_arrive: i64,
}
