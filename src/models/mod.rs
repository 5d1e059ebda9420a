pub mod feed;
pub mod occupancy;
pub mod trip_record;
pub mod vehicle;
pub mod vehicle_position;

pub mod transit_realtime {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
