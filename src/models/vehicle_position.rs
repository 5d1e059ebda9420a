use super::occupancy::OccupancyStatus;

/// A decoded, validated vehicle entity from one position snapshot, waiting
/// on identity resolution before it becomes a `vehicle_positions` row. The
/// observation timestamp and service day are message-level, not per-entity,
/// so they are not carried here.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionObservation {
    pub vehicle_gtfs_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub occupancy: OccupancyStatus,
}
