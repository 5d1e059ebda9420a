use sqlx::FromRow;

/// Internal identity for an operator-reported vehicle, unique per
/// (feed, external id). Created lazily on first sighting, never mutated.
#[derive(Debug, Clone, FromRow)]
pub struct Vehicle {
    pub id: i64,
    pub feed_id: i64,
    pub vehicle_gtfs_id: i64,
}
