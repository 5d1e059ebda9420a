use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::debug;

use crate::db::queries;
use crate::models::vehicle::Vehicle;

use super::IngestError;

/// Poll-scoped map from operator-assigned vehicle ids to internal keys.
///
/// Loaded once per poll and thrown away with it. Vehicles first sighted
/// between ticks are picked up by the next poll's load; reusing a resolver
/// across polls would serve stale misses.
pub struct VehicleResolver {
    feed_id: i64,
    cache: HashMap<i64, i64>,
}

impl VehicleResolver {
    pub async fn load(conn: &mut PgConnection, feed_id: i64) -> Result<Self, IngestError> {
        let vehicles: Vec<Vehicle> = sqlx::query_as(queries::SELECT_FEED_VEHICLES)
            .bind(feed_id)
            .fetch_all(&mut *conn)
            .await?;
        let cache = vehicles
            .into_iter()
            .map(|v| (v.vehicle_gtfs_id, v.id))
            .collect();
        Ok(Self { feed_id, cache })
    }

    /// Maps an external vehicle id to the internal key, creating the vehicle
    /// row on first sighting. A concurrent insert of the same pair is not an
    /// error: the insert backs off on conflict and the winning row is read
    /// back instead of being trusted.
    pub async fn resolve(
        &mut self,
        conn: &mut PgConnection,
        vehicle_gtfs_id: i64,
    ) -> Result<i64, IngestError> {
        if let Some(id) = self.cache.get(&vehicle_gtfs_id) {
            return Ok(*id);
        }

        let inserted: Option<i64> = sqlx::query_scalar(queries::INSERT_VEHICLE)
            .bind(self.feed_id)
            .bind(vehicle_gtfs_id)
            .fetch_optional(&mut *conn)
            .await?;

        let id = match inserted {
            Some(id) => {
                debug!(
                    feed_id = self.feed_id,
                    vehicle_gtfs_id, "new vehicle registered"
                );
                id
            }
            None => sqlx::query_scalar(queries::SELECT_VEHICLE_ID)
                .bind(self.feed_id)
                .bind(vehicle_gtfs_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(IngestError::IdentityResolution {
                    feed_id: self.feed_id,
                    vehicle_gtfs_id,
                })?,
        };

        self.cache.insert(vehicle_gtfs_id, id);
        Ok(id)
    }
}
