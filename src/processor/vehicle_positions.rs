use std::fmt;

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use sqlx::PgConnection;
use tracing::{info, warn};

use crate::db::queries;
use crate::models::occupancy::OccupancyStatus;
use crate::models::transit_realtime::{FeedMessage, VehiclePosition};
use crate::models::vehicle_position::PositionObservation;

use super::resolver::VehicleResolver;
use super::{feed_timestamp, local_service_day, IngestError};

/// Why a vehicle entity was left out of a position batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionSkip {
    MissingVehicleDescriptor,
    MissingPosition,
    MissingVehicleId,
    UnparsableVehicleId(String),
}

impl fmt::Display for PositionSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVehicleDescriptor => write!(f, "vehicle information missing"),
            Self::MissingPosition => write!(f, "position data missing"),
            Self::MissingVehicleId => write!(f, "vehicle id missing"),
            Self::UnparsableVehicleId(raw) => write!(f, "vehicle id {raw:?} is not numeric"),
        }
    }
}

/// Outcome of the validation pass over one snapshot: rows to persist plus
/// one tagged diagnostic per entity that failed validation. Entities that
/// carry no vehicle sub-message are not positions and appear in neither
/// list.
#[derive(Debug, Default)]
pub struct PositionBatch {
    pub observations: Vec<PositionObservation>,
    pub skipped: Vec<(String, PositionSkip)>,
}

pub fn plan_positions(message: &FeedMessage) -> PositionBatch {
    let mut batch = PositionBatch::default();
    for entity in &message.entity {
        let Some(vehicle) = entity.vehicle.as_ref() else {
            continue;
        };
        match validate_position(vehicle) {
            Ok(observation) => batch.observations.push(observation),
            Err(skip) => batch.skipped.push((entity.id.clone(), skip)),
        }
    }
    batch
}

fn validate_position(vehicle: &VehiclePosition) -> Result<PositionObservation, PositionSkip> {
    let descriptor = vehicle
        .vehicle
        .as_ref()
        .ok_or(PositionSkip::MissingVehicleDescriptor)?;
    let position = vehicle.position.as_ref().ok_or(PositionSkip::MissingPosition)?;
    let raw_id = descriptor
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(PositionSkip::MissingVehicleId)?;
    let vehicle_gtfs_id = raw_id
        .parse::<i64>()
        .map_err(|_| PositionSkip::UnparsableVehicleId(raw_id.to_string()))?;

    Ok(PositionObservation {
        vehicle_gtfs_id,
        lat: f64::from(position.latitude),
        lon: f64::from(position.longitude),
        occupancy: OccupancyStatus::from_feed(vehicle.occupancy_status),
    })
}

/// Persists one position snapshot. Every surviving row shares the header
/// timestamp, the poll stamp and the feed-local day; a failed entity costs
/// only itself.
pub async fn ingest_vehicle_positions(
    conn: &mut PgConnection,
    resolver: &mut VehicleResolver,
    feed_id: i64,
    tz: Tz,
    message: &FeedMessage,
    time_recorded: NaiveDateTime,
) -> Result<u64, IngestError> {
    let header_ts = message.header.timestamp() as i64;
    let timestamp = feed_timestamp(header_ts);
    let day = local_service_day(header_ts, tz);

    let batch = plan_positions(message);
    for (entity_id, skip) in &batch.skipped {
        warn!(feed_id, entity = %entity_id, "skipping vehicle entity: {skip}");
    }

    let mut rows = 0u64;
    for observation in &batch.observations {
        let vehicle_id = match resolver.resolve(conn, observation.vehicle_gtfs_id).await {
            Ok(id) => id,
            Err(err @ IngestError::IdentityResolution { .. }) => {
                warn!(feed_id, "skipping vehicle entity: {err}");
                continue;
            }
            Err(other) => return Err(other),
        };
        sqlx::query(queries::INSERT_VEHICLE_POSITION)
            .bind(vehicle_id)
            .bind(observation.lat)
            .bind(observation.lon)
            .bind(observation.occupancy.code())
            .bind(timestamp)
            .bind(time_recorded)
            .bind(day)
            .execute(&mut *conn)
            .await?;
        rows += 1;
    }

    info!(feed_id, rows, "vehicle positions ingested");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transit_realtime::{FeedEntity, FeedHeader, Position, VehicleDescriptor};

    fn position_entity(entity_id: &str, vehicle_id: Option<&str>, with_position: bool) -> FeedEntity {
        FeedEntity {
            id: entity_id.to_string(),
            vehicle: Some(VehiclePosition {
                vehicle: vehicle_id.map(|id| VehicleDescriptor {
                    id: Some(id.to_string()),
                    ..Default::default()
                }),
                position: with_position.then(|| Position {
                    latitude: 40.7,
                    longitude: -74.0,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn message(entities: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: None,
                timestamp: Some(1_700_000_000),
            },
            entity: entities,
        }
    }

    #[test]
    fn one_bad_entity_does_not_poison_the_batch() {
        let batch = plan_positions(&message(vec![
            position_entity("good", Some("42"), true),
            position_entity("no-pos", Some("43"), false),
        ]));
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.observations[0].vehicle_gtfs_id, 42);
        assert_eq!(
            batch.skipped,
            vec![("no-pos".to_string(), PositionSkip::MissingPosition)]
        );
    }

    #[test]
    fn trip_only_entities_are_not_diagnosed() {
        let batch = plan_positions(&message(vec![FeedEntity {
            id: "trip-only".to_string(),
            ..Default::default()
        }]));
        assert!(batch.observations.is_empty());
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn missing_and_unparsable_vehicle_ids_are_diagnosed() {
        let batch = plan_positions(&message(vec![
            position_entity("anonymous", None, true),
            position_entity("nameless", Some(""), true),
            position_entity("lettered", Some("bus-12"), true),
        ]));
        assert!(batch.observations.is_empty());
        assert_eq!(batch.skipped.len(), 3);
        assert_eq!(batch.skipped[0].1, PositionSkip::MissingVehicleId);
        assert_eq!(batch.skipped[1].1, PositionSkip::MissingVehicleId);
        assert_eq!(
            batch.skipped[2].1,
            PositionSkip::UnparsableVehicleId("bus-12".to_string())
        );
    }

    #[test]
    fn occupancy_defaults_to_unknown() {
        let mut entity = position_entity("bus", Some("7"), true);
        if let Some(vehicle) = entity.vehicle.as_mut() {
            vehicle.occupancy_status = Some(99);
        }
        let batch = plan_positions(&message(vec![entity]));
        assert_eq!(batch.observations[0].occupancy, OccupancyStatus::Unknown);
    }
}
