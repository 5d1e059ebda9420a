use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use sqlx::PgConnection;
use tracing::{debug, info, warn};

use crate::db::queries;
use crate::models::transit_realtime::{trip_descriptor, trip_update, FeedMessage, TripUpdate};
use crate::models::trip_record::{NewStopDistance, NewTripRecord};

use super::resolver::VehicleResolver;
use super::{feed_timestamp, local_service_day, IngestError};

/// Next/previous stop bracket extracted from one trip update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopWindow {
    pub next: Option<NewStopDistance>,
    pub prev: Option<NewStopDistance>,
}

impl StopWindow {
    pub fn is_empty(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }

    /// Distance standing in for the whole candidate during selection: the
    /// upcoming stop when there is one, the just-passed stop otherwise.
    pub fn representative(&self) -> Option<i64> {
        self.next
            .as_ref()
            .or(self.prev.as_ref())
            .map(|stop| stop.time_till_arrive)
    }
}

/// One active, attributed trip update competing to represent its vehicle
/// for this poll.
#[derive(Debug, Clone, PartialEq)]
pub struct TripCandidate {
    pub trip_id: String,
    pub stops: StopWindow,
}

/// An active entity whose stop data was unusable: still recorded, but with
/// the vehicle attribution dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedTrip {
    pub vehicle_gtfs_id: i64,
    pub trip_id: String,
}

/// Why a trip-update entity was dropped with a diagnostic. Active entities
/// without any vehicle id are dropped silently and never listed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripSkip {
    MissingTripDescriptor,
    UnparsableVehicleId(String),
}

impl fmt::Display for TripSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTripDescriptor => write!(f, "no trip information found"),
            Self::UnparsableVehicleId(raw) => write!(f, "vehicle id {raw:?} is not numeric"),
        }
    }
}

/// Everything one snapshot contributes, reduced to at most one canonical
/// candidate per vehicle.
#[derive(Debug, Default)]
pub struct TripUpdatePlan {
    /// Trip ids needing a fresh canceled record, in feed order, deduped
    /// against history and within the snapshot.
    pub canceled: Vec<String>,
    pub orphans: Vec<OrphanedTrip>,
    /// Winning candidate per vehicle, keyed by external vehicle id.
    pub canonical: Vec<(i64, TripCandidate)>,
    pub skipped: Vec<(String, TripSkip)>,
}

/// Total order on signed seconds-to-stop, smallest-first meaning "closest
/// to the present". An upcoming stop always outranks a passed one; among
/// upcoming stops the soonest wins; among passed stops the most recent
/// wins.
pub fn cmp_time_to_stop(a: i64, b: i64) -> Ordering {
    match (a > 0, b > 0) {
        (true, true) => a.cmp(&b),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => b.cmp(&a),
    }
}

/// Brackets the snapshot moment with the closest scheduled stops of one
/// trip update: the smallest strictly-positive arrival delta becomes the
/// next stop, the largest non-positive one the previous stop. Skipped and
/// no-data stops never count, nor do stops without an arrival time.
pub fn scan_stop_times(update: &TripUpdate, header_ts: i64) -> StopWindow {
    let mut window = StopWindow::default();
    let mut next_best = i64::MAX;
    let mut prev_best = i64::MIN;

    for stop in &update.stop_time_update {
        if stop.schedule_relationship()
            != trip_update::stop_time_update::ScheduleRelationship::Scheduled
        {
            continue;
        }
        let Some(arrival) = stop.arrival.as_ref().and_then(|event| event.time) else {
            continue;
        };
        let time_diff = arrival - header_ts;
        if time_diff > 0 && time_diff < next_best {
            next_best = time_diff;
            window.next = Some(NewStopDistance {
                stop_id: stop.stop_id().to_string(),
                time_till_arrive: time_diff,
            });
        } else if time_diff <= 0 && time_diff > prev_best {
            prev_best = time_diff;
            window.prev = Some(NewStopDistance {
                stop_id: stop.stop_id().to_string(),
                time_till_arrive: time_diff,
            });
        }
    }

    window
}

/// Picks the candidate whose representative distance is closest to the
/// present. Earlier candidates win ties, preserving feed order.
pub fn select_canonical(candidates: Vec<TripCandidate>) -> Option<TripCandidate> {
    let mut best: Option<(i64, TripCandidate)> = None;
    for candidate in candidates {
        let Some(distance) = candidate.stops.representative() else {
            continue;
        };
        match &best {
            Some((incumbent, _)) if cmp_time_to_stop(distance, *incumbent) != Ordering::Less => {}
            _ => best = Some((distance, candidate)),
        }
    }
    best.map(|(_, candidate)| candidate)
}

/// Folds a snapshot into cancellations, orphans, diagnostics and one
/// canonical candidate per vehicle. `already_canceled` holds the trip ids
/// that already have a NULL-vehicle record for this service day.
pub fn plan_trip_updates(
    message: &FeedMessage,
    already_canceled: &HashSet<String>,
) -> TripUpdatePlan {
    let header_ts = message.header.timestamp() as i64;
    let mut plan = TripUpdatePlan::default();
    // Trip ids gaining a NULL-vehicle row within this snapshot; later
    // cancellations of the same trip must see them.
    let mut pending_null: HashSet<String> = HashSet::new();
    let mut candidates: BTreeMap<i64, Vec<TripCandidate>> = BTreeMap::new();

    for entity in &message.entity {
        let Some(update) = entity.trip_update.as_ref() else {
            continue;
        };
        let Some(trip) = update.trip.as_ref() else {
            plan.skipped
                .push((entity.id.clone(), TripSkip::MissingTripDescriptor));
            continue;
        };
        let trip_id = trip.trip_id().to_string();

        let canceled = trip.schedule_relationship.is_some()
            && trip.schedule_relationship() == trip_descriptor::ScheduleRelationship::Canceled;
        if canceled {
            if already_canceled.contains(&trip_id) || pending_null.contains(&trip_id) {
                continue;
            }
            pending_null.insert(trip_id.clone());
            plan.canceled.push(trip_id);
            continue;
        }

        // Active but unattributable: deliberately dropped, not an error.
        let Some(raw_id) = update
            .vehicle
            .as_ref()
            .and_then(|v| v.id.as_deref())
            .filter(|id| !id.is_empty())
        else {
            debug!(entity = %entity.id, "active trip update without vehicle id, dropped");
            continue;
        };
        let Ok(vehicle_gtfs_id) = raw_id.parse::<i64>() else {
            plan.skipped.push((
                entity.id.clone(),
                TripSkip::UnparsableVehicleId(raw_id.to_string()),
            ));
            continue;
        };

        let stops = scan_stop_times(update, header_ts);
        if stops.is_empty() {
            pending_null.insert(trip_id.clone());
            plan.orphans.push(OrphanedTrip {
                vehicle_gtfs_id,
                trip_id,
            });
            continue;
        }

        candidates
            .entry(vehicle_gtfs_id)
            .or_default()
            .push(TripCandidate { trip_id, stops });
    }

    for (vehicle_gtfs_id, list) in candidates {
        if let Some(winner) = select_canonical(list) {
            plan.canonical.push((vehicle_gtfs_id, winner));
        }
    }

    plan
}

/// Row counts for one reconciliation pass, for the per-feed summary log.
#[derive(Debug, Default)]
pub struct TripIngestStats {
    pub canceled: u64,
    pub orphaned: u64,
    pub canonical: u64,
    pub stop_rows: u64,
}

/// Persists one trip-update snapshot: canceled and orphan records with a
/// NULL vehicle and no stops, then the canonical record per vehicle plus
/// its stop distances. Runs inside the feed poll's transaction.
pub async fn ingest_trip_updates(
    conn: &mut PgConnection,
    resolver: &mut VehicleResolver,
    feed_id: i64,
    tz: Tz,
    message: &FeedMessage,
    time_recorded: NaiveDateTime,
) -> Result<TripIngestStats, IngestError> {
    let header_ts = message.header.timestamp() as i64;
    let timestamp = feed_timestamp(header_ts);
    let day = local_service_day(header_ts, tz);

    let already_canceled: HashSet<String> =
        sqlx::query_scalar::<_, String>(queries::SELECT_CANCELED_TRIP_IDS)
            .bind(day)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let plan = plan_trip_updates(message, &already_canceled);
    let mut stats = TripIngestStats::default();

    for (entity_id, skip) in &plan.skipped {
        warn!(feed_id, entity = %entity_id, "skipping trip update: {skip}");
    }

    for trip_id in &plan.canceled {
        let record = NewTripRecord {
            vehicle_id: None,
            trip_id: trip_id.clone(),
            timestamp,
            time_recorded,
            day,
        };
        insert_trip_record(conn, &record).await?;
        stats.canceled += 1;
    }

    for orphan in &plan.orphans {
        // The vehicle was sighted even though the record cannot be
        // attributed to it; make sure it exists.
        match resolver.resolve(conn, orphan.vehicle_gtfs_id).await {
            Ok(_) => {}
            Err(err @ IngestError::IdentityResolution { .. }) => {
                warn!(feed_id, "skipping trip update: {err}");
                continue;
            }
            Err(other) => return Err(other),
        }
        let record = NewTripRecord {
            vehicle_id: None,
            trip_id: orphan.trip_id.clone(),
            timestamp,
            time_recorded,
            day,
        };
        insert_trip_record(conn, &record).await?;
        stats.orphaned += 1;
    }

    for (vehicle_gtfs_id, candidate) in &plan.canonical {
        let vehicle_id = match resolver.resolve(conn, *vehicle_gtfs_id).await {
            Ok(id) => id,
            Err(err @ IngestError::IdentityResolution { .. }) => {
                warn!(feed_id, "skipping trip update: {err}");
                continue;
            }
            Err(other) => return Err(other),
        };
        let record = NewTripRecord {
            vehicle_id: Some(vehicle_id),
            trip_id: candidate.trip_id.clone(),
            timestamp,
            time_recorded,
            day,
        };
        let record_id = insert_trip_record(conn, &record).await?;
        for stop in candidate.stops.next.iter().chain(candidate.stops.prev.iter()) {
            sqlx::query(queries::INSERT_STOP_DISTANCE)
                .bind(record_id)
                .bind(&stop.stop_id)
                .bind(stop.time_till_arrive)
                .execute(&mut *conn)
                .await?;
            stats.stop_rows += 1;
        }
        stats.canonical += 1;
    }

    info!(
        feed_id,
        canceled = stats.canceled,
        orphaned = stats.orphaned,
        canonical = stats.canonical,
        stop_rows = stats.stop_rows,
        "trip updates reconciled"
    );
    Ok(stats)
}

async fn insert_trip_record(
    conn: &mut PgConnection,
    record: &NewTripRecord,
) -> Result<i64, IngestError> {
    let id = sqlx::query_scalar(queries::INSERT_TRIP_RECORD)
        .bind(record.vehicle_id)
        .bind(&record.trip_id)
        .bind(record.timestamp)
        .bind(record.time_recorded)
        .bind(record.day)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(stop_id: &str, time_till_arrive: i64) -> NewStopDistance {
        NewStopDistance {
            stop_id: stop_id.to_string(),
            time_till_arrive,
        }
    }

    fn candidate(trip_id: &str, next: Option<i64>, prev: Option<i64>) -> TripCandidate {
        TripCandidate {
            trip_id: trip_id.to_string(),
            stops: StopWindow {
                next: next.map(|d| stop("n", d)),
                prev: prev.map(|d| stop("p", d)),
            },
        }
    }

    #[test]
    fn smallest_positive_wins() {
        assert_eq!(cmp_time_to_stop(30, 120), Ordering::Less);
        assert_eq!(cmp_time_to_stop(120, 30), Ordering::Greater);
    }

    #[test]
    fn positive_beats_non_positive() {
        assert_eq!(cmp_time_to_stop(120, -15), Ordering::Less);
        assert_eq!(cmp_time_to_stop(-15, 120), Ordering::Greater);
        assert_eq!(cmp_time_to_stop(1, 0), Ordering::Less);
    }

    #[test]
    fn most_recent_passed_wins_when_nothing_upcoming() {
        assert_eq!(cmp_time_to_stop(-5, -15), Ordering::Less);
        assert_eq!(cmp_time_to_stop(-15, -5), Ordering::Greater);
        assert_eq!(cmp_time_to_stop(0, -1), Ordering::Less);
    }

    #[test]
    fn equal_distances_are_equal() {
        assert_eq!(cmp_time_to_stop(30, 30), Ordering::Equal);
        assert_eq!(cmp_time_to_stop(-5, -5), Ordering::Equal);
    }

    #[test]
    fn selection_prefers_smallest_upcoming() {
        let winner = select_canonical(vec![
            candidate("a", Some(120), None),
            candidate("b", Some(30), None),
            candidate("c", None, Some(-15)),
        ])
        .unwrap();
        assert_eq!(winner.trip_id, "b");
    }

    #[test]
    fn selection_falls_back_to_most_recently_passed() {
        let winner = select_canonical(vec![
            candidate("a", None, Some(-15)),
            candidate("b", None, Some(-5)),
        ])
        .unwrap();
        assert_eq!(winner.trip_id, "b");
    }

    #[test]
    fn selection_keeps_the_first_on_ties() {
        let winner = select_canonical(vec![
            candidate("a", Some(30), None),
            candidate("b", Some(30), None),
        ])
        .unwrap();
        assert_eq!(winner.trip_id, "a");
    }

    #[test]
    fn next_stop_represents_the_candidate_even_with_a_prev() {
        // +90 with a passed stop still loses to +30.
        let winner = select_canonical(vec![
            candidate("a", Some(90), Some(-50)),
            candidate("b", Some(30), None),
        ])
        .unwrap();
        assert_eq!(winner.trip_id, "b");
    }

    #[test]
    fn scan_brackets_the_present() {
        let update = TripUpdate {
            stop_time_update: vec![
                stop_time_update("s1", Some(1_000 - 200), None),
                stop_time_update("s2", Some(1_000 - 50), None),
                stop_time_update("s3", Some(1_000 + 300), None),
                stop_time_update("s4", Some(1_000 + 60), None),
            ],
            ..Default::default()
        };
        let window = scan_stop_times(&update, 1_000);
        assert_eq!(window.next, Some(stop("s4", 60)));
        assert_eq!(window.prev, Some(stop("s2", -50)));
    }

    #[test]
    fn scan_ignores_skipped_and_no_data_stops() {
        let update = TripUpdate {
            stop_time_update: vec![
                stop_time_update(
                    "skipped",
                    Some(1_030),
                    Some(trip_update::stop_time_update::ScheduleRelationship::Skipped),
                ),
                stop_time_update(
                    "no-data",
                    Some(1_040),
                    Some(trip_update::stop_time_update::ScheduleRelationship::NoData),
                ),
                stop_time_update("kept", Some(1_090), None),
            ],
            ..Default::default()
        };
        let window = scan_stop_times(&update, 1_000);
        assert_eq!(window.next, Some(stop("kept", 90)));
        assert_eq!(window.prev, None);
    }

    #[test]
    fn scan_ignores_stops_without_arrival_times() {
        let update = TripUpdate {
            stop_time_update: vec![
                stop_time_update("silent", None, None),
                stop_time_update("timed", Some(1_120), None),
            ],
            ..Default::default()
        };
        let window = scan_stop_times(&update, 1_000);
        assert_eq!(window.next, Some(stop("timed", 120)));
        assert_eq!(window.prev, None);
    }

    #[test]
    fn scan_of_no_usable_stops_is_empty() {
        let window = scan_stop_times(&TripUpdate::default(), 1_000);
        assert!(window.is_empty());
        assert_eq!(window.representative(), None);
    }

    fn stop_time_update(
        stop_id: &str,
        arrival: Option<i64>,
        relationship: Option<trip_update::stop_time_update::ScheduleRelationship>,
    ) -> trip_update::StopTimeUpdate {
        trip_update::StopTimeUpdate {
            stop_id: Some(stop_id.to_string()),
            arrival: arrival.map(|time| trip_update::StopTimeEvent {
                time: Some(time),
                ..Default::default()
            }),
            schedule_relationship: relationship.map(|r| r as i32),
            ..Default::default()
        }
    }
}
