use std::time::Duration;

use chrono::{NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::{queries, DbPool};
use crate::fetch;
use crate::models::feed::Feed;
use crate::processor::resolver::VehicleResolver;
use crate::processor::trip_updates::ingest_trip_updates;
use crate::processor::vehicle_positions::ingest_vehicle_positions;
use crate::processor::IngestError;

/// Runs the collection loop forever: one tick per interval, every
/// configured feed polled sequentially under one shared wall-clock stamp.
/// A tick that overruns the interval pushes later ticks back instead of
/// stacking a second poll of the same feed on top of a running one.
pub async fn run(config: &AppConfig, pool: DbPool) -> anyhow::Result<()> {
    let client = fetch::build_client(Duration::from_secs(config.http_connect_timeout_secs))?;

    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let now = Utc::now().naive_utc();
        let time_recorded = now.with_nanosecond(0).unwrap_or(now);

        let feeds: Vec<Feed> = match sqlx::query_as(queries::SELECT_FEEDS).fetch_all(&pool).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!(error = %e, "could not load feed registry, skipping tick");
                continue;
            }
        };

        for feed in &feeds {
            info!(feed_id = feed.id, company = %feed.company_name, "polling feed");
            if let Err(e) = poll_feed(&pool, &client, feed, time_recorded).await {
                error!(feed_id = feed.id, error = %e, "feed poll failed");
            }
        }
    }
}

/// Polls one feed: both telemetry types under one transaction and one
/// identity cache. A fetch or decode failure costs only its own pass; a
/// store failure rolls back everything this feed produced for the tick.
pub async fn poll_feed(
    pool: &DbPool,
    client: &Client,
    feed: &Feed,
    time_recorded: NaiveDateTime,
) -> Result<(), IngestError> {
    let tz: Tz = feed
        .timezone
        .parse()
        .map_err(|_| IngestError::UnknownTimezone(feed.timezone.clone()))?;

    let mut tx = pool.begin().await?;
    let mut resolver = VehicleResolver::load(&mut tx, feed.id).await?;

    if let Some(url) = feed.vehicle_position_url.as_deref() {
        match fetch::fetch_feed(client, url).await {
            Ok(message) => {
                ingest_vehicle_positions(&mut tx, &mut resolver, feed.id, tz, &message, time_recorded)
                    .await?;
            }
            Err(e) => warn!(feed_id = feed.id, error = %e, "vehicle position feed unavailable"),
        }
    }

    if let Some(url) = feed.trip_update_url.as_deref() {
        match fetch::fetch_feed(client, url).await {
            Ok(message) => {
                ingest_trip_updates(&mut tx, &mut resolver, feed.id, tz, &message, time_recorded)
                    .await?;
            }
            Err(e) => warn!(feed_id = feed.id, error = %e, "trip update feed unavailable"),
        }
    }

    tx.commit().await?;
    Ok(())
}
