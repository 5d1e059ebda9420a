use std::time::Duration;

use prost::Message;
use reqwest::Client;
use thiserror::Error;

use crate::models::transit_realtime::FeedMessage;

/// Failure to turn a configured URL into a decoded snapshot. Either variant
/// costs only the current telemetry pass; the caller logs it and moves on.
#[derive(Error, Debug)]
pub enum FeedFetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed feed payload: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Shared client for all feed fetches. The connect timeout is bounded so an
/// unreachable host cannot stall a tick; reads stay unbounded and a slow
/// feed is allowed to overrun its tick instead of being cut off mid-body.
pub fn build_client(connect_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().connect_timeout(connect_timeout).build()
}

pub fn decode_feed(bytes: &[u8]) -> Result<FeedMessage, FeedFetchError> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Fetches one snapshot and decodes it. Redirects are followed; any non-2xx
/// status is a transport failure.
pub async fn fetch_feed(client: &Client, url: &str) -> Result<FeedMessage, FeedFetchError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.bytes().await?;
    decode_feed(&body)
}
