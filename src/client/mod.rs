//! Upstream services the monitor talks to.
//!
//! The traits are the boundary between the monitor and the network: every
//! implementation handles its own failures and hands back an empty or
//! negative result instead of an error.

use async_trait::async_trait;
use thiserror::Error;

use crate::alerts::AlertPayload;
use crate::config::remote::RemoteVariables;
use crate::models::Reading;

pub mod discord;
pub mod grafana;
pub mod influx;

pub use discord::DiscordClient;
pub use grafana::GrafanaClient;
pub use influx::InfluxClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Missing setting: {0}")]
    MissingSetting(String),
}

/// Time-series store holding the sensor readings.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Readings of `sensor_id` from the last `minutes`, oldest first.
    async fn query_recent_readings(&self, sensor_id: &str, minutes: u64) -> Vec<Reading>;

    /// Whether anything was written in the last `seconds`.
    async fn check_recent_activity(&self, seconds: u64) -> bool;
}

/// Destination for alert messages.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, alert: &AlertPayload) -> bool;
}

/// Source of runtime configuration overrides.
#[async_trait]
pub trait RemoteConfigSource: Send + Sync {
    async fn fetch_variables(&mut self) -> RemoteVariables;
}

/// Shared HTTP client settings.
pub(crate) fn http_client() -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
