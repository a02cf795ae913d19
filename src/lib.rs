pub mod alerts;
pub mod client;
pub mod config;
pub mod models;
pub mod monitor;
pub mod tracker;

mod collector;

use crate::alerts::AlertPayload;
use crate::client::discord::DiscordClient;
use crate::client::grafana::GrafanaClient;
use crate::client::influx::InfluxClient;
use crate::client::AlertSink;
use crate::config::AppConfig;
use crate::monitor::Monitor;
use anyhow::Context;
use log::{error, info};
use tokio_util::sync::CancellationToken;

pub async fn run(config: AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    info!("Starting application");

    match build_monitor(&config).await {
        Ok(mut monitor) => {
            monitor.run(cancel).await;
            info!("Application completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Application error: {e:#}");
            // Print chain of error causes
            let mut source = e.source();
            while let Some(e) = source {
                error!("Caused by: {e}");
                source = e.source();
            }
            Err(e).context("Application failed to run")
        }
    }
}

async fn build_monitor(config: &AppConfig) -> anyhow::Result<Monitor> {
    let discord =
        DiscordClient::from_config(&config.discord).context("Failed to create Discord client")?;

    let influx = match InfluxClient::new(&config.influx) {
        Ok(client) => client,
        Err(e) => {
            // Best effort, the failure is reported to the caller either way
            if let Some(discord) = &discord {
                discord
                    .send_alert(&AlertPayload::monitor_error(&e.to_string()))
                    .await;
            }
            return Err(e).context("Failed to create InfluxDB client");
        }
    };

    let mut monitor = Monitor::new(config, Box::new(influx));
    if let Some(discord) = discord {
        monitor = monitor.with_alerts(Box::new(discord));
    }

    match GrafanaClient::from_config(&config.grafana) {
        Ok(Some(grafana)) => monitor = monitor.with_remote_config(Box::new(grafana)),
        Ok(None) => {}
        Err(e) => error!("Grafana client unavailable, using local configuration only: {}", e),
    }

    Ok(monitor)
}
