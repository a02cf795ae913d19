//! Poll loop tying the clients to the trackers.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::alerts::AlertPayload;
use crate::client::{AlertSink, ReadingSource, RemoteConfigSource};
use crate::collector;
use crate::config::remote::apply_remote_variables;
use crate::config::{AppConfig, GeneralConfig, TemperatureConfig};
use crate::models::{SensorState, TemperatureState};
use crate::tracker::{SensorStateTracker, TemperatureTracker};

pub struct Monitor {
    general: GeneralConfig,
    temperature: TemperatureConfig,
    remote_refresh_interval: u64,
    source: Box<dyn ReadingSource>,
    alerts: Option<Box<dyn AlertSink>>,
    remote: Option<Box<dyn RemoteConfigSource>>,
    sensor: SensorStateTracker,
    temperature_tracker: TemperatureTracker,
    source_online: bool,
    last_online_check: Option<DateTime<Utc>>,
    last_remote_refresh: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn new(config: &AppConfig, source: Box<dyn ReadingSource>) -> Self {
        Self {
            general: config.general.clone(),
            temperature: config.temperature.clone(),
            remote_refresh_interval: config.grafana.refresh_interval,
            source,
            alerts: None,
            remote: None,
            sensor: SensorStateTracker::new(),
            temperature_tracker: TemperatureTracker::new(),
            source_online: false,
            last_online_check: None,
            last_remote_refresh: None,
        }
    }

    pub fn with_alerts(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.alerts = Some(sink);
        self
    }

    pub fn with_remote_config(mut self, remote: Box<dyn RemoteConfigSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Run cycles until `cancel` fires. The wait between cycles ends as soon
    /// as cancellation is requested.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            "Starting monitor: checking every {} s",
            self.general.check_interval
        );

        loop {
            self.run_cycle(Utc::now()).await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Monitor task cancelled");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.general.check_interval)) => {}
            }
        }
    }

    pub async fn run_cycle(&mut self, now: DateTime<Utc>) {
        let refresh_due = self.last_remote_refresh.map_or(true, |last| {
            (now - last).num_seconds() > seconds(self.remote_refresh_interval)
        });
        if self.remote.is_some() && refresh_due {
            self.refresh_config().await;
            self.last_remote_refresh = Some(now);
        }

        if self.check_source_online(now).await {
            self.process_readings(now).await;
        } else {
            debug!("{} offline, skipping readings", self.general.source_name);
        }
    }

    /// Apply the remote variables to a fresh copy of the configuration.
    /// Returns true when any setting changed.
    pub async fn refresh_config(&mut self) -> bool {
        let Some(remote) = self.remote.as_mut() else {
            return false;
        };

        let variables = remote.fetch_variables().await;
        let result = apply_remote_variables(&self.temperature, &self.general, &variables);
        if !result.is_changed() {
            return false;
        }

        info!("Updated configuration from Grafana: {}", result.changed.join(", "));
        self.temperature = result.temperature;
        self.general = result.general;
        true
    }

    /// Liveness of the data source, queried at most once per
    /// `online_check_interval`. Alerts only when liveness flips.
    pub async fn check_source_online(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_online_check {
            if (now - last).num_seconds() < seconds(self.general.online_check_interval) {
                return self.source_online;
            }
        }
        self.last_online_check = Some(now);

        let online = self
            .source
            .check_recent_activity(self.general.offline_threshold)
            .await;

        if online != self.source_online {
            info!(
                "{} is now {}",
                self.general.source_name,
                if online { "online" } else { "offline" }
            );
            self.source_online = online;
            self.alert(&AlertPayload::source_online(&self.general.source_name, online))
                .await;
        }

        self.source_online
    }

    pub async fn process_readings(&mut self, now: DateTime<Utc>) {
        let windows = collector::collect_windows(self.source.as_ref(), &self.general).await;
        if windows.primary.is_empty() {
            warn!("No {} temperature data found", self.general.primary_sensor);
        }

        let next = self
            .sensor
            .determine_state(&windows.primary, &windows.reference, &self.temperature, now);

        if self.sensor.update_state(next) {
            if let Some(alert) = AlertPayload::sensor_state(next) {
                self.alert(&alert).await;
            }
        }

        if next != SensorState::Connected || self.sensor.is_stabilizing() {
            return;
        }

        let Some(latest) = windows.latest_primary() else {
            return;
        };
        if self.temperature_tracker.update(latest.value, &self.temperature) {
            if let Some(alert) = self
                .temperature_tracker
                .alert_payload(latest.value, &self.temperature)
            {
                self.alert(&alert).await;
            }
        }
    }

    async fn alert(&self, alert: &AlertPayload) {
        match &self.alerts {
            Some(sink) => {
                sink.send_alert(alert).await;
            }
            None => debug!("No alert sink configured, dropping '{}'", alert.title),
        }
    }

    pub fn sensor_state(&self) -> SensorState {
        self.sensor.state()
    }

    pub fn is_stabilizing(&self) -> bool {
        self.sensor.is_stabilizing()
    }

    pub fn temperature_state(&self) -> Option<TemperatureState> {
        self.temperature_tracker.current_state()
    }

    pub fn temperature_config(&self) -> &TemperatureConfig {
        &self.temperature
    }

    pub fn general_config(&self) -> &GeneralConfig {
        &self.general
    }

    pub fn is_source_online(&self) -> bool {
        self.source_online
    }
}

fn seconds(interval: u64) -> i64 {
    i64::try_from(interval).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::remote::RemoteVariables;
    use crate::models::Reading;
    use async_trait::async_trait;
    use chrono::{Duration as TimeDelta, TimeZone};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeSource {
        windows: Arc<Mutex<HashMap<String, Vec<Reading>>>>,
        online: Arc<Mutex<bool>>,
        activity_checks: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn set_online(&self, online: bool) {
            *self.online.lock().unwrap() = online;
        }

        /// Readings one per `step` minutes, the last one at `end`.
        fn set_window(&self, sensor: &str, end: DateTime<Utc>, step: i64, values: &[f64]) {
            let n = values.len() as i64;
            let readings = values
                .iter()
                .enumerate()
                .map(|(i, v)| Reading::new(sensor, end - TimeDelta::minutes(step * (n - 1 - i as i64)), *v))
                .collect();
            self.windows.lock().unwrap().insert(sensor.to_string(), readings);
        }
    }

    #[async_trait]
    impl ReadingSource for FakeSource {
        async fn query_recent_readings(&self, sensor_id: &str, _minutes: u64) -> Vec<Reading> {
            self.windows
                .lock()
                .unwrap()
                .get(sensor_id)
                .cloned()
                .unwrap_or_default()
        }

        async fn check_recent_activity(&self, _seconds: u64) -> bool {
            self.activity_checks.fetch_add(1, Ordering::SeqCst);
            *self.online.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<AlertPayload>>>,
    }

    impl RecordingSink {
        fn titles(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|a| a.title.clone()).collect()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send_alert(&self, alert: &AlertPayload) -> bool {
            self.sent.lock().unwrap().push(alert.clone());
            true
        }
    }

    struct FakeRemote {
        variables: RemoteVariables,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RemoteConfigSource for FakeRemote {
        async fn fetch_variables(&mut self) -> RemoteVariables {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.variables.clone()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap()
    }

    fn monitor(source: &FakeSource, sink: &RecordingSink) -> Monitor {
        Monitor::new(&AppConfig::default(), Box::new(source.clone())).with_alerts(Box::new(sink.clone()))
    }

    #[tokio::test]
    async fn test_offline_source_skips_readings() {
        let source = FakeSource::default();
        source.set_window("DS18B20", t0(), 1, &[98.6]);
        let sink = RecordingSink::default();
        let mut monitor = monitor(&source, &sink);

        monitor.run_cycle(t0()).await;

        assert!(!monitor.is_source_online());
        assert_eq!(monitor.sensor_state(), SensorState::Unknown);
        assert!(sink.titles().is_empty());
    }

    #[tokio::test]
    async fn test_first_online_cycle() {
        let source = FakeSource::default();
        source.set_online(true);
        source.set_window("DS18B20", t0(), 1, &[98.6]);
        let sink = RecordingSink::default();
        let mut monitor = monitor(&source, &sink);

        monitor.run_cycle(t0()).await;

        assert_eq!(sink.titles(), vec!["Raspberry Pi is ONLINE", "Sensor CONNECTED"]);
        assert_eq!(monitor.sensor_state(), SensorState::Connected);
        // first classification is recorded silently
        assert_eq!(monitor.temperature_state(), Some(TemperatureState::Warm));
    }

    #[tokio::test]
    async fn test_liveness_alert_uses_source_name() {
        let source = FakeSource::default();
        source.set_online(true);
        let sink = RecordingSink::default();
        let mut config = AppConfig::default();
        config.general.source_name = "Bedside hub".to_string();
        let mut monitor =
            Monitor::new(&config, Box::new(source.clone())).with_alerts(Box::new(sink.clone()));

        monitor.check_source_online(t0()).await;

        assert_eq!(sink.titles(), vec!["Bedside hub is ONLINE"]);
    }

    #[tokio::test]
    async fn test_liveness_checked_at_most_every_three_minutes() {
        let source = FakeSource::default();
        source.set_online(true);
        let sink = RecordingSink::default();
        let mut monitor = monitor(&source, &sink);

        monitor.run_cycle(t0()).await;
        source.set_online(false);
        monitor.run_cycle(t0() + TimeDelta::minutes(1)).await;
        monitor.run_cycle(t0() + TimeDelta::minutes(2)).await;

        assert_eq!(source.activity_checks.load(Ordering::SeqCst), 1);
        assert!(monitor.is_source_online());

        monitor.run_cycle(t0() + TimeDelta::minutes(3)).await;

        assert_eq!(source.activity_checks.load(Ordering::SeqCst), 2);
        assert!(!monitor.is_source_online());
        assert_eq!(
            sink.titles(),
            vec!["Raspberry Pi is ONLINE", "Sensor DISCONNECTED", "Raspberry Pi is OFFLINE"]
        );
    }

    #[tokio::test]
    async fn test_attach_stabilize_then_classify() {
        let source = FakeSource::default();
        source.set_online(true);
        let sink = RecordingSink::default();
        let mut monitor = monitor(&source, &sink);

        // Sensor lying on the desk next to the room sensor
        let now = t0();
        source.set_window("SI7021", now, 1, &[70.0]);
        source.set_window("DS18B20", now, 5, &[72.0, 73.0]);
        monitor.run_cycle(now).await;
        assert_eq!(monitor.sensor_state(), SensorState::Disconnected);

        // Attached: rising 1.4°F/min
        let now = t0() + TimeDelta::minutes(1);
        source.set_window("DS18B20", now, 5, &[73.0, 80.0]);
        monitor.run_cycle(now).await;
        assert_eq!(monitor.sensor_state(), SensorState::Connected);
        assert!(monitor.is_stabilizing());
        assert_eq!(monitor.temperature_state(), None);

        // Settled after the minimum stabilization time
        let now = t0() + TimeDelta::minutes(2);
        source.set_window("DS18B20", now, 2, &[97.0, 97.1]);
        monitor.run_cycle(now).await;
        assert!(!monitor.is_stabilizing());
        assert_eq!(monitor.temperature_state(), Some(TemperatureState::Average));

        // Warming up crosses a band
        let now = t0() + TimeDelta::minutes(3);
        source.set_window("DS18B20", now, 2, &[97.1, 98.5]);
        monitor.run_cycle(now).await;
        assert_eq!(monitor.temperature_state(), Some(TemperatureState::Warm));

        assert_eq!(
            sink.titles(),
            vec![
                "Raspberry Pi is ONLINE",
                "Sensor DISCONNECTED",
                "Sensor CONNECTED",
                "Temperature is WARM",
            ]
        );
        let last = sink.sent.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.description, "Current temperature: 98.5°F (98.0-99.0°F)");
    }

    #[tokio::test]
    async fn test_remote_refresh_replaces_config() {
        let source = FakeSource::default();
        let fetches = Arc::new(AtomicUsize::new(0));
        let variables: RemoteVariables = [
            ("temp_cold_max".to_string(), json!("96.0")),
            ("check_interval".to_string(), json!("30")),
            ("temp_warm_max".to_string(), json!("very")),
        ]
        .into_iter()
        .collect();
        let remote = FakeRemote {
            variables,
            fetches: fetches.clone(),
        };
        let mut monitor = Monitor::new(&AppConfig::default(), Box::new(source.clone()))
            .with_remote_config(Box::new(remote));

        monitor.run_cycle(t0()).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.temperature_config().cold_max, 96.0);
        assert_eq!(monitor.temperature_config().warm_max, 99.0);
        assert_eq!(monitor.general_config().check_interval, 30);

        // Not due again until the refresh interval (300 s) has passed
        monitor.run_cycle(t0() + TimeDelta::seconds(300)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        monitor.run_cycle(t0() + TimeDelta::seconds(301)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_without_remote_is_noop() {
        let source = FakeSource::default();
        let mut monitor = Monitor::new(&AppConfig::default(), Box::new(source));
        assert!(!monitor.refresh_config().await);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let source = FakeSource::default();
        let mut config = AppConfig::default();
        config.general.check_interval = 3600;
        let mut monitor = Monitor::new(&config, Box::new(source.clone()));

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        let finished = tokio::time::timeout(Duration::from_secs(5), monitor.run(cancel)).await;
        assert!(finished.is_ok(), "run did not stop after cancellation");
        assert_eq!(source.activity_checks.load(Ordering::SeqCst), 1);
    }
}
