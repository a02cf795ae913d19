use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat};
use log::{debug, error, info, warn, LevelFilter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

pub mod remote;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variables that seed configuration keys. Values found here are
/// registered as defaults, so the YAML file still takes precedence.
const ENV_KEYS: &[(&str, &str)] = &[
    ("TEMP_COLD_MAX", "temperature.cold_max"),
    ("TEMP_COOL_MAX", "temperature.cool_max"),
    ("TEMP_AVERAGE_MAX", "temperature.average_max"),
    ("TEMP_WARM_MAX", "temperature.warm_max"),
    ("TEMP_CALIBRATION_OFFSET", "temperature.calibration_offset"),
    ("TEMP_MIN_REALISTIC", "temperature.min_realistic_temp"),
    ("TEMP_MISPOSITION_THRESHOLD", "temperature.misposition_time_threshold"),
    ("TEMP_STABILIZATION_THRESHOLD", "temperature.stabilization_threshold"),
    ("TEMP_MIN_STABILIZATION_TIME", "temperature.min_stabilization_time"),
    ("TEMP_ROOM_THRESHOLD", "temperature.room_temp_threshold"),
    ("CHECK_INTERVAL", "general.check_interval"),
    ("OFFLINE_THRESHOLD", "general.offline_threshold"),
    ("SOURCE_NAME", "general.source_name"),
    ("INFLUX_URL", "influx.url"),
    ("INFLUX_TOKEN", "influx.token"),
    ("INFLUX_ORG", "influx.org"),
    ("INFLUX_BUCKET", "influx.bucket"),
    ("DISCORD_WEBHOOK_URL", "discord.webhook_url"),
    ("DISCORD_USERNAME", "discord.username"),
    ("DISCORD_AVATAR_URL", "discord.avatar_url"),
    ("GRAFANA_URL", "grafana.url"),
    ("GRAFANA_API_KEY", "grafana.api_key"),
    ("GRAFANA_DASHBOARD_UID", "grafana.dashboard_uid"),
    ("GRAFANA_REFRESH_INTERVAL", "grafana.refresh_interval"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FILE", "logging.file"),
];

/// Band boundaries, calibration and the sensor-state heuristics' thresholds.
/// All temperatures are in °F.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TemperatureConfig {
    pub cold_max: f64,
    pub cool_max: f64,
    pub average_max: f64,
    pub warm_max: f64,
    /// Added to every raw reading before it is classified.
    pub calibration_offset: f64,
    /// Lowest reading that can come from a worn sensor.
    pub min_realistic_temp: f64,
    /// Minutes allowed to reach `min_realistic_temp` after attachment.
    pub misposition_time_threshold: u64,
    /// °F per minute below which the sensor counts as settled.
    pub stabilization_threshold: f64,
    /// Seconds to wait after attachment before checking for settling.
    pub min_stabilization_time: u64,
    /// Distance to room temperature under which the sensor counts as removed.
    pub room_temp_threshold: f64,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            cold_max: 96.5,
            cool_max: 97.0,
            average_max: 98.0,
            warm_max: 99.0,
            calibration_offset: 0.0,
            min_realistic_temp: 94.0,
            misposition_time_threshold: 5,
            stabilization_threshold: 0.1,
            min_stabilization_time: 60,
            room_temp_threshold: 10.0,
        }
    }
}

impl TemperatureConfig {
    pub fn has_ordered_bands(&self) -> bool {
        self.cold_max < self.cool_max
            && self.cool_max < self.average_max
            && self.average_max < self.warm_max
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Seconds between poll cycles.
    pub check_interval: u64,
    /// Seconds of silence after which the sensor hub counts as offline.
    pub offline_threshold: u64,
    /// Minimum seconds between two liveness queries.
    pub online_check_interval: u64,
    pub query_window_minutes: u64,
    pub primary_sensor: String,
    pub reference_sensor: String,
    /// Name of the sending device, used in liveness alerts.
    pub source_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            check_interval: 60,
            offline_threshold: 300,
            online_check_interval: 180,
            query_window_minutes: 15,
            primary_sensor: "DS18B20".to_string(),
            reference_sensor: "SI7021".to_string(),
            source_name: "Raspberry Pi".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
}

impl InfluxConfig {
    /// Names of the required settings that are absent or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("influx.url", &self.url),
            ("influx.token", &self.token),
            ("influx.org", &self.org),
            ("influx.bucket", &self.bucket),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Influx Monitor".to_string(),
            avatar_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GrafanaConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub dashboard_uid: Option<String>,
    /// Seconds between dashboard variable refreshes.
    pub refresh_interval: u64,
}

impl Default for GrafanaConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            dashboard_uid: None,
            refresh_interval: 300,
        }
    }
}

impl GrafanaConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.is_some() && self.api_key.is_some() && self.dashboard_uid.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub temperature: TemperatureConfig,
    pub influx: InfluxConfig,
    pub discord: DiscordConfig,
    pub grafana: GrafanaConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        Self::load(DEFAULT_CONFIG_FILE, |name| std::env::var(name).ok())
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" | "warning" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info, // Default to Info if invalid
        }
    }

    /// Layer defaults, then the environment (through `env`), then the YAML
    /// file at `path` when it exists.
    ///
    /// A file that cannot be parsed is skipped in favour of the environment,
    /// and a section with an invalid value falls back to its defaults, so
    /// one bad setting never discards the connection settings.
    pub fn load<P, F>(path: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref();

        if config_path.exists() {
            info!("Loading configuration from {}", config_path.display());
        } else {
            info!(
                "No config file at {}, using environment and defaults",
                config_path.display()
            );
        }

        let file = File::from(config_path)
            .format(FileFormat::Yaml)
            .required(false);
        let config = match env_layer(&env)?.add_source(file).build() {
            Ok(config) => config,
            Err(e) => {
                error!(
                    "Ignoring config file {}: {}",
                    config_path.display(),
                    e
                );
                env_layer(&env)?
                    .build()
                    .context("Failed to load config from environment")?
            }
        };

        let app_config = AppConfig {
            general: section(&config, "general"),
            temperature: section(&config, "temperature"),
            influx: section(&config, "influx"),
            discord: section(&config, "discord"),
            grafana: section(&config, "grafana"),
            logging: section(&config, "logging"),
        };

        if !app_config.temperature.has_ordered_bands() {
            warn!(
                "Temperature bands are not strictly increasing: {:?}",
                app_config.temperature
            );
        }

        Ok(app_config)
    }
}

fn env_layer<F>(env: &F) -> Result<ConfigBuilder<DefaultState>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder();
    for (var, key) in ENV_KEYS {
        if let Some(value) = env(var) {
            debug!("Using {} from environment", var);
            builder = builder
                .set_default(*key, value)
                .with_context(|| format!("Invalid value for {}", var))?;
        }
    }
    Ok(builder)
}

fn section<T>(config: &Config, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match config.get::<T>(key) {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => T::default(),
        Err(e) => {
            error!("Invalid {} settings, using defaults: {}", key, e);
            T::default()
        }
    }
}
