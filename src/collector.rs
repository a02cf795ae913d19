use log::debug;
use std::time::Instant;

use crate::client::ReadingSource;
use crate::config::GeneralConfig;
use crate::models::SensorWindows;

/// Pull the primary and reference windows for one cycle.
pub(crate) async fn collect_windows(source: &dyn ReadingSource, general: &GeneralConfig) -> SensorWindows {
    let start = Instant::now();
    let minutes = general.query_window_minutes;

    let (primary, reference) = tokio::join!(
        source.query_recent_readings(&general.primary_sensor, minutes),
        source.query_recent_readings(&general.reference_sensor, minutes),
    );

    debug!(
        "collect_windows took: {} ms ({} {} readings, {} {} readings)",
        start.elapsed().as_millis(),
        primary.len(),
        general.primary_sensor,
        reference.len(),
        general.reference_sensor
    );

    SensorWindows { primary, reference }
}
