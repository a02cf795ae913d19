use env_logger::{Builder, Target, WriteStyle};
use log::{error, info};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use temp_monitor::config::AppConfig;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration first (without logging)
    let config = AppConfig::new().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {:#}", e);
        // Fall back to default configuration
        AppConfig::default()
    });

    // Initialise logger with a configured log level
    let mut builder = Builder::new();
    builder
        .filter_level(config.get_log_level())
        .write_style(WriteStyle::Always)
        .format_timestamp_secs();
    if let Some(path) = &config.logging.file {
        match open_log_file(Path::new(path)) {
            Ok(file) => {
                builder
                    .target(Target::Pipe(Box::new(file)))
                    .write_style(WriteStyle::Never);
            }
            Err(e) => eprintln!("Failed to open log file {}: {}", path, e),
        }
    }
    builder.init();

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    if let Err(e) = temp_monitor::run(config, cancel).await {
        error!("Application error: {}", e);
        return Err(e);
    }
    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
