use sprinkler_leak::utils::init_from_config;
use sprinkler_leak::{
    Config, Detector, DetectorSettings, LogNotifier, Notifier, OpenSprinklerClient,
    TelegramNotifier,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Watch irrigation flow and report leaking pipes or stuck valves
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration (defaults to $CONFIG_FILE or config/leak.toml)
    #[arg(long)]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let args = Args::parse();

    let config = match &args.config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    init_from_config(&config.logging)?;

    info!("Starting leak detector");
    info!("✓ Configuration loaded, controller at {}", config.controller.url);

    let settings = DetectorSettings::from_config(&config)?;

    let controller = OpenSprinklerClient::new(
        &config.controller.url,
        &config.controller.password,
        Duration::from_secs(config.controller.request_timeout_seconds),
    )?;

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => {
            info!("✓ Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(telegram)?)
        }
        None => {
            warn!("No [telegram] section, anomalies will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let detector = Detector::new(Arc::new(controller), notifier, settings);
    let mut detection = tokio::spawn(detector.run());

    tokio::select! {
        joined = &mut detection => {
            // The detector only returns on failure; let the supervisor restart us
            match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("Leak detection stopped: {}", e);
                    Err(e.into())
                }
                Err(e) => {
                    error!("Leak detection task failed: {}", e);
                    Err(e.into())
                }
            }
        }
        signal = shutdown_signal() => {
            info!("Shutting down on {}", signal?);

            detection.abort();
            if let Err(e) = detection.await {
                if !e.is_cancelled() {
                    warn!("Leak detection task ended abnormally: {}", e);
                }
            }

            info!("Stopped");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = hangup.recv() => Ok("SIGHUP"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
