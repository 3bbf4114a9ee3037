//! Bell scheduler daemon.
//!
//! Loads the settings file, arms the schedule, and serves the control API
//! until interrupted. The settings path can be overridden with the first
//! command-line argument (default `conf/chime.toml`).

use chime::engine::BellEngine;
use chime::relay::Relay;
use chime::schedule::ScheduleStore;
use chime::server::{AppState, run_server};
use chime::Settings;
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "rpi")]
fn open_relay(settings: &Settings) -> anyhow::Result<Relay> {
    let pin = chime::relay::GpioPin::open(settings.relay.pin)?;
    tracing::info!(pin = settings.relay.pin, "GPIO relay opened");
    Ok(Relay::new(pin))
}

#[cfg(not(feature = "rpi"))]
fn open_relay(settings: &Settings) -> anyhow::Result<Relay> {
    tracing::warn!(
        pin = settings.relay.pin,
        "built without the rpi feature; relay output is a no-op"
    );
    Ok(Relay::new(chime::relay::NoopPin))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("conf/chime.toml"), PathBuf::from);

    tracing::info!(path = %settings_path.display(), "chimed starting");
    let settings = Settings::load(&settings_path)?;

    let relay = Arc::new(open_relay(&settings)?);
    let store = Arc::new(ScheduleStore::from_settings(&settings, settings_path));
    let engine = Arc::new(BellEngine::new(Arc::clone(&store), Arc::clone(&relay)));
    engine.start().await;

    let state = AppState::new(Arc::clone(&store), Arc::clone(&engine), &settings.server);
    let server = {
        let server_config = settings.server.clone();
        tokio::spawn(async move { run_server(&server_config, state).await })
    };

    tokio::select! {
        result = server => {
            if let Ok(Err(e)) = result {
                tracing::error!(error = %e, "control api exited with error");
                anyhow::bail!("control api failed: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }

    engine.stop().await;
    tracing::info!("chimed shut down cleanly");
    Ok(())
}
