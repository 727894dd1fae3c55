//! parkwatchd - upload service for parking occupancy runs
//!
//! This daemon:
//! 1. Loads configuration (PARKWATCH_CONFIG + environment)
//! 2. Serves `POST /process_media`, one session at a time
//! 3. Stops on Ctrl-C

use anyhow::Result;
use std::sync::mpsc;
use std::sync::Arc;

use parkwatch::{
    api::ApiServer,
    config::ParkwatchConfig,
    session::SessionController,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ParkwatchConfig::load()?;
    let controller = Arc::new(SessionController::new(
        config.session_config(),
        config.collaborators()?,
    ));
    log::info!(
        "parkwatchd {}: step={} threshold={} classifier={}",
        env!("CARGO_PKG_VERSION"),
        config.scheduler.step,
        config.scheduler.threshold,
        config.classifier.backend
    );
    if let Some(dir) = &config.snapshot_dir {
        log::info!("annotated snapshots go to {}", dir.display());
    }

    let api_handle = ApiServer::new(config.api_config(), controller).spawn()?;
    log::info!("parkwatchd listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("parkwatchd waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
