//! Venue presence service: subscribes to wifi-session snapshots from the
//! broker, aggregates them into the privacy-filtered presence summary,
//! publishes changes back to the status feed, and serves the self-service
//! registry API. Liveness is enforced by a watchdog; the process is meant
//! to run under supervision.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;

mod presence_logic;
use presence_logic::xsrf::XsrfStore;
use presence_logic::{config, logger, transport, web};

use lib_presence::core::change_detector::ChangeDetector;
use lib_presence::core::engine::PresenceEngine;
use lib_presence::core::ingestion;
use lib_presence::core::locations::LocationResolver;
use lib_presence::core::watchdog::Watchdog;
use lib_presence::registry::master::FileMasterRegistry;
use lib_presence::registry::user::PersistentUserRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = config::load_config()?;
    logger::setup_logging(config.log_dir.as_deref(), &config.log_level)?;

    log::info!(
        "server_presence starting. session topic: {}, devices topic: {}, master db: {}, user db: {}",
        config.session_topic,
        config.devices_topic,
        config.master_file.display(),
        config.user_file.display()
    );

    // Registries are bootstrap-critical: a missing or unparsable file stops
    // the start right here.
    let master = Arc::new(FileMasterRegistry::load(&config.master_file)?);
    let user = Arc::new(PersistentUserRegistry::load(&config.user_file)?);

    let engine = Arc::new(PresenceEngine::new(
        LocationResolver::new(config.locations.clone()),
        master,
        user.clone(),
    ));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let (snapshot_tx, snapshot_rx) = ingestion::snapshot_channel();
    let (publisher, publish_rx) = transport::publisher_channel();
    let watchdog = Watchdog::spawn(config.watchdog_timeout);

    let transport_handle = tokio::spawn(transport::run(
        config.clone(),
        snapshot_tx,
        publish_rx,
        shutdown_tx.subscribe(),
    ));

    let ingestion_handle = tokio::spawn(ingestion::run(
        engine.clone(),
        snapshot_rx,
        ChangeDetector::new(),
        Arc::new(publisher),
        watchdog.clone(),
        shutdown_tx.subscribe(),
    ));

    let xsrf = Arc::new(XsrfStore::new());
    let web_state = Arc::new(web::WebState {
        engine: engine.clone(),
        user_registry: user,
        xsrf: xsrf.clone(),
    });
    let web_config = config.clone();
    let web_shutdown = shutdown_tx.subscribe();
    let web_handle = tokio::spawn(async move {
        if let Err(err) = web::run(web_config, web_state, web_shutdown).await {
            log::error!("Web service failed: {:#}", err);
            std::process::exit(1);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install signal handler");
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());
    watchdog.stop();
    xsrf.stop();

    // Wait for components to shut down
    let _ = tokio::try_join!(transport_handle, ingestion_handle, web_handle);

    log::info!("Shutdown complete.");
    Ok(())
}
