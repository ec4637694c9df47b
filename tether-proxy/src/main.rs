//! Tether Proxy Engine
//!
//! Loads the backend configuration, keeps backend health current with a
//! background prober, and redirects each client to a healthy backend while
//! keeping it on the same one across requests.

#![deny(missing_docs)]

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rand::RngCore;
use tether_core::{Balancer, BackendRegistry, HealthProber, HealthStore};
use tokio::signal;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod health_check;
mod server;
mod session;
mod tls;

use config::AppConfig;
use health_check::{HttpProbe, JsonFileSink};
use server::AppState;
use session::SessionCodec;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Health-checked sticky load balancer")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the listen address from the config file.
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

/// The primary entrypoint for the Tether load balancer.
///
/// Validates configuration (any error is fatal), starts the health prober,
/// then serves until Ctrl-C or a fatal error.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    config.balancer.probe.validate()?;
    let registry = Arc::new(BackendRegistry::load(&config.balancer.backends)?);
    let store = Arc::new(HealthStore::optimistic(&registry));
    info!(backends = registry.len(), pool = registry.weighted_pool().len(), "Loaded backends");

    let tls_acceptor = match &config.tls {
        Some(tls) => {
            let server_config = tls::load_tls_config(&tls.cert_path, &tls.key_path)?;
            info!("TLS certificates loaded");
            Some(TlsAcceptor::from(server_config))
        }
        None => None,
    };

    let shutdown = CancellationToken::new();

    let transport = Arc::new(HttpProbe::new(config.balancer.probe.timeout())?);
    let mut prober = HealthProber::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        transport,
        config.balancer.probe,
    );
    if let Some(path) = &config.status_file {
        let sink = JsonFileSink::new(path);
        info!(path = %sink.path().display(), "Writing health snapshots");
        prober = prober.with_sink(Arc::new(sink));
    }
    let mut prober_handle = prober.spawn(shutdown.clone());

    let cookie_secret = match config.cookie_secret {
        Some(secret) => secret.into_bytes(),
        None => {
            warn!("No cookie_secret configured; sessions will not survive a restart");
            let mut secret = vec![0u8; 32];
            rand::rng().fill_bytes(&mut secret);
            secret
        }
    };
    let sessions = SessionCodec::new(config.cookie_name, &cookie_secret)
        .map_err(|e| format!("invalid cookie secret: {e}"))?;
    let state = Arc::new(AppState::new(Balancer::new(registry, store), sessions));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        });
    }

    let (served, prober_exit) = tokio::select! {
        served = server::start_server(config.listen, tls_acceptor, state, shutdown.clone()) => (served, None),
        joined = &mut prober_handle => (Ok(()), Some(joined)),
    };
    let requested = shutdown.is_cancelled();
    shutdown.cancel();

    match prober_exit {
        Some(joined) if !requested => {
            return Err(format!("health prober exited unexpectedly: {joined:?}").into());
        }
        Some(_) => {}
        None => {
            if let Err(e) = prober_handle.await {
                error!(error = %e, "Health prober failed during shutdown");
            }
        }
    }

    info!("Shutting down gracefully.");
    served
}
