//! Prometheus exporter for TLS certificate expiry.
//!
//! A remote JSON document lists the domains to watch. Every scrape of
//! `/metrics` performs a live handshake against each domain on port 443
//! and publishes `ssl_certificate_expires{domain="..."}` in seconds.
//! `/reload` re-fetches the domain list without a restart.

use std::sync::Arc;

pub mod collector;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod probe;
pub mod report;
pub mod server;
pub mod store;

pub use collector::{CollectorSnapshot, ExpiryCollector};
pub use config::{Config, Settings};
pub use error::{ConfigError, LoadError, ProbeError, StartupError};
pub use loader::{ConfigLoader, ConfigPayload, LoadOutcome};
pub use metrics::ExpiryGauges;
pub use probe::{OpensslProbe, ProbeErrorKind, ProbeResult, Prober};
pub use server::AppState;
pub use store::{Endpoint, EndpointSet, EndpointStore};

/// The wired components of a running exporter.
pub struct Exporter {
    pub store: Arc<EndpointStore>,
    pub loader: Arc<ConfigLoader>,
    pub collector: Arc<ExpiryCollector>,
}

impl Exporter {
    /// Loads the initial endpoint list and wires the OpenSSL prober.
    ///
    /// Fails if the first load fails or lists no domains; the caller
    /// decides whether that ends the process.
    pub async fn start(settings: &Settings) -> Result<Self, StartupError> {
        let prober = OpensslProbe::new(settings.probe_timeout).verify_peer(settings.verify_peer);
        let gauges = ExpiryGauges::new()?.with_process_metrics()?;
        Exporter::start_with(settings, Box::new(prober), gauges).await
    }

    /// Same as [`Exporter::start`] with a caller supplied prober and registry.
    pub async fn start_with(
        settings: &Settings,
        prober: Box<dyn Prober>,
        gauges: ExpiryGauges,
    ) -> Result<Self, StartupError> {
        let store = Arc::new(EndpointStore::default());
        let loader = Arc::new(ConfigLoader::new(
            settings.config_url.clone(),
            settings.fetch_timeout,
            Arc::clone(&store),
        )?);
        loader.initial_load().await?;

        let collector = Arc::new(ExpiryCollector::new(Arc::clone(&store), prober, gauges));
        Ok(Exporter {
            store,
            loader,
            collector,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            collector: Arc::clone(&self.collector),
            loader: Arc::clone(&self.loader),
        }
    }
}
