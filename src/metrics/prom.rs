use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::store::Endpoint;

const HELP: &str = "Seconds until the leaf certificate expires; negative if expired";
const DOMAIN_LABEL: &str = "domain";

/// Fully qualified name of the exported gauge family.
pub const METRIC_NAME: &str = "ssl_certificate_expires";

/// Per-domain expiry gauges in an explicitly owned registry.
///
/// Writers are expected to be serialized by the collector; the label set is
/// tracked alongside the gauge family because `IntGaugeVec` cannot list the
/// label values it holds.
pub struct ExpiryGauges {
    registry: Registry,
    expires: IntGaugeVec,
    labels: Mutex<BTreeSet<Endpoint>>,
}

impl ExpiryGauges {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let expires = IntGaugeVec::new(
            Opts::new(METRIC_NAME, HELP),
            &[DOMAIN_LABEL],
        )?;
        registry.register(Box::new(expires.clone()))?;

        Ok(ExpiryGauges {
            registry,
            expires,
            labels: Mutex::new(BTreeSet::new()),
        })
    }

    /// Adds the `process_*` metrics of the running exporter.
    pub fn with_process_metrics(self) -> Result<Self, prometheus::Error> {
        #[cfg(target_os = "linux")]
        self.registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;
        Ok(self)
    }

    /// Sets the gauge for `domain`.
    pub fn set(&self, domain: &Endpoint, seconds_until_expiry: i64) {
        self.expires
            .with_label_values(&[domain.as_str()])
            .set(seconds_until_expiry);
        self.labels().insert(domain.clone());
    }

    /// Current value for `domain`, if one was ever published.
    pub fn get(&self, domain: &Endpoint) -> Option<i64> {
        if !self.labels().contains(domain) {
            return None;
        }
        self.expires
            .get_metric_with_label_values(&[domain.as_str()])
            .ok()
            .map(|gauge| gauge.get())
    }

    /// Drops the series of every domain not present in `current`.
    pub fn retain(&self, current: &[Endpoint]) {
        self.labels().retain(|domain| {
            let keep = current.contains(domain);
            if !keep {
                // The series may already be gone; nothing to report then.
                let _ = self.expires.remove_label_values(&[domain.as_str()]);
            }
            keep
        });
    }

    /// Domains with a published value, in label order.
    pub fn domains(&self) -> Vec<Endpoint> {
        self.labels().iter().cloned().collect()
    }

    /// Renders every registered metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Content type matching [`ExpiryGauges::render`].
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    fn labels(&self) -> MutexGuard<'_, BTreeSet<Endpoint>> {
        self.labels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
