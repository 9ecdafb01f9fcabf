//! One collection cycle per scrape: snapshot the endpoint list, probe every
//! domain concurrently and publish the successes.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, warn};

use crate::metrics::ExpiryGauges;
use crate::probe::{ProbeErrorKind, ProbeResult, Prober};
use crate::store::{Endpoint, EndpointStore};

/// Every probe result of one cycle, in endpoint-list order.
pub type CollectorSnapshot = Vec<ProbeResult>;

pub struct ExpiryCollector {
    store: Arc<EndpointStore>,
    prober: Box<dyn Prober>,
    gauges: ExpiryGauges,
    // Serializes whole cycles; the store keeps its own lock so reloads are
    // never blocked by a scrape.
    cycle: Mutex<()>,
}

impl ExpiryCollector {
    pub fn new(store: Arc<EndpointStore>, prober: Box<dyn Prober>, gauges: ExpiryGauges) -> Self {
        ExpiryCollector {
            store,
            prober,
            gauges,
            cycle: Mutex::new(()),
        }
    }

    pub fn gauges(&self) -> &ExpiryGauges {
        &self.gauges
    }

    pub fn store(&self) -> &Arc<EndpointStore> {
        &self.store
    }

    /// Runs one cycle and returns its results.
    pub fn collect(&self) -> CollectorSnapshot {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.run_cycle()
    }

    /// Runs one cycle and renders the exposition text while still holding
    /// the cycle lock, so the output reflects exactly this cycle.
    pub fn scrape(&self) -> Result<String, prometheus::Error> {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.run_cycle();
        self.gauges.render()
    }

    fn run_cycle(&self) -> CollectorSnapshot {
        let endpoints = self.store.snapshot();
        let snapshot = probe_all(self.prober.as_ref(), &endpoints);

        for result in &snapshot {
            match result {
                ProbeResult::Success {
                    domain,
                    seconds_until_expiry,
                } => {
                    debug!(domain = %domain, seconds = seconds_until_expiry, "probe succeeded");
                    self.gauges.set(domain, *seconds_until_expiry);
                }
                // The previous value stays published until a probe succeeds.
                ProbeResult::Failure {
                    domain,
                    reason,
                    detail,
                } => {
                    warn!(domain = %domain, kind = %reason, error = %detail, "probe failed");
                }
            }
        }
        self.gauges.retain(&endpoints);

        snapshot
    }
}

/// Upper bound on handshakes in flight during one cycle.
pub const MAX_CONCURRENT_PROBES: usize = 32;

enum Pending<'scope> {
    Running(thread::ScopedJoinHandle<'scope, ProbeResult>),
    Done(ProbeResult),
}

/// Probes endpoints concurrently, at most [`MAX_CONCURRENT_PROBES`] at a
/// time. Each thread returns into its own slot, so the result order matches
/// `endpoints`. If a thread cannot be started the endpoint is probed on the
/// calling thread instead.
pub fn probe_all(prober: &dyn Prober, endpoints: &[Endpoint]) -> CollectorSnapshot {
    let mut snapshot = Vec::with_capacity(endpoints.len());
    for batch in endpoints.chunks(MAX_CONCURRENT_PROBES) {
        thread::scope(|scope| {
            let pending: Vec<_> = batch
                .iter()
                .map(|endpoint| {
                    let spawned =
                        thread::Builder::new().spawn_scoped(scope, move || prober.probe(endpoint));
                    match spawned {
                        Ok(handle) => Pending::Running(handle),
                        Err(err) => {
                            warn!(domain = %endpoint, error = %err, "thread spawn failed, probing inline");
                            Pending::Done(prober.probe(endpoint))
                        }
                    }
                })
                .collect();

            snapshot.extend(pending.into_iter().zip(batch).map(|(pending, endpoint)| {
                match pending {
                    Pending::Running(handle) => {
                        handle.join().unwrap_or_else(|_| ProbeResult::Failure {
                            domain: endpoint.clone(),
                            reason: ProbeErrorKind::ConnectionFailed,
                            detail: "probe thread panicked".to_string(),
                        })
                    }
                    Pending::Done(result) => result,
                }
            }));
        });
    }
    snapshot
}
