//! Fetches the endpoint list from the remote configuration source and
//! installs it in the [`EndpointStore`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use crate::error::{LoadError, StartupError};
use crate::store::{describe, Endpoint, EndpointSet, EndpointStore};

/// Shape of the remote document: `{"domains": ["a.example", ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub domains: Vec<Endpoint>,
}

impl ConfigPayload {
    /// Parses a payload, rejecting an empty domain list.
    pub fn parse(bytes: &[u8]) -> Result<EndpointSet, LoadError> {
        let payload: ConfigPayload = serde_json::from_slice(bytes)?;
        if payload.domains.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(payload.domains)
    }
}

/// Result of an on-demand reload together with the list active afterwards,
/// whether or not the reload replaced it.
#[derive(Debug)]
pub struct LoadOutcome {
    pub result: Result<EndpointSet, LoadError>,
    pub current: EndpointSet,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(_) => write!(
                f,
                "Reloading configuration file... domains:{}",
                describe(&self.current)
            ),
            Err(err) => write!(
                f,
                "Reload failed: {}; domains:{}",
                err,
                describe(&self.current)
            ),
        }
    }
}

pub struct ConfigLoader {
    client: reqwest::Client,
    url: Url,
    store: Arc<EndpointStore>,
}

impl ConfigLoader {
    /// `timeout` bounds the whole fetch, body included.
    pub fn new(url: Url, timeout: Duration, store: Arc<EndpointStore>) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LoadError::Client)?;
        Ok(ConfigLoader { client, url, store })
    }

    pub fn store(&self) -> &Arc<EndpointStore> {
        &self.store
    }

    /// Fetches and parses the remote list without touching the store.
    pub async fn fetch(&self) -> Result<EndpointSet, LoadError> {
        let transport = |source| LoadError::Transport {
            url: self.url.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: self.url.to_string(),
                status,
            });
        }
        let body = response.bytes().await.map_err(transport)?;
        ConfigPayload::parse(&body)
    }

    /// Fetches the list and, on success, replaces the store contents. On
    /// failure the store is left untouched.
    pub async fn load(&self) -> Result<EndpointSet, LoadError> {
        match self.fetch().await {
            Ok(endpoints) => {
                self.store.replace(endpoints.clone());
                info!(domains = %describe(&endpoints), "Successful loading domains");
                Ok(endpoints)
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "Failure loading domains");
                Err(err)
            }
        }
    }

    /// Loads and reports the list active afterwards, for the reload endpoint.
    pub async fn reload(&self) -> LoadOutcome {
        let result = self.load().await;
        LoadOutcome {
            result,
            current: self.store.snapshot(),
        }
    }

    /// First load at startup. Any failure here means there is nothing to
    /// monitor, so it is reported as a startup error.
    pub async fn initial_load(&self) -> Result<EndpointSet, StartupError> {
        Ok(self.load().await?)
    }

    /// Reloads every `interval` until the runtime shuts down. The first
    /// reload happens one interval after the call.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Failures are logged by `load` and leave the store as is.
                let _ = self.load().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_order() {
        let endpoints =
            ConfigPayload::parse(br#"{"domains":["b.example","a.example","b.example"]}"#).unwrap();
        let names: Vec<_> = endpoints.iter().map(Endpoint::as_str).collect();
        assert_eq!(names, vec!["b.example", "a.example", "b.example"]);
    }

    #[test]
    fn test_parse_rejects_empty_list() {
        let err = ConfigPayload::parse(br#"{"domains":[]}"#).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn test_parse_rejects_malformed_payload() {
        let bodies: [&[u8]; 3] = [
            b"not json",
            br#"{"hosts":["a.example"]}"#,
            br#"{"domains":"a"}"#,
        ];
        for body in bodies {
            let err = ConfigPayload::parse(body).unwrap_err();
            assert!(matches!(err, LoadError::Malformed(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_payload_round_trip() {
        let payload = ConfigPayload {
            domains: (0..25).map(|i| Endpoint::new(format!("host{}.example", i))).collect(),
        };
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert_eq!(ConfigPayload::parse(&bytes).unwrap(), payload.domains);
    }

    #[test]
    fn test_outcome_message() {
        let current = vec![Endpoint::from("a.example"), Endpoint::from("b.example")];
        let ok = LoadOutcome {
            result: Ok(current.clone()),
            current: current.clone(),
        };
        assert!(ok.is_success());
        assert_eq!(
            ok.to_string(),
            "Reloading configuration file... domains:a.example,b.example"
        );

        let failed = LoadOutcome {
            result: Err(LoadError::Empty),
            current,
        };
        assert!(!failed.is_success());
        assert_eq!(
            failed.to_string(),
            "Reload failed: configuration contains no domains; domains:a.example,b.example"
        );
    }

    #[tokio::test]
    async fn test_reload_reports_unchanged_list_on_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let store = Arc::new(EndpointStore::new(vec![Endpoint::from("a.example")]));
        let url = Url::parse(&format!("http://127.0.0.1:{}/config.json", port)).unwrap();
        let loader = ConfigLoader::new(url, Duration::from_secs(2), store).unwrap();

        let outcome = loader.reload().await;
        assert!(matches!(outcome.result, Err(LoadError::Transport { .. })));
        assert_eq!(outcome.current, vec![Endpoint::from("a.example")]);
    }

    #[tokio::test]
    async fn test_silent_source_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // Accept and hold every connection without answering.
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let store = Arc::new(EndpointStore::new(vec![Endpoint::from("a.example")]));
        let url = Url::parse(&format!("http://127.0.0.1:{}/config.json", port)).unwrap();
        let loader = ConfigLoader::new(url, Duration::from_millis(300), store.clone()).unwrap();

        let started = std::time::Instant::now();
        let err = loader.load().await.unwrap_err();

        assert!(matches!(err, LoadError::Transport { .. }), "{:?}", err);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(store.snapshot(), vec![Endpoint::from("a.example")]);
    }

    #[tokio::test]
    async fn test_unreachable_source_leaves_store_unchanged() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let store = Arc::new(EndpointStore::new(vec![Endpoint::from("a.example")]));
        let url = Url::parse(&format!("http://127.0.0.1:{}/config.json", port)).unwrap();
        let loader = ConfigLoader::new(url, Duration::from_secs(2), store.clone()).unwrap();

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, LoadError::Transport { .. }), "{:?}", err);
        assert_eq!(store.snapshot(), vec![Endpoint::from("a.example")]);
    }
}
