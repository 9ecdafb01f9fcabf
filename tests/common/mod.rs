//! Shared fixtures: a local configuration source and scripted probers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use ssl_expiry_exporter::{Config, Endpoint, ProbeErrorKind, ProbeResult, Prober, Settings};

type Response = Arc<Mutex<(StatusCode, String)>>;

/// Serves `/config.json` with a response the test can change at any time.
pub struct ConfigServer {
    pub url: Url,
    response: Response,
}

impl ConfigServer {
    pub async fn start(body: &str) -> Self {
        let response: Response = Arc::new(Mutex::new((StatusCode::OK, body.to_string())));
        let app = Router::new()
            .route("/config.json", get(serve_config))
            .with_state(Arc::clone(&response));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        ConfigServer {
            url: Url::parse(&format!("http://{}/config.json", address)).unwrap(),
            response,
        }
    }

    pub fn respond(&self, status: StatusCode, body: &str) {
        *self.response.lock().unwrap() = (status, body.to_string());
    }

    pub fn serve_domains(&self, domains: &[&str]) {
        let body = serde_json::json!({ "domains": domains }).to_string();
        self.respond(StatusCode::OK, &body);
    }

    pub fn settings(&self) -> Settings {
        Config {
            config_url: Some(self.url.to_string()),
            port: Some(0),
            fetch_timeout_secs: Some(2),
            ..Config::default()
        }
        .validate()
        .unwrap()
    }
}

async fn serve_config(State(response): State<Response>) -> (StatusCode, String) {
    response.lock().unwrap().clone()
}

pub fn endpoints(names: &[&str]) -> Vec<Endpoint> {
    names.iter().map(|name| Endpoint::from(*name)).collect()
}

pub fn domains_of(snapshot: &[ProbeResult]) -> Vec<String> {
    snapshot
        .iter()
        .map(|result| result.domain().to_string())
        .collect()
}

/// Blocks probes until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn opened() -> Self {
        Gate {
            open: Mutex::new(true),
            opened: Condvar::new(),
        }
    }

    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

/// Answers from a table the test can rewrite; unknown domains fail to
/// connect.
pub struct ScriptedProber {
    table: Mutex<HashMap<String, i64>>,
    pub gate: Gate,
    pub started: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(entries: &[(&str, i64)]) -> Self {
        let prober = ScriptedProber {
            table: Mutex::new(HashMap::new()),
            gate: Gate::opened(),
            started: AtomicUsize::new(0),
        };
        prober.set_all(entries);
        prober
    }

    pub fn gated(entries: &[(&str, i64)]) -> Self {
        ScriptedProber {
            gate: Gate::default(),
            ..ScriptedProber::new(entries)
        }
    }

    pub fn set_all(&self, entries: &[(&str, i64)]) {
        let mut table = self.table.lock().unwrap();
        table.clear();
        for (domain, seconds) in entries {
            table.insert(domain.to_string(), *seconds);
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl Prober for ScriptedProber {
    fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();
        let seconds = self.table.lock().unwrap().get(endpoint.as_str()).copied();
        match seconds {
            Some(seconds_until_expiry) => ProbeResult::Success {
                domain: endpoint.clone(),
                seconds_until_expiry,
            },
            None => ProbeResult::Failure {
                domain: endpoint.clone(),
                reason: ProbeErrorKind::ConnectionFailed,
                detail: "connection refused".to_string(),
            },
        }
    }
}
