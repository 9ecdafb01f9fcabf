use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use ssl_expiry_exporter::report::render_table;
use ssl_expiry_exporter::{server, Config, Exporter, Settings};

#[derive(Parser, Debug)]
#[command(name = "ssl-expiry-exporter", version, long_about = env!("CARGO_PKG_DESCRIPTION"))]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL of the JSON document listing the domains to monitor
    #[arg(long, env = "CONFIG_URL")]
    config_url: Option<String>,

    /// Port serving /metrics and /reload
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    listen_address: Option<String>,

    /// Handshake timeout in seconds
    #[arg(long, value_name = "SECS")]
    probe_timeout: Option<u64>,

    /// Domain list fetch timeout in seconds
    #[arg(long, value_name = "SECS")]
    fetch_timeout: Option<u64>,

    /// Reload the domain list in the background every SECS seconds
    #[arg(long, value_name = "SECS")]
    reload_interval: Option<u64>,

    /// Validate certificate chains against the system trust store
    #[arg(long)]
    verify_peer: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Probe every domain once, print a table and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut config = Config::default();
        if let Some(path) = &self.config {
            info!(path = %path.display(), "Loading config file");
            config = config.merge_with(Config::from_file(path)?);
        }
        config = config.merge_with(Config::from_cli_args(
            self.config_url.clone(),
            self.port,
            self.listen_address.clone(),
            self.probe_timeout,
            self.fetch_timeout,
            self.reload_interval,
            self.verify_peer,
        ));

        // `--check` never binds, so it does not need a port.
        if self.check && config.port.is_none() {
            config.port = Some(0);
        }
        Ok(config.validate()?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", Config::example_toml());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "ssl-expiry-exporter starting");

    let settings = cli.settings()?;
    let exporter = Exporter::start(&settings).await?;

    if cli.check {
        let collector = Arc::clone(&exporter.collector);
        let snapshot = tokio::task::spawn_blocking(move || collector.collect()).await?;
        println!("{}", render_table(&snapshot));
        let failed = snapshot.iter().filter(|result| !result.is_success()).count();
        exit(if failed > 0 { 1 } else { 0 });
    }

    if let Some(interval) = settings.reload_interval {
        info!(seconds = interval.as_secs(), "Background reload enabled");
        Arc::clone(&exporter.loader).spawn_periodic(interval);
    }

    let listener = TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen))?;
    server::serve(listener, exporter.app_state(), shutdown_signal()).await?;

    info!("ssl-expiry-exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
}
