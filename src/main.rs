//! Endpoint reconciler host.
//!
//! ```text
//! endpoints.toml ──▶ loader ──▶ Reconciler::load ──▶ bindings (logged)
//!       │
//!       └── watcher / SIGHUP ──▶ Reconciler::reload ──▶ ReloadPlan (logged)
//! ```
//!
//! With `--plan` the initial plan is printed as JSON and the process exits.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::sync::mpsc;

use endpoint_reconciler::config::{load_config, ConfigTree, ConfigWatcher, HostEnvironment};
use endpoint_reconciler::lifecycle::{next_signal, HostSignal, Shutdown};
use endpoint_reconciler::observability::logging::{self, LogFormat};
use endpoint_reconciler::observability::metrics;
use endpoint_reconciler::Reconciler;

#[derive(Parser, Debug)]
#[command(name = "endpoint-reconciler", version)]
#[command(about = "Reconcile listen endpoints and TLS certificates from a configuration file", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "endpoints.toml")]
    config: PathBuf,

    /// Root for relative certificate paths; defaults to the configuration file's directory
    #[arg(long)]
    content_root: Option<PathBuf>,

    /// Application name, used to find the development certificate
    #[arg(long, default_value = "app")]
    app_name: String,

    /// Print the binding plan as JSON and exit
    #[arg(long)]
    plan: bool,

    #[arg(long, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Log filter, overridden by RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.log_filter.as_deref(), cli.log_format)?;

    tracing::info!("endpoint-reconciler v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr);
    }

    let content_root = match cli.content_root {
        Some(root) => root,
        None => match cli.config.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => std::env::current_dir()?,
        },
    };
    let environment = HostEnvironment::new(cli.app_name, content_root);

    let tree = load_config(&cli.config)?;
    tracing::info!(
        path = %cli.config.display(),
        application = %environment.application_name,
        content_root = %environment.content_root.display(),
        "Configuration loaded"
    );
    let mut reconciler = Reconciler::new(tree, environment);

    if cli.plan {
        let plan = reconciler.reload()?;
        println!("{}", serde_json::to_string_pretty(&plan.summary())?);
        return Ok(());
    }

    reconciler.load()?;
    let bound = reconciler.bindings().count();
    tracing::info!(bound, "Endpoints loaded");

    run(&mut reconciler, &cli.config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Watch the configuration until shutdown, reconciling on every change.
async fn run(reconciler: &mut Reconciler, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, mut updates) = ConfigWatcher::new(config_path);
    let _watcher = watcher.run()?;

    let shutdown = Shutdown::new();
    let mut shutdown_rx = shutdown.subscribe();
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match next_signal().await {
                Ok(HostSignal::Reload) => {
                    if reload_tx.send(()).is_err() {
                        break;
                    }
                }
                Ok(HostSignal::Shutdown) => {
                    tracing::info!("Shutdown signal received");
                    shutdown.trigger();
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for signals");
                    shutdown.trigger();
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            Some(tree) = updates.recv() => apply(reconciler, tree),
            Some(()) = reload_rx.recv() => match load_config(config_path) {
                Ok(tree) => apply(reconciler, tree),
                Err(e) => tracing::error!(error = %e, "Failed to reload config. Keeping current configuration."),
            },
            _ = shutdown_rx.recv() => break,
        }
    }
    Ok(())
}

fn apply(reconciler: &mut Reconciler, tree: ConfigTree) {
    let previous = reconciler.configuration().clone();
    reconciler.update_configuration(tree);

    match reconciler.reload() {
        Ok(plan) if plan.is_empty() => tracing::debug!("Configuration reloaded, endpoints unchanged"),
        Ok(plan) => tracing::info!(
            started = plan.started.len(),
            stopped = plan.stopped.len(),
            "Configuration reloaded"
        ),
        Err(e) => {
            tracing::error!(error = %e, "Reload failed, keeping current endpoints");
            reconciler.update_configuration(previous);
        }
    }
}
