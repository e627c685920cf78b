use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use frequency_control::config::ControlConfig;
use frequency_control::gate::{Admission, AdmissionGate, Interceptor, OperationRegistry};
use frequency_control::ratelimit::{FixedWindow, InMemoryBackend};

#[derive(Debug, Parser)]
#[command(name = "frequency-control", version, about = "Per-operation request quotas")]
struct Cli {
    /// Path to a YAML configuration file (FREQCTL_* variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate the configuration, then print a summary
    Validate,
    /// Drive the admission gate with synthetic calls against one route
    Simulate {
        /// Route of the guarded operation
        #[arg(long)]
        route: String,
        /// Caller identity, typically an IP address
        #[arg(long, default_value = "127.0.0.1")]
        identity: String,
        /// Number of calls to issue
        #[arg(long, default_value_t = 10)]
        calls: u64,
        /// Pause between calls in milliseconds
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ControlConfig::load(cli.config.as_deref())?;
    info!(
        enabled = config.enabled,
        operations = config.operations.len(),
        "Configuration loaded"
    );

    match cli.command {
        Command::Validate => validate(&config),
        Command::Simulate {
            route,
            identity,
            calls,
            interval_ms,
        } => {
            tokio::select! {
                result = simulate(&config, &route, &identity, calls, interval_ms) => result,
                _ = shutdown_signal() => Ok(()),
            }
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn validate(config: &ControlConfig) -> anyhow::Result<()> {
    let defaults = config.rule_defaults()?;
    println!("enabled:        {}", defaults.enabled());
    println!(
        "defaults:       {} per {}{} (prefix {:?})",
        defaults.max_count(),
        defaults.window_length(),
        defaults.time_unit(),
        defaults.prefix()
    );
    println!("failure policy: {:?}", config.backend.failure_policy);
    println!("operations:     {}", config.operations.len());
    for op in &config.operations {
        println!("  {}", op.route);
    }
    Ok(())
}

async fn simulate(
    config: &ControlConfig,
    route: &str,
    identity: &str,
    calls: u64,
    interval_ms: u64,
) -> anyhow::Result<()> {
    let defaults = Arc::new(config.rule_defaults()?);
    let backend = Arc::new(InMemoryBackend::new());
    let sweeper = backend.spawn_sweeper(config.backend.sweep_interval());

    let strategy = Arc::new(FixedWindow::new(Arc::clone(&backend)));
    let gate = AdmissionGate::new(defaults, strategy)
        .with_failure_policy(config.backend.failure_policy);

    let mut registry = OperationRegistry::from_config(config);
    if !registry.is_guarded(route) {
        info!(route = %route, "Route not configured, guarding it with defaults");
        registry.register(route, Default::default());
    }
    let interceptor = Interceptor::new(Arc::new(gate), Arc::new(registry));

    let (mut admitted, mut rejected) = (0u64, 0u64);
    for call in 1..=calls {
        match interceptor.check(route, identity).await {
            Ok(Admission::Admitted { remaining, .. }) => {
                admitted += 1;
                println!("call {call}: admitted ({remaining} remaining)");
            }
            Ok(other) => {
                admitted += 1;
                println!("call {call}: admitted ({other:?})");
            }
            Err(rejection) => {
                rejected += 1;
                println!("call {call}: rejected {}", rejection.to_json());
            }
        }
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    println!("admitted: {admitted}, rejected: {rejected}");
    sweeper.abort();
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping simulation");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping simulation");
        }
    }
}
