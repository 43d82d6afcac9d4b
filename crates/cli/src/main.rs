use std::{path::PathBuf, time::Duration};

use {
    anyhow::Context,
    clap::Parser,
    sesh_config::SeshConfig,
    sesh_gateway::server::GatewayOptions,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "sesh", about = "sesh: short-lived, file-backed sessions over HTTP")]
struct Cli {
    /// Directory to put all session log files in [default: working directory].
    #[arg(long, env = "SESH_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Address to bind [default: from config, else 0.0.0.0].
    #[arg(long, env = "SESH_BIND")]
    bind: Option<String>,

    /// Port to listen on [default: from config, else 8080].
    #[arg(long, env = "SESH_PORT")]
    port: Option<u16>,

    /// Only look for sesh.{toml,yaml,json} in this directory.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Merge flags over the config file. A relative log dir is taken relative
/// to `cwd`, which is also the fallback when none is configured.
fn resolve_options(cli: Cli, config: SeshConfig, cwd: PathBuf) -> GatewayOptions {
    let log_dir = match cli.log_dir.or(config.sessions.log_dir) {
        Some(dir) if dir.is_relative() => cwd.join(dir),
        Some(dir) => dir,
        None => cwd,
    };
    GatewayOptions {
        bind: cli.bind.unwrap_or(config.server.bind),
        port: cli.port.unwrap_or(config.server.port),
        log_dir,
        request_timeout: Duration::from_millis(config.sessions.request_timeout_ms),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "sesh starting");

    if let Some(dir) = &cli.config_dir {
        sesh_config::set_config_dir(dir.clone());
    }
    let config = sesh_config::discover_and_load();
    let cwd = std::env::current_dir().context("cannot determine working directory")?;

    sesh_gateway::server::start_gateway(resolve_options(cli, config, cwd)).await
}
