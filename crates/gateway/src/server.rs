use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::State,
        response::Json,
        routing::{get, post},
    },
    sesh_sessions::{RegistryConfig, RegistryHandle},
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use crate::{
    sessions::{close_session, create_session, list_sessions, method_not_allowed, write_session},
    state::GatewayState,
};

/// Everything needed to start the gateway.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub bind: String,
    pub port: u16,
    /// Directory session log files are rooted under.
    pub log_dir: PathBuf,
    /// Bound on each registry call made by a handler.
    pub request_timeout: Duration,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/create-session",
            post(create_session).fallback(method_not_allowed),
        )
        .route(
            "/list-sessions",
            get(list_sessions).fallback(method_not_allowed),
        )
        .route(
            "/close-session",
            post(close_session).fallback(method_not_allowed),
        )
        .route(
            "/write-session",
            post(write_session).fallback(method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Prepare the log directory, bind, and serve until SIGINT/SIGTERM.
///
/// Any error here is a startup failure and should end the process.
pub async fn start_gateway(opts: GatewayOptions) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&opts.log_dir)
        .await
        .with_context(|| format!("failed to create log dir {}", opts.log_dir.display()))?;

    let listener = TcpListener::bind((opts.bind.as_str(), opts.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", opts.bind, opts.port))?;
    let addr = listener.local_addr()?;

    // Startup banner.
    let lines = [
        format!("sesh gateway v{}", env!("CARGO_PKG_VERSION")),
        format!("listening on {addr}"),
        format!("log dir: {}", opts.log_dir.display()),
        format!("registry timeout: {:?}", opts.request_timeout),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    let registry = RegistryConfig::new(opts.log_dir).with_request_timeout(opts.request_timeout);
    serve(listener, registry, shutdown_signal()).await
}

/// Run the gateway on an already-bound listener until `shutdown` resolves.
///
/// The registry worker is started here and stopped only after in-flight
/// requests have drained.
pub async fn serve(
    listener: TcpListener,
    registry: RegistryConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let registry_shutdown = CancellationToken::new();
    let (handle, worker) = RegistryHandle::spawn(registry, registry_shutdown.clone());
    let app = build_gateway_app(GatewayState::new(handle));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    registry_shutdown.cancel();
    if let Err(e) = worker.await {
        warn!(error = %e, "session registry task failed");
    }
    served.context("server error")?;
    info!("gateway stopped");
    Ok(())
}

// ── Graceful shutdown ────────────────────────────────────────────────────────

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
    }))
}
