//! HTTP server wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use ltigate_core::{
    CodeExecutor, GradePassbackClient, GradeQueue, KeySetCache, LaunchOrchestrator, LoginInitiator,
    LtiConfig, TokenExchangeClient,
};
use ltigate_telemetry::MetricsRegistry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;

use crate::api::{create_router, AppState};
use crate::judge0::Judge0Executor;

/// Server configuration.
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub lti: LtiConfig,
    pub judge0_url: String,
    pub judge0_auth_token: Option<String>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Build every component from `lti` and start the grade worker.
///
/// All outbound calls share `http`. Must run inside a Tokio runtime.
pub fn build_state(
    lti: LtiConfig,
    http: reqwest::Client,
    executor: Option<Arc<dyn CodeExecutor>>,
    metrics: Arc<MetricsRegistry>,
) -> (AppState, JoinHandle<()>) {
    let keys = Arc::new(
        KeySetCache::new(http.clone(), &lti.keyset).with_metrics(Arc::clone(&metrics)),
    );
    let exchange = Arc::new(
        TokenExchangeClient::new(http.clone(), &lti).with_metrics(Arc::clone(&metrics)),
    );
    let passback = Arc::new(
        GradePassbackClient::new(http, exchange).with_metrics(Arc::clone(&metrics)),
    );

    // The passback client records outcomes and the worker logs failures,
    // so no observer is attached here.
    let (grades, worker) =
        GradeQueue::spawn(Arc::clone(&passback), lti.grading.queue_capacity, None);

    let mut orchestrator = LaunchOrchestrator::new(&lti, keys)
        .with_grade_queue(grades)
        .with_metrics(Arc::clone(&metrics));
    if let Some(executor) = executor {
        orchestrator = orchestrator.with_executor(executor);
    }

    let state = AppState {
        login: Arc::new(LoginInitiator::new(&lti)),
        orchestrator: Arc::new(orchestrator),
        passback,
        metrics,
        config: Arc::new(lti),
    };
    (state, worker)
}

/// Run the tool server until Ctrl+C or SIGTERM.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let http = ltigate_core::http_client(&config.lti.http)
        .context("failed to build HTTP client")?;
    let executor: Arc<dyn CodeExecutor> = Arc::new(Judge0Executor::new(
        http.clone(),
        &config.judge0_url,
        config.judge0_auth_token,
    ));

    let (state, worker) = build_state(config.lti, http, Some(executor), config.metrics);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    ltigate_telemetry::log_listening!(addr = %config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Dropping the router closed the queue; let queued grades drain.
    if let Err(e) = worker.await {
        tracing::warn!(error = %e, "grade worker ended abnormally");
    }
    tracing::info!("ltigate stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
