//! HTTP server assembly for triaged.

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::classify::{ChatBackend, Orchestrator};
use crate::config::TriagedConfig;
use crate::events::EventBus;
use crate::intent::IntentCache;
use crate::queue::{JobQueue, QueueClient};
use crate::routes;
use crate::sweeper;
use crate::ticketing::CaseStore;

/// Application state shared across handlers. Per-request pipeline stages
/// share nothing mutable except the intent cache and the sweep lock.
pub struct AppState {
    pub config: TriagedConfig,
    pub store: Arc<dyn CaseStore>,
    pub orchestrator: Orchestrator,
    pub queue: Option<Arc<dyn JobQueue>>,
    pub intent_cache: IntentCache,
    pub events: EventBus,
    /// Single active sweep: concurrent trigger requests are rejected.
    pub sweep_lock: tokio::sync::Mutex<()>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: TriagedConfig,
        store: Arc<dyn CaseStore>,
        backend: Arc<dyn ChatBackend>,
    ) -> Result<Self> {
        let queue = match (
            config.dispatch.async_enabled,
            config.dispatch.queue_endpoint.as_deref(),
            config.dispatch.queue_secret.as_deref(),
        ) {
            (true, Some(endpoint), Some(secret)) => {
                Some(Arc::new(QueueClient::new(endpoint, secret)?) as Arc<dyn JobQueue>)
            }
            (true, _, _) => {
                warn!("async dispatch enabled but queue endpoint/secret missing, processing inline");
                None
            }
            _ => None,
        };

        Ok(Self {
            config,
            store,
            orchestrator: Orchestrator::new(backend),
            queue,
            intent_cache: IntentCache::new(),
            events: EventBus::default(),
            sweep_lock: tokio::sync::Mutex::new(()),
            start_time: Instant::now(),
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::webhook_routes())
        .merge(routes::worker_routes())
        .merge(routes::sweep_routes())
        .merge(routes::conversation_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server, plus the interval sweep when configured.
pub async fn run(state: AppState) -> Result<()> {
    let state = Arc::new(state);

    if let Some(hours) = state.config.sweeper.interval_hours {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let period = std::time::Duration::from_secs(hours * 3600);
            loop {
                tokio::time::sleep(period).await;
                // The lock also guards against overlap with a manual
                // trigger.
                let _guard = sweep_state.sweep_lock.lock().await;
                let summary =
                    sweeper::sweep(sweep_state.store.as_ref(), &sweep_state.config.sweeper.groups)
                        .await;
                info!(
                    "scheduled sweep: {} stale, {} follow-ups, {} errors",
                    summary.total_stale,
                    summary.followups_posted,
                    summary.errors.len()
                );
            }
        });
    }

    let addr = state.config.server.bind_addr.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
