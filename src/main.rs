//! Callflow server binary.
//!
//! Wires the configured adapters to the orchestrator and serves the REST
//! surface and the WebSocket observer endpoint on their own ports.

use std::future::IntoFuture;
use std::sync::Arc;

use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callflow::adapters::classifier::{PatternClassifier, RemoteClassifier};
use callflow::adapters::http::{api_routes, AppState};
use callflow::adapters::memory::{InMemoryFlowRepository, InMemorySessionStore};
use callflow::adapters::redis::RedisSessionStore;
use callflow::adapters::websocket::{ws_routes, ObserverHub, WebSocketState};
use callflow::application::demo::register_demo_tools;
use callflow::application::orchestrator::{Orchestrator, ToolRegistry};
use callflow::config::AppConfig;
use callflow::ports::{IntentClassifier, SessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Session store: Redis in normal operation, in-memory when Redis is
    // unreachable at startup (single-process development mode).
    let store: Arc<dyn SessionStore> = match RedisSessionStore::connect(&config.redis.url).await {
        Ok(store) => {
            tracing::info!(url = %config.redis.url, "Connected to Redis session store");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                url = %config.redis.url,
                error = %e,
                "Redis unavailable; falling back to the in-memory session store"
            );
            Arc::new(InMemorySessionStore::new())
        }
    };

    let classifier: Arc<dyn IntentClassifier> = match &config.classifier.api_url {
        Some(api_url) => {
            tracing::info!(%api_url, "Using remote classifier with pattern fallback");
            Arc::new(RemoteClassifier::new(
                api_url.clone(),
                config.classifier.api_key.clone(),
            ))
        }
        None => {
            tracing::info!("Using deterministic pattern classifier");
            Arc::new(PatternClassifier::new())
        }
    };

    let tools = Arc::new(ToolRegistry::new());
    register_demo_tools(&tools);
    tracing::info!(tools = ?tools.names(), "Tool registry ready");

    if config.flows.database_url.is_some() {
        tracing::warn!("Relational flow store is not wired in this build; flows are kept in memory");
    }
    let flows = Arc::new(InMemoryFlowRepository::new());

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        classifier,
        Arc::clone(&tools),
    ));
    let hub = Arc::new(ObserverHub::new(Arc::clone(&store)));

    let cors = if config.server.is_production() {
        let origins: Vec<_> = config
            .server
            .cors_origins_list()
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api = api_routes(AppState::new(Arc::clone(&orchestrator), flows)).layer(cors);
    let ws = ws_routes(WebSocketState::new(hub, orchestrator));

    let api_addr = config.server.socket_addr();
    let ws_addr = config.server.ws_socket_addr();

    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    let ws_listener = tokio::net::TcpListener::bind(ws_addr).await?;
    tracing::info!(%api_addr, %ws_addr, "Callflow server listening");

    tokio::try_join!(
        axum::serve(api_listener, api).into_future(),
        axum::serve(ws_listener, ws).into_future(),
    )?;

    Ok(())
}
