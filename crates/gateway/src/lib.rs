//! HTTP and WebSocket gateway for npcrelay.
//!
//! Exposes the `/ws` conversation socket plus the small REST surface used
//! by the NPC creation UI: health checks, wallet provisioning and the
//! persona endpoint.
//!
//! Built on Axum. Every connection gets its own session; the agent context
//! new sessions start from lives behind a lock so a persona update takes
//! effect for the next connection without touching running ones.

pub mod api;
pub mod ws;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use npcrelay_agent::{AgentContext, SessionRegistry, TurnScheduler};
use npcrelay_config::AppConfig;
use npcrelay_core::persona::PersonaStore;
use npcrelay_core::wallet::WalletProvisioner;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<SessionRegistry>,
    pub scheduler: Arc<TurnScheduler>,
    pub provisioner: Arc<dyn WalletProvisioner>,
    pub personas: Arc<dyn PersonaStore>,
    context: RwLock<Arc<AgentContext>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: AppConfig,
        context: AgentContext,
        provisioner: Arc<dyn WalletProvisioner>,
        personas: Arc<dyn PersonaStore>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let scheduler = Arc::new(TurnScheduler::new(
            registry.clone(),
            config.autonomous.prompt.clone(),
        ));
        Self {
            config,
            registry,
            scheduler,
            provisioner,
            personas,
            context: RwLock::new(Arc::new(context)),
        }
    }

    /// The context the next session will snapshot.
    pub async fn current_context(&self) -> Arc<AgentContext> {
        self.context.read().await.clone()
    }

    /// Replace the context for sessions opened from now on.
    pub async fn install_context(&self, context: AgentContext) {
        *self.context.write().await = Arc::new(context);
    }
}

/// Wire up provider, wallet, tools and persona store from configuration.
pub async fn build_state(config: AppConfig) -> Result<SharedState, Box<dyn std::error::Error>> {
    let provider = npcrelay_providers::build_from_config(&config.provider)?;
    let wallets = npcrelay_tools::build_wallets(&config.wallet).await?;
    let tools = Arc::new(npcrelay_tools::default_registry(wallets.backend.clone()));
    let personas = npcrelay_store::build_store(&config.persona).await?;

    let active = match personas.load_active().await {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "Could not load the active persona; using the default framing");
            None
        }
    };
    if let Some(record) = &active {
        info!(npc = %record.persona.name, "Framing sessions with stored persona");
    }

    let context = AgentContext::from_config(
        &config,
        provider,
        tools,
        active.as_ref().map(|r| &r.persona),
    );
    Ok(Arc::new(AppState::new(
        config,
        context,
        wallets.provisioner,
        personas,
    )))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.allowed_origins);

    Router::new()
        .merge(api::routes())
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway and serve until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(config).await?;
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
