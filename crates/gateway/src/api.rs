//! REST endpoints.
//!
//! - `GET  /`             liveness banner
//! - `GET  /test`         smoke-test endpoint
//! - `GET  /health`       status and version
//! - `GET|POST /create-wallet`  provision a wallet
//! - `GET  /npc-config`   the active persona
//! - `POST /npc-config`   create a persona with its own wallet
//!
//! Failures come back as `{"detail": "..."}` with a matching status code.

use crate::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use npcrelay_core::persona::{NpcPersona, NpcRecord, WalletInfo};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/test", get(test_handler))
        .route("/health", get(health_handler))
        .route("/create-wallet", get(create_wallet_handler).post(create_wallet_handler))
        .route("/npc-config", get(get_npc_handler).post(save_npc_handler))
}

/// An HTTP failure with a `detail` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn unprocessable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "API is running" }))
}

async fn test_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "Test endpoint working" }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.registry.len(),
    })
}

#[derive(Debug, Serialize)]
struct CreateWalletResponse {
    status: &'static str,
    wallet_address: String,
    wallet_id: String,
}

async fn create_wallet_handler(
    State(state): State<SharedState>,
) -> Result<Json<CreateWalletResponse>, ApiError> {
    info!(provisioner = state.provisioner.name(), "Wallet creation requested");
    let wallet = state.provisioner.create_wallet().await.map_err(|e| {
        error!(error = %e, "Wallet creation failed");
        ApiError::internal(format!("Failed to create wallet: {e}"))
    })?;

    Ok(Json(CreateWalletResponse {
        status: "success",
        wallet_address: wallet.wallet_address,
        wallet_id: wallet.wallet_id,
    }))
}

#[derive(Debug, Serialize)]
struct SaveNpcResponse {
    status: &'static str,
    message: &'static str,
    npc: NpcRecord,
    wallet: WalletInfo,
}

async fn save_npc_handler(
    State(state): State<SharedState>,
    Json(persona): Json<NpcPersona>,
) -> Result<Json<SaveNpcResponse>, ApiError> {
    persona
        .validate()
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;

    let provisioned = state.provisioner.create_wallet().await.map_err(|e| {
        error!(npc = %persona.name, error = %e, "Wallet creation failed");
        ApiError::internal(format!("Failed to create wallet: {e}"))
    })?;

    let mut wallet = WalletInfo::from(provisioned);
    wallet.network = state.config.wallet.network.clone();

    let record = NpcRecord::new(persona, wallet);
    let saved = state.personas.save(record).await.map_err(|e| {
        error!(error = %e, store = state.personas.name(), "Persona save failed");
        ApiError::internal(format!("Failed to save NPC: {e}"))
    })?;

    let context = state
        .current_context()
        .await
        .reframed(Some(&saved.persona));
    state.install_context(context).await;
    info!(
        npc = %saved.persona.name,
        wallet = %saved.wallet.wallet_address,
        "Persona installed for new sessions"
    );

    let wallet = saved.wallet.clone();
    Ok(Json(SaveNpcResponse {
        status: "success",
        message: "NPC created successfully",
        npc: saved,
        wallet,
    }))
}

async fn get_npc_handler(State(state): State<SharedState>) -> Result<Json<NpcRecord>, ApiError> {
    match state.personas.load_active().await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(ApiError::not_found("No NPC configured")),
        Err(e) => Err(ApiError::internal(format!("Failed to load NPC: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenProvisioner, NullSink, fixture, fixture_with};
    use npcrelay_agent::TurnInput;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn persona_body() -> serde_json::Value {
        json!({
            "name": "Captain Byte",
            "background": "A retired smuggler turned market maker.",
            "appearance": "Weathered coat, brass goggles",
            "personality": { "riskTolerance": 80, "rationality": 60, "autonomy": 90 },
            "core_values": ["loyalty", "profit"],
            "primary_aims": ["grow the treasury"],
            "voice": { "type": "gruff" }
        })
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn root_and_test_banners() {
        let fx = fixture();

        let response = crate::build_router(fx.state.clone()).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"message": "API is running"}));

        let response = crate::build_router(fx.state).oneshot(get("/test")).await.unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"message": "Test endpoint working"})
        );
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = crate::build_router(fixture().state);
        let json = body_json(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn create_wallet_get_and_post() {
        let fx = fixture();

        let response = crate::build_router(fx.state.clone())
            .oneshot(get("/create-wallet"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let first = body_json(response).await;
        assert_eq!(first["status"], "success");
        assert!(first["wallet_address"].as_str().unwrap().starts_with("0x"));

        let response = crate::build_router(fx.state)
            .oneshot(post_json("/create-wallet", &json!({})))
            .await
            .unwrap();
        let second = body_json(response).await;
        assert_ne!(first["wallet_id"], second["wallet_id"]);
    }

    #[tokio::test]
    async fn create_wallet_failure_is_500_with_detail() {
        let fx = fixture_with(Arc::new(BrokenProvisioner));
        let response = crate::build_router(fx.state)
            .oneshot(get("/create-wallet"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(
            json["detail"]
                .as_str()
                .unwrap()
                .starts_with("Failed to create wallet:")
        );
    }

    #[tokio::test]
    async fn npc_config_creates_persona_and_reframes_new_sessions() {
        let fx = fixture();
        let state = fx.state.clone();
        let old_session = state.registry.create_session(state.current_context().await);

        let response = crate::build_router(state.clone())
            .oneshot(post_json("/npc-config", &persona_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "NPC created successfully");
        assert_eq!(json["npc"]["name"], "Captain Byte");
        assert_eq!(json["wallet"]["status"], "active");
        assert_eq!(json["wallet"]["balance"], "0");
        assert_eq!(json["wallet"]["network"], "base-sepolia");
        let address = json["wallet"]["wallet_address"].as_str().unwrap();
        assert!(json["npc"]["avatar"].as_str().unwrap().ends_with(address));

        let new_session = state.registry.create_session(state.current_context().await);
        assert!(new_session.context().system_prompt.contains("Captain Byte"));
        assert!(!old_session.context().system_prompt.contains("Captain Byte"));

        // The framing reaches the provider on the new session's turns only.
        let sink = Arc::new(NullSink);
        state
            .scheduler
            .run_turn(new_session.id(), TurnInput::User("hi".into()), sink.clone())
            .await
            .unwrap();
        assert!(fx.provider.last_system().unwrap().contains("- Name: Captain Byte"));
        state
            .scheduler
            .run_turn(old_session.id(), TurnInput::User("hi".into()), sink)
            .await
            .unwrap();
        assert!(!fx.provider.last_system().unwrap().contains("Captain Byte"));

        let response = crate::build_router(state).oneshot(get("/npc-config")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], "Captain Byte");
    }

    #[tokio::test]
    async fn npc_config_rejected_when_wallet_fails() {
        let fx = fixture_with(Arc::new(BrokenProvisioner));
        let state = fx.state.clone();
        let before = state.current_context().await;

        let response = crate::build_router(state.clone())
            .oneshot(post_json("/npc-config", &persona_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body_json(response).await["detail"]
                .as_str()
                .unwrap()
                .contains("CDP API Key Name")
        );

        // Nothing persisted, nothing installed.
        assert!(Arc::ptr_eq(&before, &state.current_context().await));
        let response = crate::build_router(state).oneshot(get("/npc-config")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn npc_config_validates_traits() {
        let mut body = persona_body();
        body["personality"]["autonomy"] = json!(150);
        let response = crate::build_router(fixture().state)
            .oneshot(post_json("/npc-config", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn npc_config_get_without_persona_is_404() {
        let response = crate::build_router(fixture().state)
            .oneshot(get("/npc-config"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
