//! HTTP gateway for Nippo.
//!
//! A thin transport over [`ReportWorkflow`]:
//! - `POST /generate` runs one report request
//! - `GET /health` reports liveness and version
//!
//! Built on Axum. There is no authentication and nothing is persisted.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use nippo_core::report::{ReportRequest, ReportResponse};
use nippo_pipeline::ReportWorkflow;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub workflow: ReportWorkflow,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/generate", post(generate_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: nippo_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let workflow = ReportWorkflow::from_config(&config)?;
    let state = Arc::new(GatewayState { workflow });
    let app = build_router(state);

    info!(
        addr = %addr,
        model = %config.default_model,
        credential = config.has_api_key(),
        github = config.github.token.is_some(),
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn generate_handler(
    State(state): State<SharedState>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        date = %request.date,
        model = %request.model,
        values = request.values.len(),
        tools = ?request.tools,
        "Report request received"
    );

    match state.workflow.run(&request).await {
        Ok(outcome) => Ok(Json(outcome.into_response(&request))),
        Err(e) => {
            error!(error = %e, "Report generation failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string() }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use nippo_agent::AgentRegistry;
    use nippo_core::error::ProviderError;
    use nippo_core::generation::Generator;
    use nippo_core::tool::{Tool, ToolRegistry, ToolSource};
    use nippo_pipeline::{Collector, Formatter};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    struct NoTools;

    #[async_trait]
    impl ToolSource for NoTools {
        async fn list_tools(&self) -> BTreeMap<String, Arc<dyn Tool>> {
            BTreeMap::new()
        }
    }

    fn unconfigured_agents() -> AgentRegistry {
        AgentRegistry::new(Arc::new(
            |model: &str, _tools: ToolRegistry| -> Result<Arc<dyn Generator>, ProviderError> {
                Err(ProviderError::NotConfigured(model.to_string()))
            },
        ))
    }

    fn test_state(credential: bool) -> SharedState {
        let collector = Collector::new(Arc::new(NoTools), unconfigured_agents(), credential);
        let formatter = Formatter::new(unconfigured_agents(), credential);
        Arc::new(GatewayState {
            workflow: ReportWorkflow::new(collector, formatter),
        })
    }

    fn generate_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(false));

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn generate_without_credential_uses_template() {
        let app = build_router(test_state(false));

        let response = app
            .oneshot(generate_request(serde_json::json!({
                "date": "2024-01-01",
                "template": "# {{date}}",
                "values": ["fix login"],
                "tools": ["github"],
                "model": "google/gemini-2.5-flash-lite"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["output"], "# 2024-01-01");
        assert_eq!(json["meta"]["model"], "google/gemini-2.5-flash-lite");
        assert_eq!(json["meta"]["tools"], serde_json::json!(["github"]));
    }

    #[tokio::test]
    async fn pipeline_failure_maps_to_500() {
        let app = build_router(test_state(true));

        let response = app
            .oneshot(generate_request(serde_json::json!({
                "date": "2024-01-01",
                "template": "# {{date}}",
                "values": [],
                "tools": [],
                "model": "unknown/model"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("unknown/model"));
    }

    #[tokio::test]
    async fn malformed_request_is_rejected() {
        let app = build_router(test_state(false));

        let response = app
            .oneshot(generate_request(serde_json::json!({"date": "2024-01-01"})))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
