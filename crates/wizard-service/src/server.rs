//! HTTP server for the order wizard API.
//!
//! Serves the step graph of each configured service and the remote draft
//! store under the `/api` base path.

use axum::{
	extract::{DefaultBodyLimit, Path, Query, State},
	http::{HeaderName, HeaderValue, Method, StatusCode},
	response::Json,
	routing::{get, post},
	Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use wizard_config::{ApiConfig, CorsConfig};
use wizard_core::WizardEngine;
use wizard_types::{
	APIError, CreateDraftRequest, DraftRecord, StepSummary, StepsQuery, UpdateDraftRequest,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the wizard engine for processing requests.
	pub engine: Arc<WizardEngine>,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<WizardEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(&api_config, AppState { engine });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order wizard API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Builds the router with the `/api` base path and its middleware.
pub fn build_router(api_config: &ApiConfig, state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/services/{id}/steps", get(handle_get_steps))
				.route("/drafts", post(handle_create_draft))
				.route(
					"/drafts/{code}",
					get(handle_get_draft).put(handle_update_draft),
				)
				.route("/drafts/{code}/submit", post(handle_submit_draft)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Builds the CORS layer; without configuration every origin is allowed.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let layer = if cors.allowed_origins.iter().any(|origin| origin == "*") {
		CorsLayer::new().allow_origin(Any)
	} else {
		let origins: Vec<HeaderValue> = cors
			.allowed_origins
			.iter()
			.filter_map(|origin| origin.parse().ok())
			.collect();
		CorsLayer::new().allow_origin(origins)
	};

	let methods: Vec<Method> = cors
		.allowed_methods
		.iter()
		.filter_map(|method| method.parse().ok())
		.collect();
	let headers: Vec<HeaderName> = cors
		.allowed_headers
		.iter()
		.filter_map(|header| header.parse().ok())
		.collect();
	layer.allow_methods(methods).allow_headers(headers)
}

/// Handles GET /api/services/{id}/steps requests.
async fn handle_get_steps(
	Path(service_id): Path<String>,
	Query(query): Query<StepsQuery>,
	State(state): State<AppState>,
) -> Result<Json<Vec<StepSummary>>, APIError> {
	match crate::apis::steps::get_steps(&state.engine, &service_id, query) {
		Ok(steps) => Ok(Json(steps)),
		Err(e) => {
			tracing::warn!("Step graph request failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles POST /api/drafts requests.
async fn handle_create_draft(
	State(state): State<AppState>,
	Json(request): Json<CreateDraftRequest>,
) -> Result<(StatusCode, Json<DraftRecord>), APIError> {
	match crate::apis::drafts::create_draft(&state.engine, request).await {
		Ok(record) => Ok((StatusCode::CREATED, Json(record))),
		Err(e) => {
			tracing::warn!("Draft creation failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/drafts/{code} requests.
async fn handle_get_draft(
	Path(code): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<DraftRecord>, APIError> {
	match crate::apis::drafts::get_draft(&state.engine, &code).await {
		Ok(record) => Ok(Json(record)),
		Err(e) => {
			tracing::warn!("Draft retrieval failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles PUT /api/drafts/{code} requests.
async fn handle_update_draft(
	Path(code): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<UpdateDraftRequest>,
) -> Result<Json<DraftRecord>, APIError> {
	match crate::apis::drafts::update_draft(&state.engine, &code, request).await {
		Ok(record) => Ok(Json(record)),
		Err(e) => {
			tracing::warn!("Draft update failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles POST /api/drafts/{code}/submit requests.
async fn handle_submit_draft(
	Path(code): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<DraftRecord>, APIError> {
	match crate::apis::drafts::submit_draft(&state.engine, &code).await {
		Ok(record) => Ok(Json(record)),
		Err(e) => {
			tracing::warn!("Draft submission failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::Request;
	use tower::ServiceExt;
	use wizard_config::builders::ConfigBuilder;
	use wizard_types::{DraftStatus, ErrorResponse, ModuleToggle, ServiceVerificationConfig, StepId};

	fn api_config() -> ApiConfig {
		ApiConfig {
			enabled: true,
			host: "127.0.0.1".to_string(),
			port: 0,
			timeout_seconds: 30,
			max_request_size: 1024 * 1024,
			cors: None,
		}
	}

	fn router() -> Router {
		let config = ConfigBuilder::new()
			.service(
				"company-registration",
				ServiceVerificationConfig {
					personal_kyc: ModuleToggle::enabled(),
					company_kyc: ModuleToggle::enabled(),
					client_type_selection: true,
					..Default::default()
				},
			)
			.build();
		let engine = crate::factory_registry::build_engine_from_config(config).unwrap();
		build_router(
			&api_config(),
			AppState {
				engine: Arc::new(engine),
			},
		)
	}

	async fn send(
		router: &Router,
		method: &str,
		uri: &str,
		body: Option<serde_json::Value>,
	) -> (StatusCode, Vec<u8>) {
		let request = Request::builder().method(method).uri(uri);
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => request.body(Body::empty()).unwrap(),
		};
		let response = router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, bytes.to_vec())
	}

	#[tokio::test]
	async fn test_get_steps_for_company() {
		let router = router();
		let (status, body) = send(
			&router,
			"GET",
			"/api/services/company-registration/steps?client_type=PJ",
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		let steps: Vec<StepSummary> = serde_json::from_slice(&body).unwrap();
		assert!(steps.iter().any(|s| s.id == StepId::CompanyData));
	}

	#[tokio::test]
	async fn test_get_steps_unknown_service() {
		let (status, body) = send(&router(), "GET", "/api/services/missing/steps", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
		assert_eq!(error.error, "SERVICE_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_draft_lifecycle() {
		let router = router();

		let (status, body) = send(
			&router,
			"POST",
			"/api/drafts",
			Some(serde_json::json!({ "serviceId": "company-registration" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		let created: DraftRecord = serde_json::from_slice(&body).unwrap();
		let uri = format!("/api/drafts/{}", created.code);

		let (status, body) = send(&router, "GET", &uri, None).await;
		assert_eq!(status, StatusCode::OK);
		let loaded: DraftRecord = serde_json::from_slice(&body).unwrap();
		assert_eq!(loaded.code, created.code);

		let mut state = loaded.state.clone();
		state.current_step_id = StepId::ClientType;
		state.revision = 2;
		let (status, body) = send(
			&router,
			"PUT",
			&uri,
			Some(serde_json::json!({ "state": state, "revision": 2 })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		let updated: DraftRecord = serde_json::from_slice(&body).unwrap();
		assert_eq!(updated.revision, 2);
		assert_eq!(updated.state.current_step_id, StepId::ClientType);

		let submit_uri = format!("{}/submit", uri);
		let (status, body) = send(&router, "POST", &submit_uri, None).await;
		assert_eq!(status, StatusCode::OK);
		let submitted: DraftRecord = serde_json::from_slice(&body).unwrap();
		assert_eq!(submitted.status, DraftStatus::Submitted);

		let (status, _) = send(&router, "POST", &submit_uri, None).await;
		assert_eq!(status, StatusCode::CONFLICT);

		let (status, body) = send(
			&router,
			"PUT",
			&uri,
			Some(serde_json::json!({ "state": state, "revision": 3 })),
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
		let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
		assert_eq!(error.error, "DRAFT_NOT_EDITABLE");
	}

	#[tokio::test]
	async fn test_malformed_and_missing_codes() {
		let router = router();
		let (status, _) = send(&router, "GET", "/api/drafts/garbage", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, body) = send(&router, "GET", "/api/drafts/ORD-20250101-ABC123", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
		assert_eq!(error.error, "DRAFT_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_create_for_unknown_service() {
		let (status, _) = send(
			&router(),
			"POST",
			"/api/drafts",
			Some(serde_json::json!({ "serviceId": "missing" })),
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[test]
	fn test_cors_layer_from_config() {
		let cors = CorsConfig {
			allowed_origins: vec!["https://wizard.example".to_string()],
			allowed_headers: vec!["content-type".to_string()],
			allowed_methods: vec!["GET".to_string(), "PUT".to_string()],
		};
		// Building must not panic on a valid configuration.
		let _ = cors_layer(Some(&cors));
		let _ = cors_layer(None);
	}
}
