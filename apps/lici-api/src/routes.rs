use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use lici_service::{Error as ServiceError, SearchRequest, SearchResponse, export};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.route("/v1/search/export", post(search_export))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/refresh_categories", post(refresh_categories))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(&payload).await?;

	Ok(Json(response))
}

async fn search_export(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Response, ApiError> {
	let response = state.service.search(&payload).await?;
	let csv = export::to_csv(&response.results);

	Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
	categories: usize,
}

async fn refresh_categories(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ApiError> {
	if let Some(expected) = &state.service.cfg.security.admin_auth_token {
		let supplied = headers
			.get(header::AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.strip_prefix("Bearer "));

		if supplied != Some(expected.as_str()) {
			return Err(ApiError::new(
				StatusCode::UNAUTHORIZED,
				"unauthorized",
				"Admin auth token is missing or wrong.",
			));
		}
	}

	let categories = state.service.refresh_categories().await?;

	Ok(Json(RefreshResponse { categories }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::Embedding { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "embedding_failed", message),
			ServiceError::Provider { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "provider_error", message),
			ServiceError::Storage { .. } =>
				Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message),
			ServiceError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
