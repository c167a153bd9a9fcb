use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use annal_service::{
	AnalysisRequest, AnalysisResponse, Error, ExpandRequest, KeywordExpansion, PublicConfig,
	RetrievalRequest, RetrievalResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/config", get(public_config))
		.route("/v1/search/standard", post(search_standard))
		.route("/v1/search/llm-assisted", post(search_llm_assisted))
		.route("/v1/search/analyze", post(analyze))
		.route("/v1/keywords/expand", post(expand_keywords))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn public_config(State(state): State<AppState>) -> Json<PublicConfig> {
	Json(state.service.public_config())
}

/// Vector search over the whole range or, with `use_time_intervals`, per time window.
async fn search_standard(
	State(state): State<AppState>,
	payload: Result<Json<RetrievalRequest>, JsonRejection>,
) -> Result<Json<RetrievalResponse>, ApiError> {
	let Json(mut request) = payload?;

	request.use_llm_assistance = false;

	Ok(Json(state.service.retrieve(request).await?))
}

async fn search_llm_assisted(
	State(state): State<AppState>,
	payload: Result<Json<RetrievalRequest>, JsonRejection>,
) -> Result<Json<RetrievalResponse>, ApiError> {
	let Json(mut request) = payload?;

	request.use_llm_assistance = true;

	Ok(Json(state.service.retrieve(request).await?))
}

async fn analyze(
	State(state): State<AppState>,
	payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
	let Json(request) = payload?;

	Ok(Json(state.service.analyze(request).await?))
}

async fn expand_keywords(
	State(state): State<AppState>,
	payload: Result<Json<ExpandRequest>, JsonRejection>,
) -> Result<Json<KeywordExpansion>, ApiError> {
	let Json(request) = payload?;

	Ok(Json(state.service.expand_keywords(request).await?))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: &'static str,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
		Self { status, error_code, message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			Error::Unavailable { message } =>
				Self::new(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", message),
			Error::Provider { message } =>
				Self::new(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message),
			Error::Storage { message } =>
				Self::new(StatusCode::BAD_GATEWAY, "STORAGE_ERROR", message),
			Error::Cancelled { message } =>
				Self::new(StatusCode::GATEWAY_TIMEOUT, "CANCELLED", message),
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.status.is_server_error() {
			tracing::error!(
				status = self.status.as_u16(),
				error_code = self.error_code,
				message = %self.message,
				"Request failed."
			);
		}

		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
