use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use crate::adapters::http::state::HttpState;
use crate::application::dto::OkResponse;
use crate::domain::errors::DomainError;

fn error_response(e: DomainError) -> axum::response::Response {
    let status = match e {
        DomainError::AlreadyRunning | DomainError::NotRunning => StatusCode::CONFLICT,
        DomainError::CaptureDeviceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::InvalidConfig(_) | DomainError::MalformedResult(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

pub async fn get_config(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.guidance.config().clone())
}

pub async fn start_session(State(st): State<HttpState>) -> impl IntoResponse {
    match st.guidance.start().await {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn stop_session(State(st): State<HttpState>) -> impl IntoResponse {
    match st.guidance.stop().await {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_session(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.guidance.status().await)
}
