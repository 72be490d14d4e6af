pub mod routes;
pub mod state;
pub mod ws;

use axum::{routing::{get, post}, Router};
use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::{detector_ws, display_ws};

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/config", get(routes::get_config))
        .route("/api/session", get(routes::get_session))
        .route("/api/session/start", post(routes::start_session))
        .route("/api/session/stop", post(routes::stop_session))
        .route("/ws/detector", get(detector_ws))
        .route("/ws/display", get(display_ws))
        .with_state(state)
}
