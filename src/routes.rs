use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::state::AppState;

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_allowed_origins);

    let router = Router::new()
        .route("/api/health", get(handlers::health_check))
        // セッション状態
        .route("/api/session", get(handlers::get_session))
        .route("/api/session/user", put(handlers::set_user))
        .route("/api/session/otp", put(handlers::set_otp))
        .route("/api/session/qr", get(handlers::get_qr_code))
        // ワークフローコマンド
        .route("/api/enroll", post(handlers::enroll))
        .route("/api/activate", post(handlers::activate))
        .route("/api/verify", post(handlers::verify))
        .route("/api/disable", post(handlers::disable))
        .with_state(state);

    match cors {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// 許可オリジンから CorsLayer を構築（空なら CORS 無効）
pub fn build_cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = ?e, origin, "無効な CORS オリジンを無視");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
    )
}
