use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::middleware::{auth, rbac};
use crate::AppState;

pub mod handlers;

/// Build the API router. The caller mounts this under `/api/v1`.
///
/// Three auth tiers:
/// - `/health` is open.
/// - `/introspect` requires a valid API token (verification middleware).
/// - everything under `/tokens` and `/admin` requires a management
///   principal; per-route superadmin checks live in the handlers.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let management = Router::new()
        .route(
            "/tokens",
            get(handlers::list_tokens).post(handlers::create_token),
        )
        .route(
            "/tokens/:id",
            get(handlers::show_token)
                .put(handlers::update_token)
                .delete(handlers::revoke_token),
        )
        .route("/tokens/:id/regenerate", post(handlers::regenerate_token))
        .route("/admin/tokens", get(handlers::admin_list_tokens))
        .route("/admin/tokens/public", post(handlers::create_public_token))
        .route("/admin/tokens/:id", delete(handlers::delete_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rbac::admin_auth,
        ));

    let verified = Router::new()
        .route("/introspect", get(handlers::introspect))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(management)
        .merge(verified)
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
