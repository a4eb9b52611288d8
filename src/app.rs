//! HTTP router assembly.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers,
    middleware::auth::{AuthGate, auth_middleware},
    models::api_key::Role,
    state::AppState,
};

/// Build the full router: public health check, user routes, admin routes.
pub fn router(state: AppState) -> Router {
    // Routes any active key may call
    let user_routes = Router::new()
        .route("/api/v1/whoami", get(handlers::identity::whoami))
        .route_layer(axum_middleware::from_fn_with_state(
            AuthGate::new(state.clone(), Role::User),
            auth_middleware,
        ));

    // Routes that require an admin key
    let admin_routes = Router::new()
        .route("/admin/keys", get(handlers::admin_keys::list_keys))
        .route("/admin/keys/create", post(handlers::admin_keys::create_key))
        .route(
            "/admin/keys/{id}/activate",
            post(handlers::admin_keys::activate_key),
        )
        .route(
            "/admin/keys/{id}/deactivate",
            post(handlers::admin_keys::deactivate_key),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            AuthGate::new(state.clone(), Role::Admin),
            auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .merge(user_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
