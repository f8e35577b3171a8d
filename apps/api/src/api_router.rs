use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;


pub fn build_router(app_state: AppState) -> Router {
    let role_routes = Router::new()
        .route("/api/roles", get(handlers::roles::list_roles_handler))
        .route(
            "/api/roles/{role_name}",
            get(handlers::roles::read_role_handler)
                .post(handlers::roles::save_role_handler)
                .put(handlers::roles::save_role_handler)
                .delete(handlers::roles::delete_role_handler),
        )
        .route(
            "/api/roles/{role_name}/binding",
            get(handlers::roles::role_binding_handler),
        )
        .route(
            "/api/roles/{role_name}/repair",
            post(handlers::roles::repair_role_handler),
        )
        .route(
            "/api/repair",
            post(handlers::roles::repair_pending_roles_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin_token,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(role_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
