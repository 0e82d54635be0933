use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Nested under `/admin`. The router is wrapped in the same verifier
/// middleware as the authenticated routes, and each handler additionally
/// requires the Admin role.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/users
        // Provision an account with any registered role, including Admin.
        .route("/users", post(handlers::create_user))
}
