use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without an access token. Login is here by necessity:
/// it is where tokens come from.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /users
        // Self-registration. Only the User role may be requested.
        .route("/users", post(handlers::register_user))
        // POST /users/login
        // Returns {auth: true, token} or 404.
        .route("/users/login", post(handlers::login))
        // POST /users/logout
        // Client-side logout; always {auth: false, token: null}.
        .route("/users/logout", post(handlers::logout))
}
