use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Authenticated Router Module
///
/// Every route here sits behind the verifier middleware, so handlers always
/// receive a `Principal`. A missing token is rejected with 403, a bad or
/// expired one with 401, before any handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users?username=...
        .route("/users", get(handlers::list_users))
        // GET/PATCH/DELETE /users/{id}
        // PATCH is owner-or-Admin; DELETE is Admin only (checked in the service).
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // GET/POST /movies
        .route(
            "/movies",
            get(handlers::list_movies).post(handlers::create_movie),
        )
        // GET/PATCH/DELETE /movies/{id}
        // DELETE is Admin only.
        .route(
            "/movies/{id}",
            get(handlers::get_movie)
                .patch(handlers::update_movie)
                .delete(handlers::delete_movie),
        )
}
