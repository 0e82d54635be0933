use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core: roles, credentials and the entity lifecycle.
pub mod auth;
pub mod clock;
pub mod lifecycle;
pub mod roles;

// Supporting services and collaborators.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod observe;
pub mod passwords;
pub mod repository;
pub mod services;
pub mod validation;

// Routing segregated by required access (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{ACCESS_TOKEN_HEADER, Principal, TokenIssuer, TokenVerifier};
pub use config::AppConfig;
pub use error::{AuthError, Error};
pub use repository::{InMemoryStore, PostgresRepository};
pub use roles::Role;

use clock::ClockState;
use lifecycle::{LifecycleManager, StoreState};
use models::{Movie, User};
use observe::ObserverState;
use services::{MovieService, UserService};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at
/// `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::logout, handlers::register_user, handlers::create_user,
        handlers::list_users, handlers::get_user, handlers::update_user, handlers::delete_user,
        handlers::list_movies, handlers::get_movie, handlers::create_movie,
        handlers::update_movie, handlers::delete_movie
    ),
    components(
        schemas(
            models::CreateUserRequest, models::UpdateUserRequest, models::LoginRequest,
            models::LoginResponse, models::UserView, models::CreateMovieRequest,
            models::UpdateMovieRequest, models::MovieView, roles::Role,
        )
    ),
    modifiers(&TokenHeaderScheme),
    tags(
        (name = "movie-vault", description = "Users and movies behind token authentication")
    )
)]
struct ApiDoc;

/// Declares the `x-access-token` header as the API's security scheme.
struct TokenHeaderScheme;

impl Modify for TokenHeaderScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "token_header",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ACCESS_TOKEN_HEADER))),
        );
    }
}

/// AppState
///
/// Shared, immutable per-process state. Everything inside is either
/// read-only configuration or a cheaply clonable handle.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub movies: MovieService,
    pub verifier: TokenVerifier,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the issuer, verifier, lifecycle managers and services around the
    /// given stores, clock and observer.
    pub fn new(
        config: AppConfig,
        user_store: StoreState<User>,
        movie_store: StoreState<Movie>,
        clock: ClockState,
        observer: ObserverState,
    ) -> Self {
        let issuer = TokenIssuer::new(&config.jwt_secret, config.token_ttl, observer.clone());
        let verifier = TokenVerifier::new(&config.jwt_secret, clock.clone(), observer.clone());

        let users = UserService::new(
            LifecycleManager::new(user_store, clock.clone(), observer.clone()),
            issuer,
            observer.clone(),
        );
        let movies = MovieService::new(LifecycleManager::new(movie_store, clock, observer));

        Self {
            users,
            movies,
            verifier,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(app_state: &AppState) -> TokenVerifier {
        app_state.verifier.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// The credential gate for protected routers. Extracting `Principal` runs the
/// verifier; on rejection the request never reaches a handler. On success the
/// principal is stored in the request extensions so handlers reuse it.
async fn auth_middleware(
    principal: Principal,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// create_router
///
/// Assembles public, authenticated and admin routes, the docs UI and the
/// observability layers around the given state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// One span per request carrying method, URI and the `x-request-id` set by
/// the layer above, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
