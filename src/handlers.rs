use crate::{
    AppState,
    auth::Principal,
    error::Error,
    models::{
        CreateMovieRequest, CreateUserRequest, LoginRequest, LoginResponse, MovieFilter,
        MovieView, UpdateMovieRequest, UpdateUserRequest, UserFilter, UserView,
    },
    roles::Role,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

// --- Filter Structs ---

/// UserQuery
///
/// Query parameters accepted by `GET /users`.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct UserQuery {
    /// Exact username match.
    pub username: Option<String>,
}

impl From<UserQuery> for UserFilter {
    fn from(query: UserQuery) -> Self {
        Self {
            username: query.username,
        }
    }
}

/// MovieQuery
///
/// Query parameters accepted by `GET /movies`. Each supplied field must match
/// exactly.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct MovieQuery {
    pub title: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
}

impl From<MovieQuery> for MovieFilter {
    fn from(query: MovieQuery) -> Self {
        Self {
            title: query.title,
            director: query.director,
            genre: query.genre,
        }
    }
}

// --- Session Handlers ---

/// login
///
/// [Public Route] Exchanges a username and password for an access token.
/// Unknown users and wrong passwords both answer 404.
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 404, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    Ok(Json(state.users.login(payload).await?))
}

/// logout
///
/// [Public Route] Stateless acknowledgement. The client drops its token; the
/// server keeps no session to invalidate.
#[utoipa::path(
    post,
    path = "/users/logout",
    responses((status = 200, description = "Logged out", body = LoginResponse))
)]
pub async fn logout(State(state): State<AppState>) -> Json<LoginResponse> {
    Json(state.users.logout())
}

// --- User Handlers ---

/// register_user
///
/// [Public Route] Self-registration. Requesting the Admin role here is 403.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Invalid role"),
        (status = 403, description = "Admin role requested anonymously"),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Field constraints violated")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), Error> {
    let user = state.users.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// create_user
///
/// [Admin Route] Creates an account with any registered role.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Invalid role"),
        (status = 403, description = "Not an Admin")
    ),
    security(("token_header" = []))
)]
pub async fn create_user(
    principal: Principal,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), Error> {
    principal.require_role(Role::Admin)?;
    let user = state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// list_users
///
/// [Authenticated Route] Lists live users. Deleted accounts never appear.
#[utoipa::path(
    get,
    path = "/users",
    params(UserQuery),
    responses((status = 200, description = "Users", body = [UserView])),
    security(("token_header" = []))
)]
pub async fn list_users(
    _principal: Principal,
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<UserView>>, Error> {
    Ok(Json(state.users.list(&query.into()).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserView),
        (status = 404, description = "User not found")
    ),
    security(("token_header" = []))
)]
pub async fn get_user(
    _principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserView>, Error> {
    Ok(Json(state.users.get_by_id(id).await?))
}

/// update_user
///
/// [Authenticated Route] Owner or Admin; role changes are Admin only.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 204, description = "Updated"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Field constraints violated")
    ),
    security(("token_header" = []))
)]
pub async fn update_user(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<StatusCode, Error> {
    state.users.update(&principal, id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// delete_user
///
/// [Authenticated Route, Admin] Logical deletion. Deleting an id twice is 404.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an Admin"),
        (status = 404, description = "User not found")
    ),
    security(("token_header" = []))
)]
pub async fn delete_user(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
    state.users.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Movie Handlers ---

#[utoipa::path(
    get,
    path = "/movies",
    params(MovieQuery),
    responses((status = 200, description = "Movies", body = [MovieView])),
    security(("token_header" = []))
)]
pub async fn list_movies(
    _principal: Principal,
    State(state): State<AppState>,
    Query(query): Query<MovieQuery>,
) -> Result<Json<Vec<MovieView>>, Error> {
    Ok(Json(state.movies.list(&query.into()).await?))
}

#[utoipa::path(
    get,
    path = "/movies/{id}",
    params(("id" = i64, Path, description = "Movie ID")),
    responses(
        (status = 200, description = "Found", body = MovieView),
        (status = 404, description = "Movie not found")
    ),
    security(("token_header" = []))
)]
pub async fn get_movie(
    _principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MovieView>, Error> {
    Ok(Json(state.movies.get_by_id(id).await?))
}

#[utoipa::path(
    post,
    path = "/movies",
    request_body = CreateMovieRequest,
    responses(
        (status = 201, description = "Movie created", body = MovieView),
        (status = 422, description = "Field constraints violated")
    ),
    security(("token_header" = []))
)]
pub async fn create_movie(
    _principal: Principal,
    State(state): State<AppState>,
    Json(payload): Json<CreateMovieRequest>,
) -> Result<(StatusCode, Json<MovieView>), Error> {
    let movie = state.movies.create(payload).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

#[utoipa::path(
    patch,
    path = "/movies/{id}",
    params(("id" = i64, Path, description = "Movie ID")),
    request_body = UpdateMovieRequest,
    responses(
        (status = 200, description = "Updated", body = MovieView),
        (status = 404, description = "Movie not found"),
        (status = 422, description = "Field constraints violated")
    ),
    security(("token_header" = []))
)]
pub async fn update_movie(
    _principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMovieRequest>,
) -> Result<Json<MovieView>, Error> {
    Ok(Json(state.movies.update(id, payload).await?))
}

/// delete_movie
///
/// [Authenticated Route, Admin] Logical deletion.
#[utoipa::path(
    delete,
    path = "/movies/{id}",
    params(("id" = i64, Path, description = "Movie ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an Admin"),
        (status = 404, description = "Movie not found")
    ),
    security(("token_header" = []))
)]
pub async fn delete_movie(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
    state.movies.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
