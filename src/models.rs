use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    lifecycle::{Lifecycle, Timestamps},
    roles::Role,
    validation::{
        DESCRIPTION_LEN, DIRECTOR_LEN, GENRE_LEN, TITLE_LEN, USERNAME_LEN, Validate,
        ValidationErrors,
    },
};

// --- Domain Entities ---

/// User
///
/// An account. `password_hash` is an argon2 PHC string and must never leave
/// the service layer; responses go through `UserView`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub timestamps: Timestamps,
}

/// Attributes of a user about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

/// Exact-match filter over live users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub username: Option<String>,
}

fn validate_user_fields(username: &str, password_hash: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("username", username, USERNAME_LEN.0, USERNAME_LEN.1);
    if password_hash.is_empty() {
        errors.push("password", "password must not be empty");
    }
    errors.into_result()
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_user_fields(&self.username, &self.password_hash)
    }
}

impl Validate for User {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_user_fields(&self.username, &self.password_hash)
    }
}

impl Lifecycle for User {
    type Draft = NewUser;
    type Patch = UserPatch;
    type Filter = UserFilter;

    const KIND: &'static str = "user";

    fn from_draft(id: i64, draft: NewUser, stamps: Timestamps) -> Self {
        Self {
            id,
            username: draft.username,
            password_hash: draft.password_hash,
            role: draft.role,
            timestamps: stamps,
        }
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn apply(&mut self, patch: UserPatch) {
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(password_hash) = patch.password_hash {
            self.password_hash = password_hash;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        filter
            .username
            .as_ref()
            .is_none_or(|username| &self.username == username)
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.username.clone())
    }
}

/// Movie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub director: String,
    pub genre: String,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovie {
    pub title: String,
    pub description: String,
    pub director: String,
    pub genre: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieFilter {
    pub title: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
}

fn validate_movie_fields(
    title: &str,
    description: &str,
    director: &str,
    genre: &str,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("title", title, TITLE_LEN.0, TITLE_LEN.1);
    errors.check_length("description", description, DESCRIPTION_LEN.0, DESCRIPTION_LEN.1);
    errors.check_length("director", director, DIRECTOR_LEN.0, DIRECTOR_LEN.1);
    errors.check_length("genre", genre, GENRE_LEN.0, GENRE_LEN.1);
    errors.into_result()
}

impl Validate for NewMovie {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_movie_fields(&self.title, &self.description, &self.director, &self.genre)
    }
}

impl Validate for Movie {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_movie_fields(&self.title, &self.description, &self.director, &self.genre)
    }
}

impl Lifecycle for Movie {
    type Draft = NewMovie;
    type Patch = MoviePatch;
    type Filter = MovieFilter;

    const KIND: &'static str = "movie";

    fn from_draft(id: i64, draft: NewMovie, stamps: Timestamps) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            director: draft.director,
            genre: draft.genre,
            timestamps: stamps,
        }
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn apply(&mut self, patch: MoviePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(director) = patch.director {
            self.director = director;
        }
        if let Some(genre) = patch.genre {
            self.genre = genre;
        }
    }

    fn matches(&self, filter: &MovieFilter) -> bool {
        let eq = |wanted: &Option<String>, actual: &str| wanted.as_deref().is_none_or(|w| w == actual);
        eq(&filter.title, &self.title)
            && eq(&filter.director, &self.director)
            && eq(&filter.genre, &self.genre)
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateUserRequest
///
/// Input for `POST /users` and `POST /admin/users`. `role` is taken as a plain
/// string so an unknown role is reported as `invalid_role` rather than as a
/// generic body rejection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "alice_smith")]
    pub username: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = "User")]
    pub role: String,
}

/// UpdateUserRequest
///
/// Partial update for `PATCH /users/{id}`. Changing `role` requires Admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMovieRequest {
    pub title: String,
    pub description: String,
    pub director: String,
    pub genre: String,
}

impl From<CreateMovieRequest> for NewMovie {
    fn from(req: CreateMovieRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            director: req.director,
            genre: req.genre,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateMovieRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl From<UpdateMovieRequest> for MoviePatch {
    fn from(req: UpdateMovieRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            director: req.director,
            genre: req.genre,
        }
    }
}

// --- Response Views (Output Schemas) ---

/// UserView
///
/// The only shape in which a user leaves the service. It has no password
/// field at all, so nothing can leak one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            created_at: user.timestamps.created_at,
            updated_at: user.timestamps.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MovieView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub director: String,
    pub genre: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Movie> for MovieView {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            description: movie.description.clone(),
            director: movie.director.clone(),
            genre: movie.genre.clone(),
            created_at: movie.timestamps.created_at,
            updated_at: movie.timestamps.updated_at,
        }
    }
}

/// LoginResponse
///
/// `{auth: true, token}` after login, `{auth: false, token: null}` after
/// logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub auth: bool,
    pub token: Option<String>,
}

impl LoginResponse {
    pub fn authenticated(token: String) -> Self {
        Self {
            auth: true,
            token: Some(token),
        }
    }

    pub fn logged_out() -> Self {
        Self {
            auth: false,
            token: None,
        }
    }
}
