use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    lifecycle::{Lifecycle, LifecycleStore, Timestamps},
    models::{Movie, MovieFilter, NewMovie, NewUser, User, UserFilter},
};

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at, deleted_at";
const MOVIE_COLUMNS: &str =
    "id, title, description, director, genre, created_at, updated_at, deleted_at";

/// Maps a driver error to the storage taxonomy. Unique violations are the
/// only failures a caller can act on.
fn store_error(context: &'static str, conflict: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(conflict.to_string());
        }
    }
    StoreError::Backend(format!("{context}: {err}"))
}

// --- Row Types ---

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    /// A role outside the registry in the table means the data is corrupt;
    /// it is surfaced as a backend failure and never handed to callers.
    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|_| {
            StoreError::Backend(format!("user {} has unregistered role {:?}", row.id, row.role))
        })?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role,
            timestamps: Timestamps {
                created_at: row.created_at,
                updated_at: row.updated_at,
                deleted_at: row.deleted_at,
            },
        })
    }
}

#[derive(Debug, FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    description: String,
    director: String,
    genre: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie {
            id: row.id,
            title: row.title,
            description: row.description,
            director: row.director,
            genre: row.genre,
            timestamps: Timestamps {
                created_at: row.created_at,
                updated_at: row.updated_at,
                deleted_at: row.deleted_at,
            },
        }
    }
}

/// PostgresRepository
///
/// The `LifecycleStore` implementation for both entity types, backed by
/// PostgreSQL. Every SELECT and UPDATE is scoped with
/// `deleted_at IS NULL`; rows are never physically deleted.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LifecycleStore<User> for PostgresRepository {
    async fn insert(&self, draft: NewUser, stamps: Timestamps) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&draft.username)
            .bind(&draft.password_hash)
            .bind(draft.role.as_str())
            .bind(stamps.created_at)
            .bind(stamps.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("insert user", "username is already taken", e))?;
        row.try_into()
    }

    async fn save(&self, user: &User) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET username = $2, password_hash = $3, role = $4, updated_at = $5 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.timestamps.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("update user", "username is already taken", e))?;
        row.map(User::try_from).transpose()
    }

    async fn mark_deleted(&self, id: i64, at: DateTime<Utc>) -> Result<bool, StoreError> {
        sqlx::query("UPDATE users SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| store_error("soft-delete user", "conflict", e))
    }

    /// Filtering goes through `QueryBuilder` with bound parameters only.
    async fn find_live(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL"
        ));
        if let Some(username) = &filter.username {
            builder.push(" AND username = ");
            builder.push_bind(username.clone());
        }
        builder.push(" ORDER BY id ASC");

        let rows = builder
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list users", "conflict", e))?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn find_live_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("get user", "conflict", e))?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl LifecycleStore<Movie> for PostgresRepository {
    async fn insert(&self, draft: NewMovie, stamps: Timestamps) -> Result<Movie, StoreError> {
        let sql = format!(
            "INSERT INTO movies (title, description, director, genre, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {MOVIE_COLUMNS}"
        );
        sqlx::query_as::<_, MovieRow>(&sql)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(&draft.director)
            .bind(&draft.genre)
            .bind(stamps.created_at)
            .bind(stamps.updated_at)
            .fetch_one(&self.pool)
            .await
            .map(Movie::from)
            .map_err(|e| store_error("insert movie", "movie already exists", e))
    }

    async fn save(&self, movie: &Movie) -> Result<Option<Movie>, StoreError> {
        let sql = format!(
            "UPDATE movies SET title = $2, description = $3, director = $4, genre = $5, updated_at = $6 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {MOVIE_COLUMNS}"
        );
        sqlx::query_as::<_, MovieRow>(&sql)
            .bind(movie.id)
            .bind(&movie.title)
            .bind(&movie.description)
            .bind(&movie.director)
            .bind(&movie.genre)
            .bind(movie.timestamps.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Movie::from))
            .map_err(|e| store_error("update movie", "movie already exists", e))
    }

    async fn mark_deleted(&self, id: i64, at: DateTime<Utc>) -> Result<bool, StoreError> {
        sqlx::query("UPDATE movies SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| store_error("soft-delete movie", "conflict", e))
    }

    async fn find_live(&self, filter: &MovieFilter) -> Result<Vec<Movie>, StoreError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE deleted_at IS NULL"
        ));
        for (column, value) in [
            ("title", &filter.title),
            ("director", &filter.director),
            ("genre", &filter.genre),
        ] {
            if let Some(value) = value {
                builder.push(format!(" AND {column} = "));
                builder.push_bind(value.clone());
            }
        }
        builder.push(" ORDER BY id ASC");

        builder
            .build_query_as::<MovieRow>()
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Movie::from).collect())
            .map_err(|e| store_error("list movies", "conflict", e))
    }

    async fn find_live_by_id(&self, id: i64) -> Result<Option<Movie>, StoreError> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, MovieRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Movie::from))
            .map_err(|e| store_error("get movie", "conflict", e))
    }
}

// --- In-Memory Implementation ---

struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

/// InMemoryStore
///
/// A `LifecycleStore` kept in process memory. Enforces the same live-row
/// uniqueness as the partial index in the SQL schema. Backs the test suite
/// and lets the router run without a database.
pub struct InMemoryStore<T> {
    table: RwLock<Table<T>>,
    /// When true, every operation fails as if the backend were down.
    pub should_fail: bool,
}

impl<T: Lifecycle> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Lifecycle> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of rows ever stored, deleted ones included.
    pub async fn row_count(&self) -> usize {
        self.table.read().await.rows.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.should_fail {
            Err(StoreError::Backend("in-memory store is configured to fail".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_unique(table: &Table<T>, candidate: &T) -> Result<(), StoreError> {
        let Some(key) = candidate.unique_key() else {
            return Ok(());
        };
        let taken = table.rows.values().any(|row| {
            row.id() != candidate.id()
                && row.timestamps().is_live()
                && row.unique_key().as_deref() == Some(key.as_str())
        });
        if taken {
            Err(StoreError::Conflict(format!("{} {key:?} already exists", T::KIND)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<T: Lifecycle> LifecycleStore<T> for InMemoryStore<T> {
    async fn insert(&self, draft: T::Draft, stamps: Timestamps) -> Result<T, StoreError> {
        self.check_available()?;
        let mut table = self.table.write().await;
        let entity = T::from_draft(table.next_id, draft, stamps);
        Self::check_unique(&table, &entity)?;
        table.next_id += 1;
        table.rows.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn save(&self, entity: &T) -> Result<Option<T>, StoreError> {
        self.check_available()?;
        let mut table = self.table.write().await;
        let live = table
            .rows
            .get(&entity.id())
            .is_some_and(|row| row.timestamps().is_live());
        if !live {
            return Ok(None);
        }
        Self::check_unique(&table, entity)?;

        // The stored lifecycle columns other than updated_at are not writable here.
        let mut stored = entity.clone();
        if let Some(existing) = table.rows.get(&entity.id()) {
            let original = *existing.timestamps();
            let stamps = stored.timestamps_mut();
            stamps.created_at = original.created_at;
            stamps.deleted_at = original.deleted_at;
        }
        table.rows.insert(stored.id(), stored.clone());
        Ok(Some(stored))
    }

    async fn mark_deleted(&self, id: i64, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(row) if row.timestamps().is_live() => {
                row.timestamps_mut().deleted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_live(&self, filter: &T::Filter) -> Result<Vec<T>, StoreError> {
        self.check_available()?;
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|row| row.timestamps().is_live() && row.matches(filter))
            .cloned()
            .collect())
    }

    async fn find_live_by_id(&self, id: i64) -> Result<Option<T>, StoreError> {
        self.check_available()?;
        let table = self.table.read().await;
        Ok(table
            .rows
            .get(&id)
            .filter(|row| row.timestamps().is_live())
            .cloned())
    }
}
