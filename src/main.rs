use movie_vault::{
    AppState, PostgresRepository,
    clock::SystemClock,
    config::{AppConfig, Env},
    create_router,
    lifecycle::StoreState,
    models::{Movie, User},
    observe::TracingObserver,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects and migrates the database,
/// then serves the API until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => panic!("FATAL: {e}"),
    };

    // 2. Logging
    // RUST_LOG wins; otherwise a debug level for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "movie_vault=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(
        env = ?config.env,
        token_ttl_secs = config.token_ttl.as_secs(),
        "Application starting"
    );

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    // One repository serves both entity tables.
    let repo = Arc::new(PostgresRepository::new(pool));
    let user_store = repo.clone() as StoreState<User>;
    let movie_store = repo as StoreState<Movie>;

    // 4. State and router
    let port = config.port;
    let app_state = AppState::new(
        config,
        user_store,
        movie_store,
        Arc::new(SystemClock),
        Arc::new(TracingObserver),
    );
    let app = create_router(app_state);

    // 5. Serve
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
