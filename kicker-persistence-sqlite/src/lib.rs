use std::str::FromStr;

use kicker_server_domain::{ServiceError, ServiceResult, matches::Sport};
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

mod matches;
mod players;

pub use matches::SqliteMatchRepository;
pub use players::SqlitePlayerRepository;

const DEFAULT_DATABASE_URL: &str = "sqlite://kicker.db";

pub async fn create_db_pool() -> Pool<Sqlite> {
    dotenvy::dotenv().ok();
    let url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let options = SqliteConnectOptions::from_str(&url)
        .expect("DATABASE_URL must be a valid sqlite URL")
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .expect("Failed to connect to database")
}

pub async fn init_schema(pool: &Pool<Sqlite>) -> ServiceResult<()> {
    for statement in [PLAYERS_SCHEMA, MATCHES_SCHEMA] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
    }
    Ok(())
}

pub(crate) fn rating_column(sport: Sport) -> &'static str {
    match sport {
        Sport::TableSoccer => "table_soccer_rating",
        Sport::TableFootball => "table_football_rating",
    }
}

const PLAYERS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER NOT NULL UNIQUE,
    login TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    image_url TEXT NOT NULL DEFAULT '',
    campus TEXT NOT NULL DEFAULT '',
    table_soccer_rating INTEGER NOT NULL DEFAULT 1200,
    table_football_rating INTEGER NOT NULL DEFAULT 1200,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const MATCHES_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player1_id INTEGER NOT NULL REFERENCES players(id),
    player2_id INTEGER NOT NULL REFERENCES players(id),
    winner_id INTEGER NOT NULL REFERENCES players(id),
    sport TEXT NOT NULL,
    score TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending',
    player1_rating_before INTEGER NOT NULL,
    player2_rating_before INTEGER NOT NULL,
    player1_rating_after INTEGER NOT NULL DEFAULT 0,
    player2_rating_after INTEGER NOT NULL DEFAULT 0,
    submitted_at TEXT NOT NULL,
    resolved_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

#[cfg(test)]
pub(crate) async fn test_pool() -> Pool<Sqlite> {
    // A single connection keeps every test statement on the same in-memory
    // database.
    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
