use chrono::Utc;
use kicker_server_domain::{
    ServiceError, ServiceResult,
    matches::Sport,
    player::{NewPlayer, Player, PlayerId, PlayerRepository},
};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::rating_column;

pub struct SqlitePlayerRepository {
    pool: Pool<Sqlite>,
}

impl SqlitePlayerRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn player_from_row(row: &SqliteRow) -> sqlx::Result<Player> {
        Ok(Player {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            login: row.try_get("login")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            image_url: row.try_get("image_url")?,
            campus: row.try_get("campus")?,
            table_soccer_rating: row.try_get("table_soccer_rating")?,
            table_football_rating: row.try_get("table_football_rating")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn map_player_row(row: Option<SqliteRow>) -> ServiceResult<Option<Player>> {
        row.map(|row| Self::player_from_row(&row))
            .transpose()
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PlayerRepository for SqlitePlayerRepository {
    async fn get_player_by_id(&self, id: PlayerId) -> ServiceResult<Option<Player>> {
        let row = sqlx::query("SELECT * FROM players WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Self::map_player_row(row)
    }

    async fn get_player_by_login(&self, login: &str) -> ServiceResult<Option<Player>> {
        let row = sqlx::query("SELECT * FROM players WHERE login = ?")
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Self::map_player_row(row)
    }

    async fn get_player_by_external_id(
        &self,
        external_id: i64,
    ) -> ServiceResult<Option<Player>> {
        let row = sqlx::query("SELECT * FROM players WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Self::map_player_row(row)
    }

    async fn create_player(&self, new_player: &NewPlayer) -> ServiceResult<Player> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO players (external_id, login, first_name, last_name, email, \
             image_url, campus, table_soccer_rating, table_football_rating, created_at, \
             updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_player.external_id)
        .bind(&new_player.login)
        .bind(&new_player.first_name)
        .bind(&new_player.last_name)
        .bind(&new_player.email)
        .bind(&new_player.image_url)
        .bind(&new_player.campus)
        .bind(new_player.table_soccer_rating)
        .bind(new_player.table_football_rating)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .last_insert_rowid();

        match self.get_player_by_id(id).await? {
            Some(player) => Ok(player),
            None => ServiceError::internal("Created player row missing"),
        }
    }

    async fn search_players(&self, query: &str, limit: u32) -> ServiceResult<Vec<Player>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            "SELECT * FROM players WHERE login LIKE ? OR first_name LIKE ? OR last_name \
             LIKE ? ORDER BY id LIMIT ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
        rows.iter()
            .map(|row| {
                Self::player_from_row(row).map_err(|e| ServiceError::Internal(e.to_string()))
            })
            .collect()
    }

    async fn get_players_by_rating(&self, sport: Sport) -> ServiceResult<Vec<Player>> {
        let query = format!(
            "SELECT * FROM players ORDER BY {} DESC, id ASC",
            rating_column(sport)
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        rows.iter()
            .map(|row| {
                Self::player_from_row(row).map_err(|e| ServiceError::Internal(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    fn new_player(external_id: i64, login: &str) -> NewPlayer {
        NewPlayer {
            external_id,
            login: login.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: format!("{}@example.com", login),
            image_url: String::new(),
            campus: "Heilbronn".to_string(),
            table_soccer_rating: 1200,
            table_football_rating: 1200,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_roundtrip() {
        let repository = SqlitePlayerRepository::new(test_pool().await);

        let created = repository.create_player(&new_player(42, "alice")).await.unwrap();
        assert_eq!(created.external_id, 42);
        assert_eq!(created.table_soccer_rating, 1200);

        let by_login = repository.get_player_by_login("alice").await.unwrap().unwrap();
        assert_eq!(by_login.id, created.id);
        let by_external = repository.get_player_by_external_id(42).await.unwrap().unwrap();
        assert_eq!(by_external.id, created.id);
        assert!(repository.get_player_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_external_id_is_rejected() {
        let repository = SqlitePlayerRepository::new(test_pool().await);

        repository.create_player(&new_player(42, "alice")).await.unwrap();
        let duplicate = repository.create_player(&new_player(42, "alice2")).await;

        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn search_matches_login_and_names_up_to_limit() {
        let repository = SqlitePlayerRepository::new(test_pool().await);
        repository.create_player(&new_player(1, "alice")).await.unwrap();
        repository.create_player(&new_player(2, "malice")).await.unwrap();
        repository.create_player(&new_player(3, "bob")).await.unwrap();

        let hits = repository.search_players("lic", 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        // first_name is "Ada" for everyone.
        let by_name = repository.search_players("Ada", 2).await.unwrap();
        assert_eq!(by_name.len(), 2);
    }

    #[tokio::test]
    async fn players_are_ordered_by_rating_then_id() {
        let repository = SqlitePlayerRepository::new(test_pool().await);
        let mut strong = new_player(1, "strong");
        strong.table_soccer_rating = 1400;
        repository.create_player(&strong).await.unwrap();
        let first_tied = repository.create_player(&new_player(2, "tied1")).await.unwrap();
        let second_tied = repository.create_player(&new_player(3, "tied2")).await.unwrap();

        let players = repository
            .get_players_by_rating(Sport::TableSoccer)
            .await
            .unwrap();
        let logins: Vec<&str> = players.iter().map(|p| p.login.as_str()).collect();
        assert_eq!(logins, vec!["strong", "tied1", "tied2"]);
        assert!(first_tied.id < second_tied.id);
    }
}
