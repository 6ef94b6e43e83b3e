use chrono::{DateTime, Utc};
use kicker_server_domain::{
    ServiceError, ServiceResult,
    matches::{
        MatchConfirmation, MatchCounts, MatchId, MatchRecord, MatchRepository, MatchStatus,
        NewMatch, Sport,
    },
    player::PlayerId,
};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::rating_column;

pub struct SqliteMatchRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMatchRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn match_from_row(row: &SqliteRow) -> sqlx::Result<MatchRecord> {
        let sport: String = row.try_get("sport")?;
        let sport = Sport::parse(&sport)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown sport: {}", sport).into()))?;
        let status: String = row.try_get("status")?;
        let status = MatchStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown status: {}", status).into()))?;
        Ok(MatchRecord {
            id: row.try_get("id")?,
            player1_id: row.try_get("player1_id")?,
            player2_id: row.try_get("player2_id")?,
            winner_id: row.try_get("winner_id")?,
            sport,
            score: row.try_get("score")?,
            status,
            player1_rating_before: row.try_get("player1_rating_before")?,
            player2_rating_before: row.try_get("player2_rating_before")?,
            player1_rating_after: row.try_get("player1_rating_after")?,
            player2_rating_after: row.try_get("player2_rating_after")?,
            submitted_at: row.try_get("submitted_at")?,
            resolved_at: row.try_get("resolved_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait::async_trait]
impl MatchRepository for SqliteMatchRepository {
    async fn get_match(&self, id: MatchId) -> ServiceResult<Option<MatchRecord>> {
        let row = sqlx::query("SELECT * FROM matches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        row.map(|row| Self::match_from_row(&row))
            .transpose()
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    async fn create_match(&self, new_match: &NewMatch) -> ServiceResult<MatchRecord> {
        let id = sqlx::query(
            "INSERT INTO matches (player1_id, player2_id, winner_id, sport, score, status, \
             player1_rating_before, player2_rating_before, player1_rating_after, \
             player2_rating_after, submitted_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?)",
        )
        .bind(new_match.player1_id)
        .bind(new_match.player2_id)
        .bind(new_match.winner_id)
        .bind(new_match.sport.as_str())
        .bind(&new_match.score)
        .bind(MatchStatus::Pending.as_str())
        .bind(new_match.player1_rating_before)
        .bind(new_match.player2_rating_before)
        .bind(new_match.submitted_at)
        .bind(new_match.submitted_at)
        .bind(new_match.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .last_insert_rowid();

        match self.get_match(id).await? {
            Some(record) => Ok(record),
            None => ServiceError::internal("Created match row missing"),
        }
    }

    async fn confirm_match(
        &self,
        id: MatchId,
        confirmation: &MatchConfirmation,
    ) -> ServiceResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        // Compare-and-set on the status: only the first resolver gets a row.
        let result = sqlx::query(
            "UPDATE matches SET status = ?, resolved_at = ?, player1_rating_after = ?, \
             player2_rating_after = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(MatchStatus::Confirmed.as_str())
        .bind(confirmation.resolved_at)
        .bind(confirmation.player1_rating_after)
        .bind(confirmation.player2_rating_after)
        .bind(confirmation.resolved_at)
        .bind(id)
        .bind(MatchStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            return Ok(false);
        }

        let row = sqlx::query("SELECT player1_id, player2_id, sport FROM matches WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let player1_id: PlayerId = row
            .try_get("player1_id")
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let player2_id: PlayerId = row
            .try_get("player2_id")
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let sport: String = row
            .try_get("sport")
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let sport = match Sport::parse(&sport) {
            Some(sport) => sport,
            None => return ServiceError::internal(format!("unknown sport: {}", sport)),
        };

        let update = format!(
            "UPDATE players SET {} = ?, updated_at = ? WHERE id = ?",
            rating_column(sport)
        );
        for (player_id, rating) in [
            (player1_id, confirmation.player1_rating_after),
            (player2_id, confirmation.player2_rating_after),
        ] {
            sqlx::query(&update)
                .bind(rating)
                .bind(confirmation.resolved_at)
                .bind(player_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(true)
    }

    async fn deny_match(
        &self,
        id: MatchId,
        resolved_at: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE matches SET status = ?, resolved_at = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(MatchStatus::Denied.as_str())
        .bind(resolved_at)
        .bind(resolved_at)
        .bind(id)
        .bind(MatchStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_matches_for_player(
        &self,
        player_id: PlayerId,
        statuses: &[MatchStatus],
    ) -> ServiceResult<Vec<MatchRecord>> {
        let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let query_str = format!(
            "SELECT * FROM matches WHERE (player1_id = ? OR player2_id = ?) AND status \
             IN ({}) ORDER BY created_at DESC, id DESC",
            placeholders
        );
        let mut query = sqlx::query(&query_str).bind(player_id).bind(player_id);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        rows.iter()
            .map(|row| {
                Self::match_from_row(row).map_err(|e| ServiceError::Internal(e.to_string()))
            })
            .collect()
    }

    async fn count_confirmed_results(
        &self,
        player_id: PlayerId,
        sport: Sport,
    ) -> ServiceResult<MatchCounts> {
        let wins: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches WHERE winner_id = ? AND sport = ? AND status = ?",
        )
        .bind(player_id)
        .bind(sport.as_str())
        .bind(MatchStatus::Confirmed.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let losses: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches WHERE (player1_id = ? OR player2_id = ?) AND \
             winner_id != ? AND sport = ? AND status = ?",
        )
        .bind(player_id)
        .bind(player_id)
        .bind(player_id)
        .bind(sport.as_str())
        .bind(MatchStatus::Confirmed.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches WHERE (player1_id = ? OR player2_id = ?) AND \
             sport = ? AND status = ?",
        )
        .bind(player_id)
        .bind(player_id)
        .bind(sport.as_str())
        .bind(MatchStatus::Confirmed.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(MatchCounts {
            wins: wins as u32,
            losses: losses as u32,
            total: total as u32,
        })
    }
}
