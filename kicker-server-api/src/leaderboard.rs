use axum::{
    Json,
    extract::{Query, State},
};
use kicker_server_domain::{
    ServiceError,
    app::AppState,
    leaderboard::LeaderboardEntry,
    matches::Sport,
};

use crate::{ApiError, players::JsonPlayer};

#[derive(serde::Deserialize)]
pub struct JsonLeaderboardQuery {
    sport: Option<String>,
}

#[derive(serde::Serialize)]
pub struct JsonLeaderboardEntry {
    player: JsonPlayer,
    elo: i32,
    wins: u32,
    losses: u32,
    win_rate: f64,
    rank: u32,
}

impl JsonLeaderboardEntry {
    fn from_entry(entry: &LeaderboardEntry) -> Self {
        Self {
            player: JsonPlayer::from_player(&entry.player),
            elo: entry.rating,
            wins: entry.wins,
            losses: entry.losses,
            win_rate: entry.win_rate,
            rank: entry.rank,
        }
    }
}

#[derive(serde::Serialize)]
pub struct JsonLeaderboardResponse {
    sport: String,
    leaderboard: Vec<JsonLeaderboardEntry>,
}

pub async fn get_leaderboard(
    State(app): State<AppState>,
    Query(query): Query<JsonLeaderboardQuery>,
) -> Result<Json<JsonLeaderboardResponse>, ApiError> {
    let sport = match query.sport.filter(|sport| !sport.is_empty()) {
        Some(value) => match Sport::parse(&value) {
            Some(sport) => sport,
            None => {
                return Err(
                    ServiceError::BadRequest("Invalid sport type".to_string()).into()
                );
            }
        },
        None => Sport::TableSoccer,
    };

    let entries = app.leaderboard_service.leaderboard(sport).await?;
    Ok(Json(JsonLeaderboardResponse {
        sport: sport.as_str().to_string(),
        leaderboard: entries.iter().map(JsonLeaderboardEntry::from_entry).collect(),
    }))
}
