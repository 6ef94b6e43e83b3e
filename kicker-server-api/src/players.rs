use axum::{
    Json,
    extract::{Path, Query, State},
};
use kicker_server_domain::{
    ServiceError,
    app::AppState,
    leaderboard::SportStats,
    player::Player,
};

use crate::{ApiError, BearerAuth, authenticate};

#[derive(serde::Serialize, Clone)]
pub struct JsonPlayer {
    pub id: i64,
    pub intra_id: i64,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: String,
    pub campus: String,
    pub table_soccer_elo: i32,
    pub table_football_elo: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl JsonPlayer {
    pub fn from_player(player: &Player) -> Self {
        Self {
            id: player.id,
            intra_id: player.external_id,
            login: player.login.clone(),
            first_name: player.first_name.clone(),
            last_name: player.last_name.clone(),
            email: player.email.clone(),
            image_url: player.image_url.clone(),
            campus: player.campus.clone(),
            table_soccer_elo: player.table_soccer_rating,
            table_football_elo: player.table_football_rating,
            created_at: player.created_at.to_rfc3339(),
            updated_at: player.updated_at.to_rfc3339(),
        }
    }
}

#[derive(serde::Serialize)]
pub struct JsonProfileResponse {
    player: JsonPlayer,
}

pub async fn get_profile(
    State(app): State<AppState>,
    auth: BearerAuth,
) -> Result<Json<JsonProfileResponse>, ApiError> {
    let player = authenticate(&app, auth).await?;
    Ok(Json(JsonProfileResponse {
        player: JsonPlayer::from_player(&player),
    }))
}

#[derive(serde::Deserialize)]
pub struct JsonSearchQuery {
    q: Option<String>,
}

#[derive(serde::Serialize)]
pub struct JsonPlayersResponse {
    players: Vec<JsonPlayer>,
}

pub async fn search_players(
    State(app): State<AppState>,
    Query(query): Query<JsonSearchQuery>,
) -> Result<Json<JsonPlayersResponse>, ApiError> {
    let Some(q) = query.q.filter(|q| !q.is_empty()) else {
        return Err(ServiceError::BadRequest("Search query required".to_string()).into());
    };
    let players = app.player_service.search_players(&q).await?;
    Ok(Json(JsonPlayersResponse {
        players: players.iter().map(JsonPlayer::from_player).collect(),
    }))
}

#[derive(serde::Serialize)]
pub struct JsonSportStats {
    elo: i32,
    wins: u32,
    losses: u32,
    total_matches: u32,
    win_rate: f64,
}

impl JsonSportStats {
    fn from_stats(stats: &SportStats) -> Self {
        Self {
            elo: stats.rating,
            wins: stats.wins,
            losses: stats.losses,
            total_matches: stats.total_matches,
            win_rate: stats.win_rate,
        }
    }
}

#[derive(serde::Serialize)]
pub struct JsonStatsBySport {
    table_soccer: JsonSportStats,
    table_football: JsonSportStats,
}

#[derive(serde::Serialize)]
pub struct JsonPlayerStatsResponse {
    player: JsonPlayer,
    stats: JsonStatsBySport,
}

pub async fn get_player_stats(
    State(app): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<JsonPlayerStatsResponse>, ApiError> {
    let stats = app.leaderboard_service.player_stats(&login).await?;
    Ok(Json(JsonPlayerStatsResponse {
        player: JsonPlayer::from_player(&stats.player),
        stats: JsonStatsBySport {
            table_soccer: JsonSportStats::from_stats(&stats.table_soccer),
            table_football: JsonSportStats::from_stats(&stats.table_football),
        },
    }))
}
