use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kicker_server_domain::{
    ServiceError,
    app::AppState,
    matches::{MatchDetails, MatchId, Sport},
};

use crate::{ApiError, BearerAuth, authenticate, players::JsonPlayer};

#[derive(serde::Deserialize)]
pub struct JsonSubmitMatchRequest {
    opponent_login: String,
    sport: String,
    score: String,
    i_won: bool,
}

#[derive(serde::Deserialize)]
pub struct JsonConfirmMatchRequest {
    confirmed: bool,
}

#[derive(serde::Serialize)]
pub struct JsonMatch {
    id: i64,
    player1_id: i64,
    player2_id: i64,
    winner_id: i64,
    player1: JsonPlayer,
    player2: JsonPlayer,
    winner: JsonPlayer,
    sport: String,
    score: String,
    status: String,
    player1_elo_before: i32,
    player2_elo_before: i32,
    player1_elo_after: i32,
    player2_elo_after: i32,
    submitted_at: String,
    confirmed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JsonMatch {
    pub fn from_details(details: &MatchDetails) -> Self {
        let record = &details.record;
        Self {
            id: record.id,
            player1_id: record.player1_id,
            player2_id: record.player2_id,
            winner_id: record.winner_id,
            player1: JsonPlayer::from_player(&details.player1),
            player2: JsonPlayer::from_player(&details.player2),
            winner: JsonPlayer::from_player(details.winner()),
            sport: record.sport.as_str().to_string(),
            score: record.score.clone(),
            status: record.status.as_str().to_string(),
            player1_elo_before: record.player1_rating_before,
            player2_elo_before: record.player2_rating_before,
            player1_elo_after: record.player1_rating_after,
            player2_elo_after: record.player2_rating_after,
            submitted_at: record.submitted_at.to_rfc3339(),
            confirmed_at: record.resolved_at.map(|at| at.to_rfc3339()),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

#[derive(serde::Serialize)]
pub struct JsonMatchResponse {
    message: String,
    r#match: JsonMatch,
}

#[derive(serde::Serialize)]
pub struct JsonMatchesResponse {
    matches: Vec<JsonMatch>,
}

pub async fn submit_match(
    State(app): State<AppState>,
    auth: BearerAuth,
    Json(request): Json<JsonSubmitMatchRequest>,
) -> Result<(StatusCode, Json<JsonMatchResponse>), ApiError> {
    let player = authenticate(&app, auth).await?;
    let Some(sport) = Sport::parse(&request.sport) else {
        return Err(ServiceError::BadRequest("Invalid sport type".to_string()).into());
    };
    if request.score.trim().is_empty() {
        return Err(ServiceError::BadRequest("Score required".to_string()).into());
    }

    let details = app
        .match_service
        .submit_match(
            &player,
            &request.opponent_login,
            sport,
            request.score,
            request.i_won,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(JsonMatchResponse {
            message: "Match submitted successfully".to_string(),
            r#match: JsonMatch::from_details(&details),
        }),
    ))
}

pub async fn confirm_match(
    State(app): State<AppState>,
    Path(id): Path<MatchId>,
    auth: BearerAuth,
    Json(request): Json<JsonConfirmMatchRequest>,
) -> Result<Json<JsonMatchResponse>, ApiError> {
    let player = authenticate(&app, auth).await?;
    let details = app
        .match_service
        .resolve_match(id, &player, request.confirmed)
        .await?;
    Ok(Json(JsonMatchResponse {
        message: "Match updated successfully".to_string(),
        r#match: JsonMatch::from_details(&details),
    }))
}

pub async fn get_pending_matches(
    State(app): State<AppState>,
    auth: BearerAuth,
) -> Result<Json<JsonMatchesResponse>, ApiError> {
    let player = authenticate(&app, auth).await?;
    let matches = app.match_service.pending_matches(&player).await?;
    Ok(Json(JsonMatchesResponse {
        matches: matches.iter().map(JsonMatch::from_details).collect(),
    }))
}

pub async fn get_match_history(
    State(app): State<AppState>,
    auth: BearerAuth,
) -> Result<Json<JsonMatchesResponse>, ApiError> {
    let player = authenticate(&app, auth).await?;
    let matches = app.match_service.match_history(&player).await?;
    Ok(Json(JsonMatchesResponse {
        matches: matches.iter().map(JsonMatch::from_details).collect(),
    }))
}
