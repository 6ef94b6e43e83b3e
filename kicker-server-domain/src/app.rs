use std::sync::Arc;

use crate::{
    auth::ArcIdentityProvider,
    leaderboard::{ArcLeaderboardService, LeaderboardServiceImpl},
    matches::{ArcMatchRepository, ArcMatchService, MatchServiceImpl},
    player::{ArcPlayerRepository, ArcPlayerService, PlayerServiceImpl},
};

#[derive(Clone)]
pub struct AppState {
    pub player_service: ArcPlayerService,
    pub match_service: ArcMatchService,
    pub leaderboard_service: ArcLeaderboardService,

    pub player_repository: ArcPlayerRepository,
    pub match_repository: ArcMatchRepository,
}

pub fn construct_app(
    player_repository: ArcPlayerRepository,
    match_repository: ArcMatchRepository,
    identity_provider: ArcIdentityProvider,
) -> AppState {
    let player_service: ArcPlayerService = Arc::new(Box::new(PlayerServiceImpl::new(
        identity_provider,
        player_repository.clone(),
    )));

    let match_service: ArcMatchService = Arc::new(Box::new(MatchServiceImpl::new(
        match_repository.clone(),
        player_repository.clone(),
    )));

    let leaderboard_service: ArcLeaderboardService =
        Arc::new(Box::new(LeaderboardServiceImpl::new(
            player_service.clone(),
            player_repository.clone(),
            match_repository.clone(),
        )));

    AppState {
        player_service,
        match_service,
        leaderboard_service,

        player_repository,
        match_repository,
    }
}
