use std::sync::Arc;

use crate::{
    ServiceResult,
    matches::{ArcMatchRepository, MatchCounts, Sport},
    player::{ArcPlayerRepository, ArcPlayerService, Player},
};

#[derive(Clone, Debug)]
pub struct LeaderboardEntry {
    pub player: Player,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub rank: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct SportStats {
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub total_matches: u32,
    pub win_rate: f64,
}

#[derive(Clone, Debug)]
pub struct PlayerStats {
    pub player: Player,
    pub table_soccer: SportStats,
    pub table_football: SportStats,
}

pub type ArcLeaderboardService = Arc<Box<dyn LeaderboardService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait LeaderboardService {
    /// Every player ranked by descending current rating for the sport, ties
    /// broken by id, annotated with confirmed-match counts.
    async fn leaderboard(&self, sport: Sport) -> ServiceResult<Vec<LeaderboardEntry>>;
    async fn player_stats(&self, login: &str) -> ServiceResult<PlayerStats>;
}

pub struct LeaderboardServiceImpl {
    player_service: ArcPlayerService,
    player_repository: ArcPlayerRepository,
    match_repository: ArcMatchRepository,
}

impl LeaderboardServiceImpl {
    pub fn new(
        player_service: ArcPlayerService,
        player_repository: ArcPlayerRepository,
        match_repository: ArcMatchRepository,
    ) -> Self {
        Self {
            player_service,
            player_repository,
            match_repository,
        }
    }

    fn win_rate(wins: u32, games: u32) -> f64 {
        if games == 0 {
            0.0
        } else {
            f64::from(wins) / f64::from(games) * 100.0
        }
    }

    async fn sport_stats(&self, player: &Player, sport: Sport) -> ServiceResult<SportStats> {
        let MatchCounts {
            wins,
            losses,
            total,
        } = self
            .match_repository
            .count_confirmed_results(player.id, sport)
            .await?;
        Ok(SportStats {
            rating: player.rating_for(sport),
            wins,
            losses,
            total_matches: total,
            win_rate: Self::win_rate(wins, total),
        })
    }
}

#[async_trait::async_trait]
impl LeaderboardService for LeaderboardServiceImpl {
    async fn leaderboard(&self, sport: Sport) -> ServiceResult<Vec<LeaderboardEntry>> {
        let players = self.player_repository.get_players_by_rating(sport).await?;
        let mut entries = Vec::with_capacity(players.len());
        for (index, player) in players.into_iter().enumerate() {
            let counts = self
                .match_repository
                .count_confirmed_results(player.id, sport)
                .await?;
            let games = counts.wins + counts.losses;
            entries.push(LeaderboardEntry {
                rating: player.rating_for(sport),
                wins: counts.wins,
                losses: counts.losses,
                win_rate: Self::win_rate(counts.wins, games),
                rank: index as u32 + 1,
                player,
            });
        }
        Ok(entries)
    }

    async fn player_stats(&self, login: &str) -> ServiceResult<PlayerStats> {
        let player = self.player_service.get_player_by_login(login).await?;
        let table_soccer = self.sport_stats(&player, Sport::TableSoccer).await?;
        let table_football = self.sport_stats(&player, Sport::TableFootball).await?;
        Ok(PlayerStats {
            player,
            table_soccer,
            table_football,
        })
    }
}
