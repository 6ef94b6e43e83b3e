//! In-memory repositories backing the service tests. The match repository
//! shares the player map so `confirm_match` mutates ratings together with
//! the status flip, like the SQL transaction does.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    ServiceError, ServiceResult,
    matches::{
        MatchConfirmation, MatchCounts, MatchId, MatchRecord, MatchRepository, MatchStatus,
        NewMatch, Sport,
    },
    player::{NewPlayer, Player, PlayerId, PlayerRepository},
};

#[derive(Clone)]
pub struct MemoryPlayerRepository {
    players: Arc<DashMap<PlayerId, Player>>,
    next_id: Arc<Mutex<PlayerId>>,
}

impl MemoryPlayerRepository {
    pub fn new() -> Self {
        Self {
            players: Arc::new(DashMap::new()),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn take_id(&self) -> PlayerId {
        let mut lock = self.next_id.lock().expect("Failed to lock player id counter");
        let id = *lock;
        *lock += 1;
        id
    }

    fn set_rating(&self, id: PlayerId, sport: Sport, rating: i32, at: DateTime<Utc>) {
        if let Some(mut player) = self.players.get_mut(&id) {
            match sport {
                Sport::TableSoccer => player.table_soccer_rating = rating,
                Sport::TableFootball => player.table_football_rating = rating,
            }
            player.updated_at = at;
        }
    }
}

impl Default for MemoryPlayerRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PlayerRepository for MemoryPlayerRepository {
    async fn get_player_by_id(&self, id: PlayerId) -> ServiceResult<Option<Player>> {
        Ok(self.players.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_player_by_login(&self, login: &str) -> ServiceResult<Option<Player>> {
        Ok(self
            .players
            .iter()
            .find(|entry| entry.login == login)
            .map(|entry| entry.value().clone()))
    }

    async fn get_player_by_external_id(
        &self,
        external_id: i64,
    ) -> ServiceResult<Option<Player>> {
        Ok(self
            .players
            .iter()
            .find(|entry| entry.external_id == external_id)
            .map(|entry| entry.value().clone()))
    }

    async fn create_player(&self, new_player: &NewPlayer) -> ServiceResult<Player> {
        if self.players.iter().any(|entry| {
            entry.external_id == new_player.external_id || entry.login == new_player.login
        }) {
            return ServiceError::internal("UNIQUE constraint failed: players");
        }
        let id = self.take_id();
        let now = Utc::now();
        let player = Player {
            id,
            external_id: new_player.external_id,
            login: new_player.login.clone(),
            first_name: new_player.first_name.clone(),
            last_name: new_player.last_name.clone(),
            email: new_player.email.clone(),
            image_url: new_player.image_url.clone(),
            campus: new_player.campus.clone(),
            table_soccer_rating: new_player.table_soccer_rating,
            table_football_rating: new_player.table_football_rating,
            created_at: now,
            updated_at: now,
        };
        self.players.insert(id, player.clone());
        Ok(player)
    }

    async fn search_players(&self, query: &str, limit: u32) -> ServiceResult<Vec<Player>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<Player> = self
            .players
            .iter()
            .filter(|entry| {
                entry.login.to_lowercase().contains(&needle)
                    || entry.first_name.to_lowercase().contains(&needle)
                    || entry.last_name.to_lowercase().contains(&needle)
            })
            .map(|entry| entry.value().clone())
            .collect();
        hits.sort_by_key(|player| player.id);
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn get_players_by_rating(&self, sport: Sport) -> ServiceResult<Vec<Player>> {
        let mut players: Vec<Player> = self
            .players
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        players.sort_by(|a, b| {
            b.rating_for(sport)
                .cmp(&a.rating_for(sport))
                .then(a.id.cmp(&b.id))
        });
        Ok(players)
    }
}

#[derive(Clone)]
pub struct MemoryMatchRepository {
    players: MemoryPlayerRepository,
    matches: Arc<DashMap<MatchId, MatchRecord>>,
    next_id: Arc<Mutex<MatchId>>,
}

impl MemoryMatchRepository {
    pub fn new(players: MemoryPlayerRepository) -> Self {
        Self {
            players,
            matches: Arc::new(DashMap::new()),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn take_id(&self) -> MatchId {
        let mut lock = self.next_id.lock().expect("Failed to lock match id counter");
        let id = *lock;
        *lock += 1;
        id
    }
}

#[async_trait::async_trait]
impl MatchRepository for MemoryMatchRepository {
    async fn get_match(&self, id: MatchId) -> ServiceResult<Option<MatchRecord>> {
        Ok(self.matches.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create_match(&self, new_match: &NewMatch) -> ServiceResult<MatchRecord> {
        let id = self.take_id();
        let now = new_match.submitted_at;
        let record = MatchRecord {
            id,
            player1_id: new_match.player1_id,
            player2_id: new_match.player2_id,
            winner_id: new_match.winner_id,
            sport: new_match.sport,
            score: new_match.score.clone(),
            status: MatchStatus::Pending,
            player1_rating_before: new_match.player1_rating_before,
            player2_rating_before: new_match.player2_rating_before,
            player1_rating_after: 0,
            player2_rating_after: 0,
            submitted_at: new_match.submitted_at,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.matches.insert(id, record.clone());
        Ok(record)
    }

    async fn confirm_match(
        &self,
        id: MatchId,
        confirmation: &MatchConfirmation,
    ) -> ServiceResult<bool> {
        let Some(mut record) = self.matches.get_mut(&id) else {
            return Ok(false);
        };
        if record.status != MatchStatus::Pending {
            return Ok(false);
        }
        record.status = MatchStatus::Confirmed;
        record.resolved_at = Some(confirmation.resolved_at);
        record.player1_rating_after = confirmation.player1_rating_after;
        record.player2_rating_after = confirmation.player2_rating_after;
        record.updated_at = confirmation.resolved_at;

        let (player1_id, player2_id, sport) =
            (record.player1_id, record.player2_id, record.sport);
        drop(record);

        self.players.set_rating(
            player1_id,
            sport,
            confirmation.player1_rating_after,
            confirmation.resolved_at,
        );
        self.players.set_rating(
            player2_id,
            sport,
            confirmation.player2_rating_after,
            confirmation.resolved_at,
        );
        Ok(true)
    }

    async fn deny_match(
        &self,
        id: MatchId,
        resolved_at: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let Some(mut record) = self.matches.get_mut(&id) else {
            return Ok(false);
        };
        if record.status != MatchStatus::Pending {
            return Ok(false);
        }
        record.status = MatchStatus::Denied;
        record.resolved_at = Some(resolved_at);
        record.updated_at = resolved_at;
        Ok(true)
    }

    async fn get_matches_for_player(
        &self,
        player_id: PlayerId,
        statuses: &[MatchStatus],
    ) -> ServiceResult<Vec<MatchRecord>> {
        let mut records: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|entry| {
                entry.is_participant(player_id) && statuses.contains(&entry.status)
            })
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.id.cmp(&a.id))
        });
        Ok(records)
    }

    async fn count_confirmed_results(
        &self,
        player_id: PlayerId,
        sport: Sport,
    ) -> ServiceResult<MatchCounts> {
        let mut counts = MatchCounts::default();
        for entry in self.matches.iter() {
            if entry.status != MatchStatus::Confirmed
                || entry.sport != sport
                || !entry.is_participant(player_id)
            {
                continue;
            }
            counts.total += 1;
            if entry.winner_id == player_id {
                counts.wins += 1;
            } else {
                counts.losses += 1;
            }
        }
        Ok(counts)
    }
}
