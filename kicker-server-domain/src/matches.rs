use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use log::info;

use crate::{
    ServiceError, ServiceResult,
    player::{ArcPlayerRepository, Player, PlayerId},
    rating::compute_updated_ratings,
};

pub type MatchId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sport {
    TableSoccer,
    TableFootball,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::TableSoccer => "table_soccer",
            Sport::TableFootball => "table_football",
        }
    }

    pub fn parse(value: &str) -> Option<Sport> {
        match value {
            "table_soccer" => Some(Sport::TableSoccer),
            "table_football" => Some(Sport::TableFootball),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStatus {
    Pending,
    Confirmed,
    Denied,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Denied => "denied",
        }
    }

    pub fn parse(value: &str) -> Option<MatchStatus> {
        match value {
            "pending" => Some(MatchStatus::Pending),
            "confirmed" => Some(MatchStatus::Confirmed),
            "denied" => Some(MatchStatus::Denied),
            _ => None,
        }
    }
}

/// A submitted contest between two players. The before snapshots are fixed
/// at submission time; the after snapshots are zero until the match is
/// confirmed.
#[derive(Clone, Debug)]
pub struct MatchRecord {
    pub id: MatchId,
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub winner_id: PlayerId,
    pub sport: Sport,
    pub score: String,
    pub status: MatchStatus,
    pub player1_rating_before: i32,
    pub player2_rating_before: i32,
    pub player1_rating_after: i32,
    pub player2_rating_after: i32,
    pub submitted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn is_participant(&self, player_id: PlayerId) -> bool {
        self.player1_id == player_id || self.player2_id == player_id
    }
}

#[derive(Clone, Debug)]
pub struct NewMatch {
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub winner_id: PlayerId,
    pub sport: Sport,
    pub score: String,
    pub player1_rating_before: i32,
    pub player2_rating_before: i32,
    pub submitted_at: DateTime<Utc>,
}

/// Terminal outcome written by the confirm transaction. The same two values
/// become the match's after snapshots and the players' current ratings.
#[derive(Clone, Debug)]
pub struct MatchConfirmation {
    pub resolved_at: DateTime<Utc>,
    pub player1_rating_after: i32,
    pub player2_rating_after: i32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MatchCounts {
    pub wins: u32,
    pub losses: u32,
    pub total: u32,
}

pub type ArcMatchRepository = Arc<Box<dyn MatchRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait MatchRepository {
    async fn get_match(&self, id: MatchId) -> ServiceResult<Option<MatchRecord>>;
    async fn create_match(&self, new_match: &NewMatch) -> ServiceResult<MatchRecord>;
    /// Transitions pending -> confirmed and writes both players' ratings in
    /// the same transaction. Returns false when the match was no longer
    /// pending, in which case nothing was written.
    async fn confirm_match(
        &self,
        id: MatchId,
        confirmation: &MatchConfirmation,
    ) -> ServiceResult<bool>;
    /// Transitions pending -> denied. Returns false when the match was no
    /// longer pending.
    async fn deny_match(
        &self,
        id: MatchId,
        resolved_at: DateTime<Utc>,
    ) -> ServiceResult<bool>;
    async fn get_matches_for_player(
        &self,
        player_id: PlayerId,
        statuses: &[MatchStatus],
    ) -> ServiceResult<Vec<MatchRecord>>;
    async fn count_confirmed_results(
        &self,
        player_id: PlayerId,
        sport: Sport,
    ) -> ServiceResult<MatchCounts>;
}

/// A match joined with its participant records, in submitter/opponent order.
#[derive(Clone, Debug)]
pub struct MatchDetails {
    pub record: MatchRecord,
    pub player1: Player,
    pub player2: Player,
}

impl MatchDetails {
    pub fn winner(&self) -> &Player {
        if self.record.winner_id == self.player1.id {
            &self.player1
        } else {
            &self.player2
        }
    }
}

pub type ArcMatchService = Arc<Box<dyn MatchService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait MatchService {
    async fn submit_match(
        &self,
        submitter: &Player,
        opponent_login: &str,
        sport: Sport,
        score: String,
        submitter_won: bool,
    ) -> ServiceResult<MatchDetails>;
    async fn resolve_match(
        &self,
        id: MatchId,
        acting_player: &Player,
        confirmed: bool,
    ) -> ServiceResult<MatchDetails>;
    async fn pending_matches(&self, player: &Player) -> ServiceResult<Vec<MatchDetails>>;
    async fn match_history(&self, player: &Player) -> ServiceResult<Vec<MatchDetails>>;
}

pub struct MatchServiceImpl {
    match_repository: ArcMatchRepository,
    player_repository: ArcPlayerRepository,
}

impl MatchServiceImpl {
    pub fn new(
        match_repository: ArcMatchRepository,
        player_repository: ArcPlayerRepository,
    ) -> Self {
        Self {
            match_repository,
            player_repository,
        }
    }

    async fn fetch_participant(&self, id: PlayerId) -> ServiceResult<Player> {
        match self.player_repository.get_player_by_id(id).await? {
            Some(player) => Ok(player),
            None => ServiceError::internal("Match participant missing from player store"),
        }
    }

    async fn match_details(&self, id: MatchId) -> ServiceResult<MatchDetails> {
        let Some(record) = self.match_repository.get_match(id).await? else {
            return ServiceError::not_found("Match not found");
        };
        let player1 = self.fetch_participant(record.player1_id).await?;
        let player2 = self.fetch_participant(record.player2_id).await?;
        Ok(MatchDetails {
            record,
            player1,
            player2,
        })
    }

    async fn with_participants(
        &self,
        records: Vec<MatchRecord>,
    ) -> ServiceResult<Vec<MatchDetails>> {
        let mut players: HashMap<PlayerId, Player> = HashMap::new();
        let mut details = Vec::with_capacity(records.len());
        for record in records {
            for id in [record.player1_id, record.player2_id] {
                if !players.contains_key(&id) {
                    let player = self.fetch_participant(id).await?;
                    players.insert(id, player);
                }
            }
            let player1 = players[&record.player1_id].clone();
            let player2 = players[&record.player2_id].clone();
            details.push(MatchDetails {
                record,
                player1,
                player2,
            });
        }
        Ok(details)
    }

    async fn apply_confirmation(
        &self,
        record: &MatchRecord,
        resolved_at: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let player1 = self.fetch_participant(record.player1_id).await?;
        let player2 = self.fetch_participant(record.player2_id).await?;

        // Ratings may have moved since submission; the engine always
        // consumes the current values, not the submission snapshots.
        let (winner, loser) = if record.winner_id == player1.id {
            (&player1, &player2)
        } else {
            (&player2, &player1)
        };
        let (new_winner_rating, new_loser_rating) = compute_updated_ratings(
            winner.rating_for(record.sport),
            loser.rating_for(record.sport),
        );

        let (player1_rating_after, player2_rating_after) =
            if record.winner_id == player1.id {
                (new_winner_rating, new_loser_rating)
            } else {
                (new_loser_rating, new_winner_rating)
            };

        let confirmation = MatchConfirmation {
            resolved_at,
            player1_rating_after,
            player2_rating_after,
        };
        self.match_repository
            .confirm_match(record.id, &confirmation)
            .await
    }
}

#[async_trait::async_trait]
impl MatchService for MatchServiceImpl {
    async fn submit_match(
        &self,
        submitter: &Player,
        opponent_login: &str,
        sport: Sport,
        score: String,
        submitter_won: bool,
    ) -> ServiceResult<MatchDetails> {
        let Some(opponent) = self
            .player_repository
            .get_player_by_login(opponent_login)
            .await?
        else {
            return ServiceError::not_found("Opponent not found");
        };
        if opponent.id == submitter.id {
            return ServiceError::bad_request("Cannot play against yourself");
        }

        let winner_id = if submitter_won {
            submitter.id
        } else {
            opponent.id
        };
        let new_match = NewMatch {
            player1_id: submitter.id,
            player2_id: opponent.id,
            winner_id,
            sport,
            score,
            player1_rating_before: submitter.rating_for(sport),
            player2_rating_before: opponent.rating_for(sport),
            submitted_at: Utc::now(),
        };
        let record = self.match_repository.create_match(&new_match).await?;
        info!(
            "Match {} submitted by {} against {}",
            record.id, submitter.login, opponent.login
        );
        Ok(MatchDetails {
            record,
            player1: submitter.clone(),
            player2: opponent,
        })
    }

    async fn resolve_match(
        &self,
        id: MatchId,
        acting_player: &Player,
        confirmed: bool,
    ) -> ServiceResult<MatchDetails> {
        let Some(record) = self.match_repository.get_match(id).await? else {
            return ServiceError::not_found("Match not found");
        };
        if !record.is_participant(acting_player.id) {
            return ServiceError::forbidden("You are not part of this match");
        }
        if record.status != MatchStatus::Pending {
            return ServiceError::conflict("Match already processed");
        }

        let resolved_at = Utc::now();
        let applied = if confirmed {
            self.apply_confirmation(&record, resolved_at).await?
        } else {
            self.match_repository.deny_match(id, resolved_at).await?
        };
        // The compare-and-set lost: someone else resolved the match between
        // our status check and the write.
        if !applied {
            return ServiceError::conflict("Match already processed");
        }

        info!(
            "Match {} {} by {}",
            id,
            if confirmed { "confirmed" } else { "denied" },
            acting_player.login
        );
        self.match_details(id).await
    }

    async fn pending_matches(&self, player: &Player) -> ServiceResult<Vec<MatchDetails>> {
        let records = self
            .match_repository
            .get_matches_for_player(player.id, &[MatchStatus::Pending])
            .await?;
        self.with_participants(records).await
    }

    async fn match_history(&self, player: &Player) -> ServiceResult<Vec<MatchDetails>> {
        let records = self
            .match_repository
            .get_matches_for_player(
                player.id,
                &[MatchStatus::Confirmed, MatchStatus::Denied],
            )
            .await?;
        self.with_participants(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::{MemoryMatchRepository, MemoryPlayerRepository},
        player::{NewPlayer, PlayerRepository},
        rating::BASE_RATING,
    };

    struct Fixture {
        players: MemoryPlayerRepository,
        service: MatchServiceImpl,
    }

    impl Fixture {
        fn new() -> Self {
            let players = MemoryPlayerRepository::new();
            let matches = MemoryMatchRepository::new(players.clone());
            let service = MatchServiceImpl::new(
                Arc::new(Box::new(matches)),
                Arc::new(Box::new(players.clone())),
            );
            Self { players, service }
        }

        async fn add_player(&self, external_id: i64, login: &str) -> Player {
            self.players
                .create_player(&NewPlayer {
                    external_id,
                    login: login.to_string(),
                    first_name: String::new(),
                    last_name: String::new(),
                    email: String::new(),
                    image_url: String::new(),
                    campus: String::new(),
                    table_soccer_rating: BASE_RATING,
                    table_football_rating: BASE_RATING,
                })
                .await
                .unwrap()
        }

        async fn player(&self, id: PlayerId) -> Player {
            self.players.get_player_by_id(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn submitting_against_yourself_is_rejected() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;

        let result = fixture
            .service
            .submit_match(&alice, "alice", Sport::TableSoccer, "10-8".into(), true)
            .await;

        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
        assert!(fixture.service.pending_matches(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submitting_against_unknown_opponent_is_not_found() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;

        let result = fixture
            .service
            .submit_match(&alice, "nobody", Sport::TableSoccer, "10-8".into(), true)
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn submit_captures_rating_snapshots() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        let bob = fixture.add_player(2, "bob").await;

        let details = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "10-8".into(), true)
            .await
            .unwrap();

        let record = &details.record;
        assert_eq!(record.status, MatchStatus::Pending);
        assert_eq!(record.player1_id, alice.id);
        assert_eq!(record.player2_id, bob.id);
        assert_eq!(record.winner_id, alice.id);
        assert_eq!(record.player1_rating_before, BASE_RATING);
        assert_eq!(record.player2_rating_before, BASE_RATING);
        assert_eq!(record.player1_rating_after, 0);
        assert_eq!(record.player2_rating_after, 0);
        assert!(record.resolved_at.is_none());
    }

    #[tokio::test]
    async fn losing_submitter_marks_the_opponent_as_winner() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        let bob = fixture.add_player(2, "bob").await;

        let details = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "3-10".into(), false)
            .await
            .unwrap();

        assert_eq!(details.record.winner_id, bob.id);
        assert_eq!(details.winner().id, bob.id);
    }

    #[tokio::test]
    async fn confirming_applies_ratings_to_players_and_snapshots() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        let bob = fixture.add_player(2, "bob").await;

        let submitted = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "10-8".into(), true)
            .await
            .unwrap();
        let details = fixture
            .service
            .resolve_match(submitted.record.id, &bob, true)
            .await
            .unwrap();

        let record = &details.record;
        assert_eq!(record.status, MatchStatus::Confirmed);
        assert!(record.resolved_at.is_some());
        assert_eq!(record.player1_rating_after, 1216);
        assert_eq!(record.player2_rating_after, 1184);

        let alice = fixture.player(alice.id).await;
        let bob = fixture.player(bob.id).await;
        assert_eq!(alice.table_soccer_rating, 1216);
        assert_eq!(bob.table_soccer_rating, 1184);
        // The other sport's rating pool is untouched.
        assert_eq!(alice.table_football_rating, BASE_RATING);
        assert_eq!(bob.table_football_rating, BASE_RATING);
    }

    #[tokio::test]
    async fn denying_changes_no_ratings() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        let bob = fixture.add_player(2, "bob").await;

        let submitted = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "10-8".into(), true)
            .await
            .unwrap();
        let details = fixture
            .service
            .resolve_match(submitted.record.id, &bob, false)
            .await
            .unwrap();

        assert_eq!(details.record.status, MatchStatus::Denied);
        assert!(details.record.resolved_at.is_some());
        assert_eq!(details.record.player1_rating_after, 0);
        assert_eq!(details.record.player2_rating_after, 0);
        assert_eq!(fixture.player(alice.id).await.table_soccer_rating, BASE_RATING);
        assert_eq!(fixture.player(bob.id).await.table_soccer_rating, BASE_RATING);
    }

    #[tokio::test]
    async fn resolving_twice_conflicts_and_ratings_apply_once() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        let bob = fixture.add_player(2, "bob").await;

        let submitted = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "10-8".into(), true)
            .await
            .unwrap();
        fixture
            .service
            .resolve_match(submitted.record.id, &bob, true)
            .await
            .unwrap();

        let again = fixture
            .service
            .resolve_match(submitted.record.id, &bob, true)
            .await;
        assert!(matches!(again, Err(ServiceError::Conflict(_))));

        let deny_after = fixture
            .service
            .resolve_match(submitted.record.id, &alice, false)
            .await;
        assert!(matches!(deny_after, Err(ServiceError::Conflict(_))));

        assert_eq!(fixture.player(alice.id).await.table_soccer_rating, 1216);
        assert_eq!(fixture.player(bob.id).await.table_soccer_rating, 1184);
    }

    #[tokio::test]
    async fn non_participants_cannot_resolve() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        fixture.add_player(2, "bob").await;
        let carol = fixture.add_player(3, "carol").await;

        let submitted = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "10-8".into(), true)
            .await
            .unwrap();

        let result = fixture
            .service
            .resolve_match(submitted.record.id, &carol, true)
            .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let pending = fixture.service.pending_matches(&alice).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record.status, MatchStatus::Pending);
    }

    #[tokio::test]
    async fn resolving_unknown_match_is_not_found() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;

        let result = fixture.service.resolve_match(999, &alice, true).await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn resolving_uses_current_ratings_not_snapshots() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        let bob = fixture.add_player(2, "bob").await;
        let carol = fixture.add_player(3, "carol").await;

        // First match stays pending while alice plays (and beats) carol.
        let stale = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "10-8".into(), true)
            .await
            .unwrap();
        let interleaved = fixture
            .service
            .submit_match(&alice, "carol", Sport::TableSoccer, "10-2".into(), true)
            .await
            .unwrap();
        fixture
            .service
            .resolve_match(interleaved.record.id, &carol, true)
            .await
            .unwrap();
        assert_eq!(fixture.player(alice.id).await.table_soccer_rating, 1216);

        // The stale match still carries the 1200 snapshot, but confirming it
        // feeds the engine alice's current 1216.
        let details = fixture
            .service
            .resolve_match(stale.record.id, &bob, true)
            .await
            .unwrap();
        assert_eq!(details.record.player1_rating_before, BASE_RATING);
        let (expected_winner, expected_loser) =
            compute_updated_ratings(1216, BASE_RATING);
        assert_eq!(details.record.player1_rating_after, expected_winner);
        assert_eq!(details.record.player2_rating_after, expected_loser);
        assert_eq!(
            fixture.player(alice.id).await.table_soccer_rating,
            expected_winner
        );
        assert_eq!(
            fixture.player(bob.id).await.table_soccer_rating,
            expected_loser
        );
    }

    #[tokio::test]
    async fn pending_and_history_are_partitioned_by_status() {
        let fixture = Fixture::new();
        let alice = fixture.add_player(1, "alice").await;
        let bob = fixture.add_player(2, "bob").await;

        let first = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableSoccer, "10-8".into(), true)
            .await
            .unwrap();
        let second = fixture
            .service
            .submit_match(&alice, "bob", Sport::TableFootball, "5-10".into(), false)
            .await
            .unwrap();
        fixture
            .service
            .resolve_match(first.record.id, &bob, true)
            .await
            .unwrap();

        let pending = fixture.service.pending_matches(&alice).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record.id, second.record.id);

        let history = fixture.service.match_history(&bob).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record.id, first.record.id);
        assert_eq!(history[0].record.status, MatchStatus::Confirmed);
    }
}
