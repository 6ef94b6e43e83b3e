use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::info;

use crate::{
    ServiceError, ServiceResult,
    auth::{ArcIdentityProvider, ExternalProfile},
    matches::Sport,
    rating::BASE_RATING,
};

pub type PlayerId = i64;

const IDENTITY_CACHE_CAPACITY: u64 = 1000;

const IDENTITY_CACHE_TTL: Duration = Duration::from_secs(60 * 15);

const SEARCH_RESULT_LIMIT: u32 = 10;

#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub external_id: i64,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: String,
    pub campus: String,
    pub table_soccer_rating: i32,
    pub table_football_rating: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Player {
    pub fn rating_for(&self, sport: Sport) -> i32 {
        match sport {
            Sport::TableSoccer => self.table_soccer_rating,
            Sport::TableFootball => self.table_football_rating,
        }
    }
}

/// Player fields as they exist before the store has assigned an id.
#[derive(Clone, Debug)]
pub struct NewPlayer {
    pub external_id: i64,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: String,
    pub campus: String,
    pub table_soccer_rating: i32,
    pub table_football_rating: i32,
}

impl NewPlayer {
    pub fn from_profile(profile: ExternalProfile) -> Self {
        Self {
            external_id: profile.external_id,
            login: profile.login,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            image_url: profile.image_url,
            campus: profile.campus,
            table_soccer_rating: BASE_RATING,
            table_football_rating: BASE_RATING,
        }
    }
}

pub type ArcPlayerRepository = Arc<Box<dyn PlayerRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait PlayerRepository {
    async fn get_player_by_id(&self, id: PlayerId) -> ServiceResult<Option<Player>>;
    async fn get_player_by_login(&self, login: &str) -> ServiceResult<Option<Player>>;
    async fn get_player_by_external_id(
        &self,
        external_id: i64,
    ) -> ServiceResult<Option<Player>>;
    async fn create_player(&self, new_player: &NewPlayer) -> ServiceResult<Player>;
    async fn search_players(&self, query: &str, limit: u32) -> ServiceResult<Vec<Player>>;
    async fn get_players_by_rating(&self, sport: Sport) -> ServiceResult<Vec<Player>>;
}

pub type ArcPlayerService = Arc<Box<dyn PlayerService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait PlayerService {
    /// Authenticates a bearer credential and returns the matching player,
    /// provisioning a record with baseline ratings on first sight.
    async fn resolve_token(&self, token: &str) -> ServiceResult<Player>;
    async fn get_player_by_login(&self, login: &str) -> ServiceResult<Player>;
    async fn search_players(&self, query: &str) -> ServiceResult<Vec<Player>>;
}

pub struct PlayerServiceImpl {
    identity_provider: ArcIdentityProvider,
    player_repository: ArcPlayerRepository,
    identity_cache: moka::sync::Cache<String, i64>,
}

impl PlayerServiceImpl {
    pub fn new(
        identity_provider: ArcIdentityProvider,
        player_repository: ArcPlayerRepository,
    ) -> Self {
        Self {
            identity_provider,
            player_repository,
            identity_cache: moka::sync::Cache::builder()
                .max_capacity(IDENTITY_CACHE_CAPACITY)
                .time_to_live(IDENTITY_CACHE_TTL)
                .build(),
        }
    }

    async fn register_player(&self, profile: ExternalProfile) -> ServiceResult<Player> {
        let external_id = profile.external_id;
        let new_player = NewPlayer::from_profile(profile);
        match self.player_repository.create_player(&new_player).await {
            Ok(player) => {
                info!(
                    "Registered player {} (external id {})",
                    player.login, external_id
                );
                Ok(player)
            }
            // A concurrent request may have registered the same identity
            // first; the unique constraint on external_id guarantees at
            // most one row, so fall back to fetching it.
            Err(err) => match self
                .player_repository
                .get_player_by_external_id(external_id)
                .await?
            {
                Some(player) => Ok(player),
                None => Err(err),
            },
        }
    }
}

#[async_trait::async_trait]
impl PlayerService for PlayerServiceImpl {
    async fn resolve_token(&self, token: &str) -> ServiceResult<Player> {
        // Only the token -> identity mapping is cached. The player row is
        // read fresh every time so ratings are never served stale.
        if let Some(external_id) = self.identity_cache.get(token) {
            match self
                .player_repository
                .get_player_by_external_id(external_id)
                .await?
            {
                Some(player) => return Ok(player),
                None => self.identity_cache.invalidate(token),
            }
        }

        let profile = self.identity_provider.verify(token).await?;
        let external_id = profile.external_id;
        let player = match self
            .player_repository
            .get_player_by_external_id(external_id)
            .await?
        {
            Some(player) => player,
            None => self.register_player(profile).await?,
        };
        self.identity_cache.insert(token.to_string(), external_id);
        Ok(player)
    }

    async fn get_player_by_login(&self, login: &str) -> ServiceResult<Player> {
        match self.player_repository.get_player_by_login(login).await? {
            Some(player) => Ok(player),
            None => ServiceError::not_found("Player not found"),
        }
    }

    async fn search_players(&self, query: &str) -> ServiceResult<Vec<Player>> {
        if query.is_empty() {
            return ServiceError::bad_request("Search query required");
        }
        self.player_repository
            .search_players(query, SEARCH_RESULT_LIMIT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{auth::IdentityProvider, memory::MemoryPlayerRepository};

    struct StaticIdentityProvider {
        profiles: HashMap<String, ExternalProfile>,
    }

    #[async_trait::async_trait]
    impl IdentityProvider for StaticIdentityProvider {
        async fn verify(&self, token: &str) -> ServiceResult<ExternalProfile> {
            match self.profiles.get(token) {
                Some(profile) => Ok(profile.clone()),
                None => ServiceError::unauthorized("Invalid token"),
            }
        }
    }

    fn profile(external_id: i64, login: &str) -> ExternalProfile {
        ExternalProfile {
            external_id,
            login: login.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: format!("{}@example.com", login),
            image_url: String::new(),
            campus: "Heilbronn".to_string(),
        }
    }

    fn service_with_tokens(
        tokens: &[(&str, ExternalProfile)],
    ) -> (MemoryPlayerRepository, PlayerServiceImpl) {
        let repository = MemoryPlayerRepository::new();
        let provider = StaticIdentityProvider {
            profiles: tokens
                .iter()
                .map(|(token, profile)| (token.to_string(), profile.clone()))
                .collect(),
        };
        let service = PlayerServiceImpl::new(
            Arc::new(Box::new(provider)),
            Arc::new(Box::new(repository.clone())),
        );
        (repository, service)
    }

    #[tokio::test]
    async fn resolve_token_registers_player_once() {
        let (repository, service) =
            service_with_tokens(&[("token-a", profile(42, "alice"))]);

        let first = service.resolve_token("token-a").await.unwrap();
        let second = service.resolve_token("token-a").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.external_id, 42);
        assert_eq!(first.table_soccer_rating, BASE_RATING);
        assert_eq!(first.table_football_rating, BASE_RATING);
        assert_eq!(repository.search_players("alice", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_token_reuses_existing_record() {
        let (repository, service) =
            service_with_tokens(&[("token-a", profile(42, "alice"))]);
        let existing = repository
            .create_player(&NewPlayer::from_profile(profile(42, "alice")))
            .await
            .unwrap();

        let resolved = service.resolve_token("token-a").await.unwrap();

        assert_eq!(resolved.id, existing.id);
    }

    #[tokio::test]
    async fn invalid_token_creates_nothing() {
        let (repository, service) = service_with_tokens(&[]);

        let result = service.resolve_token("bogus").await;

        assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
        assert!(
            repository
                .get_player_by_external_id(42)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn search_requires_a_query_and_caps_results() {
        let (repository, service) = service_with_tokens(&[]);
        for i in 0..12 {
            repository
                .create_player(&NewPlayer::from_profile(profile(
                    100 + i,
                    &format!("kicker{:02}", i),
                )))
                .await
                .unwrap();
        }

        let empty = service.search_players("").await;
        assert!(matches!(empty, Err(ServiceError::BadRequest(_))));

        let hits = service.search_players("kicker").await.unwrap();
        assert_eq!(hits.len(), 10);
    }

    #[tokio::test]
    async fn unknown_login_is_not_found() {
        let (_, service) = service_with_tokens(&[]);

        let result = service.get_player_by_login("nobody").await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
