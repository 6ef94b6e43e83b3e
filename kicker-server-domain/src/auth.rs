use std::sync::Arc;

use crate::ServiceResult;

/// Profile returned by the external identity provider for a valid
/// credential. `external_id` is the provider's durable user id and is the
/// key under which a local player record is provisioned.
#[derive(Clone, Debug)]
pub struct ExternalProfile {
    pub external_id: i64,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: String,
    pub campus: String,
}

pub type ArcIdentityProvider = Arc<Box<dyn IdentityProvider + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait IdentityProvider {
    /// Validates a bearer credential against the provider and returns the
    /// holder's profile. Fails with `Unauthorized` for invalid credentials
    /// and for accounts outside the allowed population.
    async fn verify(&self, token: &str) -> ServiceResult<ExternalProfile>;
}
