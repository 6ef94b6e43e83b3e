//! Identity provider adapter for the 42 intra API.

use kicker_server_domain::{
    ServiceError, ServiceResult,
    auth::{ExternalProfile, IdentityProvider},
};
use log::debug;

const DEFAULT_INTRA_API_URL: &str = "https://api.intra.42.fr";

const DEFAULT_ALLOWED_CAMPUS: &str = "heilbronn";

pub struct IntraIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    allowed_campus: String,
}

#[derive(serde::Deserialize, Debug)]
struct IntraUser {
    id: i64,
    login: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    image: IntraImage,
    #[serde(default)]
    campus: Vec<IntraCampus>,
}

#[derive(serde::Deserialize, Debug, Default)]
struct IntraImage {
    #[serde(default)]
    link: String,
}

#[derive(serde::Deserialize, Debug)]
struct IntraCampus {
    name: String,
}

impl IntraIdentityProvider {
    pub fn new() -> Self {
        let base_url = std::env::var("KICKER_INTRA_API_URL")
            .unwrap_or_else(|_| DEFAULT_INTRA_API_URL.to_string());
        let allowed_campus = std::env::var("KICKER_ALLOWED_CAMPUS")
            .unwrap_or_else(|_| DEFAULT_ALLOWED_CAMPUS.to_string())
            .to_lowercase();
        Self {
            client: reqwest::Client::new(),
            base_url,
            allowed_campus,
        }
    }

    fn user_to_profile(user: IntraUser) -> ExternalProfile {
        let campus = user
            .campus
            .into_iter()
            .next()
            .map(|campus| campus.name)
            .unwrap_or_default();
        ExternalProfile {
            external_id: user.id,
            login: user.login,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            image_url: user.image.link,
            campus,
        }
    }
}

impl Default for IntraIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for IntraIdentityProvider {
    async fn verify(&self, token: &str) -> ServiceResult<ExternalProfile> {
        let response = self
            .client
            .get(format!("{}/v2/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                ServiceError::Unauthorized(format!("Identity provider request failed: {}", e))
            })?;

        if !response.status().is_success() {
            debug!("Identity provider rejected token: {}", response.status());
            return ServiceError::unauthorized("Invalid token");
        }

        let user: IntraUser = response.json().await.map_err(|e| {
            ServiceError::Unauthorized(format!("Invalid identity provider response: {}", e))
        })?;

        let profile = Self::user_to_profile(user);
        if !profile
            .campus
            .to_lowercase()
            .contains(&self.allowed_campus)
        {
            return ServiceError::unauthorized(
                "Account does not belong to the allowed campus",
            );
        }
        Ok(profile)
    }
}
