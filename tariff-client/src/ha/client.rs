use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::{HaError, HaResult};
use crate::domain::SensorState;

const SUPERVISOR_BASE_URL: &str = "http://supervisor/core";
const DEFAULT_BASE_URL: &str = "http://localhost:8123";

/// Minimal Home Assistant REST client: pushes sensor states.
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
}

impl HomeAssistantClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    /// Config values first, then `HA_BASE_URL`/`HA_TOKEN`, then the add-on
    /// Supervisor token.
    pub fn from_config(base_url: Option<String>, token: Option<String>) -> HaResult<Self> {
        if let Some(token) = token.or_else(|| std::env::var("HA_TOKEN").ok()) {
            let base_url = base_url
                .or_else(|| std::env::var("HA_BASE_URL").ok())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
            info!(base_url = %base_url, "initializing Home Assistant client");
            return Self::new(base_url, token);
        }

        let token = std::env::var("SUPERVISOR_TOKEN").map_err(|_| {
            HaError::Config(
                "no Home Assistant token in config, HA_TOKEN or SUPERVISOR_TOKEN".to_string(),
            )
        })?;
        let base_url = base_url.unwrap_or_else(|| SUPERVISOR_BASE_URL.to_string());
        info!(base_url = %base_url, "initializing Home Assistant client via Supervisor");
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create or overwrite the state of `entity_id`.
    pub async fn set_state(&self, entity_id: &str, state: &SensorState) -> HaResult<()> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        debug!(entity_id, state = %state.state, "posting sensor state");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(state)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::AuthenticationFailed),
            status => Err(HaError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Health check; a failed ping is reported as `Ok(false)`.
    pub async fn ping(&self) -> HaResult<bool> {
        let url = format!("{}/api/", self.base_url);

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    warn!(status = %response.status(), "Home Assistant health check failed");
                }
                Ok(ok)
            }
            Err(e) => {
                warn!(error = %e, "Home Assistant health check failed");
                Ok(false)
            }
        }
    }
}
