use serde::{Deserialize, Serialize};
use std::fmt;

/// Public SimBrief flight-plan endpoint.
pub const DEFAULT_FLIGHTPLAN_API_URL: &str = "https://www.simbrief.com/api/xml.fetch_flightplan";

fn default_api_url() -> String {
    DEFAULT_FLIGHTPLAN_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

/// Upstream endpoint and credentials for flight-plan lookups.
#[derive(Clone, Serialize, Deserialize)]
pub struct FlightPlanConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Whole-request timeout. A timed-out request is reported as a network error.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FlightPlanConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for FlightPlanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightPlanConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl FlightPlanConfig {
    /// Returns `(username, api_key)` when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|s| !s.is_empty())?;
        let api_key = self.api_key.as_deref().filter(|s| !s.is_empty())?;
        Some((username, api_key))
    }
}
