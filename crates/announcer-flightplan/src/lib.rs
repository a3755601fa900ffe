//! Flight-plan lookup client.
//!
//! Fetches a flight plan as XML from a SimBrief-compatible endpoint and
//! reduces it to the handful of fields announcements care about. Requests
//! are async and never touch the announcement engine's lock.

mod config;
mod error;
mod extract;

pub use config::{FlightPlanConfig, DEFAULT_FLIGHTPLAN_API_URL};
pub use error::FlightPlanError;
pub use extract::{document_to_json, extract_flight_info, FlightInfo};

use std::time::Duration;
use xmltree::Element;

/// Client for the upstream flight-plan API.
#[derive(Debug, Clone)]
pub struct FlightPlanClient {
    http: reqwest::Client,
    config: FlightPlanConfig,
}

impl FlightPlanClient {
    pub fn new(config: FlightPlanConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("announcer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    pub fn config(&self) -> &FlightPlanConfig {
        &self.config
    }

    /// Fetches and parses the flight plan for `flight_id`.
    ///
    /// # Errors
    ///
    /// - [`FlightPlanError::MissingCredentials`] if username or API key is unset
    /// - [`FlightPlanError::Network`] on transport failure or timeout
    /// - [`FlightPlanError::Status`] on a non-success HTTP status
    /// - [`FlightPlanError::Parse`] if the body is not well-formed XML
    pub async fn fetch(&self, flight_id: &str) -> Result<FlightInfo, FlightPlanError> {
        let result = self.fetch_inner(flight_id).await;
        if let Err(e) = &result {
            tracing::error!(flight_id = %flight_id, "error fetching flight plan: {}", e);
        }
        result
    }

    async fn fetch_inner(&self, flight_id: &str) -> Result<FlightInfo, FlightPlanError> {
        let (username, api_key) = self
            .config
            .credentials()
            .ok_or(FlightPlanError::MissingCredentials)?;

        let response = self
            .http
            .get(&self.config.api_url)
            .query(&[
                ("username", username),
                ("api_key", api_key),
                ("flight_id", flight_id),
            ])
            .header(reqwest::header::ACCEPT, "application/xml")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FlightPlanError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let root = Element::parse(body.as_bytes())
            .map_err(|e| FlightPlanError::Parse(e.to_string()))?;
        let info = extract_flight_info(&root);
        tracing::debug!(
            flight_id = %flight_id,
            flight_number = %info.flight_number,
            departure = %info.departure,
            arrival = %info.arrival,
            "fetched flight plan"
        );
        Ok(info)
    }
}
