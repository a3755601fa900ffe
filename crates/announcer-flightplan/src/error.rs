use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlightPlanError {
    #[error("flight-plan username / api key are not configured")]
    MissingCredentials,

    #[error("flight-plan request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("flight-plan request failed: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("flight-plan XML parsing error: {0}")]
    Parse(String),
}
