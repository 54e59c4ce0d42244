use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to an Open-Meteo endpoint.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {reason}")]
    Status { status: StatusCode, reason: String },

    #[error("malformed response body: {0}")]
    Malformed(String),
}

/// Everything that can go wrong while answering a single air quality request.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("no location given")]
    Usage,

    #[error("location not found: {0}")]
    LocationNotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl LookupError {
    /// Text shown to the chat user. Not HTML-escaped.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            LookupError::Usage => "Please tell me which place to check, e.g. /air Berlin".to_string(),
            LookupError::LocationNotFound(name) => {
                format!("I couldn't find a place called \"{name}\". Try the English city name.")
            }
            LookupError::Upstream(_) => {
                "Sorry, I couldn't fetch air quality data right now. Please try again later.".to_string()
            }
        }
    }
}
