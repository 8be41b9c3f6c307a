//! Error types for backend requests.

/// Result type alias for backend requests.
pub type Result<T> = std::result::Result<T, TransportError>;

/// A failed call to the backend.
///
/// The error is cheap to clone so that a single failed fetch can be handed to
/// every view that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (connection refused, DNS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status code.
    #[error("API Error: {status} {status_text}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status code.
        status_text: String,
    },

    /// The response body was not the JSON shape the call promises.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The service root or an endpoint could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Creates a status error from a status code, filling in the reason phrase.
    ///
    /// `status_text` is always the canonical phrase for the code (or
    /// "Unknown Status"), never the one the server sent, so two errors with
    /// the same code compare equal.
    #[must_use]
    pub fn status(status: u16) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown Status")
            .to_string();
        Self::Status {
            status,
            status_text,
        }
    }

    /// Returns true if no response was received at all.
    #[must_use]
    pub const fn is_network_failure(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns true if the response body could not be decoded.
    #[must_use]
    pub const fn is_malformed_response(&self) -> bool {
        matches!(self, Self::MalformedResponse(_))
    }

    /// Returns the HTTP status code, if the backend answered with one.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::status(status.as_u16());
        }
        if err.is_decode() {
            return Self::MalformedResponse(err.to_string());
        }
        if err.is_builder() {
            return Self::InvalidUrl(err.to_string());
        }
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
