//! The single point where requests leave the process.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, TransportError};

/// Service root used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A backend call, relative to the service root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /`
    Health,
    /// `GET /emails`
    ListEmails,
    /// `GET /emails/{id}`
    EmailDetail(i64),
    /// `POST /emails/{id}/generate-reply`
    GenerateReply(i64),
    /// `POST /emails/{id}/send-reply`
    SendReply(i64),
    /// `POST /emails/{id}/archive`
    Archive(i64),
    /// `GET /emails/search/{query}`
    Search(String),
    /// `GET /analytics`
    Analytics,
    /// `POST /emails/sync`
    Sync,
}

impl Endpoint {
    /// HTTP method of this call.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::GenerateReply(_) | Self::SendReply(_) | Self::Archive(_) | Self::Sync => {
                Method::POST
            }
            Self::Health
            | Self::ListEmails
            | Self::EmailDetail(_)
            | Self::Search(_)
            | Self::Analytics => Method::GET,
        }
    }

    /// Unencoded path segments. Each segment is percent-encoded on its own
    /// when the URL is built, so a search query can never add path levels.
    #[must_use]
    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::Health => vec![String::new()],
            Self::ListEmails => vec!["emails".into()],
            Self::EmailDetail(id) => vec!["emails".into(), id.to_string()],
            Self::GenerateReply(id) => {
                vec!["emails".into(), id.to_string(), "generate-reply".into()]
            }
            Self::SendReply(id) => vec!["emails".into(), id.to_string(), "send-reply".into()],
            Self::Archive(id) => vec!["emails".into(), id.to_string(), "archive".into()],
            Self::Search(query) => vec!["emails".into(), "search".into(), query.clone()],
            Self::Analytics => vec!["analytics".into()],
            Self::Sync => vec!["emails".into(), "sync".into()],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method(), self.segments().join("/"))
    }
}

/// Issues a call and hands back the decoded JSON body.
///
/// Everything above this trait is testable with an in-memory fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `body` (if any) as JSON to `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Network`] when no response arrived
    /// - [`TransportError::Status`] for a non-success status (body not read)
    /// - [`TransportError::MalformedResponse`] when the body is not JSON
    async fn send(&self, endpoint: &Endpoint, body: Option<Value>) -> Result<Value>;
}

/// [`Transport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport for the given service root and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if `base_url` is not an absolute
    /// URL that can carry path segments.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(format!(
                "{base_url} cannot be used as a service root"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Creates a transport for the given service root with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(base_url, DEFAULT_TIMEOUT)
    }

    /// The configured service root.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the absolute URL for an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if the service root cannot take
    /// path segments.
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(endpoint.segments());
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &Endpoint, body: Option<Value>) -> Result<Value> {
        let url = self.url_for(endpoint)?;
        debug!("{} {}", endpoint.method(), url);

        let mut request = self
            .client
            .request(endpoint.method(), url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = request
            .send()
            .await
            .inspect_err(|e| warn!("{endpoint} failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{endpoint} returned {status}");
            return Err(TransportError::status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::with_base_url(DEFAULT_BASE_URL).unwrap()
    }

    #[test]
    fn test_endpoint_methods() {
        assert_eq!(Endpoint::ListEmails.method(), Method::GET);
        assert_eq!(Endpoint::Search("x".into()).method(), Method::GET);
        assert_eq!(Endpoint::GenerateReply(1).method(), Method::POST);
        assert_eq!(Endpoint::SendReply(1).method(), Method::POST);
        assert_eq!(Endpoint::Archive(1).method(), Method::POST);
        assert_eq!(Endpoint::Sync.method(), Method::POST);
    }

    #[test]
    fn test_url_for_collection_and_detail() {
        let t = transport();
        assert_eq!(
            t.url_for(&Endpoint::ListEmails).unwrap().as_str(),
            "http://localhost:8000/api/v1/emails"
        );
        assert_eq!(
            t.url_for(&Endpoint::GenerateReply(42)).unwrap().as_str(),
            "http://localhost:8000/api/v1/emails/42/generate-reply"
        );
        assert_eq!(
            t.url_for(&Endpoint::Health).unwrap().as_str(),
            "http://localhost:8000/api/v1/"
        );
    }

    #[test]
    fn test_url_for_encodes_search_query() {
        let t = transport();
        let url = t
            .url_for(&Endpoint::Search("refund / billing?".into()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/v1/emails/search/refund%20%2F%20billing%3F"
        );
    }

    #[test]
    fn test_trailing_slash_in_base_url() {
        let t = HttpTransport::with_base_url("http://example.com/api/").unwrap();
        assert_eq!(
            t.url_for(&Endpoint::Analytics).unwrap().as_str(),
            "http://example.com/api/analytics"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpTransport::with_base_url("not a url"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTransport::with_base_url("mailto:support@example.com"),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::Archive(3).to_string(), "POST /emails/3/archive");
        assert_eq!(Endpoint::Health.to_string(), "GET /");
    }
}
