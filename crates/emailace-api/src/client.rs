//! Typed access to every backend call.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::transport::{Endpoint, HttpTransport, Transport};
use crate::types::{
    ActionMessage, AnalyticsSnapshot, EmailRecord, GenerateReplyRequest, HealthStatus, ReplyDraft,
    SendReplyRequest, SyncReport,
};

/// Typed client for the triage backend.
///
/// Cloning is cheap; all clones share one transport.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client over any transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Creates a client that talks HTTP to `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a usable service root.
    pub fn http(base_url: &str, timeout: std::time::Duration) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url, timeout)?)))
    }

    /// Backend liveness.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.call(&Endpoint::Health, None).await
    }

    /// All emails.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn list_emails(&self) -> Result<Vec<EmailRecord>> {
        self.call(&Endpoint::ListEmails, None).await
    }

    /// One email with its full classification.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn email(&self, id: i64) -> Result<EmailRecord> {
        self.call(&Endpoint::EmailDetail(id), None).await
    }

    /// Asks the backend to draft a reply, optionally with a custom prompt.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn generate_reply(
        &self,
        id: i64,
        custom_prompt: Option<String>,
    ) -> Result<ReplyDraft> {
        let body = GenerateReplyRequest { custom_prompt };
        self.call(&Endpoint::GenerateReply(id), Some(to_body(&body)?))
            .await
    }

    /// Sends the reply text and resolves the email.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn send_reply(&self, id: i64, reply_content: String) -> Result<ActionMessage> {
        let body = SendReplyRequest { reply_content };
        self.call(&Endpoint::SendReply(id), Some(to_body(&body)?))
            .await
    }

    /// Archives an email without replying.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn archive(&self, id: i64) -> Result<ActionMessage> {
        self.call(&Endpoint::Archive(id), None).await
    }

    /// Server-side search over sender, subject and body.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn search(&self, query: &str) -> Result<Vec<EmailRecord>> {
        self.call(&Endpoint::Search(query.to_string()), None).await
    }

    /// Aggregate counts.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn analytics(&self) -> Result<AnalyticsSnapshot> {
        self.call(&Endpoint::Analytics, None).await
    }

    /// Pulls new mail from the provider into the backend.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a malformed-response error.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.call(&Endpoint::Sync, None).await
    }

    async fn call<T: DeserializeOwned>(&self, endpoint: &Endpoint, body: Option<Value>) -> Result<T> {
        let value = self.transport.send(endpoint, body).await?;
        let decoded = serde_json::from_value(value)?;
        debug!("{endpoint} ok");
        Ok(decoded)
    }
}

fn to_body<T: Serialize>(body: &T) -> Result<Value> {
    serde_json::to_value(body).map_err(Into::into)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::TransportError;

    /// Answers every call with a fixed value and records what was sent.
    struct Canned {
        reply: Result<Value>,
        sent: Mutex<Vec<(Endpoint, Option<Value>)>>,
    }

    impl Canned {
        fn new(reply: Result<Value>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, endpoint: &Endpoint, body: Option<Value>) -> Result<Value> {
            self.sent.lock().unwrap().push((endpoint.clone(), body));
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn test_generate_reply_sends_prompt() {
        let canned = Canned::new(Ok(json!({
            "draft_reply": "Thanks for reaching out",
            "sentiment": "positive",
            "priority": "low",
            "summary": "Thank-you note",
            "entities": {"name": ["Ada"]}
        })));
        let client = ApiClient::new(canned.clone());

        let draft = client
            .generate_reply(5, Some("keep it short".into()))
            .await
            .unwrap();

        assert_eq!(draft.draft_reply, "Thanks for reaching out");
        let sent = canned.sent.lock().unwrap();
        assert_eq!(sent[0].0, Endpoint::GenerateReply(5));
        assert_eq!(sent[0].1, Some(json!({"custom_prompt": "keep it short"})));
    }

    #[tokio::test]
    async fn test_send_reply_carries_text() {
        let canned = Canned::new(Ok(json!({"message": "Email marked as resolved successfully"})));
        let client = ApiClient::new(canned.clone());

        let ack = client.send_reply(9, "Hello, thanks".into()).await.unwrap();

        assert_eq!(ack.message, "Email marked as resolved successfully");
        let sent = canned.sent.lock().unwrap();
        assert_eq!(sent[0].0, Endpoint::SendReply(9));
        assert_eq!(sent[0].1, Some(json!({"reply_content": "Hello, thanks"})));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let canned = Canned::new(Ok(json!({"unexpected": true})));
        let client = ApiClient::new(canned);

        let err = client.analytics().await.unwrap_err();
        assert!(err.is_malformed_response());
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let canned = Canned::new(Err(TransportError::status(404)));
        let client = ApiClient::new(canned);

        let err = client.email(1).await.unwrap_err();
        assert_eq!(err.http_status(), Some(404));
    }
}
