//! Wire types exchanged with the backend.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tone of an email as classified by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Happy or appreciative customer.
    Positive,
    /// Complaint or frustration.
    Negative,
    /// Neither.
    Neutral,
}

impl Sentiment {
    /// All sentiments in display order.
    pub const ALL: [Self; 3] = [Self::Positive, Self::Neutral, Self::Negative];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// How soon an email needs attention.
///
/// The derived ordering is the triage order: `Urgent < High < Normal < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Needs an answer now.
    Urgent,
    /// Answer soon.
    High,
    /// Regular queue.
    Normal,
    /// Whenever there is time.
    Low,
}

impl Priority {
    /// All priorities in triage order.
    pub const ALL: [Self; 4] = [Self::Urgent, Self::High, Self::Normal, Self::Low];

    /// Position in the triage order (urgent = 0, low = 3).
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Normal => 2,
            Self::Low => 3,
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where an email is in the support workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    /// Waiting for a reply.
    Pending,
    /// A reply was sent.
    Resolved,
    /// Put away without a reply.
    Archived,
}

impl EmailStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One extracted entity type can hold a single value or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    /// A single value.
    One(String),
    /// Several values.
    Many(Vec<String>),
}

impl EntityValue {
    /// Iterates over the contained values.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

/// Entities extracted from an email, keyed by entity type (e.g. `phone`).
pub type Entities = BTreeMap<String, EntityValue>;

/// An email as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Backend identifier.
    pub id: i64,
    /// Sender address.
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// When the email was received.
    #[serde(rename = "date", with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Classified tone.
    pub sentiment: Sentiment,
    /// Classified priority.
    pub priority: Priority,
    /// Workflow status.
    pub status: EmailStatus,
    /// Whether the backend flagged the email as urgent.
    #[serde(default)]
    pub is_urgent: bool,
    /// Draft reply stored on the backend, if one was generated.
    #[serde(default)]
    pub draft_reply: Option<String>,
    /// AI summary of the email.
    #[serde(default)]
    pub summary: Option<String>,
    /// Extracted entities, JSON-encoded.
    #[serde(default)]
    pub entities: Option<String>,
}

impl EmailRecord {
    /// Parses the opaque entities payload.
    ///
    /// Returns `Ok(None)` when the backend did not extract any entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object of strings or
    /// string arrays.
    pub fn parsed_entities(&self) -> Result<Option<Entities>, serde_json::Error> {
        match self.entities.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => serde_json::from_str(raw).map(Some),
        }
    }
}

/// Aggregate counts behind the analytics views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Number of emails.
    #[serde(rename = "total_emails")]
    pub total: u64,
    /// Emails with a sent reply.
    #[serde(rename = "resolved_emails")]
    pub resolved: u64,
    /// Emails still waiting.
    #[serde(rename = "pending_emails")]
    pub pending: u64,
    /// Emails flagged urgent.
    #[serde(rename = "urgent_emails")]
    pub urgent: u64,
    /// Count per sentiment label. Absent labels mean zero.
    #[serde(default)]
    pub sentiment_breakdown: BTreeMap<String, u64>,
    /// Count per priority label. Absent labels mean zero.
    #[serde(default)]
    pub priority_breakdown: BTreeMap<String, u64>,
}

/// Body of a draft generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerateReplyRequest {
    /// Overrides the backend's default prompting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

/// Body of a send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReplyRequest {
    /// The reply text exactly as approved by the user.
    pub reply_content: String,
}

/// A generated draft, together with the re-classification done while drafting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDraft {
    /// The proposed reply.
    pub draft_reply: String,
    /// Updated tone.
    pub sentiment: Sentiment,
    /// Updated priority.
    pub priority: Priority,
    /// Updated summary.
    pub summary: String,
    /// Updated entities.
    #[serde(default)]
    pub entities: Entities,
}

/// Acknowledgement returned by state-changing calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    /// Human-readable confirmation.
    pub message: String,
}

/// Backend liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Free-form status line.
    pub status: String,
    /// Backend clock at the time of the check.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Whether the backend reached its database.
    pub database_connected: bool,
}

/// Outcome of pulling new mail from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Human-readable confirmation.
    pub message: String,
    /// Number of new emails stored.
    #[serde(default)]
    pub synced_count: u64,
}

/// Timestamps as the backend writes them.
///
/// The backend stores naive UTC datetimes, so values may come with or without
/// an offset. Offset-less values are read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Parses an RFC 3339 or naive ISO-8601 timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the value matches neither format.
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
            })
    }

    /// Serializes as RFC 3339.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Deserializes from either accepted format.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a string in an accepted format.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(|e| de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}
