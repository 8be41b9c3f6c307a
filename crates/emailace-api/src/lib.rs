//! # emailace-api
//!
//! HTTP/JSON client for the `EmailAce` triage backend.
//!
//! This crate provides:
//! - The [`Transport`] seam and its HTTP implementation, [`HttpTransport`]
//! - [`ApiClient`], one typed method per backend call
//! - Wire types for emails, drafts and analytics
//!
//! ## Quick Start
//!
//! ```ignore
//! use emailace_api::{ApiClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
//!
//! let client = ApiClient::http(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)?;
//! for email in client.list_emails().await? {
//!     println!("{} [{}] {}", email.id, email.priority, email.subject);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use error::{Result, TransportError};
pub use transport::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, Endpoint, HttpTransport, Transport};
pub use types::{
    ActionMessage, AnalyticsSnapshot, EmailRecord, EmailStatus, Entities, EntityValue,
    GenerateReplyRequest, HealthStatus, Priority, ReplyDraft, SendReplyRequest, Sentiment,
    SyncReport,
};
