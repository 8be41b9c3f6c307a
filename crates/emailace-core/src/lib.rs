//! # emailace-core
//!
//! Client-side synchronization and derived state for the `EmailAce` triage
//! dashboard.
//!
//! This crate provides:
//! - [`FetchCache`] - keyed query cache with request coalescing, polling and
//!   invalidation
//! - [`MutationExecutor`] - state-changing calls that invalidate what they touch
//! - Inbox projection - search and sort over the cached email list
//! - Analytics - resolution and breakdown ratios from raw counts
//! - **Reply workflow** - generate, edit and send as a checked state machine
//! - [`Dashboard`] - the explicit context object tying them together
//!
//! Every component talks to the backend through
//! [`emailace_api::Transport`], so everything here can be exercised against
//! a fake transport.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod analytics;
pub mod cache;
pub mod dashboard;
mod error;
pub mod inbox;
pub mod mutation;
pub mod reply;
pub mod time;

pub use analytics::{AnalyticsView, DerivedMetrics, Ratio, Share, derive};
pub use cache::{CacheSnapshot, CacheStatus, FetchCache, QueryKey, QueryState, Subscription};
pub use dashboard::{DEFAULT_ANALYTICS_POLL, DEFAULT_INBOX_POLL, Dashboard, DashboardConfig};
pub use error::{Result, WorkflowError};
pub use inbox::{FilterSortParams, InboxCounts, InboxView, ParseSortKeyError, SortKey, project};
pub use mutation::{Invalidation, Mutation, MutationExecutor, MutationPhase};
pub use reply::{DraftPhase, DraftReplySession, ReplyWorkflow};
pub use time::{Clock, ManualClock, SystemClock};
