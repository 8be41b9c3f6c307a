//! Filtered, sorted projection of the cached email list.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use emailace_api::{EmailRecord, EmailStatus, Priority};

use crate::cache::{CacheSnapshot, QueryState, Subscription};

/// Column an inbox is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Most recent first.
    #[default]
    Date,
    /// Urgent first, then high, normal, low.
    Priority,
    /// Sender address, alphabetical.
    Sender,
    /// Status name, alphabetical.
    Status,
}

impl SortKey {
    /// Every sort key, in menu order.
    pub const ALL: [Self; 4] = [Self::Date, Self::Priority, Self::Sender, Self::Status];

    /// Lowercase name as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Priority => "priority",
            Self::Sender => "sender",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized sort key name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key '{0}', expected one of: date, priority, sender, status")]
pub struct ParseSortKeyError(String);

impl FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseSortKeyError(s.to_string()))
    }
}

/// View-local search text and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSortParams {
    /// Case-insensitive substring matched against sender and subject.
    pub query: String,
    /// Ordering of the matches.
    pub sort: SortKey,
}

impl FilterSortParams {
    /// Creates params with the given query and sort key.
    pub fn new(query: impl Into<String>, sort: SortKey) -> Self {
        Self {
            query: query.into(),
            sort,
        }
    }
}

/// Filters and orders `emails` for display.
///
/// Pure and deterministic: the same input and params always give the same
/// output, and projecting an already projected list changes nothing. All
/// orderings are stable.
#[must_use]
pub fn project(emails: &[EmailRecord], params: &FilterSortParams) -> Vec<EmailRecord> {
    let needle = params.query.to_lowercase();
    let mut matches: Vec<EmailRecord> = emails
        .iter()
        .filter(|email| {
            needle.is_empty()
                || email.sender.to_lowercase().contains(&needle)
                || email.subject.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect();

    match params.sort {
        SortKey::Date => matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortKey::Priority => matches.sort_by_key(|email| email.priority.rank()),
        SortKey::Sender => matches.sort_by(|a, b| collate(&a.sender, &b.sender)),
        SortKey::Status => matches.sort_by(|a, b| a.status.as_str().cmp(b.status.as_str())),
    }
    matches
}

/// Header badges for a list of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboxCounts {
    /// Rows still awaiting a reply.
    pub pending: usize,
    /// Rows triaged urgent or high priority.
    pub urgent: usize,
}

impl InboxCounts {
    /// Counts over exactly the rows given, so a filtered list gives filtered
    /// counts.
    #[must_use]
    pub fn of(emails: &[EmailRecord]) -> Self {
        emails.iter().fold(Self::default(), |mut counts, email| {
            if email.status == EmailStatus::Pending {
                counts.pending += 1;
            }
            if matches!(email.priority, Priority::Urgent | Priority::High) {
                counts.urgent += 1;
            }
            counts
        })
    }
}

/// Case-insensitive first; on a tie lowercase sorts before uppercase.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// The email list as one view sees it.
///
/// Re-projects from the current cache snapshot on every read, so it always
/// reflects both the latest data and the latest params.
#[derive(Debug)]
pub struct InboxView {
    subscription: Subscription<Vec<EmailRecord>>,
    params: FilterSortParams,
}

impl InboxView {
    /// Wraps an email list subscription.
    #[must_use]
    pub const fn new(subscription: Subscription<Vec<EmailRecord>>, params: FilterSortParams) -> Self {
        Self {
            subscription,
            params,
        }
    }

    /// Current params.
    #[must_use]
    pub const fn params(&self) -> &FilterSortParams {
        &self.params
    }

    /// Replaces the search text.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.params.query = query.into();
    }

    /// Replaces the sort key.
    pub const fn set_sort(&mut self, sort: SortKey) {
        self.params.sort = sort;
    }

    /// The projected list, or why there is none.
    #[must_use]
    pub fn rows(&self) -> QueryState<Vec<EmailRecord>> {
        self.render(&self.subscription.snapshot())
    }

    /// Pending and urgent counts over the projected rows.
    #[must_use]
    pub fn counts(&self) -> QueryState<InboxCounts> {
        self.rows().map(|rows| InboxCounts::of(&rows))
    }

    /// Waits for the next cache change and returns the new projection.
    ///
    /// Returns `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<QueryState<Vec<EmailRecord>>> {
        let snapshot = self.subscription.changed().await?;
        Some(self.render(&snapshot))
    }

    /// Waits until the list has settled and returns its projection.
    pub async fn settled(&mut self) -> QueryState<Vec<EmailRecord>> {
        let snapshot = self.subscription.settled().await;
        self.render(&snapshot)
    }

    /// The underlying subscription.
    #[must_use]
    pub const fn subscription(&self) -> &Subscription<Vec<EmailRecord>> {
        &self.subscription
    }

    fn render(&self, snapshot: &CacheSnapshot<Vec<EmailRecord>>) -> QueryState<Vec<EmailRecord>> {
        snapshot
            .state()
            .map(|emails| project(emails, &self.params))
    }
}
