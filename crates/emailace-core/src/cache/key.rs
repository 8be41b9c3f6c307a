//! Query keys.

use std::fmt;

/// Identifies one cacheable fetch, including its parameters.
///
/// Collection-level queries and parameterized queries are distinct variants,
/// so `email:1` can never shadow `emails`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    /// The full email list.
    Emails,
    /// One email by id.
    Email(i64),
    /// Server-side search results for a query string.
    Search(String),
    /// Aggregate counts.
    Analytics,
    /// Backend liveness.
    Health,
}

impl QueryKey {
    /// The email id a per-email key refers to.
    #[must_use]
    pub const fn email_id(&self) -> Option<i64> {
        match self {
            Self::Email(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns true for search result keys.
    #[must_use]
    pub const fn is_search(&self) -> bool {
        matches!(self, Self::Search(_))
    }

    /// Returns true for keys whose value depends on the set of emails.
    ///
    /// Anything that changes an email's status can change these.
    #[must_use]
    pub const fn depends_on_emails(&self) -> bool {
        !matches!(self, Self::Health)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emails => f.write_str("emails"),
            Self::Email(id) => write!(f, "email:{id}"),
            Self::Search(query) => write!(f, "search:{query}"),
            Self::Analytics => f.write_str("analytics"),
            Self::Health => f.write_str("health"),
        }
    }
}
