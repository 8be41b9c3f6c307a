//! What a subscriber sees of a cache entry.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use emailace_api::TransportError;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Created but no fetch started yet.
    Idle,
    /// First fetch in flight, nothing to show.
    Loading,
    /// Holds the result of the latest successful fetch.
    Fresh,
    /// Invalidated; a refetch is in flight or queued.
    Stale,
    /// The latest fetch failed.
    Error,
}

impl CacheStatus {
    /// Lowercase name, for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Error => "error",
        }
    }
}

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// Type-erased entry state broadcast to subscribers.
#[derive(Clone)]
pub(crate) struct EntryState {
    pub(crate) status: CacheStatus,
    pub(crate) value: Option<AnyValue>,
    pub(crate) error: Option<TransportError>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) fetching: bool,
}

impl EntryState {
    pub(crate) const fn idle() -> Self {
        Self {
            status: CacheStatus::Idle,
            value: None,
            error: None,
            updated_at: None,
            fetching: false,
        }
    }
}

/// A consistent, typed view of one cache entry at one moment.
///
/// Data is only handed out while the entry is [`CacheStatus::Fresh`]: a stale
/// entry never shows its pre-invalidation value and an errored entry never
/// shows partial data next to its error.
#[derive(Debug)]
pub struct CacheSnapshot<T> {
    status: CacheStatus,
    data: Option<Arc<T>>,
    error: Option<TransportError>,
    updated_at: Option<DateTime<Utc>>,
    fetching: bool,
}

impl<T> Clone for CacheSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
            fetching: self.fetching,
        }
    }
}

impl<T: Send + Sync + 'static> CacheSnapshot<T> {
    pub(crate) fn from_state(state: &EntryState) -> Self {
        let data = match state.status {
            CacheStatus::Fresh => state
                .value
                .clone()
                .and_then(|value| value.downcast::<T>().ok()),
            _ => None,
        };
        let error = match state.status {
            CacheStatus::Error => state.error.clone(),
            _ => None,
        };
        Self {
            status: state.status,
            data,
            error,
            updated_at: state.updated_at,
            fetching: state.fetching,
        }
    }
}

impl<T> CacheSnapshot<T> {
    /// Entry status.
    #[must_use]
    pub const fn status(&self) -> CacheStatus {
        self.status
    }

    /// The fetched value, present only while fresh.
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }

    /// Shared handle to the fetched value, present only while fresh.
    #[must_use]
    pub fn data_arc(&self) -> Option<Arc<T>> {
        self.data.clone()
    }

    /// The failure, present only while errored.
    #[must_use]
    pub const fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    /// When the last successful fetch completed.
    #[must_use]
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Whether a fetch for this key is in flight.
    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Whether the entry has come to rest: fresh or errored, nothing in flight.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !self.fetching && matches!(self.status, CacheStatus::Fresh | CacheStatus::Error)
    }

    /// Folds the snapshot into what a view should render.
    #[must_use]
    pub fn state(&self) -> QueryState<&T> {
        if let Some(error) = &self.error {
            return QueryState::Failed(error.clone());
        }
        self.data().map_or(QueryState::Loading, QueryState::Ready)
    }
}

/// What a view renders for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
    /// Nothing trustworthy to show yet.
    Loading,
    /// Current data.
    Ready(T),
    /// The fetch failed; show the message instead of any data.
    Failed(TransportError),
}

impl<T> QueryState<T> {
    /// Transforms ready data, keeping loading and failure as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        match self {
            Self::Loading => QueryState::Loading,
            Self::Ready(value) => QueryState::Ready(f(value)),
            Self::Failed(error) => QueryState::Failed(error),
        }
    }

    /// The ready data, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Loading | Self::Failed(_) => None,
        }
    }
}
