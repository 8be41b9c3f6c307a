//! State-changing requests and the cache invalidation they imply.

use std::future::Future;
use std::sync::Arc;

use emailace_api::TransportError;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{FetchCache, QueryKey};

/// Where a mutation stands, for UI feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationPhase {
    /// Nothing has run yet, or the executor was reset.
    Idle,
    /// The request is in flight.
    Pending,
    /// The request succeeded and its invalidations have been applied.
    Success,
    /// The request failed; nothing was invalidated.
    Error(TransportError),
}

impl MutationPhase {
    /// Returns true while the request is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Cache entries a successful mutation makes stale.
#[derive(Debug, Clone)]
pub enum Invalidation {
    /// Exactly one key.
    Key(QueryKey),
    /// Every key the predicate accepts.
    Matching(fn(&QueryKey) -> bool),
}

impl Invalidation {
    fn apply(&self, cache: &FetchCache) -> usize {
        match self {
            Self::Key(key) => cache.invalidate(key),
            Self::Matching(predicate) => cache.invalidate_matching(predicate),
        }
    }
}

/// One state-changing request together with what it invalidates.
pub struct Mutation<R> {
    name: &'static str,
    request: BoxFuture<'static, Result<R, TransportError>>,
    invalidates: Vec<Invalidation>,
}

impl<R> std::fmt::Debug for Mutation<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("invalidates", &self.invalidates)
            .finish_non_exhaustive()
    }
}

impl<R> Mutation<R> {
    /// Wraps `request`, which invalidates nothing until told otherwise.
    pub fn new(
        name: &'static str,
        request: impl Future<Output = Result<R, TransportError>> + Send + 'static,
    ) -> Self {
        Self {
            name,
            request: request.boxed(),
            invalidates: Vec::new(),
        }
    }

    /// Invalidates `key` on success.
    #[must_use]
    pub fn invalidates(mut self, key: QueryKey) -> Self {
        self.invalidates.push(Invalidation::Key(key));
        self
    }

    /// Invalidates every key matching `predicate` on success.
    #[must_use]
    pub fn invalidates_matching(mut self, predicate: fn(&QueryKey) -> bool) -> Self {
        self.invalidates.push(Invalidation::Matching(predicate));
        self
    }

    /// Operation name, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// What a success will invalidate.
    #[must_use]
    pub fn invalidations(&self) -> &[Invalidation] {
        &self.invalidates
    }
}

/// Runs mutations and tracks the phase of the latest one.
///
/// Clones share the phase. Use one executor per user-facing action so each
/// button gets its own pending/error feedback.
#[derive(Clone)]
pub struct MutationExecutor {
    cache: FetchCache,
    phase: Arc<watch::Sender<MutationPhase>>,
}

impl std::fmt::Debug for MutationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationExecutor")
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

impl MutationExecutor {
    /// Creates an idle executor that invalidates entries of `cache`.
    #[must_use]
    pub fn new(cache: FetchCache) -> Self {
        Self {
            cache,
            phase: Arc::new(watch::Sender::new(MutationPhase::Idle)),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> MutationPhase {
        self.phase.borrow().clone()
    }

    /// Receiver notified on every phase change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<MutationPhase> {
        self.phase.subscribe()
    }

    /// Returns to idle, clearing any reported error.
    pub fn reset(&self) {
        self.phase.send_replace(MutationPhase::Idle);
    }

    /// Runs `mutation` to completion.
    ///
    /// The request runs on its own task, so dropping the returned future
    /// neither cancels it nor skips its invalidations. On success every
    /// invalidation is applied before the phase turns to success and before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns the request's transport error. Nothing is invalidated and no
    /// retry is attempted.
    pub async fn execute<R: Send + 'static>(&self, mutation: Mutation<R>) -> Result<R, TransportError> {
        let Mutation {
            name,
            request,
            invalidates,
        } = mutation;
        let cache = self.cache.clone();
        let phase = Arc::clone(&self.phase);

        phase.send_replace(MutationPhase::Pending);
        info!("{name}: pending");

        let task = tokio::spawn(async move {
            match request.await {
                Ok(value) => {
                    let invalidated: usize = invalidates
                        .iter()
                        .map(|invalidation| invalidation.apply(&cache))
                        .sum();
                    debug!("{name}: invalidated {invalidated} cache entries");
                    phase.send_replace(MutationPhase::Success);
                    info!("{name}: succeeded");
                    Ok(value)
                }
                Err(error) => {
                    warn!("{name}: failed: {error}");
                    phase.send_replace(MutationPhase::Error(error.clone()));
                    Err(error)
                }
            }
        });

        join_request(task).await
    }
}

/// Awaits a spawned request, re-raising its panic if it had one.
pub(crate) async fn join_request<R>(
    task: JoinHandle<Result<R, TransportError>>,
) -> Result<R, TransportError> {
    match task.await {
        Ok(result) => result,
        Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Err(join) => Err(TransportError::Network(join.to_string())),
    }
}
