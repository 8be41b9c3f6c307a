//! The dashboard context: one client, one cache, and every query and
//! mutation the views use.

use std::time::Duration;

use emailace_api::{
    ActionMessage, AnalyticsSnapshot, ApiClient, EmailRecord, HealthStatus, ReplyDraft,
    SyncReport, TransportError,
};

use crate::analytics::AnalyticsView;
use crate::cache::{FetchCache, QueryKey, Subscription};
use crate::inbox::{FilterSortParams, InboxView};
use crate::mutation::{Mutation, MutationExecutor};
use crate::reply::{DraftReplySession, ReplyWorkflow};

/// Poll period of the email list.
pub const DEFAULT_INBOX_POLL: Duration = Duration::from_secs(30);

/// Poll period of the analytics counts.
pub const DEFAULT_ANALYTICS_POLL: Duration = Duration::from_secs(60);

/// Poll periods. A zero period disables polling for that query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Email list refresh period.
    pub inbox_poll: Duration,
    /// Analytics refresh period.
    pub analytics_poll: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            inbox_poll: DEFAULT_INBOX_POLL,
            analytics_poll: DEFAULT_ANALYTICS_POLL,
        }
    }
}

/// Explicit owner of all shared dashboard state.
///
/// Nothing is global: two dashboards never share cache entries. Clones share
/// the same cache. Dropping the last clone tears the cache down.
#[derive(Debug, Clone)]
pub struct Dashboard {
    client: ApiClient,
    cache: FetchCache,
    config: DashboardConfig,
}

impl Dashboard {
    /// Creates a dashboard with an empty cache.
    #[must_use]
    pub fn new(client: ApiClient, config: DashboardConfig) -> Self {
        Self::with_cache(client, FetchCache::new(), config)
    }

    /// Creates a dashboard over an existing cache.
    #[must_use]
    pub const fn with_cache(client: ApiClient, cache: FetchCache, config: DashboardConfig) -> Self {
        Self {
            client,
            cache,
            config,
        }
    }

    /// The backend client.
    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The shared cache.
    #[must_use]
    pub const fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Poll configuration.
    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The email list, polled on the inbox period.
    #[must_use]
    pub fn emails(&self) -> Subscription<Vec<EmailRecord>> {
        let client = self.client.clone();
        self.cache.subscribe(
            QueryKey::Emails,
            move || {
                let client = client.clone();
                async move { client.list_emails().await }
            },
            Some(self.config.inbox_poll),
        )
    }

    /// One email.
    #[must_use]
    pub fn email(&self, id: i64) -> Subscription<EmailRecord> {
        let client = self.client.clone();
        self.cache.subscribe(
            QueryKey::Email(id),
            move || {
                let client = client.clone();
                async move { client.email(id).await }
            },
            None,
        )
    }

    /// Server-side search results for `query`.
    ///
    /// A blank query has no search path to ask for, so it subscribes to the
    /// full list instead.
    #[must_use]
    pub fn search(&self, query: &str) -> Subscription<Vec<EmailRecord>> {
        if query.trim().is_empty() {
            return self.emails();
        }
        let client = self.client.clone();
        let owned = query.to_string();
        self.cache.subscribe(
            QueryKey::Search(owned.clone()),
            move || {
                let client = client.clone();
                let query = owned.clone();
                async move { client.search(&query).await }
            },
            None,
        )
    }

    /// Aggregate counts, polled on the analytics period.
    #[must_use]
    pub fn analytics(&self) -> Subscription<AnalyticsSnapshot> {
        let client = self.client.clone();
        self.cache.subscribe(
            QueryKey::Analytics,
            move || {
                let client = client.clone();
                async move { client.analytics().await }
            },
            Some(self.config.analytics_poll),
        )
    }

    /// Backend liveness.
    #[must_use]
    pub fn health(&self) -> Subscription<HealthStatus> {
        let client = self.client.clone();
        self.cache.subscribe(
            QueryKey::Health,
            move || {
                let client = client.clone();
                async move { client.health().await }
            },
            None,
        )
    }

    /// An inbox view with its own search text and ordering.
    #[must_use]
    pub fn inbox(&self, params: FilterSortParams) -> InboxView {
        InboxView::new(self.emails(), params)
    }

    /// The analytics panel.
    #[must_use]
    pub fn analytics_view(&self) -> AnalyticsView {
        AnalyticsView::new(self.analytics())
    }

    /// A fresh executor for one user-facing action.
    #[must_use]
    pub fn mutations(&self) -> MutationExecutor {
        MutationExecutor::new(self.cache.clone())
    }

    /// Draft generation. The backend re-classifies the email while drafting,
    /// so the email, the lists and the counts all go stale.
    #[must_use]
    pub fn generate_reply_mutation(
        &self,
        id: i64,
        custom_prompt: Option<String>,
    ) -> Mutation<ReplyDraft> {
        let client = self.client.clone();
        Mutation::new("generate reply", async move {
            client.generate_reply(id, custom_prompt).await
        })
        .invalidates(QueryKey::Email(id))
        .invalidates(QueryKey::Emails)
        .invalidates(QueryKey::Analytics)
        .invalidates_matching(QueryKey::is_search)
    }

    /// Sending `text` as the reply to email `id`, which resolves it.
    #[must_use]
    pub fn send_reply_mutation(&self, id: i64, text: String) -> Mutation<ActionMessage> {
        let client = self.client.clone();
        Mutation::new("send reply", async move { client.send_reply(id, text).await })
            .invalidates(QueryKey::Emails)
            .invalidates(QueryKey::Analytics)
            .invalidates(QueryKey::Email(id))
            .invalidates_matching(QueryKey::is_search)
    }

    /// Archiving email `id`.
    #[must_use]
    pub fn archive_mutation(&self, id: i64) -> Mutation<ActionMessage> {
        let client = self.client.clone();
        Mutation::new("archive", async move { client.archive(id).await })
            .invalidates(QueryKey::Emails)
            .invalidates(QueryKey::Analytics)
            .invalidates(QueryKey::Email(id))
            .invalidates_matching(QueryKey::is_search)
    }

    /// Pulling new mail into the backend.
    #[must_use]
    pub fn sync_mutation(&self) -> Mutation<SyncReport> {
        let client = self.client.clone();
        Mutation::new("sync", async move { client.sync().await })
            .invalidates(QueryKey::Emails)
            .invalidates(QueryKey::Analytics)
            .invalidates_matching(QueryKey::is_search)
    }

    /// Archives email `id`.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cache is left untouched.
    pub async fn archive(&self, id: i64) -> Result<ActionMessage, TransportError> {
        self.mutations().execute(self.archive_mutation(id)).await
    }

    /// Pulls new mail into the backend.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cache is left untouched.
    pub async fn sync(&self) -> Result<SyncReport, TransportError> {
        self.mutations().execute(self.sync_mutation()).await
    }

    /// Opens an empty reply session for email `id`.
    #[must_use]
    pub fn reply(&self, id: i64) -> ReplyWorkflow {
        ReplyWorkflow::new(self.clone(), DraftReplySession::new(id))
    }

    /// Opens a reply session for `email`, seeded with its stored draft if it
    /// has one.
    #[must_use]
    pub fn reply_to(&self, email: &EmailRecord) -> ReplyWorkflow {
        let session = match email.draft_reply.as_deref() {
            Some(draft) if !draft.trim().is_empty() => {
                DraftReplySession::with_draft(email.id, draft)
            }
            _ => DraftReplySession::new(email.id),
        };
        ReplyWorkflow::new(self.clone(), session)
    }
}
