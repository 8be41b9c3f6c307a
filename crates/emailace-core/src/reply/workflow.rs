//! Drives a [`DraftReplySession`] against the backend.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::session::{DraftPhase, DraftReplySession};
use crate::dashboard::Dashboard;
use crate::error::{Result, WorkflowError};
use crate::mutation::{MutationExecutor, join_request};

/// The reply panel of one email.
///
/// Each backend step runs on its own task and records its outcome in the
/// session when the request finishes, even if the caller stopped waiting.
/// A successful send has already invalidated the email list and analytics
/// by the time the session reads [`DraftPhase::Sent`].
#[derive(Debug)]
pub struct ReplyWorkflow {
    dashboard: Dashboard,
    session: Arc<watch::Sender<DraftReplySession>>,
    generating: MutationExecutor,
    sending: MutationExecutor,
}

impl ReplyWorkflow {
    /// Drives `session` through `dashboard`.
    #[must_use]
    pub fn new(dashboard: Dashboard, session: DraftReplySession) -> Self {
        let generating = dashboard.mutations();
        let sending = dashboard.mutations();
        Self {
            dashboard,
            session: Arc::new(watch::Sender::new(session)),
            generating,
            sending,
        }
    }

    /// A copy of the session as it is now.
    #[must_use]
    pub fn session(&self) -> DraftReplySession {
        self.session.borrow().clone()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> DraftPhase {
        self.session.borrow().phase().clone()
    }

    /// Current buffer.
    #[must_use]
    pub fn buffer(&self) -> String {
        self.session.borrow().buffer().to_string()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<DraftReplySession> {
        self.session.subscribe()
    }

    /// Pending/error feedback for the generate button.
    #[must_use]
    pub const fn generating(&self) -> &MutationExecutor {
        &self.generating
    }

    /// Pending/error feedback for the send button.
    #[must_use]
    pub const fn sending(&self) -> &MutationExecutor {
        &self.sending
    }

    /// Whether the reply has gone out and the panel can close.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.session.borrow().phase(), DraftPhase::Sent)
    }

    /// Asks the backend for a draft, optionally steered by `custom_prompt`.
    ///
    /// A call while a draft is already being generated returns at once
    /// without issuing a second request.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Generation`] if the backend fails, or
    /// [`WorkflowError::InvalidTransition`] if a draft can't be requested now.
    pub async fn generate(&self, custom_prompt: Option<String>) -> Result<()> {
        let started = self.transition(DraftReplySession::request)?;
        if !started {
            return Ok(());
        }
        let id = self.email_id();
        info!("reply {id}: generating draft");

        let mutation = self.dashboard.generate_reply_mutation(id, custom_prompt);
        let executor = self.generating.clone();
        let session = Arc::clone(&self.session);
        let step = tokio::spawn(async move {
            let result = executor.execute(mutation).await;
            session.send_modify(|session| {
                let recorded = match &result {
                    Ok(draft) => session.generated(draft.clone()),
                    Err(error) => session.generation_failed(error.clone()),
                };
                if let Err(error) = recorded {
                    warn!("reply {id}: {error}");
                }
            });
            result
        });

        join_request(step)
            .await
            .map(|_| ())
            .map_err(WorkflowError::Generation)
    }

    /// Replaces the draft text.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] unless there is a draft to edit.
    pub fn edit(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.transition(|session| session.edit(text))
    }

    /// Sends the buffer as it is at this moment.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Send`] if the backend fails (the buffer is kept for a
    /// retry), or [`WorkflowError::InvalidTransition`] if there is nothing to
    /// send.
    pub async fn send(&self) -> Result<()> {
        let text = self.transition(DraftReplySession::begin_send)?;
        let id = self.email_id();
        info!("reply {id}: sending {} characters", text.chars().count());

        let mutation = self.dashboard.send_reply_mutation(id, text);
        let executor = self.sending.clone();
        let session = Arc::clone(&self.session);
        let step = tokio::spawn(async move {
            let result = executor.execute(mutation).await;
            session.send_modify(|session| {
                let recorded = match &result {
                    Ok(_) => session.sent(),
                    Err(error) => session.send_failed(error.clone()),
                };
                if let Err(error) = recorded {
                    warn!("reply {id}: {error}");
                }
            });
            result
        });

        let message = join_request(step).await.map_err(WorkflowError::Send)?;
        info!("reply {id}: {}", message.message);
        Ok(())
    }

    fn email_id(&self) -> i64 {
        self.session.borrow().email_id()
    }

    /// Applies `action` to the session, notifying watchers only if it took.
    fn transition<T>(
        &self,
        action: impl FnOnce(&mut DraftReplySession) -> Result<T>,
    ) -> Result<T> {
        let mut outcome = None;
        self.session.send_if_modified(|session| {
            let result = action(session);
            let applied = result.is_ok();
            outcome = Some(result);
            applied
        });
        // send_if_modified always runs the closure.
        outcome.unwrap_or_else(|| {
            Err(WorkflowError::InvalidTransition {
                phase: self.session.borrow().phase().name(),
                action: "transition",
            })
        })
    }
}
