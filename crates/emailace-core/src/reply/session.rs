//! The draft-reply state machine, free of I/O.

use emailace_api::{ReplyDraft, TransportError};

use crate::error::{Result, WorkflowError};

/// Where a reply session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftPhase {
    /// Nothing requested yet.
    NoDraft,
    /// The backend is drafting.
    Generating,
    /// A draft is in the buffer and may be edited.
    Drafted,
    /// The buffer is being sent.
    Sending,
    /// The reply went out. Terminal.
    Sent,
    /// Drafting failed; a new request may be made.
    GenerationFailed(WorkflowError),
    /// Sending failed; the buffer is intact and sending may be retried.
    SendFailed(WorkflowError),
}

impl DraftPhase {
    /// Short name, used in transition errors and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoDraft => "no draft",
            Self::Generating => "generating",
            Self::Drafted => "drafted",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::GenerationFailed(_) => "generation failed",
            Self::SendFailed(_) => "send failed",
        }
    }

    /// The failure behind an error phase.
    #[must_use]
    pub const fn error(&self) -> Option<&WorkflowError> {
        match self {
            Self::GenerationFailed(error) | Self::SendFailed(error) => Some(error),
            _ => None,
        }
    }

    /// Returns true while a backend call is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Generating | Self::Sending)
    }
}

/// Reply state for one email.
///
/// Every action either moves the session along or returns
/// [`WorkflowError::InvalidTransition`] and leaves it untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReplySession {
    email_id: i64,
    phase: DraftPhase,
    buffer: String,
    classification: Option<ReplyDraft>,
}

impl DraftReplySession {
    /// Opens an empty session for `email_id`.
    #[must_use]
    pub const fn new(email_id: i64) -> Self {
        Self {
            email_id,
            phase: DraftPhase::NoDraft,
            buffer: String::new(),
            classification: None,
        }
    }

    /// Opens a session already holding a draft the server stored earlier.
    #[must_use]
    pub fn with_draft(email_id: i64, draft: impl Into<String>) -> Self {
        Self {
            phase: DraftPhase::Drafted,
            buffer: draft.into(),
            ..Self::new(email_id)
        }
    }

    /// Email this session replies to.
    #[must_use]
    pub const fn email_id(&self) -> i64 {
        self.email_id
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> &DraftPhase {
        &self.phase
    }

    /// The editable reply text.
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Classification returned with the latest generated draft.
    #[must_use]
    pub const fn classification(&self) -> Option<&ReplyDraft> {
        self.classification.as_ref()
    }

    /// Asks for a draft.
    ///
    /// Returns `Ok(true)` when the session entered generating and the caller
    /// should issue the request, `Ok(false)` when a request is already in
    /// flight.
    ///
    /// # Errors
    ///
    /// Fails unless the session has no draft yet or the last generation failed.
    pub fn request(&mut self) -> Result<bool> {
        match self.phase {
            DraftPhase::Generating => Ok(false),
            DraftPhase::NoDraft | DraftPhase::GenerationFailed(_) => {
                self.phase = DraftPhase::Generating;
                Ok(true)
            }
            _ => Err(self.invalid("request a draft")),
        }
    }

    /// Records a generated draft, which becomes the buffer.
    ///
    /// # Errors
    ///
    /// Fails unless generating.
    pub fn generated(&mut self, draft: ReplyDraft) -> Result<()> {
        self.expect_phase(&DraftPhase::Generating, "accept a draft")?;
        self.buffer.clone_from(&draft.draft_reply);
        self.classification = Some(draft);
        self.phase = DraftPhase::Drafted;
        Ok(())
    }

    /// Records a failed generation. The buffer stays as it was.
    ///
    /// # Errors
    ///
    /// Fails unless generating.
    pub fn generation_failed(&mut self, error: TransportError) -> Result<()> {
        self.expect_phase(&DraftPhase::Generating, "fail generation")?;
        self.phase = DraftPhase::GenerationFailed(WorkflowError::Generation(error));
        Ok(())
    }

    /// Replaces the buffer. No backend call.
    ///
    /// # Errors
    ///
    /// Fails unless drafted or after a failed send.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<()> {
        match self.phase {
            DraftPhase::Drafted | DraftPhase::SendFailed(_) => {
                self.buffer = text.into();
                Ok(())
            }
            _ => Err(self.invalid("edit")),
        }
    }

    /// Starts sending and returns the text to send: the buffer as it is now.
    ///
    /// # Errors
    ///
    /// Fails unless drafted or after a failed send.
    pub fn begin_send(&mut self) -> Result<String> {
        match self.phase {
            DraftPhase::Drafted | DraftPhase::SendFailed(_) => {
                self.phase = DraftPhase::Sending;
                Ok(self.buffer.clone())
            }
            _ => Err(self.invalid("send")),
        }
    }

    /// Records a delivered reply.
    ///
    /// # Errors
    ///
    /// Fails unless sending.
    pub fn sent(&mut self) -> Result<()> {
        self.expect_phase(&DraftPhase::Sending, "complete sending")?;
        self.phase = DraftPhase::Sent;
        Ok(())
    }

    /// Records a failed send. The buffer is kept for a retry.
    ///
    /// # Errors
    ///
    /// Fails unless sending.
    pub fn send_failed(&mut self, error: TransportError) -> Result<()> {
        self.expect_phase(&DraftPhase::Sending, "fail sending")?;
        self.phase = DraftPhase::SendFailed(WorkflowError::Send(error));
        Ok(())
    }

    fn expect_phase(&self, phase: &DraftPhase, action: &'static str) -> Result<()> {
        if &self.phase == phase {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    const fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidTransition {
            phase: self.phase.name(),
            action,
        }
    }
}
