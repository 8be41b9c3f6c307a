//! Generate → edit → send, as an explicit state machine.
//!
//! [`DraftReplySession`] holds the rules and never touches the network;
//! [`ReplyWorkflow`] runs the backend calls and feeds their outcomes back in.

mod session;
mod workflow;

pub use session::{DraftPhase, DraftReplySession};
pub use workflow::ReplyWorkflow;
