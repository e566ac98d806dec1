use crate::call_state::CallStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Intent label shown before any turn has been analysed.
pub const NO_INTENT: &str = "None";

/// Latest known facts about the call, shown next to the transcript.
///
/// `status` follows the orchestrator; `intent` and `updated_at` move together
/// whenever an intent analysis settles, independently of `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub intent: String,
    pub session_label: String,
    pub status: CallStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContextSnapshot {
    pub fn new(session_label: impl Into<String>) -> Self {
        Self {
            intent: NO_INTENT.to_string(),
            session_label: session_label.into(),
            status: CallStatus::Idle,
            updated_at: None,
        }
    }

    pub fn with_status(&self, status: CallStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn with_intent(&self, intent: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            intent: intent.into(),
            updated_at: Some(at),
            ..self.clone()
        }
    }
}
