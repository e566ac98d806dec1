pub mod call_state;
pub mod campaign;
pub mod context;
pub mod gemini_responder;
pub mod openai_responder;
pub mod orchestrator;
pub mod ports;
pub mod responder;
pub mod transcript;
pub mod voice;

use crate::orchestrator::TurnFailure;
use crate::ports::UtteranceId;
use crate::responder::Reply;

/// Identifies one utterance-to-reply cycle. Issued in increasing order per orchestrator.
pub type TurnId = u64;

/// Everything that can happen to the `CallOrchestrator`.
///
/// The presentation layer, both speech ports, the spawned response-service
/// calls and the orchestrator's own timers all feed this one channel, so the
/// orchestrator sees a single ordered stream and never needs a lock.
#[derive(Debug)]
pub enum Event {
    /// Start a session, or pause/resume listening on an active one.
    ToggleSession,
    /// Tear the session down.
    HangUp,

    /// The recognizer produced one final utterance.
    Utterance(String),
    /// The recognizer reported an error. An `ListenEnded` always follows.
    ListenFailed(String),
    /// The recognizer is idle again.
    ListenEnded,

    SpeechStarted(UtteranceId),
    SpeechEnded(UtteranceId),
    SpeechFailed(UtteranceId, String),

    ReplyReady {
        turn: TurnId,
        result: Result<Reply, TurnFailure>,
    },
    IntentReady {
        turn: TurnId,
        result: Result<String, TurnFailure>,
    },

    /// A scheduled attempt to re-arm the recognizer.
    Rearm { generation: u64 },
    /// One second of wall-clock time passed.
    Tick,
    /// Stop the orchestrator loop.
    Shutdown,
}
