#[cfg(test)]
use mockall::automock;
use serde::Serialize;

/// Tags one `speak` call so its start/end/error events can be matched to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UtteranceId(pub u64);

/// A platform speech recognizer in single-utterance mode.
///
/// Both methods are requests. Results come back as `Event::Utterance`,
/// `Event::ListenFailed` and `Event::ListenEnded`; `ListenEnded` fires exactly
/// once per successful `arm()`, after the utterance or the failure.
#[cfg_attr(test, automock)]
pub trait SpeechInput: Send {
    /// Start listening for one utterance in the given BCP-47 language.
    /// An engine that is already active or unavailable logs and ignores this.
    fn arm(&mut self, language: &str);

    /// Ask the engine to stop. Idempotent; the engine still reports `ListenEnded`.
    fn disarm(&mut self);
}

/// A platform speech synthesizer with at most one active utterance.
///
/// Reports `Event::SpeechStarted`, then exactly one of `Event::SpeechEnded`
/// or `Event::SpeechFailed`, all tagged with the `UtteranceId` given to `speak`.
#[cfg_attr(test, automock)]
pub trait SpeechOutput: Send {
    /// Speak `text`, cancelling whatever is currently playing first.
    fn speak(&mut self, utterance: UtteranceId, text: &str, language: &str);

    /// Stop playback. Idempotent; the cancelled utterance still reports a terminal event.
    fn cancel(&mut self);
}
