//! Typed lines stand in for a speech recognizer.
//!
//! While armed, the next plain line typed on stdin becomes the utterance.
//! Lines starting with `/` are console commands and never reach the recognizer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use voxai_core::Event;
use voxai_core::ports::SpeechInput;

/// One line of console input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Toggle,
    HangUp,
    Status,
    Help,
    Quit,
    Say(String),
    Unknown(String),
}

impl ConsoleCommand {
    /// Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let command = match line {
            "/toggle" | "/t" => Self::Toggle,
            "/hangup" | "/h" => Self::HangUp,
            "/status" | "/s" => Self::Status,
            "/help" | "/?" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            other if other.starts_with('/') => Self::Unknown(other.to_string()),
            text => Self::Say(text.to_string()),
        };
        Some(command)
    }
}

pub const HELP: &str = "Commands: /toggle (start, pause or resume), /hangup, /status, /quit. \
Anything else is spoken to the agent while it is listening.";

#[derive(Debug, Default)]
struct ListenerState {
    /// Epoch of the current listen, if armed.
    listening: Option<u64>,
    epoch: u64,
}

/// A `SpeechInput` fed from the console.
///
/// Clones share state: one clone is owned by the orchestrator, another by
/// the stdin reader that calls `deliver`. Every successful `arm` ends with
/// exactly one `Event::ListenEnded`, whichever of utterance, silence timeout
/// or `disarm` comes first.
#[derive(Debug, Clone)]
pub struct ConsoleListener {
    state: Arc<Mutex<ListenerState>>,
    events: mpsc::UnboundedSender<Event>,
    silence: Duration,
}

impl ConsoleListener {
    pub fn new(events: mpsc::UnboundedSender<Event>, silence: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ListenerState::default())),
            events,
            silence,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state().listening.is_some()
    }

    /// Hands a typed line to the recognizer. Returns false if it was not armed.
    pub fn deliver(&self, line: &str) -> bool {
        if self.state().listening.take().is_none() {
            return false;
        }
        self.emit(Event::Utterance(line.to_string()));
        self.emit(Event::ListenEnded);
        true
    }

    fn finish(&self, epoch: u64, failure: Option<&str>) {
        {
            let mut state = self.state();
            if state.listening != Some(epoch) {
                return;
            }
            state.listening = None;
        }
        if let Some(reason) = failure {
            self.emit(Event::ListenFailed(reason.to_string()));
        }
        self.emit(Event::ListenEnded);
    }

    fn emit(&self, event: Event) {
        if let Err(e) = self.events.send(event) {
            tracing::warn!("Failed to send recognizer event: {:?}", e);
        }
    }

    fn state(&self) -> MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpeechInput for ConsoleListener {
    fn arm(&mut self, language: &str) {
        let epoch = {
            let mut state = self.state();
            if state.listening.is_some() {
                tracing::debug!("Recognizer already active, ignoring arm");
                return;
            }
            state.epoch += 1;
            state.listening = Some(state.epoch);
            state.epoch
        };
        tracing::debug!("Listening for one utterance [{}]", language);

        let listener = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(listener.silence).await;
            listener.finish(epoch, Some("no-speech"));
        });
    }

    fn disarm(&mut self) {
        let current = self.state().listening;
        if let Some(epoch) = current {
            self.finish(epoch, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> (ConsoleListener, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConsoleListener::new(tx, Duration::from_secs(8)), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<String> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(format!("{event:?}"));
        }
        seen
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("  "), None);
        assert_eq!(ConsoleCommand::parse("/toggle"), Some(ConsoleCommand::Toggle));
        assert_eq!(ConsoleCommand::parse("/h"), Some(ConsoleCommand::HangUp));
        assert_eq!(ConsoleCommand::parse("/q"), Some(ConsoleCommand::Quit));
        assert_eq!(
            ConsoleCommand::parse(" hola, ¿qué tal? "),
            Some(ConsoleCommand::Say("hola, ¿qué tal?".into()))
        );
        assert_eq!(
            ConsoleCommand::parse("/dance"),
            Some(ConsoleCommand::Unknown("/dance".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivered_line_becomes_utterance_then_end() {
        let (mut input, mut rx) = listener();
        assert!(!input.deliver("too early"));

        input.arm("en-US");
        assert!(input.is_listening());
        assert!(input.deliver("hello"));
        assert!(!input.deliver("again"));

        // The silence timer for this listen must stay quiet.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(drain(&mut rx), vec!["Utterance(\"hello\")", "ListenEnded"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_ends_listen_with_failure() {
        let (mut input, mut rx) = listener();
        input.arm("en-US");
        input.arm("en-US");

        tokio::time::sleep(Duration::from_secs(9)).await;

        assert!(!input.is_listening());
        assert_eq!(
            drain(&mut rx),
            vec!["ListenFailed(\"no-speech\")", "ListenEnded"]
        );
    }

    #[tokio::test]
    async fn test_end_of_listen_survives_a_backlog() {
        let (mut input, mut rx) = listener();

        for turn in 0..500 {
            input.arm("en-US");
            assert!(input.deliver(&format!("line {turn}")));
        }

        let seen = drain(&mut rx);
        assert_eq!(seen.len(), 1000);
        assert_eq!(seen.last().map(String::as_str), Some("ListenEnded"));
    }

    #[tokio::test]
    async fn test_disarm_ends_listen_once() {
        let (mut input, mut rx) = listener();
        input.disarm();
        input.arm("es-ES");

        input.disarm();
        input.disarm();

        assert_eq!(drain(&mut rx), vec!["ListenEnded"]);
    }
}
