use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxai_core::Event;
use voxai_core::ports::{SpeechOutput, UtteranceId};
use voxai_core::voice::{Voice, select_voice};

/// A `SpeechOutput` that "plays" text by waiting a fixed time per word.
///
/// Each utterance reports `SpeechStarted` and then exactly one terminal
/// event: `SpeechEnded` when the time runs out, or `SpeechFailed` with
/// `interrupted` when it is cancelled or replaced.
pub struct ConsoleSpeaker {
    voices: Vec<Voice>,
    word_pace: Duration,
    events: mpsc::UnboundedSender<Event>,
    current: Arc<Mutex<Option<UtteranceId>>>,
    playback: Option<JoinHandle<()>>,
}

impl ConsoleSpeaker {
    pub fn new(
        voices: Vec<Voice>,
        word_pace: Duration,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            voices,
            word_pace,
            events,
            current: Arc::new(Mutex::new(None)),
            playback: None,
        }
    }

    /// How long `text` takes to say. Never zero, so start always precedes end.
    pub fn duration_of(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count().max(1) as u32;
        self.word_pace * words
    }

    fn current(&self) -> MutexGuard<'_, Option<UtteranceId>> {
        lock(&self.current)
    }
}

fn lock(slot: &Mutex<Option<UtteranceId>>) -> MutexGuard<'_, Option<UtteranceId>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn emit(events: &mpsc::UnboundedSender<Event>, event: Event) {
    if let Err(e) = events.send(event) {
        tracing::warn!("Failed to send synthesizer event: {:?}", e);
    }
}

impl SpeechOutput for ConsoleSpeaker {
    fn speak(&mut self, utterance: UtteranceId, text: &str, language: &str) {
        self.cancel();

        match select_voice(&self.voices, language) {
            Some(voice) => tracing::info!("Speaking as {} [{}]: {}", voice.name, language, text),
            None => tracing::info!("Speaking with the default voice [{}]: {}", language, text),
        }

        *self.current() = Some(utterance);
        emit(&self.events, Event::SpeechStarted(utterance));

        let duration = self.duration_of(text);
        let current = self.current.clone();
        let events = self.events.clone();
        self.playback = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let finished = {
                let mut slot = lock(&current);
                if *slot == Some(utterance) {
                    *slot = None;
                    true
                } else {
                    false
                }
            };
            if finished {
                emit(&events, Event::SpeechEnded(utterance));
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
        let cancelled = self.current().take();
        if let Some(utterance) = cancelled {
            tracing::debug!("Speech {:?} interrupted", utterance);
            emit(
                &self.events,
                Event::SpeechFailed(utterance, "interrupted".to_string()),
            );
        }
    }
}
