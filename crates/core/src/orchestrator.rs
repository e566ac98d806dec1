use crate::call_state::{CallStatus, Session};
use crate::context::ContextSnapshot;
use crate::ports::{SpeechInput, SpeechOutput, UtteranceId};
use crate::responder::{DEFAULT_LANGUAGE, FAILED_INTENT, Responder};
use crate::transcript::{Role, Transcript, TranscriptEntry};
use crate::{Event, TurnId};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Why a response-service call produced no usable result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TurnFailure {
    #[error("response service failed: {0}")]
    Service(String),
    #[error("response service timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Recognition language until the first reply re-targets it.
    pub default_language: String,
    pub session_label: String,
    /// Pause after speech ends before the microphone is re-armed, so the tail
    /// of the agent's own audio is not captured as a new utterance.
    pub settle_delay: Duration,
    /// Pause before restarting a recognizer that stopped on its own.
    pub restart_delay: Duration,
    /// Deadline for each reply and intent call.
    pub response_timeout: Duration,
    /// Drop intent labels that settle after a newer turn has begun.
    pub discard_stale_intents: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
            session_label: "demo@example.com".to_string(),
            settle_delay: Duration::from_millis(400),
            restart_delay: Duration::from_millis(200),
            response_timeout: Duration::from_secs(15),
            discard_stale_intents: false,
        }
    }
}

/// Read-only snapshot published to the presentation layer after every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallView {
    pub status: CallStatus,
    pub active: bool,
    pub elapsed_seconds: u64,
    pub timer: String,
    pub transcript: Vec<TranscriptEntry>,
    pub context: ContextSnapshot,
}

/// The call-state engine.
///
/// Owns the session and decides, for every `Event`, whether the call is idle,
/// listening, thinking or speaking. It is the only caller of both speech
/// ports and the only writer of the transcript.
pub struct CallOrchestrator {
    config: OrchestratorConfig,
    session: Session,
    transcript: Transcript,
    context: ContextSnapshot,
    input: Box<dyn SpeechInput>,
    output: Box<dyn SpeechOutput>,
    responder: Arc<dyn Responder>,
    events: mpsc::UnboundedSender<Event>,
    view_tx: watch::Sender<CallView>,
    input_language: String,
    pending_turn: Option<TurnId>,
    last_turn: TurnId,
    current_utterance: Option<UtteranceId>,
    last_utterance: u64,
}

impl CallOrchestrator {
    /// `events` must feed the receiver later passed to `run` (or pumped into
    /// `handle`); spawned requests and timers report back through it.
    pub fn new(
        config: OrchestratorConfig,
        input: Box<dyn SpeechInput>,
        output: Box<dyn SpeechOutput>,
        responder: Arc<dyn Responder>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let session = Session::new();
        let transcript = Transcript::new();
        let context = ContextSnapshot::new(config.session_label.clone());
        let view = CallView {
            status: session.status,
            active: session.active,
            elapsed_seconds: session.elapsed_seconds,
            timer: session.timer(),
            transcript: Vec::new(),
            context: context.clone(),
        };
        let (view_tx, _) = watch::channel(view);
        Self {
            input_language: config.default_language.clone(),
            config,
            session,
            transcript,
            context,
            input,
            output,
            responder,
            events,
            view_tx,
            pending_turn: None,
            last_turn: 0,
            current_utterance: None,
            last_utterance: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CallView> {
        self.view_tx.subscribe()
    }

    pub fn status(&self) -> CallStatus {
        self.session.status
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        self.transcript.entries()
    }

    pub fn context(&self) -> &ContextSnapshot {
        &self.context
    }

    /// The language the recognizer will be armed with next.
    pub fn input_language(&self) -> &str {
        &self.input_language
    }

    /// Consumes events until `Event::Shutdown`, ticking the session timer once a second.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let event = tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = ticker.tick() => Event::Tick,
            };
            let shutdown = matches!(event, Event::Shutdown);
            let was_active = self.session.active;
            self.handle(event);
            if shutdown {
                break;
            }
            // The call timer counts from the moment the session starts.
            if !was_active && self.session.active {
                ticker.reset();
            }
        }
        tracing::info!("Call orchestrator stopped");
    }

    /// Applies one event and publishes the resulting view.
    pub fn handle(&mut self, event: Event) {
        tracing::trace!("Handling {:?} in {}", event, self.session.status);
        match event {
            Event::ToggleSession => self.toggle_session(),
            Event::HangUp | Event::Shutdown => self.hang_up(),
            Event::Utterance(text) => self.on_utterance(text),
            Event::ListenFailed(reason) => {
                tracing::debug!("Recognizer reported: {}", reason);
            }
            Event::ListenEnded => self.on_listen_ended(),
            Event::SpeechStarted(id) => {
                if self.current_utterance == Some(id) {
                    tracing::debug!("Agent speaking ({:?})", id);
                }
            }
            Event::SpeechEnded(id) => self.on_speech_finished(id, None),
            Event::SpeechFailed(id, reason) => self.on_speech_finished(id, Some(reason)),
            Event::ReplyReady { turn, result } => self.on_reply(turn, result),
            Event::IntentReady { turn, result } => self.on_intent(turn, result),
            Event::Rearm { generation } => self.on_rearm(generation),
            Event::Tick => {
                if self.session.active {
                    self.session.elapsed_seconds += 1;
                }
            }
        }
        self.publish();
    }

    fn toggle_session(&mut self) {
        if !self.session.active {
            tracing::info!("Starting session");
            self.session.active = true;
            self.session.elapsed_seconds = 0;
            self.session.generation += 1;
            self.transcript.clear();
            self.session.listen_intent = true;
            if !self.start_listening() {
                tracing::debug!("Recognizer still winding down; listening once it ends");
            }
            return;
        }

        match self.session.status {
            CallStatus::Idle | CallStatus::Outbound => {
                tracing::info!("Resuming listening");
                self.session.listen_intent = true;
                self.start_listening();
            }
            status => {
                tracing::info!("Pausing while {}", status);
                self.stop_activity();
                self.set_status(CallStatus::Idle);
            }
        }
    }

    fn hang_up(&mut self) {
        if !self.session.active && self.session.status == CallStatus::Idle {
            tracing::debug!("Hang-up with no active session");
            return;
        }
        self.stop_activity();
        self.session.active = false;
        self.set_status(CallStatus::Idle);
        tracing::info!("Session ended at {}", self.session.timer());
    }

    /// Drops any in-flight turn and asks both ports to stop.
    fn stop_activity(&mut self) {
        self.session.listen_intent = false;
        self.session.generation += 1;
        if let Some(turn) = self.pending_turn.take() {
            tracing::debug!("Abandoning turn {}", turn);
        }
        self.current_utterance = None;
        self.input.disarm();
        self.output.cancel();
    }

    fn on_utterance(&mut self, text: String) {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Empty utterance ignored");
            return;
        }
        if !self.session.active || self.session.status != CallStatus::Listening {
            tracing::debug!(
                "Ignoring utterance received while {}: {:?}",
                self.session.status,
                text
            );
            return;
        }

        tracing::info!("User said: \"{}\"", text);
        self.session.listen_intent = false;
        self.input.disarm();
        self.transcript.append(Role::User, text);

        self.last_turn += 1;
        let turn = self.last_turn;
        self.pending_turn = Some(turn);
        self.set_status(CallStatus::Thinking);
        self.dispatch_turn(turn, text.to_string());
    }

    /// Fires the reply and intent requests concurrently; neither waits on the other.
    fn dispatch_turn(&self, turn: TurnId, text: String) {
        let timeout = self.config.response_timeout;

        let responder = self.responder.clone();
        let events = self.events.clone();
        let user_text = text.clone();
        tokio::spawn(async move {
            let result = with_deadline(timeout, responder.reply(&user_text)).await;
            if events.send(Event::ReplyReady { turn, result }).is_err() {
                tracing::warn!("Orchestrator gone, dropping reply for turn {}", turn);
            }
        });

        let responder = self.responder.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = with_deadline(timeout, responder.intent(&text)).await;
            if events.send(Event::IntentReady { turn, result }).is_err() {
                tracing::warn!("Orchestrator gone, dropping intent for turn {}", turn);
            }
        });
    }

    fn on_reply(&mut self, turn: TurnId, result: Result<crate::responder::Reply, TurnFailure>) {
        if self.pending_turn != Some(turn) {
            tracing::debug!("Discarding reply for superseded turn {}", turn);
            return;
        }
        self.pending_turn = None;

        match result {
            Ok(reply) => {
                let language = if reply.language_code.trim().is_empty() {
                    self.config.default_language.clone()
                } else {
                    reply.language_code.clone()
                };
                tracing::info!("Agent replies [{}]: \"{}\"", language, reply.text);
                self.transcript.append(Role::Agent, reply.text.clone());
                self.input_language = language.clone();

                self.last_utterance += 1;
                let id = UtteranceId(self.last_utterance);
                self.current_utterance = Some(id);
                self.session.output_busy = true;
                self.output.speak(id, &reply.text, &language);
                self.set_status(CallStatus::Speaking);
            }
            Err(failure) => {
                tracing::warn!("Turn {} failed: {}", turn, failure);
                self.set_status(CallStatus::Idle);
                self.session.listen_intent = self.session.active;
                self.start_listening();
            }
        }
    }

    fn on_intent(&mut self, turn: TurnId, result: Result<String, TurnFailure>) {
        if self.config.discard_stale_intents && turn != self.last_turn {
            tracing::debug!("Discarding intent for superseded turn {}", turn);
            return;
        }
        let intent = result.unwrap_or_else(|failure| {
            tracing::debug!("Intent for turn {} unavailable: {}", turn, failure);
            FAILED_INTENT.to_string()
        });
        tracing::debug!("Intent for turn {}: {}", turn, intent);
        self.context = self.context.with_intent(intent, Utc::now());
    }

    fn on_speech_finished(&mut self, id: UtteranceId, error: Option<String>) {
        self.session.output_busy = false;

        if self.current_utterance != Some(id) {
            tracing::debug!("Cancelled utterance {:?} finished", id);
            // A resume issued while the cancel was in flight can proceed now.
            if self.session.active && self.session.listen_intent {
                self.start_listening();
            }
            return;
        }
        self.current_utterance = None;

        if !self.session.active {
            self.set_status(CallStatus::Idle);
            return;
        }
        self.session.listen_intent = true;
        match error {
            None => {
                tracing::debug!("Agent finished speaking");
                self.schedule_rearm(self.config.settle_delay);
            }
            Some(reason) => {
                tracing::warn!("Speech synthesis failed: {}", reason);
                if !self.start_listening() {
                    self.set_status(CallStatus::Idle);
                }
            }
        }
    }

    fn on_listen_ended(&mut self) {
        self.session.input_busy = false;

        let s = &self.session;
        if s.status == CallStatus::Speaking && !s.output_busy {
            // Still inside the post-speech settle window; its pending re-arm takes over.
            tracing::trace!("Recognizer ended during the settle delay");
        } else if s.listen_intent && s.active && self.pending_turn.is_none() && !s.output_busy {
            tracing::debug!("Recognizer stopped on its own, restarting");
            self.schedule_rearm(self.config.restart_delay);
        } else if self.session.status == CallStatus::Listening {
            self.set_status(CallStatus::Idle);
        }
    }

    fn on_rearm(&mut self, generation: u64) {
        if generation != self.session.generation || !self.session.listen_intent {
            tracing::trace!("Stale re-arm ignored");
            return;
        }
        if !self.start_listening() && self.session.status == CallStatus::Speaking {
            // Speech is over but the recognizer has not reported its end yet;
            // `on_listen_ended` restarts it.
            self.set_status(CallStatus::Idle);
        }
    }

    fn schedule_rearm(&self, delay: Duration) {
        let generation = self.session.generation;
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(Event::Rearm { generation }).is_err() {
                tracing::debug!("Orchestrator gone, dropping re-arm");
            }
        });
    }

    /// Arms the recognizer if nothing else holds the floor. Returns whether it did.
    fn start_listening(&mut self) -> bool {
        let s = &self.session;
        if !s.active || s.input_busy || s.output_busy || self.pending_turn.is_some() {
            return false;
        }
        self.session.input_busy = true;
        self.input.arm(&self.input_language);
        self.set_status(CallStatus::Listening);
        true
    }

    fn set_status(&mut self, status: CallStatus) {
        self.session.status = status;
        self.context = self.context.with_status(status);
    }

    fn publish(&self) {
        self.view_tx.send_replace(CallView {
            status: self.session.status,
            active: self.session.active,
            elapsed_seconds: self.session.elapsed_seconds,
            timer: self.session.timer(),
            transcript: self.transcript.entries().to_vec(),
            context: self.context.clone(),
        });
    }
}

async fn with_deadline<T>(
    timeout: Duration,
    request: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, TurnFailure> {
    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TurnFailure::Service(format!("{e:#}"))),
        Err(_) => Err(TurnFailure::TimedOut(timeout)),
    }
}
