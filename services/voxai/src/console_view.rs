use chrono::{DateTime, Utc};
use tokio::sync::watch;
use voxai_core::call_state::CallStatus;
use voxai_core::orchestrator::CallView;
use voxai_core::transcript::Role;

/// Turns successive `CallView` snapshots into console lines.
///
/// Only changes are printed: new transcript entries, status transitions and
/// a changed intent label. The one-second timer is left to `/status`.
#[derive(Debug, Default)]
pub struct ConsoleView {
    status: Option<CallStatus>,
    shown: usize,
    session_start: Option<DateTime<Utc>>,
    intent: Option<String>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &CallView) -> Vec<String> {
        let mut lines = Vec::new();

        // A new session starts a fresh transcript.
        let first = view.transcript.first().map(|e| e.created_at);
        if view.transcript.len() < self.shown || (self.shown > 0 && first != self.session_start) {
            self.shown = 0;
        }
        if self.shown == 0 {
            self.session_start = first;
        }
        for entry in &view.transcript[self.shown..] {
            let speaker = match entry.role {
                Role::User => "You",
                Role::Agent => "VoxAI",
            };
            lines.push(format!("{speaker:>6}: {}", entry.text));
        }
        self.shown = view.transcript.len();

        if self.intent.as_deref() != Some(view.context.intent.as_str()) {
            if self.intent.is_some() {
                lines.push(format!("        (intent: {})", view.context.intent));
            }
            self.intent = Some(view.context.intent.clone());
        }

        if self.status != Some(view.status) {
            self.status = Some(view.status);
            lines.push(format!("[{}] {}", view.status, view.timer));
        }

        lines
    }
}

/// Prints every change until the orchestrator drops its end of the channel.
pub async fn run(mut views: watch::Receiver<CallView>) {
    let mut console = ConsoleView::new();
    loop {
        let lines = {
            let view = views.borrow_and_update();
            console.render(&view)
        };
        for line in lines {
            println!("{line}");
        }
        if views.changed().await.is_err() {
            break;
        }
    }
}
