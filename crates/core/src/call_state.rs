use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallStatus {
    Idle,
    Listening,
    Thinking,
    Speaking,
    /// Reserved for the outbound console; the orchestrator treats it like `Idle`.
    Outbound,
}

impl CallStatus {
    /// True for the three speech-adjacent activities that exclude each other.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            CallStatus::Listening | CallStatus::Thinking | CallStatus::Speaking
        )
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CallStatus::Idle => "IDLE",
            CallStatus::Listening => "LISTENING",
            CallStatus::Thinking => "THINKING",
            CallStatus::Speaking => "SPEAKING",
            CallStatus::Outbound => "OUTBOUND",
        };
        f.write_str(label)
    }
}

/// The live call, exclusively owned by the orchestrator.
///
/// `listen_intent`, `input_busy` and `output_busy` replace the loose
/// "should keep listening" / "is speaking" flags a callback-driven UI would
/// scatter across closures. Only orchestrator transitions write them.
#[derive(Debug, Clone)]
pub struct Session {
    pub active: bool,
    pub elapsed_seconds: u64,
    pub status: CallStatus,
    /// The user wants the recognizer running whenever nothing else is.
    pub listen_intent: bool,
    /// `arm()` was called and its `ListenEnded` has not arrived yet.
    pub input_busy: bool,
    /// `speak()` was called and its terminal event has not arrived yet.
    pub output_busy: bool,
    /// Bumped on every pause and hang-up; scheduled re-arms carry it.
    pub generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            active: false,
            elapsed_seconds: 0,
            status: CallStatus::Idle,
            listen_intent: false,
            input_busy: false,
            output_busy: false,
            generation: 0,
        }
    }

    pub fn timer(&self) -> String {
        format_timer(self.elapsed_seconds)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats elapsed seconds as `MM:SS`. Minutes keep counting past 99.
pub fn format_timer(total_seconds: u64) -> String {
    let mins = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{mins:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timer() {
        assert_eq!(format_timer(0), "00:00");
        assert_eq!(format_timer(59), "00:59");
        assert_eq!(format_timer(61), "01:01");
        assert_eq!(format_timer(6000), "100:00");
    }

    #[test]
    fn test_only_speech_states_are_busy() {
        assert!(!CallStatus::Idle.is_busy());
        assert!(!CallStatus::Outbound.is_busy());
        assert!(CallStatus::Listening.is_busy());
        assert!(CallStatus::Thinking.is_busy());
        assert!(CallStatus::Speaking.is_busy());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&CallStatus::Thinking).unwrap();
        assert_eq!(json, "\"THINKING\"");
    }
}
