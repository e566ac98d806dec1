//! Simulated outbound calling.
//!
//! There is no telephony here: every recipient walks through a fixed
//! timeline of states, and each change is streamed to the caller.

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const DEFAULT_PURPOSE: &str = "Information Delivery";
pub const DEFAULT_AGENT: &str = "VoxAI General Agent";
pub const DEFAULT_SCRIPT: &str = "Hello, this is VoxAI reaching out regarding your account security update. Are you able to talk for a moment?";
pub const DEFAULT_RECIPIENTS: &str = "+1 (555) 012-3456, +1 (555) 098-7654";

const USER_LINE: &str = "[User] Yes, I am listening.";
const CLOSING_LINE: &str = "[VoxAI] Great. Your security patch has been applied successfully.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientState {
    Idle,
    Calling,
    Connected,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientStatus {
    pub id: String,
    /// Position in the recipient list.
    pub index: usize,
    pub phone: String,
    pub state: RecipientState,
    pub transcript: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignConfig {
    pub purpose: String,
    pub agent: String,
    pub script: String,
    pub recipients: Vec<String>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            purpose: DEFAULT_PURPOSE.to_string(),
            agent: DEFAULT_AGENT.to_string(),
            script: DEFAULT_SCRIPT.to_string(),
            recipients: parse_recipients(DEFAULT_RECIPIENTS),
        }
    }
}

/// Splits a comma-separated recipient list, trimming entries and dropping blanks.
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// When each state is reached, as `base + index * step` from campaign start.
#[derive(Debug, Clone)]
pub struct CampaignTimings {
    pub calling: (Duration, Duration),
    pub connected: (Duration, Duration),
    pub completed: (Duration, Duration),
}

impl Default for CampaignTimings {
    fn default() -> Self {
        let ms = Duration::from_millis;
        Self {
            calling: (ms(500), ms(800)),
            connected: (ms(3000), ms(1200)),
            completed: (ms(7000), ms(1500)),
        }
    }
}

impl CampaignTimings {
    pub fn offset(&self, state: RecipientState, index: usize) -> Duration {
        let (base, step) = match state {
            RecipientState::Idle => return Duration::ZERO,
            RecipientState::Calling => self.calling,
            RecipientState::Connected => self.connected,
            RecipientState::Completed => self.completed,
        };
        base + step * index as u32
    }
}

/// Runs the whole campaign and returns the final status of every recipient.
///
/// Each state change is sent on `updates` as it happens. A dropped receiver
/// does not stop the simulation.
pub async fn run_campaign(
    config: &CampaignConfig,
    timings: &CampaignTimings,
    updates: mpsc::Sender<RecipientStatus>,
) -> Vec<RecipientStatus> {
    let started = Instant::now();
    let stamp = Utc::now().timestamp_millis();
    let mut statuses: Vec<RecipientStatus> = config
        .recipients
        .iter()
        .enumerate()
        .map(|(index, phone)| RecipientStatus {
            id: format!("call-{index}-{stamp}"),
            index,
            phone: phone.clone(),
            state: RecipientState::Idle,
            transcript: Vec::new(),
        })
        .collect();

    tracing::info!(
        "Campaign '{}' by {} to {} recipient(s)",
        config.purpose,
        config.agent,
        statuses.len()
    );

    let mut schedule: Vec<(Duration, usize, RecipientState)> = (0..statuses.len())
        .flat_map(|i| {
            [
                RecipientState::Calling,
                RecipientState::Connected,
                RecipientState::Completed,
            ]
            .into_iter()
            .map(move |state| (timings.offset(state, i), i, state))
        })
        .collect();
    schedule.sort();

    let opening = format!("[VoxAI] {}", config.script);
    for (offset, index, state) in schedule {
        tokio::time::sleep_until(started + offset).await;

        let status = &mut statuses[index];
        // Custom timings may order a later state first; never move backwards.
        if state <= status.state {
            continue;
        }
        status.state = state;
        match state {
            RecipientState::Connected => status.transcript = vec![opening.clone()],
            RecipientState::Completed => {
                status.transcript = vec![
                    opening.clone(),
                    USER_LINE.to_string(),
                    CLOSING_LINE.to_string(),
                ]
            }
            _ => {}
        }
        tracing::debug!("{} is now {:?}", status.phone, state);
        if updates.send(status.clone()).await.is_err() {
            tracing::trace!("Campaign updates receiver dropped");
        }
    }

    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients_trims_and_drops_blanks() {
        let list = parse_recipients(" +1 555 0100 ,, +1 555 0199,  ");
        assert_eq!(list, vec!["+1 555 0100", "+1 555 0199"]);
        assert!(parse_recipients(" , ").is_empty());
    }

    #[test]
    fn test_default_campaign() {
        let config = CampaignConfig::default();
        assert_eq!(config.purpose, "Information Delivery");
        assert_eq!(config.agent, "VoxAI General Agent");
        assert_eq!(config.recipients.len(), 2);
    }

    #[test]
    fn test_offsets_stagger_by_index() {
        let timings = CampaignTimings::default();
        assert_eq!(
            timings.offset(RecipientState::Calling, 2),
            Duration::from_millis(2100)
        );
        assert_eq!(
            timings.offset(RecipientState::Connected, 1),
            Duration::from_millis(4200)
        );
        assert_eq!(
            timings.offset(RecipientState::Completed, 0),
            Duration::from_millis(7000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_campaign_streams_states_in_time_order() {
        // --- Arrange ---
        let config = CampaignConfig {
            script: "Hi from VoxAI.".to_string(),
            ..CampaignConfig::default()
        };
        let (tx, mut rx) = mpsc::channel(16);
        let started = Instant::now();

        // --- Act ---
        let finals = run_campaign(&config, &CampaignTimings::default(), tx).await;

        // --- Assert ---
        assert!(started.elapsed() >= Duration::from_millis(8500));
        let mut seen = Vec::new();
        while let Ok(update) = rx.try_recv() {
            seen.push((update.index, update.state));
        }
        assert_eq!(
            seen,
            vec![
                (0, RecipientState::Calling),
                (1, RecipientState::Calling),
                (0, RecipientState::Connected),
                (1, RecipientState::Connected),
                (0, RecipientState::Completed),
                (1, RecipientState::Completed),
            ]
        );
        assert!(finals.iter().all(|r| r.state == RecipientState::Completed));
        assert_eq!(finals[0].transcript[0], "[VoxAI] Hi from VoxAI.");
        assert_eq!(finals[1].transcript.len(), 3);
        assert_ne!(finals[0].id, finals[1].id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_campaign_finishes_without_listener() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let config = CampaignConfig {
            recipients: vec!["+44 20 7946 0000".to_string()],
            ..CampaignConfig::default()
        };

        let finals = run_campaign(&config, &CampaignTimings::default(), tx).await;

        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].state, RecipientState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_campaign_returns_immediately() {
        let (tx, _rx) = mpsc::channel(1);
        let config = CampaignConfig {
            recipients: Vec::new(),
            ..CampaignConfig::default()
        };
        assert!(run_campaign(&config, &CampaignTimings::default(), tx).await.is_empty());
    }
}
