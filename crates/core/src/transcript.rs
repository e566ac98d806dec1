use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    fn id_prefix(self) -> char {
        match self {
            Role::User => 'u',
            Role::Agent => 'a',
        }
    }
}

/// One line of the conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only conversation log for one session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_seq: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns a reference to it.
    ///
    /// Timestamps are strictly increasing even when the clock does not move
    /// (or moves backwards) between two appends.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> &TranscriptEntry {
        let now = Utc::now();
        let created_at = match self.entries.last() {
            Some(last) if now <= last.created_at => last.created_at + TimeDelta::microseconds(1),
            _ => now,
        };
        self.next_seq += 1;
        let entry = TranscriptEntry {
            id: format!("{}-{}", role.id_prefix(), self.next_seq),
            role,
            text: text.into(),
            created_at,
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Drops all entries. Only used when a new session starts.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_append_assigns_unique_ids_and_ordered_times() {
        let mut transcript = Transcript::new();
        for i in 0..50 {
            let role = if i % 2 == 0 { Role::User } else { Role::Agent };
            transcript.append(role, format!("line {i}"));
        }

        let ids: HashSet<_> = transcript.entries().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids.len(), 50);

        for pair in transcript.entries().windows(2) {
            assert!(pair[0].created_at < pair[1].created_at);
        }
        assert_eq!(transcript.entries()[0].id, "u-1");
        assert_eq!(transcript.entries()[1].id, "a-2");
    }

    #[test]
    fn test_clear_empties_the_log() {
        let mut transcript = Transcript::new();
        transcript.append(Role::User, "hello");
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.append(Role::User, "again").id, "u-1");
    }

    #[test]
    fn test_entry_serializes_lowercase_role() {
        let mut transcript = Transcript::new();
        let entry = transcript.append(Role::Agent, "Hi there!").clone();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["role"], "agent");
        assert_eq!(json["text"], "Hi there!");
    }
}
