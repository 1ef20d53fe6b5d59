use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::text::truncate_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// The most recent `max_turns` exchanges; the oldest turn is evicted first.
///
/// Deserialised history is replayed through [`ConversationHistory::push`],
/// so a loaded payload obeys the same caps as one built turn by turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredHistory")]
pub struct ConversationHistory {
    max_turns: usize,
    turn_bytes: usize,
    turns: VecDeque<Turn>,
}

impl ConversationHistory {
    pub const DEFAULT_MAX_TURNS: usize = 20;
    pub const DEFAULT_TURN_BYTES: usize = 2000;

    pub fn new(max_turns: usize) -> Self {
        Self::with_turn_bytes(max_turns, Self::DEFAULT_TURN_BYTES)
    }

    /// `turn_bytes` caps each stored turn's text.
    pub fn with_turn_bytes(max_turns: usize, turn_bytes: usize) -> Self {
        Self {
            max_turns,
            turn_bytes,
            turns: VecDeque::with_capacity(max_turns.min(64)),
        }
    }

    pub fn push(&mut self, role: Role, text: impl AsRef<str>) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            role,
            text: truncate_bytes(text.as_ref(), self.turn_bytes).to_string(),
        });
    }

    pub fn push_user(&mut self, text: impl AsRef<str>) {
        self.push(Role::User, text);
    }

    pub fn push_assistant(&mut self, text: impl AsRef<str>) {
        self.push(Role::Assistant, text);
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The last `n` turns in chronological order.
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn turn_bytes(&self) -> usize {
        self.turn_bytes
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[derive(Deserialize)]
struct StoredHistory {
    max_turns: usize,
    turn_bytes: usize,
    #[serde(default)]
    turns: Vec<Turn>,
}

impl From<StoredHistory> for ConversationHistory {
    fn from(stored: StoredHistory) -> Self {
        let mut history = Self::with_turn_bytes(stored.max_turns, stored.turn_bytes);
        for turn in stored.turns {
            history.push(turn.role, turn.text);
        }
        history
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_TURNS)
    }
}
