use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::Timestamp;

/// Server-assigned message identifier, stable for the message's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse().map(Self)
    }
}

/// Identifier of a chat group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse().map(Self)
    }
}

/// Lifecycle state of a message in the timeline.
///
/// Transitions are `Active -> Edited -> Edited` and `Active | Edited -> Deleted`.
/// Nothing leaves `Deleted`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// As originally sent.
    Active,
    /// Text replaced at least once.
    Edited,
    /// Tombstone: text cleared, entry retained.
    Deleted,
}

impl MessageState {
    /// Lowercase name used in logs and serialized forms.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Edited => "edited",
            Self::Deleted => "deleted",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl Display for MessageState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Which side of the conversation a message is rendered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Authored by the signed-in user.
    Own,
    /// Authored by someone else.
    Other,
}

/// One chat message as known to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Merge key for reconciliation.
    pub id: MessageId,

    /// Username of the author.
    pub sender_id: String,

    /// Current display text; empty once deleted.
    pub text: String,

    /// Original creation time, never changed after construction.
    pub created_at: Timestamp,

    /// Lifecycle state.
    pub state: MessageState,
}

impl Message {
    /// Creates an `Active` message.
    #[must_use]
    pub fn new(
        id: MessageId,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            sender_id: sender_id.into(),
            text: text.into(),
            created_at,
            state: MessageState::Active,
        }
    }

    /// Side derived from the current session user; never stored.
    #[must_use]
    pub fn side(&self, current_user: &str) -> Side {
        if self.sender_id == current_user {
            Side::Own
        } else {
            Side::Other
        }
    }

    /// Whether the message is a tombstone.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> Message {
        Message::new(
            MessageId(7),
            "alice",
            "Hello, world!",
            Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap()),
        )
    }

    #[test]
    fn test_message_creation() {
        let message = sample();

        assert_eq!(message.text, "Hello, world!");
        assert_eq!(message.state, MessageState::Active);
        assert!(!message.is_deleted());
    }

    #[test]
    fn side_is_derived_from_current_user() {
        let message = sample();

        assert_eq!(message.side("alice"), Side::Own);
        assert_eq!(message.side("bob"), Side::Other);
        assert_eq!(message.side(""), Side::Other);
    }

    #[test]
    fn ids_parse_from_cli_input() {
        assert_eq!(" 42 ".parse::<MessageId>().unwrap(), MessageId(42));
        assert_eq!("3".parse::<GroupId>().unwrap(), GroupId(3));
        assert!("x".parse::<MessageId>().is_err());
    }

    #[test]
    fn test_message_serialization() {
        let message = sample();

        let serialized = serde_json::to_string(&message).unwrap();
        assert!(serialized.contains("\"id\":7"));
        assert!(serialized.contains("\"state\":\"active\""));

        let deserialized: Message = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, message);
    }

    #[test]
    fn only_deleted_is_terminal() {
        assert!(MessageState::Deleted.is_terminal());
        assert!(!MessageState::Edited.is_terminal());
        assert!(!MessageState::Active.is_terminal());
    }
}
