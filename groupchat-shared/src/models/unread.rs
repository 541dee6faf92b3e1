use serde::{Deserialize, Serialize};

use super::message::MessageId;

/// Boundary between already-seen and unseen history, fixed at activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadMarker {
    /// The first message the user has not seen yet.
    At(MessageId),
    /// Empty history, everything read, or the marker could not be fetched.
    #[default]
    NoBoundary,
}

impl UnreadMarker {
    /// The first unread message, if there is one.
    #[must_use]
    pub const fn message_id(self) -> Option<MessageId> {
        match self {
            Self::At(id) => Some(id),
            Self::NoBoundary => None,
        }
    }
}

impl From<Option<MessageId>> for UnreadMarker {
    fn from(value: Option<MessageId>) -> Self {
        value.map_or(Self::NoBoundary, Self::At)
    }
}
