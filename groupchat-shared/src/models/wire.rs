//! Payloads exchanged with the chat server over HTTP and the live channel.

use serde::{Deserialize, Serialize};

use super::{
    message::{GroupId, Message, MessageId},
    timestamp::{Timestamp, lenient},
};

/// One row of `GET /group/{group_id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Server id of the message.
    pub message_id: MessageId,
    /// Author.
    pub username: String,
    /// Current text.
    pub message_text: String,
    /// Creation time; `None` when missing or unreadable.
    #[serde(default, deserialize_with = "lenient")]
    pub datetime: Option<Timestamp>,
}

impl HistoryEntry {
    /// Converts the row into an `Active` timeline message.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::new(
            self.message_id,
            self.username,
            self.message_text,
            self.datetime.unwrap_or_else(Timestamp::now),
        )
    }
}

/// Response of `GET /group/{group_id}/members`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMembersResponse {
    /// Group the list belongs to.
    pub group_id: GroupId,
    /// Usernames of the members.
    pub members: Vec<String>,
}

/// Event pushed by the server on the inbound live channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum LiveEvent {
    /// A message was posted to the group. The server tags these `Text`.
    #[serde(rename = "Create", alias = "Text")]
    Create {
        /// Server id of the new message.
        id: MessageId,
        /// Message text.
        text: String,
        /// Author.
        sender_name: String,
        /// Creation time; the receive time is used when absent.
        #[serde(default, deserialize_with = "lenient")]
        datetime: Option<Timestamp>,
    },
    /// A message's text was replaced.
    Edit {
        /// Edited message.
        id: MessageId,
        /// Replacement text.
        new_text: String,
    },
    /// A message was deleted.
    Delete {
        /// Deleted message.
        id: MessageId,
        /// Usually empty or absent; ignored.
        #[serde(default)]
        new_text: Option<String>,
    },
}

impl LiveEvent {
    /// Id of the message the event refers to.
    #[must_use]
    pub const fn message_id(&self) -> MessageId {
        match self {
            Self::Create { id, .. } | Self::Edit { id, .. } | Self::Delete { id, .. } => *id,
        }
    }

    /// Short event name for logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_rows_decode_server_shape() {
        let json = r#"[
            {"username":"alice","message_id":1,"datetime":"2024-05-01 12:00:00.123456","message_text":"hi"},
            {"username":"bob","message_id":2,"datetime":"2024-05-01 12:00:05","message_text":"hey"}
        ]"#;
        let rows: Vec<HistoryEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(rows.len(), 2);
        let first = rows[0].clone().into_message();
        assert_eq!(first.id, MessageId(1));
        assert_eq!(first.sender_id, "alice");
        assert_eq!(first.text, "hi");
        assert_eq!(first.created_at.to_string(), "2024-05-01 12:00:00");
    }

    #[test]
    fn history_accepts_null_body() {
        let rows: Option<Vec<HistoryEntry>> = serde_json::from_str("null").unwrap();
        assert!(rows.is_none());
    }

    #[test]
    fn server_text_event_decodes_as_create() {
        let json = r#"{"text":"hello","sender_name":"bob","id":9,"type":"Text","datetime":"2024-05-01 12:00:00"}"#;
        let event: LiveEvent = serde_json::from_str(json).unwrap();

        match event {
            LiveEvent::Create {
                id,
                text,
                sender_name,
                datetime,
            } => {
                assert_eq!(id, MessageId(9));
                assert_eq!(text, "hello");
                assert_eq!(sender_name, "bob");
                assert!(datetime.is_some());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn create_tag_is_accepted() {
        let json = r#"{"type":"Create","id":3,"text":"x","sender_name":"a","datetime":"not a date"}"#;
        let event: LiveEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.message_id(), MessageId(3));
        assert!(matches!(event, LiveEvent::Create { datetime: None, .. }));
    }

    #[test]
    fn edit_and_delete_events_decode() {
        let edit: LiveEvent =
            serde_json::from_str(r#"{"type":"Edit","id":1,"new_text":"hi!"}"#).unwrap();
        let delete: LiveEvent =
            serde_json::from_str(r#"{"type":"Delete","id":1,"new_text":""}"#).unwrap();
        let bare_delete: LiveEvent = serde_json::from_str(r#"{"type":"Delete","id":1}"#).unwrap();

        assert_eq!(
            edit,
            LiveEvent::Edit {
                id: MessageId(1),
                new_text: "hi!".into()
            }
        );
        assert_eq!(delete.kind(), "delete");
        assert_eq!(bare_delete.message_id(), MessageId(1));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let result = serde_json::from_str::<LiveEvent>(r#"{"type":"Typing","id":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn members_response_decodes() {
        let members: GroupMembersResponse =
            serde_json::from_str(r#"{"group_id":4,"members":["alice","bob"]}"#).unwrap();
        assert_eq!(members.group_id, GroupId(4));
        assert_eq!(members.members, vec!["alice", "bob"]);
    }
}
