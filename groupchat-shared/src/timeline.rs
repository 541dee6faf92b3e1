//! # Timeline
//!
//! The reconciler that merges fetched history and live events into one
//! ordered, id-unique view model. Every ingestion returns the minimal list of
//! [`TimelineDiff`]s a renderer needs to apply; an empty list means the call
//! changed nothing.
//!
//! The timeline has a single writer. It is owned by the chat view and
//! renderers only ever see diffs and shared references.

use std::collections::HashMap;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::models::{LiveEvent, Message, MessageId, MessageState, Timestamp, UnreadMarker};

/// Reasons an ingestion could not be applied.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TimelineError {
    /// An edit or delete named a message the timeline has never seen.
    #[error("message {0} is not in the timeline")]
    DanglingReference(MessageId),
}

/// A single change to the timeline, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineDiff {
    /// A message was appended at `position`.
    Created {
        /// Index of the new entry.
        position: usize,
        /// The entry as stored.
        message: Message,
    },
    /// The display text of an existing message changed.
    TextChanged {
        /// Changed message.
        id: MessageId,
        /// New display text.
        text: String,
    },
    /// The lifecycle state of an existing message changed.
    StateChanged {
        /// Changed message.
        id: MessageId,
        /// New state.
        state: MessageState,
    },
}

impl TimelineDiff {
    /// Message the diff applies to.
    #[must_use]
    pub const fn message_id(&self) -> MessageId {
        match self {
            Self::Created { message, .. } => message.id,
            Self::TextChanged { id, .. } | Self::StateChanged { id, .. } => *id,
        }
    }
}

/// Ordered, id-unique collection of the messages of the active group.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    entries: Vec<Message>,
    positions: HashMap<MessageId, usize>,
    unread: UnreadMarker,
}

impl Timeline {
    /// An empty timeline with no unread boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been ingested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Iterates over the entries in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.entries.iter()
    }

    /// Looks up an entry by id.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.position(id).and_then(|idx| self.entries.get(idx))
    }

    /// Whether `id` has been ingested.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Index of `id` in arrival order.
    #[must_use]
    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Appends fetched history in server order, skipping ids already present.
    ///
    /// Messages keep the state they arrive with.
    pub fn ingest_history<I>(&mut self, messages: I) -> Vec<TimelineDiff>
    where
        I: IntoIterator<Item = Message>,
    {
        let diffs: Vec<TimelineDiff> = messages
            .into_iter()
            .filter_map(|message| self.append(message))
            .collect();
        debug!(
            appended = diffs.len(),
            total = self.entries.len(),
            "ingested history"
        );
        diffs
    }

    /// Appends a live message as `Active`. A repeated id is a no-op.
    pub fn ingest_create(&mut self, mut message: Message) -> Option<TimelineDiff> {
        message.state = MessageState::Active;
        self.append(message)
    }

    /// Replaces the text of a message and marks it `Edited`.
    ///
    /// Re-applying the same edit yields no diffs. Edits of deleted messages are
    /// ignored so tombstones stay tombstones.
    ///
    /// # Errors
    /// Returns [`TimelineError::DanglingReference`] when `id` is unknown; the
    /// timeline is left untouched.
    pub fn ingest_edit(
        &mut self,
        id: MessageId,
        new_text: impl Into<String>,
    ) -> Result<Vec<TimelineDiff>, TimelineError> {
        let new_text = new_text.into();
        let entry = self.entry_mut(id, "edit")?;
        if entry.state.is_terminal() {
            debug!(message_id = %id, "ignoring edit of deleted message");
            return Ok(Vec::new());
        }

        let mut diffs = Vec::with_capacity(2);
        if entry.text != new_text {
            entry.text.clone_from(&new_text);
            diffs.push(TimelineDiff::TextChanged { id, text: new_text });
        }
        if entry.state != MessageState::Edited {
            entry.state = MessageState::Edited;
            diffs.push(TimelineDiff::StateChanged {
                id,
                state: MessageState::Edited,
            });
        }
        Ok(diffs)
    }

    /// Clears the text of a message and marks it `Deleted`. Idempotent.
    ///
    /// # Errors
    /// Returns [`TimelineError::DanglingReference`] when `id` is unknown.
    pub fn ingest_delete(&mut self, id: MessageId) -> Result<Vec<TimelineDiff>, TimelineError> {
        let entry = self.entry_mut(id, "delete")?;

        let mut diffs = Vec::with_capacity(2);
        if !entry.text.is_empty() {
            entry.text.clear();
            diffs.push(TimelineDiff::TextChanged {
                id,
                text: String::new(),
            });
        }
        if entry.state != MessageState::Deleted {
            entry.state = MessageState::Deleted;
            diffs.push(TimelineDiff::StateChanged {
                id,
                state: MessageState::Deleted,
            });
        }
        Ok(diffs)
    }

    /// Routes a live event to the matching ingestion.
    ///
    /// # Errors
    /// Propagates [`TimelineError::DanglingReference`] from edits and deletes.
    pub fn apply(&mut self, event: LiveEvent) -> Result<Vec<TimelineDiff>, TimelineError> {
        match event {
            LiveEvent::Create {
                id,
                text,
                sender_name,
                datetime,
            } => {
                let message =
                    Message::new(id, sender_name, text, datetime.unwrap_or_else(Timestamp::now));
                Ok(self.ingest_create(message).into_iter().collect())
            }
            LiveEvent::Edit { id, new_text } => self.ingest_edit(id, new_text),
            LiveEvent::Delete { id, .. } => self.ingest_delete(id),
        }
    }

    /// Records where the unread divider goes. Set once per activation.
    pub fn mark_unread_boundary(&mut self, marker: UnreadMarker) {
        self.unread = marker;
    }

    /// The boundary recorded for this activation.
    #[must_use]
    pub const fn unread_marker(&self) -> UnreadMarker {
        self.unread
    }

    /// Message the unread divider is rendered before, if it is in the timeline.
    #[must_use]
    pub fn divider_before(&self) -> Option<MessageId> {
        self.unread.message_id().filter(|id| self.contains(*id))
    }

    fn append(&mut self, message: Message) -> Option<TimelineDiff> {
        if self.positions.contains_key(&message.id) {
            trace!(message_id = %message.id, "skipping duplicate message");
            return None;
        }
        let position = self.entries.len();
        self.positions.insert(message.id, position);
        self.entries.push(message.clone());
        Some(TimelineDiff::Created { position, message })
    }

    fn entry_mut(&mut self, id: MessageId, kind: &'static str) -> Result<&mut Message, TimelineError> {
        match self.positions.get(&id).copied() {
            Some(idx) => self
                .entries
                .get_mut(idx)
                .ok_or(TimelineError::DanglingReference(id)),
            None => {
                warn!(message_id = %id, event = kind, "dangling reference ignored");
                counter!("groupchat_dangling_references_total", "event" => kind).increment(1);
                Err(TimelineError::DanglingReference(id))
            }
        }
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
