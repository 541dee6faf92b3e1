//! Wire and view models shared by the client crates.

pub mod errors;
pub mod message;
pub mod timestamp;
pub mod unread;
pub mod wire;

pub use errors::ErrorResponse;
pub use message::{GroupId, Message, MessageId, MessageState, Side};
pub use timestamp::Timestamp;
pub use unread::UnreadMarker;
pub use wire::{GroupMembersResponse, HistoryEntry, LiveEvent};
