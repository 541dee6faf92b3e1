use async_trait::async_trait;
use shared::models::{GroupId, LiveEvent};
use tokio::sync::mpsc;

use crate::error::ClientResult;

/// Bounded capacity for both directions of a push channel.
pub const CHANNEL_CAPACITY: usize = 64;

/// Connection parameters for the two live subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelParams {
    /// Bearer token of the session.
    pub token: String,
    /// Group whose events are subscribed to.
    pub group_id: GroupId,
}

/// What a push channel reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Both subscriptions are established.
    Opened,
    /// A decoded inbound event.
    Event(LiveEvent),
    /// The channel is gone. Sent at most once, and nothing follows it.
    Closed {
        /// Close reason or transport error, when known.
        reason: Option<String>,
    },
}

/// Owner's half of an open push channel.
///
/// Dropping it tears the channel down.
#[derive(Debug)]
pub struct PushChannel {
    /// Events from the transport, in delivery order.
    pub inbound: mpsc::Receiver<ChannelEvent>,
    /// Text to send over the outbound subscription.
    pub outbound: mpsc::Sender<String>,
}

/// Transport's half of a push channel.
#[derive(Debug)]
pub struct ChannelEndpoints {
    /// Where the transport reports events.
    pub events: mpsc::Sender<ChannelEvent>,
    /// Text the owner asked to send.
    pub sends: mpsc::Receiver<String>,
}

impl PushChannel {
    /// Creates a connected owner/transport pair.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, ChannelEndpoints) {
        let (events, inbound) = mpsc::channel(capacity);
        let (outbound, sends) = mpsc::channel(capacity);
        (Self { inbound, outbound }, ChannelEndpoints { events, sends })
    }
}

/// Opens push channels. `open` must not wait for the handshake; the
/// returned channel reports [`ChannelEvent::Opened`] once it is ready.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Starts opening a channel with `params`.
    ///
    /// # Errors
    /// Returns an error when the channel cannot even be attempted, such as
    /// an unusable endpoint URL.
    async fn open(&self, params: &ChannelParams) -> ClientResult<PushChannel>;
}
