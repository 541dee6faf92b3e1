//! Live connection: push transport abstraction, the WebSocket transport, and
//! the connection manager that drives reconnects.

mod manager;
mod transport;
mod websocket;

pub use manager::{ConnectionManager, ConnectionSignal, ConnectionState, DropOutcome};
pub use transport::{
    CHANNEL_CAPACITY, ChannelEndpoints, ChannelEvent, ChannelParams, PushChannel, PushTransport,
};
pub use websocket::WsTransport;
