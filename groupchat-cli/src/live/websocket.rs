//! WebSocket push transport.
//!
//! The server exposes one socket per direction: `get-unread-messages` pushes
//! events for the group and `send-message` accepts raw text. Both take the
//! token and group id as query parameters.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use shared::models::LiveEvent;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};
use url::Url;

use super::transport::{
    CHANNEL_CAPACITY, ChannelEndpoints, ChannelEvent, ChannelParams, PushChannel, PushTransport,
};
use crate::error::{ClientError, ClientResult};

const INBOUND_PATH: &str = "get-unread-messages";
const OUTBOUND_PATH: &str = "send-message";

/// [`PushTransport`] over a pair of WebSockets.
#[derive(Debug, Clone)]
pub struct WsTransport {
    base: Url,
}

impl WsTransport {
    /// Transport for the live endpoints under `base`.
    #[must_use]
    pub const fn new(base: Url) -> Self {
        Self { base }
    }

    fn channel_url(&self, path: &str, params: &ChannelParams) -> ClientResult<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| ClientError::transport(format!("resolving {path}"), err))?;
        url.query_pairs_mut()
            .append_pair("token", &params.token)
            .append_pair("group_id", &params.group_id.to_string());
        Ok(url)
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn open(&self, params: &ChannelParams) -> ClientResult<PushChannel> {
        let inbound_url = self.channel_url(INBOUND_PATH, params)?;
        let outbound_url = self.channel_url(OUTBOUND_PATH, params)?;
        let (channel, endpoints) = PushChannel::pair(CHANNEL_CAPACITY);
        tokio::spawn(run_channel(inbound_url, outbound_url, endpoints));
        Ok(channel)
    }
}

async fn run_channel(inbound_url: Url, outbound_url: Url, endpoints: ChannelEndpoints) {
    let ChannelEndpoints { events, mut sends } = endpoints;

    let handshake = async {
        let (inbound, _) = connect_async(inbound_url.as_str()).await?;
        let (outbound, _) = connect_async(outbound_url.as_str()).await?;
        Ok::<_, tokio_tungstenite::tungstenite::Error>((inbound, outbound))
    };
    let (mut inbound, outbound) = tokio::select! {
        () = events.closed() => return,
        result = handshake => match result {
            Ok(sockets) => sockets,
            Err(err) => {
                debug!(error = %err, "live channel handshake failed");
                let _ = events
                    .send(ChannelEvent::Closed { reason: Some(err.to_string()) })
                    .await;
                return;
            }
        },
    };
    if events.send(ChannelEvent::Opened).await.is_err() {
        return;
    }
    let (mut outbound_sink, mut outbound_stream) = outbound.split();

    let reason = loop {
        tokio::select! {
            frame = inbound.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<LiveEvent>(&text) {
                    Ok(event) => {
                        if events.send(ChannelEvent::Event(event)).await.is_err() {
                            break None;
                        }
                    }
                    Err(err) => warn!(error = %err, payload = %text, "ignoring malformed live event"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    break Some(frame.map_or_else(|| "closed by server".to_owned(), |f| f.reason.to_string()));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => break Some(err.to_string()),
                None => break Some("inbound stream ended".to_owned()),
            },
            frame = outbound_stream.next() => match frame {
                Some(Ok(WsMessage::Close(_))) | None => break Some("send socket closed".to_owned()),
                Some(Err(err)) => break Some(err.to_string()),
                Some(Ok(_)) => {}
            },
            outgoing = sends.recv() => match outgoing {
                Some(text) => {
                    if let Err(err) = outbound_sink.send(WsMessage::Text(text)).await {
                        break Some(err.to_string());
                    }
                }
                None => break None,
            },
            () = events.closed() => break None,
        }
    };

    let _ = inbound.close(None).await;
    let _ = outbound_sink.close().await;
    if reason.is_some() {
        debug!(?reason, "live channel closed");
        let _ = events.send(ChannelEvent::Closed { reason }).await;
    }
}
