use std::{fmt, pin::Pin, sync::Arc, time::Duration};

use metrics::counter;
use shared::models::LiveEvent;
use tokio::time::{Sleep, sleep};
use tracing::{debug, info, warn};

use super::transport::{ChannelEvent, ChannelParams, PushChannel, PushTransport};
use crate::{
    api::ChatApi,
    error::{ClientError, ClientResult},
    session::SessionAccessor,
};

/// Lifecycle of the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel and nothing scheduled.
    Disconnected,
    /// Channel opened, handshake not yet acknowledged.
    Connecting,
    /// Events flow and sends are accepted.
    Connected,
    /// Dropped; a reconnect is scheduled.
    Retrying,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Retrying => "retrying",
        };
        f.write_str(name)
    }
}

/// Something the owner of the manager has to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// The handshake completed.
    Connected,
    /// An inbound event, in transport delivery order.
    Event(LiveEvent),
    /// The channel closed; call [`ConnectionManager::handle_drop`].
    Dropped {
        /// Close reason or transport error, when known.
        reason: Option<String>,
    },
    /// The reconnect delay elapsed; call [`ConnectionManager::connect`].
    RetryDue,
}

/// Result of handling a dropped channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Session still valid, reconnect armed after the delay.
    RetryScheduled(Duration),
    /// Session rejected; it has been cleared and nothing is scheduled.
    LoggedOut,
}

/// Owns the push channel, its state machine, and the reconnect timer.
///
/// ```text
/// Disconnected --connect--> Connecting --opened--> Connected
/// Connecting|Connected --drop--> Retrying --timer--> (connect) Connecting
/// ```
pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    api: Arc<dyn ChatApi>,
    session: Arc<dyn SessionAccessor>,
    delay: Duration,
    state: ConnectionState,
    channel: Option<PushChannel>,
    retry: Option<Pin<Box<Sleep>>>,
    pending_drop: Option<Option<String>>,
    attempts: u32,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("delay", &self.delay)
            .field("attempts", &self.attempts)
            .field("retry_pending", &self.retry.is_some())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Manager that opens channels through `transport` and re-validates
    /// `session` through `api` after every drop.
    #[must_use]
    pub fn new(
        transport: Arc<dyn PushTransport>,
        api: Arc<dyn ChatApi>,
        session: Arc<dyn SessionAccessor>,
        delay: Duration,
    ) -> Self {
        Self {
            transport,
            api,
            session,
            delay,
            state: ConnectionState::Disconnected,
            channel: None,
            retry: None,
            pending_drop: None,
            attempts: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a reconnect timer is armed.
    #[must_use]
    pub const fn retry_pending(&self) -> bool {
        self.retry.is_some()
    }

    /// Opens the push channel. A no-op while connecting or connected.
    ///
    /// A transport that fails to open is reported as a drop by the next
    /// [`next_signal`](Self::next_signal).
    ///
    /// # Errors
    /// Returns [`ClientError::SessionMissing`] when no full session is stored.
    pub async fn connect(&mut self) -> ClientResult<()> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(state = %self.state, "connect ignored");
            return Ok(());
        }
        let identity = self.session.require()?;
        self.retry = None;
        self.attempts += 1;
        self.set_state(ConnectionState::Connecting);

        let params = ChannelParams {
            token: identity.token,
            group_id: identity.group_id,
        };
        match self.transport.open(&params).await {
            Ok(channel) => self.channel = Some(channel),
            Err(err) => {
                warn!(group_id = %params.group_id, attempt = self.attempts, error = %err, "failed to open live channel");
                self.pending_drop = Some(Some(err.to_string()));
            }
        }
        Ok(())
    }

    /// Waits for the next thing that needs attention. Cancel safe.
    pub async fn next_signal(&mut self) -> ConnectionSignal {
        if let Some(reason) = self.pending_drop.take() {
            self.channel = None;
            return ConnectionSignal::Dropped { reason };
        }
        if let Some(channel) = self.channel.as_mut() {
            let event = channel.inbound.recv().await;
            return self.on_channel_event(event);
        }
        if let Some(timer) = self.retry.as_mut() {
            timer.as_mut().await;
            self.retry = None;
            debug!(delay = ?self.delay, "reconnect delay elapsed");
            return ConnectionSignal::RetryDue;
        }
        std::future::pending().await
    }

    fn on_channel_event(&mut self, event: Option<ChannelEvent>) -> ConnectionSignal {
        match event {
            Some(ChannelEvent::Opened) => {
                self.attempts = 0;
                self.set_state(ConnectionState::Connected);
                ConnectionSignal::Connected
            }
            Some(ChannelEvent::Event(event)) => ConnectionSignal::Event(event),
            Some(ChannelEvent::Closed { reason }) => {
                self.channel = None;
                ConnectionSignal::Dropped { reason }
            }
            None => {
                self.channel = None;
                ConnectionSignal::Dropped { reason: None }
            }
        }
    }

    /// Re-validates the session after a drop and either arms the reconnect
    /// timer or clears the session.
    ///
    /// A session check that cannot reach the server counts as valid. A
    /// session that is no longer stored locally does not.
    pub async fn handle_drop(&mut self) -> DropOutcome {
        self.channel = None;
        counter!("groupchat_connection_drops_total").increment(1);

        let valid = match self.api.check_session().await {
            Ok(valid) => valid,
            Err(err) if err.is_auth_invalid() => false,
            Err(err) => {
                warn!(error = %err, "session check failed; assuming the session is still valid");
                true
            }
        };

        if !valid {
            warn!("session rejected by server; logging out");
            if let Err(err) = self.session.clear_session() {
                warn!(error = %err, "failed to clear session");
            }
            self.shutdown();
            return DropOutcome::LoggedOut;
        }

        self.retry = Some(Box::pin(sleep(self.delay)));
        self.set_state(ConnectionState::Retrying);
        counter!("groupchat_reconnect_attempts_total").increment(1);
        info!(delay = ?self.delay, "live connection lost; reconnect scheduled");
        DropOutcome::RetryScheduled(self.delay)
    }

    /// Sends raw text over the outbound path. Fire and forget.
    ///
    /// # Errors
    /// [`ClientError::EmptyInput`] for blank text, [`ClientError::NotConnected`]
    /// unless connected, [`ClientError::TransportFailure`] if the channel is
    /// gone.
    pub async fn send(&self, text: &str) -> ClientResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyInput);
        }
        let channel = match (self.state, self.channel.as_ref()) {
            (ConnectionState::Connected, Some(channel)) => channel,
            _ => return Err(ClientError::NotConnected),
        };
        channel
            .outbound
            .send(text.to_owned())
            .await
            .map_err(|err| ClientError::transport("sending message", err))
    }

    /// Closes the channel and cancels any pending reconnect.
    pub fn shutdown(&mut self) {
        self.channel = None;
        self.retry = None;
        self.pending_drop = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, attempt = self.attempts, "connection state changed");
            self.state = next;
        }
    }
}
