//! The chat view: activation sequencing and the single-threaded event loop
//! that owns the timeline.

use std::{fmt, sync::Arc, time::Duration};

use shared::{
    models::{MessageId, Side},
    timeline::{Timeline, TimelineDiff},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::ChatApi,
    error::{ClientError, ClientResult},
    history::HistoryFetcher,
    live::{ConnectionManager, ConnectionSignal, ConnectionState, DropOutcome, PushTransport},
    render::{Notice, RenderSink},
    session::{SessionAccessor, SessionIdentity},
};

/// Actions requested by the user while the view is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    /// Send a new message.
    Send(String),
    /// Replace the text of an own message.
    Edit {
        /// Message to edit.
        id: MessageId,
        /// Replacement text.
        text: String,
    },
    /// Delete an own message.
    Delete(MessageId),
    /// Refresh the member list.
    Members,
    /// Clear the session and leave.
    Logout,
}

/// Why [`ChatView::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewExit {
    /// Cancelled or the command source closed.
    Closed,
    /// The session was cleared, by the user or because the server rejected it.
    LoggedOut,
}

/// One open group chat. Owns the timeline and the live connection; every
/// mutation happens on the task driving [`ChatView::run`].
pub struct ChatView<S: RenderSink> {
    session: Arc<dyn SessionAccessor>,
    api: Arc<dyn ChatApi>,
    history: HistoryFetcher,
    connection: ConnectionManager,
    timeline: Timeline,
    sink: S,
    identity: Option<SessionIdentity>,
}

impl<S: RenderSink> fmt::Debug for ChatView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatView")
            .field("connection", &self.connection)
            .field("messages", &self.timeline.len())
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<S: RenderSink> ChatView<S> {
    /// View over `session`'s group that renders into `sink`.
    #[must_use]
    pub fn new(
        session: Arc<dyn SessionAccessor>,
        api: Arc<dyn ChatApi>,
        transport: Arc<dyn PushTransport>,
        reconnect_delay: Duration,
        sink: S,
    ) -> Self {
        let connection =
            ConnectionManager::new(transport, api.clone(), session.clone(), reconnect_delay);
        Self {
            history: HistoryFetcher::new(api.clone()),
            session,
            api,
            connection,
            timeline: Timeline::new(),
            sink,
            identity: None,
        }
    }

    /// Messages shown so far.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The render target.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// State of the live connection.
    #[must_use]
    pub const fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Loads the marker and history and renders them. Does not go live.
    ///
    /// # Errors
    /// Returns [`ClientError::SessionMissing`] before any network call when the
    /// session is incomplete.
    pub async fn load_history(&mut self) -> ClientResult<()> {
        let identity = self.session.require()?;
        let group = identity.group_id;
        info!(group_id = %group, user = %identity.username, "loading chat history");

        let marker = self.history.fetch_unread_marker(group).await;
        let messages = self.history.fetch_history(group).await;
        let diffs = self.timeline.ingest_history(messages);
        self.timeline.mark_unread_boundary(marker);
        if marker.message_id().is_some() && self.timeline.divider_before().is_none() {
            debug!(?marker, "first unread message not in history; divider follows it live");
        }
        self.render(&diffs);
        self.identity = Some(identity);
        Ok(())
    }

    /// Loads history and members, then goes live.
    ///
    /// # Errors
    /// Returns [`ClientError::SessionMissing`] when the session is incomplete.
    pub async fn activate(&mut self) -> ClientResult<()> {
        self.load_history().await?;
        self.show_members().await;
        self.connection.connect().await
    }

    async fn show_members(&mut self) {
        if let Some(group) = self.identity.as_ref().map(|identity| identity.group_id) {
            let members = self.history.fetch_members(group).await;
            self.sink.members(&members);
        }
    }

    /// Hands diffs to the sink, drawing the unread divider right before the
    /// first unread message whether it came from history or live.
    fn render(&mut self, diffs: &[TimelineDiff]) {
        let first_unread = self.timeline.unread_marker().message_id();
        for diff in diffs {
            if let TimelineDiff::Created { message, .. } = diff
                && Some(message.id) == first_unread
            {
                self.sink.unread_divider(message.id);
            }
            self.sink.apply(diff, &self.timeline);
        }
    }

    /// Runs until cancelled, logged out, or the command source closes.
    ///
    /// Cancellation is checked first, then connection signals, then user
    /// commands.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ViewCommand>,
        cancel: CancellationToken,
    ) -> ViewExit {
        let exit = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break ViewExit::Closed,
                signal = self.connection.next_signal() => {
                    if let Some(exit) = self.on_signal(signal).await {
                        break exit;
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Some(exit) = self.on_command(command).await {
                            break exit;
                        }
                    }
                    None => break ViewExit::Closed,
                },
            }
        };
        self.connection.shutdown();
        info!(?exit, "chat view closed");
        exit
    }

    async fn on_signal(&mut self, signal: ConnectionSignal) -> Option<ViewExit> {
        match signal {
            ConnectionSignal::Connected => self.sink.notify(&Notice::Connected),
            ConnectionSignal::Event(event) => {
                let kind = event.kind();
                match self.timeline.apply(event) {
                    Ok(diffs) => self.render(&diffs),
                    Err(err) => debug!(event = kind, error = %err, "live event ignored"),
                }
            }
            ConnectionSignal::Dropped { reason } => {
                warn!(?reason, "live connection dropped");
                match self.connection.handle_drop().await {
                    DropOutcome::RetryScheduled(retry_in) => {
                        self.sink.notify(&Notice::ConnectionLost { retry_in });
                    }
                    DropOutcome::LoggedOut => {
                        self.sink.notify(&Notice::LoggedOut);
                        return Some(ViewExit::LoggedOut);
                    }
                }
            }
            ConnectionSignal::RetryDue => {
                if let Err(err) = self.connection.connect().await {
                    warn!(error = %err, "reconnect abandoned");
                    return Some(self.logout());
                }
            }
        }
        None
    }

    async fn on_command(&mut self, command: ViewCommand) -> Option<ViewExit> {
        let result = match command {
            ViewCommand::Send(text) => {
                let sent = self.connection.send(&text).await;
                if sent.is_ok() {
                    self.sink.input_cleared();
                }
                sent
            }
            ViewCommand::Edit { id, text } => self.edit(id, &text).await,
            ViewCommand::Delete(id) => self.delete(id).await,
            ViewCommand::Members => {
                self.show_members().await;
                Ok(())
            }
            ViewCommand::Logout => {
                info!("logging out");
                return Some(self.logout());
            }
        };

        match result {
            Ok(()) => None,
            Err(err) if err.is_auth_invalid() => {
                warn!(error = %err, "server rejected the session");
                Some(self.logout())
            }
            Err(err) => {
                warn!(error = %err, "command failed");
                self.sink.notify(&Notice::Error(err.to_string()));
                None
            }
        }
    }

    /// Asks the server to replace the text of one of the user's messages.
    /// The timeline changes when the resulting live event arrives.
    ///
    /// # Errors
    /// [`ClientError::EmptyInput`] for blank text, [`ClientError::NotOwnMessage`]
    /// for someone else's message, or the server's rejection.
    pub async fn edit(&self, id: MessageId, text: &str) -> ClientResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyInput);
        }
        self.ensure_own(id)?;
        self.api.edit_message(id, text).await
    }

    /// Asks the server to delete one of the user's messages.
    ///
    /// # Errors
    /// [`ClientError::NotOwnMessage`] for someone else's message, or the
    /// server's rejection.
    pub async fn delete(&self, id: MessageId) -> ClientResult<()> {
        self.ensure_own(id)?;
        self.api.delete_message(id).await
    }

    fn ensure_own(&self, id: MessageId) -> ClientResult<()> {
        let identity = self
            .identity
            .as_ref()
            .ok_or(ClientError::SessionMissing { field: "user" })?;
        match self.timeline.get(id) {
            Some(message) if message.side(&identity.username) == Side::Own => Ok(()),
            _ => Err(ClientError::NotOwnMessage(id)),
        }
    }

    fn logout(&mut self) -> ViewExit {
        if let Err(err) = self.session.clear_session() {
            warn!(error = %err, "failed to clear session");
        }
        self.connection.shutdown();
        self.sink.notify(&Notice::LoggedOut);
        ViewExit::LoggedOut
    }
}
