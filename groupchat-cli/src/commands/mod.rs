//! Command handlers for the `cli` binary.

use std::{io::Write, sync::Arc};

use anyhow::{Context, Result};
use shared::config::ClientConfig;

use crate::{
    api::HttpChatApi,
    chat_view::ChatView,
    live::WsTransport,
    render::TerminalSink,
    session::{FileSessionStore, SessionAccessor},
};

pub mod chat;
pub mod completion;
pub mod config;
pub mod session;

/// Collaborators shared by every networked command.
#[derive(Debug)]
pub struct AppContext {
    /// Loaded configuration.
    pub config: ClientConfig,
    /// Session file named by the configuration.
    pub session: Arc<FileSessionStore>,
}

impl AppContext {
    /// Context over `config` and its session file.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let session = Arc::new(FileSessionStore::new(config.session.resolved_path()));
        Self { config, session }
    }

    /// HTTP data source authenticated with the stored token.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn api(&self) -> Result<Arc<HttpChatApi>> {
        let base = self.config.server.api_url()?;
        let api = HttpChatApi::new(base, self.session.clone())
            .context("failed to build HTTP client")?;
        Ok(Arc::new(api))
    }

    /// Chat view rendering to `out` for the stored user.
    ///
    /// # Errors
    /// Returns an error if a base URL is invalid or the HTTP client cannot be
    /// built.
    pub fn view<W: Write>(&self, out: W) -> Result<ChatView<TerminalSink<W>>> {
        let username = self.session.current_user().unwrap_or_default();
        let transport = Arc::new(WsTransport::new(self.config.server.ws_url()?));
        Ok(ChatView::new(
            self.session.clone(),
            self.api()?,
            transport,
            self.config.connection.reconnect_delay(),
            TerminalSink::new(out, username),
        ))
    }
}
