//! Fail-soft loading of persisted history and the unread marker.

use std::{fmt, sync::Arc};

use metrics::counter;
use shared::models::{GroupId, HistoryEntry, Message, UnreadMarker};
use tracing::{debug, warn};

use crate::api::ChatApi;

/// Loads what the server already knows about a group before going live.
#[derive(Clone)]
pub struct HistoryFetcher {
    api: Arc<dyn ChatApi>,
}

impl fmt::Debug for HistoryFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryFetcher").finish_non_exhaustive()
    }
}

impl HistoryFetcher {
    /// Fetcher reading through `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    /// First unread message, or [`UnreadMarker::NoBoundary`] on any failure.
    pub async fn fetch_unread_marker(&self, group: GroupId) -> UnreadMarker {
        match self.api.first_unread_message(group).await {
            Ok(marker) => {
                debug!(group_id = %group, ?marker, "unread marker loaded");
                UnreadMarker::from(marker)
            }
            Err(err) => {
                warn!(group_id = %group, error = %err, "unread marker unavailable");
                counter!("groupchat_fetch_failures_total", "resource" => "unread_marker")
                    .increment(1);
                UnreadMarker::NoBoundary
            }
        }
    }

    /// History in server order, or an empty list on any failure.
    pub async fn fetch_history(&self, group: GroupId) -> Vec<Message> {
        match self.api.group_messages(group).await {
            Ok(entries) => {
                debug!(group_id = %group, count = entries.len(), "history loaded");
                entries.into_iter().map(HistoryEntry::into_message).collect()
            }
            Err(err) => {
                warn!(group_id = %group, error = %err, "history unavailable");
                counter!("groupchat_fetch_failures_total", "resource" => "history").increment(1);
                Vec::new()
            }
        }
    }

    /// Member usernames, or an empty list on any failure.
    pub async fn fetch_members(&self, group: GroupId) -> Vec<String> {
        match self.api.group_members(group).await {
            Ok(response) => response.members,
            Err(err) => {
                warn!(group_id = %group, error = %err, "members unavailable");
                counter!("groupchat_fetch_failures_total", "resource" => "members").increment(1);
                Vec::new()
            }
        }
    }
}
