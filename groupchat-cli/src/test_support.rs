//! Shared fakes and helpers for unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Duration;
use shared::{
    models::{GroupId, GroupMembersResponse, HistoryEntry, MessageId, Timestamp},
    timeline::{Timeline, TimelineDiff},
};
use tokio::{net::TcpListener, sync::mpsc};
use url::Url;

use crate::{
    api::ChatApi,
    error::{ClientError, ClientResult},
    live::{CHANNEL_CAPACITY, ChannelEndpoints, ChannelParams, PushChannel, PushTransport},
    render::{Notice, RenderSink},
    session::{MemorySessionStore, SessionAccessor, StoredSession},
};

/// Ordered record of collaborator calls.
pub type Journal = Arc<Mutex<Vec<&'static str>>>;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: axum::Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

pub fn session_store(user: &str, token: &str, group: i64) -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::with_session(
        StoredSession::new(user, token, Duration::hours(1)).with_group(GroupId(group), None),
    ))
}

pub fn history_entry(id: i64, user: &str, text: &str) -> HistoryEntry {
    HistoryEntry {
        message_id: MessageId(id),
        username: user.to_owned(),
        message_text: text.to_owned(),
        datetime: Timestamp::parse("2024-03-01 10:00:00"),
    }
}

fn unreachable_error() -> ClientError {
    ClientError::transport("calling fake server", "connection refused")
}

#[derive(Default)]
pub struct FakeApi {
    history: Vec<HistoryEntry>,
    unread: Option<MessageId>,
    members: Vec<String>,
    session_invalid: bool,
    unreachable: bool,
    session: Option<Arc<dyn SessionAccessor>>,
    pub journal: Journal,
    pub edits: Mutex<Vec<(MessageId, String)>>,
    pub deletes: Mutex<Vec<MessageId>>,
}

impl FakeApi {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn with_unread(mut self, unread: Option<MessageId>) -> Self {
        self.unread = unread;
        self
    }

    pub fn with_members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(|m| (*m).to_owned()).collect();
        self
    }

    pub fn with_session_valid(mut self, valid: bool) -> Self {
        self.session_invalid = !valid;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Authenticates against `session` the way the HTTP client does.
    pub fn with_session(mut self, session: Arc<dyn SessionAccessor>) -> Self {
        self.session = Some(session);
        self
    }

    fn record(&self, call: &'static str) -> ClientResult<()> {
        self.journal.lock().unwrap().push(call);
        if self.unreachable {
            Err(unreachable_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn check_session(&self) -> ClientResult<bool> {
        self.record("check_session")?;
        if let Some(session) = &self.session {
            session
                .current_token()
                .ok_or(ClientError::SessionMissing { field: "token" })?;
        }
        Ok(!self.session_invalid)
    }

    async fn first_unread_message(&self, _group: GroupId) -> ClientResult<Option<MessageId>> {
        self.record("first_unread_message")?;
        Ok(self.unread)
    }

    async fn group_messages(&self, _group: GroupId) -> ClientResult<Vec<HistoryEntry>> {
        self.record("group_messages")?;
        Ok(self.history.clone())
    }

    async fn group_members(&self, group: GroupId) -> ClientResult<GroupMembersResponse> {
        self.record("group_members")?;
        Ok(GroupMembersResponse {
            group_id: group,
            members: self.members.clone(),
        })
    }

    async fn edit_message(&self, id: MessageId, text: &str) -> ClientResult<()> {
        self.record("edit_message")?;
        self.edits.lock().unwrap().push((id, text.to_owned()));
        Ok(())
    }

    async fn delete_message(&self, id: MessageId) -> ClientResult<()> {
        self.record("delete_message")?;
        self.deletes.lock().unwrap().push(id);
        Ok(())
    }
}

/// Transport that hands the server side of every opened channel to the test.
pub struct FakeTransport {
    opened: Mutex<Vec<ChannelParams>>,
    endpoints: mpsc::UnboundedSender<ChannelEndpoints>,
    fail: AtomicBool,
    journal: Journal,
}

impl FakeTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChannelEndpoints>) {
        Self::with_journal(Journal::default())
    }

    pub fn with_journal(journal: Journal) -> (Arc<Self>, mpsc::UnboundedReceiver<ChannelEndpoints>) {
        let (endpoints, receiver) = mpsc::unbounded_channel();
        let transport = Self {
            opened: Mutex::new(Vec::new()),
            endpoints,
            fail: AtomicBool::new(false),
            journal,
        };
        (Arc::new(transport), receiver)
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn params(&self) -> Vec<ChannelParams> {
        self.opened.lock().unwrap().clone()
    }

    pub fn fail_opens(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn open(&self, params: &ChannelParams) -> ClientResult<PushChannel> {
        self.journal.lock().unwrap().push("open");
        self.opened.lock().unwrap().push(params.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(unreachable_error());
        }
        let (channel, endpoints) = PushChannel::pair(CHANNEL_CAPACITY);
        let _ = self.endpoints.send(endpoints);
        Ok(channel)
    }
}

/// Everything a [`RecordingSink`] was asked to render, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Diff(TimelineDiff),
    Divider(MessageId),
    Notice(Notice),
    Members(Vec<String>),
    InputCleared,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub rendered: Vec<Rendered>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<&Notice> {
        self.rendered
            .iter()
            .filter_map(|item| match item {
                Rendered::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn apply(&mut self, diff: &TimelineDiff, _timeline: &Timeline) {
        self.rendered.push(Rendered::Diff(diff.clone()));
    }

    fn unread_divider(&mut self, before: MessageId) {
        self.rendered.push(Rendered::Divider(before));
    }

    fn notify(&mut self, notice: &Notice) {
        self.rendered.push(Rendered::Notice(notice.clone()));
    }

    fn members(&mut self, members: &[String]) {
        self.rendered.push(Rendered::Members(members.to_vec()));
    }

    fn input_cleared(&mut self) {
        self.rendered.push(Rendered::InputCleared);
    }
}
