//! HTTP data source for the chat server's REST endpoints.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use shared::models::{GroupId, GroupMembersResponse, HistoryEntry, MessageId};
use tracing::debug;
use url::Url;

use crate::{
    error::{ClientError, ClientResult},
    session::SessionAccessor,
};

/// Operations the client performs against the REST API.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `true` when the server still accepts the stored token.
    async fn check_session(&self) -> ClientResult<bool>;

    /// First unread message of the group, `None` when everything is read.
    async fn first_unread_message(&self, group: GroupId) -> ClientResult<Option<MessageId>>;

    /// Persisted history in server order.
    async fn group_messages(&self, group: GroupId) -> ClientResult<Vec<HistoryEntry>>;

    /// Usernames of the group's members.
    async fn group_members(&self, group: GroupId) -> ClientResult<GroupMembersResponse>;

    /// Replaces a message's text on the server. The timeline is updated by
    /// the resulting live event, not here.
    async fn edit_message(&self, id: MessageId, text: &str) -> ClientResult<()>;

    /// Deletes a message on the server. Like edits, the timeline changes
    /// when the live event comes back.
    async fn delete_message(&self, id: MessageId) -> ClientResult<()>;
}

/// [`ChatApi`] backed by `reqwest` with bearer authentication.
#[derive(Clone)]
pub struct HttpChatApi {
    client: Client,
    base: Url,
    session: Arc<dyn SessionAccessor>,
}

impl fmt::Debug for HttpChatApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpChatApi")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpChatApi {
    /// Builds a client for `base`, reading the token from `session` per request.
    ///
    /// # Errors
    /// Returns [`ClientError::TransportFailure`] if the HTTP client cannot be built.
    pub fn new(base: Url, session: Arc<dyn SessionAccessor>) -> ClientResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("groupchat-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ClientError::transport("building HTTP client", err))?;
        Ok(Self {
            client,
            base,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base
            .join(path)
            .map_err(|err| ClientError::transport(format!("resolving {path}"), err))
    }

    fn authorized(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        let token = self
            .session
            .current_token()
            .ok_or(ClientError::SessionMissing { field: "token" })?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> ClientResult<Response> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|err| ClientError::transport(context, err))?;
        debug!(status = %response.status(), url = %response.url(), "{context}");
        Ok(response)
    }
}

async fn expect_success(response: Response, context: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::rejected(context, status, &body))
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response, context: &str) -> ClientResult<T> {
    let body = response
        .text()
        .await
        .map_err(|err| ClientError::transport(context, err))?;
    serde_json::from_str(&body).map_err(|err| ClientError::transport(context, err))
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn check_session(&self) -> ClientResult<bool> {
        let url = self.endpoint("user/me")?;
        let response = self.send(self.client.get(url), "checking session").await?;
        Ok(response.status().is_success())
    }

    async fn first_unread_message(&self, group: GroupId) -> ClientResult<Option<MessageId>> {
        const CONTEXT: &str = "fetching unread marker";
        let url = self.endpoint(&format!("message/{group}/first-unread-message"))?;
        let response = self.send(self.client.get(url), CONTEXT).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success(response, CONTEXT).await?;
        decode::<Option<MessageId>>(response, CONTEXT).await
    }

    async fn group_messages(&self, group: GroupId) -> ClientResult<Vec<HistoryEntry>> {
        const CONTEXT: &str = "fetching history";
        let url = self.endpoint(&format!("group/{group}/messages"))?;
        let response = self.send(self.client.get(url), CONTEXT).await?;
        let response = expect_success(response, CONTEXT).await?;
        let entries: Option<Vec<HistoryEntry>> = decode(response, CONTEXT).await?;
        Ok(entries.unwrap_or_default())
    }

    async fn group_members(&self, group: GroupId) -> ClientResult<GroupMembersResponse> {
        const CONTEXT: &str = "fetching members";
        let url = self.endpoint(&format!("group/{group}/members"))?;
        let response = self.send(self.client.get(url), CONTEXT).await?;
        let response = expect_success(response, CONTEXT).await?;
        decode(response, CONTEXT).await
    }

    async fn edit_message(&self, id: MessageId, text: &str) -> ClientResult<()> {
        const CONTEXT: &str = "editing message";
        let url = self.endpoint(&format!("message/{id}"))?;
        let request = self.client.put(url).query(&[("changed_message", text)]);
        let response = self.send(request, CONTEXT).await?;
        expect_success(response, CONTEXT).await?;
        Ok(())
    }

    async fn delete_message(&self, id: MessageId) -> ClientResult<()> {
        const CONTEXT: &str = "deleting message";
        let url = self.endpoint(&format!("message/{id}"))?;
        let response = self.send(self.client.delete(url), CONTEXT).await?;
        expect_success(response, CONTEXT).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::{get, put},
    };
    use serde_json::json;

    use super::*;
    use crate::test_support::{serve, session_store};

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some("Bearer tok-123")
    }

    async fn me(headers: HeaderMap) -> AxumStatus {
        if authorized(&headers) {
            AxumStatus::OK
        } else {
            AxumStatus::UNAUTHORIZED
        }
    }

    async fn unread(Path(group): Path<i64>) -> impl IntoResponse {
        if group == 3 {
            (AxumStatus::OK, Json(json!(42))).into_response()
        } else {
            (AxumStatus::NOT_FOUND, Json(json!({"detail": "no unread"}))).into_response()
        }
    }

    async fn history(Path(group): Path<i64>) -> Json<serde_json::Value> {
        if group == 3 {
            Json(json!([
                {"message_id": 1, "username": "alice", "message_text": "hi", "datetime": "2024-03-01 10:00:00"},
                {"message_id": 2, "username": "bob", "message_text": "yo", "datetime": "2024-03-01 10:01:00.250000"}
            ]))
        } else {
            Json(serde_json::Value::Null)
        }
    }

    async fn members(Path(group): Path<i64>) -> impl IntoResponse {
        if group == 3 {
            Json(json!({"group_id": 3, "members": ["alice", "bob"]})).into_response()
        } else {
            (AxumStatus::FORBIDDEN, Json(json!({"detail": "Forbidden"}))).into_response()
        }
    }

    async fn edit(
        Path(id): Path<i64>,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        match params.get("changed_message").map(String::as_str) {
            Some("fixed & done") if id == 7 => (AxumStatus::OK, Json(json!({"ok": true}))),
            _ => (AxumStatus::BAD_REQUEST, Json(json!({"detail": "bad edit"}))),
        }
    }

    async fn delete(Path(id): Path<i64>) -> AxumStatus {
        if id == 7 {
            AxumStatus::OK
        } else {
            AxumStatus::NOT_FOUND
        }
    }

    async fn api() -> HttpChatApi {
        let router = Router::new()
            .route("/user/me", get(me))
            .route("/message/{group}/first-unread-message", get(unread))
            .route("/group/{group}/messages", get(history))
            .route("/group/{group}/members", get(members))
            .route("/message/{id}", put(edit).delete(delete));
        let base = serve(router).await;
        HttpChatApi::new(base, session_store("alice", "tok-123", 3)).unwrap()
    }

    #[tokio::test]
    async fn check_session_reflects_status() {
        let api = api().await;
        assert!(api.check_session().await.unwrap());

        let base = api.base.clone();
        let stale = HttpChatApi::new(base, session_store("alice", "expired", 3)).unwrap();
        assert!(!stale.check_session().await.unwrap());
    }

    #[tokio::test]
    async fn unread_marker_maps_not_found_to_none() {
        let api = api().await;
        assert_eq!(
            api.first_unread_message(GroupId(3)).await.unwrap(),
            Some(MessageId(42))
        );
        assert_eq!(api.first_unread_message(GroupId(9)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn history_preserves_server_order_and_accepts_null() {
        let api = api().await;
        let entries = api.group_messages(GroupId(3)).await.unwrap();
        let ids: Vec<_> = entries.iter().map(|entry| entry.message_id).collect();
        assert_eq!(ids, vec![MessageId(1), MessageId(2)]);
        assert!(entries[1].datetime.is_some());

        assert!(api.group_messages(GroupId(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn members_rejection_carries_detail() {
        let api = api().await;
        let members = api.group_members(GroupId(3)).await.unwrap();
        assert_eq!(members.members, vec!["alice", "bob"]);

        let err = api.group_members(GroupId(9)).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rejected { status, .. } if status == StatusCode::FORBIDDEN
        ));
        assert!(err.to_string().contains("Forbidden"));
    }

    #[tokio::test]
    async fn edit_encodes_text_as_query_parameter() {
        let api = api().await;
        api.edit_message(MessageId(7), "fixed & done").await.unwrap();
        assert!(api.edit_message(MessageId(8), "nope").await.is_err());
    }

    #[tokio::test]
    async fn delete_reports_rejection() {
        let api = api().await;
        api.delete_message(MessageId(7)).await.unwrap();
        let err = api.delete_message(MessageId(8)).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_failure() {
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let api = HttpChatApi::new(base, session_store("alice", "tok-123", 3)).unwrap();
        assert!(matches!(
            api.check_session().await,
            Err(ClientError::TransportFailure { .. })
        ));
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let api = HttpChatApi::new(base, Arc::new(crate::session::MemorySessionStore::default()))
            .unwrap();
        assert!(matches!(
            api.group_messages(GroupId(1)).await,
            Err(ClientError::SessionMissing { field: "token" })
        ));
    }
}
