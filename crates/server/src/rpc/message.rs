// Message procedures: list (cursor-paginated history) and send (thread
// resolution).
//
// Sending resolves the target thread first: a reply inherits its parent's
// thread, a top-level message gets a fresh thread whose root link is
// backfilled after the message lands. The writes run in order with no
// transaction; each failure carries its own label and earlier writes stay
// committed.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use colloquy_common::types::{AuthorType, Message, MessageWithAuthor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::jwt::Identity, store::MessageWithAuthorRecord, validation::ValidatedJson};

use super::{
    encode_cursor, normalize_limit, parse_cursor, validate_message_content, ApiError, ApiState,
};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListMessagesQuery {
    cursor: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessagePage {
    pub messages: Vec<MessageWithAuthor>,
    pub next_cursor: Option<String>,
}

pub(crate) async fn list_messages(
    State(state): State<ApiState>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<MessagePage>, ApiError> {
    let limit = normalize_limit(query.limit);
    let cursor = match query.cursor.as_deref() {
        Some(raw) => Some(parse_cursor(raw)?),
        None => None,
    };

    // Fetch one row past the page size; a full overhang means another page
    // exists and the last kept row's timestamp becomes the next cursor.
    let mut records = state
        .store
        .list_root_messages(channel_id, cursor, limit + 1)
        .await
        .map_err(|error| ApiError::store("Failed to list messages", error))?;

    let next_cursor = if records.len() > limit {
        records.truncate(limit);
        records.last().map(|record| encode_cursor(record.message.created_at))
    } else {
        None
    };

    Ok(Json(MessagePage {
        messages: records
            .into_iter()
            .map(MessageWithAuthorRecord::into_message_with_author)
            .collect(),
        next_cursor,
    }))
}

pub(crate) async fn send_message(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(channel_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    validate_message_content(&payload.content)?;

    let thread_id = match payload.parent_id {
        // A reply joins its parent's thread wherever that thread lives; the
        // parent's channel is not checked against the request channel.
        Some(parent_id) => state
            .store
            .parent_thread_id(parent_id)
            .await
            .map_err(|error| ApiError::store("Failed to resolve parent message", error))?
            .ok_or_else(|| ApiError::not_found("Parent message not found"))?,
        None => state
            .store
            .insert_thread(channel_id)
            .await
            .map_err(|error| ApiError::store("Failed to create thread", error))?,
    };

    let message = state
        .store
        .insert_message(
            thread_id,
            payload.parent_id,
            identity.user_id,
            AuthorType::Human,
            &payload.content,
        )
        .await
        .map_err(|error| ApiError::store("Failed to send message", error))?;

    // Top-level sends link the new message back as the thread root. The
    // thread and message are already committed at this point; a failure here
    // leaves the thread without a root until repaired out of band.
    if payload.parent_id.is_none() {
        state
            .store
            .link_thread_root(thread_id, message.id)
            .await
            .map_err(|error| ApiError::store("Failed to set root message on thread", error))?;
    }

    Ok((StatusCode::CREATED, Json(message.into_message())))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{DateTime, Utc};
    use colloquy_common::types::{AuthorType, ThreadStatus};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::rpc::test_support::{bearer_token, body_json, get_request, json_request, test_app};
    use crate::store::{FailureInjection, MessageRecord, Store, ThreadRecord};

    fn ts(value: &str) -> DateTime<Utc> {
        value.parse().expect("timestamp should parse")
    }

    async fn seed_root_message(
        store: &Store,
        channel_id: Uuid,
        author_id: Uuid,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        let thread_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();
        store
            .seed_thread_for_tests(ThreadRecord {
                id: thread_id,
                channel_id,
                root_message_id: Some(message_id),
                status: ThreadStatus::Active,
                title: None,
                created_at,
                updated_at: created_at,
            })
            .await;
        store
            .seed_message_for_tests(MessageRecord {
                id: message_id,
                thread_id,
                dive_id: None,
                parent_id: None,
                author_id,
                author_type: AuthorType::Human,
                content: content.to_owned(),
                metadata: None,
                created_at,
                updated_at: created_at,
            })
            .await;
        message_id
    }

    // ── send ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn top_level_send_creates_thread_and_links_root() {
        let (app, store, jwt) = test_app();
        let user_id = Uuid::new_v4();
        let channel_id = Uuid::new_v4();
        let token = bearer_token(&jwt, user_id);

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/v1/channels/{channel_id}/messages"),
                json!({ "content": "Hello world" }),
                &token,
            ))
            .await
            .expect("send request should return response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body["parentId"].is_null());
        assert_eq!(body["authorId"], user_id.to_string());
        assert_eq!(body["authorType"], "human");
        assert_eq!(body["content"], "Hello world");
        assert_eq!(body["metadata"], json!({}));

        let thread_id: Uuid = body["threadId"]
            .as_str()
            .expect("threadId should be present")
            .parse()
            .expect("threadId should be uuid");
        let message_id: Uuid =
            body["id"].as_str().expect("id should be present").parse().expect("id should be uuid");

        let thread = store
            .thread_record_for_tests(thread_id)
            .await
            .expect("thread should have been created");
        assert_eq!(thread.channel_id, channel_id);
        assert_eq!(thread.status, ThreadStatus::Active);
        assert_eq!(thread.root_message_id, Some(message_id));
    }

    #[tokio::test]
    async fn reply_inherits_parent_thread() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let author_id = Uuid::new_v4();
        let parent_id =
            seed_root_message(&store, channel_id, author_id, "root", ts("2026-01-01T09:00:00Z"))
                .await;
        let parent_thread_id = store
            .message_record_for_tests(parent_id)
            .await
            .expect("parent message should exist")
            .thread_id;
        let threads_before = store.thread_count_for_tests().await;

        let token = bearer_token(&jwt, Uuid::new_v4());
        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/v1/channels/{channel_id}/messages"),
                json!({ "content": "a reply", "parentId": parent_id }),
                &token,
            ))
            .await
            .expect("send request should return response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["threadId"], parent_thread_id.to_string());
        assert_eq!(body["parentId"], parent_id.to_string());

        // No new thread for replies, and the root link is untouched.
        assert_eq!(store.thread_count_for_tests().await, threads_before);
        let thread = store
            .thread_record_for_tests(parent_thread_id)
            .await
            .expect("parent thread should exist");
        assert_eq!(thread.root_message_id, Some(parent_id));
    }

    #[tokio::test]
    async fn reply_to_missing_parent_is_not_found() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let token = bearer_token(&jwt, Uuid::new_v4());

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/v1/channels/{channel_id}/messages"),
                json!({ "content": "orphan reply", "parentId": Uuid::new_v4() }),
                &token,
            ))
            .await
            .expect("send request should return response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"]["message"].as_str().unwrap().contains("Parent message not found"));
        assert_eq!(store.message_count_for_tests().await, 0);
    }

    #[tokio::test]
    async fn content_bounds_are_enforced() {
        let (app, _, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let token = bearer_token(&jwt, Uuid::new_v4());
        let uri = format!("/v1/channels/{channel_id}/messages");

        for content in ["".to_owned(), "a".repeat(50_001)] {
            let response = app
                .clone()
                .oneshot(json_request("POST", &uri, json!({ "content": content }), &token))
                .await
                .expect("send request should return response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
        }

        let response = app
            .oneshot(json_request("POST", &uri, json!({ "content": "a".repeat(50_000) }), &token))
            .await
            .expect("send request should return response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn thread_create_failure_is_labeled_and_writes_nothing() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let token = bearer_token(&jwt, Uuid::new_v4());
        store
            .set_failures_for_tests(FailureInjection { insert_thread: true, ..Default::default() })
            .await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/v1/channels/{channel_id}/messages"),
                json!({ "content": "hello" }),
                &token,
            ))
            .await
            .expect("send request should return response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]["message"].as_str().unwrap().starts_with("Failed to create thread"));
        assert_eq!(store.thread_count_for_tests().await, 0);
        assert_eq!(store.message_count_for_tests().await, 0);
    }

    #[tokio::test]
    async fn message_insert_failure_leaves_created_thread_behind() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let token = bearer_token(&jwt, Uuid::new_v4());
        store
            .set_failures_for_tests(FailureInjection { insert_message: true, ..Default::default() })
            .await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/v1/channels/{channel_id}/messages"),
                json!({ "content": "hello" }),
                &token,
            ))
            .await
            .expect("send request should return response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]["message"].as_str().unwrap().starts_with("Failed to send message"));

        // The thread write is not rolled back.
        assert_eq!(store.thread_count_for_tests().await, 1);
        assert_eq!(store.message_count_for_tests().await, 0);
    }

    #[tokio::test]
    async fn root_link_failure_leaves_thread_and_message_committed() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let token = bearer_token(&jwt, Uuid::new_v4());
        store
            .set_failures_for_tests(FailureInjection {
                link_thread_root: true,
                ..Default::default()
            })
            .await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/v1/channels/{channel_id}/messages"),
                json!({ "content": "hello" }),
                &token,
            ))
            .await
            .expect("send request should return response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to set root message on thread"));

        // Both rows exist, the thread just has no root yet.
        assert_eq!(store.thread_count_for_tests().await, 1);
        assert_eq!(store.message_count_for_tests().await, 1);
    }

    // ── list ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_truncates_to_limit_and_returns_last_kept_timestamp_as_cursor() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let author_id = Uuid::new_v4();

        seed_root_message(&store, channel_id, author_id, "newest", ts("2026-01-01T12:00:00Z"))
            .await;
        seed_root_message(&store, channel_id, author_id, "middle", ts("2026-01-01T11:00:00Z"))
            .await;
        seed_root_message(&store, channel_id, author_id, "oldest", ts("2026-01-01T10:00:00Z"))
            .await;

        let token = bearer_token(&jwt, Uuid::new_v4());
        let response = app
            .clone()
            .oneshot(get_request(&format!("/v1/channels/{channel_id}/messages?limit=2"), &token))
            .await
            .expect("list request should return response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let messages = body["messages"].as_array().expect("messages should be an array");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "newest");
        assert_eq!(messages[1]["content"], "middle");
        assert_eq!(
            body["nextCursor"].as_str().expect("nextCursor should be set"),
            super::encode_cursor(ts("2026-01-01T11:00:00Z"))
        );

        // The returned cursor fetches the strictly older remainder.
        let cursor = body["nextCursor"].as_str().unwrap().to_owned();
        let response = app
            .oneshot(get_request(
                &format!(
                    "/v1/channels/{channel_id}/messages?limit=2&cursor={}",
                    urlencode(&cursor)
                ),
                &token,
            ))
            .await
            .expect("list request should return response");
        let body = body_json(response).await;
        let messages = body["messages"].as_array().expect("messages should be an array");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"], "oldest");
        assert!(body["nextCursor"].is_null());
    }

    #[tokio::test]
    async fn list_returns_null_cursor_when_page_is_not_full() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        seed_root_message(
            &store,
            channel_id,
            Uuid::new_v4(),
            "only",
            ts("2026-01-01T12:00:00Z"),
        )
        .await;

        let token = bearer_token(&jwt, Uuid::new_v4());
        let response = app
            .oneshot(get_request(&format!("/v1/channels/{channel_id}/messages?limit=50"), &token))
            .await
            .expect("list request should return response");

        let body = body_json(response).await;
        assert_eq!(body["messages"].as_array().expect("messages should be an array").len(), 1);
        assert!(body["nextCursor"].is_null());
    }

    #[tokio::test]
    async fn list_only_returns_root_messages_for_the_channel() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let other_channel_id = Uuid::new_v4();
        let author_id = Uuid::new_v4();

        let root_id =
            seed_root_message(&store, channel_id, author_id, "root", ts("2026-01-01T12:00:00Z"))
                .await;
        seed_root_message(
            &store,
            other_channel_id,
            author_id,
            "elsewhere",
            ts("2026-01-01T13:00:00Z"),
        )
        .await;

        // A reply in the same thread must not appear in the history listing.
        let root = store.message_record_for_tests(root_id).await.expect("root should exist");
        store
            .seed_message_for_tests(MessageRecord {
                id: Uuid::new_v4(),
                thread_id: root.thread_id,
                dive_id: None,
                parent_id: Some(root_id),
                author_id,
                author_type: AuthorType::Human,
                content: "reply".to_owned(),
                metadata: None,
                created_at: ts("2026-01-01T12:30:00Z"),
                updated_at: ts("2026-01-01T12:30:00Z"),
            })
            .await;

        let token = bearer_token(&jwt, Uuid::new_v4());
        let response = app
            .oneshot(get_request(&format!("/v1/channels/{channel_id}/messages"), &token))
            .await
            .expect("list request should return response");

        let body = body_json(response).await;
        let messages = body["messages"].as_array().expect("messages should be an array");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"], "root");
    }

    #[tokio::test]
    async fn list_joins_author_and_normalizes_metadata() {
        let (app, store, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let known_author = Uuid::new_v4();
        let unknown_author = Uuid::new_v4();

        store.seed_user_for_tests(known_author, Some("Alice"), None).await;
        seed_root_message(&store, channel_id, known_author, "by alice", ts("2026-01-01T12:00:00Z"))
            .await;
        seed_root_message(
            &store,
            channel_id,
            unknown_author,
            "by an agent",
            ts("2026-01-01T11:00:00Z"),
        )
        .await;

        let token = bearer_token(&jwt, Uuid::new_v4());
        let response = app
            .oneshot(get_request(&format!("/v1/channels/{channel_id}/messages"), &token))
            .await
            .expect("list request should return response");

        let body = body_json(response).await;
        let messages = body["messages"].as_array().expect("messages should be an array");
        assert_eq!(messages[0]["author"]["id"], known_author.to_string());
        assert_eq!(messages[0]["author"]["name"], "Alice");
        assert!(messages[0]["author"]["avatarUrl"].is_null());
        assert!(messages[1]["author"].is_null());
        assert_eq!(messages[0]["metadata"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn list_rejects_malformed_cursor() {
        let (app, _, jwt) = test_app();
        let channel_id = Uuid::new_v4();
        let token = bearer_token(&jwt, Uuid::new_v4());

        let response = app
            .oneshot(get_request(
                &format!("/v1/channels/{channel_id}/messages?cursor=yesterday"),
                &token,
            ))
            .await
            .expect("list request should return response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    }

    fn urlencode(value: &str) -> String {
        value.replace('+', "%2B").replace(':', "%3A")
    }
}
