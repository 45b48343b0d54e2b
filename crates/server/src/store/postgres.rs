// Postgres store adapter.
//
// One function per named capability; rows are fetched with runtime-checked
// `query_as` and converted into storage records. Errors are returned raw —
// the RPC layer adds the operation-specific prefix.

use chrono::{DateTime, Utc};
use colloquy_common::types::{AuthorType, MemberRole, MessageAuthor};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    ChannelRecord, MessageRecord, MessageWithAuthorRecord, StoreError, WorkspaceRecord,
};

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: Uuid,
    name: String,
    slug: String,
    owner_id: Uuid,
    settings: Option<Value>,
    created_at: DateTime<Utc>,
}

impl From<WorkspaceRow> for WorkspaceRecord {
    fn from(value: WorkspaceRow) -> Self {
        Self {
            id: value.id,
            name: value.name,
            slug: value.slug,
            owner_id: value.owner_id,
            settings: value.settings,
            created_at: value.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: Uuid,
    workspace_id: Uuid,
    name: String,
    description: Option<String>,
    is_private: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ChannelRow> for ChannelRecord {
    fn from(value: ChannelRow) -> Self {
        Self {
            id: value.id,
            workspace_id: value.workspace_id,
            name: value.name,
            description: value.description,
            is_private: value.is_private,
            created_by: value.created_by,
            created_at: value.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    thread_id: Uuid,
    dive_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    author_id: Uuid,
    author_type: String,
    content: String,
    metadata: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = StoreError;

    fn try_from(value: MessageRow) -> Result<Self, StoreError> {
        let author_type = parse_author_type(&value.author_type)?;
        Ok(Self {
            id: value.id,
            thread_id: value.thread_id,
            dive_id: value.dive_id,
            parent_id: value.parent_id,
            author_id: value.author_id,
            author_type,
            content: value.content,
            metadata: value.metadata,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageWithAuthorRow {
    id: Uuid,
    thread_id: Uuid,
    dive_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    author_id: Uuid,
    author_type: String,
    content: String,
    metadata: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_user_id: Option<Uuid>,
    author_name: Option<String>,
    author_avatar_url: Option<String>,
}

impl TryFrom<MessageWithAuthorRow> for MessageWithAuthorRecord {
    type Error = StoreError;

    fn try_from(value: MessageWithAuthorRow) -> Result<Self, StoreError> {
        let author = value.author_user_id.map(|id| MessageAuthor {
            id,
            name: value.author_name.clone(),
            avatar_url: value.author_avatar_url.clone(),
        });
        let author_type = parse_author_type(&value.author_type)?;
        Ok(Self {
            message: MessageRecord {
                id: value.id,
                thread_id: value.thread_id,
                dive_id: value.dive_id,
                parent_id: value.parent_id,
                author_id: value.author_id,
                author_type,
                content: value.content,
                metadata: value.metadata,
                created_at: value.created_at,
                updated_at: value.updated_at,
            },
            author,
        })
    }
}

fn parse_author_type(value: &str) -> Result<AuthorType, StoreError> {
    AuthorType::parse(value)
        .ok_or_else(|| StoreError(anyhow::anyhow!("invalid author type '{value}' in database")))
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    StoreError(error.into())
}

pub(super) async fn upsert_user(pool: &PgPool, user_id: Uuid) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email)
        VALUES ($1, '')
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

pub(super) async fn insert_workspace(
    pool: &PgPool,
    name: &str,
    slug: &str,
    owner_id: Uuid,
) -> Result<WorkspaceRecord, StoreError> {
    let row = sqlx::query_as::<_, WorkspaceRow>(
        r#"
        INSERT INTO workspaces (name, slug, owner_id)
        VALUES ($1, $2, $3)
        RETURNING id, name, slug, owner_id, settings, created_at
        "#,
    )
    .bind(name)
    .bind(slug)
    .bind(owner_id)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.into())
}

pub(super) async fn insert_workspace_member(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO workspace_members (workspace_id, user_id, role)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(role.as_str())
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

pub(super) async fn list_workspaces_for_member(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<WorkspaceRecord>, StoreError> {
    let rows = sqlx::query_as::<_, WorkspaceRow>(
        r#"
        SELECT w.id, w.name, w.slug, w.owner_id, w.settings, w.created_at
        FROM workspaces w
        JOIN workspace_members m ON m.workspace_id = w.id
        WHERE m.user_id = $1
        ORDER BY w.created_at ASC, w.id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(WorkspaceRecord::from).collect())
}

pub(super) async fn get_workspace_for_member(
    pool: &PgPool,
    user_id: Uuid,
    workspace_id: Uuid,
) -> Result<Option<WorkspaceRecord>, StoreError> {
    let row = sqlx::query_as::<_, WorkspaceRow>(
        r#"
        SELECT w.id, w.name, w.slug, w.owner_id, w.settings, w.created_at
        FROM workspaces w
        JOIN workspace_members m ON m.workspace_id = w.id
        WHERE w.id = $1
          AND m.user_id = $2
        "#,
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.map(WorkspaceRecord::from))
}

pub(super) async fn list_channels(
    pool: &PgPool,
    workspace_id: Uuid,
) -> Result<Vec<ChannelRecord>, StoreError> {
    let rows = sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, workspace_id, name, description, is_private, created_by, created_at
        FROM channels
        WHERE workspace_id = $1
        ORDER BY name ASC
        "#,
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(ChannelRecord::from).collect())
}

pub(super) async fn get_channel_by_name(
    pool: &PgPool,
    workspace_id: Uuid,
    name: &str,
) -> Result<Option<ChannelRecord>, StoreError> {
    let row = sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, workspace_id, name, description, is_private, created_by, created_at
        FROM channels
        WHERE workspace_id = $1
          AND name = $2
        "#,
    )
    .bind(workspace_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.map(ChannelRecord::from))
}

pub(super) async fn insert_channel(
    pool: &PgPool,
    workspace_id: Uuid,
    name: &str,
    description: Option<&str>,
    created_by: Uuid,
) -> Result<ChannelRecord, StoreError> {
    let row = sqlx::query_as::<_, ChannelRow>(
        r#"
        INSERT INTO channels (workspace_id, name, description, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING id, workspace_id, name, description, is_private, created_by, created_at
        "#,
    )
    .bind(workspace_id)
    .bind(name)
    .bind(description)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(row.into())
}

pub(super) async fn parent_thread_id(
    pool: &PgPool,
    message_id: Uuid,
) -> Result<Option<Uuid>, StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT thread_id
        FROM messages
        WHERE id = $1
        "#,
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_error)
}

pub(super) async fn insert_thread(pool: &PgPool, channel_id: Uuid) -> Result<Uuid, StoreError> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO threads (channel_id, status)
        VALUES ($1, 'active')
        RETURNING id
        "#,
    )
    .bind(channel_id)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)
}

pub(super) async fn insert_message(
    pool: &PgPool,
    thread_id: Uuid,
    parent_id: Option<Uuid>,
    author_id: Uuid,
    author_type: AuthorType,
    content: &str,
) -> Result<MessageRecord, StoreError> {
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (thread_id, parent_id, author_id, author_type, content)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, thread_id, dive_id, parent_id, author_id, author_type,
                  content, metadata, created_at, updated_at
        "#,
    )
    .bind(thread_id)
    .bind(parent_id)
    .bind(author_id)
    .bind(author_type.as_str())
    .bind(content)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    row.try_into()
}

pub(super) async fn link_thread_root(
    pool: &PgPool,
    thread_id: Uuid,
    message_id: Uuid,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE threads
        SET root_message_id = $2,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(thread_id)
    .bind(message_id)
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        return Err(StoreError(anyhow::anyhow!("thread {thread_id} not found")));
    }

    Ok(())
}

pub(super) async fn list_root_messages(
    pool: &PgPool,
    channel_id: Uuid,
    before: Option<DateTime<Utc>>,
    fetch: usize,
) -> Result<Vec<MessageWithAuthorRecord>, StoreError> {
    let rows = sqlx::query_as::<_, MessageWithAuthorRow>(
        r#"
        SELECT m.id, m.thread_id, m.dive_id, m.parent_id, m.author_id, m.author_type,
               m.content, m.metadata, m.created_at, m.updated_at,
               u.id AS author_user_id, u.name AS author_name, u.avatar_url AS author_avatar_url
        FROM messages m
        JOIN threads t ON t.id = m.thread_id
        LEFT JOIN users u ON u.id = m.author_id
        WHERE t.channel_id = $1
          AND m.parent_id IS NULL
          AND ($2::timestamptz IS NULL OR m.created_at < $2)
        ORDER BY m.created_at DESC, m.id DESC
        LIMIT $3
        "#,
    )
    .bind(channel_id)
    .bind(before)
    .bind(fetch as i64)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    rows.into_iter().map(MessageWithAuthorRecord::try_from).collect()
}

pub(super) async fn seed_workspace_agents(
    pool: &PgPool,
    workspace_id: Uuid,
) -> Result<(), StoreError> {
    sqlx::query("SELECT seed_workspace_agents($1)")
        .bind(workspace_id)
        .execute(pool)
        .await
        .map_err(map_sqlx_error)?;

    Ok(())
}
