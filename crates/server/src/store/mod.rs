// Relational-store capability behind the RPC surface.
//
// Handlers depend only on the named operations of [`Store`]; the Postgres and
// in-memory adapters implement them. Multi-step procedures issue these calls
// sequentially and non-atomically — a failure partway through leaves earlier
// writes committed, and the distinct per-step error labels surface that.

mod memory;
mod postgres;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use colloquy_common::types::{
    AuthorType, Channel, MemberRole, Message, MessageAuthor, MessageWithAuthor, ThreadStatus,
    Workspace,
};
use serde_json::{Map, Value};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

pub use memory::{FailureInjection, MemoryStore};

/// A failed storage operation. The RPC layer wraps this with an
/// operation-specific prefix before surfacing it to the caller.
#[derive(Debug)]
pub struct StoreError(pub anyhow::Error);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for StoreError {}

// ── Storage-shape records ────────────────────────────────────────────────────
//
// Records carry the nullable storage representation; `into_*` mappings
// produce the public shapes with `settings`/`metadata` defaulted to `{}`.

#[derive(Debug, Clone)]
pub struct WorkspaceRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub owner_id: Uuid,
    pub settings: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl WorkspaceRecord {
    pub fn into_workspace(self) -> Workspace {
        Workspace {
            id: self.id,
            name: self.name,
            slug: self.slug,
            owner_id: self.owner_id,
            settings: json_object_or_empty(self.settings),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ChannelRecord {
    pub fn into_channel(self) -> Channel {
        Channel {
            id: self.id,
            workspace_id: self.workspace_id,
            name: self.name,
            description: self.description,
            is_private: self.is_private,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThreadRecord {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub root_message_id: Option<Uuid>,
    pub status: ThreadStatus,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub dive_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_type: AuthorType,
    pub content: String,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            thread_id: self.thread_id,
            dive_id: self.dive_id,
            parent_id: self.parent_id,
            author_id: self.author_id,
            author_type: self.author_type,
            content: self.content,
            metadata: json_object_or_empty(self.metadata),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A root message joined with its author for history listings. `author` is
/// None when no user row matches the author id (e.g. an agent).
#[derive(Debug, Clone)]
pub struct MessageWithAuthorRecord {
    pub message: MessageRecord,
    pub author: Option<MessageAuthor>,
}

impl MessageWithAuthorRecord {
    pub fn into_message_with_author(self) -> MessageWithAuthor {
        MessageWithAuthor { message: self.message.into_message(), author: self.author }
    }
}

fn json_object_or_empty(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

// ── Store dispatch ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Store {
    Postgres(PgPool),
    #[cfg_attr(not(test), allow(dead_code))]
    Memory(Arc<RwLock<MemoryStore>>),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(MemoryStore::default())))
    }

    /// Insert-if-absent user row mirroring the auth record.
    pub async fn upsert_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => postgres::upsert_user(pool, user_id).await,
            Self::Memory(store) => memory::upsert_user(store, user_id).await,
        }
    }

    pub async fn insert_workspace(
        &self,
        name: &str,
        slug: &str,
        owner_id: Uuid,
    ) -> Result<WorkspaceRecord, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::insert_workspace(pool, name, slug, owner_id).await,
            Self::Memory(store) => memory::insert_workspace(store, name, slug, owner_id).await,
        }
    }

    pub async fn insert_workspace_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                postgres::insert_workspace_member(pool, workspace_id, user_id, role).await
            }
            Self::Memory(store) => {
                memory::insert_workspace_member(store, workspace_id, user_id, role).await
            }
        }
    }

    /// Workspaces visible to `user_id` — those with a membership row.
    pub async fn list_workspaces_for_member(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WorkspaceRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::list_workspaces_for_member(pool, user_id).await,
            Self::Memory(store) => memory::list_workspaces_for_member(store, user_id).await,
        }
    }

    pub async fn get_workspace_for_member(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Option<WorkspaceRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => {
                postgres::get_workspace_for_member(pool, user_id, workspace_id).await
            }
            Self::Memory(store) => {
                memory::get_workspace_for_member(store, user_id, workspace_id).await
            }
        }
    }

    /// Channels of a workspace, name ascending.
    pub async fn list_channels(&self, workspace_id: Uuid) -> Result<Vec<ChannelRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::list_channels(pool, workspace_id).await,
            Self::Memory(store) => memory::list_channels(store, workspace_id).await,
        }
    }

    pub async fn get_channel_by_name(
        &self,
        workspace_id: Uuid,
        name: &str,
    ) -> Result<Option<ChannelRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::get_channel_by_name(pool, workspace_id, name).await,
            Self::Memory(store) => memory::get_channel_by_name(store, workspace_id, name).await,
        }
    }

    pub async fn insert_channel(
        &self,
        workspace_id: Uuid,
        name: &str,
        description: Option<&str>,
        created_by: Uuid,
    ) -> Result<ChannelRecord, StoreError> {
        match self {
            Self::Postgres(pool) => {
                postgres::insert_channel(pool, workspace_id, name, description, created_by).await
            }
            Self::Memory(store) => {
                memory::insert_channel(store, workspace_id, name, description, created_by).await
            }
        }
    }

    /// Single-row fetch of a message's thread id; None when the message does
    /// not exist.
    pub async fn parent_thread_id(&self, message_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::parent_thread_id(pool, message_id).await,
            Self::Memory(store) => memory::parent_thread_id(store, message_id).await,
        }
    }

    /// Insert a new `active` thread scoped to the channel; returns its id.
    pub async fn insert_thread(&self, channel_id: Uuid) -> Result<Uuid, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::insert_thread(pool, channel_id).await,
            Self::Memory(store) => memory::insert_thread(store, channel_id).await,
        }
    }

    pub async fn insert_message(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        author_id: Uuid,
        author_type: AuthorType,
        content: &str,
    ) -> Result<MessageRecord, StoreError> {
        match self {
            Self::Postgres(pool) => {
                postgres::insert_message(pool, thread_id, parent_id, author_id, author_type, content)
                    .await
            }
            Self::Memory(store) => {
                memory::insert_message(store, thread_id, parent_id, author_id, author_type, content)
                    .await
            }
        }
    }

    /// Backfill a thread's root message link.
    pub async fn link_thread_root(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => postgres::link_thread_root(pool, thread_id, message_id).await,
            Self::Memory(store) => memory::link_thread_root(store, thread_id, message_id).await,
        }
    }

    /// Root messages of a channel (`parent_id` null), newest first, with the
    /// author joined. Rows strictly earlier than `before` when given; at most
    /// `fetch` rows.
    pub async fn list_root_messages(
        &self,
        channel_id: Uuid,
        before: Option<DateTime<Utc>>,
        fetch: usize,
    ) -> Result<Vec<MessageWithAuthorRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => {
                postgres::list_root_messages(pool, channel_id, before, fetch).await
            }
            Self::Memory(store) => memory::list_root_messages(store, channel_id, before, fetch).await,
        }
    }

    /// Remote-procedure invocation seeding the default agent participants for
    /// a new workspace. The caller treats failures as best-effort.
    pub async fn seed_workspace_agents(&self, workspace_id: Uuid) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => postgres::seed_workspace_agents(pool, workspace_id).await,
            Self::Memory(store) => memory::seed_workspace_agents(store, workspace_id).await,
        }
    }

    // ── Test support (memory adapter only) ──────────────────────────────────

    #[cfg(test)]
    pub async fn set_failures_for_tests(&self, failures: FailureInjection) {
        if let Self::Memory(store) = self {
            store.write().await.failures = failures;
        }
    }

    /// Number of storage operations attempted, successful or not.
    #[cfg(test)]
    pub async fn ops_for_tests(&self) -> usize {
        match self {
            Self::Memory(store) => store.read().await.ops,
            Self::Postgres(_) => 0,
        }
    }

    #[cfg(test)]
    pub async fn seed_user_for_tests(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) {
        if let Self::Memory(store) = self {
            store.write().await.users.insert(
                user_id,
                memory::MemoryUser {
                    id: user_id,
                    name: name.map(ToOwned::to_owned),
                    avatar_url: avatar_url.map(ToOwned::to_owned),
                },
            );
        }
    }

    #[cfg(test)]
    pub async fn seed_workspace_for_tests(&self, workspace: WorkspaceRecord) {
        if let Self::Memory(store) = self {
            store.write().await.workspaces.insert(workspace.id, workspace);
        }
    }

    #[cfg(test)]
    pub async fn seed_member_for_tests(&self, workspace_id: Uuid, user_id: Uuid, role: MemberRole) {
        if let Self::Memory(store) = self {
            store.write().await.members.insert((workspace_id, user_id), role);
        }
    }

    #[cfg(test)]
    pub async fn seed_channel_for_tests(&self, channel: ChannelRecord) {
        if let Self::Memory(store) = self {
            store.write().await.channels.insert(channel.id, channel);
        }
    }

    #[cfg(test)]
    pub async fn seed_thread_for_tests(&self, thread: ThreadRecord) {
        if let Self::Memory(store) = self {
            store.write().await.threads.insert(thread.id, thread);
        }
    }

    #[cfg(test)]
    pub async fn seed_message_for_tests(&self, message: MessageRecord) {
        if let Self::Memory(store) = self {
            store.write().await.messages.insert(message.id, message);
        }
    }

    #[cfg(test)]
    pub async fn thread_record_for_tests(&self, thread_id: Uuid) -> Option<ThreadRecord> {
        match self {
            Self::Memory(store) => store.read().await.threads.get(&thread_id).cloned(),
            Self::Postgres(_) => None,
        }
    }

    #[cfg(test)]
    pub async fn message_record_for_tests(&self, message_id: Uuid) -> Option<MessageRecord> {
        match self {
            Self::Memory(store) => store.read().await.messages.get(&message_id).cloned(),
            Self::Postgres(_) => None,
        }
    }

    #[cfg(test)]
    pub async fn thread_count_for_tests(&self) -> usize {
        match self {
            Self::Memory(store) => store.read().await.threads.len(),
            Self::Postgres(_) => 0,
        }
    }

    #[cfg(test)]
    pub async fn message_count_for_tests(&self) -> usize {
        match self {
            Self::Memory(store) => store.read().await.messages.len(),
            Self::Postgres(_) => 0,
        }
    }

    #[cfg(test)]
    pub async fn member_role_for_tests(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Option<MemberRole> {
        match self {
            Self::Memory(store) => {
                store.read().await.members.get(&(workspace_id, user_id)).copied()
            }
            Self::Postgres(_) => None,
        }
    }

    #[cfg(test)]
    pub async fn seeded_agent_workspaces_for_tests(&self) -> Vec<Uuid> {
        match self {
            Self::Memory(store) => store.read().await.seeded_agent_workspaces.clone(),
            Self::Postgres(_) => Vec::new(),
        }
    }
}
