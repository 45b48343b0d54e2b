// In-memory store adapter backing unit tests.
//
// Mirrors the Postgres adapter's observable behavior, including the
// non-atomic multi-step write sequences. `FailureInjection` makes individual
// operations fail so per-step error labeling and partial-write states are
// testable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use colloquy_common::types::{AuthorType, MemberRole, MessageAuthor, ThreadStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ChannelRecord, MessageRecord, MessageWithAuthorRecord, StoreError, ThreadRecord,
    WorkspaceRecord,
};

#[derive(Debug, Clone)]
pub struct MemoryUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Per-operation failure switches; all off by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureInjection {
    pub upsert_user: bool,
    pub insert_workspace: bool,
    pub insert_member: bool,
    pub insert_thread: bool,
    pub insert_message: bool,
    pub link_thread_root: bool,
    pub seed_agents: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    pub(super) users: HashMap<Uuid, MemoryUser>,
    pub(super) workspaces: HashMap<Uuid, WorkspaceRecord>,
    pub(super) members: HashMap<(Uuid, Uuid), MemberRole>,
    pub(super) channels: HashMap<Uuid, ChannelRecord>,
    pub(super) threads: HashMap<Uuid, ThreadRecord>,
    pub(super) messages: HashMap<Uuid, MessageRecord>,
    pub(super) seeded_agent_workspaces: Vec<Uuid>,
    pub(super) failures: FailureInjection,
    /// Storage operations attempted, successful or not.
    pub(super) ops: usize,
}

fn injected(flag: bool, operation: &'static str) -> Result<(), StoreError> {
    if flag {
        return Err(StoreError(anyhow::anyhow!("injected {operation} failure")));
    }
    Ok(())
}

pub(super) async fn upsert_user(
    store: &RwLock<MemoryStore>,
    user_id: Uuid,
) -> Result<(), StoreError> {
    let mut store = store.write().await;
    store.ops += 1;
    injected(store.failures.upsert_user, "user upsert")?;

    store
        .users
        .entry(user_id)
        .or_insert(MemoryUser { id: user_id, name: None, avatar_url: None });
    Ok(())
}

pub(super) async fn insert_workspace(
    store: &RwLock<MemoryStore>,
    name: &str,
    slug: &str,
    owner_id: Uuid,
) -> Result<WorkspaceRecord, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;
    injected(store.failures.insert_workspace, "workspace insert")?;

    let record = WorkspaceRecord {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        slug: slug.to_owned(),
        owner_id,
        settings: None,
        created_at: Utc::now(),
    };
    store.workspaces.insert(record.id, record.clone());
    Ok(record)
}

pub(super) async fn insert_workspace_member(
    store: &RwLock<MemoryStore>,
    workspace_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<(), StoreError> {
    let mut store = store.write().await;
    store.ops += 1;
    injected(store.failures.insert_member, "workspace member insert")?;

    store.members.insert((workspace_id, user_id), role);
    Ok(())
}

pub(super) async fn list_workspaces_for_member(
    store: &RwLock<MemoryStore>,
    user_id: Uuid,
) -> Result<Vec<WorkspaceRecord>, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;

    let mut records: Vec<WorkspaceRecord> = store
        .members
        .keys()
        .filter(|(_, member_id)| *member_id == user_id)
        .filter_map(|(workspace_id, _)| store.workspaces.get(workspace_id).cloned())
        .collect();
    records.sort_by(|left, right| {
        left.created_at.cmp(&right.created_at).then(left.id.cmp(&right.id))
    });
    Ok(records)
}

pub(super) async fn get_workspace_for_member(
    store: &RwLock<MemoryStore>,
    user_id: Uuid,
    workspace_id: Uuid,
) -> Result<Option<WorkspaceRecord>, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;

    if !store.members.contains_key(&(workspace_id, user_id)) {
        return Ok(None);
    }
    Ok(store.workspaces.get(&workspace_id).cloned())
}

pub(super) async fn list_channels(
    store: &RwLock<MemoryStore>,
    workspace_id: Uuid,
) -> Result<Vec<ChannelRecord>, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;

    let mut records: Vec<ChannelRecord> = store
        .channels
        .values()
        .filter(|channel| channel.workspace_id == workspace_id)
        .cloned()
        .collect();
    records.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(records)
}

pub(super) async fn get_channel_by_name(
    store: &RwLock<MemoryStore>,
    workspace_id: Uuid,
    name: &str,
) -> Result<Option<ChannelRecord>, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;

    Ok(store
        .channels
        .values()
        .find(|channel| channel.workspace_id == workspace_id && channel.name == name)
        .cloned())
}

pub(super) async fn insert_channel(
    store: &RwLock<MemoryStore>,
    workspace_id: Uuid,
    name: &str,
    description: Option<&str>,
    created_by: Uuid,
) -> Result<ChannelRecord, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;

    let record = ChannelRecord {
        id: Uuid::new_v4(),
        workspace_id,
        name: name.to_owned(),
        description: description.map(ToOwned::to_owned),
        is_private: false,
        created_by,
        created_at: Utc::now(),
    };
    store.channels.insert(record.id, record.clone());
    Ok(record)
}

pub(super) async fn parent_thread_id(
    store: &RwLock<MemoryStore>,
    message_id: Uuid,
) -> Result<Option<Uuid>, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;

    Ok(store.messages.get(&message_id).map(|message| message.thread_id))
}

pub(super) async fn insert_thread(
    store: &RwLock<MemoryStore>,
    channel_id: Uuid,
) -> Result<Uuid, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;
    injected(store.failures.insert_thread, "thread insert")?;

    let now = Utc::now();
    let record = ThreadRecord {
        id: Uuid::new_v4(),
        channel_id,
        root_message_id: None,
        status: ThreadStatus::Active,
        title: None,
        created_at: now,
        updated_at: now,
    };
    let thread_id = record.id;
    store.threads.insert(thread_id, record);
    Ok(thread_id)
}

pub(super) async fn insert_message(
    store: &RwLock<MemoryStore>,
    thread_id: Uuid,
    parent_id: Option<Uuid>,
    author_id: Uuid,
    author_type: AuthorType,
    content: &str,
) -> Result<MessageRecord, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;
    injected(store.failures.insert_message, "message insert")?;

    let now = Utc::now();
    let record = MessageRecord {
        id: Uuid::new_v4(),
        thread_id,
        dive_id: None,
        parent_id,
        author_id,
        author_type,
        content: content.to_owned(),
        metadata: None,
        created_at: now,
        updated_at: now,
    };
    store.messages.insert(record.id, record.clone());
    Ok(record)
}

pub(super) async fn link_thread_root(
    store: &RwLock<MemoryStore>,
    thread_id: Uuid,
    message_id: Uuid,
) -> Result<(), StoreError> {
    let mut store = store.write().await;
    store.ops += 1;
    injected(store.failures.link_thread_root, "thread root update")?;

    let thread = store
        .threads
        .get_mut(&thread_id)
        .ok_or_else(|| StoreError(anyhow::anyhow!("thread {thread_id} not found")))?;
    thread.root_message_id = Some(message_id);
    thread.updated_at = Utc::now();
    Ok(())
}

pub(super) async fn list_root_messages(
    store: &RwLock<MemoryStore>,
    channel_id: Uuid,
    before: Option<DateTime<Utc>>,
    fetch: usize,
) -> Result<Vec<MessageWithAuthorRecord>, StoreError> {
    let mut store = store.write().await;
    store.ops += 1;

    let mut records: Vec<MessageRecord> = store
        .messages
        .values()
        .filter(|message| message.parent_id.is_none())
        .filter(|message| {
            store
                .threads
                .get(&message.thread_id)
                .is_some_and(|thread| thread.channel_id == channel_id)
        })
        .filter(|message| before.map_or(true, |cursor| message.created_at < cursor))
        .cloned()
        .collect();
    records.sort_by(|left, right| {
        right.created_at.cmp(&left.created_at).then(right.id.cmp(&left.id))
    });
    records.truncate(fetch);

    Ok(records
        .into_iter()
        .map(|message| {
            let author = store.users.get(&message.author_id).map(|user| MessageAuthor {
                id: user.id,
                name: user.name.clone(),
                avatar_url: user.avatar_url.clone(),
            });
            MessageWithAuthorRecord { message, author }
        })
        .collect())
}

pub(super) async fn seed_workspace_agents(
    store: &RwLock<MemoryStore>,
    workspace_id: Uuid,
) -> Result<(), StoreError> {
    let mut store = store.write().await;
    store.ops += 1;
    injected(store.failures.seed_agents, "agent seeding")?;

    store.seeded_agent_workspaces.push(workspace_id);
    Ok(())
}
