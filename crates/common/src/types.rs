// Core domain types shared across all Colloquy crates.
//
// These are the public wire shapes: field names serialize as camelCase, and
// the opaque `settings`/`metadata` maps are always present (the storage layer
// normalizes NULL to an empty map before constructing these).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Role of a user within a workspace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

/// Kind of participant that authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorType {
    Human,
    Agent,
    System,
}

impl AuthorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "human" => Some(Self::Human),
            "agent" => Some(Self::Agent),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Lifecycle state of a thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Resolved,
    Archived,
}

impl ThreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Lifecycle state of a dive (sub-thread spawned from a message).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiveStatus {
    Active,
    Published,
    Discarded,
}

/// A registered user (humans have auth records; agents may not).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// A workspace is the top-level tenant containing channels and members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique identifier.
    pub slug: String,
    pub owner_id: Uuid,
    /// Opaque per-workspace settings; never null on the wire.
    #[serde(default)]
    pub settings: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in a workspace. Membership gates workspace-scoped
/// visibility: a workspace is only returned to callers with a membership row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// A named conversation space within a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A thread groups one top-level message and its replies within a channel.
///
/// `root_message_id` is null for the brief window between thread creation and
/// the root-message link write; it is set at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub root_message_id: Option<Uuid>,
    pub status: ThreadStatus,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single authored content unit, either top-level (`parent_id` null) or a
/// reply. `thread_id` is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    /// Reserved for dive-scoped messages.
    pub dive_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_type: AuthorType,
    pub content: String,
    /// Opaque per-message metadata; never null on the wire.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author details joined from the user record at read time. Null when the
/// author has no matching user row (e.g. an agent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageAuthor {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A message enriched with its author for history listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageWithAuthor {
    #[serde(flatten)]
    pub message: Message,
    pub author: Option<MessageAuthor>,
}

/// A sub-thread spawned from a message. Shape only — dive operations are
/// declared stubs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Dive {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub parent_message_id: Uuid,
    pub topic: Option<String>,
    pub status: DiveStatus,
    pub result: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}
