// Shared input contracts: declarative shape-and-bounds checks evaluated
// before any store access.
//
// Bounds here mirror the storage column limits. Route handlers may apply
// stricter bounds at the wire; the channel-name maximum in particular is 80
// at the channel-create route and 100 here.

use thiserror::Error;

pub const MESSAGE_CONTENT_MAX: usize = 50_000;
pub const CHANNEL_NAME_MAX: usize = 100;
pub const CHANNEL_DESCRIPTION_MAX: usize = 500;
pub const WORKSPACE_NAME_MAX: usize = 100;
pub const WORKSPACE_SLUG_MAX: usize = 100;
pub const DIVE_TOPIC_MAX: usize = 200;

/// A declared input constraint was violated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// Message content: required, 1–50000 characters.
pub fn validate_message_content(content: &str) -> Result<(), ValidationError> {
    non_empty("content", content)?;
    within("content", content, MESSAGE_CONTENT_MAX)
}

/// Channel name per the shared schema: required, 1–100 characters.
pub fn validate_channel_name(name: &str) -> Result<(), ValidationError> {
    non_empty("name", name)?;
    within("name", name, CHANNEL_NAME_MAX)
}

/// Channel description: optional at the call site, at most 500 characters.
pub fn validate_channel_description(description: &str) -> Result<(), ValidationError> {
    within("description", description, CHANNEL_DESCRIPTION_MAX)
}

/// Workspace name: required, 1–100 characters.
pub fn validate_workspace_name(name: &str) -> Result<(), ValidationError> {
    non_empty("name", name)?;
    within("name", name, WORKSPACE_NAME_MAX)
}

/// Workspace slug: required, 1–100 characters.
pub fn validate_workspace_slug(slug: &str) -> Result<(), ValidationError> {
    non_empty("slug", slug)?;
    within("slug", slug, WORKSPACE_SLUG_MAX)
}

/// Dive topic: optional at the call site, at most 200 characters.
pub fn validate_dive_topic(topic: &str) -> Result<(), ValidationError> {
    within("topic", topic, DIVE_TOPIC_MAX)
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

fn within(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}
