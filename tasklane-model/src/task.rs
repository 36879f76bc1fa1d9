//! Task entity, identifiers, and mutation DTOs.
//!
//! The task identifier is a tagged type: server-assigned ids are
//! [`TaskId::Confirmed`], locally fabricated placeholders created during an
//! optimistic mutation are [`TaskId::Pending`]. Whether a task is optimistic
//! is therefore a type-level question, not a string-prefix check, and a
//! pending id can never collide with a real server id.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Maximum allowed task title length in characters.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Maximum allowed task description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Maximum allowed assignee name length in characters.
pub const MAX_ASSIGNEE_LENGTH: usize = 50;

/// Marker prefix used only in the serialized form of a pending id.
///
/// Server ids never start with `~`, so the encoding is unambiguous. In
/// memory the distinction is carried by the [`TaskId`] variant, never by
/// string inspection.
const PENDING_ID_PREFIX: &str = "~pending:";

/// Token identifying one optimistic placeholder, based on UUID v7 so that
/// tokens created later always rank as newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingToken(Uuid);

impl PendingToken {
    /// Creates a new time-ordered pending token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PendingToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PendingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a task.
///
/// `Confirmed` carries the server-assigned id exactly as received on the
/// wire. `Pending` identifies an optimistic placeholder that exists only in
/// local caches between mutation start and server acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Server-assigned id, immutable once created.
    Confirmed(String),
    /// Locally fabricated placeholder id.
    Pending(PendingToken),
}

impl TaskId {
    /// Creates a confirmed id from a server-provided string.
    pub fn confirmed(id: impl Into<String>) -> Self {
        Self::Confirmed(id.into())
    }

    /// Creates a fresh pending id.
    #[must_use]
    pub fn pending() -> Self {
        Self::Pending(PendingToken::new())
    }

    /// Whether this id identifies an optimistic placeholder.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the server-assigned id string, if confirmed.
    #[must_use]
    pub fn as_confirmed(&self) -> Option<&str> {
        match self {
            Self::Confirmed(id) => Some(id),
            Self::Pending(_) => None,
        }
    }

    /// Whether this id is the confirmed id `id`.
    #[must_use]
    pub fn is(&self, id: &str) -> bool {
        self.as_confirmed() == Some(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirmed(id) => write!(f, "{id}"),
            Self::Pending(token) => write!(f, "{PENDING_ID_PREFIX}{token}"),
        }
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.strip_prefix(PENDING_ID_PREFIX) {
            Some(token) => {
                let uuid = Uuid::parse_str(token)
                    .map_err(|e| D::Error::custom(format!("invalid pending token: {e}")))?;
                Ok(Self::Pending(PendingToken(uuid)))
            }
            None => Ok(Self::Confirmed(raw)),
        }
    }
}

/// One unit of work.
///
/// `id` and `created_at` are server-assigned and immutable; a pending task
/// carries a locally synthesized id and the local creation time until the
/// server acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task identifier, unique within a collection snapshot.
    pub id: TaskId,
    /// Short summary of the work (non-empty, bounded).
    pub title: String,
    /// Free-form details; may be empty.
    pub description: String,
    /// Who the task is assigned to (non-empty, bounded).
    pub assignee: String,
    /// Whether the task has been completed.
    pub completed: bool,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

/// Errors produced by field-level validation.
///
/// Validation runs before dispatch; a value that fails validation never
/// reaches the mutation engine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {MAX_TITLE_LENGTH} characters)")]
    TitleTooLong,
    /// Task description exceeds the maximum length.
    #[error("task description too long (max {MAX_DESCRIPTION_LENGTH} characters)")]
    DescriptionTooLong,
    /// Assignee cannot be empty.
    #[error("assignee cannot be empty")]
    AssigneeEmpty,
    /// Assignee exceeds the maximum length.
    #[error("assignee too long (max {MAX_ASSIGNEE_LENGTH} characters)")]
    AssigneeTooLong,
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok(())
}

fn check_assignee(assignee: &str) -> Result<(), ValidationError> {
    if assignee.trim().is_empty() {
        return Err(ValidationError::AssigneeEmpty);
    }
    if assignee.chars().count() > MAX_ASSIGNEE_LENGTH {
        return Err(ValidationError::AssigneeTooLong);
    }
    Ok(())
}

/// Payload for creating a task. The server assigns `id` and `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Short summary of the work.
    pub title: String,
    /// Free-form details; may be empty.
    pub description: String,
    /// Who the task is assigned to.
    pub assignee: String,
    /// Initial completion state.
    pub completed: bool,
}

impl NewTask {
    /// Validates all fields against the bounds above.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        check_assignee(&self.assignee)?;
        Ok(())
    }

    /// Builds the optimistic placeholder task for this payload.
    ///
    /// The placeholder carries a fresh pending id and the current local
    /// time; both are replaced by server truth on acknowledgment.
    #[must_use]
    pub fn to_optimistic(&self) -> Task {
        Task {
            id: TaskId::pending(),
            title: self.title.clone(),
            description: self.description.clone(),
            assignee: self.assignee.clone(),
            completed: self.completed,
            created_at: Utc::now(),
        }
    }

    /// Converts this payload into a full-field patch, for edit flows that
    /// submit every form field.
    #[must_use]
    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            title: Some(self.title),
            description: Some(self.description),
            assignee: Some(self.assignee),
            completed: Some(self.completed),
        }
    }
}

/// Partial update payload. Fields left `None` are omitted from the wire
/// body and keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New assignee, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// New completion state, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Validates every present field against the bounds above.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(assignee) = &self.assignee {
            check_assignee(assignee)?;
        }
        Ok(())
    }

    /// Returns a copy of `task` with the present fields of this patch
    /// merged in. `id` and `created_at` are never touched.
    #[must_use]
    pub fn apply_to(&self, task: &Task) -> Task {
        let mut merged = task.clone();
        if let Some(title) = &self.title {
            merged.title = title.clone();
        }
        if let Some(description) = &self.description {
            merged.description = description.clone();
        }
        if let Some(assignee) = &self.assignee {
            merged.assignee = assignee.clone();
        }
        if let Some(completed) = self.completed {
            merged.completed = completed;
        }
        merged
    }
}
