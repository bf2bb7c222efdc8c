//! Confirm-then-mutate coordination of create, update and delete.
//!
//! A mutation is validated locally, registered as pending under a fresh
//! [`OpId`], and only touches the cache once the remote call has succeeded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::capabilities::HttpResult;
use crate::collection::{self, RemoteError, TransportError};
use crate::model::{Cache, Record, RecordDraft, RecordId};
use crate::{MIN_BODY_CHARS, MIN_TITLE_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(pub Uuid);

impl OpId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Create => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "added",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Title,
    Body,
    UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Field-level rejections, at most one per field, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    fn push(&mut self, field: Field, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Returns the draft with title and body trimmed.
pub fn validate(draft: &RecordDraft) -> Result<RecordDraft, ValidationErrors> {
    let title = draft.title.trim();
    let body = draft.body.trim();
    let mut errors = ValidationErrors::default();

    if title.is_empty() {
        errors.push(Field::Title, "Title is required");
    } else if title.chars().count() < MIN_TITLE_CHARS {
        errors.push(Field::Title, "Title must be at least 3 characters");
    }

    if body.is_empty() {
        errors.push(Field::Body, "Content is required");
    } else if body.chars().count() < MIN_BODY_CHARS {
        errors.push(Field::Body, "Content must be at least 10 characters");
    }

    if draft.owner_id < 1 {
        errors.push(Field::UserId, "User ID is required");
    }

    if errors.is_empty() {
        Ok(RecordDraft::new(title, body, draft.owner_id))
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MutationError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("post {0} not found")]
    NotFound(RecordId),
    #[error("post {0} already exists")]
    Conflict(RecordId),
}

impl From<RemoteError> for MutationError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Transport(t) => Self::Transport(t),
            RemoteError::NotFound(id) => Self::NotFound(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationSuccess {
    Created(Record),
    Updated(Record),
    Deleted(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOutcome {
    Succeeded(MutationSuccess),
    Rejected(ValidationErrors),
    Failed(MutationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReport {
    pub kind: MutationKind,
    pub outcome: MutationOutcome,
}

impl MutationReport {
    #[must_use]
    pub fn new(kind: MutationKind, outcome: MutationOutcome) -> Self {
        Self { kind, outcome }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, MutationOutcome::Succeeded(_))
    }

    /// Banner text for the outcome.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.outcome {
            MutationOutcome::Succeeded(_) => {
                format!("Post {} successfully", self.kind.past_tense())
            }
            MutationOutcome::Rejected(errors) => errors.to_string(),
            MutationOutcome::Failed(e) => format!("Failed to {} post: {e}", self.kind.verb()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMutation {
    Create { draft: RecordDraft },
    Update { id: RecordId, draft: RecordDraft },
    Delete { id: RecordId },
}

impl PendingMutation {
    #[must_use]
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Create { .. } => MutationKind::Create,
            Self::Update { .. } => MutationKind::Update,
            Self::Delete { .. } => MutationKind::Delete,
        }
    }

    /// Applies a remote result; the cache is touched only on success.
    #[must_use]
    pub fn complete(self, cache: &mut Cache, result: HttpResult) -> MutationOutcome {
        let outcome = match self {
            Self::Create { draft } => complete_create(cache, &draft, result),
            Self::Update { id, draft } => complete_update(cache, id, &draft, result),
            Self::Delete { id } => complete_delete(cache, id, result),
        };
        match &outcome {
            MutationOutcome::Failed(e) => warn!(error = %e, "mutation failed"),
            _ => debug!("mutation applied"),
        }
        outcome
    }
}

fn complete_create(cache: &mut Cache, draft: &RecordDraft, result: HttpResult) -> MutationOutcome {
    let assigned = cache.next_id();
    let record = match collection::parse_created(result, draft, assigned) {
        Ok(record) => record,
        Err(e) => return MutationOutcome::Failed(e.into()),
    };
    match cache.record_added(record.clone()) {
        Ok(()) => MutationOutcome::Succeeded(MutationSuccess::Created(record)),
        Err(e) => {
            error!(error = %e, "freshly assigned id collided");
            MutationOutcome::Failed(MutationError::Conflict(record.id))
        }
    }
}

fn complete_update(
    cache: &mut Cache,
    id: RecordId,
    draft: &RecordDraft,
    result: HttpResult,
) -> MutationOutcome {
    match collection::parse_updated(result, id, draft) {
        Ok(record) => {
            cache.record_updated(record.clone());
            MutationOutcome::Succeeded(MutationSuccess::Updated(record))
        }
        Err(e) => MutationOutcome::Failed(e.into()),
    }
}

fn complete_delete(cache: &mut Cache, id: RecordId, result: HttpResult) -> MutationOutcome {
    match collection::parse_removed(result) {
        Ok(()) => {
            cache.record_removed(id);
            MutationOutcome::Succeeded(MutationSuccess::Deleted(id))
        }
        Err(e) => MutationOutcome::Failed(e.into()),
    }
}

/// In-flight mutations keyed by operation id.
#[derive(Debug, Default)]
pub struct PendingMutations {
    entries: HashMap<OpId, PendingMutation>,
}

impl PendingMutations {
    pub fn register(&mut self, mutation: PendingMutation) -> OpId {
        let op_id = OpId::generate();
        debug!(%op_id, kind = ?mutation.kind(), "mutation dispatched");
        self.entries.insert(op_id, mutation);
        op_id
    }

    /// `None` for unknown ids, e.g. completions that arrive after logout.
    pub fn take(&mut self, op_id: OpId) -> Option<PendingMutation> {
        let entry = self.entries.remove(&op_id);
        if entry.is_none() {
            debug!(%op_id, "completion for unknown operation ignored");
        }
        entry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_deleting(&self, id: RecordId) -> bool {
        self.entries
            .values()
            .any(|m| matches!(m, PendingMutation::Delete { id: pending } if *pending == id))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
