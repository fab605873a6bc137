use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Entities persisted by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Template,
    Canvas,
    Chart,
    Measurement,
    Dashboard,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Template => "template",
            EntityKind::Canvas => "canvas",
            EntityKind::Chart => "chart",
            EntityKind::Measurement => "measurement",
            EntityKind::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database operations carried as error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Select,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Select => "select",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Failures of the persistence core.
///
/// Every variant surfaces to the caller; nothing is swallowed locally.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input rejected before any statement was sent
    #[error("invalid {entity} input at '{path}': {message}")]
    Validation {
        entity: EntityKind,
        path: String,
        message: String,
    },

    /// No transactional handle could be obtained from the pool
    #[error("could not acquire a transaction: {source}")]
    Acquisition {
        #[source]
        source: sqlx::Error,
    },

    /// A single insert/update/delete/select failed
    #[error("{op} {entity}{} failed: {source}", describe_target(.id, .path))]
    Persistence {
        entity: EntityKind,
        op: Operation,
        id: Option<Uuid>,
        path: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    /// All writes succeeded but the commit itself failed; outcome on the server is unknown
    #[error("transaction commit failed: {source}")]
    Commit {
        #[source]
        source: sqlx::Error,
    },

    /// Update/delete/read targeted an identifier that does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: Uuid },

    /// The caller's deadline expired while the transaction was in flight
    #[error("operation cancelled after {after:?}; transaction rolled back")]
    Cancelled { after: Duration },
}

fn describe_target(id: &Option<Uuid>, path: &Option<String>) -> String {
    match (id, path) {
        (Some(id), Some(path)) => format!(" {} at {}", id, path),
        (Some(id), None) => format!(" {}", id),
        (None, Some(path)) => format!(" at {}", path),
        (None, None) => String::new(),
    }
}

impl StoreError {
    pub fn validation(entity: EntityKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation {
            entity,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn persistence(entity: EntityKind, op: Operation, source: sqlx::Error) -> Self {
        StoreError::Persistence {
            entity,
            op,
            id: None,
            path: None,
            source,
        }
    }

    /// Attach the target identifier to a persistence failure
    pub fn with_id(mut self, target: Uuid) -> Self {
        if let StoreError::Persistence { id, .. } = &mut self {
            *id = Some(target);
        }
        self
    }

    /// Attach the position inside a template tree to a persistence failure
    pub fn at(mut self, tree_path: impl Into<String>) -> Self {
        if let StoreError::Persistence { path, .. } = &mut self {
            *path = Some(tree_path.into());
        }
        self
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Postgres SQLSTATE of the underlying driver error, if any
    pub fn sql_state(&self) -> Option<String> {
        match self {
            StoreError::Persistence { source, .. }
            | StoreError::Commit { source }
            | StoreError::Acquisition { source } => source
                .as_database_error()
                .and_then(|e| e.code())
                .map(|c| c.into_owned()),
            _ => None,
        }
    }
}

/// Rows touched by an update or delete. Zero means the identifier was not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Affected(pub u64);

impl Affected {
    pub fn rows(&self) -> u64 {
        self.0
    }

    pub fn is_not_found(&self) -> bool {
        self.0 == 0
    }

    /// Treat zero affected rows as a hard `NotFound` error
    pub fn or_not_found(self, entity: EntityKind, id: Uuid) -> Result<u64, StoreError> {
        if self.is_not_found() {
            Err(StoreError::NotFound { entity, id })
        } else {
            Ok(self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_message_includes_target_and_path() {
        let id = Uuid::nil();
        let err = StoreError::persistence(EntityKind::Chart, Operation::Create, sqlx::Error::RowNotFound)
            .with_id(id)
            .at("canvases[0].charts[1]");
        let msg = err.to_string();
        assert!(msg.starts_with("create chart 00000000-0000-0000-0000-000000000000 at canvases[0].charts[1]"));
    }

    #[test]
    fn context_helpers_ignore_other_variants() {
        let err = StoreError::NotFound { entity: EntityKind::Canvas, id: Uuid::nil() }.at("x");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "canvas 00000000-0000-0000-0000-000000000000 not found");
    }

    #[test]
    fn zero_affected_rows_is_not_found() {
        let id = Uuid::new_v4();
        assert!(Affected(0).is_not_found());
        assert!(Affected(0).or_not_found(EntityKind::Template, id).unwrap_err().is_not_found());
        assert_eq!(Affected(1).or_not_found(EntityKind::Template, id).unwrap(), 1);
    }
}
