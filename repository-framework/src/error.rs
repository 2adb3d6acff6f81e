use sea_orm::DbErr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the repository layer. Adapters above map these to
/// transport responses; nothing here is retried internally. Database
/// constraint violations propagate through the `Db` variant and roll the
/// owning unit of work back.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("invalid filter keys: {}", invalid_filters.join(", "))]
    FilterValidation {
        invalid_filters: Vec<String>,
        suggested_filters: Vec<String>,
        correlation_id: Option<Uuid>,
    },
    #[error("filter not allowed: {0}")]
    FilterNotAllowed(String),
    #[error("entity {id} not found")]
    EntityNotFound {
        id: String,
        correlation_id: Option<Uuid>,
    },
    #[error("multiple entities found for id {id}")]
    MultipleEntitiesFound {
        id: String,
        correlation_id: Option<Uuid>,
    },
    #[error("failed to join tables for chain [{chain}]")]
    Join {
        chain: String,
        correlation_id: Option<Uuid>,
    },
    #[error("failed to map row {index} (id {id:?}) to a domain entity: {message}")]
    EntityMapping {
        id: Option<String>,
        index: usize,
        message: String,
        correlation_id: Option<Uuid>,
    },
    #[error("query execution failed: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        elapsed: Option<Duration>,
        timed_out: bool,
        correlation_id: Option<Uuid>,
    },
    #[error("cannot persist entity {id} unknown to this repository; add() or read it first")]
    EntityNotTracked { id: String },
    #[error("{operator} cannot be applied: {reason}")]
    OperatorContract {
        operator: &'static str,
        reason: String,
    },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("invalid query construction: {0}")]
    InvalidQuery(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
    #[error("db error: {0}")]
    Db(#[from] DbErr),
}

impl RepositoryError {
    /// Stamp the owning repository's correlation id onto variants that
    /// carry one and were raised without it (validator, operators, the
    /// query builder). Errors already stamped keep their original id.
    pub(crate) fn with_correlation(mut self, id: Uuid) -> Self {
        match &mut self {
            RepositoryError::FilterValidation { correlation_id, .. }
            | RepositoryError::EntityNotFound { correlation_id, .. }
            | RepositoryError::MultipleEntitiesFound { correlation_id, .. }
            | RepositoryError::Join { correlation_id, .. }
            | RepositoryError::EntityMapping { correlation_id, .. }
            | RepositoryError::Query { correlation_id, .. } => {
                correlation_id.get_or_insert(id);
            }
            _ => {}
        }
        self
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            RepositoryError::FilterValidation { correlation_id, .. }
            | RepositoryError::EntityNotFound { correlation_id, .. }
            | RepositoryError::MultipleEntitiesFound { correlation_id, .. }
            | RepositoryError::Join { correlation_id, .. }
            | RepositoryError::EntityMapping { correlation_id, .. }
            | RepositoryError::Query { correlation_id, .. } => *correlation_id,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_is_stamped_once() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let err = RepositoryError::EntityNotFound {
            id: "t-1".into(),
            correlation_id: None,
        };
        let err = err.with_correlation(first).with_correlation(second);
        assert_eq!(err.correlation_id(), Some(first));
    }

    #[test]
    fn validation_error_message_lists_offenders() {
        let err = RepositoryError::FilterValidation {
            invalid_filters: vec!["colour".into(), "shape".into()],
            suggested_filters: vec![],
            correlation_id: None,
        };
        assert_eq!(err.to_string(), "invalid filter keys: colour, shape");
    }
}
