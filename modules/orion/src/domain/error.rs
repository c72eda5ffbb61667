use orion_db::DbError;
use orion_errors::{ErrorKind, Problem, ValidationViolation};
use orion_query::QueryError;
use thiserror::Error;

/// Request-facing failures of the entity service.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: i64 },

    #[error("{field} '{value}' already exists")]
    Conflict { field: String, value: String },

    #[error("Query execution failed: {0}")]
    Database(#[from] DbError),

    #[error("Asset storage failed: {0}")]
    AssetStorage(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id,
        }
    }

    pub fn conflict(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn asset_storage(message: impl Into<String>) -> Self {
        Self::AssetStorage(message.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Query(_) | DomainError::Validation { .. } => ErrorKind::BadRequest,
            DomainError::Unauthorized(_) => ErrorKind::Unauthorized,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict { .. } => ErrorKind::Conflict,
            DomainError::Database(_) | DomainError::AssetStorage(_) => ErrorKind::StorageBackend,
        }
    }

    /// Opaque correlation tag, e.g. `ORION_NOT_FOUND`.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.kind().tag()
    }

    /// RFC 9457 body for this error. Backend details stay in the logs.
    #[must_use]
    pub fn to_problem(&self) -> Problem {
        let problem = self.kind().def().as_problem(self.to_string());
        if problem.is_server_error() {
            tracing::error!(error = %self, "storage backend failure");
            return Problem {
                detail: "The request could not be completed".to_owned(),
                ..problem
            };
        }
        match self {
            DomainError::Validation { field, message } => problem
                .with_violation(ValidationViolation::new(field.as_str(), message.as_str())),
            _ => problem,
        }
    }

    /// [`Self::to_problem`] with the request path and the current span id
    /// attached.
    #[must_use]
    pub fn to_problem_at(&self, instance: &str) -> Problem {
        let trace_id = tracing::Span::current()
            .id()
            .map(|id| id.into_u64().to_string());
        self.to_problem().at(instance, trace_id)
    }
}

impl From<DomainError> for Problem {
    fn from(e: DomainError) -> Self {
        e.to_problem()
    }
}
