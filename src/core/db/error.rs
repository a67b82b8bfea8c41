use thiserror::Error;

/// Failure taxonomy of the repository layer. Repositories never panic across
/// the public boundary; every method returns `Result<_, StoreError>`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists ({reason})")]
    AlreadyExists { entity: &'static str, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Classify an insert failure: unique-constraint violations become
    /// `AlreadyExists`, everything else passes through as `Storage` with the
    /// engine's message kept verbatim.
    pub(crate) fn from_insert(entity: &'static str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists {
                entity,
                reason: db.message().to_string(),
            },
            _ => StoreError::Storage(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

/// Structured validation faults. Validators are total: any input yields
/// success or one of these, never a panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("invalid value `{value}` for field `{field}`")]
    InvalidEnum { field: &'static str, value: String },
}
