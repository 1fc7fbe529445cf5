use uuid::Uuid;

/// Failures surfaced by the stores and repositories.
///
/// Validation and not-found are checked before any repository call, so a
/// mutation that returns either of them has not touched the collection.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("persistence failure: {source}")]
    Persistence {
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn task_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "task", id }
    }

    pub fn category_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "category",
            id,
        }
    }

    pub fn persistence(source: impl Into<anyhow::Error>) -> Self {
        Self::Persistence {
            source: source.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
