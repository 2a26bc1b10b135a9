use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("not found")]
    NotFound,

    #[error("persistence backend error: {0}")]
    Backend(String),
}
