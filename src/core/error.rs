use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("no regional configuration for region `{0}`")]
    ConfigNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("simulation cancelled after {completed_years} of {requested_years} years")]
    Cancelled {
        completed_years: u32,
        requested_years: u32,
    },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

pub(crate) fn invalid(msg: impl Into<String>) -> ProjectionError {
    ProjectionError::InvalidInput(msg.into())
}
