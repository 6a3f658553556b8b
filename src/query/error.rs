use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid sort direction: {0}")]
    InvalidDirection(String),

    #[error("$in requires at least one value")]
    EmptyIn,

    #[error("Invalid page: {0}")]
    InvalidPage(String),
}
