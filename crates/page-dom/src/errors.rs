use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("invalid page fixture: {0}")]
    InvalidFixture(String),
    #[error("failed to read page fixture: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DomError {
    fn from(value: serde_json::Error) -> Self {
        DomError::InvalidFixture(value.to_string())
    }
}
