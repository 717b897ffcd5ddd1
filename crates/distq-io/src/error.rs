use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("catalog yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("catalog: {0}")]
    Catalog(String),

    #[error("schema: {0}")]
    Schema(String),
}

impl From<distq_core::Error> for IoError {
    fn from(e: distq_core::Error) -> Self {
        IoError::Schema(e.to_string())
    }
}

impl From<IoError> for distq_operators::OpError {
    fn from(e: IoError) -> Self {
        distq_operators::OpError::Source(e.to_string())
    }
}
