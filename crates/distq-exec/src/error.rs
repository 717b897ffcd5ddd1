use thiserror::Error;
use tokio_util::codec::LinesCodecError;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("worker {worker}: {message}")]
    Worker { worker: String, message: String },

    #[error("worker {worker} timed out after {after_ms} ms")]
    Timeout { worker: String, after_ms: u64 },

    #[error("plan: {0}")]
    Plan(#[from] distq_planner::PlanError),

    #[error("operator: {0}")]
    Operator(#[from] distq_operators::OpError),

    #[error("catalog: {0}")]
    Catalog(#[from] distq_io::IoError),

    #[error("config: {0}")]
    Config(String),

    #[error("aborted: {0}")]
    Aborted(String),
}

impl From<LinesCodecError> for ExecError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::MaxLineLengthExceeded => {
                ExecError::Protocol("frame exceeds the configured maximum length".into())
            }
            LinesCodecError::Io(e) => ExecError::Io(e),
        }
    }
}

impl From<tokio::task::JoinError> for ExecError {
    fn from(e: tokio::task::JoinError) -> Self {
        ExecError::Aborted(e.to_string())
    }
}
