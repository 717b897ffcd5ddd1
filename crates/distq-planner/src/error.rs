use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid plan: {0}")]
    Invalid(String),
}

impl PlanError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        PlanError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

impl From<distq_core::Error> for PlanError {
    fn from(e: distq_core::Error) -> Self {
        PlanError::Schema(e.to_string())
    }
}

impl From<distq_operators::OpError> for PlanError {
    fn from(e: distq_operators::OpError) -> Self {
        match e {
            distq_operators::OpError::Schema(m) => PlanError::Schema(m),
            other => PlanError::Invalid(other.to_string()),
        }
    }
}
