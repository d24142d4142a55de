use crate::narrative::NarrativeError;
use longchart_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a narrative backend is required to build a {0}")]
    MissingNarrativeBackend(&'static str),
    #[error("failed to read knowledge base file: {0}")]
    KnowledgeBaseRead(std::io::Error),
    #[error("knowledge base schema mismatch at {path}: {message}")]
    KnowledgeBase { path: String, message: String },
    #[error("knowledge base is inconsistent: {0}")]
    KnowledgeBaseInconsistent(String),
    #[error("narrative backend error: {0}")]
    Narrative(#[from] NarrativeError),
    #[error("failed to serialize chart: {0}")]
    Serialization(serde_json::Error),
    #[error("invalid text: {0}")]
    Text(#[from] TextError),
}

pub type ChartResult<T> = std::result::Result<T, ChartError>;
