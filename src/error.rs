use std::fmt;
use std::io;

use thiserror::Error;

/// Fatal failures. Any of these aborts the run before an artifact is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("worker for chunk {chunk} failed: {reason}")]
    Worker { chunk: usize, reason: String },
    #[error("chunk out of order: expected start {expected}, found {found}")]
    ChunkOrder { expected: usize, found: usize },
    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("stopword file {path}: {reason}")]
    Stopwords { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Per-message failure reported by an [`Annotator`](crate::annotate::Annotator).
/// Always recovered by the pipeline.
#[derive(Debug, Clone, Error)]
pub enum AnnotationError {
    #[error("annotator unavailable: {0}")]
    Unavailable(String),
    #[error("annotation failed: {0}")]
    Failed(String),
}

/// Non-fatal issue recorded while processing. The run continues with a safe default.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Timestamp could not be parsed and was set to 0.
    TimestampParse { index: usize, raw: String },
    /// Annotation failed; message kept as neutral without keywords.
    Annotation { index: usize, reason: String },
    /// Filtering removed every message.
    EmptyResult,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TimestampParse { index, raw } => {
                write!(f, "message {index}: unable to parse timestamp {raw:?}, using 0")
            }
            Diagnostic::Annotation { index, reason } => {
                write!(f, "message {index}: annotation failed ({reason}), using neutral")
            }
            Diagnostic::EmptyResult => write!(f, "no messages left after filtering"),
        }
    }
}
