use thiserror::Error;

/// Errors that can occur anywhere in the escherize pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EscherError {
    #[error("{0}")]
    InputRejected(String),

    #[error("{stage} failed: {message}")]
    ExternalCallFailed { stage: &'static str, message: String },

    #[error("malformed solver output: {0}")]
    MalformedSolverOutput(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("failed to load image: {0}")]
    Image(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`EscherError`], used for stage reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputRejected,
    ExternalCallFailed,
    MalformedSolverOutput,
    DegenerateGeometry,
}

impl EscherError {
    pub fn external(stage: &'static str, message: impl Into<String>) -> Self {
        EscherError::ExternalCallFailed {
            stage,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EscherError::InputRejected(_) => ErrorKind::InputRejected,
            EscherError::MalformedSolverOutput(_) => ErrorKind::MalformedSolverOutput,
            EscherError::DegenerateGeometry(_) => ErrorKind::DegenerateGeometry,
            EscherError::ExternalCallFailed { .. } | EscherError::Image(_) | EscherError::Io(_) => {
                ErrorKind::ExternalCallFailed
            }
        }
    }
}

impl From<image::ImageError> for EscherError {
    fn from(e: image::ImageError) -> Self {
        EscherError::Image(e.to_string())
    }
}

impl From<png::EncodingError> for EscherError {
    fn from(e: png::EncodingError) -> Self {
        EscherError::external("png encoding", e.to_string())
    }
}
