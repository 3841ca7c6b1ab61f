pub type MarkerResult<T> = Result<T, MarkerError>;

#[derive(thiserror::Error, Debug)]
pub enum MarkerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error (frame {frame}): {message}")]
    Render { frame: u64, message: String },

    #[error("serialization error: {0}")]
    Serde(String),

    #[error("cancelled after {completed} frame(s)")]
    Cancelled { completed: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MarkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(frame: u64, msg: impl Into<String>) -> Self {
        Self::Render {
            frame,
            message: msg.into(),
        }
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Frame index carried by a render failure, if any.
    pub fn frame(&self) -> Option<u64> {
        match self {
            Self::Render { frame, .. } => Some(*frame),
            _ => None,
        }
    }
}
