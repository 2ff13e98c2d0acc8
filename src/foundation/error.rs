/// Convenience result type used across scimovie.
pub type MovieResult<T> = Result<T, MovieError>;

/// Top-level error taxonomy used by the movie pipeline.
#[derive(thiserror::Error, Debug)]
pub enum MovieError {
    /// A run request failed preflight checks (no target, bad encoder path, bad output dir).
    #[error("validation error: {0}")]
    Validation(String),

    /// A required resource file was missing or could not be decoded.
    #[error("resource error: {0}")]
    Resource(String),

    /// The animation script could not run or failed while running.
    #[error("script error: {0}")]
    Script(String),

    /// Frame capture or encoder invocation failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Errors when serializing or deserializing settings and scripts.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MovieError {
    /// Build a [`MovieError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MovieError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`MovieError::Script`] value.
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }

    /// Build a [`MovieError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`MovieError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for preflight failures, which never change session state.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<serde_json::Error> for MovieError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
