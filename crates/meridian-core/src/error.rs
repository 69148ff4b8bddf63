use thiserror::Error;

/// Failure classes for model calls. Each maps to a stable safety flag that
/// downstream fallbacks key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelErrorKind {
    /// Credentials rejected (401/403).
    AuthError,
    /// The configured model name does not exist (404).
    ModelNotFound,
    /// Provider rate limit hit (429).
    RateLimited,
    /// Any other non-success provider reply.
    ProviderError,
    /// Transport failure, timeout, or unparseable reply.
    Unavailable,
}

impl ModelErrorKind {
    /// The response flag emitted when a coaching answer falls back
    /// because of this failure.
    pub fn flag(&self) -> &'static str {
        match self {
            ModelErrorKind::AuthError => "llm_auth_error",
            ModelErrorKind::ModelNotFound => "llm_model_not_found",
            ModelErrorKind::RateLimited => "llm_rate_limited",
            ModelErrorKind::ProviderError => "llm_provider_error",
            ModelErrorKind::Unavailable => "llm_unavailable",
        }
    }

    /// Classify an HTTP status from a model provider.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ModelErrorKind::AuthError,
            404 => ModelErrorKind::ModelNotFound,
            429 => ModelErrorKind::RateLimited,
            _ => ModelErrorKind::ProviderError,
        }
    }
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.flag())
    }
}

/// Top-level error type for Meridian.
#[derive(Debug, Error)]
pub enum MeridianError {
    /// Error from a model provider, classified by kind.
    #[error("model error ({kind}): {message}")]
    Model {
        kind: ModelErrorKind,
        status: Option<u16>,
        message: String,
    },

    /// Storage error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Rejected input (out-of-range metric, empty question, bad enum value).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MeridianError {
    /// Shorthand for a model error without an HTTP status.
    pub fn model(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        MeridianError::Model {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// The model failure kind, if this is a model error.
    pub fn model_kind(&self) -> Option<ModelErrorKind> {
        match self {
            MeridianError::Model { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
