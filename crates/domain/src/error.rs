/// Shared error type used across every crate in the workspace.
///
/// Kinds map onto the taxonomy in the design doc's error handling
/// section: the orchestrator matches on these variants to decide
/// retry-ability and terminal-state mapping, it never inspects the
/// formatted message.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: String, to: String },

    #[error("lock acquire timed out after {0}ms")]
    AcquireTimeout(u64),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("max retries exceeded ({0} attempts)")]
    MaxRetriesExceeded(u32),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// A short, stable tag used by the Retry Engine's substring match
    /// against `retryableErrorKinds` (§4.4) — deliberately independent
    /// of the `Display` message, which may embed arbitrary text.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Http(_) => "http",
            Error::Timeout(_) => "timeout",
            Error::Provider { .. } => "provider",
            Error::Config(_) => "config",
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::AcquireTimeout(_) => "acquire_timeout",
            Error::Cancelled(_) => "cancelled",
            Error::MaxRetriesExceeded(_) => "max_retries_exceeded",
            Error::ToolExecution(_) => "tool_execution",
            Error::Other(_) => "other",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_stable_across_message_content() {
        let a = Error::Timeout("slow provider".into());
        let b = Error::Timeout("different message".into());
        assert_eq!(a.kind_tag(), b.kind_tag());
        assert_eq!(a.kind_tag(), "timeout");
    }

    #[test]
    fn is_cancelled_only_for_cancelled_variant() {
        assert!(Error::Cancelled("stop".into()).is_cancelled());
        assert!(!Error::Timeout("x".into()).is_cancelled());
    }
}
