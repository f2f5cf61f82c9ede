//! Shared error type across Kataribe crates.

use thiserror::Error;

/// Machine-readable error codes carried on `rpc_err` envelopes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No descriptor or handler for the requested method.
    NotFound,
    /// Payload rejected by a contract validator.
    Validation,
    /// User handler returned an error.
    Handler,
    /// Pending call exceeded its timeout.
    Timeout,
    /// Runtime closed while the call was outstanding.
    Closed,
    /// Transport refused or failed the send.
    Transport,
    /// Malformed frame / invalid input.
    BadRequest,
    /// Internal runtime error.
    Internal,
}

impl ErrorCode {
    /// String representation used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Handler => "HANDLER",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Closed => "CLOSED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Inverse of [`ErrorCode::as_str`]; `None` for codes this runtime does
    /// not know.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NOT_FOUND" => Some(ErrorCode::NotFound),
            "VALIDATION" => Some(ErrorCode::Validation),
            "HANDLER" => Some(ErrorCode::Handler),
            "TIMEOUT" => Some(ErrorCode::Timeout),
            "CLOSED" => Some(ErrorCode::Closed),
            "TRANSPORT" => Some(ErrorCode::Transport),
            "BAD_REQUEST" => Some(ErrorCode::BadRequest),
            "INTERNAL" => Some(ErrorCode::Internal),
            _ => None,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, KataribeError>;

/// Unified error type used by core and runtime.
#[derive(Debug, Clone, Error)]
pub enum KataribeError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("rpc timed out: {0}")]
    Timeout(String),
    #[error("runtime closed")]
    Closed,
    #[error("transport: {0}")]
    Transport(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
    /// Error reported by the peer via an `rpc_err` envelope. Display is the
    /// peer's human-readable message verbatim.
    #[error("{message}")]
    Remote {
        code: Option<String>,
        message: String,
    },
}

impl KataribeError {
    /// Map internal error to a stable wire code. Remote errors pass the
    /// peer's code through; an absent or unrecognized code reads as
    /// `Internal`.
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            KataribeError::MethodNotFound(_) => ErrorCode::NotFound,
            KataribeError::Validation(_) => ErrorCode::Validation,
            KataribeError::Handler(_) => ErrorCode::Handler,
            KataribeError::Timeout(_) => ErrorCode::Timeout,
            KataribeError::Closed => ErrorCode::Closed,
            KataribeError::Transport(_) => ErrorCode::Transport,
            KataribeError::BadRequest(_) => ErrorCode::BadRequest,
            KataribeError::Internal(_) => ErrorCode::Internal,
            KataribeError::Remote { code, .. } => code
                .as_deref()
                .and_then(ErrorCode::parse)
                .unwrap_or(ErrorCode::Internal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_code_passes_through() {
        let err = KataribeError::Remote {
            code: Some("NOT_FOUND".into()),
            message: "Method not found: missing".into(),
        };
        assert_eq!(err.wire_code(), ErrorCode::NotFound);
    }

    #[test]
    fn absent_or_unknown_remote_code_reads_as_internal() {
        for code in [None, Some("EPHEMERAL_42".to_string())] {
            let err = KataribeError::Remote {
                code,
                message: "m".into(),
            };
            assert_eq!(err.wire_code(), ErrorCode::Internal);
        }
    }

    #[test]
    fn parse_is_the_inverse_of_as_str() {
        for code in [
            ErrorCode::NotFound,
            ErrorCode::Validation,
            ErrorCode::Handler,
            ErrorCode::Timeout,
            ErrorCode::Closed,
            ErrorCode::Transport,
            ErrorCode::BadRequest,
            ErrorCode::Internal,
        ] {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("nope"), None);
    }
}
