use crate::diagnostics::DiagnosticMessage;
use std::error::Error as StdError;
use thiserror::Error;

/// The single error boundary type for the ingestion pipeline (spec.md §7).
///
/// Every fallible operation in `core/*` returns `Result<_, IngestError>`.
/// Only the RPC layer (`core/server`) maps this down to a status code.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid argument: {context}")]
    InvalidArgument { context: DiagnosticMessage },

    #[error("recoverable: {context}")]
    Recoverable { context: DiagnosticMessage },

    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("crypto error: {context}")]
    Crypto { context: DiagnosticMessage },

    #[error("warehouse error: {context}")]
    Warehouse {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("precondition failed: {context}")]
    Precondition { context: DiagnosticMessage },

    #[error("internal error: {context}")]
    Internal { context: DiagnosticMessage },
}

impl IngestError {
    #[track_caller]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self::Recoverable {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: DiagnosticMessage::new(message.into()),
            source: Some(source),
        }
    }

    #[track_caller]
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn warehouse(message: impl Into<String>) -> Self {
        Self::Warehouse {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    /// Classification used by the RPC boundary (spec.md §7).
    pub fn rpc_code(&self) -> RpcCode {
        match self {
            IngestError::InvalidArgument { .. } => RpcCode::InvalidArgument,
            IngestError::Warehouse { .. } | IngestError::Io { .. } | IngestError::Crypto { .. } => {
                RpcCode::Internal
            }
            IngestError::Internal { .. } => RpcCode::Internal,
            // Recoverable and Precondition carry actionable guidance; the
            // server still reports them as failures in the response body.
            IngestError::Recoverable { .. } | IngestError::Precondition { .. } => RpcCode::Internal,
        }
    }

    /// This error's message, truncated to fit an RPC header (spec.md §7,
    /// §8). The transport that actually carries a header is out of scope
    /// (spec.md §1); this is the boundary-safe rendering every caller that
    /// forwards an error upward is expected to use.
    pub fn header_message(&self) -> String {
        truncate_for_grpc_header(&self.to_string(), GRPC_HEADER_BYTE_BUDGET)
    }
}

/// Conservative byte budget for a single gRPC metadata value (matches the
/// ~8 KiB ceiling `md_error.cpp::truncate_for_grpc_header` targets upstream).
pub const GRPC_HEADER_BYTE_BUDGET: usize = 8192;

impl From<std::io::Error> for IngestError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        IngestError::Io {
            context: DiagnosticMessage::new(message),
            source: Some(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    Ok,
    InvalidArgument,
    Internal,
}

/// Truncates `message` so it fits within `max_bytes` once UTF-8 encoded,
/// never splitting a codepoint, and appends `"...[truncated]"` when
/// truncation actually occurred (spec.md §7, §8).
pub fn truncate_for_grpc_header(message: &str, max_bytes: usize) -> String {
    const SUFFIX: &str = "...[truncated]";

    if message.len() <= max_bytes {
        return message.to_string();
    }

    let budget = max_bytes.saturating_sub(SUFFIX.len());
    let mut boundary = budget.min(message.len());
    while boundary > 0 && !message.is_char_boundary(boundary) {
        boundary -= 1;
    }

    let mut truncated = message[..boundary].to_string();
    truncated.push_str(SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_messages_untouched() {
        let msg = "short message";
        assert_eq!(truncate_for_grpc_header(msg, 100), msg);
    }

    #[test]
    fn truncate_appends_suffix_when_exceeding_budget() {
        let msg = "a".repeat(200);
        let truncated = truncate_for_grpc_header(&msg, 64);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.len() <= 64);
    }

    #[test]
    fn truncate_never_splits_a_utf8_codepoint() {
        let msg = "日".repeat(50); // each char is 3 bytes in UTF-8
        let truncated = truncate_for_grpc_header(&msg, 20);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
    }

    #[test]
    fn constructors_carry_the_given_message() {
        let err = IngestError::invalid_argument("missing motherduck_token");
        assert_eq!(err.to_string(), "invalid argument: missing motherduck_token");
        assert_eq!(err.rpc_code(), RpcCode::InvalidArgument);
    }

    #[test]
    fn header_message_truncates_to_the_grpc_budget() {
        let err = IngestError::warehouse("x".repeat(GRPC_HEADER_BYTE_BUDGET * 2));
        let header = err.header_message();
        assert!(header.len() <= GRPC_HEADER_BYTE_BUDGET);
        assert!(header.ends_with("...[truncated]"));
    }
}
