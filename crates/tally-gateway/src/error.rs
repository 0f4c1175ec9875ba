use std::fmt;

use serde::{Deserialize, Serialize};
use tally_reconcile::TransitionError;

/// Stable error body of every failed request.
///
/// `reference` is machine-readable (`"AlreadyClaimed"`, `"EntryNotFound"`,
/// ...); `error` is for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fatal: bool,
    pub reference: String,
}

impl ErrorResponse {
    pub fn new(reference: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fatal: false,
            reference: reference.into(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Already claimed / already finalized / out of sequence. Terminal for
    /// this attempt; never retried.
    #[error("conflict: {0}")]
    Conflict(ErrorResponse),

    /// 5xx, timeout, connection failure. Nothing changed remotely; safe to
    /// retry.
    #[error("transport error: {0}")]
    Transport(String),

    /// Recoverable refusal: keep the session, show the message.
    #[error("rejected: {0}")]
    Rejected(ErrorResponse),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("fatal: {0}")]
    Fatal(ErrorResponse),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            GatewayError::Conflict(e) | GatewayError::Rejected(e) | GatewayError::Fatal(e) => {
                Some(&e.reference)
            }
            GatewayError::Transport(_) | GatewayError::Decode(_) => None,
        }
    }

    pub(crate) fn not_found(polling_station_id: u32) -> Self {
        GatewayError::Rejected(ErrorResponse::new(
            "EntryNotFound",
            format!("polling station {polling_station_id} not found"),
        ))
    }
}

impl From<TransitionError> for GatewayError {
    fn from(e: TransitionError) -> Self {
        GatewayError::Conflict(ErrorResponse::new(e.kind.as_str(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_reconcile::ConflictKind;

    #[test]
    fn only_transport_is_retryable() {
        assert!(GatewayError::Transport("timeout".into()).is_retryable());
        assert!(!GatewayError::Conflict(ErrorResponse::new("AlreadyClaimed", "x")).is_retryable());
        assert!(!GatewayError::Rejected(ErrorResponse::new("InvalidData", "x")).is_retryable());
        assert!(!GatewayError::Decode("x".into()).is_retryable());
    }

    #[test]
    fn transition_errors_become_conflicts_with_kind_as_reference() {
        let err: GatewayError = TransitionError {
            kind: ConflictKind::AlreadyFinalized,
            from: "definitive",
            event: "claim(1, anna)".to_string(),
        }
        .into();
        assert_eq!(err.reference(), Some("AlreadyFinalized"));
        assert!(matches!(err, GatewayError::Conflict(_)));
    }

    #[test]
    fn error_response_shape_is_stable() {
        let body = serde_json::to_value(ErrorResponse::new("AlreadyClaimed", "taken")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": "taken", "fatal": false, "reference": "AlreadyClaimed"})
        );
    }
}
