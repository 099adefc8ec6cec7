use eyre::Report;
use tokio_tungstenite::tungstenite;

/// Failure to turn raw account bytes into a duel record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed duel record: expected at least {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },
}

/// Anything that went wrong talking to the ledger.
///
/// The synchronizers never surface these to consumers: a failed attempt is logged and the
/// next poll or push event retries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid account data encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected rpc response: {0}")]
    UnexpectedResponse(String),
    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),
    #[error("push subscription channel closed")]
    SubscriptionClosed,
    #[error(transparent)]
    Internal(Report),
}

impl From<Report> for LedgerError {
    fn from(error: Report) -> Self {
        Self::Internal(error)
    }
}

impl LedgerError {
    /// Builds an error from a JSON-RPC `error` object.
    pub(crate) fn from_rpc_error(error: &serde_json::Value) -> Self {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        Self::Rpc { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_error_extraction() {
        let err = LedgerError::from_rpc_error(&json!({"code": -32602, "message": "Invalid param"}));
        match err {
            LedgerError::Rpc { code, message } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Invalid param");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_record_message() {
        let err = DecodeError::MalformedRecord { expected: 190, actual: 12 };
        assert_eq!(err.to_string(), "malformed duel record: expected at least 190 bytes, got 12");
    }
}
