// =============================================================================
// Error taxonomy for a single buy run
// =============================================================================
//
// Messages never carry credentials. Exchange response bodies are kept raw so
// a rejected order can be diagnosed from the log alone.
// =============================================================================

use thiserror::Error;

/// Everything that can stop a run before, during, or after order submission.
#[derive(Debug, Error)]
pub enum BotError {
    /// The symbol listing could not be fetched, or did not contain the pair
    /// with usable increments.
    #[error("symbol metadata not found for {pair}: {reason}")]
    MetadataNotFound { pair: String, reason: String },

    /// The feed token could not be obtained or the WebSocket would not open.
    #[error("market feed connection failed: {0}")]
    FeedConnectFailed(String),

    /// The feed opened but ended, errored, or sent something unusable before
    /// a price arrived.
    #[error("market feed protocol error: {0}")]
    FeedProtocolError(String),

    /// The computed order is not submittable (e.g. size rounds to zero).
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// The exchange answered, but not with HTTP 200 + code "200000".
    #[error("order rejected (HTTP {status}): {body}")]
    OrderRejected { status: u16, body: String },

    /// The order request never produced an exchange answer.
    #[error("order transport error: {0}")]
    OrderTransportError(String),
}

impl BotError {
    /// Process exit code for this failure.
    ///
    /// Rejections and transport failures get their own codes so monitoring
    /// can tell "exchange said no" from "request never landed".
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::OrderRejected { .. } => 2,
            Self::OrderTransportError(_) => 3,
            _ => 1,
        }
    }

    /// Whether the failure happened before any order could be sent.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::OrderRejected { .. } | Self::OrderTransportError(_)
        )
    }
}
