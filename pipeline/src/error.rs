//! Error taxonomy for a digest run.
//!
//! | Error             | Scope      | Recovery                                   |
//! |-------------------|------------|--------------------------------------------|
//! | `FetchError`      | one item   | placeholder / empty data, run continues    |
//! | `GenerationError` | one call   | retried by the retry controller            |
//! | `FormattingError` | one item   | raw summary kept in a fallback block       |
//! | `FatalError`      | whole run  | none; the caller gets no report            |

use thiserror::Error;

/// A tracker request for an item, its links or its history failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("tracker returned {status} for {what}: {body}")]
    Http {
        what: String,
        status: u16,
        body: String,
    },

    #[error("tracker request for {what} failed: {message}")]
    Transport { what: String, message: String },

    #[error("could not decode tracker response for {what}: {message}")]
    Decode { what: String, message: String },

    #[error("tracker authentication failed: {0}")]
    Auth(String),
}

/// The generation backend failed to produce a usable summary.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Backend could not be reached (refused, reset, timed out).
    #[error("connection to generation backend failed: {0}")]
    Unreachable(String),

    /// Backend answered with a non-success status.
    #[error("generation backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    /// Backend answered but the payload had an unexpected shape.
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    /// Backend answered with no text content.
    #[error("no response content received from model")]
    EmptyResponse,

    /// The configured model is missing or failed its warm-up request.
    #[error("model {model} is not ready: {reason}")]
    ModelNotReady { model: String, reason: String },
}

impl GenerationError {
    /// Whether the failure looks like a dropped or refused connection.
    ///
    /// Connection trouble stretches the delay before the next attempt.
    pub fn is_connection_issue(&self) -> bool {
        if matches!(self, Self::Unreachable(_)) {
            return true;
        }
        let message = self.to_string().to_lowercase();
        message.contains("disconnected") || message.contains("connection")
    }
}

/// A successful summary could not be turned into a structured block.
#[derive(Debug, Error)]
pub enum FormattingError {
    #[error("summary for work item {item_id} has no recognizable sections")]
    EmptyBody { item_id: u64 },
}

/// Terminal failure that aborts the whole run.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(
        "summary generation failed after {attempts} attempts for work item {item_id}: {last_error}"
    )]
    RetriesExhausted {
        item_id: u64,
        attempts: u32,
        #[source]
        last_error: GenerationError,
    },
}

impl FatalError {
    pub fn item_id(&self) -> u64 {
        match self {
            Self::RetriesExhausted { item_id, .. } => *item_id,
        }
    }
}
