pub mod types;
pub mod image_codec;
pub mod schema;
pub mod prompt;
pub mod gemini_types;
pub mod gemini;
pub mod extract;
pub mod normalize;
pub mod orchestrator;

pub use types::*;
pub use image_codec::*;
pub use prompt::*;
pub use gemini::*;
pub use extract::*;
pub use normalize::*;
pub use orchestrator::*;

use thiserror::Error;

/// Everything that can go wrong during one analysis attempt.
///
/// The variants are kept distinct for logs; users only ever see
/// [`AnalysisFailure`]'s generic message.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Image could not be read: {0}")]
    DecodeError(String),

    #[error("Inference service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Inference service rejected the request (status {status}): {message}")]
    RequestRejected { status: u16, message: String },

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DecodeError(_) => FailureKind::Decode,
            Self::ServiceUnavailable(_) => FailureKind::ServiceUnavailable,
            Self::RequestRejected { .. } => FailureKind::RequestRejected,
            Self::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }

    /// Transport-level failures are the only ones worth repeating unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}
