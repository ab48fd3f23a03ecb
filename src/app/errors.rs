//! Failure classification for pipeline hops.
//!
//! Every hop answer is turned into a [`ResponseClass`] by status code alone.
//! Terminal failures become a [`PipelineFailure`]; whether a failure reaches
//! the user is decided once, by the orchestrator, from
//! [`PipelineFailure::is_user_visible`].

use super::http_requester::HttpResponse;
use super::pipeline::PipelineStage;
use thiserror::Error;

/// Transport-level non-response.
pub const STATUS_UNREACHABLE: u16 = 0;
pub const STATUS_OK: u16 = 200;
pub const STATUS_STALE_SESSION: u16 = 400;
pub const STATUS_ROLE_NOT_FOUND: u16 = 500;

/// How a single response is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    Success(String),
    /// The upstream session must be cleared and the hop retried.
    StaleSession,
    Unreachable,
    RoleNotFound,
    /// Anything else. Dropped without a success or error signal.
    Unclassified(u16),
}

impl From<HttpResponse> for ResponseClass {
    fn from(response: HttpResponse) -> Self {
        match response.status {
            STATUS_OK => ResponseClass::Success(response.body),
            STATUS_STALE_SESSION => ResponseClass::StaleSession,
            STATUS_UNREACHABLE => ResponseClass::Unreachable,
            STATUS_ROLE_NOT_FOUND => ResponseClass::RoleNotFound,
            other => ResponseClass::Unclassified(other),
        }
    }
}

/// Terminal failure of a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineFailure {
    #[error("The instance metadata service could not be reached.")]
    Unreachable,

    #[error("Cannot find IAM role. Are you on a machine with an instance profile?")]
    RoleNotFound,

    #[error("Unexpected response while {stage}: {reason}")]
    MalformedResponse { stage: PipelineStage, reason: String },

    #[error("Logout request failed with status {status}")]
    LogoutFailed { status: u16 },
}

impl PipelineFailure {
    /// Only these two are ever shown to the user, and only for foreground runs.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            PipelineFailure::Unreachable | PipelineFailure::RoleNotFound
        )
    }

    pub fn malformed(stage: PipelineStage, reason: impl ToString) -> Self {
        PipelineFailure::MalformedResponse {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Why a hop did not produce a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    /// The hop ran past the retry ceiling; start over from the first hop.
    Restart,
    Failed(PipelineFailure),
    /// Unclassified status. The run ends with no signal.
    Dropped { status: u16 },
}

impl From<PipelineFailure> for Interruption {
    fn from(failure: PipelineFailure) -> Self {
        Interruption::Failed(failure)
    }
}
