//! Per-request context threaded through the runtime gateway (spec §5
//! cancellation, §4.12 tracing).

use tokio_util::sync::CancellationToken;

/// Carries the trace id used for log correlation and the cancellation token
/// that lets a caller abort an in-flight completion, including mid-stream.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// A child token: cancelling `self` cancels every child, but cancelling
    /// a child never propagates back up.
    pub fn child_token(&self) -> CancellationToken {
        self.cancellation.child_token()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}
