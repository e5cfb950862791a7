//! Request/session correlation context for tracing spans.

use tracing::span::EnteredSpan;
use tracing::Span;
use uuid::Uuid;

/// Carries a correlation id and component/operation labels for a single
/// logical request, materialized as a `tracing` span.
///
/// # Example
///
/// ```
/// use opsagent_telemetry::RequestContext;
///
/// let ctx = RequestContext::new("agent_loop").with_operation("run_session");
/// let span = ctx.span();
/// let _guard = span.enter();
/// tracing::info!("iterating");
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: Uuid,
    component: String,
    operation: Option<String>,
}

impl RequestContext {
    /// Starts a context for `component`, minting a fresh correlation id.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            component: component.into(),
            operation: None,
        }
    }

    /// Labels the operation this context covers.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// The correlation id threaded through every span this context
    /// creates.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Builds the `tracing` span for this context. Entering it attaches
    /// `request_id`/`component`/`operation` fields to every event logged
    /// within.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or("-"),
        )
    }
}

/// An entered [`RequestContext`] span, dropped to exit it.
pub struct RequestGuard {
    _span: EnteredSpan,
}

impl RequestContext {
    /// Enters this context's span and returns a guard that exits it on
    /// drop.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard {
            _span: self.span().entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_a_stable_id_across_spans() {
        let ctx = RequestContext::new("agent_loop").with_operation("run_session");
        let id = ctx.id();
        let _guard = ctx.enter();
        assert_eq!(ctx.id(), id);
    }
}
