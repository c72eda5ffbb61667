use async_trait::async_trait;
use orion_security::RequestContext;

use crate::domain::{DomainError, ErrorSink};

/// Error sink that writes one structured event per failed request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

#[async_trait]
impl ErrorSink for TracingErrorSink {
    async fn record(&self, ctx: &RequestContext, error: &DomainError) -> anyhow::Result<()> {
        tracing::info!(
            target: "orion::errors",
            entity = ctx.entity(),
            user_id = ?ctx.user_id(),
            code = error.tag(),
            error = %error,
            "request failed"
        );
        Ok(())
    }
}
