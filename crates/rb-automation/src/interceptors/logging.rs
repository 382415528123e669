//! Structured logging around every evaluation

use async_trait::async_trait;
use rb_core::EventContext;
use tracing::{debug, trace};

use crate::error::EvalResult;
use crate::kind::Stage;
use crate::pipeline::{Interceptor, Invocation, Next};

/// Priority of the logging interceptor
pub const LOGGING_PRIORITY: i32 = 300;

/// Logs each evaluation and its outcome
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl<S: Stage> Interceptor<S> for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    fn priority(&self) -> i32 {
        LOGGING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, S>,
        next: Next<'_, S>,
    ) -> EvalResult<S::Output> {
        let execution_id = invocation.scope.execution_id();
        trace!(
            stage = S::NAME,
            block = invocation.type_tag,
            execution_id,
            params = %invocation.params,
            "Evaluating"
        );

        let outcome = next.proceed(ctx, invocation).await;
        match &outcome {
            Ok(output) => debug!(
                stage = S::NAME,
                block = invocation.type_tag,
                execution_id,
                output = ?output,
                "Evaluated"
            ),
            Err(e) => debug!(
                stage = S::NAME,
                block = invocation.type_tag,
                execution_id,
                error = %e,
                "Evaluation failed"
            ),
        }
        outcome
    }
}
