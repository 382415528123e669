//! Template substitution in block parameters

use async_trait::async_trait;
use rb_core::EventContext;
use rb_template::{contains_template, render_value, TemplateRegistry};
use std::sync::Arc;
use tracing::trace;

use crate::error::EvalResult;
use crate::kind::BlockKind;
use crate::pipeline::{Interceptor, Invocation, Next};

/// Priority of the templating interceptor
pub const TEMPLATING_PRIORITY: i32 = 400;

/// Renders `{{ }}` expressions in block parameters
///
/// Parameters are rendered against the current metadata (plus the event
/// under `event`) right before the block runs, so values written by
/// earlier variables and actions are visible. The engine comes from the
/// automation's `template_engine` option or the registry default. Blocks
/// that evaluate their own expressions receive their parameters untouched.
#[derive(Debug, Clone)]
pub struct TemplatingInterceptor {
    templates: Arc<TemplateRegistry>,
}

impl TemplatingInterceptor {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl<K: BlockKind> Interceptor<K> for TemplatingInterceptor {
    fn name(&self) -> &str {
        "templating"
    }

    fn priority(&self) -> i32 {
        TEMPLATING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, K>,
        next: Next<'_, K>,
    ) -> EvalResult<K::Output> {
        if K::evaluates_expressions(invocation.subject) || !contains_template(invocation.params) {
            return next.proceed(ctx, invocation).await;
        }

        let engine = self
            .templates
            .engine_for(invocation.scope.options().template_engine())?;
        let rendered = render_value(engine.as_ref(), invocation.params, &ctx.to_template_vars())?;
        trace!(
            stage = K::NAME,
            block = invocation.type_tag,
            engine = engine.name(),
            "Rendered block parameters"
        );

        next.proceed(ctx, invocation.with_params(&rendered)).await
    }
}
