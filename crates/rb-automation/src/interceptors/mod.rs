//! Standard interceptors and the per-stage chain set
//!
//! | Interceptor     | Priority | Stages         |
//! |-----------------|----------|----------------|
//! | tracing         | 100      | all            |
//! | transactional   | 200      | run            |
//! | logging         | 300      | all            |
//! | templating      | 400      | block kinds    |

mod logging;
mod templating;
mod tracer;
mod transactional;

pub use logging::{LoggingInterceptor, LOGGING_PRIORITY};
pub use templating::{TemplatingInterceptor, TEMPLATING_PRIORITY};
pub use tracer::{TracingInterceptor, TRACING_PRIORITY};
pub use transactional::{
    Transaction, TransactionManager, TransactionalInterceptor, TRANSACTIONAL_PRIORITY,
};

use rb_template::TemplateRegistry;
use std::sync::Arc;

use crate::kind::{ActionKind, ConditionKind, ResultKind, RunKind, TriggerKind, VariableKind};
use crate::pipeline::{Interceptor, InterceptorChain};
use crate::trace::TraceStore;

/// One interceptor chain per stage
///
/// Cloning is cheap; resolved blocks hold on to the chain of their kind.
#[derive(Debug, Clone, Default)]
pub struct Interceptors {
    pub triggers: Arc<InterceptorChain<TriggerKind>>,
    pub conditions: Arc<InterceptorChain<ConditionKind>>,
    pub actions: Arc<InterceptorChain<ActionKind>>,
    pub variables: Arc<InterceptorChain<VariableKind>>,
    pub results: Arc<InterceptorChain<ResultKind>>,
    pub runs: Arc<InterceptorChain<RunKind>>,
}

impl Interceptors {
    /// Chains without any interceptor
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> InterceptorsBuilder {
        InterceptorsBuilder::default()
    }

    /// Tracing, logging and templating on every stage they apply to,
    /// plus transactions when a manager is given
    pub fn standard(
        templates: Arc<TemplateRegistry>,
        transactions: Option<Arc<dyn TransactionManager>>,
        traces: Option<Arc<TraceStore>>,
    ) -> Self {
        let tracing = Arc::new(match traces {
            Some(store) => TracingInterceptor::with_store(store),
            None => TracingInterceptor::new(),
        });

        let mut builder = Self::builder()
            .all_blocks(tracing.clone())
            .run(tracing)
            .all_blocks(Arc::new(LoggingInterceptor))
            .run(Arc::new(LoggingInterceptor))
            .all_blocks(Arc::new(TemplatingInterceptor::new(templates)));

        if let Some(manager) = transactions {
            builder = builder.run(Arc::new(TransactionalInterceptor::new(manager)));
        }

        builder.build()
    }
}

/// Builder for [`Interceptors`]
#[derive(Default)]
pub struct InterceptorsBuilder {
    triggers: Vec<Arc<dyn Interceptor<TriggerKind>>>,
    conditions: Vec<Arc<dyn Interceptor<ConditionKind>>>,
    actions: Vec<Arc<dyn Interceptor<ActionKind>>>,
    variables: Vec<Arc<dyn Interceptor<VariableKind>>>,
    results: Vec<Arc<dyn Interceptor<ResultKind>>>,
    runs: Vec<Arc<dyn Interceptor<RunKind>>>,
}

impl InterceptorsBuilder {
    pub fn trigger(mut self, interceptor: Arc<dyn Interceptor<TriggerKind>>) -> Self {
        self.triggers.push(interceptor);
        self
    }

    pub fn condition(mut self, interceptor: Arc<dyn Interceptor<ConditionKind>>) -> Self {
        self.conditions.push(interceptor);
        self
    }

    pub fn action(mut self, interceptor: Arc<dyn Interceptor<ActionKind>>) -> Self {
        self.actions.push(interceptor);
        self
    }

    pub fn variable(mut self, interceptor: Arc<dyn Interceptor<VariableKind>>) -> Self {
        self.variables.push(interceptor);
        self
    }

    pub fn result(mut self, interceptor: Arc<dyn Interceptor<ResultKind>>) -> Self {
        self.results.push(interceptor);
        self
    }

    pub fn run(mut self, interceptor: Arc<dyn Interceptor<RunKind>>) -> Self {
        self.runs.push(interceptor);
        self
    }

    /// Add one interceptor to the chains of all five block kinds
    pub fn all_blocks<I>(self, interceptor: Arc<I>) -> Self
    where
        I: Interceptor<TriggerKind>
            + Interceptor<ConditionKind>
            + Interceptor<ActionKind>
            + Interceptor<VariableKind>
            + Interceptor<ResultKind>
            + 'static,
    {
        self.trigger(interceptor.clone())
            .condition(interceptor.clone())
            .action(interceptor.clone())
            .variable(interceptor.clone())
            .result(interceptor)
    }

    pub fn build(self) -> Interceptors {
        Interceptors {
            triggers: Arc::new(InterceptorChain::from_interceptors(self.triggers)),
            conditions: Arc::new(InterceptorChain::from_interceptors(self.conditions)),
            actions: Arc::new(InterceptorChain::from_interceptors(self.actions)),
            variables: Arc::new(InterceptorChain::from_interceptors(self.variables)),
            results: Arc::new(InterceptorChain::from_interceptors(self.results)),
            runs: Arc::new(InterceptorChain::from_interceptors(self.runs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order() {
        let interceptors = Interceptors::standard(Arc::new(TemplateRegistry::new()), None, None);

        assert_eq!(
            interceptors.actions.names(),
            vec!["tracing", "logging", "templating"]
        );
        assert_eq!(interceptors.runs.names(), vec!["tracing", "logging"]);
        assert_eq!(interceptors.triggers.len(), 3);
    }

    #[test]
    fn test_empty_chains() {
        let interceptors = Interceptors::empty();
        assert!(interceptors.triggers.is_empty());
        assert!(interceptors.runs.is_empty());
    }
}
