//! Interceptor pipeline
//!
//! Each [`Stage`] has its own [`InterceptorChain`]. Calling a block means
//! entering its chain: interceptors run in ascending priority order, each
//! deciding whether to call [`Next::proceed`], and the terminal
//! [`Handler`] performs the actual evaluation.
//!
//! ```text
//! caller → tracing(100) → transactional(200) → logging(300) → templating(400) → block
//! ```
//!
//! `Next` is consumed by `proceed`, so an interceptor can continue the
//! chain at most once. Returning without calling it short-circuits.

use async_trait::async_trait;
use rb_core::EventContext;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

use crate::block::{BlockCall, BlockDefinition};
use crate::error::EvalResult;
use crate::kind::{BlockKind, Stage};
use crate::scope::RunScope;

/// Priority used when an interceptor does not choose one
pub const DEFAULT_PRIORITY: i32 = 1000;

/// One evaluation travelling through a chain
pub struct Invocation<'a, S: Stage> {
    /// What is evaluated
    pub subject: &'a S::Subject,
    /// Type tag of the block, or the stage name for runs
    pub type_tag: &'a str,
    /// Parameters as seen by the next link
    pub params: &'a Value,
    /// Run the evaluation belongs to
    pub scope: &'a RunScope,
}

impl<'a, S: Stage> Invocation<'a, S> {
    /// Create an invocation
    pub fn new(
        subject: &'a S::Subject,
        type_tag: &'a str,
        params: &'a Value,
        scope: &'a RunScope,
    ) -> Self {
        Self {
            subject,
            type_tag,
            params,
            scope,
        }
    }

    /// Same invocation with replaced parameters
    pub fn with_params<'b>(&self, params: &'b Value) -> Invocation<'b, S>
    where
        'a: 'b,
    {
        Invocation {
            subject: self.subject,
            type_tag: self.type_tag,
            params,
            scope: self.scope,
        }
    }

    /// Arguments handed to the block
    pub fn block_call(&self) -> BlockCall<'a> {
        BlockCall {
            type_tag: self.type_tag,
            params: self.params,
            scope: self.scope,
        }
    }
}

impl<S: Stage> Clone for Invocation<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Stage> Copy for Invocation<'_, S> {}

impl<S: Stage> fmt::Debug for Invocation<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("stage", &S::NAME)
            .field("type_tag", &self.type_tag)
            .field("params", self.params)
            .finish()
    }
}

/// End of a chain
#[async_trait]
pub trait Handler<S: Stage>: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, S>,
    ) -> EvalResult<S::Output>;
}

/// Cross-cutting wrapper around evaluations of one stage
#[async_trait]
pub trait Interceptor<S: Stage>: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Lower values run first, i.e. further out
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Wrap one evaluation
    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, S>,
        next: Next<'_, S>,
    ) -> EvalResult<S::Output>;
}

/// Remainder of a chain
pub struct Next<'a, S: Stage> {
    remaining: &'a [Arc<dyn Interceptor<S>>],
    terminal: &'a dyn Handler<S>,
}

impl<'a, S: Stage> Next<'a, S> {
    /// Continue with the next interceptor, or the terminal handler
    pub async fn proceed(
        self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, S>,
    ) -> EvalResult<S::Output> {
        match self.remaining.split_first() {
            Some((interceptor, rest)) => {
                trace!(
                    stage = S::NAME,
                    interceptor = interceptor.name(),
                    "Entering interceptor"
                );
                let next = Next {
                    remaining: rest,
                    terminal: self.terminal,
                };
                interceptor.intercept(ctx, invocation, next).await
            }
            None => self.terminal.handle(ctx, invocation).await,
        }
    }
}

/// Ordered interceptors for one stage
pub struct InterceptorChain<S: Stage> {
    interceptors: Vec<Arc<dyn Interceptor<S>>>,
}

impl<S: Stage> InterceptorChain<S> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Create a chain, ordering interceptors by priority
    ///
    /// Interceptors with equal priority keep their given order.
    pub fn from_interceptors(mut interceptors: Vec<Arc<dyn Interceptor<S>>>) -> Self {
        interceptors.sort_by_key(|i| i.priority());
        Self { interceptors }
    }

    /// Add an interceptor, keeping the chain ordered
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor<S>>) {
        self.interceptors.push(interceptor);
        self.interceptors.sort_by_key(|i| i.priority());
    }

    /// Interceptor names in execution order
    pub fn names(&self) -> Vec<String> {
        self.interceptors
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run `invocation` through the chain and finally `terminal`
    pub async fn invoke(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, S>,
        terminal: &dyn Handler<S>,
    ) -> EvalResult<S::Output> {
        Next {
            remaining: &self.interceptors,
            terminal,
        }
        .proceed(ctx, invocation)
        .await
    }
}

impl<S: Stage> Default for InterceptorChain<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stage> fmt::Debug for InterceptorChain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("stage", &S::NAME)
            .field("interceptors", &self.names())
            .finish()
    }
}

/// Terminal handler that calls the block itself
struct BlockTerminal<K>(PhantomData<fn() -> K>);

#[async_trait]
impl<K: BlockKind> Handler<K> for BlockTerminal<K> {
    async fn handle(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, K>,
    ) -> EvalResult<K::Output> {
        K::call(invocation.subject, ctx, invocation.block_call()).await
    }
}

/// A resolved block bound to its definition and interceptor chain
///
/// Callers always evaluate through [`evaluate`](Self::evaluate), which
/// enters the chain; the block implementation is never called directly.
pub struct Block<K: BlockKind> {
    definition: BlockDefinition,
    inner: Arc<K::Subject>,
    chain: Arc<InterceptorChain<K>>,
}

impl<K: BlockKind> Block<K> {
    pub fn new(
        definition: BlockDefinition,
        inner: Arc<K::Subject>,
        chain: Arc<InterceptorChain<K>>,
    ) -> Self {
        Self {
            definition,
            inner,
            chain,
        }
    }

    /// Definition the block was resolved from
    pub fn definition(&self) -> &BlockDefinition {
        &self.definition
    }

    pub fn type_tag(&self) -> &str {
        &self.definition.type_tag
    }

    /// Check whether two blocks share the same implementation instance
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Evaluate the block through its chain
    pub async fn evaluate(
        &self,
        ctx: &mut EventContext,
        scope: &RunScope,
    ) -> EvalResult<K::Output> {
        let invocation = Invocation::new(
            &*self.inner,
            &self.definition.type_tag,
            &self.definition.params,
            scope,
        );
        let terminal = BlockTerminal::<K>(PhantomData);
        self.chain.invoke(ctx, invocation, &terminal).await
    }
}

impl<K: BlockKind> Clone for Block<K> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            inner: self.inner.clone(),
            chain: self.chain.clone(),
        }
    }
}

impl<K: BlockKind> fmt::Debug for Block<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("kind", &K::NAME)
            .field("definition", &self.definition)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Trigger;
    use crate::kind::TriggerKind;
    use rb_core::Event;
    use serde_json::json;
    use std::sync::Mutex;

    struct ParamTrigger;

    #[async_trait]
    impl Trigger for ParamTrigger {
        async fn is_triggered(&self, _ctx: &EventContext, call: BlockCall<'_>) -> EvalResult<bool> {
            Ok(call.params.get("fire").and_then(Value::as_bool).unwrap_or(false))
        }
    }

    struct Recorder {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor<TriggerKind> for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn intercept(
            &self,
            ctx: &mut EventContext,
            invocation: Invocation<'_, TriggerKind>,
            next: Next<'_, TriggerKind>,
        ) -> EvalResult<bool> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            let out = next.proceed(ctx, invocation).await;
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            out
        }
    }

    struct Veto;

    #[async_trait]
    impl Interceptor<TriggerKind> for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        async fn intercept(
            &self,
            _ctx: &mut EventContext,
            _invocation: Invocation<'_, TriggerKind>,
            _next: Next<'_, TriggerKind>,
        ) -> EvalResult<bool> {
            Ok(false)
        }
    }

    struct ForceFire;

    #[async_trait]
    impl Interceptor<TriggerKind> for ForceFire {
        fn name(&self) -> &str {
            "force_fire"
        }

        async fn intercept(
            &self,
            ctx: &mut EventContext,
            invocation: Invocation<'_, TriggerKind>,
            next: Next<'_, TriggerKind>,
        ) -> EvalResult<bool> {
            let params = json!({"fire": true});
            next.proceed(ctx, invocation.with_params(&params)).await
        }
    }

    fn block(chain: InterceptorChain<TriggerKind>, params: Value) -> Block<TriggerKind> {
        Block::new(
            BlockDefinition::new("param", params),
            Arc::new(ParamTrigger) as Arc<dyn Trigger>,
            Arc::new(chain),
        )
    }

    #[tokio::test]
    async fn test_empty_chain_calls_block() {
        let scope = RunScope::detached();
        let mut ctx = EventContext::new(Event::empty("tick"));

        let on = block(InterceptorChain::new(), json!({"fire": true}));
        let off = block(InterceptorChain::new(), json!({}));
        assert!(on.evaluate(&mut ctx, &scope).await.unwrap());
        assert!(!off.evaluate(&mut ctx, &scope).await.unwrap());
    }

    #[tokio::test]
    async fn test_priority_order_and_nesting() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::from_interceptors(vec![
            Arc::new(Recorder {
                name: "inner",
                priority: 20,
                log: log.clone(),
            }),
            Arc::new(Recorder {
                name: "outer",
                priority: 10,
                log: log.clone(),
            }),
        ]);
        assert_eq!(chain.names(), vec!["outer", "inner"]);

        let scope = RunScope::detached();
        let mut ctx = EventContext::new(Event::empty("tick"));
        block(chain, json!({"fire": true}))
            .evaluate(&mut ctx, &scope)
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:before", "inner:before", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        chain.push(Arc::new(Veto));
        chain.push(Arc::new(Recorder {
            name: "late",
            priority: DEFAULT_PRIORITY + 1,
            log: log.clone(),
        }));

        let scope = RunScope::detached();
        let mut ctx = EventContext::new(Event::empty("tick"));
        let fired = block(chain, json!({"fire": true}))
            .evaluate(&mut ctx, &scope)
            .await
            .unwrap();

        assert!(!fired);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interceptor_replaces_params() {
        let mut chain = InterceptorChain::new();
        chain.push(Arc::new(ForceFire));

        let scope = RunScope::detached();
        let mut ctx = EventContext::new(Event::empty("tick"));
        let b = block(chain, json!({"fire": false}));
        assert!(b.evaluate(&mut ctx, &scope).await.unwrap());
        // definition is untouched
        assert_eq!(b.definition().params, json!({"fire": false}));
    }
}
