//! Transactional runs
//!
//! When the automation's `transactional` option is truthy, the whole run
//! executes inside a transaction obtained from a [`TransactionManager`]:
//! committed when the run succeeds, rolled back when it fails.

use async_trait::async_trait;
use rb_core::EventContext;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::EvalResult;
use crate::kind::RunKind;
use crate::pipeline::{Interceptor, Invocation, Next};
use crate::result::AutomationResult;

/// Priority of the transactional interceptor
pub const TRANSACTIONAL_PRIORITY: i32 = 200;

/// One open transaction
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> EvalResult<()>;

    async fn rollback(self: Box<Self>) -> EvalResult<()>;
}

/// Source of transactions
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> EvalResult<Box<dyn Transaction>>;
}

/// Wraps transactional runs in a transaction
#[derive(Clone)]
pub struct TransactionalInterceptor {
    manager: Arc<dyn TransactionManager>,
}

impl TransactionalInterceptor {
    pub fn new(manager: Arc<dyn TransactionManager>) -> Self {
        Self { manager }
    }
}

impl std::fmt::Debug for TransactionalInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalInterceptor").finish_non_exhaustive()
    }
}

#[async_trait]
impl Interceptor<RunKind> for TransactionalInterceptor {
    fn name(&self) -> &str {
        "transactional"
    }

    fn priority(&self) -> i32 {
        TRANSACTIONAL_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, RunKind>,
        next: Next<'_, RunKind>,
    ) -> EvalResult<AutomationResult> {
        if !invocation.scope.options().transactional() {
            return next.proceed(ctx, invocation).await;
        }

        let execution_id = invocation.scope.execution_id();
        let transaction = self.manager.begin().await?;
        debug!(execution_id, "Transaction started");

        match next.proceed(ctx, invocation).await {
            Ok(result) => {
                transaction.commit().await?;
                debug!(execution_id, "Transaction committed");
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback) = transaction.rollback().await {
                    warn!(execution_id, error = %rollback, "Rollback failed");
                } else {
                    debug!(execution_id, "Transaction rolled back");
                }
                Err(e)
            }
        }
    }
}
