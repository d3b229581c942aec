use crate::executor::aggregate::BatchShape;
use crate::executor::connection::ConnectionFactory;
use crate::executor::error::{AggregateFailure, BatchError};
use crate::executor::fault::FailureRecord;
use crate::executor::operation::Operation;
use crate::executor::parallelism::DegreeOfParallelism;
use crate::executor::pool::BatchExecutor;
use crate::executor::worker::ResponseMode;
use std::marker::PhantomData;

/// Callback receiving each failed request once the batch has finished.
pub type FailureHandler<'h, K, Req> = Box<dyn FnMut(FailureRecord<K, Req>) + Send + 'h>;

/// A batch staged on an executor, configured with builder calls and consumed
/// by [`Batch::execute`] or [`Batch::run`].
///
/// Without a failure handler, any failed item turns the whole call into
/// [`BatchError::Failed`] and the successful responses are dropped. With a
/// handler, the successful responses are returned and the handler sees every
/// failure.
///
/// When a worker cannot connect the call returns [`BatchError::Connection`]
/// with the requests that were never attempted. Failures recorded by the
/// other workers still go to the handler first, or ride on the error when
/// there is none.
///
/// The returned future must be awaited to completion. Dropping it early
/// leaves the spawned workers running and their results are lost.
pub struct Batch<'e, F: ConnectionFactory, K, Req, S> {
    executor: &'e BatchExecutor<F>,
    items: Vec<(K, Req)>,
    parallelism: Option<i32>,
    handler: Option<FailureHandler<'e, K, Req>>,
    _shape: PhantomData<S>,
}

impl<'e, F: ConnectionFactory, K, Req, S> Batch<'e, F, K, Req, S> {
    pub(crate) fn new(executor: &'e BatchExecutor<F>, items: Vec<(K, Req)>) -> Self {
        Self {
            executor,
            items,
            parallelism: None,
            handler: None,
            _shape: PhantomData,
        }
    }

    /// Overrides the executor's degree of parallelism for this batch only.
    /// The value is validated when the batch starts.
    pub fn degree_of_parallelism(mut self, value: i32) -> Self {
        self.parallelism = Some(value);
        self
    }

    /// Collects failures through `handler` instead of failing the call.
    pub fn on_failure(mut self, handler: impl FnMut(FailureRecord<K, Req>) + Send + 'e) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'e, F, K, Req, S> Batch<'e, F, K, Req, S>
where
    F: ConnectionFactory,
    S: BatchShape<K>,
    K: Send + 'static,
    Req: Send + Sync + 'static,
{
    /// Applies `operation` to every request and returns the responses.
    pub async fn execute<O>(
        self,
        operation: O,
    ) -> Result<S::Output<O::Response>, BatchError<K, Req>>
    where
        O: Operation<F::Connection, Req>,
    {
        let results = self.dispatch(operation, ResponseMode::Collect).await?;
        Ok(S::collect(results))
    }

    /// Applies `operation` to every request, keeping only failures.
    pub async fn run<O>(self, operation: O) -> Result<(), BatchError<K, Req>>
    where
        O: Operation<F::Connection, Req>,
    {
        self.dispatch(operation, ResponseMode::Discard).await?;
        Ok(())
    }

    async fn dispatch<O>(
        self,
        operation: O,
        mode: ResponseMode,
    ) -> Result<Vec<(K, O::Response)>, BatchError<K, Req>>
    where
        O: Operation<F::Connection, Req>,
    {
        let Batch {
            executor,
            items,
            parallelism,
            mut handler,
            ..
        } = self;

        let parallelism = match parallelism {
            Some(value) => DegreeOfParallelism::new(value)?,
            None => executor.parallelism(),
        };
        S::validate(&items)?;

        let batch_len = items.len();
        let outcome = match executor.dispatch(items, parallelism, operation, mode).await {
            Ok(outcome) => outcome,
            Err(mut error) => {
                if let (Some(handler), BatchError::Connection { failures, .. }) =
                    (handler.as_mut(), &mut error)
                {
                    deliver(handler, std::mem::take(failures));
                }
                return Err(error);
            }
        };
        let (results, failures) = outcome.into_parts();

        if failures.is_empty() {
            return Ok(results);
        }

        match handler.as_mut() {
            Some(handler) => {
                deliver(handler, failures);
                Ok(results)
            }
            None => Err(AggregateFailure::new(failures, batch_len).into()),
        }
    }
}

fn deliver<K, Req>(handler: &mut FailureHandler<'_, K, Req>, failures: Vec<FailureRecord<K, Req>>) {
    if failures.is_empty() {
        return;
    }
    tracing::debug!(
        failures = failures.len(),
        "delivering batch failures to handler"
    );
    for record in failures {
        handler(record);
    }
}
