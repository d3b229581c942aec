use crate::executor::connection::{ConnectionFactory, WorkerConnection};
use crate::executor::error::ConnectionError;
use crate::executor::fault::{FailureRecord, Fault, FaultClassifier, FaultKind};
use crate::executor::operation::Operation;
use crate::runtime::telemetry::Telemetry;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Whether a worker keeps the responses it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseMode {
    Collect,
    Discard,
}

/// Results and failures gathered by one worker. Owned by that worker until it
/// finishes, then handed to the aggregator.
#[derive(Debug)]
pub(crate) struct WorkerContext<K, Req, T> {
    pub(crate) results: Vec<(K, T)>,
    pub(crate) succeeded: usize,
    pub(crate) failures: Vec<FailureRecord<K, Req>>,
}

impl<K, Req, T> WorkerContext<K, Req, T> {
    fn with_capacity(capacity: usize, mode: ResponseMode) -> Self {
        let results = match mode {
            ResponseMode::Collect => Vec::with_capacity(capacity),
            ResponseMode::Discard => Vec::new(),
        };
        Self {
            results,
            succeeded: 0,
            failures: Vec::new(),
        }
    }
}

pub(crate) enum WorkerOutcome<K, Req, T> {
    Drained(WorkerContext<K, Req, T>),
    ConnectionFailed {
        context: WorkerContext<K, Req, T>,
        abandoned: Vec<(K, Req)>,
        error: ConnectionError,
    },
}

pub(crate) struct BatchWorker<F, O>
where
    F: ConnectionFactory,
{
    pub(crate) id: usize,
    connection: WorkerConnection<F>,
    operation: Arc<O>,
    classifier: Arc<dyn FaultClassifier>,
    telemetry: Arc<Telemetry>,
    mode: ResponseMode,
}

impl<F, O> BatchWorker<F, O>
where
    F: ConnectionFactory,
{
    pub(crate) fn new(
        id: usize,
        factory: Arc<F>,
        operation: Arc<O>,
        classifier: Arc<dyn FaultClassifier>,
        telemetry: Arc<Telemetry>,
        mode: ResponseMode,
    ) -> Self {
        Self {
            id,
            connection: WorkerConnection::new(id, factory, telemetry.clone()),
            operation,
            classifier,
            telemetry,
            mode,
        }
    }

    /// Drains the worker's partition, recording each request's outcome locally.
    ///
    /// Item failures never stop the loop. Only a failure to create the
    /// connection ends the partition early: the untouched requests are handed
    /// back and there is nothing to dispose.
    #[tracing::instrument(name = "batch_worker", skip_all, fields(worker = self.id))]
    pub(crate) async fn run<K, Req>(
        mut self,
        partition: Vec<(K, Req)>,
    ) -> WorkerOutcome<K, Req, O::Response>
    where
        O: Operation<F::Connection, Req>,
        K: Send,
        Req: Send + Sync,
    {
        let total = partition.len();
        let mut context = WorkerContext::with_capacity(total, self.mode);
        tracing::debug!(requests = total, "worker started");

        let mut pending = partition.into_iter();
        while let Some((key, request)) = pending.next() {
            let connection = match self.connection.acquire().await {
                Ok(connection) => connection,
                Err(error) => {
                    let mut abandoned = Vec::with_capacity(pending.len() + 1);
                    abandoned.push((key, request));
                    abandoned.extend(pending);
                    return WorkerOutcome::ConnectionFailed {
                        context,
                        abandoned,
                        error,
                    };
                }
            };

            // Classification runs under the same unwind guard as the
            // operation so a panicking classifier cannot skip `release`.
            let operation = &self.operation;
            let classifier = &self.classifier;
            let request_ref = &request;
            let invocation = AssertUnwindSafe(async move {
                match operation.apply(request_ref, connection).await {
                    Ok(response) => Ok(response),
                    Err(error) => Err(classifier.classify(error)),
                }
            })
            .catch_unwind()
            .await;

            let fault = match invocation {
                Ok(Ok(response)) => {
                    context.succeeded += 1;
                    if self.mode == ResponseMode::Collect {
                        context.results.push((key, response));
                    }
                    continue;
                }
                Ok(Err(fault)) => fault,
                Err(panic_payload) => Fault::from_panic(panic_message(panic_payload.as_ref())),
            };

            match fault.kind() {
                FaultKind::Domain => self.telemetry.record_domain_fault(),
                FaultKind::Transient => self.telemetry.record_transient_fault(),
            }
            tracing::debug!(fault = %fault, "request failed");
            context
                .failures
                .push(FailureRecord::new(key, request, fault));
        }

        self.telemetry.record_successes(context.succeeded as u64);
        tracing::debug!(
            succeeded = context.succeeded,
            failed = context.failures.len(),
            connected = self.connection.is_connected(),
            "worker drained its partition"
        );
        self.connection.release().await;
        WorkerOutcome::Drained(context)
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Splits a batch into `workers` stripes: item `i` goes to worker `i % workers`.
pub(crate) fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let per_worker = items.len().div_ceil(workers);
    let mut partitions: Vec<Vec<T>> = (0..workers)
        .map(|_| Vec::with_capacity(per_worker))
        .collect();
    for (index, item) in items.into_iter().enumerate() {
        partitions[index % workers].push(item);
    }
    partitions
}
