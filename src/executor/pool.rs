//! `BatchExecutor`: owns the connection factory and fans batches out across a
//! bounded set of worker tasks, one connection per worker.

use crate::executor::aggregate::{BatchOutcome, Keyed, Positional};
use crate::executor::batch::Batch;
use crate::executor::connection::ConnectionFactory;
use crate::executor::error::BatchError;
use crate::executor::fault::{FaultClassifier, StandardFaultClassifier};
use crate::executor::operation::Operation;
use crate::executor::parallelism::DegreeOfParallelism;
use crate::executor::worker::{panic_message, partition, BatchWorker, ResponseMode, WorkerOutcome};
use crate::runtime::telemetry::Telemetry;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

pub struct BatchExecutor<F: ConnectionFactory> {
    factory: Arc<F>,
    parallelism: DegreeOfParallelism,
    classifier: Arc<dyn FaultClassifier>,
    telemetry: Arc<Telemetry>,
}

impl<F: ConnectionFactory> Clone for BatchExecutor<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            parallelism: self.parallelism,
            classifier: Arc::clone(&self.classifier),
            telemetry: Arc::clone(&self.telemetry),
        }
    }
}

impl<F: ConnectionFactory> BatchExecutor<F> {
    pub fn new(factory: F, parallelism: DegreeOfParallelism) -> Self {
        Self {
            factory: Arc::new(factory),
            parallelism,
            classifier: Arc::new(StandardFaultClassifier),
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    /// Replaces the classifier used to turn operation errors into faults.
    pub fn with_classifier(mut self, classifier: impl FaultClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Shares an existing telemetry sink instead of the executor's own.
    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn parallelism(&self) -> DegreeOfParallelism {
        self.parallelism
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Starts a positional batch. Failure records carry each request's input index.
    pub fn submit<Req>(
        &self,
        requests: impl IntoIterator<Item = Req>,
    ) -> Batch<'_, F, usize, Req, Positional> {
        Batch::new(self, requests.into_iter().enumerate().collect())
    }

    /// Starts a keyed batch. Keys must be unique within the batch.
    pub fn submit_keyed<K, Req>(
        &self,
        requests: impl IntoIterator<Item = (K, Req)>,
    ) -> Batch<'_, F, K, Req, Keyed> {
        Batch::new(self, requests.into_iter().collect())
    }

    /// Runs every request through `operation` on at most `parallelism`
    /// workers and waits for all of them.
    ///
    /// Workers are spawned tasks: dropping this future before it resolves
    /// leaves them running detached. They still dispose their connections,
    /// but their results are discarded.
    pub(crate) async fn dispatch<K, Req, O>(
        &self,
        items: Vec<(K, Req)>,
        parallelism: DegreeOfParallelism,
        operation: O,
        mode: ResponseMode,
    ) -> Result<BatchOutcome<K, Req, O::Response>, BatchError<K, Req>>
    where
        O: Operation<F::Connection, Req>,
        K: Send + 'static,
        Req: Send + Sync + 'static,
    {
        let batch_len = items.len();
        let workers = parallelism.worker_count(batch_len);
        let started = Instant::now();
        tracing::info!(
            requests = batch_len,
            workers,
            parallelism = %parallelism,
            "dispatching batch"
        );

        let operation = Arc::new(operation);
        let handles: Vec<(usize, JoinHandle<WorkerOutcome<K, Req, O::Response>>)> =
            partition(items, workers)
                .into_iter()
                .enumerate()
                .filter(|(_, share)| !share.is_empty())
                .map(|(worker_id, share)| {
                    let worker = BatchWorker::new(
                        worker_id,
                        Arc::clone(&self.factory),
                        Arc::clone(&operation),
                        Arc::clone(&self.classifier),
                        Arc::clone(&self.telemetry),
                        mode,
                    );
                    (worker_id, tokio::spawn(worker.run(share)))
                })
                .collect();

        let mut detached = DetachGuard {
            workers: handles.len(),
            armed: true,
        };
        let mut outcome = BatchOutcome::with_capacity(batch_len);
        let mut abandoned = Vec::new();
        let mut fatal: Option<BatchError<K, Req>> = None;

        // Every worker is joined before anything is reported so that no
        // connection outlives the batch.
        for (worker_id, handle) in handles {
            match handle.await {
                Ok(WorkerOutcome::Drained(context)) => outcome.merge(context),
                Ok(WorkerOutcome::ConnectionFailed {
                    context,
                    abandoned: untouched,
                    error,
                }) => {
                    outcome.merge(context);
                    abandoned.extend(untouched);
                    if fatal.is_none() {
                        fatal = Some(BatchError::Connection {
                            worker: worker_id,
                            source: error,
                            abandoned: Vec::new(),
                            failures: Vec::new(),
                        });
                    }
                }
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        panic_message(join_error.into_panic().as_ref())
                    } else {
                        join_error.to_string()
                    };
                    tracing::error!(worker = worker_id, error = %message, "batch worker aborted");
                    if fatal.is_none() {
                        fatal = Some(BatchError::WorkerAborted {
                            worker: worker_id,
                            message,
                        });
                    }
                }
            }
        }

        detached.armed = false;

        self.telemetry.record_batch_completed();
        tracing::info!(
            requests = batch_len,
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            abandoned = abandoned.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch completed"
        );

        match fatal {
            Some(mut error) => {
                if let BatchError::Connection {
                    abandoned: pending,
                    failures,
                    ..
                } = &mut error
                {
                    *pending = abandoned;
                    *failures = outcome.into_parts().1;
                }
                Err(error)
            }
            None => Ok(outcome),
        }
    }
}

/// Logs when a batch is dropped while its workers are still running.
struct DetachGuard {
    workers: usize,
    armed: bool,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                workers = self.workers,
                "batch dropped before its workers finished; their results will be discarded"
            );
        }
    }
}
