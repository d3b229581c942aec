//! Connection factory contract and the per-worker connection slot that binds
//! one lazily created connection to exactly one worker.

use crate::executor::error::ConnectionError;
use crate::runtime::telemetry::Telemetry;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ConnectFuture<'a, C> =
    Pin<Box<dyn Future<Output = Result<C, ConnectionError>> + Send + 'a>>;
pub type DisposeFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Produces ready-to-use connections to the remote service.
///
/// Connections only need to be `Send`: each one is owned by a single worker
/// and lent out as `&mut` to one operation at a time.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Send + 'static;

    fn connect(&self) -> ConnectFuture<'_, Self::Connection>;

    /// Releases a connection. Called exactly once for every connection `connect` returned.
    fn dispose(&self, connection: Self::Connection) -> DisposeFuture<'_> {
        Box::pin(async move { drop(connection) })
    }
}

impl<F: ConnectionFactory> ConnectionFactory for Arc<F> {
    type Connection = F::Connection;

    fn connect(&self) -> ConnectFuture<'_, Self::Connection> {
        self.as_ref().connect()
    }

    fn dispose(&self, connection: Self::Connection) -> DisposeFuture<'_> {
        self.as_ref().dispose(connection)
    }
}

/// Connection slot owned by one worker for the lifetime of its partition.
pub(crate) struct WorkerConnection<F: ConnectionFactory> {
    worker_id: usize,
    factory: Arc<F>,
    telemetry: Arc<Telemetry>,
    slot: Option<F::Connection>,
}

impl<F: ConnectionFactory> WorkerConnection<F> {
    pub(crate) fn new(worker_id: usize, factory: Arc<F>, telemetry: Arc<Telemetry>) -> Self {
        Self {
            worker_id,
            factory,
            telemetry,
            slot: None,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.slot.is_some()
    }

    /// Returns the worker's connection, creating it on first use.
    pub(crate) async fn acquire(&mut self) -> Result<&mut F::Connection, ConnectionError> {
        let connection = match self.slot.take() {
            Some(connection) => connection,
            None => {
                open_connection(
                    self.worker_id,
                    Arc::clone(&self.factory),
                    Arc::clone(&self.telemetry),
                )
                .await?
            }
        };
        Ok(self.slot.insert(connection))
    }

    /// Hands the connection (if one was created) back to the factory.
    pub(crate) async fn release(mut self) {
        if let Some(connection) = self.slot.take() {
            self.factory.dispose(connection).await;
            self.telemetry.record_connection_disposed();
            tracing::debug!(worker = self.worker_id, "worker connection disposed");
        }
    }
}

impl<F: ConnectionFactory> Drop for WorkerConnection<F> {
    fn drop(&mut self) {
        if self.slot.is_some() {
            tracing::warn!(
                worker = self.worker_id,
                "worker connection dropped without being disposed"
            );
        }
    }
}

// No borrow of the slot may live across this await: connections are `Send`
// but not `Sync`.
async fn open_connection<F: ConnectionFactory>(
    worker_id: usize,
    factory: Arc<F>,
    telemetry: Arc<Telemetry>,
) -> Result<F::Connection, ConnectionError> {
    match factory.connect().await {
        Ok(connection) => {
            telemetry.record_connection_created();
            tracing::debug!(worker = worker_id, "worker connection created");
            Ok(connection)
        }
        Err(err) => {
            telemetry.record_connection_failure();
            tracing::error!(
                worker = worker_id,
                error = %err,
                "worker failed to create its connection"
            );
            Err(err)
        }
    }
}
