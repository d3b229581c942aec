use anyhow::Result;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

pub type OperationFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Work applied to every request of a batch.
///
/// `apply` borrows the worker's connection mutably for the duration of one
/// call, so a connection never serves two requests at once and cannot be
/// retained past the call.
pub trait Operation<C, Req>: Send + Sync + 'static {
    type Response: Send + 'static;

    fn apply<'a>(&'a self, request: &'a Req, connection: &'a mut C)
        -> OperationFuture<'a, Self::Response>;
}

/// [`Operation`] backed by a closure; built with [`operation_fn`].
pub struct FnOperation<F, T> {
    f: F,
    _response: PhantomData<fn() -> T>,
}

/// Adapts a closure returning a boxed future into an [`Operation`].
///
/// ```ignore
/// let op = operation_fn::<MyConnection, u32, String, _>(|request, connection| {
///     Box::pin(async move { connection.lookup(*request).await })
/// });
/// ```
pub fn operation_fn<C, Req, T, F>(f: F) -> FnOperation<F, T>
where
    F: for<'a> Fn(&'a Req, &'a mut C) -> OperationFuture<'a, T> + Send + Sync + 'static,
    T: Send + 'static,
{
    FnOperation {
        f,
        _response: PhantomData,
    }
}

impl<C, Req, T, F> Operation<C, Req> for FnOperation<F, T>
where
    F: for<'a> Fn(&'a Req, &'a mut C) -> OperationFuture<'a, T> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Response = T;

    fn apply<'a>(&'a self, request: &'a Req, connection: &'a mut C) -> OperationFuture<'a, T> {
        (self.f)(request, connection)
    }
}
