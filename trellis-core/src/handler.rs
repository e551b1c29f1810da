// Route handler types

use crate::context::RequestContext;
use crate::response::Reply;
use crate::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future used at the dynamic seams of the pipeline.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Type-erased route handler.
pub type HandlerFn = Arc<dyn Fn(RequestContext) -> BoxFuture<Result<Reply, Error>> + Send + Sync>;

/// Wrap an async function or closure as a [`HandlerFn`].
///
/// The closure may return anything convertible into a [`Reply`]: an
/// `HttpResponse`, a `ResponseBuilder`, a JSON value or a string.
///
/// ```
/// use trellis_core::{handler, HttpResponse};
///
/// let h = handler(|_ctx| async { Ok(HttpResponse::ok()) });
/// ```
pub fn handler<F, Fut, R>(f: F) -> HandlerFn
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(move |ctx| -> BoxFuture<Result<Reply, Error>> {
        let fut = f(ctx);
        Box::pin(async move { fut.await.map(Into::into) })
    })
}
