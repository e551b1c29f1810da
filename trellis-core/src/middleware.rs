// Three-phase middleware contract

use crate::context::RequestContext;
use crate::response::Reply;
use crate::{HttpResponse, Result};
use async_trait::async_trait;

/// Middleware hooks, run by the global pipeline and by route-scoped
/// wrapping.
///
/// Instances are built once at boot and shared by every request, so they
/// hold configuration only. Per-request state belongs in the
/// [`RequestContext`].
///
/// - `before` runs in registration order. Returning `Some(reply)` stops
///   the chain and skips the handler.
/// - `after` runs in reverse order on the unbuilt reply. Most middleware
///   queue headers and cookies on the context here.
/// - `after_build` runs in reverse order on the serialized response, for
///   work that needs final bytes such as compression.
///
/// ```
/// use async_trait::async_trait;
/// use trellis_core::{Middleware, Reply, RequestContext, Result};
///
/// struct PoweredBy;
///
/// #[async_trait]
/// impl Middleware for PoweredBy {
///     async fn after(&self, ctx: &RequestContext, reply: Reply) -> Result<Reply> {
///         ctx.queue_header("X-Powered-By", "trellis");
///         Ok(reply)
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before(&self, _ctx: &RequestContext) -> Result<Option<Reply>> {
        Ok(None)
    }

    async fn after(&self, _ctx: &RequestContext, reply: Reply) -> Result<Reply> {
        Ok(reply)
    }

    async fn after_build(&self, _ctx: &RequestContext, _response: &mut HttpResponse) -> Result<()> {
        Ok(())
    }
}
