// HTTP server

use crate::kernel::HttpKernel;
use crate::{Error, HttpRequest, HttpResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use crate::logging::{error, info, warn};

/// Serves an [`HttpKernel`] over HTTP/1.1.
pub struct Application {
    kernel: Arc<HttpKernel>,
}

impl Application {
    pub fn new(kernel: HttpKernel) -> Self {
        Self {
            kernel: Arc::new(kernel),
        }
    }

    pub fn kernel(&self) -> &Arc<HttpKernel> {
        &self.kernel
    }

    /// Bind `addr` and serve until ctrl-c.
    pub async fn listen(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %addr, "Server listening");

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve connections from `listener` until `shutdown` completes, then
    /// let open connections finish their in-flight requests.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };

            let io = TokioIo::new(stream);
            let kernel = Arc::clone(&self.kernel);
            let mut shutdown_rx = shutdown_rx.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let kernel = Arc::clone(&kernel);
                    async move { handle_request(req, peer, kernel).await }
                });

                let conn = http1::Builder::new().serve_connection(io, service);
                let mut conn = std::pin::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = shutdown_rx.changed() => {
                        conn.as_mut().graceful_shutdown();
                        conn.as_mut().await
                    }
                };

                if let Err(e) = result {
                    error!(peer = %peer, error = %e, "Error serving connection");
                }
            });
        }

        info!("Shutting down, waiting for open connections");
        drop(shutdown_rx);
        let _ = shutdown_tx.send(true);
        shutdown_tx.closed().await;
        Ok(())
    }
}

async fn handle_request(
    req: Request<IncomingBody>,
    peer: SocketAddr,
    kernel: Arc<HttpKernel>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut request = HttpRequest::new(parts.method.as_str(), target)
        .with_body(body.to_vec())
        .with_peer_addr(peer);

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    let response = kernel.handle(request).await;
    Ok(into_hyper_response(response))
}

/// Convert to a hyper response, one `Set-Cookie` line per cookie.
pub fn into_hyper_response(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);

    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for cookie in &response.cookies {
        builder = builder.header("Set-Cookie", cookie.to_header_value());
    }

    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|e| {
            error!(error = %e, "Invalid response, sending 500");
            let mut fallback = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::Cookie;

    #[test]
    fn test_each_cookie_gets_its_own_header() {
        let response = HttpResponse::ok()
            .with_header("Content-Type", "text/plain")
            .with_cookie(Cookie::new("a", "1"))
            .with_cookie(Cookie::new("b", "2"));

        let hyper_response = into_hyper_response(response);
        let cookies: Vec<_> = hyper_response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("a=1"));
        assert!(cookies[1].starts_with("b=2"));
    }

    #[test]
    fn test_invalid_status_falls_back() {
        let response = into_hyper_response(HttpResponse::new(1000));
        assert_eq!(response.status(), hyper::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
