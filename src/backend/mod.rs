pub mod context;
pub mod emitter;
pub mod middleware;
pub mod page;
pub mod routes;

pub use context::RequestContext;
pub use emitter::*;
pub use middleware::TaggedSink;
pub use routes::*;

use crate::fault::{resolve, FaultProfile};
use crate::transport::{read_request, Response, ResponseSink, TcpSink};
use http::StatusCode;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Status `/error` answers with when none is given.
pub const ERROR_ROUTE_STATUS: u16 = 500;

/// How a backend names itself on default-page responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendIdentity {
    /// `X-Backend: default`
    Default,
    /// `X-Backends: <id>`, one per listener in multi-listener mode.
    Listener(String),
}

impl BackendIdentity {
    pub fn header(&self) -> (&'static str, &str) {
        match self {
            BackendIdentity::Default => ("X-Backend", "default"),
            BackendIdentity::Listener(id) => ("X-Backends", id.as_str()),
        }
    }
}

/// Request handler behind one listener.
pub struct ChaosBackend {
    routes: Arc<RouteTable>,
    identity: BackendIdentity,
}

impl ChaosBackend {
    pub fn new(routes: Arc<RouteTable>, identity: BackendIdentity) -> Self {
        Self { routes, identity }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub async fn handle(&self, ctx: &RequestContext, sink: &mut dyn ResponseSink) -> Emission {
        let params = &ctx.request.params;

        match self.routes.lookup(&ctx.request.path) {
            Route::DefaultPage => self.default_page(sink).await,
            Route::Slow => {
                let resolved = resolve(&FaultProfile::from_params(params));
                emit(&resolved, Shape::Streamed, sink).await
            }
            Route::Error => {
                let profile = FaultProfile::with_fallback_status(params, ERROR_ROUTE_STATUS);
                let resolved = resolve(&profile);
                emit(&resolved, Shape::OneShot, sink).await
            }
            Route::Reset => {
                let resolved = resolve(&FaultProfile::immediate_reset());
                emit(&resolved, Shape::OneShot, sink).await
            }
            Route::Unified => {
                let profile = FaultProfile::from_params(params);
                if !profile.supplied {
                    return self.default_page(sink).await;
                }
                // Shape follows the request, not the jitter draw.
                let shape = if profile.inter_byte_delay.is_zero() {
                    Shape::OneShot
                } else {
                    Shape::Streamed
                };
                emit(&resolve(&profile), shape, sink).await
            }
        }
    }

    async fn default_page(&self, sink: &mut dyn ResponseSink) -> Emission {
        let mut tagged = TaggedSink::new(sink, &self.identity);
        emit_page(&mut tagged).await
    }

    /// Serve the single request carried by `stream`, then close it.
    pub async fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", peer, e);
        }

        let request = match read_request(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("Connection from {} closed before sending a request", peer);
                return;
            }
            Err(e) => {
                warn!("Bad request from {}: {}", peer, e);
                let mut sink = TcpSink::new(stream);
                if let Err(e) = sink
                    .send(Response::text(StatusCode::BAD_REQUEST, "Bad Request\n"))
                    .await
                {
                    debug!("Failed to answer bad request from {}: {}", peer, e);
                }
                sink.close().await;
                return;
            }
        };

        let ctx = RequestContext::new(request, peer);
        let mut sink = TcpSink::new(stream);
        let emission = self.handle(&ctx, &mut sink).await;
        sink.close().await;

        info!(
            "Request completed - Peer: {}, Method: {}, Path: {}, Outcome: {}, Elapsed: {:?}",
            ctx.peer,
            ctx.request.method,
            ctx.request.path,
            emission,
            ctx.elapsed()
        );
    }
}
