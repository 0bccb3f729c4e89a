use crate::transport::Request;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Everything known about one request. Built per request, never shared.
pub struct RequestContext {
    pub request: Request,
    pub peer: SocketAddr,
    pub started: Instant,
}

impl RequestContext {
    pub fn new(request: Request, peer: SocketAddr) -> Self {
        Self {
            request,
            peer,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
