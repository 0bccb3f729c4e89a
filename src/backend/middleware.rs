use super::BackendIdentity;
use crate::transport::{Hijacker, Response, ResponseSink, StreamingSink};
use async_trait::async_trait;
use std::io;

/// Wraps a sink so one-shot responses carry the backend's identity header.
pub struct TaggedSink<'a> {
    inner: &'a mut dyn ResponseSink,
    identity: &'a BackendIdentity,
}

impl<'a> TaggedSink<'a> {
    pub fn new(inner: &'a mut dyn ResponseSink, identity: &'a BackendIdentity) -> Self {
        Self { inner, identity }
    }
}

#[async_trait]
impl<'a> ResponseSink for TaggedSink<'a> {
    async fn send(&mut self, mut response: Response) -> io::Result<()> {
        let (name, value) = self.identity.header();
        response.head.insert_header(name, value);
        self.inner.send(response).await
    }

    fn streaming(&mut self) -> Option<&mut dyn StreamingSink> {
        self.inner.streaming()
    }

    fn hijack(&mut self) -> Option<Hijacker> {
        self.inner.hijack()
    }
}
