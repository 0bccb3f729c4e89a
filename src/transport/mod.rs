//! HTTP/1.1 plumbing between a TCP connection and the fault engine.
//!
//! A handler only sees a [`ResponseSink`]. The two dangerous abilities the
//! engine needs are separate capabilities that a sink may decline to hand
//! out:
//!
//! - [`StreamingSink`]: write and flush the body one unit at a time.
//! - [`Hijacker`]: take the raw connection away from the HTTP layer and
//!   sever it. Obtained at most once per connection.

pub mod request;
pub mod tcp;

#[cfg(test)]
pub mod recording;

pub use request::*;
pub use tcp::*;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Sets `name`, replacing any existing value (names compare case-insensitively).
    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub head: ResponseHead,
    pub body: Bytes,
}

impl Response {
    /// Plain-text response, shaped like a Go `http.Error` reply.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            head: ResponseHead::new(status)
                .with_header("Content-Type", "text/plain; charset=utf-8")
                .with_header("X-Content-Type-Options", "nosniff"),
            body: Bytes::from(body.into()),
        }
    }

    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            head: ResponseHead::new(status).with_header("Content-Type", "text/html; charset=utf-8"),
            body: Bytes::from(body.into()),
        }
    }
}

/// How the body following a head is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Length(usize),
    Chunked,
}

/// 1xx, 204 and 304 responses end at the blank line after the head.
pub fn permits_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Serialize `head`. `framing` is ignored for statuses without a body.
pub fn encode_head(head: &ResponseHead, framing: Framing) -> Vec<u8> {
    let reason = head.status.canonical_reason().unwrap_or("Unknown");
    let mut out = format!("HTTP/1.1 {} {}\r\n", head.status.as_u16(), reason);
    for (name, value) in &head.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    if permits_body(head.status) {
        match framing {
            Framing::Length(len) => out.push_str(&format!("Content-Length: {}\r\n", len)),
            Framing::Chunked => out.push_str("Transfer-Encoding: chunked\r\n"),
        }
    }
    out.push_str("Connection: close\r\n\r\n");
    out.into_bytes()
}

/// Where a handler writes its response.
#[async_trait]
pub trait ResponseSink: Send {
    /// Write a complete response in one shot.
    async fn send(&mut self, response: Response) -> io::Result<()>;

    /// Incremental, flushed body writes, or `None` if the transport buffers.
    fn streaming(&mut self) -> Option<&mut dyn StreamingSink>;

    /// Take exclusive ownership of the raw connection. Returns `None` when
    /// unsupported or already taken.
    fn hijack(&mut self) -> Option<Hijacker>;
}

#[async_trait]
pub trait StreamingSink: Send {
    async fn start(&mut self, head: ResponseHead) -> io::Result<()>;

    /// Queue one unit of body. Nothing reaches the peer before [`flush`](Self::flush).
    async fn write_unit(&mut self, unit: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;

    async fn finish(&mut self) -> io::Result<()>;
}

/// A raw connection that can only be dropped on the floor.
pub trait Severable: Send {
    fn sever(self: Box<Self>);
}

/// Exclusive ownership of a connection, taken away from the HTTP layer.
pub struct Hijacker {
    conn: Box<dyn Severable>,
}

impl Hijacker {
    pub fn new<C: Severable + 'static>(conn: C) -> Self {
        Self {
            conn: Box::new(conn),
        }
    }

    /// Close the connection without writing anything further.
    pub fn sever(self) {
        self.conn.sever();
    }
}
