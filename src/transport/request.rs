use crate::fault::Params;
use http::Uri;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const MAX_HEAD_BYTES: usize = 16 * 1024;

/// The parts of an inbound request the backend routes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub params: Params,
}

impl Request {
    /// Parse the request line of a raw head. Header lines are ignored.
    pub fn parse_head(head: &str) -> Option<Self> {
        let mut parts = head.lines().next()?.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;
        if !parts.next()?.starts_with("HTTP/") {
            return None;
        }

        let uri: Uri = target.parse().ok()?;
        Some(Self {
            method: method.to_string(),
            path: uri.path().to_string(),
            params: uri.query().map(parse_query).unwrap_or_default(),
        })
    }
}

/// Read one request head from `reader`.
///
/// `Ok(None)` means the peer closed before sending anything.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Request>> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if buffer.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
        if buffer.len() > MAX_HEAD_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }

    let head = String::from_utf8_lossy(&buffer);
    Request::parse_head(&head)
        .map(Some)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed request line"))
}

/// Decode a query string. Repeated keys keep their first value.
pub fn parse_query(query: &str) -> Params {
    let mut params = Params::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.entry(decode(key)).or_insert_with(|| decode(value));
    }
    params
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).map(|value| value.into_owned());
    decoded.unwrap_or(spaced)
}
