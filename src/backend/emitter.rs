use super::page;
use crate::fault::ResolvedProfile;
use crate::transport::{permits_body, Response, ResponseHead, ResponseSink, StreamingSink};
use http::StatusCode;
use log::{debug, info, warn};
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::time::sleep;

pub const SLOW_PAYLOAD_PREFIX: &str = "Example content delivered slowly.";

/// How a non-reset response is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    OneShot,
    Streamed,
}

/// The terminal behaviour a request ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    Page,
    Complete(StatusCode),
    Streamed { status: StatusCode, units: usize },
    Severed,
    /// The transport lacked a capability; a 500 went out instead.
    Unsupported(&'static str),
    /// The peer went away mid-response.
    Aborted { units: usize },
}

impl fmt::Display for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emission::Page => write!(f, "default page"),
            Emission::Complete(status) => write!(f, "status {}", status.as_u16()),
            Emission::Streamed { status, units } => {
                write!(f, "streamed status {} ({} units)", status.as_u16(), units)
            }
            Emission::Severed => write!(f, "severed"),
            Emission::Unsupported(capability) => write!(f, "{} unsupported", capability),
            Emission::Aborted { units } => write!(f, "aborted after {} units", units),
        }
    }
}

pub fn slow_payload(connect_delay: Duration, inter_byte_delay: Duration) -> String {
    format!(
        "{} Connect:{:?} Betweenbytes:{:?}",
        SLOW_PAYLOAD_PREFIX, connect_delay, inter_byte_delay
    )
}

/// Deliver `resolved` onto `sink`.
///
/// The connect delay always comes first. A firing reset then wins over
/// anything else, and no response bytes are written.
pub async fn emit(resolved: &ResolvedProfile, shape: Shape, sink: &mut dyn ResponseSink) -> Emission {
    if !resolved.connect_delay.is_zero() {
        sleep(resolved.connect_delay).await;
    }

    let outcome = if resolved.reset {
        sever(sink).await
    } else {
        match shape {
            Shape::OneShot => send_diagnostic(resolved, sink).await,
            Shape::Streamed => stream_slowly(resolved, sink).await,
        }
    };

    outcome.unwrap_or_else(|e| {
        debug!("Client connection failed mid-response: {}", e);
        Emission::Aborted { units: 0 }
    })
}

pub async fn emit_page(sink: &mut dyn ResponseSink) -> Emission {
    match sink
        .send(Response::html(StatusCode::OK, page::default_page()))
        .await
    {
        Ok(()) => Emission::Page,
        Err(e) => {
            debug!("Failed to write default page: {}", e);
            Emission::Aborted { units: 0 }
        }
    }
}

async fn send_diagnostic(
    resolved: &ResolvedProfile,
    sink: &mut dyn ResponseSink,
) -> io::Result<Emission> {
    let code = resolved.status.as_u16();
    info!(
        "Returning Statuscode: {} after {:?}",
        code, resolved.connect_delay
    );
    let body = format!(
        "Returning Statuscode: {} after {:?}\n",
        code, resolved.connect_delay
    );
    sink.send(Response::text(resolved.status, body)).await?;
    Ok(Emission::Complete(resolved.status))
}

async fn stream_slowly(
    resolved: &ResolvedProfile,
    sink: &mut dyn ResponseSink,
) -> io::Result<Emission> {
    if !permits_body(resolved.status) {
        info!(
            "Status {} carries no body, answering without streaming",
            resolved.status.as_u16()
        );
        return send_diagnostic(resolved, sink).await;
    }

    let payload = slow_payload(resolved.connect_delay, resolved.inter_byte_delay);
    info!("{}", payload);

    if let Some(stream) = sink.streaming() {
        return stream_units(stream, resolved, &payload).await;
    }

    warn!("Transport cannot flush incrementally, refusing to buffer a slow response");
    sink.send(Response::text(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Streaming unsupported!\n",
    ))
    .await?;
    Ok(Emission::Unsupported("streaming"))
}

async fn stream_units(
    stream: &mut dyn StreamingSink,
    resolved: &ResolvedProfile,
    payload: &str,
) -> io::Result<Emission> {
    let head = ResponseHead::new(resolved.status)
        .with_header("Content-Type", "text/event-stream")
        .with_header("Cache-Control", "no-cache");
    stream.start(head).await?;

    let units: Vec<&str> = payload
        .char_indices()
        .map(|(start, c)| &payload[start..start + c.len_utf8()])
        .collect();

    for (index, unit) in units.iter().enumerate() {
        let delivered = match stream.write_unit(unit.as_bytes()).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = delivered {
            debug!("Stream stopped after {} units: {}", index, e);
            return Ok(Emission::Aborted { units: index });
        }

        if index + 1 < units.len() && !resolved.inter_byte_delay.is_zero() {
            sleep(resolved.inter_byte_delay).await;
        }
    }

    stream.finish().await?;
    Ok(Emission::Streamed {
        status: resolved.status,
        units: units.len(),
    })
}

async fn sever(sink: &mut dyn ResponseSink) -> io::Result<Emission> {
    if let Some(hijacker) = sink.hijack() {
        info!("Severing connection without a response");
        hijacker.sever();
        return Ok(Emission::Severed);
    }

    warn!("Transport does not support hijacking");
    sink.send(Response::text(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Hijacking unsupported\n",
    ))
    .await?;
    Ok(Emission::Unsupported("hijack"))
}
