//! In-memory sink for exercising handlers without sockets.

use super::{Hijacker, Response, ResponseHead, ResponseSink, Severable, StreamingSink};
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Sent(Response),
    Started(ResponseHead),
    Unit(Vec<u8>),
    Flushed,
    Finished,
}

pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
    streaming: bool,
    hijackable: bool,
    fail_after_units: Option<usize>,
    severed: Arc<AtomicBool>,
}

struct RecordedConnection(Arc<AtomicBool>);

impl Severable for RecordedConnection {
    fn sever(self: Box<Self>) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            streaming: true,
            hijackable: true,
            fail_after_units: None,
            severed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    pub fn without_hijack(mut self) -> Self {
        self.hijackable = false;
        self
    }

    /// Writes fail like a vanished peer once `units` units went through.
    pub fn failing_after(mut self, units: usize) -> Self {
        self.fail_after_units = Some(units);
        self
    }

    pub fn severed(&self) -> bool {
        self.severed.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Option<&Response> {
        self.events.iter().find_map(|event| match event {
            SinkEvent::Sent(response) => Some(response),
            _ => None,
        })
    }

    pub fn started(&self) -> Option<&ResponseHead> {
        self.events.iter().find_map(|event| match event {
            SinkEvent::Started(head) => Some(head),
            _ => None,
        })
    }

    pub fn units(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Unit(unit) => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SinkEvent::Flushed))
            .count()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn send(&mut self, response: Response) -> io::Result<()> {
        self.events.push(SinkEvent::Sent(response));
        Ok(())
    }

    fn streaming(&mut self) -> Option<&mut dyn StreamingSink> {
        if self.streaming {
            Some(self)
        } else {
            None
        }
    }

    fn hijack(&mut self) -> Option<Hijacker> {
        if !self.hijackable {
            return None;
        }
        self.hijackable = false;
        self.streaming = false;
        Some(Hijacker::new(RecordedConnection(self.severed.clone())))
    }
}

#[async_trait]
impl StreamingSink for RecordingSink {
    async fn start(&mut self, head: ResponseHead) -> io::Result<()> {
        self.events.push(SinkEvent::Started(head));
        Ok(())
    }

    async fn write_unit(&mut self, unit: &[u8]) -> io::Result<()> {
        let written = self.units().len();
        if self.fail_after_units.is_some_and(|limit| written >= limit) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        self.events.push(SinkEvent::Unit(unit.to_vec()));
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.events.push(SinkEvent::Flushed);
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.events.push(SinkEvent::Finished);
        Ok(())
    }
}
