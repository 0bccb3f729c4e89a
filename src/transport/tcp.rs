use super::{
    encode_head, permits_body, Framing, Hijacker, Response, ResponseHead, ResponseSink, Severable,
    StreamingSink,
};
use async_trait::async_trait;
use log::debug;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// Response side of one accepted TCP connection.
///
/// Supports both capabilities: chunked streaming with an explicit flush per
/// unit, and hijacking, after which every write fails with `NotConnected`.
pub struct TcpSink {
    writer: Option<BufWriter<TcpStream>>,
}

impl TcpSink {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            writer: Some(BufWriter::new(stream)),
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<TcpStream>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection hijacked"))
    }

    /// Flush what is left and half-close. A hijacked sink has nothing to close.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush().await {
                debug!("Flush on close failed: {}", e);
            }
            if let Err(e) = writer.shutdown().await {
                debug!("Shutdown on close failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl ResponseSink for TcpSink {
    async fn send(&mut self, response: Response) -> io::Result<()> {
        let writer = self.writer()?;
        let head = encode_head(&response.head, Framing::Length(response.body.len()));
        writer.write_all(&head).await?;
        if permits_body(response.head.status) {
            writer.write_all(&response.body).await?;
        }
        writer.flush().await
    }

    fn streaming(&mut self) -> Option<&mut dyn StreamingSink> {
        if self.writer.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn hijack(&mut self) -> Option<Hijacker> {
        // Anything still buffered is dropped along with the connection.
        self.writer
            .take()
            .map(|writer| Hijacker::new(writer.into_inner()))
    }
}

#[async_trait]
impl StreamingSink for TcpSink {
    async fn start(&mut self, head: ResponseHead) -> io::Result<()> {
        let writer = self.writer()?;
        writer.write_all(&encode_head(&head, Framing::Chunked)).await?;
        writer.flush().await
    }

    async fn write_unit(&mut self, unit: &[u8]) -> io::Result<()> {
        let writer = self.writer()?;
        writer
            .write_all(format!("{:x}\r\n", unit.len()).as_bytes())
            .await?;
        writer.write_all(unit).await?;
        writer.write_all(b"\r\n").await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush().await
    }

    async fn finish(&mut self) -> io::Result<()> {
        let writer = self.writer()?;
        writer.write_all(b"0\r\n\r\n").await?;
        writer.flush().await
    }
}

impl Severable for TcpStream {
    fn sever(self: Box<Self>) {
        // Zero linger turns the close into an RST instead of a FIN.
        #[allow(deprecated)]
        let lingered = self.set_linger(Some(Duration::ZERO));
        if let Err(e) = lingered {
            debug!("Could not set zero linger before sever: {}", e);
        }
        drop(self);
    }
}
