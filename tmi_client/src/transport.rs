use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use crate::TransportError;

/// An already-connected duplex byte stream to the chat service.
///
/// The engine does not open connections and does not retry; establishing
/// the stream (and any reconnect policy) belongs to the application.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one outbound line. Lines produced by the engine are already
    /// CRLF-terminated.
    async fn send_text(&self, line: &str) -> Result<(), TransportError>;

    /// Read one received payload, which may contain several CRLF-separated
    /// frames. Returns [`TransportError::Closed`] at end of stream.
    async fn receive_text(&self) -> Result<String, TransportError>;

    /// Close the stream.
    async fn close(&self) -> Result<(), TransportError>;
}

/// [`Transport`] over any connected duplex stream.
pub struct StreamTransport<S: AsyncRead + AsyncWrite + Send + 'static> {
    reader: Mutex<Lines<BufReader<ReadHalf<S>>>>,
    writer: Mutex<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(BufReader::new(read).lines()),
            writer: Mutex::new(write),
        }
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Send + 'static> Transport for StreamTransport<S> {
    async fn send_text(&self, line: &str) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive_text(&self) -> Result<String, TransportError> {
        match self.reader.lock().await.next_line().await? {
            Some(line) => Ok(line),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}
