//! Streaming gzip over async readers.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_compression::tokio::bufread::GzipEncoder;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};

/// Owned byte source handed between orchestrators and collaborators.
pub type Payload = Pin<Box<dyn AsyncRead + Send>>;

/// Wrap any reader as a [`Payload`].
pub fn payload<R>(reader: R) -> Payload
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(reader)
}

/// Gzip encoder that reads from a source and yields compressed bytes.
///
/// [`reset`](Self::reset) swaps in a new source so one value can be reused
/// across payloads. An encoder with no source reads as empty.
#[derive(Default)]
pub struct GzipStream {
    inner: Option<GzipEncoder<BufReader<Payload>>>,
}

impl GzipStream {
    pub fn new(source: Payload) -> Self {
        let mut stream = Self::default();
        stream.reset(source);
        stream
    }

    /// Discard the current source (and any unread output) and start over on `source`.
    pub fn reset(&mut self, source: Payload) {
        self.inner = Some(GzipEncoder::new(BufReader::new(source)));
    }

    pub fn into_payload(self) -> Payload {
        Box::pin(self)
    }
}

impl AsyncRead for GzipStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().inner.as_mut() {
            Some(encoder) => Pin::new(encoder).poll_read(cx, buf),
            None => Poll::Ready(Ok(())),
        }
    }
}

/// Compress a whole payload into memory.
pub async fn gzip_all(source: Payload) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzipStream::new(source).read_to_end(&mut out).await?;
    Ok(out)
}
