use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, Take};
use tracing::{debug, info};

use crate::catalog::filter::ExtensionFilter;
use crate::config::{MAX_CHUNK_SIZE, ShareConfig};
use crate::domain::TransferOutcome;
use crate::error::{Result, ShareError};
use crate::registry::ProgressRegistry;

/// The receiving side refused a chunk; the peer is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Destination of a transfer. `send` may suspend to apply backpressure.
pub trait ChunkSink: Send {
    fn send(
        &mut self,
        chunk: Vec<u8>,
    ) -> impl Future<Output = std::result::Result<(), SinkClosed>> + Send;
}

impl ChunkSink for tokio::sync::mpsc::Sender<Vec<u8>> {
    async fn send(&mut self, chunk: Vec<u8>) -> std::result::Result<(), SinkClosed> {
        tokio::sync::mpsc::Sender::send(self, chunk)
            .await
            .map_err(|_| SinkClosed)
    }
}

/// Receives per-chunk progress for one file.
pub trait ProgressObserver: Send + Sync {
    /// A transfer of `total` bytes is starting.
    fn begin(&self, id: &str, total: u64);
    fn record(&self, id: &str, fraction: f64);
    /// The transfer stopped; `completed` is false for disconnects and aborts.
    fn end(&self, _id: &str, _completed: bool) {}
}

impl ProgressObserver for ProgressRegistry {
    fn begin(&self, id: &str, _total: u64) {
        self.set_progress(id, 0.0);
    }

    fn record(&self, id: &str, fraction: f64) {
        self.set_progress(id, fraction);
    }
}

impl<T: ProgressObserver + ?Sized> ProgressObserver for Arc<T> {
    fn begin(&self, id: &str, total: u64) {
        (**self).begin(id, total)
    }

    fn record(&self, id: &str, fraction: f64) {
        (**self).record(id, fraction)
    }

    fn end(&self, id: &str, completed: bool) {
        (**self).end(id, completed)
    }
}

/// Sequential fixed-size chunk producer over any async reader.
pub struct ChunkReader<R> {
    inner: R,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
        }
    }

    /// Next chunk, filled to `chunk_size` unless the input ends first.
    /// `None` at end of input.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }
}

/// Opens files under the serving root for streaming.
#[derive(Clone, Debug)]
pub struct ChunkStreamer {
    root: PathBuf,
    chunk_size: usize,
    filter: ExtensionFilter,
}

impl ChunkStreamer {
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize, filter: ExtensionFilter) -> Self {
        Self {
            root: root.into(),
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
            filter,
        }
    }

    pub fn from_config(cfg: &ShareConfig) -> Self {
        Self::new(&cfg.root, cfg.chunk_size, ExtensionFilter::from_config(cfg))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        if !self.filter.accepts_id(id) {
            return Err(ShareError::NotFound(id.to_string()));
        }
        Ok(self.root.join(id))
    }

    /// Open `id` and capture its size. Anything that is not an existing
    /// regular file is `NotFound`.
    pub async fn open(&self, id: &str) -> Result<Transfer> {
        let path = self.resolve(id)?;
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ShareError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(ShareError::NotFound(id.to_string()));
        }
        let size = meta.len();
        Ok(Transfer {
            id: id.to_string(),
            size,
            reader: ChunkReader::new(file.take(size), self.chunk_size),
        })
    }

    pub async fn stream<S, O>(&self, id: &str, sink: &mut S, observer: &O) -> Result<TransferOutcome>
    where
        S: ChunkSink,
        O: ProgressObserver + ?Sized,
    {
        self.open(id).await?.stream(sink, observer).await
    }
}

/// One opened file, ready to be streamed once.
pub struct Transfer {
    id: String,
    size: u64,
    reader: ChunkReader<Take<File>>,
}

impl Transfer {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Size captured when the file was opened.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Push every chunk to `sink` in file order, reporting progress after
    /// each accepted chunk.
    pub async fn stream<S, O>(mut self, sink: &mut S, observer: &O) -> Result<TransferOutcome>
    where
        S: ChunkSink,
        O: ProgressObserver + ?Sized,
    {
        observer.begin(&self.id, self.size);
        let result = self.pump(sink, observer).await;
        observer.end(
            &self.id,
            matches!(result, Ok(TransferOutcome::Completed { .. })),
        );
        result
    }

    async fn pump<S, O>(&mut self, sink: &mut S, observer: &O) -> Result<TransferOutcome>
    where
        S: ChunkSink,
        O: ProgressObserver + ?Sized,
    {
        let mut sent = 0u64;
        let mut chunks = 0u64;

        loop {
            let chunk = match self.reader.next_chunk().await {
                Ok(Some(c)) => c,
                Ok(None) => break,
                Err(source) => {
                    return Err(ShareError::TransferAborted {
                        id: self.id.clone(),
                        sent,
                        source,
                    });
                }
            };
            let n = chunk.len() as u64;
            if sink.send(chunk).await.is_err() {
                info!(id = %self.id, bytes = sent, "client disconnected, transfer cancelled");
                return Ok(TransferOutcome::Cancelled {
                    bytes: sent,
                    chunks,
                });
            }
            sent += n;
            chunks += 1;
            observer.record(&self.id, sent as f64 / self.size as f64);
        }

        if sent < self.size {
            return Err(ShareError::TransferAborted {
                id: self.id.clone(),
                sent,
                source: std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "file shrank or vanished during transfer",
                ),
            });
        }
        if chunks == 0 {
            observer.record(&self.id, 1.0);
        }

        debug!(id = %self.id, bytes = sent, chunks, "transfer complete");
        Ok(TransferOutcome::Completed {
            bytes: sent,
            chunks,
        })
    }
}
