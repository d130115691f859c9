// ABOUTME: Background writer task that owns the dump destination
// ABOUTME: Drains a FIFO line queue and shuts down only after a full drain

use crate::error::{DumpError, Result};
use std::num::NonZeroUsize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const LINE_TERMINATOR: &[u8] = b"\n";

/// Messages consumed by the sink task
#[derive(Debug)]
pub enum SinkMessage {
    Line(String),
    /// No further input will be produced
    Close,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SinkOptions {
    /// Bound on queued lines; `None` queues without limit.
    ///
    /// A bounded queue makes `send_line` wait while the destination catches up.
    pub capacity: Option<NonZeroUsize>,
}

#[derive(Debug, Clone)]
enum QueueTx {
    Unbounded(mpsc::UnboundedSender<SinkMessage>),
    Bounded(mpsc::Sender<SinkMessage>),
}

#[derive(Debug)]
enum QueueRx {
    Unbounded(mpsc::UnboundedReceiver<SinkMessage>),
    Bounded(mpsc::Receiver<SinkMessage>),
}

impl QueueRx {
    async fn recv(&mut self) -> Option<SinkMessage> {
        match self {
            QueueRx::Unbounded(rx) => rx.recv().await,
            QueueRx::Bounded(rx) => rx.recv().await,
        }
    }

    /// Refuse new messages while keeping already queued ones receivable
    fn close(&mut self) {
        match self {
            QueueRx::Unbounded(rx) => rx.close(),
            QueueRx::Bounded(rx) => rx.close(),
        }
    }
}

fn queue(options: SinkOptions) -> (QueueTx, QueueRx) {
    match options.capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.get());
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        }
    }
}

/// Producer handle for appending lines to a sink
#[derive(Debug, Clone)]
pub struct LineSender {
    tx: QueueTx,
}

impl LineSender {
    /// Queue `line`; the sink appends the line terminator when writing it.
    ///
    /// On a bounded sink this blocks the calling thread while the queue is
    /// full, so producers with a bounded sink must run outside the async
    /// runtime (for example under `spawn_blocking`).
    ///
    /// # Errors
    ///
    /// `DumpError::SinkClosed` if the consumer has stopped, usually because a
    /// write failed. The underlying failure is reported by [`AsyncSink::close`].
    pub fn send_line(&self, line: impl Into<String>) -> Result<()> {
        let message = SinkMessage::Line(line.into());
        match &self.tx {
            QueueTx::Unbounded(tx) => tx.send(message).map_err(|_| DumpError::SinkClosed),
            QueueTx::Bounded(tx) => tx.blocking_send(message).map_err(|_| DumpError::SinkClosed),
        }
    }

    async fn send(&self, message: SinkMessage) -> Result<()> {
        match &self.tx {
            QueueTx::Unbounded(tx) => tx.send(message).map_err(|_| DumpError::SinkClosed),
            QueueTx::Bounded(tx) => tx.send(message).await.map_err(|_| DumpError::SinkClosed),
        }
    }
}

/// What the consumer hands back after a clean shutdown
#[derive(Debug)]
pub struct SinkOutcome<W> {
    /// The destination writer, flushed. Already shut down if the sink owned it.
    pub writer: W,
    pub lines_written: u64,
}

/// Single consumer that exclusively owns the destination writer.
///
/// Lines are written in exactly the order they were queued. Shutdown is
/// cooperative: [`AsyncSink::close`] queues a terminal [`SinkMessage::Close`],
/// and the consumer flushes and releases the destination only once every line
/// queued before it has been written.
pub struct AsyncSink<W> {
    sender: LineSender,
    task: JoinHandle<Result<SinkOutcome<W>>>,
}

impl AsyncSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write the dump into it.
    ///
    /// The sink owns the file and closes it on shutdown.
    pub async fn create(path: impl AsRef<Path>, options: SinkOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).await.map_err(|e| {
            DumpError::config(format!(
                "cannot create output file '{}': {}",
                path.display(),
                e
            ))
        })?;
        tracing::info!("Writing dump to {}", path.display());
        Ok(Self::spawn(BufWriter::new(file), options, true))
    }
}

impl<W> AsyncSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Write into a caller-supplied destination.
    ///
    /// The sink flushes the writer but leaves closing it to the caller, who
    /// gets it back from [`AsyncSink::close`].
    pub fn from_writer(writer: W, options: SinkOptions) -> Self {
        Self::spawn(writer, options, false)
    }

    fn spawn(writer: W, options: SinkOptions, owns_destination: bool) -> Self {
        let (tx, rx) = queue(options);
        let task = tokio::spawn(consume(rx, writer, owns_destination));
        Self {
            sender: LineSender { tx },
            task,
        }
    }

    pub fn handle(&self) -> LineSender {
        self.sender.clone()
    }

    /// Signal end of input, wait for the full drain, and release the destination
    pub async fn close(self) -> Result<SinkOutcome<W>> {
        // A consumer that already died reports its own error below
        let _ = self.sender.send(SinkMessage::Close).await;
        drop(self.sender);

        let outcome = self.task.await.map_err(|e| {
            DumpError::Sink(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("sink task failed: {}", e),
            ))
        })??;

        tracing::debug!("Sink closed after {} line(s)", outcome.lines_written);
        Ok(outcome)
    }
}

async fn consume<W>(mut rx: QueueRx, mut writer: W, owns_destination: bool) -> Result<SinkOutcome<W>>
where
    W: AsyncWrite + Unpin,
{
    let mut lines_written = 0u64;

    while let Some(message) = rx.recv().await {
        match message {
            SinkMessage::Line(line) => {
                write_line(&mut writer, &line).await?;
                lines_written += 1;
            }
            SinkMessage::Close => break,
        }
    }

    // Stop observed; anything other handles raced in is still written
    rx.close();
    while let Some(message) = rx.recv().await {
        if let SinkMessage::Line(line) = message {
            write_line(&mut writer, &line).await?;
            lines_written += 1;
        }
    }

    writer.flush().await?;
    if owns_destination {
        writer.shutdown().await?;
    }

    Ok(SinkOutcome {
        writer,
        lines_written,
    })
}

async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(LINE_TERMINATOR).await?;
    Ok(())
}
