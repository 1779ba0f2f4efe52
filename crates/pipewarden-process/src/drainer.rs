//! Stream drainer - reads one output stream to exhaustion

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use crate::{
    config::DEFAULT_READ_BUFFER_SIZE,
    error::ProcessError,
    event::{Event, StreamSource},
};

/// Summary returned when a drainer finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Stream that was drained
    pub source: StreamSource,
    /// Total bytes forwarded
    pub bytes: u64,
    /// Number of chunks forwarded
    pub chunks: u64,
    /// Whether draining stopped on a read error
    pub failed: bool,
}

/// Reads a byte stream and forwards every non-empty read as an output event
///
/// Closure is signalled by dropping the sink sender when [`Drainer::run`]
/// returns, on every exit path, so it happens exactly once.
#[derive(Debug, Clone, Copy)]
pub struct Drainer {
    source: StreamSource,
    buffer_size: usize,
}

impl Drainer {
    /// Create a drainer for the given stream
    pub fn new(source: StreamSource) -> Self {
        Self {
            source,
            buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Set the maximum bytes per read
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Stream this drainer reads
    pub fn source(&self) -> StreamSource {
        self.source
    }

    /// Drain `reader` until end-of-stream or an unrecoverable read error
    ///
    /// A read returning `Ok(0)` is end-of-stream; any bytes read before it were
    /// already forwarded, so nothing trailing is lost.
    pub async fn run<R>(self, mut reader: R, sink: UnboundedSender<Event>) -> DrainReport
    where
        R: AsyncRead + Unpin,
    {
        let source = self.source;
        let mut report = DrainReport {
            source,
            bytes: 0,
            chunks: 0,
            failed: false,
        };
        let mut buf = vec![0u8; self.buffer_size];

        debug!(stream = %source, "Drainer started");

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    report.bytes += n as u64;
                    report.chunks += 1;
                    trace!(stream = %source, bytes = n, "Read chunk");

                    // Receiver gone: keep reading so the child never blocks on a full pipe.
                    let _ = sink.send(Event::Output {
                        source,
                        data: buf[..n].to_vec(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(stream = %source, error = %e, "Stream read failed");
                    report.failed = true;
                    let _ = sink.send(Event::StreamError {
                        source,
                        error: ProcessError::ReadFailed {
                            stream: source,
                            error: e,
                        },
                    });
                    break;
                }
            }
        }

        debug!(
            stream = %source,
            bytes = report.bytes,
            chunks = report.chunks,
            failed = report.failed,
            "Drainer closed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio::sync::mpsc;

    async fn collect(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_forwards_all_bytes_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"hello drainer, this spans several small reads";

        let report = Drainer::new(StreamSource::Stdout)
            .buffer_size(4)
            .run(input, tx)
            .await;

        let events = collect(&mut rx).await;
        let mut data = Vec::new();
        for event in events {
            match event {
                Event::Output { source, data: chunk } => {
                    assert_eq!(source, StreamSource::Stdout);
                    assert!(!chunk.is_empty() && chunk.len() <= 4);
                    data.extend(chunk);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(data, input);
        assert_eq!(report.bytes, input.len() as u64);
        assert!(!report.failed);
    }

    #[tokio::test]
    async fn test_trailing_partial_read_is_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = tokio_test::io::Builder::new()
            .read(b"abcd")
            .read(b"e")
            .build();

        let report = Drainer::new(StreamSource::Stderr)
            .buffer_size(4)
            .run(reader, tx)
            .await;

        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Event::Output { data, .. } if data == b"e"));
        assert_eq!(report.bytes, 5);
    }

    #[tokio::test]
    async fn test_empty_stream_closes_without_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let report = Drainer::new(StreamSource::Stderr).run(&b""[..], tx).await;

        assert!(collect(&mut rx).await.is_empty());
        assert_eq!(report.chunks, 0);
    }

    #[tokio::test]
    async fn test_read_error_emits_event_and_stops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "boom"))
            .build();

        let report = Drainer::new(StreamSource::Stdout).run(reader, tx).await;

        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_output());
        assert!(matches!(
            &events[1],
            Event::StreamError {
                source: StreamSource::Stdout,
                error: ProcessError::ReadFailed { .. },
            }
        ));
        assert!(report.failed);
    }

    #[tokio::test]
    async fn test_keeps_reading_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let input = vec![7u8; 64 * 1024];

        let report = Drainer::new(StreamSource::Stdout)
            .run(input.as_slice(), tx)
            .await;

        assert_eq!(report.bytes, input.len() as u64);
    }
}
