//! Merges a process's stdout and stderr readers into ordered chunks.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{BackendError, OutputChunk, StreamKind};

const READ_BUFFER_SIZE: usize = 4096;

/// Reads whichever of stdout/stderr has data first.
///
/// Each successful read becomes one [`OutputChunk`]; chunks are never merged.
pub struct OutputStreams<O, E> {
    stdout: Option<O>,
    stderr: Option<E>,
    out_buf: Box<[u8]>,
    err_buf: Box<[u8]>,
}

impl<O, E> OutputStreams<O, E>
where
    O: AsyncRead + Unpin + Send,
    E: AsyncRead + Unpin + Send,
{
    #[must_use]
    pub fn new(stdout: Option<O>, stderr: Option<E>) -> Self {
        Self {
            stdout,
            stderr,
            out_buf: vec![0; READ_BUFFER_SIZE].into_boxed_slice(),
            err_buf: vec![0; READ_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Next chunk from either stream; `None` once both have ended.
    ///
    /// Cancel-safe.
    pub async fn next(&mut self) -> Option<Result<OutputChunk, BackendError>> {
        loop {
            if self.stdout.is_none() && self.stderr.is_none() {
                return None;
            }

            let (stream, result) = tokio::select! {
                r = read_from(&mut self.stdout, &mut self.out_buf) => (StreamKind::Stdout, r),
                r = read_from(&mut self.stderr, &mut self.err_buf) => (StreamKind::Stderr, r),
            };

            match result {
                Ok(0) => match stream {
                    StreamKind::Stdout => self.stdout = None,
                    StreamKind::Stderr => self.stderr = None,
                },
                Ok(n) => {
                    let buf = match stream {
                        StreamKind::Stdout => &self.out_buf,
                        StreamKind::Stderr => &self.err_buf,
                    };
                    return Some(Ok(OutputChunk {
                        stream,
                        data: Bytes::copy_from_slice(&buf[..n]),
                    }));
                }
                Err(e) => return Some(Err(BackendError::Io(e))),
            }
        }
    }
}

/// Read from an optional reader; a missing reader never completes.
async fn read_from<R>(reader: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncWriteExt, duplex};

    use super::*;

    #[tokio::test]
    async fn test_reads_both_streams_until_eof() {
        let (mut out_w, out_r) = duplex(64);
        let (mut err_w, err_r) = duplex(64);
        let mut streams = OutputStreams::new(Some(out_r), Some(err_r));

        out_w.write_all(b"hello").await.unwrap();
        let chunk = streams.next().await.unwrap().unwrap();
        assert_eq!(chunk.stream, StreamKind::Stdout);
        assert_eq!(chunk.data, &b"hello"[..]);

        err_w.write_all(b"oops").await.unwrap();
        let chunk = streams.next().await.unwrap().unwrap();
        assert_eq!(chunk.stream, StreamKind::Stderr);
        assert_eq!(chunk.data, &b"oops"[..]);

        drop(out_w);
        drop(err_w);
        assert!(streams.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stdout_only() {
        let mut streams = OutputStreams::<&[u8], &[u8]>::new(Some(&b"abc"[..]), None);
        assert_eq!(streams.next().await.unwrap().unwrap().data, &b"abc"[..]);
        assert!(streams.next().await.is_none());
    }
}
