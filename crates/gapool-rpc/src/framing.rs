// crates/gapool-rpc/src/framing.rs
//
// Bounded newline framing for inbound requests.
//
// Lines are read as raw bytes, so a line that is not UTF-8 or that runs
// past the length cap comes back as a frame of its own rather than as an
// I/O error. The remainder of an oversized line is skipped up to its
// newline without being buffered.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest request line accepted, excluding the newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// One unit of inbound input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, without its line ending.
    Line(String),
    /// A line whose bytes are not valid UTF-8.
    InvalidUtf8,
    /// A line longer than the cap.
    TooLong,
    /// The peer closed its write half.
    Eof,
}

/// Splits a buffered reader into bounded lines.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    max_len: usize,
    /// Set after a `TooLong` frame whose newline has not been seen yet.
    skipping: bool,
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_LINE_BYTES)
    }

    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            max_len: max_len.max(1),
            skipping: false,
        }
    }

    /// Read the next frame.
    ///
    /// Buffers at most `max_len + 1` bytes regardless of what the peer sends.
    pub async fn next_frame(&mut self) -> io::Result<Frame> {
        if self.skipping {
            if !self.skip_line().await? {
                return Ok(Frame::Eof);
            }
            self.skipping = false;
        }

        self.buf.clear();
        let limit = self.max_len as u64 + 1;
        let read = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if read == 0 {
            return Ok(Frame::Eof);
        }

        let terminated = self.buf.last() == Some(&b'\n');
        if terminated {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        if self.buf.len() > self.max_len {
            self.skipping = !terminated;
            return Ok(Frame::TooLong);
        }

        // An unterminated line here means the peer hit EOF mid-line; it is
        // still handed out, and the next read reports Eof.
        match std::str::from_utf8(&self.buf) {
            Ok(line) => Ok(Frame::Line(line.to_owned())),
            Err(_) => Ok(Frame::InvalidUtf8),
        }
    }

    /// Consume input through the next newline. Returns `false` on EOF.
    async fn skip_line(&mut self) -> io::Result<bool> {
        loop {
            let (found, used) = {
                let chunk = self.inner.fill_buf().await?;
                if chunk.is_empty() {
                    return Ok(false);
                }
                match chunk.iter().position(|b| *b == b'\n') {
                    Some(pos) => (true, pos + 1),
                    None => (false, chunk.len()),
                }
            };
            self.inner.consume(used);
            if found {
                return Ok(true);
            }
        }
    }
}
