// src/driver/lines.rs

//! Line sources: a lazy, non-restartable sequence of output lines that ends
//! when the producer closes its output.
//!
//! - [`ChildLines`] wraps any `AsyncRead` (the child's stdout in production).
//!   Bytes that are not valid UTF-8 are replaced with U+FFFD rather than
//!   ending the stream.
//! - [`ScriptedLines`] replays an in-memory sequence, so matching logic can
//!   be exercised without spawning a process.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Trait abstracting where output lines come from.
///
/// `next_line` must be cancel-safe: the driver polls it inside
/// `tokio::select!` and may drop the future when another branch wins.
pub trait LineSource: Send {
    /// Next complete line without its terminator, or `None` at end of output.
    fn next_line(&mut self) -> Pin<Box<dyn Future<Output = io::Result<Option<String>>> + Send + '_>>;
}

/// Lines read from an async byte stream.
pub struct ChildLines<R> {
    reader: BufReader<R>,
    /// Bytes of the current line. Kept across calls so a `next_line` future
    /// dropped mid-line loses nothing.
    buf: Vec<u8>,
}

impl<R> ChildLines<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }
}

impl<R> LineSource for ChildLines<R>
where
    R: AsyncRead + Unpin + Send,
{
    fn next_line(&mut self) -> Pin<Box<dyn Future<Output = io::Result<Option<String>>> + Send + '_>> {
        Box::pin(async move {
            self.reader.read_until(b'\n', &mut self.buf).await?;
            if self.buf.is_empty() {
                return Ok(None);
            }

            let raw = std::mem::take(&mut self.buf);
            let content = raw.strip_suffix(b"\n").unwrap_or(&raw);
            let line = String::from_utf8_lossy(content).into_owned();
            Ok(Some(strip_carriage_return(line)))
        })
    }
}

/// Fixed sequence of lines, consumed front to back.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for ScriptedLines {
    fn next_line(&mut self) -> Pin<Box<dyn Future<Output = io::Result<Option<String>>> + Send + '_>> {
        let next = self.lines.pop_front().map(strip_carriage_return);
        Box::pin(async move { Ok(next) })
    }
}

/// CLIs that draw prompts often emit CRLF even on unix.
fn strip_carriage_return(mut line: String) -> String {
    if line.ends_with('\r') {
        line.pop();
    }
    line
}
