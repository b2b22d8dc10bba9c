//! Operator console used by the interactive clients.

use crate::error::EchoError;
use crate::protocol::{decode, strip_line_ending};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Why an interactive client session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// Operator sent `quit`.
    Quit,
    /// Operator input reached end of file.
    InputClosed,
    /// Server closed the connection while the operator was idle.
    ServerClosed,
}

/// Reads operator lines, skipping blank ones.
pub struct OperatorInput<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> OperatorInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
        }
    }

    /// Next non-blank line without its line ending, or `None` at end of input.
    pub async fn next_line(&mut self) -> Result<Option<String>, EchoError> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(EchoError::Console)?;
            if n == 0 {
                return Ok(None);
            }

            let line = decode(strip_line_ending(&self.buf));
            if !line.trim().is_empty() {
                return Ok(Some(line.into_owned()));
            }
        }
    }
}

/// Write one line to the operator's display and flush it.
pub async fn display_line<W: AsyncWrite + Unpin>(display: &mut W, text: &str) -> std::io::Result<()> {
    display.write_all(text.as_bytes()).await?;
    display.write_all(b"\n").await?;
    display.flush().await
}
