//! Line codec for the MCP stdio transport.
//!
//! Frame format: one UTF-8 JSON-RPC message per line, terminated by `\n`
//! (a preceding `\r` is tolerated). Messages never contain raw newlines.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Line contents without the terminator.
    Message(Vec<u8>),
    /// Line exceeded the size cap; its bytes were discarded.
    Oversized(usize),
}

/// Read one line from the stream.
///
/// Returns `None` on clean EOF. A final line without a terminator is still
/// returned. Lines longer than `max_frame_bytes` are drained up to the next
/// newline and reported as [`Frame::Oversized`] so the session can continue.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> std::io::Result<Option<Frame>> {
    let mut line = Vec::new();
    let mut discarded = 0usize;
    let mut oversized = false;

    loop {
        let (used, terminated) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if oversized {
                    return Ok(Some(Frame::Oversized(discarded)));
                }
                if line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Frame::Message(trim_cr(line))));
            }

            let (chunk, used, terminated) = match available.iter().position(|b| *b == b'\n') {
                Some(pos) => (&available[..pos], pos + 1, true),
                None => (available, available.len(), false),
            };

            if !oversized && line.len() + chunk.len() > max_frame_bytes {
                oversized = true;
                discarded = line.len();
                line.clear();
            }
            if oversized {
                discarded += chunk.len();
            } else {
                line.extend_from_slice(chunk);
            }
            (used, terminated)
        };
        reader.consume(used);

        if terminated {
            if oversized {
                return Ok(Some(Frame::Oversized(discarded)));
            }
            return Ok(Some(Frame::Message(trim_cr(line))));
        }
    }
}

fn trim_cr(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}

/// Write one message as a single line and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Value,
) -> std::io::Result<()> {
    let mut payload = serde_json::to_vec(message)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}
