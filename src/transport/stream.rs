//! Line splitting for streamed response bodies.

use crate::transport::ChunkStream;
use crate::types::{Error, Result};
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};

struct LineState<E> {
    inner: BoxStream<'static, std::result::Result<Bytes, E>>,
    buf: Vec<u8>,
    done: bool,
}

/// Split a byte stream into non-blank text lines.
///
/// A transport error ends the stream after being yielded once. A trailing
/// line without a newline is still emitted.
pub fn lines<S, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let state = LineState {
        inner: bytes.boxed(),
        buf: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buf.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = state.buf.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if is_blank(&line) {
                    continue;
                }
                return Some((decode(line), state));
            }

            if state.done {
                let rest = std::mem::take(&mut state.buf);
                if is_blank(&rest) {
                    return None;
                }
                return Some((decode(rest), state));
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => state.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.done = true;
                    state.buf.clear();
                    return Some((Err(e.into()), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn decode(line: Vec<u8>) -> Result<String> {
    String::from_utf8(line)
        .map_err(|e| Error::malformed(format!("stream chunk is not valid UTF-8: {}", e)))
}
