//! Byte-level framing for streamed replies
//!
//! Network chunks can end anywhere, including inside a multi-byte character,
//! so bytes are buffered raw and only complete frames are decoded.

/// Splits a byte stream on a delimiter: `\n` for NDJSON, a blank line for
/// server-sent events. Carriage returns are dropped, so CRLF framing splits
/// the same way.
pub(crate) struct FrameBuffer {
    buf: Vec<u8>,
    delimiter: &'static [u8],
}

impl FrameBuffer {
    /// One frame per line
    pub(crate) fn lines() -> Self {
        Self {
            buf: Vec::new(),
            delimiter: b"\n",
        }
    }

    /// One frame per blank-line separated event
    pub(crate) fn events() -> Self {
        Self {
            buf: Vec::new(),
            delimiter: b"\n\n",
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Next complete frame, without its delimiter
    pub(crate) fn next_frame(&mut self) -> Option<Result<String, String>> {
        let pos = self
            .buf
            .windows(self.delimiter.len())
            .position(|window| window == self.delimiter)?;
        let frame: Vec<u8> = self.buf.drain(..pos + self.delimiter.len()).collect();
        Some(decode(&frame[..pos]))
    }

    /// Whatever is left once the byte stream has ended, unless blank
    pub(crate) fn finish(&mut self) -> Option<Result<String, String>> {
        let rest = std::mem::take(&mut self.buf);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(decode(&rest))
    }
}

fn decode(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| format!("invalid UTF-8 in stream: {}", e))
}
