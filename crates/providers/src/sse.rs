//! Line decoding for `text/event-stream` bodies.

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseLine {
    /// `event: <name>`
    Event(String),
    /// `data: <payload>`
    Data(String),
}

/// Buffers raw body bytes and yields complete SSE lines.
///
/// Bytes are kept until a newline arrives, so multi-byte characters split
/// across network chunks decode intact.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of body bytes; returns every line it completed.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(line) = parse_line(&raw) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a final line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<SseLine> {
        let raw = std::mem::take(&mut self.buffer);
        parse_line(&raw)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches(['\n', '\r']);

    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    if let Some(event) = line.strip_prefix("event:") {
        return Some(SseLine::Event(event.trim().to_string()));
    }
    line.strip_prefix("data:")
        .map(|data| SseLine::Data(data.trim().to_string()))
}
