/// Reassembles newline-terminated lines across arbitrary read boundaries.
///
/// Bytes are held until a `\n` arrives, so a frame split over two reads is
/// never parsed early. Splitting on the ASCII newline keeps multi-byte
/// characters intact.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Appends `chunk` and returns every complete, non-empty line.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line = decode_line(&self.buf[..idx]);
            self.buf.drain(..=idx);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Takes whatever trails the last newline, if anything.
    pub fn take_remainder(&mut self) -> Option<String> {
        let line = decode_line(&self.buf);
        self.buf.clear();
        (!line.is_empty()).then_some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

/// Payload of a `data:` line, trimmed. Other lines yield `None`.
pub(crate) fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}
