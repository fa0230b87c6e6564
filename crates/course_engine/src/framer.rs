/// Incremental newline framing over an undelimited byte stream.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; only the bytes after
/// the last delivered newline are retained between calls.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and iterate the lines it completed, without their
    /// terminator (`\n` or `\r\n`). Lines left unread when the iterator is
    /// dropped are yielded by the next call.
    pub fn push(&mut self, chunk: &[u8]) -> CompleteLines<'_> {
        self.buffer.extend_from_slice(chunk);
        CompleteLines {
            buffer: &mut self.buffer,
            consumed: 0,
        }
    }

    /// Bytes received after the last complete line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

pub struct CompleteLines<'a> {
    buffer: &'a mut Vec<u8>,
    consumed: usize,
}

impl Iterator for CompleteLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.buffer[self.consumed..];
        let newline = rest.iter().position(|byte| *byte == b'\n')?;
        let mut line = &rest[..newline];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        let text = String::from_utf8_lossy(line).into_owned();
        self.consumed += newline + 1;
        Some(text)
    }
}

impl Drop for CompleteLines<'_> {
    fn drop(&mut self) {
        self.buffer.drain(..self.consumed);
    }
}
