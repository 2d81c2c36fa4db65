//! A CRLF line buffer.
//!
//! Splits an arbitrary byte stream into complete lines, buffering the
//! partial tail across appends. No decoding happens here; POP3 decides per
//! command whether a line is text or preserved bytes.

/// Accumulates bytes and yields complete lines, terminator stripped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    tail: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed. Lines split on
    /// LF; a trailing CR is stripped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.tail.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(at) = self.tail.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.tail.drain(..=at).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
        }

        lines
    }

    /// True while a partial line is buffered.
    pub fn has_partial(&self) -> bool {
        !self.tail.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_carry() {
        let mut buffer = LineBuffer::new();

        let lines = buffer.push(b"+OK hello\r\npartial");
        assert_eq!(vec![b"+OK hello".to_vec()], lines);
        assert!(buffer.has_partial());

        let lines = buffer.push(b" line\r\n");
        assert_eq!(vec![b"partial line".to_vec()], lines);
        assert!(!buffer.has_partial());
    }

    #[test]
    fn test_bare_lf() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"one\ntwo\r\n");
        assert_eq!(vec![b"one".to_vec(), b"two".to_vec()], lines);
    }

    #[test]
    fn test_empty_lines() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"\r\n\r\n");
        assert_eq!(vec![Vec::<u8>::new(), Vec::new()], lines);
    }
}
