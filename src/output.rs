//! Output sinks for rendered netlists.
//!
//! The engine never prints directly. Rendered lines go to an `OutputSink`,
//! which is stdout for the CLI and a string buffer for tests and embedding.

use crate::deck::Line;

/// Receives rendered text, one statement per call.
pub trait OutputSink {
    /// `line` is the deck line the text was rendered from, if any.
    fn emit(&mut self, text: &str, line: Option<&Line>);
}

/// Collects output into a String for testing or programmatic capture.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    pub buffer: String,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl OutputSink for OutputBuffer {
    fn emit(&mut self, text: &str, _line: Option<&Line>) {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(text);
    }
}

/// Writes output to stdout.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, text: &str, _line: Option<&Line>) {
        println!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_joins_with_newlines() {
        let mut buffer = OutputBuffer::new();
        buffer.emit("a", None);
        buffer.emit("b", Some(&Line::synthesized("b")));
        assert_eq!(buffer.as_str(), "a\nb");
    }
}
