use std::collections::VecDeque;

use tracing::warn;

/// Splits raw appended bytes into complete lines.
///
/// A fragment without its newline is held until the rest arrives. Lines longer
/// than `max_line_bytes` are dropped whole; bytes that are not UTF-8 are
/// replaced with U+FFFD.
#[derive(Debug)]
pub(crate) struct LineAssembler {
    max_line_bytes: usize,
    current_line: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
    line_number: u64,
}

impl LineAssembler {
    pub(crate) fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            current_line: Vec::new(),
            observed_bytes: 0,
            discard_mode: false,
            line_number: 0,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8], out: &mut VecDeque<String>) {
        let mut rest = chunk;
        while !rest.is_empty() {
            let Some(newline_idx) = rest.iter().position(|b| *b == b'\n') else {
                self.append(rest);
                return;
            };
            self.append(&rest[..newline_idx]);
            self.finish_line(out);
            rest = &rest[newline_idx + 1..];
        }
    }

    /// Drops any partial line, e.g. after the file was truncated.
    pub(crate) fn reset(&mut self) {
        self.reset_line_state();
    }

    pub(crate) fn has_partial(&self) -> bool {
        self.observed_bytes > 0
    }

    fn append(&mut self, segment: &[u8]) {
        self.observe_bytes(segment.len());
        if !self.discard_mode {
            self.current_line.extend_from_slice(segment);
        }
    }

    fn finish_line(&mut self, out: &mut VecDeque<String>) {
        self.line_number += 1;

        if self.discard_mode {
            warn!(
                line_number = self.line_number,
                observed_bytes = self.observed_bytes,
                max_line_bytes = self.max_line_bytes,
                "discarding overlong log line"
            );
        } else {
            if self.current_line.last() == Some(&b'\r') {
                self.current_line.pop();
            }
            out.push_back(String::from_utf8_lossy(&self.current_line).into_owned());
        }

        self.reset_line_state();
    }

    fn reset_line_state(&mut self) {
        self.current_line.clear();
        self.observed_bytes = 0;
        self.discard_mode = false;
    }

    fn observe_bytes(&mut self, additional: usize) {
        self.observed_bytes = self.observed_bytes.saturating_add(additional);
        if self.observed_bytes > self.max_line_bytes && !self.discard_mode {
            self.discard_mode = true;
            self.current_line.clear();
        }
    }
}
