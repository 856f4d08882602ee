//! Byte cursor with line tracking.

/// Byte-position cursor over input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    offset: usize,
    line: u32,
}

impl Cursor {
    /// Creates a cursor at byte offset `0`, line `1`.
    pub(crate) fn new() -> Self {
        Self { offset: 0, line: 1 }
    }

    /// Returns the current byte offset.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the current line number.
    pub(crate) fn line(&self) -> u32 {
        self.line
    }

    /// Returns `true` if the cursor is at or beyond input end.
    pub(crate) fn is_eof(&self, input: &str) -> bool {
        self.offset >= input.len()
    }

    /// Returns the current byte at cursor position.
    pub(crate) fn peek_byte(&self, input: &str) -> Option<u8> {
        input.as_bytes().get(self.offset).copied()
    }

    /// Returns the byte `ahead` positions past the cursor.
    pub(crate) fn peek_at(&self, input: &str, ahead: usize) -> Option<u8> {
        input.as_bytes().get(self.offset + ahead).copied()
    }

    /// Returns `true` when the input continues with `prefix`.
    pub(crate) fn starts_with(&self, input: &str, prefix: &str) -> bool {
        input.as_bytes()[self.offset.min(input.len())..].starts_with(prefix.as_bytes())
    }

    /// Consumes and returns one byte.
    pub(crate) fn advance_byte(&mut self, input: &str) -> Option<u8> {
        let byte = self.peek_byte(input)?;
        self.offset += 1;
        if byte == b'\n' {
            self.line += 1;
        }
        Some(byte)
    }

    /// Advances the cursor by `count` bytes, clamped to input length.
    pub(crate) fn advance_by(&mut self, count: usize, input: &str) {
        for _ in 0..count {
            if self.advance_byte(input).is_none() {
                break;
            }
        }
    }

    /// Moves to `offset`, which must not precede the current position.
    pub(crate) fn seek(&mut self, offset: usize, input: &str) {
        let target = offset.min(input.len());
        if target > self.offset {
            self.advance_by(target - self.offset, input);
        }
    }
}
