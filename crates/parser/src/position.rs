//! Conversion between tokenizer positions and text offsets.
//!
//! The tokenizer reports 1-based `(line, column)` pairs where columns count
//! characters, not bytes. Location records need byte offsets; syntax errors
//! need a 1-based character cursor.

pub(crate) struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { text, line_starts }
    }

    fn line_bounds(&self, line: u64) -> Option<(usize, usize)> {
        let idx = usize::try_from(line).ok()?.checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .copied()
            .unwrap_or(self.text.len());
        Some((start, end))
    }

    /// Byte offset of a 1-based `(line, column)` position. A column one past
    /// the last character of a line resolves to the end of that line.
    pub(crate) fn byte_offset(&self, line: u64, column: u64) -> Option<usize> {
        let (start, end) = self.line_bounds(line)?;
        let col = usize::try_from(column).ok()?.checked_sub(1)?;
        let line_text = &self.text[start..end];
        match line_text.char_indices().nth(col) {
            Some((offset, _)) => Some(start + offset),
            None if col == line_text.chars().count() => Some(end),
            None => None,
        }
    }

    /// 1-based character offset of a 1-based `(line, column)` position.
    pub(crate) fn cursor_position(&self, line: u64, column: u64) -> Option<usize> {
        let (start, _) = self.line_bounds(line)?;
        let column = usize::try_from(column).ok()?;
        Some(self.text[..start].chars().count() + column)
    }
}
