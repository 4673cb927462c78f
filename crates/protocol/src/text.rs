/// UTF-16 view over a UTF-8 buffer.
///
/// The editor and the labeling service count UTF-16 code units; Rust slices
/// by bytes. Every conversion in the engine goes through this type so an
/// offset can never land inside a UTF-8 sequence.
///
/// An offset that points between the two halves of a surrogate pair is not a
/// valid boundary. [`Utf16Text::floor`] and [`Utf16Text::ceil`] snap it to the
/// neighbouring boundaries.
#[derive(Debug, Clone)]
pub struct Utf16Text<'a> {
    text: &'a str,
    len: usize,
    /// `(utf16_offset, byte_offset)` for every char start plus the end of the
    /// buffer. Empty for ASCII text, where both offsets coincide.
    marks: Vec<(usize, usize)>,
}

impl<'a> Utf16Text<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        if text.is_ascii() {
            return Self {
                text,
                len: text.len(),
                marks: Vec::new(),
            };
        }

        let mut marks = Vec::with_capacity(text.len() + 1);
        let mut units = 0usize;
        for (byte, ch) in text.char_indices() {
            marks.push((units, byte));
            units += ch.len_utf16();
        }
        marks.push((units, text.len()));
        Self {
            text,
            len: units,
            marks,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'a str {
        self.text
    }

    /// Length in UTF-16 code units.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_ascii(&self) -> bool {
        self.marks.is_empty()
    }

    /// True when `offset` sits on a char boundary (or the end of the buffer).
    #[must_use]
    pub fn is_boundary(&self, offset: usize) -> bool {
        if offset > self.len {
            return false;
        }
        self.is_ascii()
            || self
                .marks
                .binary_search_by_key(&offset, |&(units, _)| units)
                .is_ok()
    }

    /// Largest boundary `<= offset`, clamped to the buffer.
    #[must_use]
    pub fn floor(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        if self.is_ascii() {
            return offset;
        }
        match self.marks.binary_search_by_key(&offset, |&(units, _)| units) {
            Ok(_) => offset,
            Err(idx) => self.marks[idx.saturating_sub(1)].0,
        }
    }

    /// Smallest boundary `>= offset`, clamped to the buffer.
    #[must_use]
    pub fn ceil(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        if self.is_ascii() {
            return offset;
        }
        match self.marks.binary_search_by_key(&offset, |&(units, _)| units) {
            Ok(_) => offset,
            Err(idx) => self.marks.get(idx).map_or(self.len, |&(units, _)| units),
        }
    }

    /// Clamp a range to the buffer and widen it to char boundaries.
    #[must_use]
    pub fn snap_outward(&self, start: usize, end: usize) -> (usize, usize) {
        (self.floor(start), self.ceil(end))
    }

    /// Byte offset of a UTF-16 offset, after snapping down to a boundary.
    #[must_use]
    pub fn to_byte(&self, offset: usize) -> usize {
        let offset = self.floor(offset);
        if self.is_ascii() {
            return offset;
        }
        match self.marks.binary_search_by_key(&offset, |&(units, _)| units) {
            Ok(idx) => self.marks[idx].1,
            Err(_) => self.text.len(),
        }
    }

    /// UTF-16 offset of a byte offset. Bytes inside a UTF-8 sequence map to
    /// the start of that char.
    #[must_use]
    pub fn to_utf16(&self, byte: usize) -> usize {
        let byte = byte.min(self.text.len());
        if self.is_ascii() {
            return byte;
        }
        match self.marks.binary_search_by_key(&byte, |&(_, bytes)| bytes) {
            Ok(idx) => self.marks[idx].0,
            Err(idx) => self.marks[idx.saturating_sub(1)].0,
        }
    }

    /// Slice `[start, end)` in UTF-16 units, widened to char boundaries.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let (start, end) = self.snap_outward(start, end);
        if end <= start {
            return "";
        }
        &self.text[self.to_byte(start)..self.to_byte(end)]
    }

    /// Up to `window` units immediately before `start`. Shrinks near the
    /// beginning of the buffer and never splits a char.
    #[must_use]
    pub fn left_window(&self, start: usize, window: usize) -> &'a str {
        let start = self.floor(start);
        let from = self.ceil(start.saturating_sub(window));
        if from >= start {
            return "";
        }
        &self.text[self.to_byte(from)..self.to_byte(start)]
    }

    /// Up to `window` units immediately after `end`. Shrinks near the end of
    /// the buffer and never splits a char.
    #[must_use]
    pub fn right_window(&self, end: usize, window: usize) -> &'a str {
        let end = self.ceil(end);
        let to = self.floor(end.saturating_add(window));
        if to <= end {
            return "";
        }
        &self.text[self.to_byte(end)..self.to_byte(to)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_offsets_are_identity() {
        let text = Utf16Text::new("The quick brown fox");
        assert_eq!(text.len(), 19);
        assert_eq!(text.to_byte(4), 4);
        assert_eq!(text.slice(4, 9), "quick");
        assert_eq!(text.left_window(4, 2), "e ");
        assert_eq!(text.right_window(9, 100), " brown fox");
        assert_eq!(text.slice(15, 40), " fox");
    }

    #[test]
    fn multibyte_offsets_count_utf16_units() {
        // 'é' is one UTF-16 unit and two UTF-8 bytes.
        let text = Utf16Text::new("café latte");
        assert_eq!(text.len(), 10);
        assert_eq!(text.slice(5, 10), "latte");
        assert_eq!(text.to_byte(5), 6);
        assert_eq!(text.to_utf16(6), 5);
    }

    #[test]
    fn surrogate_pairs_snap_outward() {
        // '🤠' is a surrogate pair: two UTF-16 units, four UTF-8 bytes.
        let text = Utf16Text::new("a🤠b");
        assert_eq!(text.len(), 4);
        assert!(!text.is_boundary(2));
        assert_eq!(text.floor(2), 1);
        assert_eq!(text.ceil(2), 3);
        assert_eq!(text.slice(2, 3), "🤠");
        assert_eq!(text.left_window(4, 1), "b");
        assert_eq!(text.left_window(3, 1), "");
        assert_eq!(text.left_window(3, 2), "🤠");
        assert_eq!(text.right_window(1, 1), "");
    }

    #[test]
    fn windows_shrink_at_buffer_edges() {
        let text = Utf16Text::new("héllo");
        assert_eq!(text.left_window(0, 20), "");
        assert_eq!(text.left_window(2, 20), "hé");
        assert_eq!(text.right_window(5, 20), "");
        assert_eq!(text.right_window(3, 20), "lo");
    }

    proptest! {
        #[test]
        fn proptest_slices_always_land_on_char_boundaries(
            text in "\\PC{0,24}",
            a in 0usize..40,
            b in 0usize..40,
        ) {
            let indexed = Utf16Text::new(&text);
            let (start, end) = (a.min(b), a.max(b));
            let slice = indexed.slice(start, end);
            prop_assert!(text.contains(slice));
            prop_assert!(indexed.is_boundary(indexed.floor(start)));
            prop_assert!(indexed.is_boundary(indexed.ceil(end)));
            prop_assert_eq!(indexed.len(), text.encode_utf16().count());
        }
    }
}
