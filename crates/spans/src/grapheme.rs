use unicode_segmentation::UnicodeSegmentation;

/// Maps UTF-16 offsets to user-perceived character (grapheme cluster)
/// indices.
pub trait GraphemeMapper {
    /// Index of the cluster containing `utf16_offset`.
    fn start_grapheme(&self, utf16_offset: usize) -> usize;

    /// Number of clusters that start before `utf16_offset`, i.e. the exclusive
    /// end index for a range ending there.
    fn end_grapheme(&self, utf16_offset: usize) -> usize;
}

/// Extended grapheme cluster boundaries of one text buffer.
#[derive(Debug, Clone)]
pub struct GraphemeIndex {
    /// UTF-16 offset where each cluster starts, followed by the buffer length.
    boundaries: Vec<usize>,
}

impl GraphemeIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut boundaries = Vec::new();
        let mut units = 0usize;
        for grapheme in text.graphemes(true) {
            boundaries.push(units);
            units += grapheme.encode_utf16().count();
        }
        boundaries.push(units);
        Self { boundaries }
    }

    /// Number of grapheme clusters in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GraphemeMapper for GraphemeIndex {
    fn start_grapheme(&self, utf16_offset: usize) -> usize {
        self.boundaries
            .partition_point(|&b| b <= utf16_offset)
            .saturating_sub(1)
            .min(self.len())
    }

    fn end_grapheme(&self, utf16_offset: usize) -> usize {
        self.boundaries
            .partition_point(|&b| b < utf16_offset)
            .min(self.len())
    }
}
