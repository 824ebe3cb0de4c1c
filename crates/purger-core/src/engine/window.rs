//! Sliding prefetch window around the cursor.

use std::ops::Range;

/// Default number of indices kept warm around the cursor.
pub const DEFAULT_WINDOW_SPAN: usize = 10;

/// Half-open index range `[start, end)` inside a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchWindow {
    pub start: usize,
    pub end: usize,
}

impl PrefetchWindow {
    /// Window of `span` indices around `cursor`, clipped to `0..len`.
    ///
    /// One fifth of the span (at least one index) trails the cursor so that an
    /// undo lands on warm media; the rest leads it.
    pub fn around(cursor: usize, len: usize, span: usize) -> Self {
        let (back, ahead) = split_span(span);
        let start = cursor.saturating_sub(back).min(len);
        let end = cursor.saturating_add(ahead).min(len);
        Self { start, end }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// `(behind, ahead)`; `ahead` includes the cursor itself.
pub fn split_span(span: usize) -> (usize, usize) {
    let back = (span / 5).max(1);
    let ahead = span.saturating_sub(back).max(1);
    (back, ahead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10, (2, 8))]
    #[case(5, (1, 4))]
    #[case(2, (1, 1))]
    #[case(12, (2, 10))]
    fn span_split(#[case] span: usize, #[case] expected: (usize, usize)) {
        assert_eq!(split_span(span), expected);
    }

    #[rstest]
    #[case(0, 100, 0..8)]
    #[case(1, 100, 0..9)]
    #[case(5, 100, 3..13)]
    #[case(97, 100, 95..100)]
    #[case(0, 3, 0..3)]
    fn window_is_clipped(#[case] cursor: usize, #[case] len: usize, #[case] expected: Range<usize>) {
        let window = PrefetchWindow::around(cursor, len, DEFAULT_WINDOW_SPAN);
        assert_eq!(window.range(), expected);
        assert!(window.contains(cursor));
    }
}
