//! Part range type and planning.

/// One part: byte range [begin, end) (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    /// 1-based part number.
    pub number: u64,
    /// Start offset (inclusive).
    pub begin: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl PartRange {
    /// Length of this part in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of articles needed for a file: `ceil(file_size / article_size)`.
/// Returns 0 if either value is 0.
pub fn part_count(file_size: u64, article_size: u64) -> u64 {
    if file_size == 0 || article_size == 0 {
        return 0;
    }
    file_size.div_ceil(article_size)
}

/// Builds the part plan for a file of `file_size` bytes.
///
/// Every part is `article_size` bytes except the last, which holds the
/// remainder. Returns an empty vec if `file_size` or `article_size` is 0.
pub fn plan_parts(file_size: u64, article_size: u64) -> Vec<PartRange> {
    let count = part_count(file_size, article_size);
    let mut out = Vec::with_capacity(count as usize);

    for i in 0..count {
        let begin = i * article_size;
        let end = (begin + article_size).min(file_size);
        out.push(PartRange {
            number: i + 1,
            begin,
            end,
        });
    }

    out
}
