use std::num::NonZeroU64;

/// Opaque token proving a range's bytes were received (an ETag for uploads).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompletionTag(pub String);

impl CompletionTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One unit of work: the half-open byte interval `[start, end)` of a file.
///
/// `sequence` is 1-based and never changes, even when the range is
/// retried. Only the worker currently holding a range mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRange {
    pub sequence: u64,
    pub start: u64,
    pub end: u64,
    /// Attempts started so far.
    pub attempts: u32,
    /// Rendered error of the most recent failed attempt.
    pub last_error: Option<String>,
}

impl TransferRange {
    pub fn new(sequence: u64, start: u64, end: u64) -> Self {
        Self {
            sequence,
            start,
            end,
            attempts: 0,
            last_error: None,
        }
    }

    /// Number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Value for an HTTP `Range` header (inclusive on both ends).
    pub fn http_range(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Number of ranges needed to cover `total_size` bytes.
pub fn part_count(total_size: u64, part_size: NonZeroU64) -> u64 {
    total_size.div_ceil(part_size.get())
}

/// Plans the ranges covering `[0, total_size)`.
///
/// Every range but the last is exactly `part_size` bytes; the last holds
/// the remainder. A zero-byte file yields no ranges.
pub fn plan(total_size: u64, part_size: NonZeroU64) -> Vec<TransferRange> {
    let step = part_size.get();
    (0..part_count(total_size, part_size))
        .map(|index| {
            let start = index * step;
            let end = start.saturating_add(step).min(total_size);
            TransferRange::new(index + 1, start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn size(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    fn assert_partition(ranges: &[TransferRange], total: u64) {
        let mut cursor = 0;
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.sequence, i as u64 + 1, "sequence must be dense and 1-based");
            assert_eq!(r.start, cursor, "gap or overlap before range {}", r.sequence);
            assert!(r.end > r.start, "range {} is empty", r.sequence);
            cursor = r.end;
        }
        assert_eq!(cursor, total, "ranges must end at the file size");
    }

    #[test]
    fn zero_size_plans_nothing() {
        assert!(plan(0, size(MB)).is_empty());
        assert_eq!(part_count(0, size(MB)), 0);
    }

    #[test]
    fn twenty_five_mb_in_ten_mb_parts() {
        let ranges = plan(25 * MB, size(10 * MB));
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].len(), 10 * MB);
        assert_eq!(ranges[1].len(), 10 * MB);
        assert_eq!(ranges[2].len(), 5 * MB);
        assert_partition(&ranges, 25 * MB);
    }

    #[test]
    fn exact_multiple_has_no_runt() {
        let ranges = plan(40, size(10));
        assert_eq!(ranges.len(), 4);
        assert!(ranges.iter().all(|r| r.len() == 10));
        assert_partition(&ranges, 40);
    }

    #[test]
    fn part_larger_than_file() {
        let ranges = plan(7, size(100));
        assert_eq!(ranges, vec![TransferRange::new(1, 0, 7)]);
    }

    #[test]
    fn partitions_many_shapes() {
        for total in [1u64, 2, 3, 9, 10, 11, 99, 100, 101, 1023, 4096] {
            for part in [1u64, 2, 3, 7, 10, 64, 1000] {
                let ranges = plan(total, size(part));
                assert_eq!(ranges.len() as u64, part_count(total, size(part)));
                assert_partition(&ranges, total);
            }
        }
    }

    #[test]
    fn planning_is_deterministic() {
        assert_eq!(plan(12_345, size(1_000)), plan(12_345, size(1_000)));
    }

    #[test]
    fn huge_part_size_does_not_overflow() {
        let ranges = plan(u64::MAX, size(u64::MAX / 2 + 1));
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].end, u64::MAX);
    }

    #[test]
    fn http_range_is_inclusive() {
        let r = TransferRange::new(2, 10, 20);
        assert_eq!(r.http_range(), "bytes=10-19");
        assert_eq!(r.len(), 10);
    }
}
