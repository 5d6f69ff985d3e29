//! Row-major layout.

use super::{check_rank, Layout};
use crate::error::Result;

/// Row-major addressing: `idx = y * 2^rank_x + x`.
///
/// Offsets are translation invariant, so the starting index is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearLayout {
    rank_x: u32,
    rank_y: u32,
}

impl LinearLayout {
    /// Create a layout for a `2^rank_x × 2^rank_y` domain.
    pub fn new(rank_x: u32, rank_y: u32) -> Result<Self> {
        check_rank(rank_x)?;
        check_rank(rank_y)?;
        Ok(Self { rank_x, rank_y })
    }

    /// Create a layout for a square `2^rank × 2^rank` domain.
    pub fn square(rank: u32) -> Result<Self> {
        Self::new(rank, rank)
    }
}

impl Layout for LinearLayout {
    #[inline]
    fn rank_x(&self) -> u32 {
        self.rank_x
    }

    #[inline]
    fn rank_y(&self) -> u32 {
        self.rank_y
    }

    #[inline(always)]
    fn off_right(&self, _idx: usize, rank: u32, count: usize) -> isize {
        (count << rank) as isize
    }

    #[inline(always)]
    fn off_left(&self, _idx: usize, rank: u32, count: usize) -> isize {
        -((count << rank) as isize)
    }

    #[inline(always)]
    fn off_bottom(&self, _idx: usize, rank: u32, count: usize) -> isize {
        ((count << rank) << self.rank_x) as isize
    }

    #[inline(always)]
    fn off_top(&self, _idx: usize, rank: u32, count: usize) -> isize {
        -(((count << rank) << self.rank_x) as isize)
    }

    #[inline(always)]
    fn slot(&self, idx: usize) -> usize {
        debug_assert!(idx < self.cell_count(), "idx {} is out of bounds", idx);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_offsets() {
        let layout = LinearLayout::new(3, 2).unwrap();
        assert_eq!(layout.off_right(0, 0, 1), 1);
        assert_eq!(layout.off_right(0, 2, 1), 4);
        assert_eq!(layout.off_bottom(0, 0, 1), 8);
        assert_eq!(layout.off_bottom(0, 1, 3), 48);
        assert_eq!(layout.off_top(20, 0, 2), -16);
    }

    #[test]
    fn test_index_of() {
        let layout = LinearLayout::square(3).unwrap();
        assert_eq!(layout.index_of(5, 2), 21);
        assert_eq!(layout.index_of(8, 8), 72);
    }

    #[test]
    fn test_rejects_zero_rank() {
        assert!(LinearLayout::new(0, 3).is_err());
    }
}
