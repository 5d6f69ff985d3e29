//! Morton (Z-curve) layout.
//!
//! The addressing index interleaves coordinate bits: x occupies the even
//! bit positions, y the odd ones. Moving along one axis is a masked add
//! confined to that axis' bit field, so no coordinate decode is needed.
//!
//! For rectangular domains the addressing index is still the full Morton
//! code; only the storage slot differs. Above the `2 * min(rank_x, rank_y)`
//! interleaved low bits, the longer axis' bits are compacted, which stacks
//! square Morton blocks along the longer axis. Offsets stay pure field
//! arithmetic and positions one past the last row or column stay
//! representable.

use std::cmp::Ordering;

use super::{check_rank, Layout};
use crate::error::Result;

const X_MASK: u64 = 0x5555_5555_5555_5555;
const Y_MASK: u64 = X_MASK << 1;

/// Spread the bits of `v` into the even bit positions of a `u64`.
#[inline(always)]
pub fn spread_bits(v: u32) -> u64 {
    let mut x = v as u64;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & X_MASK;
    x
}

/// Gather the even bit positions of `v` into a `u32`.
#[inline(always)]
pub fn compact_bits(v: u64) -> u32 {
    let mut x = v & X_MASK;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF;
    x as u32
}

/// Bit-interleaved addressing for `2^rank_x × 2^rank_y` domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZOrderLayout {
    rank_x: u32,
    rank_y: u32,
}

impl ZOrderLayout {
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

    #[inline(always)]
    fn increment(rank: u32, count: usize) -> u64 {
        spread_bits((count << rank) as u32)
    }
}

impl Layout for ZOrderLayout {
    #[inline]
    fn rank_x(&self) -> u32 {
        self.rank_x
    }

    #[inline]
    fn rank_y(&self) -> u32 {
        self.rank_y
    }

    #[inline(always)]
    fn off_right(&self, idx: usize, rank: u32, count: usize) -> isize {
        let idx = idx as u64;
        let next = (idx | Y_MASK).wrapping_add(Self::increment(rank, count)) & X_MASK;
        next.wrapping_sub(idx & X_MASK) as i64 as isize
    }

    #[inline(always)]
    fn off_left(&self, idx: usize, rank: u32, count: usize) -> isize {
        let idx = idx as u64;
        let next = (idx & X_MASK).wrapping_sub(Self::increment(rank, count)) & X_MASK;
        next.wrapping_sub(idx & X_MASK) as i64 as isize
    }

    #[inline(always)]
    fn off_bottom(&self, idx: usize, rank: u32, count: usize) -> isize {
        let idx = idx as u64;
        let next = (idx | X_MASK).wrapping_add(Self::increment(rank, count) << 1) & Y_MASK;
        next.wrapping_sub(idx & Y_MASK) as i64 as isize
    }

    #[inline(always)]
    fn off_top(&self, idx: usize, rank: u32, count: usize) -> isize {
        let idx = idx as u64;
        let next = (idx & Y_MASK).wrapping_sub(Self::increment(rank, count) << 1) & Y_MASK;
        next.wrapping_sub(idx & Y_MASK) as i64 as isize
    }

    #[inline(always)]
    fn slot(&self, idx: usize) -> usize {
        let idx = idx as u64;
        let low_bits = 2 * self.rank_x.min(self.rank_y);
        let low = idx & ((1u64 << low_bits) - 1);
        let high = idx >> low_bits;

        let high = match self.rank_x.cmp(&self.rank_y) {
            Ordering::Equal => high,
            Ordering::Less => {
                debug_assert!(high & X_MASK == 0, "x is out of bounds in {:#x}", idx);
                compact_bits(high >> 1) as u64
            }
            Ordering::Greater => {
                debug_assert!(high & Y_MASK == 0, "y is out of bounds in {:#x}", idx);
                compact_bits(high) as u64
            }
        };

        let slot = (low | (high << low_bits)) as usize;
        debug_assert!(slot < self.cell_count(), "idx {:#x} is out of bounds", idx);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_compact() {
        assert_eq!(spread_bits(0b1011), 0b1_00_01_01);
        assert_eq!(compact_bits(0b1_00_01_01), 0b1011);
        for v in [0u32, 1, 7, 1234, 0xFFFF, 0xDEAD_BEEF] {
            assert_eq!(compact_bits(spread_bits(v)), v);
        }
    }

    #[test]
    fn test_first_offsets_match_morton_table() {
        let layout = ZOrderLayout::square(3).unwrap();
        let expected = [0isize, 1, 4, 5, 16, 17, 20, 21];
        for (count, &want) in expected.iter().enumerate() {
            assert_eq!(layout.off_right(0, 0, count), want);
            assert_eq!(layout.off_bottom(0, 0, count), 2 * want);
        }
    }

    #[test]
    fn test_carry_across_quadrants() {
        let layout = ZOrderLayout::square(2).unwrap();
        // (1, 0) -> (2, 0) crosses the first quadrant boundary
        let idx = layout.index_of(1, 0);
        assert_eq!(idx, 1);
        assert_eq!(layout.off_right(idx, 0, 1), 3);
        // (1, 1) -> (1, 2)
        let idx = layout.index_of(1, 1);
        assert_eq!(idx, 3);
        assert_eq!(layout.off_bottom(idx, 0, 1), 6);
    }

    #[test]
    fn test_one_past_edge_is_addressable() {
        let layout = ZOrderLayout::square(2).unwrap();
        let corner = layout.index_of(4, 4);
        assert_eq!(corner, 0b11_00_00);
        let back = crate::layout::step(corner, layout.off_left(corner, 0, 1));
        let back = crate::layout::step(back, layout.off_top(back, 0, 1));
        assert_eq!(back, layout.index_of(3, 3));
    }

    #[test]
    fn test_rectangular_slots_are_dense() {
        for (rx, ry) in [(2, 4), (4, 2), (1, 3)] {
            let layout = ZOrderLayout::new(rx, ry).unwrap();
            let mut seen = vec![false; layout.cell_count()];
            for y in 0..layout.len_y() {
                for x in 0..layout.len_x() {
                    let slot = layout.slot(layout.index_of(x, y));
                    assert!(!seen[slot], "slot {} reused at ({}, {})", slot, x, y);
                    seen[slot] = true;
                }
            }
            assert!(seen.iter().all(|&s| s));
        }
    }
}
