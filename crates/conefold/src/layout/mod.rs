//! Addressing schemes for 2D layers.
//!
//! A layout maps cells of a `2^rank_x × 2^rank_y` domain onto a flat
//! addressing index. The tilings never decode an index back into `(x, y)`:
//! they move through the domain by adding offsets, each of which shifts the
//! index by `count * 2^rank` cells along one axis.
//!
//! Two families are provided:
//!
//! - [`LinearLayout`] - ordinary row-major order
//! - [`ZOrderLayout`] - bit-interleaved Morton order (x in even bits, y in odd bits)
//!
//! Positions one past the last column or row are valid addressing anchors
//! (the ConeFold recursion keeps its fold corners there), but they never
//! name a stored cell.

mod linear;
mod zorder;

pub use linear::LinearLayout;
pub use zorder::{compact_bits, spread_bits, ZOrderLayout};

use serde::{Deserialize, Serialize};

use crate::error::{FoldError, Result};

/// Largest supported domain side rank.
pub const MAX_DOMAIN_RANK: u32 = 15;

/// Apply a signed offset to an addressing index.
#[inline(always)]
pub fn step(idx: usize, delta: isize) -> usize {
    idx.wrapping_add_signed(delta)
}

/// Index arithmetic for one memory layout.
///
/// All offset functions take the index they start from: for the Z-order
/// family a move depends on the carries it produces, so offsets are not
/// translation invariant. `off_right(idx, r, c)` followed by
/// `off_left(.., r, c)` from the resulting index always cancels.
pub trait Layout: Copy + Send + Sync + std::fmt::Debug + 'static {
    /// Log2 of the domain width.
    fn rank_x(&self) -> u32;

    /// Log2 of the domain height.
    fn rank_y(&self) -> u32;

    /// Offset moving `count * 2^rank` cells towards larger x.
    fn off_right(&self, idx: usize, rank: u32, count: usize) -> isize;

    /// Offset moving `count * 2^rank` cells towards smaller x.
    fn off_left(&self, idx: usize, rank: u32, count: usize) -> isize;

    /// Offset moving `count * 2^rank` cells towards larger y.
    fn off_bottom(&self, idx: usize, rank: u32, count: usize) -> isize;

    /// Offset moving `count * 2^rank` cells towards smaller y.
    fn off_top(&self, idx: usize, rank: u32, count: usize) -> isize;

    /// Storage slot of the in-domain cell addressed by `idx`.
    fn slot(&self, idx: usize) -> usize;

    /// Domain width in cells.
    #[inline]
    fn len_x(&self) -> usize {
        1 << self.rank_x()
    }

    /// Domain height in cells.
    #[inline]
    fn len_y(&self) -> usize {
        1 << self.rank_y()
    }

    /// Number of stored cells.
    #[inline]
    fn cell_count(&self) -> usize {
        self.len_x() * self.len_y()
    }

    /// Addressing index of `(x, y)`, reached by walking from the origin.
    fn index_of(&self, x: usize, y: usize) -> usize {
        let idx = step(0, self.off_right(0, 0, x));
        step(idx, self.off_bottom(idx, 0, y))
    }
}

/// Runtime selection of a layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    /// Row-major order.
    Linear,
    /// Morton (Z-curve) order.
    #[default]
    ZOrder,
}

impl LayoutKind {
    /// Parse a layout name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" | "row-major" => Ok(Self::Linear),
            "zorder" | "z-order" | "morton" | "zcurve" => Ok(Self::ZOrder),
            _ => Err(FoldError::Config(format!(
                "Unknown layout '{}'. Valid options: linear, zorder",
                s
            ))),
        }
    }
}

impl std::fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::ZOrder => write!(f, "zorder"),
        }
    }
}

pub(crate) fn check_rank(rank: u32) -> Result<()> {
    if rank == 0 || rank > MAX_DOMAIN_RANK {
        return Err(FoldError::InvalidDomainRank {
            rank,
            max: MAX_DOMAIN_RANK,
        });
    }
    Ok(())
}
