//! Finite-difference stencils.
//!
//! A stencil produces the value of one cell at the output instant from
//! cells of earlier instants. Its footprint, the [`Target`] set, fixes how
//! many past layers a solver keeps and which neighbours the tilings must
//! have finished before the cell is visited.

mod wave;

pub use wave::{WaveCell, WaveStencil, WAVE_TARGETS};

use crate::layout::{step, Layout};
use crate::window::Frame;

/// Position of a cell relative to the domain edge along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// First column or row; there is no neighbour below it.
    Low,
    /// Both neighbours exist.
    Interior,
    /// Last column or row; there is no neighbour above it.
    High,
}

impl Side {
    /// Side of coordinate `pos` on an axis of `len` cells.
    #[inline]
    pub fn of(pos: usize, len: usize) -> Self {
        if pos == 0 {
            Side::Low
        } else if pos + 1 == len {
            Side::High
        } else {
            Side::Interior
        }
    }
}

/// One entry of a stencil footprint: read `(x + dx, y + dy)` at `depth`
/// instants before the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    /// Age of the read layer, `1` being the latest completed instant.
    pub depth: usize,
    /// Horizontal displacement in cells.
    pub dx: i32,
    /// Vertical displacement in cells.
    pub dy: i32,
}

impl Target {
    /// Create a footprint entry.
    pub const fn new(depth: usize, dx: i32, dy: i32) -> Self {
        Self { depth, dx, dy }
    }
}

/// Per-cell update rule.
///
/// # Safety
///
/// `apply` may only read cells inside the declared [`Stencil::TARGETS`]
/// footprint, clamped by the side tags, and every target must have
/// `1 <= depth <= DEPTH` and `|dx|, |dy| <= 1`. The parallel schedules rely
/// on this to rule out reads of cells that another worker is writing.
pub unsafe trait Stencil: Send + Sync {
    /// State of one cell.
    type Cell: Copy + Default + Send + Sync + 'static;

    /// Number of past instants the stencil reads.
    const DEPTH: usize;

    /// Cells read to produce one output cell.
    const TARGETS: &'static [Target];

    /// Compute the new value of cell `idx`.
    fn apply<L: Layout>(
        &self,
        idx: usize,
        frame: &Frame<'_, Self::Cell, L>,
        x_side: Side,
        y_side: Side,
    ) -> Self::Cell;
}

/// Indices of the four axis neighbours of a cell.
///
/// A neighbour missing because of a domain edge resolves to the cell
/// itself, which cancels its `(neighbour - centre)` difference term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbors {
    /// Cell at `x - 1`.
    pub left: usize,
    /// Cell at `x + 1`.
    pub right: usize,
    /// Cell at `y - 1`.
    pub top: usize,
    /// Cell at `y + 1`.
    pub bottom: usize,
}

impl Neighbors {
    /// Resolve the neighbours of `idx` under the given edge tags.
    #[inline(always)]
    pub fn of<L: Layout>(layout: &L, idx: usize, x_side: Side, y_side: Side) -> Self {
        let left = match x_side {
            Side::Low => idx,
            _ => step(idx, layout.off_left(idx, 0, 1)),
        };
        let right = match x_side {
            Side::High => idx,
            _ => step(idx, layout.off_right(idx, 0, 1)),
        };
        let top = match y_side {
            Side::Low => idx,
            _ => step(idx, layout.off_top(idx, 0, 1)),
        };
        let bottom = match y_side {
            Side::High => idx,
            _ => step(idx, layout.off_bottom(idx, 0, 1)),
        };

        Self {
            left,
            right,
            top,
            bottom,
        }
    }
}

/// Largest depth found in a footprint.
pub const fn footprint_depth(targets: &[Target]) -> usize {
    let mut depth = 0;
    let mut i = 0;
    while i < targets.len() {
        if targets[i].depth > depth {
            depth = targets[i].depth;
        }
        i += 1;
    }
    depth
}
