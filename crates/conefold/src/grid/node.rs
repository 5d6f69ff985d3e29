//! Grid nodes: the leaf tasks of the parallel schedule.

use crate::tiling::FoldType;

/// One fold of the grid's rank, at one time-slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridNode {
    /// Addressing index of the fold anchor.
    pub idx: usize,
    /// Boundary type along x.
    pub x_type: FoldType,
    /// Boundary type along y.
    pub y_type: FoldType,
    /// Column of the anchor in units of the node size.
    pub i: usize,
    /// Row of the anchor in units of the node size.
    pub j: usize,
    /// Time-slab the fold starts in.
    pub slab: usize,
    pub(crate) next: Option<usize>,
}

impl GridNode {
    /// The node a worker runs right after this one when chaining.
    #[inline]
    pub fn proceed(&self) -> Option<usize> {
        self.next
    }
}
