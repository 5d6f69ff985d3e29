//! ConeFold: cache-oblivious space-time tiling.
//!
//! A fold of rank `r` anchored at position `p` (per axis) covers, at local
//! time `t`, the cells `p - 2^r + t ..= p - 1 + t`: a `2^r` wide window that
//! slides forward one cell per instant. Folds split into four children at
//! half the rank. While the rank is within the tile rank, a second group of
//! four children covers the upper half of the fold's time span, shifted
//! forward by half the fold.
//!
//! Every cell reads its neighbours one instant back. Those lie either in
//! the same fold or in the fold ahead of it along x and/or y, so siblings
//! run from the far corner inwards:
//!
//! ```text
//!   diag 4:  (+,+)
//!   diag 3:  (0,+) (+,0)
//!   diag 2:  (0,0) (-,+) (+,-)
//!   diag 1:  (-,0) (0,-)
//!   diag 0:  (-,-)
//! ```
//!
//! The recursion never looks at cache sizes; it just keeps halving until
//! the working set of a fold fits whatever cache level is below it.

use super::{FoldType, Quadrant, Tiling};
use crate::error::{FoldError, Result};
use crate::layout::{step, Layout};
use crate::stencil::Stencil;
use crate::window::{LayerRing, LayerWindow};

use FoldType::{A, B, D, N};
use Quadrant::{Ahead, Base, Behind, Lifted};

/// Recursive space-time tiling of rank `tile_rank`.
///
/// One batch advances `2^tile_rank` instants. The domain must be square
/// and strictly larger than one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConeFold {
    tile_rank: u32,
}

impl ConeFold {
    /// Create a tiling whose folds span `2^tile_rank` instants.
    pub fn new(tile_rank: u32) -> Self {
        Self { tile_rank }
    }

    /// Log2 of the batch length.
    pub fn tile_rank(&self) -> u32 {
        self.tile_rank
    }
}

impl Default for ConeFold {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Tiling for ConeFold {
    const NAME: &'static str = "ConeFold";

    fn time_depth(&self) -> usize {
        1 << self.tile_rank
    }

    fn check_domain<L: Layout>(&self, layout: &L) -> Result<()> {
        if layout.rank_x() != layout.rank_y() {
            return Err(FoldError::NonSquareDomain {
                tiling: Self::NAME,
                rank_x: layout.rank_x(),
                rank_y: layout.rank_y(),
            });
        }
        if self.tile_rank >= layout.rank_x() {
            return Err(FoldError::TileRankTooLarge {
                tile: self.tile_rank,
                domain: layout.rank_x(),
            });
        }
        Ok(())
    }

    fn traverse<S: Stencil, L: Layout>(&self, stencil: &S, window: &mut LayerWindow<S::Cell, L>) {
        debug_assert!(self.check_domain(window.current().layout()).is_ok());
        let ctx = FoldContext::new(stencil, window.ring(), window.base(), self.tile_rank);
        // SAFETY: the exclusive borrow of the window rules out any other
        // access to its layers while the sequential recursion runs.
        unsafe { ctx.traverse_domain() }
    }
}

/// Everything a fold needs besides its own position.
pub(crate) struct FoldContext<'a, S: Stencil, L> {
    stencil: &'a S,
    ring: &'a LayerRing<S::Cell, L>,
    base: usize,
    layout: L,
    tile_rank: u32,
}

impl<'a, S: Stencil, L: Layout> FoldContext<'a, S, L> {
    pub(crate) fn new(
        stencil: &'a S,
        ring: &'a LayerRing<S::Cell, L>,
        base: usize,
        tile_rank: u32,
    ) -> Self {
        let layout = *ring.layer(base, 0).layout();
        Self {
            stencil,
            ring,
            base,
            layout,
            tile_rank,
        }
    }

    /// Run the nine top-level folds that cover the whole domain.
    ///
    /// # Safety
    ///
    /// No other thread may access the window's output slots meanwhile.
    pub(crate) unsafe fn traverse_domain(&self) {
        let l = &self.layout;
        let less = l.rank_x() - 1;

        let x1 = l.off_right(0, less, 1);
        let x2 = l.off_right(0, less, 2);
        let y1 = l.off_bottom(0, less, 1);
        let y2 = l.off_bottom(0, less, 2);
        let at = |dx: isize, dy: isize| step(step(0, dx), dy);

        // SAFETY: forwarded from the caller.
        unsafe {
            self.fold(less, D, D, at(x2, y2), 0);

            self.fold(less, B, D, at(x1, y2), 0);
            self.fold(less, D, B, at(x2, y1), 0);

            self.fold(less, B, B, at(x1, y1), 0);
            self.fold(less, A, D, at(0, y2), 0);
            self.fold(less, D, A, at(x2, 0), 0);

            self.fold(less, A, B, at(0, y1), 0);
            self.fold(less, B, A, at(x1, 0), 0);

            self.fold(less, A, A, 0, 0);
        }
    }

    /// Process one fold of `rank` anchored at `idx`, starting at batch
    /// step `slot`.
    ///
    /// # Safety
    ///
    /// The cells this fold writes must not be accessed by anyone else, and
    /// every cell it reads from outside the fold must already be final.
    pub(crate) unsafe fn fold(&self, rank: u32, x: FoldType, y: FoldType, idx: usize, slot: usize) {
        if x == N || y == N {
            return;
        }

        if rank == 0 {
            // SAFETY: forwarded from the caller.
            unsafe { self.leaf(x, y, idx, slot) };
            return;
        }

        let l = &self.layout;
        let less = rank - 1;

        let x_dec = l.off_left(idx, less, 1);
        let y_dec = l.off_top(idx, less, 1);

        // SAFETY: children partition this fold and run in dependency order.
        unsafe {
            self.fold(less, x.child(Base), y.child(Base), idx, slot);
            self.fold(less, x.child(Behind), y.child(Base), step(idx, x_dec), slot);
            self.fold(less, x.child(Base), y.child(Behind), step(idx, y_dec), slot);
            self.fold(
                less,
                x.child(Behind),
                y.child(Behind),
                step(step(idx, x_dec), y_dec),
                slot,
            );
        }

        if rank > self.tile_rank {
            return;
        }

        let slot = slot + (1 << less);
        let x_inc = l.off_right(idx, less, 1);
        let y_inc = l.off_bottom(idx, less, 1);

        // SAFETY: as above, one half-fold later in time.
        unsafe {
            self.fold(
                less,
                x.child(Ahead),
                y.child(Ahead),
                step(step(idx, x_inc), y_inc),
                slot,
            );
            self.fold(less, x.child(Lifted), y.child(Ahead), step(idx, y_inc), slot);
            self.fold(less, x.child(Ahead), y.child(Lifted), step(idx, x_inc), slot);
            self.fold(less, x.child(Lifted), y.child(Lifted), idx, slot);
        }
    }

    /// Apply the stencil to the cell one step up-left of the anchor.
    #[inline(always)]
    unsafe fn leaf(&self, x: FoldType, y: FoldType, idx: usize, slot: usize) {
        let (Some(x_side), Some(y_side)) = (x.side(), y.side()) else {
            return;
        };

        let l = &self.layout;
        let cell = step(step(idx, l.off_left(idx, 0, 1)), l.off_top(idx, 0, 1));

        let frame = self.ring.frame(self.base, slot);
        let value = self.stencil.apply(cell, &frame, x_side, y_side);
        // SAFETY: each (cell, slot) pair belongs to exactly one leaf.
        unsafe { frame.write(cell, value) };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::layout::{LinearLayout, ZOrderLayout};
    use crate::stencil::{Neighbors, Side, Target};
    use crate::window::Frame;

    /// Counts instants and checks that every read sees the expected instant.
    struct ClockStencil {
        applied: AtomicUsize,
    }

    unsafe impl Stencil for ClockStencil {
        type Cell = u64;
        const DEPTH: usize = 2;
        const TARGETS: &'static [Target] = crate::stencil::WAVE_TARGETS;

        fn apply<L: Layout>(&self, idx: usize, frame: &Frame<'_, u64, L>, xs: Side, ys: Side) -> u64 {
            self.applied.fetch_add(1, Ordering::Relaxed);
            let now = frame.read(1, idx);
            assert_eq!(frame.read(2, idx) + 1, now, "stale history at {:#x}", idx);
            let n = Neighbors::of(frame.layout(), idx, xs, ys);
            for nb in [n.left, n.right, n.top, n.bottom] {
                assert_eq!(frame.read(1, nb), now, "neighbour {:#x} of {:#x} not ready", nb, idx);
            }
            now + 1
        }
    }

    fn run_batches<L: Layout>(layout: L, tile_rank: u32, batches: usize) {
        let tiling = ConeFold::new(tile_rank);
        tiling.check_domain(&layout).unwrap();

        let stencil = ClockStencil {
            applied: AtomicUsize::new(0),
        };
        let mut window = LayerWindow::with_initial(layout, 2, tiling.time_depth(), |layer| {
            layer.fill_with(|_, _| 1)
        });

        for _ in 0..batches {
            tiling.traverse(&stencil, &mut window);
            window.rotate(tiling.time_depth());
        }

        let steps = batches * tiling.time_depth();
        assert_eq!(stencil.applied.load(Ordering::Relaxed), steps * layout.cell_count());
        let current = window.current();
        for y in 0..layout.len_y() {
            for x in 0..layout.len_x() {
                assert_eq!(current.at(x, y), 1 + steps as u64);
            }
        }
    }

    #[test]
    fn test_every_cell_once_per_instant_linear() {
        for rank in 1..=5 {
            for tile_rank in 0..rank {
                run_batches(LinearLayout::square(rank).unwrap(), tile_rank, 2);
            }
        }
    }

    #[test]
    fn test_every_cell_once_per_instant_zorder() {
        for rank in 1..=5 {
            for tile_rank in 0..rank {
                run_batches(ZOrderLayout::square(rank).unwrap(), tile_rank, 2);
            }
        }
    }

    #[test]
    fn test_domain_checks() {
        let tiling = ConeFold::new(3);
        assert!(tiling.check_domain(&LinearLayout::square(4).unwrap()).is_ok());
        assert!(matches!(
            tiling.check_domain(&LinearLayout::square(3).unwrap()),
            Err(FoldError::TileRankTooLarge { tile: 3, domain: 3 })
        ));
        assert!(matches!(
            tiling.check_domain(&ZOrderLayout::new(4, 5).unwrap()),
            Err(FoldError::NonSquareDomain { .. })
        ));
    }

    #[test]
    fn test_time_depth() {
        assert_eq!(ConeFold::new(0).time_depth(), 1);
        assert_eq!(ConeFold::new(4).time_depth(), 16);
    }
}
