//! Level-synchronous execution of the grid on a rayon pool.

use rayon::prelude::*;

use super::{advance_window, Simulation};
use crate::error::{FoldError, Result};
use crate::grid::{Grid, GridGraph};
use crate::layer::Layer;
use crate::layout::Layout;
use crate::stencil::Stencil;
use crate::tiling::ConeFold;
use crate::window::LayerWindow;

/// Runs each anti-diagonal level of the grid as one parallel loop.
///
/// Nodes of a level never depend on each other, and the loop returns only
/// when the whole level is done, so no per-node synchronization is needed.
pub struct WavefrontSolver<S: Stencil, L> {
    stencil: S,
    grid: Grid<L>,
    graph: GridGraph,
    window: LayerWindow<S::Cell, L>,
    pool: rayon::ThreadPool,
    steps_done: u64,
}

impl<S: Stencil, L: Layout> WavefrontSolver<S, L> {
    /// Build the grid at `cell_rank`, start `workers` threads and let
    /// `init` fill the initial layer.
    pub fn with_initial(
        layout: L,
        tiling: ConeFold,
        cell_rank: u32,
        stencil: S,
        workers: usize,
        init: impl FnOnce(&mut Layer<S::Cell, L>),
    ) -> Result<Self> {
        if workers == 0 {
            return Err(FoldError::NoWorkers);
        }
        let grid = Grid::new(layout, tiling, cell_rank)?;
        let graph = grid.build_graph();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("conefold-wave-{}", i))
            .build()?;
        let window = LayerWindow::with_initial(layout, S::DEPTH, grid.time_depth(), init);

        tracing::info!(
            nodes = grid.node_count(),
            levels = graph.levels().len(),
            workers,
            "Wavefront solver constructed"
        );

        Ok(Self {
            stencil,
            grid,
            graph,
            window,
            pool,
            steps_done: 0,
        })
    }

    /// The node grid.
    pub fn grid(&self) -> &Grid<L> {
        &self.grid
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// The latest computed instant.
    pub fn layer(&self) -> &Layer<S::Cell, L> {
        self.window.current()
    }
}

impl<S: Stencil, L: Layout> Simulation<S::Cell, L> for WavefrontSolver<S, L> {
    fn advance(&mut self, steps: usize) {
        let Self {
            stencil,
            grid,
            graph,
            window,
            pool,
            ..
        } = self;
        let (stencil, grid, graph) = (&*stencil, &*grid, &*graph);

        let batches = advance_window(window, steps, |w| {
            let ring = w.ring();
            let base = w.base();
            pool.install(|| {
                for level in graph.levels() {
                    level.par_iter().for_each(|&id| {
                        // SAFETY: nodes of one level are independent and
                        // earlier levels have fully completed.
                        unsafe { grid.execute(id, stencil, ring, base) }
                    });
                }
            });
        });

        self.steps_done += steps as u64;
        tracing::debug!(steps, batches, total = self.steps_done, "Advanced");
    }

    fn current(&self) -> &Layer<S::Cell, L> {
        self.window.current()
    }

    fn steps_done(&self) -> u64 {
        self.steps_done
    }
}
