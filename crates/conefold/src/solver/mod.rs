//! Solvers: own the layer window and drive a traversal through time.
//!
//! All solvers advance in whole batches of the traversal's time depth and
//! rotate the window after each one. When the requested step count is not
//! a multiple of the batch, the window is rotated back by the overshoot so
//! that [`Simulation::current`] holds exactly the requested instant.
//!
//! - [`Solver`] - single-threaded, any [`Tiling`]
//! - [`ParallelSolver`] - grid nodes on an [`Executor`](crate::executor::Executor), semaphore-gated
//! - [`WavefrontSolver`] - grid levels on a rayon pool, barrier between levels

mod parallel;
mod wavefront;

pub use parallel::{Dispatch, ParallelSolver};
pub use wavefront::WavefrontSolver;

use crate::error::Result;
use crate::layer::Layer;
use crate::layout::Layout;
use crate::stencil::Stencil;
use crate::tiling::Tiling;
use crate::window::LayerWindow;

/// Common interface of all solvers.
pub trait Simulation<C, L> {
    /// Advance the simulation by exactly `steps` instants.
    fn advance(&mut self, steps: usize);

    /// The latest computed instant.
    fn current(&self) -> &Layer<C, L>;

    /// Instants computed since construction.
    fn steps_done(&self) -> u64;
}

/// Runs `batches` batches through `run`, then rotates back the overshoot.
///
/// Returns the number of batches run.
pub(crate) fn advance_window<T: Copy, L: Layout>(
    window: &mut LayerWindow<T, L>,
    steps: usize,
    mut run: impl FnMut(&mut LayerWindow<T, L>),
) -> usize {
    if steps == 0 {
        return 0;
    }
    let depth = window.span();
    let batches = steps.div_ceil(depth);
    for _ in 0..batches {
        run(window);
        window.rotate(depth);
    }
    let overshoot = batches * depth - steps;
    if overshoot > 0 {
        window.rotate_back(overshoot);
    }
    tracing::trace!(steps, batches, overshoot, "Window advanced");
    batches
}

/// Sequential solver over any tiling.
pub struct Solver<S: Stencil, L, T> {
    stencil: S,
    tiling: T,
    window: LayerWindow<S::Cell, L>,
    steps_done: u64,
}

impl<S: Stencil, L: Layout, T: Tiling> Solver<S, L, T> {
    /// Create a solver whose initial layer is all defaults.
    pub fn new(layout: L, tiling: T, stencil: S) -> Result<Self> {
        Self::with_initial(layout, tiling, stencil, |_| {})
    }

    /// Create a solver and let `init` fill the initial layer.
    pub fn with_initial(
        layout: L,
        tiling: T,
        stencil: S,
        init: impl FnOnce(&mut Layer<S::Cell, L>),
    ) -> Result<Self> {
        tiling.check_domain(&layout)?;
        let window = LayerWindow::with_initial(layout, S::DEPTH, tiling.time_depth(), init);

        tracing::info!(
            tiling = T::NAME,
            len_x = layout.len_x(),
            len_y = layout.len_y(),
            time_depth = tiling.time_depth(),
            layers = window.ring().len(),
            "Solver constructed"
        );
        Ok(Self {
            stencil,
            tiling,
            window,
            steps_done: 0,
        })
    }

    /// The stencil in use.
    pub fn stencil(&self) -> &S {
        &self.stencil
    }

    /// The tiling in use.
    pub fn tiling(&self) -> &T {
        &self.tiling
    }

    /// The layer window.
    pub fn window(&self) -> &LayerWindow<S::Cell, L> {
        &self.window
    }

    /// The latest computed instant.
    pub fn layer(&self) -> &Layer<S::Cell, L> {
        self.window.current()
    }
}

impl<S: Stencil, L: Layout, T: Tiling> Simulation<S::Cell, L> for Solver<S, L, T> {
    fn advance(&mut self, steps: usize) {
        let Self {
            stencil,
            tiling,
            window,
            ..
        } = self;
        let batches = advance_window(window, steps, |w| tiling.traverse(&*stencil, w));
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
