//! # ConeFold
//!
//! Cache-oblivious space-time tiling for explicit 2D stencil codes, with a
//! dependency-graph scheduler that replays the same decomposition on any
//! number of threads.
//!
//! The crate integrates the scalar wave equation with a leapfrog stencil,
//! but the engine is generic over the [`Stencil`] trait.
//!
//! ## Core Abstractions
//!
//! - [`Layout`] - O(1) offset arithmetic for row-major and Z-order layers
//! - [`Stencil`] - per-cell update rule with a declared footprint
//! - [`Tiling`] - batch traversal ([`ConeFold`], [`RegularTiling`])
//! - [`Grid`] - one recursion level materialized as nodes plus a [`GridGraph`]
//! - [`Executor`] - sequential or thread-pool task runner
//! - [`Simulation`] - solvers that own the time-layer window and advance it
//!
//! ## Example
//!
//! ```
//! use conefold::prelude::*;
//!
//! let layout = ZOrderLayout::square(5)?;
//! let stencil = WaveStencil::for_domain(32.0, 32, 0.5);
//! let wave = Gaussian { amplitude: 1.0, sweep: 0.1 };
//!
//! let mut solver = Solver::with_initial(layout, ConeFold::new(3), stencil, |layer| {
//!     layer.init(32.0, |x, y| wave.cell(x, y))
//! })?;
//! solver.advance(20);
//! assert_eq!(solver.steps_done(), 20);
//! # Ok::<(), conefold::FoldError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod executor;
pub mod grid;
pub mod layer;
pub mod layout;
pub mod run;
pub mod solver;
pub mod stencil;
pub mod tiling;
pub mod waves;
pub mod window;

pub use config::{ExecutionKind, SimulationConfig};
pub use error::{FoldError, Result};
pub use executor::{CountingSemaphore, Executor, SequentialExecutor, ThreadPool};
pub use grid::{Grid, GridGraph, GridNode};
pub use layer::Layer;
pub use layout::{Layout, LayoutKind, LinearLayout, ZOrderLayout};
pub use run::{run, run_with_progress, RunReport};
pub use solver::{Dispatch, ParallelSolver, Simulation, Solver, WavefrontSolver};
pub use stencil::{Side, Stencil, Target, WaveCell, WaveStencil};
pub use tiling::{ConeFold, FoldType, RegularTiling, Tiling, TilingKind};
pub use waves::{CosineHat, Gaussian, InitialWave, WaveKind};
pub use window::{Frame, LayerWindow};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{ExecutionKind, SimulationConfig};
    pub use crate::error::{FoldError, Result};
    pub use crate::executor::{Executor, SequentialExecutor, ThreadPool};
    pub use crate::layer::Layer;
    pub use crate::layout::{Layout, LayoutKind, LinearLayout, ZOrderLayout};
    pub use crate::solver::{Dispatch, ParallelSolver, Simulation, Solver, WavefrontSolver};
    pub use crate::stencil::{Side, Stencil, WaveCell, WaveStencil};
    pub use crate::tiling::{ConeFold, RegularTiling, Tiling, TilingKind};
    pub use crate::waves::{CosineHat, Gaussian, InitialWave, WaveKind};
}
