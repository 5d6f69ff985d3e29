//! One-call simulation driver.
//!
//! Resolves a [`SimulationConfig`] into concrete layout, tiling and solver
//! types, runs the requested number of steps and returns the final layer
//! in row-major order.

use std::io::Write;
use std::time::{Duration, Instant};

use crate::config::{ExecutionKind, SimulationConfig};
use crate::error::Result;
use crate::executor::{default_concurrency, ThreadPool};
use crate::layer::Layer;
use crate::layout::{Layout, LayoutKind, LinearLayout, ZOrderLayout};
use crate::solver::{ParallelSolver, Simulation, Solver, WavefrontSolver};
use crate::stencil::{WaveCell, WaveStencil};
use crate::tiling::{ConeFold, RegularTiling, TilingKind};
use crate::waves::InitialWave;

/// Number of progress callbacks per run, at most.
const PROGRESS_CHUNKS: usize = 50;

/// Outcome of [`run`].
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Domain width.
    pub len_x: usize,
    /// Domain height.
    pub len_y: usize,
    /// Instants computed.
    pub steps: u64,
    /// Wall-clock time spent advancing, setup excluded.
    pub elapsed: Duration,
    /// Final layer, row-major.
    pub cells: Vec<WaveCell>,
}

impl RunReport {
    /// Cell `(x, y)` of the final layer.
    pub fn at(&self, x: usize, y: usize) -> WaveCell {
        self.cells[y * self.len_x + x]
    }

    /// Cell updates per second.
    pub fn throughput(&self) -> f64 {
        let updates = self.steps as f64 * self.cells.len() as f64;
        updates / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    /// Write the final layer as row-major text.
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for row in self.cells.chunks(self.len_x) {
            for cell in row {
                write!(out, "{} ", cell)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Run a simulation to completion.
pub fn run(config: &SimulationConfig) -> Result<RunReport> {
    run_with_progress(config, |_, _| {})
}

/// Run a simulation, calling `progress(done, total)` between chunks of steps.
pub fn run_with_progress(
    config: &SimulationConfig,
    progress: impl FnMut(u64, u64),
) -> Result<RunReport> {
    config.validate()?;
    tracing::info!(
        rank_x = config.rank_x,
        rank_y = config.rank_y,
        layout = %config.layout,
        tiling = %config.tiling,
        execution = %config.execution,
        steps = config.steps,
        wave = %config.wave,
        "Starting simulation"
    );

    let report = match config.layout {
        LayoutKind::Linear => {
            run_layout(config, LinearLayout::new(config.rank_x, config.rank_y)?, progress)
        }
        LayoutKind::ZOrder => {
            run_layout(config, ZOrderLayout::new(config.rank_x, config.rank_y)?, progress)
        }
    }?;

    tracing::info!(
        elapsed_ms = report.elapsed.as_millis() as u64,
        throughput = report.throughput(),
        "Simulation finished"
    );
    Ok(report)
}

fn run_layout<L: Layout>(
    config: &SimulationConfig,
    layout: L,
    progress: impl FnMut(u64, u64),
) -> Result<RunReport> {
    let stencil = WaveStencil::new(config.dspace(), config.dt);
    let wave = config.wave;
    let length = config.length;
    let init = move |layer: &mut Layer<WaveCell, L>| layer.init(length, |x, y| wave.cell(x, y));

    let tiling = ConeFold::new(config.tile_rank);
    let workers = config.workers.unwrap_or_else(default_concurrency);

    match config.execution {
        ExecutionKind::Tiling => match config.tiling {
            TilingKind::ConeFold => {
                let solver = Solver::with_initial(layout, tiling, stencil, init)?;
                Ok(drive::<L, _, _>(solver, tiling_depth(config), config.steps, progress))
            }
            TilingKind::Regular => {
                let solver = Solver::with_initial(layout, RegularTiling, stencil, init)?;
                Ok(drive::<L, _, _>(solver, 1, config.steps, progress))
            }
        },
        ExecutionKind::Pool => {
            let pool = ThreadPool::new(workers)?;
            let solver = ParallelSolver::with_initial(
                layout,
                tiling,
                config.cell_rank,
                stencil,
                pool,
                config.dispatch,
                init,
            )?;
            Ok(drive::<L, _, _>(solver, tiling_depth(config), config.steps, progress))
        }
        ExecutionKind::Wavefront => {
            let solver = WavefrontSolver::with_initial(
                layout,
                tiling,
                config.cell_rank,
                stencil,
                workers,
                init,
            )?;
            Ok(drive::<L, _, _>(solver, tiling_depth(config), config.steps, progress))
        }
    }
}

fn tiling_depth(config: &SimulationConfig) -> usize {
    1 << config.tile_rank
}

/// Advance in whole batches, reporting progress after each chunk.
fn drive<L, S, P>(mut sim: S, batch: usize, total: usize, mut progress: P) -> RunReport
where
    L: Layout,
    S: Simulation<WaveCell, L>,
    P: FnMut(u64, u64),
{
    let chunk = (total / PROGRESS_CHUNKS).max(1).div_ceil(batch) * batch;

    let start = Instant::now();
    let mut done = 0;
    while done < total {
        let n = chunk.min(total - done);
        sim.advance(n);
        done += n;
        progress(done as u64, total as u64);
    }
    let elapsed = start.elapsed();

    let layer = sim.current();
    RunReport {
        len_x: layer.layout().len_x(),
        len_y: layer.layout().len_y(),
        steps: sim.steps_done(),
        elapsed,
        cells: layer.to_row_major(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Dispatch;

    fn small() -> SimulationConfig {
        SimulationConfig::default()
            .with_rank(5)
            .with_tile_rank(3)
            .with_cell_rank(2)
            .with_length(32.0)
            .with_time_step(0.5)
            .with_steps(37)
    }

    #[test]
    fn test_all_executions_agree() {
        let reference = run(&small().with_tiling(TilingKind::Regular).with_layout(LayoutKind::Linear)).unwrap();
        assert_eq!(reference.steps, 37);

        let variants = [
            small(),
            small().with_execution(ExecutionKind::Pool).with_workers(2),
            small()
                .with_execution(ExecutionKind::Pool)
                .with_workers(3)
                .with_dispatch(Dispatch::Chained),
            small().with_execution(ExecutionKind::Wavefront).with_workers(2),
        ];
        for config in variants {
            let report = run(&config).unwrap();
            assert_eq!(report.cells, reference.cells, "{:?}", config.execution);
        }
    }

    #[test]
    fn test_progress_reaches_total() {
        let mut last = (0, 0);
        let mut calls = 0;
        run_with_progress(&small(), |done, total| {
            assert!(done > last.0);
            last = (done, total);
            calls += 1;
        })
        .unwrap();
        assert_eq!(last, (37, 37));
        assert!(calls <= PROGRESS_CHUNKS + 1);
    }

    #[test]
    fn test_dump_format() {
        let report = RunReport {
            len_x: 2,
            len_y: 2,
            steps: 0,
            elapsed: Duration::ZERO,
            cells: vec![
                WaveCell::new(1.0, 0.5),
                WaveCell::new(1.0, 1.0),
                WaveCell::new(1.0, -2.0),
                WaveCell::new(1.0, 0.0),
            ],
        };
        let mut out = Vec::new();
        report.dump(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0.5 1 \n-2 0 \n");
        assert_eq!(report.at(0, 1).intensity, -2.0);
    }

    #[test]
    fn test_invalid_config_rejected_before_running() {
        assert!(run(&small().with_time_step(-1.0)).is_err());
    }
}
