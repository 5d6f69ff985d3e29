//! Simulation configuration.
//!
//! The library never reads files by itself; callers deserialize a
//! [`SimulationConfig`] from TOML (or build one with the `with_*` methods)
//! and hand it to [`run`](crate::run::run).

use serde::{Deserialize, Serialize};

use crate::error::{FoldError, Result};
use crate::layout::{check_rank, LayoutKind, LinearLayout};
use crate::solver::Dispatch;
use crate::tiling::{ConeFold, Tiling, TilingKind};
use crate::waves::WaveKind;

/// Which solver drives the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionKind {
    /// Single-threaded tiling traversal.
    #[default]
    Tiling,
    /// Grid nodes on the worker pool.
    Pool,
    /// Grid levels on a rayon pool.
    Wavefront,
}

impl ExecutionKind {
    /// Parse an execution name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiling" | "sequential" | "seq" => Ok(Self::Tiling),
            "pool" | "threads" | "parallel" => Ok(Self::Pool),
            "wavefront" | "wave" | "rayon" => Ok(Self::Wavefront),
            _ => Err(FoldError::Config(format!(
                "Unknown execution '{}'. Valid options: tiling, pool, wavefront",
                s
            ))),
        }
    }

    /// True for the solvers built on the node grid.
    pub fn uses_grid(&self) -> bool {
        !matches!(self, Self::Tiling)
    }
}

impl std::fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tiling => write!(f, "tiling"),
            Self::Pool => write!(f, "pool"),
            Self::Wavefront => write!(f, "wavefront"),
        }
    }
}

/// Everything needed to set up and run one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Log2 of the domain width.
    pub rank_x: u32,
    /// Log2 of the domain height.
    pub rank_y: u32,
    /// Log2 of the ConeFold batch length.
    pub tile_rank: u32,
    /// Log2 of the grid node size.
    pub cell_rank: u32,
    /// Number of instants to compute.
    pub steps: usize,
    /// Physical extent of the domain along y.
    pub length: f64,
    /// Time step.
    pub dt: f64,
    /// Memory layout.
    pub layout: LayoutKind,
    /// Sequential traversal.
    pub tiling: TilingKind,
    /// Solver family.
    pub execution: ExecutionKind,
    /// Worker threads for the parallel solvers; `None` uses every core.
    pub workers: Option<usize>,
    /// Task packaging for the pool solver.
    pub dispatch: Dispatch,
    /// Initial condition.
    pub wave: WaveKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rank_x: 7,
            rank_y: 7,
            tile_rank: 4,
            cell_rank: 3,
            steps: 100,
            length: 1e2,
            dt: 0.1,
            layout: LayoutKind::ZOrder,
            tiling: TilingKind::ConeFold,
            execution: ExecutionKind::Tiling,
            workers: None,
            dispatch: Dispatch::PerNode,
            wave: WaveKind::default(),
        }
    }
}

impl SimulationConfig {
    /// Square domain of side `2^rank`.
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank_x = rank;
        self.rank_y = rank;
        self
    }

    /// Domain of `2^rank_x × 2^rank_y` cells.
    pub fn with_ranks(mut self, rank_x: u32, rank_y: u32) -> Self {
        self.rank_x = rank_x;
        self.rank_y = rank_y;
        self
    }

    /// Set the ConeFold tile rank.
    pub fn with_tile_rank(mut self, tile_rank: u32) -> Self {
        self.tile_rank = tile_rank;
        self
    }

    /// Set the grid node rank.
    pub fn with_cell_rank(mut self, cell_rank: u32) -> Self {
        self.cell_rank = cell_rank;
        self
    }

    /// Set the number of instants to compute.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Set the physical domain length.
    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    /// Set the time step.
    pub fn with_time_step(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Set the memory layout.
    pub fn with_layout(mut self, layout: LayoutKind) -> Self {
        self.layout = layout;
        self
    }

    /// Set the sequential tiling.
    pub fn with_tiling(mut self, tiling: TilingKind) -> Self {
        self.tiling = tiling;
        self
    }

    /// Set the solver family.
    pub fn with_execution(mut self, execution: ExecutionKind) -> Self {
        self.execution = execution;
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the task packaging for the pool solver.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Set the initial condition.
    pub fn with_wave(mut self, wave: WaveKind) -> Self {
        self.wave = wave;
        self
    }

    /// Cells per axis, `(Sx, Sy)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (1 << self.rank_x, 1 << self.rank_y)
    }

    /// Spatial step `length / Sy`.
    pub fn dspace(&self) -> f64 {
        self.length / (1u64 << self.rank_y) as f64
    }

    /// Reject configurations no solver can run.
    pub fn validate(&self) -> Result<()> {
        check_rank(self.rank_x)?;
        check_rank(self.rank_y)?;

        if !(self.length.is_finite() && self.length > 0.0) {
            return Err(FoldError::InvalidLength(self.length));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(FoldError::InvalidTimeStep(self.dt));
        }
        if self.workers == Some(0) {
            return Err(FoldError::NoWorkers);
        }

        let needs_conefold = self.execution.uses_grid() || self.tiling == TilingKind::ConeFold;
        if needs_conefold {
            let domain = LinearLayout::new(self.rank_x, self.rank_y)?;
            ConeFold::new(self.tile_rank).check_domain(&domain)?;
        }
        if self.execution.uses_grid() && self.cell_rank >= self.rank_x {
            return Err(FoldError::CellRankTooLarge {
                cell: self.cell_rank,
                domain: self.rank_x,
            });
        }
        Ok(())
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Render as a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waves::Gaussian;

    #[test]
    fn test_default_is_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dimensions(), (128, 128));
        assert_eq!(config.dspace(), 100.0 / 128.0);
    }

    #[test]
    fn test_builder_chain() {
        let config = SimulationConfig::default()
            .with_rank(5)
            .with_tile_rank(2)
            .with_cell_rank(1)
            .with_execution(ExecutionKind::Pool)
            .with_workers(3)
            .with_dispatch(Dispatch::Chained);
        config.validate().unwrap();
        assert_eq!(config.rank_x, 5);
        assert_eq!(config.workers, Some(3));
    }

    #[test]
    fn test_validation_errors() {
        let base = SimulationConfig::default();
        assert!(matches!(
            base.clone().with_rank(0).validate(),
            Err(FoldError::InvalidDomainRank { .. })
        ));
        assert!(matches!(
            base.clone().with_length(0.0).validate(),
            Err(FoldError::InvalidLength(_))
        ));
        assert!(matches!(
            base.clone().with_time_step(f64::NAN).validate(),
            Err(FoldError::InvalidTimeStep(_))
        ));
        assert!(matches!(
            base.clone().with_tile_rank(7).validate(),
            Err(FoldError::TileRankTooLarge { .. })
        ));
        assert!(matches!(
            base.clone().with_ranks(7, 6).validate(),
            Err(FoldError::NonSquareDomain { .. })
        ));
        assert!(matches!(
            base.clone()
                .with_execution(ExecutionKind::Wavefront)
                .with_cell_rank(7)
                .validate(),
            Err(FoldError::CellRankTooLarge { .. })
        ));
        assert!(matches!(base.with_workers(0).validate(), Err(FoldError::NoWorkers)));
    }

    #[test]
    fn test_rectangular_regular_is_valid() {
        SimulationConfig::default()
            .with_ranks(6, 4)
            .with_tiling(TilingKind::Regular)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            rank_x = 5
            rank_y = 5
            execution = "wavefront"

            [wave]
            kind = "gaussian"
            amplitude = 1.0
            sweep = 0.01
            "#,
        )
        .unwrap();
        assert_eq!(config.rank_x, 5);
        assert_eq!(config.execution, ExecutionKind::Wavefront);
        assert_eq!(config.tile_rank, 4);
        assert_eq!(
            config.wave,
            WaveKind::Gaussian(Gaussian {
                amplitude: 1.0,
                sweep: 0.01
            })
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SimulationConfig::default().with_workers(2);
        let text = config.to_toml_string().unwrap();
        assert_eq!(SimulationConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            SimulationConfig::from_toml_str("layout = \"hilbert\""),
            Err(FoldError::Config(_))
        ));
    }
}
