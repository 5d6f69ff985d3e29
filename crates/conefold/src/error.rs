//! Error types for solver construction and configuration.

use thiserror::Error;

/// Result type for ConeFold operations.
pub type Result<T> = std::result::Result<T, FoldError>;

/// Errors raised while building a solver, grid or executor.
///
/// Computation itself never fails: every check happens before the first
/// time-step runs.
#[derive(Error, Debug)]
pub enum FoldError {
    /// Domain side rank is zero or too large to address.
    #[error("Invalid domain rank {rank}: must be in 1..={max}")]
    InvalidDomainRank {
        /// Requested rank.
        rank: u32,
        /// Largest supported rank.
        max: u32,
    },

    /// Tile rank must stay strictly below the domain rank.
    #[error("Tile rank {tile} must be smaller than domain rank {domain}")]
    TileRankTooLarge {
        /// Requested tile rank.
        tile: u32,
        /// Domain side rank.
        domain: u32,
    },

    /// Grid node rank must stay strictly below the domain rank.
    #[error("Cell rank {cell} must be smaller than domain rank {domain}")]
    CellRankTooLarge {
        /// Requested grid node rank.
        cell: u32,
        /// Domain side rank.
        domain: u32,
    },

    /// The selected tiling only supports square domains.
    #[error("{tiling} tiling requires a square domain, got {rank_x}x{rank_y} ranks")]
    NonSquareDomain {
        /// Tiling name.
        tiling: &'static str,
        /// Width rank.
        rank_x: u32,
        /// Height rank.
        rank_y: u32,
    },

    /// Physical domain length is zero, negative or not finite.
    #[error("Invalid domain length: {0}")]
    InvalidLength(f64),

    /// Time step is zero, negative or not finite.
    #[error("Invalid time step: {0}")]
    InvalidTimeStep(f64),

    /// Worker pool requested with no workers.
    #[error("Worker count must be positive")]
    NoWorkers,

    /// A worker thread pool could not be started.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Configuration text could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while dumping a layer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for FoldError {
    fn from(e: toml::de::Error) -> Self {
        FoldError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for FoldError {
    fn from(e: toml::ser::Error) -> Self {
        FoldError::Config(e.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for FoldError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        FoldError::ThreadPool(e.to_string())
    }
}
