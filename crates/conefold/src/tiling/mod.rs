//! Space-time traversals.
//!
//! A tiling runs one *batch*: it fills the `time_depth()` output slots of a
//! [`LayerWindow`], visiting every cell once per instant and never before
//! the cells its stencil reads.
//!
//! - [`ConeFold`] - cache-oblivious recursive folding over space and time
//! - [`RegularTiling`] - plain row sweep, one instant per batch

mod conefold;
mod regular;

pub use conefold::ConeFold;
pub(crate) use conefold::FoldContext;
pub use regular::RegularTiling;

use serde::{Deserialize, Serialize};

use crate::error::{FoldError, Result};
use crate::layout::Layout;
use crate::stencil::{Side, Stencil};
use crate::window::LayerWindow;

/// Boundary tag of a fold along one axis.
///
/// Fold anchors sit one cell past the cells they finally compute; along an
/// axis of `S` cells the anchor positions run from `0` to `S`:
///
/// - `A` - anchored at 0, its leaf lies left of the domain
/// - `B` - leaf computes the first cell
/// - `C` - interior
/// - `D` - anchored at `S`, leaf computes the last cell
/// - `N` - entirely outside the domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FoldType {
    A,
    B,
    C,
    D,
    N,
}

/// Child position inside a fold, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Quadrant {
    /// Lower time half, shifted back by half the fold.
    Behind = 0,
    /// Lower time half, at the fold anchor.
    Base = 1,
    /// Upper time half, at the fold anchor.
    Lifted = 2,
    /// Upper time half, shifted forward by half the fold.
    Ahead = 3,
}

use FoldType::{A, B, C, D, N};

/// Child type of a parent fold, indexed by `[parent][quadrant]`.
pub const TRANSITIONS: [[FoldType; 4]; 5] = [
    /* A */ [N, A, A, B],
    /* B */ [B, C, C, C],
    /* C */ [C, C, C, C],
    /* D */ [C, D, D, N],
    /* N */ [N, N, N, N],
];

impl FoldType {
    /// Type of the child in `quadrant`.
    #[inline(always)]
    pub fn child(self, quadrant: Quadrant) -> FoldType {
        TRANSITIONS[self as usize][quadrant as usize]
    }

    /// Edge tag of a leaf of this type, or `None` if the leaf is skipped.
    #[inline(always)]
    pub fn side(self) -> Option<Side> {
        match self {
            B => Some(Side::Low),
            C => Some(Side::Interior),
            D => Some(Side::High),
            A | N => None,
        }
    }

    /// Type of the fold anchored at `pos` on a grid of rank-`rank` folds
    /// spanning `len` cells.
    pub fn at(pos: usize, rank: u32, len: usize) -> FoldType {
        if pos == 0 {
            A
        } else if pos == 1 << rank {
            B
        } else if pos == len {
            D
        } else if pos > len {
            N
        } else {
            C
        }
    }
}

/// A batch traversal strategy.
pub trait Tiling: Send + Sync + std::fmt::Debug {
    /// Human-readable family name.
    const NAME: &'static str;

    /// Number of instants one batch produces.
    fn time_depth(&self) -> usize;

    /// Reject domains the traversal cannot cover.
    fn check_domain<L: Layout>(&self, layout: &L) -> Result<()>;

    /// Fill every output slot of `window` with `stencil`.
    fn traverse<S: Stencil, L: Layout>(&self, stencil: &S, window: &mut LayerWindow<S::Cell, L>);
}

/// Runtime selection of a tiling family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TilingKind {
    /// Recursive space-time folding.
    #[default]
    ConeFold,
    /// Row sweep.
    Regular,
}

impl TilingKind {
    /// Parse a tiling name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "conefold" | "cone-fold" | "cone" => Ok(Self::ConeFold),
            "regular" | "naive" | "sweep" => Ok(Self::Regular),
            _ => Err(FoldError::Config(format!(
                "Unknown tiling '{}'. Valid options: conefold, regular",
                s
            ))),
        }
    }
}

impl std::fmt::Display for TilingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConeFold => write!(f, "conefold"),
            Self::Regular => write!(f, "regular"),
        }
    }
}
