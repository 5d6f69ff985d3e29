//! Second-order leapfrog stencil for the 2D scalar wave equation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Neighbors, Side, Stencil, Target};
use crate::layout::Layout;
use crate::window::Frame;

/// Footprint of [`WaveStencil`]: the five-point cross one step back plus
/// the centre two steps back.
pub const WAVE_TARGETS: &[Target] = &[
    Target::new(1, 0, 0),
    Target::new(1, 1, 0),
    Target::new(1, -1, 0),
    Target::new(1, 0, 1),
    Target::new(1, 0, -1),
    Target::new(2, 0, 0),
];

/// State of one wave cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveCell {
    /// Local propagation speed.
    pub factor: f64,
    /// Field amplitude.
    pub intensity: f64,
}

impl WaveCell {
    /// Create a cell.
    pub const fn new(factor: f64, intensity: f64) -> Self {
        Self { factor, intensity }
    }
}

impl fmt::Display for WaveCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.intensity)
    }
}

/// Explicit FDTD update `u+ = 2u - u- + C^2 * (d2x u + d2y u)`.
///
/// The Courant number `C = factor * dt / dx` is evaluated per cell from the
/// latest instant. Stability (`C <= 1/sqrt(2)`) is the caller's concern.
#[derive(Debug, Clone)]
pub struct WaveStencil {
    dtime: f64,
    inv_dspace: f64,
}

impl WaveStencil {
    /// Create a stencil from the spatial and temporal steps.
    pub fn new(dspace: f64, dtime: f64) -> Self {
        Self {
            dtime,
            inv_dspace: 1.0 / dspace,
        }
    }

    /// Create a stencil for a domain of `length` spanning `cells` cells.
    pub fn for_domain(length: f64, cells: usize, dtime: f64) -> Self {
        Self::new(length / cells as f64, dtime)
    }

    /// Courant number for a cell with the given speed factor.
    #[inline(always)]
    pub fn courant(&self, factor: f64) -> f64 {
        factor * self.dtime * self.inv_dspace
    }

    /// Check the 2D CFL condition for a speed factor.
    pub fn is_stable(&self, factor: f64) -> bool {
        self.courant(factor) <= 1.0 / std::f64::consts::SQRT_2
    }
}

// SAFETY: `apply` reads the centre at depths 1 and 2 and the four axis
// neighbours at depth 1, clamped by `Neighbors::of`, matching WAVE_TARGETS.
unsafe impl Stencil for WaveStencil {
    type Cell = WaveCell;

    const DEPTH: usize = 2;
    const TARGETS: &'static [Target] = WAVE_TARGETS;

    #[inline(always)]
    fn apply<L: Layout>(
        &self,
        idx: usize,
        frame: &Frame<'_, WaveCell, L>,
        x_side: Side,
        y_side: Side,
    ) -> WaveCell {
        let n = Neighbors::of(frame.layout(), idx, x_side, y_side);

        let prev = frame.read(1, idx);
        let older = frame.read(2, idx);

        let courant = self.courant(prev.factor);
        let courant2 = courant * courant;

        let centre = prev.intensity;
        let d2y = frame.read(1, n.bottom).intensity + frame.read(1, n.top).intensity - 2.0 * centre;
        let d2x = frame.read(1, n.right).intensity + frame.read(1, n.left).intensity - 2.0 * centre;

        WaveCell {
            factor: prev.factor,
            intensity: 2.0 * centre - older.intensity + (d2y + d2x) * courant2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stencil::footprint_depth;

    #[test]
    fn test_courant_number() {
        let stencil = WaveStencil::for_domain(8.0, 8, 0.5);
        assert_eq!(stencil.courant(1.0), 0.5);
        assert!(stencil.is_stable(1.0));
        assert!(!stencil.is_stable(2.0));
    }

    #[test]
    fn test_declared_depth_matches_footprint() {
        assert_eq!(WaveStencil::DEPTH, footprint_depth(WaveStencil::TARGETS));
        assert_eq!(WaveStencil::TARGETS.len(), 6);
    }

    #[test]
    fn test_display_prints_intensity() {
        assert_eq!(WaveCell::new(1.0, 0.25).to_string(), "0.25");
    }
}
