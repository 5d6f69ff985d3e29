//! Closed-form initial conditions.
//!
//! Waves are radial functions of the physical position, centred on the
//! domain middle. [`Layer::init`](crate::layer::Layer::init) does the
//! index-to-position mapping.

use serde::{Deserialize, Serialize};

use crate::stencil::WaveCell;

/// A scalar field over the plane used as the initial intensity.
pub trait InitialWave {
    /// Intensity at physical position `(x, y)`.
    fn intensity(&self, x: f64, y: f64) -> f64;

    /// Initial wave cell at `(x, y)`, with unit speed factor.
    fn cell(&self, x: f64, y: f64) -> WaveCell {
        WaveCell::new(1.0, self.intensity(x, y))
    }
}

/// `a * (cos(r * f) + 1) / (r + 1)`: a damped ring pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CosineHat {
    /// Peak intensity scale.
    pub amplitude: f64,
    /// Radial frequency.
    pub frequency: f64,
}

impl Default for CosineHat {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            frequency: 0.5,
        }
    }
}

impl InitialWave for CosineHat {
    #[inline]
    fn intensity(&self, x: f64, y: f64) -> f64 {
        let r = (x * x + y * y).sqrt();
        self.amplitude * ((r * self.frequency).cos() + 1.0) / (r + 1.0)
    }
}

/// `a * exp(-r^2 * sweep)`: a single smooth bump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    /// Peak intensity.
    pub amplitude: f64,
    /// Inverse squared width.
    pub sweep: f64,
}

impl Default for Gaussian {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            sweep: 1.0,
        }
    }
}

impl InitialWave for Gaussian {
    #[inline]
    fn intensity(&self, x: f64, y: f64) -> f64 {
        let r2 = x * x + y * y;
        self.amplitude * (-r2 * self.sweep).exp()
    }
}

/// Runtime selection of the initial wave, as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WaveKind {
    /// See [`CosineHat`].
    CosineHat(CosineHat),
    /// See [`Gaussian`].
    Gaussian(Gaussian),
}

impl Default for WaveKind {
    fn default() -> Self {
        Self::CosineHat(CosineHat::default())
    }
}

impl InitialWave for WaveKind {
    fn intensity(&self, x: f64, y: f64) -> f64 {
        match self {
            Self::CosineHat(w) => w.intensity(x, y),
            Self::Gaussian(w) => w.intensity(x, y),
        }
    }
}

impl std::fmt::Display for WaveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CosineHat(w) => write!(f, "cosine-hat(a={}, f={})", w.amplitude, w.frequency),
            Self::Gaussian(w) => write!(f, "gaussian(a={}, s={})", w.amplitude, w.sweep),
        }
    }
}
