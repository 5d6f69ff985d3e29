//! Row-by-row sweep, one instant per batch.

use super::Tiling;
use crate::error::Result;
use crate::layout::{step, Layout};
use crate::stencil::{Side, Stencil};
use crate::window::LayerWindow;

/// The reference traversal: every cell of the next instant in row order.
///
/// Works on rectangular domains and serves as ground truth for the
/// recursive tilings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegularTiling;

impl Tiling for RegularTiling {
    const NAME: &'static str = "Regular";

    fn time_depth(&self) -> usize {
        1
    }

    fn check_domain<L: Layout>(&self, _layout: &L) -> Result<()> {
        Ok(())
    }

    fn traverse<S: Stencil, L: Layout>(&self, stencil: &S, window: &mut LayerWindow<S::Cell, L>) {
        let ring = window.ring();
        let frame = ring.frame(window.base(), 0);
        let layout = *frame.layout();
        let (len_x, len_y) = (layout.len_x(), layout.len_y());

        let mut row = 0usize;
        for y in 0..len_y {
            let y_side = Side::of(y, len_y);
            let mut idx = row;
            for x in 0..len_x {
                let value = stencil.apply(idx, &frame, Side::of(x, len_x), y_side);
                // SAFETY: the window is borrowed exclusively and the output
                // layer is never read during this pass.
                unsafe { frame.write(idx, value) };
                idx = step(idx, layout.off_right(idx, 0, 1));
            }
            row = step(row, layout.off_bottom(row, 0, 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LinearLayout, ZOrderLayout};
    use crate::stencil::{WaveCell, WaveStencil};

    fn pulse_step<L: Layout>(layout: L) -> Vec<f64> {
        let centre = (layout.len_x() / 2, layout.len_y() / 2);
        let mut window = LayerWindow::with_initial(layout, 2, 1, |layer| {
            layer.fill_with(|x, y| WaveCell::new(1.0, if (x, y) == centre { 1.0 } else { 0.0 }))
        });
        let stencil = WaveStencil::new(1.0, 0.5);
        RegularTiling.traverse(&stencil, &mut window);
        window.rotate(1);
        window.current().to_row_major().iter().map(|c| c.intensity).collect()
    }

    #[test]
    fn test_single_step_pulse() {
        let out = pulse_step(LinearLayout::square(3).unwrap());
        let at = |x: usize, y: usize| out[y * 8 + x];
        assert_eq!(at(4, 4), 1.0);
        assert_eq!(at(3, 4), 0.25);
        assert_eq!(at(5, 4), 0.25);
        assert_eq!(at(4, 3), 0.25);
        assert_eq!(at(4, 5), 0.25);
        assert_eq!(at(3, 3), 0.0);
    }

    #[test]
    fn test_rectangular_domains_agree_across_layouts() {
        let linear = pulse_step(LinearLayout::new(4, 2).unwrap());
        let zorder = pulse_step(ZOrderLayout::new(4, 2).unwrap());
        assert_eq!(linear, zorder);
        assert_eq!(linear.len(), 64);
    }
}
