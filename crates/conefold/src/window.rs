//! Circular window of time layers.
//!
//! A solver keeps `history + span` layers: `history` completed instants the
//! stencil reads from, followed by `span` slots that one tiling batch fills.
//! Layers are addressed by *logical* position relative to a moving base;
//! rotating the window relabels buffers without copying cell data.
//!
//! ```text
//! logical:  0 .. history-1 | history .. history+span-1
//!           completed      | written by the next batch
//!                      ^ current
//! ```

use std::sync::Arc;

use crate::layer::Layer;
use crate::layout::Layout;

/// Fixed ring of layer buffers.
pub struct LayerRing<T, L> {
    layers: Box<[Layer<T, L>]>,
    history: usize,
}

impl<T: Copy + Default, L: Layout> LayerRing<T, L> {
    /// Allocate `history + span` default-filled layers.
    pub fn new(layout: L, history: usize, span: usize) -> Self {
        assert!(history > 0 && span > 0, "window needs history and span");
        let layers = (0..history + span).map(|_| Layer::new(layout)).collect();
        Self { layers, history }
    }
}

impl<T: Copy, L: Layout> LayerRing<T, L> {
    /// Total number of buffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false; a ring owns at least two buffers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of completed instants kept for the stencil.
    #[inline]
    pub fn history(&self) -> usize {
        self.history
    }

    /// Number of instants one batch produces.
    #[inline]
    pub fn span(&self) -> usize {
        self.layers.len() - self.history
    }

    /// Layer at logical position `logical` for a window based at `base`.
    #[inline(always)]
    pub fn layer(&self, base: usize, logical: usize) -> &Layer<T, L> {
        &self.layers[(base + logical) % self.layers.len()]
    }

    /// Frame whose output layer is batch step `slot`.
    #[inline(always)]
    pub(crate) fn frame(&self, base: usize, slot: usize) -> Frame<'_, T, L> {
        debug_assert!(slot < self.span(), "slot {} is out of the batch", slot);
        Frame {
            ring: self,
            base,
            out: self.history + slot,
        }
    }
}

/// The time-layer view handed to a stencil for one output instant.
///
/// Depth `1` is the latest completed instant, depth `2` the one before it,
/// up to the stencil's declared depth.
pub struct Frame<'a, T, L> {
    ring: &'a LayerRing<T, L>,
    base: usize,
    out: usize,
}

impl<'a, T: Copy, L: Layout> Frame<'a, T, L> {
    /// The addressing scheme of every layer in the window.
    #[inline(always)]
    pub fn layout(&self) -> &L {
        self.ring.layers[0].layout()
    }

    /// Cell `idx`, `depth` instants before the output instant.
    #[inline(always)]
    pub fn read(&self, depth: usize, idx: usize) -> T {
        debug_assert!(
            depth >= 1 && depth <= self.ring.history,
            "depth {} is outside the window",
            depth
        );
        self.ring.layer(self.base, self.out - depth).get(idx)
    }

    /// Store the new value of cell `idx` in the output layer.
    ///
    /// # Safety
    ///
    /// The caller must be the only party touching cell `idx` of the output
    /// layer until its completion is published.
    #[inline(always)]
    pub(crate) unsafe fn write(&self, idx: usize, value: T) {
        // SAFETY: forwarded from the caller.
        unsafe { self.ring.layer(self.base, self.out).write(idx, value) }
    }
}

/// A layer ring plus the base that positions the logical window on it.
pub struct LayerWindow<T, L> {
    ring: Arc<LayerRing<T, L>>,
    base: usize,
}

impl<T: Copy + Default, L: Layout> LayerWindow<T, L> {
    /// Allocate a window and let `init` fill the current layer.
    pub fn with_initial(
        layout: L,
        history: usize,
        span: usize,
        init: impl FnOnce(&mut Layer<T, L>),
    ) -> Self {
        let mut ring = LayerRing::new(layout, history, span);
        init(&mut ring.layers[history - 1]);
        Self {
            ring: Arc::new(ring),
            base: 0,
        }
    }
}

impl<T: Copy, L: Layout> LayerWindow<T, L> {
    /// The underlying buffers.
    #[inline]
    pub fn ring(&self) -> &LayerRing<T, L> {
        &self.ring
    }

    /// Current base offset into the ring.
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Number of instants one batch produces.
    #[inline]
    pub fn span(&self) -> usize {
        self.ring.span()
    }

    /// The most recent completed instant.
    #[inline]
    pub fn current(&self) -> &Layer<T, L> {
        self.history(0)
    }

    /// A completed instant, `age` steps older than the current one.
    pub fn history(&self, age: usize) -> &Layer<T, L> {
        assert!(age < self.ring.history, "age {} is not retained", age);
        self.ring.layer(self.base, self.ring.history - 1 - age)
    }

    /// Advance the window so the last `shift` produced slots become history.
    pub fn rotate(&mut self, shift: usize) {
        self.base = (self.base + shift) % self.ring.len();
    }

    /// Undo `shift` steps of rotation.
    pub fn rotate_back(&mut self, shift: usize) {
        let len = self.ring.len();
        self.base = (self.base + len - shift % len) % len;
    }

    pub(crate) fn shared_ring(&self) -> Arc<LayerRing<T, L>> {
        Arc::clone(&self.ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LinearLayout;

    fn window() -> LayerWindow<u32, LinearLayout> {
        LayerWindow::with_initial(LinearLayout::square(1).unwrap(), 2, 4, |layer| {
            layer.fill_with(|_, _| 7)
        })
    }

    #[test]
    fn test_initial_layer_is_current() {
        let w = window();
        assert_eq!(w.current().at(1, 1), 7);
        assert_eq!(w.history(1).at(1, 1), 0);
        assert_eq!(w.ring().len(), 6);
        assert_eq!(w.span(), 4);
    }

    #[test]
    fn test_frame_depths_follow_slot() {
        let w = window();
        let ring = w.ring();
        for slot in 0..4 {
            let frame = ring.frame(w.base(), slot);
            // SAFETY: single-threaded test, nobody else touches the ring.
            unsafe { frame.write(0, slot as u32 + 10) };
        }
        let frame = ring.frame(w.base(), 3);
        assert_eq!(frame.read(1, 0), 12);
        assert_eq!(frame.read(2, 0), 11);
        let frame = ring.frame(w.base(), 0);
        assert_eq!(frame.read(1, 0), 7);
    }

    #[test]
    fn test_rotation_relabels_buffers() {
        let mut w = window();
        let ring = w.shared_ring();
        for slot in 0..4 {
            // SAFETY: single-threaded test.
            unsafe { ring.frame(w.base(), slot).write(0, slot as u32 + 10) };
        }
        w.rotate(4);
        assert_eq!(w.current().get(0), 13);
        assert_eq!(w.history(1).get(0), 12);

        w.rotate_back(2);
        assert_eq!(w.current().get(0), 11);
        assert_eq!(w.history(1).get(0), 10);
    }
}
