//! Dense cell storage for one time instant.

use std::cell::UnsafeCell;
use std::fmt::Display;
use std::io::Write;

use crate::layout::{step, Layout};

/// Interior-mutable cell shared between workers.
///
/// Concurrent access is governed by the schedule: within one batch every
/// cell is written by exactly one fold, and nobody reads it before that
/// fold has completed.
#[repr(transparent)]
struct SharedCell<T>(UnsafeCell<T>);

// SAFETY: writes go through `Layer::write`, whose contract forbids any
// concurrent access to the written cell.
unsafe impl<T: Send> Sync for SharedCell<T> {}

/// The full grid state at one discrete time instant.
///
/// Cells are stored in the order defined by the layout's storage slots and
/// addressed with layout indices.
pub struct Layer<T, L> {
    cells: Box<[SharedCell<T>]>,
    layout: L,
}

impl<T: Copy + Default, L: Layout> Layer<T, L> {
    /// Allocate a layer filled with `T::default()`.
    pub fn new(layout: L) -> Self {
        let cells = (0..layout.cell_count())
            .map(|_| SharedCell(UnsafeCell::new(T::default())))
            .collect();
        Self { cells, layout }
    }
}

impl<T: Copy, L: Layout> Layer<T, L> {
    /// The layer's addressing scheme.
    #[inline]
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Read the cell at addressing index `idx`.
    #[inline(always)]
    pub fn get(&self, idx: usize) -> T {
        let cell = &self.cells[self.layout.slot(idx)];
        // SAFETY: no write to this cell can be in flight; see `write`.
        unsafe { *cell.0.get() }
    }

    /// Overwrite the cell at addressing index `idx`.
    #[inline]
    pub fn set(&mut self, idx: usize, value: T) {
        let slot = self.layout.slot(idx);
        *self.cells[slot].0.get_mut() = value;
    }

    /// Write through a shared reference.
    ///
    /// # Safety
    ///
    /// No other thread may read or write the cell at `idx` until the
    /// caller's write has been published by a synchronizing operation.
    #[inline(always)]
    pub(crate) unsafe fn write(&self, idx: usize, value: T) {
        let cell = &self.cells[self.layout.slot(idx)];
        // SAFETY: exclusive access to this cell is guaranteed by the caller.
        unsafe { *cell.0.get() = value }
    }

    /// Read cell `(x, y)`.
    pub fn at(&self, x: usize, y: usize) -> T {
        self.get(self.layout.index_of(x, y))
    }

    /// Fill every cell from integer coordinates.
    pub fn fill_with(&mut self, mut func: impl FnMut(usize, usize) -> T) {
        let layout = self.layout;
        walk_rows(&layout, |x, y, idx| self.set(idx, func(x, y)));
    }

    /// Fill every cell from physical coordinates centred on the domain.
    ///
    /// The domain spans `length` along y; cell `(x_idx, y_idx)` maps to
    /// `((x_idx - Sx/2) * h, (y_idx - Sy/2) * h)` with `h = length / Sy`.
    pub fn init(&mut self, length: f64, mut func: impl FnMut(f64, f64) -> T) {
        let scale = length / self.layout.len_y() as f64;
        let half_x = (self.layout.len_x() / 2) as f64;
        let half_y = (self.layout.len_y() / 2) as f64;

        self.fill_with(|x_idx, y_idx| {
            let x = (x_idx as f64 - half_x) * scale;
            let y = (y_idx as f64 - half_y) * scale;
            func(x, y)
        });
    }

    /// Copy the cells out in row-major order.
    pub fn to_row_major(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.layout.cell_count());
        walk_rows(&self.layout, |_, _, idx| out.push(self.get(idx)));
        out
    }
}

impl<T: Copy + Display, L: Layout> Layer<T, L> {
    /// Write the layer as row-major text, one line per row.
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut row = 0usize;
        for _ in 0..self.layout.len_y() {
            let mut idx = row;
            for _ in 0..self.layout.len_x() {
                write!(out, "{} ", self.get(idx))?;
                idx = step(idx, self.layout.off_right(idx, 0, 1));
            }
            writeln!(out)?;
            row = step(row, self.layout.off_bottom(row, 0, 1));
        }
        Ok(())
    }
}

impl<T, L: Layout> std::fmt::Debug for Layer<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("layout", &self.layout)
            .field("cells", &self.cells.len())
            .finish()
    }
}

/// Visit every cell row by row using unit offsets only.
fn walk_rows<L: Layout>(layout: &L, mut visit: impl FnMut(usize, usize, usize)) {
    let mut row = 0usize;
    for y in 0..layout.len_y() {
        let mut idx = row;
        for x in 0..layout.len_x() {
            visit(x, y, idx);
            idx = step(idx, layout.off_right(idx, 0, 1));
        }
        row = step(row, layout.off_bottom(row, 0, 1));
    }
}
