//! Parallel grid: one recursion level of ConeFold made explicit.
//!
//! The domain is cut into folds of `cell_rank` whose anchors sit on a
//! `(side × side)` lattice, `side = 2^(n - cell_rank) + 1`. When the cell
//! rank is below the tile rank, a batch is further cut into time-slabs of
//! `2^cell_rank` instants. Each `(i, j, slab)` triple is one [`GridNode`].
//!
//! A node waits for the nodes ahead of it in the same slab and for the
//! nodes at or behind it in the previous slab:
//!
//! ```text
//!   same slab:      (i+1, j)  (i, j+1)  (i+1, j+1)
//!   previous slab:  (i, j)    (i-1, j)  (i, j-1)  (i-1, j-1)
//! ```
//!
//! Running the nodes in any order compatible with these edges gives
//! bit-identical results to the sequential recursion.

mod graph;
mod node;

pub use graph::GridGraph;
pub use node::GridNode;

use crate::error::{FoldError, Result};
use crate::layout::{step, Layout};
use crate::stencil::Stencil;
use crate::tiling::{ConeFold, FoldContext, FoldType, Tiling};
use crate::window::LayerRing;

/// Node arena and geometry for one domain, tiling and cell rank.
#[derive(Debug, Clone)]
pub struct Grid<L> {
    layout: L,
    tiling: ConeFold,
    cell_rank: u32,
    side: usize,
    slabs: usize,
    slab_steps: usize,
    nodes: Vec<GridNode>,
}

impl<L: Layout> Grid<L> {
    /// Lay out the nodes of `tiling` at `cell_rank` over `layout`.
    pub fn new(layout: L, tiling: ConeFold, cell_rank: u32) -> Result<Self> {
        tiling.check_domain(&layout)?;
        let rank = layout.rank_x();
        if cell_rank >= rank {
            return Err(FoldError::CellRankTooLarge {
                cell: cell_rank,
                domain: rank,
            });
        }

        let tile_rank = tiling.tile_rank();
        let side = (1usize << (rank - cell_rank)) + 1;
        let slab_steps = 1usize << cell_rank.min(tile_rank);
        let slabs = 1usize << (tile_rank - cell_rank.min(tile_rank));
        let len = layout.len_x();

        let mut nodes = Vec::with_capacity(side * side * slabs);
        for slab in 0..slabs {
            for j in 0..side {
                let row = step(0, layout.off_bottom(0, cell_rank, j));
                for i in 0..side {
                    let idx = step(row, layout.off_right(row, cell_rank, i));
                    nodes.push(GridNode {
                        idx,
                        x_type: FoldType::at(i << cell_rank, cell_rank, len),
                        y_type: FoldType::at(j << cell_rank, cell_rank, len),
                        i,
                        j,
                        slab,
                        next: None,
                    });
                }
            }
        }

        let mut grid = Self {
            layout,
            tiling,
            cell_rank,
            side,
            slabs,
            slab_steps,
            nodes,
        };
        for id in 0..grid.nodes.len() {
            let n = grid.nodes[id];
            grid.nodes[id].next = grid.id_of(n.i + 1, n.j + 1, n.slab + 1);
        }

        tracing::debug!(
            rank,
            cell_rank,
            tile_rank,
            side,
            slabs,
            nodes = grid.nodes.len(),
            "Grid constructed"
        );
        Ok(grid)
    }

    /// The domain layout.
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// The tiling whose folds the nodes run.
    pub fn tiling(&self) -> ConeFold {
        self.tiling
    }

    /// Rank of the fold each node runs.
    pub fn cell_rank(&self) -> u32 {
        self.cell_rank
    }

    /// Anchors per axis.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Time-slabs per batch.
    pub fn slabs(&self) -> usize {
        self.slabs
    }

    /// Instants covered by one slab.
    pub fn slab_steps(&self) -> usize {
        self.slab_steps
    }

    /// Instants covered by one batch.
    pub fn time_depth(&self) -> usize {
        self.tiling.time_depth()
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes, indexed by id.
    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    /// The node with id `id`.
    pub fn access_node(&self, id: usize) -> &GridNode {
        &self.nodes[id]
    }

    /// The chained successor of node `id`.
    pub fn proceed(&self, id: usize) -> Option<usize> {
        self.nodes[id].proceed()
    }

    /// Node id of lattice position `(i, j)` in `slab`, if it exists.
    pub fn id_of(&self, i: usize, j: usize, slab: usize) -> Option<usize> {
        (i < self.side && j < self.side && slab < self.slabs)
            .then(|| (slab * self.side + j) * self.side + i)
    }

    /// Build the dependency graph and its anti-diagonal visiting order.
    pub fn build_graph(&self) -> GridGraph {
        let mut dependencies = Vec::with_capacity(self.nodes.len());
        for n in &self.nodes {
            let (i, j, m) = (n.i, n.j, n.slab);
            let mut deps = Vec::with_capacity(7);

            deps.extend(self.id_of(i + 1, j, m));
            deps.extend(self.id_of(i, j + 1, m));
            deps.extend(self.id_of(i + 1, j + 1, m));

            if m > 0 {
                let prev = m - 1;
                deps.extend(self.id_of(i, j, prev));
                if i > 0 {
                    deps.extend(self.id_of(i - 1, j, prev));
                }
                if j > 0 {
                    deps.extend(self.id_of(i, j - 1, prev));
                }
                if i > 0 && j > 0 {
                    deps.extend(self.id_of(i - 1, j - 1, prev));
                }
            }
            dependencies.push(deps);
        }

        let last = self.side - 1;
        let mut levels = Vec::with_capacity(self.slabs * (2 * last + 1));
        for m in 0..self.slabs {
            for d in (0..=2 * last).rev() {
                let level: Vec<usize> = (0..=last.min(d))
                    .rev()
                    .filter_map(|i| self.id_of(i, d - i, m))
                    .collect();
                levels.push(level);
            }
        }

        let graph = GridGraph::new(dependencies, levels);
        tracing::debug!(
            nodes = graph.count(),
            edges = graph.edge_count(),
            levels = graph.levels().len(),
            "Dependency graph built"
        );
        graph
    }

    /// Chain heads, in an order that is safe to enqueue on a FIFO pool.
    ///
    /// A chain starts at any node on the `i = 0` or `j = 0` border or in
    /// the first slab and follows `proceed` diagonally through space and
    /// time. Heads are sorted so that every chain only waits on chains
    /// enqueued before it.
    pub fn chain_heads(&self) -> Vec<usize> {
        let mut heads: Vec<usize> = (0..self.nodes.len())
            .filter(|&id| {
                let n = &self.nodes[id];
                n.i == 0 || n.j == 0 || n.slab == 0
            })
            .collect();

        heads.sort_by_key(|&id| {
            let n = &self.nodes[id];
            let (i, j, m) = (n.i as isize, n.j as isize, n.slab as isize);
            (-((i - m) + (j - m)), m, -i)
        });
        heads
    }

    /// Run the fold of node `id` for the batch based at `base`.
    ///
    /// # Safety
    ///
    /// Every dependency of the node must have finished, with its writes
    /// visible to this thread, and no node that depends on this one may
    /// have started.
    pub(crate) unsafe fn execute<S: Stencil>(
        &self,
        id: usize,
        stencil: &S,
        ring: &LayerRing<S::Cell, L>,
        base: usize,
    ) {
        let node = &self.nodes[id];
        let ctx = FoldContext::new(stencil, ring, base, self.tiling.tile_rank());
        // SAFETY: forwarded from the caller.
        unsafe {
            ctx.fold(
                self.cell_rank,
                node.x_type,
                node.y_type,
                node.idx,
                node.slab * self.slab_steps,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LinearLayout, ZOrderLayout};

    fn grid(rank: u32, tile: u32, cell: u32) -> Grid<LinearLayout> {
        Grid::new(LinearLayout::square(rank).unwrap(), ConeFold::new(tile), cell).unwrap()
    }

    #[test]
    fn test_node_count_and_slabs() {
        let g = grid(4, 3, 1);
        assert_eq!(g.side(), 9);
        assert_eq!(g.slabs(), 4);
        assert_eq!(g.slab_steps(), 2);
        assert_eq!(g.node_count(), 81 * 4);

        let g = grid(4, 1, 2);
        assert_eq!(g.side(), 5);
        assert_eq!(g.slabs(), 1);
        assert_eq!(g.slab_steps(), 2);
    }

    #[test]
    fn test_cell_rank_must_stay_below_domain() {
        let layout = ZOrderLayout::square(3).unwrap();
        assert!(matches!(
            Grid::new(layout, ConeFold::new(2), 3),
            Err(FoldError::CellRankTooLarge { cell: 3, domain: 3 })
        ));
    }

    #[test]
    fn test_node_types_follow_position() {
        let g = grid(3, 2, 1);
        let types: Vec<_> = (0..g.side())
            .map(|i| g.access_node(g.id_of(i, 0, 0).unwrap()).x_type)
            .collect();
        use FoldType::*;
        assert_eq!(types, vec![A, B, C, C, D]);
    }

    #[test]
    fn test_anchor_indices() {
        let g = grid(3, 2, 1);
        let layout = *g.layout();
        let n = g.access_node(g.id_of(2, 3, 0).unwrap());
        assert_eq!(n.idx, layout.index_of(4, 6));
    }

    #[test]
    fn test_chain_links_diagonally_forward() {
        let g = grid(3, 2, 0);
        let a = g.id_of(1, 2, 0).unwrap();
        let b = g.proceed(a).unwrap();
        let nb = g.access_node(b);
        assert_eq!((nb.i, nb.j, nb.slab), (2, 3, 1));
        let last = g.id_of(8, 8, 3).unwrap();
        assert_eq!(g.proceed(last), None);
    }

    #[test]
    fn test_chains_cover_every_node_once() {
        let g = grid(4, 2, 1);
        let mut seen = vec![false; g.node_count()];
        for head in g.chain_heads() {
            let mut cur = Some(head);
            while let Some(id) = cur {
                assert!(!seen[id]);
                seen[id] = true;
                cur = g.proceed(id);
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_levels_are_independent() {
        let g = grid(4, 3, 1);
        let graph = g.build_graph();
        for level in graph.levels() {
            for &a in level {
                for &b in level {
                    assert!(!graph.dependencies(a).contains(&b));
                }
            }
        }
        assert!(graph.is_valid_order(graph.order()));
    }
}
