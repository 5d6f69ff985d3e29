//! Grid nodes dispatched to an executor and gated by per-node semaphores.

use std::any::Any;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{advance_window, Simulation};
use crate::error::{FoldError, Result};
use crate::executor::{CountingSemaphore, Executor};
use crate::grid::{Grid, GridGraph};
use crate::layer::Layer;
use crate::layout::Layout;
use crate::stencil::Stencil;
use crate::tiling::ConeFold;
use crate::window::{LayerRing, LayerWindow};

/// How grid nodes are packaged into executor tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dispatch {
    /// One task per node, in visiting order.
    #[default]
    PerNode,
    /// One task per chain of nodes linked by `proceed`.
    Chained,
}

impl Dispatch {
    /// Parse a dispatch name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "per-node" | "pernode" | "node" => Ok(Self::PerNode),
            "chained" | "chain" => Ok(Self::Chained),
            _ => Err(FoldError::Config(format!(
                "Unknown dispatch '{}'. Valid options: per-node, chained",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerNode => write!(f, "per-node"),
            Self::Chained => write!(f, "chained"),
        }
    }
}

/// State shared with every task.
struct Shared<S, L> {
    stencil: S,
    grid: Grid<L>,
    graph: GridGraph,
    gates: Box<[CountingSemaphore]>,
    done: CountingSemaphore,
    failed: AtomicBool,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
}

impl<S: Stencil, L: Layout> Shared<S, L> {
    /// Wait for the node's dependencies, run it, then release its dependents.
    ///
    /// A panicking node still releases its dependents and the batch latch.
    /// The first panic is kept for `run_batch` to re-raise, and the rest of
    /// the batch only passes permits along without computing.
    ///
    /// # Safety
    ///
    /// The node must be scheduled once per batch, and every node of the
    /// batch must be handed to the same `ring` and `base`.
    unsafe fn run_node(&self, id: usize, ring: &LayerRing<S::Cell, L>, base: usize) {
        self.gates[id].acquire_many(self.graph.in_degree(id));
        if !self.failed.load(Ordering::Acquire) {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                // SAFETY: all dependencies released their permit after
                // finishing, and the semaphore's lock publishes their writes.
                unsafe { self.grid.execute(id, &self.stencil, ring, base) }
            }));
            if let Err(payload) = outcome {
                tracing::error!(node = id, "Grid node panicked");
                let mut slot = self.panic.lock();
                if slot.is_none() {
                    *slot = Some(payload);
                }
                self.failed.store(true, Ordering::Release);
            }
        }
        for &next in self.graph.dependents(id) {
            self.gates[next].release(1);
        }
        self.done.release(1);
    }

    /// Re-raise a node panic once the whole batch has drained.
    fn rethrow(&self) {
        let payload = self.panic.lock().take();
        if let Some(payload) = payload {
            self.failed.store(false, Ordering::Release);
            resume_unwind(payload);
        }
    }
}

/// Runs the ConeFold grid through any [`Executor`].
///
/// Each node takes one permit per dependency from its own semaphore before
/// running and gives one permit to each dependent afterwards, so results
/// are bit-identical to the sequential recursion whatever the worker count.
///
/// Tasks block inside the executor while they wait for permits, so the
/// executor must start tasks in the order they were enqueued (as
/// [`SequentialExecutor`](crate::executor::SequentialExecutor) and
/// [`ThreadPool`](crate::executor::ThreadPool) do). A panic inside a node
/// is re-raised by [`advance`](Simulation::advance) after the batch
/// drains; the layers hold unspecified values afterwards.
pub struct ParallelSolver<S: Stencil, L, E> {
    shared: Arc<Shared<S, L>>,
    window: LayerWindow<S::Cell, L>,
    executor: E,
    dispatch: Dispatch,
    chain_heads: Vec<usize>,
    steps_done: u64,
}

impl<S, L, E> ParallelSolver<S, L, E>
where
    S: Stencil + 'static,
    L: Layout,
    E: Executor,
{
    /// Build the grid at `cell_rank` and let `init` fill the initial layer.
    pub fn with_initial(
        layout: L,
        tiling: ConeFold,
        cell_rank: u32,
        stencil: S,
        executor: E,
        dispatch: Dispatch,
        init: impl FnOnce(&mut Layer<S::Cell, L>),
    ) -> Result<Self> {
        let grid = Grid::new(layout, tiling, cell_rank)?;
        let graph = grid.build_graph();
        let chain_heads = match dispatch {
            Dispatch::PerNode => Vec::new(),
            Dispatch::Chained => grid.chain_heads(),
        };
        let gates = (0..grid.node_count())
            .map(|_| CountingSemaphore::new(0))
            .collect();
        let window = LayerWindow::with_initial(layout, S::DEPTH, grid.time_depth(), init);

        tracing::info!(
            nodes = grid.node_count(),
            edges = graph.edge_count(),
            chains = chain_heads.len(),
            workers = executor.concurrency(),
            %dispatch,
            "Parallel solver constructed"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                stencil,
                grid,
                graph,
                gates,
                done: CountingSemaphore::new(0),
                failed: AtomicBool::new(false),
                panic: Mutex::new(None),
            }),
            window,
            executor,
            dispatch,
            chain_heads,
            steps_done: 0,
        })
    }

    /// The node grid.
    pub fn grid(&self) -> &Grid<L> {
        &self.shared.grid
    }

    /// The dependency graph.
    pub fn graph(&self) -> &GridGraph {
        &self.shared.graph
    }

    /// The executor tasks are sent to.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The layer window.
    pub fn window(&self) -> &LayerWindow<S::Cell, L> {
        &self.window
    }

    /// The latest computed instant.
    pub fn layer(&self) -> &Layer<S::Cell, L> {
        self.window.current()
    }

    fn run_batch(
        shared: &Arc<Shared<S, L>>,
        executor: &E,
        dispatch: Dispatch,
        chain_heads: &[usize],
        window: &LayerWindow<S::Cell, L>,
    ) {
        let ring = window.shared_ring();
        let base = window.base();

        match dispatch {
            Dispatch::PerNode => {
                for &id in shared.graph.order() {
                    let shared = Arc::clone(shared);
                    let ring = Arc::clone(&ring);
                    executor.enqueue(Box::new(move || {
                        // SAFETY: every node is enqueued once for this base.
                        unsafe { shared.run_node(id, &ring, base) }
                    }));
                }
            }
            Dispatch::Chained => {
                for &head in chain_heads {
                    let shared = Arc::clone(shared);
                    let ring = Arc::clone(&ring);
                    executor.enqueue(Box::new(move || {
                        let mut cur = Some(head);
                        while let Some(id) = cur {
                            // SAFETY: chains partition the nodes.
                            unsafe { shared.run_node(id, &ring, base) };
                            cur = shared.grid.proceed(id);
                        }
                    }));
                }
            }
        }

        shared.done.acquire_many(shared.grid.node_count());
        shared.rethrow();
    }
}

impl<S, L, E> Simulation<S::Cell, L> for ParallelSolver<S, L, E>
where
    S: Stencil + 'static,
    L: Layout,
    E: Executor,
{
    fn advance(&mut self, steps: usize) {
        let Self {
            shared,
            window,
            executor,
            dispatch,
            chain_heads,
            ..
        } = self;
        let batches = advance_window(window, steps, |w| {
            Self::run_batch(shared, executor, *dispatch, chain_heads, w)
        });
        self.steps_done += steps as u64;
        tracing::debug!(steps, batches, total = self.steps_done, "Advanced");
    }

    fn current(&self) -> &Layer<S::Cell, L> {
        self.window.current()
    }

    fn steps_done(&self) -> u64 {
        self.steps_done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{SequentialExecutor, ThreadPool};
    use crate::layout::ZOrderLayout;
    use crate::solver::Solver;
    use crate::stencil::{Side, Target, WaveCell, WaveStencil};
    use crate::window::Frame;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    fn bump(layer: &mut Layer<WaveCell, ZOrderLayout>) {
        layer.fill_with(|x, y| {
            let r2 = (x as f64 - 7.5).powi(2) + (y as f64 - 4.0).powi(2);
            WaveCell::new(1.0, (-r2 / 6.0).exp())
        });
    }

    fn reference(layout: ZOrderLayout, steps: usize) -> Vec<WaveCell> {
        let mut s = Solver::with_initial(layout, ConeFold::new(2), WaveStencil::new(1.0, 0.5), bump).unwrap();
        s.advance(steps);
        s.layer().to_row_major()
    }

    #[test]
    fn test_sequential_executor_matches_tiling() {
        let layout = ZOrderLayout::square(4).unwrap();
        for dispatch in [Dispatch::PerNode, Dispatch::Chained] {
            for cell_rank in 0..4 {
                let mut solver = ParallelSolver::with_initial(
                    layout,
                    ConeFold::new(2),
                    cell_rank,
                    WaveStencil::new(1.0, 0.5),
                    SequentialExecutor,
                    dispatch,
                    bump,
                )
                .unwrap();
                solver.advance(10);
                assert_eq!(solver.layer().to_row_major(), reference(layout, 10));
            }
        }
    }

    #[test]
    fn test_pool_matches_tiling() {
        let layout = ZOrderLayout::square(4).unwrap();
        let pool = Arc::new(ThreadPool::new(4).unwrap());
        for dispatch in [Dispatch::PerNode, Dispatch::Chained] {
            let mut solver = ParallelSolver::with_initial(
                layout,
                ConeFold::new(2),
                1,
                WaveStencil::new(1.0, 0.5),
                Arc::clone(&pool),
                dispatch,
                bump,
            )
            .unwrap();
            solver.advance(12);
            assert_eq!(solver.layer().to_row_major(), reference(layout, 12));
        }
    }

    #[test]
    fn test_gates_rearm_after_batch() {
        let layout = ZOrderLayout::square(3).unwrap();
        let mut solver = ParallelSolver::with_initial(
            layout,
            ConeFold::new(1),
            0,
            WaveStencil::new(1.0, 0.5),
            SequentialExecutor,
            Dispatch::PerNode,
            |_| {},
        )
        .unwrap();
        solver.advance(4);
        assert!(solver.shared.gates.iter().all(|g| g.available() == 0));
        assert_eq!(solver.shared.done.available(), 0);
    }

    #[test]
    fn test_dispatch_parse() {
        assert_eq!(Dispatch::parse("chained").unwrap(), Dispatch::Chained);
        assert_eq!(Dispatch::parse("per-node").unwrap(), Dispatch::PerNode);
        assert!(Dispatch::parse("random").is_err());
    }

    /// Copies the previous instant, but panics on one cell.
    struct Faulty {
        bad: AtomicUsize,
    }

    impl Faulty {
        fn at(bad: usize) -> Self {
            Self {
                bad: AtomicUsize::new(bad),
            }
        }
    }

    // SAFETY: reads only the centre at depth 1.
    unsafe impl Stencil for Faulty {
        type Cell = f64;
        const DEPTH: usize = 1;
        const TARGETS: &'static [Target] = &[Target::new(1, 0, 0)];

        fn apply<L: Layout>(&self, idx: usize, frame: &Frame<'_, f64, L>, _: Side, _: Side) -> f64 {
            assert_ne!(idx, self.bad.load(Ordering::Relaxed), "cell {} is faulty", idx);
            frame.read(1, idx)
        }
    }

    fn faulty_solver<E: Executor>(
        executor: E,
        dispatch: Dispatch,
        bad: usize,
    ) -> ParallelSolver<Faulty, ZOrderLayout, E> {
        ParallelSolver::with_initial(
            ZOrderLayout::square(3).unwrap(),
            ConeFold::new(1),
            0,
            Faulty::at(bad),
            executor,
            dispatch,
            |layer| layer.fill_with(|x, y| (x * 8 + y) as f64),
        )
        .unwrap()
    }

    /// True if `advance` panicked; fails the test if it never returns.
    fn advance_faulty<E: Executor + 'static>(executor: E, dispatch: Dispatch) -> bool {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut solver = faulty_solver(executor, dispatch, 5);
            let outcome = catch_unwind(AssertUnwindSafe(|| solver.advance(2)));
            let _ = tx.send(outcome.is_err());
        });
        rx.recv_timeout(Duration::from_secs(30))
            .expect("advance did not return after a node panicked")
    }

    #[test]
    fn test_node_panic_surfaces_on_pool() {
        let pool = Arc::new(ThreadPool::new(2).unwrap());
        for dispatch in [Dispatch::PerNode, Dispatch::Chained] {
            assert!(advance_faulty(Arc::clone(&pool), dispatch), "{}", dispatch);
        }
        // caught inside the node, so no worker saw it
        assert_eq!(pool.stats().panicked, 0);
    }

    #[test]
    fn test_node_panic_surfaces_sequentially() {
        assert!(advance_faulty(SequentialExecutor, Dispatch::PerNode));
        assert!(advance_faulty(SequentialExecutor, Dispatch::Chained));
    }

    #[test]
    fn test_solver_recovers_after_node_panic() {
        let pool = Arc::new(ThreadPool::new(3).unwrap());
        let mut solver = faulty_solver(Arc::clone(&pool), Dispatch::PerNode, 5);
        assert!(catch_unwind(AssertUnwindSafe(|| solver.advance(2))).is_err());
        assert!(solver.shared.gates.iter().all(|g| g.available() == 0));
        assert_eq!(solver.shared.done.available(), 0);

        solver.shared.stencil.bad.store(usize::MAX, Ordering::Relaxed);
        solver.advance(2);
        assert!(!solver.shared.failed.load(Ordering::Acquire));

        let mut clean = faulty_solver(Arc::clone(&pool), Dispatch::Chained, usize::MAX);
        clean.advance(3);
        assert_eq!(clean.layer().at(2, 5), 21.0);
    }
}
