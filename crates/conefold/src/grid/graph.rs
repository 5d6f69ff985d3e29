//! Dependency graph over grid nodes.

/// Node dependencies plus a valid visiting order.
///
/// Nodes are identified by their index in the grid's node arena. An edge
/// `u -> v` in [`GridGraph::dependencies`] means `v` must finish before `u`
/// starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridGraph {
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
    levels: Vec<Vec<usize>>,
}

impl GridGraph {
    pub(crate) fn new(dependencies: Vec<Vec<usize>>, levels: Vec<Vec<usize>>) -> Self {
        let mut dependents = vec![Vec::new(); dependencies.len()];
        for (node, deps) in dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }
        let order = levels.iter().flatten().copied().collect();

        Self {
            dependencies,
            dependents,
            order,
            levels,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn count(&self) -> usize {
        self.dependencies.len()
    }

    /// Nodes that must finish before `node` starts.
    #[inline]
    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    /// Nodes waiting on `node`.
    #[inline]
    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    /// Number of dependencies of `node`.
    #[inline]
    pub fn in_degree(&self, node: usize) -> usize {
        self.dependencies[node].len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(Vec::len).sum()
    }

    /// Anti-diagonal visiting order, slab by slab, far corner first.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// The visiting order split into groups of mutually independent nodes.
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    /// Nodes without dependencies.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.count())
            .filter(|&n| self.dependencies[n].is_empty())
            .collect()
    }

    /// Nodes nothing depends on.
    pub fn sinks(&self) -> Vec<usize> {
        (0..self.count())
            .filter(|&n| self.dependents[n].is_empty())
            .collect()
    }

    /// Check that `order` visits every node once, after all its dependencies.
    pub fn is_valid_order(&self, order: &[usize]) -> bool {
        if order.len() != self.count() {
            return false;
        }
        let mut done = vec![false; self.count()];
        for &node in order {
            if node >= self.count() || done[node] {
                return false;
            }
            if self.dependencies[node].iter().any(|&dep| !done[dep]) {
                return false;
            }
            done[node] = true;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> GridGraph {
        // 3 <- {1, 2} <- 0
        GridGraph::new(
            vec![vec![], vec![0], vec![0], vec![1, 2]],
            vec![vec![0], vec![2, 1], vec![3]],
        )
    }

    #[test]
    fn test_dependents_are_inverted_edges() {
        let g = diamond();
        assert_eq!(g.dependents(0), &[1, 2]);
        assert_eq!(g.dependents(3), &[] as &[usize]);
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.in_degree(3), 2);
        assert_eq!(g.roots(), vec![0]);
        assert_eq!(g.sinks(), vec![3]);
    }

    #[test]
    fn test_order_validation() {
        let g = diamond();
        assert_eq!(g.order(), &[0, 2, 1, 3]);
        assert!(g.is_valid_order(g.order()));
        assert!(!g.is_valid_order(&[1, 0, 2, 3]));
        assert!(!g.is_valid_order(&[0, 1, 1, 3]));
        assert!(!g.is_valid_order(&[0, 1, 2]));
    }
}
