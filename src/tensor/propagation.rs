//! Symmetric-normalized message passing operator.
//!
//! Â = D^(-1/2) (A + I) D^(-1/2), stored sparsely. Every node gets exactly
//! one self-loop; explicit self-loop edges are folded into it. A message
//! `s -> t` is weighted by `1 / sqrt(d_s * d_t)` with `d_v` the in-degree of
//! `v` plus one. Duplicate edges contribute once each.

use ndarray::{Array2, ArrayView2};

#[derive(Debug, Clone)]
pub struct Propagation {
    num_nodes: usize,
    /// (source, target, weight) for every non-self-loop edge
    messages: Vec<(usize, usize, f64)>,
    /// Weight of each node's self-loop: 1 / d_v
    self_weights: Vec<f64>,
}

impl Propagation {
    pub fn new(num_nodes: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let edges: Vec<(usize, usize)> = edges
            .into_iter()
            .filter(|(s, t)| s != t && *s < num_nodes && *t < num_nodes)
            .collect();

        let mut degree = vec![1.0; num_nodes];
        for &(_, t) in &edges {
            degree[t] += 1.0;
        }

        let inv_sqrt: Vec<f64> = degree.iter().map(|d: &f64| d.powf(-0.5)).collect();
        let messages = edges
            .into_iter()
            .map(|(s, t)| (s, t, inv_sqrt[s] * inv_sqrt[t]))
            .collect();
        let self_weights = degree.iter().map(|d| 1.0 / d).collect();

        Self {
            num_nodes,
            messages,
            self_weights,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of non-self-loop messages.
    pub fn num_messages(&self) -> usize {
        self.messages.len()
    }

    /// `Â · h`: each row receives its own weighted row plus its in-neighbors'.
    pub fn forward(&self, h: &ArrayView2<f64>) -> Array2<f64> {
        let mut out = h.to_owned();
        for (mut row, &w) in out.rows_mut().into_iter().zip(&self.self_weights) {
            row *= w;
        }

        for &(s, t, w) in &self.messages {
            let source = h.row(s);
            let mut target = out.row_mut(t);
            target.scaled_add(w, &source);
        }
        out
    }

    /// `Âᵀ · g`: routes gradients from targets back to sources.
    pub fn backward(&self, grad: &ArrayView2<f64>) -> Array2<f64> {
        let mut out = grad.to_owned();
        for (mut row, &w) in out.rows_mut().into_iter().zip(&self.self_weights) {
            row *= w;
        }

        for &(s, t, w) in &self.messages {
            let target = grad.row(t);
            let mut source = out.row_mut(s);
            source.scaled_add(w, &target);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_isolated_nodes_pass_through() {
        let prop = Propagation::new(3, Vec::new());
        let h = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert_eq!(prop.forward(&h.view()), h);
    }

    #[test]
    fn test_single_edge_weights() {
        // 0 -> 1: d_0 = 1, d_1 = 2
        let prop = Propagation::new(2, vec![(0, 1)]);
        let h = array![[1.0], [1.0]];
        let out = prop.forward(&h.view());

        assert_relative_eq!(out[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out[[1, 0]], 0.5 + 1.0 / 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_self_loops_folded() {
        let with_loop = Propagation::new(2, vec![(0, 1), (1, 1)]);
        let without = Propagation::new(2, vec![(0, 1)]);
        let h = array![[0.3, -1.0], [2.0, 0.5]];

        assert_eq!(with_loop.num_messages(), 1);
        assert_eq!(with_loop.forward(&h.view()), without.forward(&h.view()));
    }

    #[test]
    fn test_duplicates_counted() {
        let prop = Propagation::new(2, vec![(0, 1), (0, 1)]);
        // d_1 = 3, each message 1/sqrt(3)
        let h = array![[1.0], [0.0]];
        let out = prop.forward(&h.view());
        assert_relative_eq!(out[[1, 0]], 2.0 / 3f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_backward_is_transpose() {
        let prop = Propagation::new(3, vec![(0, 1), (2, 1), (1, 0)]);
        let h = array![[1.0, 0.0], [0.5, -2.0], [3.0, 1.0]];
        let g = array![[0.2, 1.0], [-1.0, 0.4], [0.7, 0.3]];

        // <Â h, g> == <h, Âᵀ g>
        let lhs = (&prop.forward(&h.view()) * &g).sum();
        let rhs = (&h * &prop.backward(&g.view())).sum();
        assert_relative_eq!(lhs, rhs, epsilon = 1e-12);
    }
}
