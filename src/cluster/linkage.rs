//! Complete-linkage agglomerative clustering.
//!
//! Merges are found with the nearest-neighbour chain algorithm, then sorted
//! by distance (stable) and relabelled so that merge `i` creates cluster
//! `n + i` and the smaller child id comes first. This is the layout of a
//! SciPy linkage matrix, and [`Linkage::leaf_order`] matches its dendrogram
//! leaf order.

use crate::error::{MetaboError, Result};
use crate::ordination::DistanceMatrix;
use serde::{Deserialize, Serialize};

/// One agglomeration step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    /// Smaller cluster id.
    pub left: usize,
    /// Larger cluster id.
    pub right: usize,
    pub distance: f64,
    /// Number of leaves in the new cluster.
    pub size: usize,
}

/// Full merge history over `n_leaves` observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linkage {
    pub n_leaves: usize,
    pub merges: Vec<Merge>,
}

impl Linkage {
    /// Leaves in dendrogram order (left subtree before right).
    pub fn leaf_order(&self) -> Vec<usize> {
        if self.n_leaves == 0 {
            return Vec::new();
        }
        if self.merges.is_empty() {
            return (0..self.n_leaves).collect();
        }
        let mut order = Vec::with_capacity(self.n_leaves);
        let mut stack = vec![self.n_leaves + self.merges.len() - 1];
        while let Some(node) = stack.pop() {
            if node < self.n_leaves {
                order.push(node);
            } else {
                let merge = &self.merges[node - self.n_leaves];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        order
    }
}

struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next_label: usize,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..2 * n - 1).collect(),
            size: vec![1; 2 * n - 1],
            next_label: n,
        }
    }

    fn merge(&mut self, x: usize, y: usize) -> usize {
        let label = self.next_label;
        self.parent[x] = label;
        self.parent[y] = label;
        let size = self.size[x] + self.size[y];
        self.size[label] = size;
        self.next_label += 1;
        size
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }
}

/// Cluster the observations of a distance matrix with complete linkage.
///
/// The distance between two clusters is the largest distance between their
/// members.
///
/// # Errors
/// `EmptyData` for an empty matrix.
pub fn complete_linkage(distances: &DistanceMatrix) -> Result<Linkage> {
    let n = distances.n();
    if n == 0 {
        return Err(MetaboError::EmptyData(
            "Cannot cluster an empty distance matrix".to_string(),
        ));
    }
    if n == 1 {
        return Ok(Linkage {
            n_leaves: 1,
            merges: Vec::new(),
        });
    }

    let mut d = distances.matrix().clone();
    let mut size = vec![1usize; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut raw: Vec<(usize, usize, f64)> = Vec::with_capacity(n - 1);

    for _ in 0..n - 1 {
        if chain.is_empty() {
            if let Some(first) = (0..n).find(|&i| size[i] > 0) {
                chain.push(first);
            }
        }

        let (x, y, dist) = loop {
            let x = chain[chain.len() - 1];
            let (mut y, mut current_min) = if chain.len() > 1 {
                let prev = chain[chain.len() - 2];
                (prev, d[(x, prev)])
            } else {
                (x, f64::INFINITY)
            };
            for i in 0..n {
                if size[i] == 0 || i == x {
                    continue;
                }
                if d[(x, i)] < current_min {
                    current_min = d[(x, i)];
                    y = i;
                }
            }
            if chain.len() > 1 && y == chain[chain.len() - 2] {
                break (x, y, current_min);
            }
            chain.push(y);
        };
        chain.truncate(chain.len() - 2);

        let (x, y) = if x > y { (y, x) } else { (x, y) };
        raw.push((x, y, dist));
        size[y] += size[x];
        size[x] = 0;
        for i in 0..n {
            if size[i] == 0 || i == y {
                continue;
            }
            let merged = d[(i, x)].max(d[(i, y)]);
            d[(i, y)] = merged;
            d[(y, i)] = merged;
        }
    }

    raw.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut uf = UnionFind::new(n);
    let merges = raw
        .into_iter()
        .map(|(x, y, distance)| {
            let (rx, ry) = (uf.find(x), uf.find(y));
            let (left, right) = if rx < ry { (rx, ry) } else { (ry, rx) };
            let size = uf.merge(left, right);
            Merge {
                left,
                right,
                distance,
                size,
            }
        })
        .collect();

    Ok(Linkage { n_leaves: n, merges })
}
