use std::fmt;

use crate::canonical::colored::ColoredGraph;

/// A canonical labeling of a coloured graph together with its automorphism
/// orbits.
///
/// `order[pos]` is the vertex placed at canonical position `pos`;
/// `orbits[v]` is the smallest vertex in the automorphism orbit of `v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    pub order: Vec<usize>,
    pub orbits: Vec<usize>,
}

impl Labeling {
    /// Checks the shape of a labeling: `order` is a permutation of the
    /// vertices and `orbits` maps every vertex to a same-coloured
    /// representative that represents itself.
    pub fn validate(&self, graph: &ColoredGraph) -> Result<(), BackendError> {
        let n = graph.vertex_count();
        if self.order.len() != n || self.orbits.len() != n {
            return Err(BackendError::InvalidLabeling(format!(
                "expected {} vertices, got order of {} and orbits of {}",
                n,
                self.order.len(),
                self.orbits.len()
            )));
        }
        let mut seen = vec![false; n];
        for &v in &self.order {
            if v >= n || seen[v] {
                return Err(BackendError::InvalidLabeling(
                    "order is not a permutation".into(),
                ));
            }
            seen[v] = true;
        }
        for (v, &rep) in self.orbits.iter().enumerate() {
            if rep > v || self.orbits[rep] != rep || graph.color(rep) != graph.color(v) {
                return Err(BackendError::InvalidLabeling(format!(
                    "vertex {v} has bad orbit representative {rep}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend cannot run in this environment.
    Unavailable(String),
    /// The backend ran but reported a failure.
    Failed(String),
    /// The backend returned a labeling of the wrong shape.
    InvalidLabeling(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "labeling backend unavailable: {}", msg),
            Self::Failed(msg) => write!(f, "labeling backend failed: {}", msg),
            Self::InvalidLabeling(msg) => write!(f, "invalid labeling: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// A canonical-labeling engine.
///
/// `order` must be canonical for the backend itself: isomorphic inputs are
/// put in orders that yield identical relabeled graphs. Two backends may
/// settle on different orders, and so on different keys; `orbits` is the
/// automorphism partition and agrees across all correct backends.
pub trait LabelingBackend: Send + Sync {
    fn name(&self) -> &str;

    fn canonical_label_and_orbits(&self, graph: &ColoredGraph) -> Result<Labeling, BackendError>;
}

/// Pure-Rust individualization-refinement labeler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend;

impl LabelingBackend for ReferenceBackend {
    fn name(&self) -> &str {
        "reference"
    }

    fn canonical_label_and_orbits(&self, graph: &ColoredGraph) -> Result<Labeling, BackendError> {
        Ok(Search::new(graph).run())
    }
}

/// Rank of each entry: the position of the first element equal to it after
/// sorting. Equal values share a rank.
fn ranks_from_values<T: Ord>(values: &[T]) -> Vec<usize> {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| values[a].cmp(&values[b]));
    let mut ranks = vec![0usize; n];
    for i in 1..n {
        ranks[indices[i]] = if values[indices[i]] == values[indices[i - 1]] {
            ranks[indices[i - 1]]
        } else {
            i
        };
    }
    ranks
}

fn count_distinct(ranks: &[usize]) -> usize {
    let mut sorted: Vec<usize> = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

type Certificate = (Vec<u32>, Vec<(usize, usize)>);

struct Leaf {
    order: Vec<usize>,
    certificate: Certificate,
}

struct Search<'a> {
    graph: &'a ColoredGraph,
    adjacency: Vec<Vec<usize>>,
    first: Option<Leaf>,
    best: Option<Leaf>,
    generators: Vec<Vec<usize>>,
}

impl<'a> Search<'a> {
    fn new(graph: &'a ColoredGraph) -> Self {
        let adjacency = (0..graph.vertex_count())
            .map(|v| graph.neighbors(v).collect())
            .collect();
        Self {
            graph,
            adjacency,
            first: None,
            best: None,
            generators: Vec::new(),
        }
    }

    fn run(mut self) -> Labeling {
        let n = self.graph.vertex_count();
        if n == 0 {
            return Labeling {
                order: Vec::new(),
                orbits: Vec::new(),
            };
        }
        let colors: Vec<u32> = (0..n).map(|v| self.graph.color(v)).collect();
        let ranks = ranks_from_values(&colors);
        let mut path = Vec::new();
        self.descend(ranks, &mut path);

        let order = self.best.map(|leaf| leaf.order).unwrap_or_default();
        let orbits = orbits_of(n, &self.generators, &[]);
        Labeling { order, orbits }
    }

    fn refine(&self, ranks: &mut Vec<usize>) {
        let mut prev_distinct = count_distinct(ranks);
        loop {
            let signatures: Vec<(usize, Vec<usize>)> = (0..ranks.len())
                .map(|v| {
                    let mut nb: Vec<usize> = self.adjacency[v].iter().map(|&u| ranks[u]).collect();
                    nb.sort_unstable();
                    (ranks[v], nb)
                })
                .collect();
            let new_ranks = ranks_from_values(&signatures);
            let distinct = count_distinct(&new_ranks);
            if distinct <= prev_distinct {
                return;
            }
            *ranks = new_ranks;
            prev_distinct = distinct;
        }
    }

    fn descend(&mut self, mut ranks: Vec<usize>, path: &mut Vec<usize>) {
        self.refine(&mut ranks);
        let n = ranks.len();

        let target = {
            let mut sizes = vec![0usize; n];
            for &r in &ranks {
                sizes[r] += 1;
            }
            (0..n).find(|&r| sizes[r] > 1)
        };
        let Some(target) = target else {
            self.leaf(&ranks);
            return;
        };

        let cell: Vec<usize> = (0..n).filter(|&v| ranks[v] == target).collect();
        let mut tried: Vec<usize> = Vec::new();
        for &v in &cell {
            if !tried.is_empty() {
                let orbits = orbits_of(n, &self.generators, path);
                if tried.iter().any(|&u| orbits[u] == orbits[v]) {
                    continue;
                }
            }
            tried.push(v);
            let mut child = ranks.clone();
            for &u in &cell {
                if u != v {
                    child[u] = target + 1;
                }
            }
            path.push(v);
            self.descend(child, path);
            path.pop();
        }
    }

    fn leaf(&mut self, ranks: &[usize]) {
        let n = ranks.len();
        let mut order = vec![0usize; n];
        for (v, &r) in ranks.iter().enumerate() {
            order[r] = v;
        }
        let colors = order.iter().map(|&v| self.graph.color(v)).collect();
        let mut edges: Vec<(usize, usize)> = self
            .graph
            .edges()
            .map(|(a, b)| {
                let (x, y) = (ranks[a], ranks[b]);
                if x <= y {
                    (x, y)
                } else {
                    (y, x)
                }
            })
            .collect();
        edges.sort_unstable();
        let leaf = Leaf {
            order,
            certificate: (colors, edges),
        };

        for reference in [&self.first, &self.best].into_iter().flatten() {
            if reference.certificate == leaf.certificate {
                let mut perm = vec![0usize; n];
                for pos in 0..n {
                    perm[reference.order[pos]] = leaf.order[pos];
                }
                if perm.iter().enumerate().any(|(v, &w)| v != w)
                    && !self.generators.contains(&perm)
                {
                    self.generators.push(perm);
                }
                break;
            }
        }

        match &self.best {
            Some(best) if best.certificate <= leaf.certificate => {}
            _ => {
                self.best = Some(Leaf {
                    order: leaf.order.clone(),
                    certificate: leaf.certificate.clone(),
                })
            }
        }
        if self.first.is_none() {
            self.first = Some(leaf);
        }
    }
}

/// Orbits of the group generated by those `generators` that fix every vertex
/// of `fixed`, as smallest-member representatives.
fn orbits_of(n: usize, generators: &[Vec<usize>], fixed: &[usize]) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for perm in generators {
        if fixed.iter().any(|&v| perm[v] != v) {
            continue;
        }
        for (v, &w) in perm.iter().enumerate() {
            let (a, b) = (find(&mut parent, v), find(&mut parent, w));
            if a != b {
                let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                parent[hi] = lo;
            }
        }
    }
    (0..n).map(|v| find(&mut parent, v)).collect()
}
