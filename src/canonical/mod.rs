//! Canonical keys and automorphism orbits of complexes.

mod backend;
mod colored;

pub use backend::{BackendError, Labeling, LabelingBackend, ReferenceBackend};
pub use colored::{ColoredGraph, Marks};

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::complex::{ComplexGraph, Site};
use crate::graph_ops;
use crate::notation::write_ordered;
use crate::traits::WriteLabel;

/// A canonical visiting order: `molecules[pos]` is the molecule placed at
/// canonical position `pos`, and `components[m][pos]` the component of
/// molecule `m` placed at position `pos` within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalOrder {
    pub molecules: Vec<usize>,
    pub components: Vec<Vec<usize>>,
}

impl CanonicalOrder {
    pub fn identity<C>(graph: &ComplexGraph<C>) -> Self {
        Self {
            molecules: (0..graph.molecule_count()).collect(),
            components: graph
                .molecules()
                .iter()
                .map(|m| (0..m.components.len()).collect())
                .collect(),
        }
    }

    /// The graph rebuilt in this order.
    pub fn apply<C: Clone>(&self, graph: &ComplexGraph<C>) -> ComplexGraph<C> {
        graph_ops::renumber(graph, &self.molecules, &self.components)
            .unwrap_or_else(|e| panic!("canonical order does not fit its graph: {e}"))
    }
}

/// Automorphism orbits of molecules and component sites, each given by its
/// smallest member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitPartition {
    pub molecules: Vec<usize>,
    pub components: Vec<Vec<Site>>,
}

impl OrbitPartition {
    pub fn trivial<C>(graph: &ComplexGraph<C>) -> Self {
        Self {
            molecules: (0..graph.molecule_count()).collect(),
            components: graph
                .molecules()
                .iter()
                .enumerate()
                .map(|(m, mol)| (0..mol.components.len()).map(|c| Site::new(m, c)).collect())
                .collect(),
        }
    }

    /// True when every molecule and every component is alone in its orbit.
    pub fn is_trivial(&self) -> bool {
        self.molecules.iter().enumerate().all(|(m, &r)| m == r)
            && self.components.iter().enumerate().all(|(m, comps)| {
                comps
                    .iter()
                    .enumerate()
                    .all(|(c, &r)| r == Site::new(m, c))
            })
    }

    pub fn same_molecule_orbit(&self, a: usize, b: usize) -> bool {
        self.molecules[a] == self.molecules[b]
    }

    pub fn same_site_orbit(&self, a: Site, b: Site) -> bool {
        self.components[a.molecule][a.component] == self.components[b.molecule][b.component]
    }

    pub fn molecule_orbit_count(&self) -> usize {
        self.molecules
            .iter()
            .enumerate()
            .filter(|&(m, &r)| m == r)
            .count()
    }

    /// The same partition expressed in the indices of `order.apply(graph)`.
    pub fn relabel(&self, order: &CanonicalOrder) -> OrbitPartition {
        let n = order.molecules.len();
        let mut mol_pos = vec![0usize; n];
        for (pos, &m) in order.molecules.iter().enumerate() {
            mol_pos[m] = pos;
        }
        let comp_pos: Vec<Vec<usize>> = order
            .components
            .iter()
            .map(|perm| {
                let mut inv = vec![0usize; perm.len()];
                for (pos, &c) in perm.iter().enumerate() {
                    inv[c] = pos;
                }
                inv
            })
            .collect();

        let mut mol_rep = vec![usize::MAX; n];
        for m in 0..n {
            let rep = self.molecules[m];
            mol_rep[rep] = mol_rep[rep].min(mol_pos[m]);
        }
        let molecules = order
            .molecules
            .iter()
            .map(|&m| mol_rep[self.molecules[m]])
            .collect();

        let mut site_rep: std::collections::HashMap<Site, Site> = std::collections::HashMap::new();
        for (m, comps) in self.components.iter().enumerate() {
            for (c, &rep) in comps.iter().enumerate() {
                let new_site = Site::new(mol_pos[m], comp_pos[m][c]);
                site_rep
                    .entry(rep)
                    .and_modify(|s| *s = (*s).min(new_site))
                    .or_insert(new_site);
            }
        }
        let components = order
            .molecules
            .iter()
            .map(|&m| {
                order.components[m]
                    .iter()
                    .map(|&c| site_rep[&self.components[m][c]])
                    .collect()
            })
            .collect();

        OrbitPartition {
            molecules,
            components,
        }
    }
}

/// Canonical form of one complex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canonical {
    /// Equal for two complexes exactly when they are isomorphic.
    pub key: String,
    pub order: CanonicalOrder,
    pub orbits: OrbitPartition,
}

/// Runs canonical labeling through an optional primary backend, falling back
/// to the built-in [`ReferenceBackend`] when the primary fails.
///
/// Keys are only comparable when the same backend produced them. The first
/// failure of the primary retires it for the rest of this canonicalizer's
/// life, so keys from before and after [`is_degraded`](Self::is_degraded)
/// turns true must not be mixed.
pub struct Canonicalizer {
    primary: Option<Box<dyn LabelingBackend>>,
    reference: ReferenceBackend,
    degraded: AtomicBool,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Canonicalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canonicalizer")
            .field("backend", &self.backend_name())
            .finish()
    }
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self {
            primary: None,
            reference: ReferenceBackend,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn with_backend(backend: Box<dyn LabelingBackend>) -> Self {
        Self {
            primary: Some(backend),
            reference: ReferenceBackend,
            degraded: AtomicBool::new(false),
        }
    }

    /// Name of the backend currently answering.
    pub fn backend_name(&self) -> &str {
        match self.active_primary() {
            Some(primary) => primary.name(),
            None => self.reference.name(),
        }
    }

    /// Whether the primary backend has failed and been retired.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn active_primary(&self) -> Option<&dyn LabelingBackend> {
        self.primary.as_deref().filter(|_| !self.is_degraded())
    }

    pub fn label(&self, graph: &ColoredGraph) -> Labeling {
        if let Some(primary) = self.active_primary() {
            match primary
                .canonical_label_and_orbits(graph)
                .and_then(|l| l.validate(graph).map(|()| l))
            {
                Ok(labeling) => return labeling,
                Err(e) => {
                    log::warn!(
                        "labeling backend '{}' failed ({}); using '{}' from now on",
                        primary.name(),
                        e,
                        self.reference.name()
                    );
                    self.degraded.store(true, Ordering::Release);
                }
            }
        }
        match self.reference.canonical_label_and_orbits(graph) {
            Ok(labeling) => labeling,
            Err(e) => panic!("reference labeling backend failed: {e}"),
        }
    }

    pub fn canonicalize<C: WriteLabel>(&self, graph: &ComplexGraph<C>) -> Canonical {
        self.run(graph, None)
    }

    /// Canonical form of a complex whose molecules and components carry
    /// extra marks. The key differs from the unmarked key and from any key
    /// with differently placed marks.
    pub fn canonicalize_marked<C: WriteLabel>(
        &self,
        graph: &ComplexGraph<C>,
        marks: &Marks,
    ) -> Canonical {
        self.run(graph, Some(marks))
    }

    fn run<C: WriteLabel>(&self, graph: &ComplexGraph<C>, marks: Option<&Marks>) -> Canonical {
        let (colored, layout) = colored::build(graph, marks);
        let labeling = self.label(&colored);

        let mut position = vec![0usize; labeling.order.len()];
        for (pos, &v) in labeling.order.iter().enumerate() {
            position[v] = pos;
        }

        let mut molecules: Vec<usize> = (0..graph.molecule_count()).collect();
        molecules.sort_by_key(|&m| position[m]);
        let components = layout
            .component_vertex
            .iter()
            .map(|vertices| {
                let mut idx: Vec<usize> = (0..vertices.len()).collect();
                idx.sort_by_key(|&c| position[vertices[c]]);
                idx
            })
            .collect();
        let order = CanonicalOrder {
            molecules,
            components,
        };

        let orbits = OrbitPartition {
            molecules: (0..graph.molecule_count())
                .map(|m| labeling.orbits[m])
                .collect(),
            components: layout
                .component_vertex
                .iter()
                .map(|vertices| {
                    vertices
                        .iter()
                        .map(|&v| {
                            let rep = labeling.orbits[v];
                            layout.vertex_site[rep].unwrap_or_else(|| {
                                panic!("component vertex {v} shares an orbit with vertex {rep}")
                            })
                        })
                        .collect()
                })
                .collect(),
        };

        let key = write_ordered(graph, &order, marks);
        Canonical { key, order, orbits }
    }
}

/// Canonical form using the built-in backend.
pub fn canonicalize<C: WriteLabel>(graph: &ComplexGraph<C>) -> Canonical {
    Canonicalizer::new().canonicalize(graph)
}

/// The canonical key of a complex.
pub fn canonical_string<C: WriteLabel>(graph: &ComplexGraph<C>) -> String {
    canonicalize(graph).key
}
