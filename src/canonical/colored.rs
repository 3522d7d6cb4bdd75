use petgraph::graph::{NodeIndex, UnGraph};

use crate::complex::{ComplexGraph, Site};
use crate::traits::WriteLabel;

/// A simple undirected graph whose vertices carry integer colours.
///
/// This is the input handed to a [`LabelingBackend`](super::LabelingBackend).
/// Colours are dense ids in `0..color_count()`; two vertices may only be
/// exchanged by an automorphism when their colours agree.
#[derive(Debug, Clone)]
pub struct ColoredGraph {
    graph: UnGraph<u32, ()>,
}

impl ColoredGraph {
    pub fn new(colors: Vec<u32>, edges: &[(usize, usize)]) -> Self {
        let mut graph = UnGraph::with_capacity(colors.len(), edges.len());
        for c in colors {
            graph.add_node(c);
        }
        for &(a, b) in edges {
            graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
        }
        Self { graph }
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn color(&self, v: usize) -> u32 {
        self.graph[NodeIndex::new(v)]
    }

    pub fn color_count(&self) -> usize {
        self.graph
            .node_weights()
            .max()
            .map_or(0, |&c| c as usize + 1)
    }

    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph.neighbors(NodeIndex::new(v)).map(|n| n.index())
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.graph.edge_indices().filter_map(move |e| {
            self.graph
                .edge_endpoints(e)
                .map(|(a, b)| (a.index(), b.index()))
        })
    }
}

/// Which vertex of the coloured graph stands for which molecule or component.
///
/// Molecules occupy vertices `0..molecule_count`, components follow in site
/// order, then one vertex per bond.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub component_vertex: Vec<Vec<usize>>,
    pub vertex_site: Vec<Option<Site>>,
}

/// Per-molecule and per-component integer marks folded into the vertex
/// colours. Zero means unmarked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marks {
    pub molecules: Vec<usize>,
    pub components: Vec<Vec<usize>>,
}

impl Marks {
    pub fn none<C>(graph: &ComplexGraph<C>) -> Self {
        Self {
            molecules: vec![0; graph.molecule_count()],
            components: graph
                .molecules()
                .iter()
                .map(|m| vec![0; m.components.len()])
                .collect(),
        }
    }
}

fn push_mark(label: &mut String, mark: usize) {
    if mark > 0 {
        label.push('%');
        label.push_str(&mark.to_string());
    }
}

/// Encodes a complex as a coloured graph.
///
/// Each molecule, component and bond becomes a vertex. A molecule is joined to
/// its components, and a bond vertex to its two endpoint components, so
/// parallel and intramolecular bonds stay distinguishable in a simple graph.
pub(crate) fn build<C: WriteLabel>(
    graph: &ComplexGraph<C>,
    marks: Option<&Marks>,
) -> (ColoredGraph, Layout) {
    let mut labels: Vec<String> = Vec::new();
    let mut vertex_site = Vec::new();
    for (m, mol) in graph.molecules().iter().enumerate() {
        let mut label = format!("M:{}@{}", mol.name, mol.compartment.as_deref().unwrap_or(""));
        push_mark(&mut label, marks.map_or(0, |mk| mk.molecules[m]));
        labels.push(label);
        vertex_site.push(None);
    }

    let mut component_vertex = Vec::with_capacity(graph.molecule_count());
    let mut edges = Vec::new();
    for (m, mol) in graph.molecules().iter().enumerate() {
        let mut vertices = Vec::with_capacity(mol.components.len());
        for (c, comp) in mol.components.iter().enumerate() {
            let mut label = String::from("C:");
            comp.write_label(&mut label);
            comp.write_wildcard(&mut label);
            push_mark(&mut label, marks.map_or(0, |mk| mk.components[m][c]));
            let v = labels.len();
            labels.push(label);
            vertex_site.push(Some(Site::new(m, c)));
            edges.push((m, v));
            vertices.push(v);
        }
        component_vertex.push(vertices);
    }

    for bond in graph.bonds() {
        let (a, b) = bond.endpoints();
        let v = labels.len();
        labels.push(String::from("B"));
        vertex_site.push(None);
        edges.push((component_vertex[a.molecule][a.component], v));
        edges.push((component_vertex[b.molecule][b.component], v));
    }

    let mut palette: Vec<&str> = labels.iter().map(String::as_str).collect();
    palette.sort_unstable();
    palette.dedup();
    let colors = labels
        .iter()
        .map(|l| palette.binary_search(&l.as_str()).unwrap_or_default() as u32)
        .collect();

    (
        ColoredGraph::new(colors, &edges),
        Layout {
            component_vertex,
            vertex_site,
        },
    )
}
