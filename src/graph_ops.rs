use crate::complex::{Bond, ComplexGraph, Site};

/// Molecule indices of each connected complex, sorted, in order of each
/// complex's lowest molecule index.
pub fn connected_components<C>(graph: &ComplexGraph<C>) -> Vec<Vec<usize>> {
    let n = graph.molecule_count();
    let mut adjacency = vec![Vec::new(); n];
    for bond in graph.bonds() {
        let (a, b) = bond.endpoints();
        if a.molecule != b.molecule {
            adjacency[a.molecule].push(b.molecule);
            adjacency[b.molecule].push(a.molecule);
        }
    }
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;
            component.push(current);
            for &neighbor in &adjacency[current] {
                if !visited[neighbor] {
                    stack.push(neighbor);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

pub fn num_complexes<C>(graph: &ComplexGraph<C>) -> usize {
    connected_components(graph).len()
}

/// True for a graph forming exactly one complex. The empty graph is not connected.
pub fn is_connected<C>(graph: &ComplexGraph<C>) -> bool {
    num_complexes(graph) == 1
}

/// The subgraph on `molecules` (in the given order) with every bond whose two
/// endpoints both survive.
pub fn induced_subgraph<C: Clone>(graph: &ComplexGraph<C>, molecules: &[usize]) -> ComplexGraph<C> {
    let mut index_map = vec![None; graph.molecule_count()];
    let mut sub = ComplexGraph::new();
    for &old in molecules {
        index_map[old] = Some(sub.add_molecule(graph.molecule(old).clone()));
    }
    for bond in graph.bonds() {
        let (a, b) = bond.endpoints();
        if let (Some(na), Some(nb)) = (index_map[a.molecule], index_map[b.molecule]) {
            sub.add_bond(Site::new(na, a.component), Site::new(nb, b.component));
        }
    }
    sub
}

/// Splits a graph into one graph per connected complex.
pub fn split_complexes<C: Clone>(graph: &ComplexGraph<C>) -> Vec<ComplexGraph<C>> {
    connected_components(graph)
        .iter()
        .map(|component| induced_subgraph(graph, component))
        .collect()
}

/// Drops every molecule flagged in `remove` together with its bonds.
pub fn remove_molecules<C: Clone>(graph: &ComplexGraph<C>, remove: &[bool]) -> ComplexGraph<C> {
    let keep: Vec<usize> = (0..graph.molecule_count())
        .filter(|&m| !remove[m])
        .collect();
    induced_subgraph(graph, &keep)
}

/// Molecules reachable from `start` through bonds, sorted.
pub fn complex_of<C>(graph: &ComplexGraph<C>, start: usize) -> Vec<usize> {
    connected_components(graph)
        .into_iter()
        .find(|c| c.binary_search(&start).is_ok())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenumberError {
    LengthMismatch { expected: usize, got: usize },
    InvalidPermutation,
}

impl std::fmt::Display for RenumberError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, got } => {
                write!(f, "new order length {got} != item count {expected}")
            }
            Self::InvalidPermutation => write!(f, "new order is not a valid permutation"),
        }
    }
}

impl std::error::Error for RenumberError {}

fn validate_permutation(new_order: &[usize], n: usize) -> Result<(), RenumberError> {
    if new_order.len() != n {
        return Err(RenumberError::LengthMismatch {
            expected: n,
            got: new_order.len(),
        });
    }
    let mut seen = vec![false; n];
    for &idx in new_order {
        if idx >= n || seen[idx] {
            return Err(RenumberError::InvalidPermutation);
        }
        seen[idx] = true;
    }
    Ok(())
}

/// Rebuilds `graph` with molecules in `molecule_order` and the components of
/// each old molecule `m` in `component_orders[m]`.
///
/// `molecule_order[new] = old` and `component_orders[old_mol][new] = old_comp`.
/// Bonds are re-expressed in the new indices and sorted.
pub fn renumber<C: Clone>(
    graph: &ComplexGraph<C>,
    molecule_order: &[usize],
    component_orders: &[Vec<usize>],
) -> Result<ComplexGraph<C>, RenumberError> {
    let n = graph.molecule_count();
    validate_permutation(molecule_order, n)?;
    if component_orders.len() != n {
        return Err(RenumberError::LengthMismatch {
            expected: n,
            got: component_orders.len(),
        });
    }

    let mut old_to_new_mol = vec![0usize; n];
    for (new_idx, &old_idx) in molecule_order.iter().enumerate() {
        old_to_new_mol[old_idx] = new_idx;
    }

    let mut old_to_new_comp = Vec::with_capacity(n);
    for (m, order) in component_orders.iter().enumerate() {
        let k = graph.molecule(m).components.len();
        validate_permutation(order, k)?;
        let mut inverse = vec![0usize; k];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            inverse[old_idx] = new_idx;
        }
        old_to_new_comp.push(inverse);
    }

    let mut new_graph = ComplexGraph::new();
    for &old in molecule_order {
        let mut mol = graph.molecule(old).clone();
        mol.components = component_orders[old]
            .iter()
            .map(|&c| graph.molecule(old).components[c].clone())
            .collect();
        new_graph.add_molecule(mol);
    }

    let map_site = |s: Site| {
        Site::new(
            old_to_new_mol[s.molecule],
            old_to_new_comp[s.molecule][s.component],
        )
    };
    let mut bonds: Vec<Bond> = graph
        .bonds()
        .iter()
        .map(|b| {
            let (x, y) = b.endpoints();
            Bond::new(map_site(x), map_site(y))
        })
        .collect();
    bonds.sort_unstable();
    for bond in bonds {
        let (a, b) = bond.endpoints();
        new_graph.add_bond(a, b);
    }
    Ok(new_graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse_species;

    #[test]
    fn components_of_disconnected_graph() {
        let g = parse_species("A(b!1).B(a!1).C(x).A(b)").unwrap();
        assert_eq!(connected_components(&g), vec![vec![0, 1], vec![2], vec![3]]);
        assert_eq!(num_complexes(&g), 3);
        assert!(!is_connected(&g));
    }

    #[test]
    fn split_keeps_internal_bonds() {
        let g = parse_species("A(b!1).C(x).B(a!1)").unwrap();
        let parts = split_complexes(&g);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].molecule_count(), 2);
        assert_eq!(parts[0].bond_count(), 1);
        assert_eq!(parts[0].molecule(1).name, "B");
        assert_eq!(parts[1].molecule(0).name, "C");
    }

    #[test]
    fn remove_middle_of_chain() {
        let g = parse_species("A(r!1).A(l!1,r!2).A(l!2)").unwrap();
        let rest = remove_molecules(&g, &[false, true, false]);
        assert_eq!(rest.molecule_count(), 2);
        assert_eq!(rest.bond_count(), 0);
        assert_eq!(num_complexes(&rest), 2);
    }

    #[test]
    fn complex_of_reaches_neighbors() {
        let g = parse_species("A(b!1).B(a!1).C(x)").unwrap();
        assert_eq!(complex_of(&g, 1), vec![0, 1]);
        assert_eq!(complex_of(&g, 2), vec![2]);
    }

    #[test]
    fn renumber_reverses_molecules() {
        let g = parse_species("A(b!1,c).B(a!1)").unwrap();
        let r = renumber(&g, &[1, 0], &[vec![1, 0], vec![0]]).unwrap();
        assert_eq!(r.molecule(0).name, "B");
        assert_eq!(r.molecule(1).components[0].name, "c");
        assert_eq!(r.bonds()[0], Bond::new(Site::new(0, 0), Site::new(1, 1)));
    }

    #[test]
    fn renumber_rejects_bad_permutation() {
        let g = parse_species("A(b).B(a)").unwrap();
        assert_eq!(
            renumber(&g, &[0, 0], &[vec![0], vec![0]]),
            Err(RenumberError::InvalidPermutation)
        );
        assert_eq!(
            renumber(&g, &[0], &[vec![0], vec![0]]),
            Err(RenumberError::LengthMismatch {
                expected: 2,
                got: 1
            })
        );
    }
}
