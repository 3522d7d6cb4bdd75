use std::collections::HashMap;

use crate::canonical::{CanonicalOrder, Marks};
use crate::complex::{ComplexGraph, Site};
use crate::traits::WriteLabel;

/// Writes a complex in its stored molecule and component order.
pub fn write_complex<C: WriteLabel>(graph: &ComplexGraph<C>) -> String {
    write_ordered(graph, &CanonicalOrder::identity(graph), None)
}

/// Writes a complex visiting molecules and components in `order`.
///
/// Bond labels are numbered by first appearance. Bonds at a component are
/// listed by partner position, so any two graphs written in a canonical order
/// produce the same text exactly when they are isomorphic.
pub(crate) fn write_ordered<C: WriteLabel>(
    graph: &ComplexGraph<C>,
    order: &CanonicalOrder,
    marks: Option<&Marks>,
) -> String {
    let mut mol_pos = vec![0usize; graph.molecule_count()];
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
    let position = |s: Site| (mol_pos[s.molecule], comp_pos[s.molecule][s.component]);

    let mut labels: HashMap<usize, usize> = HashMap::new();
    let mut out = String::new();
    for (i, &m) in order.molecules.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        let mol = graph.molecule(m);
        out.push_str(&mol.name);
        if let Some(k) = marks.map(|mk| mk.molecules[m]).filter(|&k| k > 0) {
            out.push('%');
            out.push_str(&k.to_string());
        }
        out.push('(');
        for (j, &c) in order.components[m].iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            let site = Site::new(m, c);
            let comp = &mol.components[c];
            comp.write_label(&mut out);
            if let Some(k) = marks.map(|mk| mk.components[m][c]).filter(|&k| k > 0) {
                out.push('%');
                out.push_str(&k.to_string());
            }

            let mut bonds: Vec<((usize, usize), usize)> = graph
                .bonds_at(site)
                .map(|(idx, partner)| (position(partner), idx))
                .collect();
            bonds.sort_unstable_by_key(|&(p, _)| p);
            for &(_, idx) in &bonds {
                let next = labels.len() + 1;
                labels.entry(idx).or_insert(next);
            }
            let mut written: Vec<((usize, usize), usize)> =
                bonds.iter().map(|&(p, idx)| (p, labels[&idx])).collect();
            written.sort_unstable();
            for (_, label) in written {
                out.push('!');
                out.push_str(&label.to_string());
            }
            comp.write_wildcard(&mut out);
        }
        out.push(')');
        if let Some(comp) = &mol.compartment {
            out.push('@');
            out.push_str(comp);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::{parse_pattern, parse_species};

    #[test]
    fn labels_renumbered_by_appearance() {
        let g = parse_species("A(b!7).B(a!7,c!3).C(x!3)").unwrap();
        assert_eq!(write_complex(&g), "A(b!1).B(a!1,c!2).C(x!2)");
    }

    #[test]
    fn pattern_wildcards_written() {
        let p = parse_pattern("A(b!+,s~P,t!?)@cyt").unwrap();
        assert_eq!(write_complex(&p), "A(b!+,s~P,t!?)@cyt");
    }

    #[test]
    fn reordered_output() {
        let g = parse_species("A(x,y!1).B(a!1)").unwrap();
        let order = CanonicalOrder {
            molecules: vec![1, 0],
            components: vec![vec![1, 0], vec![0]],
        };
        assert_eq!(write_ordered(&g, &order, None), "B(a!1).A(y!1,x)");
    }

    #[test]
    fn marks_are_appended() {
        let g = parse_species("A(b)").unwrap();
        let marks = Marks {
            molecules: vec![1],
            components: vec![vec![2]],
        };
        let order = CanonicalOrder::identity(&g);
        assert_eq!(write_ordered(&g, &order, Some(&marks)), "A%1(b%2)");
    }

    #[test]
    fn parallel_bonds_written_stably() {
        let g = parse_species("A(b!1!2).B(a!2!1)").unwrap();
        assert_eq!(write_complex(&g), "A(b!1!2).B(a!1!2)");
    }
}
