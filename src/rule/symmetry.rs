use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{MolRef, SiteRef};
use crate::complex::Pattern;
use crate::matcher::{find_embeddings_with, Embedding};

/// How many relabelings of a rule's reactant side leave the rule unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSymmetry {
    /// Order of the rule's automorphism group; 1 for an asymmetric rule.
    pub automorphisms: u64,
    /// Some automorphism exchanges the two reactant patterns.
    pub swap_symmetric: bool,
}

impl Default for RuleSymmetry {
    fn default() -> Self {
        Self {
            automorphisms: 1,
            swap_symmetric: false,
        }
    }
}

/// Patterns joined into one graph.
struct Union {
    graph: Pattern,
    origin: Vec<MolRef>,
    offset: Vec<usize>,
}

fn union(patterns: &[Pattern]) -> Union {
    let mut graph = Pattern::new();
    let mut origin = Vec::new();
    let mut offset = Vec::with_capacity(patterns.len());
    for (p, pattern) in patterns.iter().enumerate() {
        offset.push(graph.append(pattern));
        origin.extend((0..pattern.molecule_count()).map(|m| MolRef::new(p, m)));
    }
    Union {
        graph,
        origin,
        offset,
    }
}

/// Exact self-maps of a pattern: names, compartments, tests and drawn bonds
/// all preserved.
fn automorphisms(graph: &Pattern) -> Vec<Embedding> {
    find_embeddings_with(
        graph,
        graph,
        |t, p| t.compartment == p.compartment,
        |t, p| t.component == p.component && t.degree == p.degree,
    )
}

/// Counts automorphisms of the reactant side that map the rule onto itself.
///
/// A reactant automorphism is kept when it maps whole patterns onto whole
/// patterns, deleted molecules onto deleted molecules, and the relabeling it
/// induces on the product side extends to an automorphism of the products.
pub(crate) fn rule_symmetry(
    reactants: &[Pattern],
    products: &[Pattern],
    molecule_map: &[(MolRef, MolRef)],
    component_map: &HashMap<SiteRef, SiteRef>,
) -> RuleSymmetry {
    let r = union(reactants);
    let p = union(products);
    let n = r.graph.molecule_count();

    let mut forward: Vec<Option<usize>> = vec![None; n];
    for &(rm, pm) in molecule_map {
        forward[r.offset[rm.pattern] + rm.molecule] = Some(p.offset[pm.pattern] + pm.molecule);
    }
    let product_component = |um: usize, c: usize| -> usize {
        let o = r.origin[um];
        component_map[&SiteRef::new(o.pattern, o.molecule, c)].component
    };

    let product_auts = if molecule_map.is_empty() {
        Vec::new()
    } else {
        automorphisms(&p.graph)
    };

    let mut count = 0u64;
    let mut swap = false;
    'sigma: for sigma in automorphisms(&r.graph) {
        let mut pattern_image: Vec<Option<usize>> = vec![None; reactants.len()];
        for m in 0..n {
            let (from, to) = (r.origin[m].pattern, r.origin[sigma.molecules[m]].pattern);
            match pattern_image[from] {
                None => pattern_image[from] = Some(to),
                Some(t) if t != to => continue 'sigma,
                Some(_) => {}
            }
        }

        let mut tau: Vec<Option<usize>> = vec![None; p.graph.molecule_count()];
        let mut tau_components: Vec<Vec<usize>> = p
            .graph
            .molecules()
            .iter()
            .map(|m| vec![usize::MAX; m.components.len()])
            .collect();
        for m in 0..n {
            let image = sigma.molecules[m];
            match (forward[m], forward[image]) {
                (None, None) => {}
                (Some(pm), Some(pimage)) => {
                    tau[pm] = Some(pimage);
                    for (c, &ci) in sigma.components[m].iter().enumerate() {
                        tau_components[pm][product_component(m, c)] =
                            product_component(image, ci);
                    }
                }
                _ => continue 'sigma,
            }
        }

        let extends = molecule_map.is_empty()
            || product_auts.iter().any(|pi| {
                tau.iter().enumerate().all(|(pm, t)| match t {
                    None => true,
                    Some(t) => pi.molecules[pm] == *t && pi.components[pm] == tau_components[pm],
                })
            });
        if extends {
            count += 1;
            if reactants.len() == 2 && pattern_image[0] == Some(1) {
                swap = true;
            }
        }
    }

    RuleSymmetry {
        automorphisms: count.max(1),
        swap_symmetric: swap,
    }
}

#[cfg(test)]
mod tests {
    use crate::rate::RateLaw;
    use crate::rule::{RuleSet, RuleSpec};
    use crate::types::{Catalog, ComponentType, MoleculeType};

    use super::RuleSymmetry;

    fn symmetry(r: &[&str], p: &[&str]) -> RuleSymmetry {
        let catalog = Catalog::new(vec![
            MoleculeType::new(
                "A",
                vec![ComponentType::stateless("b"), ComponentType::stateless("b")],
            ),
            MoleculeType::new("B", vec![ComponentType::stateless("a")]),
        ])
        .unwrap();
        let spec = RuleSpec::parse("r", r, p, RateLaw::elementary("k")).unwrap();
        RuleSet::new(&catalog, vec![spec]).unwrap().rules()[0].symmetry()
    }

    #[test]
    fn homodimerization_is_symmetric() {
        let s = symmetry(&["A(b)", "A(b)"], &["A(b!1).A(b!1)"]);
        assert_eq!(s.automorphisms, 2);
        assert!(s.swap_symmetric);
    }

    #[test]
    fn heterodimerization_is_not() {
        let s = symmetry(&["A(b)", "B(a)"], &["A(b!1).B(a!1)"]);
        assert_eq!(s, RuleSymmetry::default());
    }

    #[test]
    fn symmetric_dissociation() {
        let s = symmetry(&["A(b!1).A(b!1)"], &["A(b)", "A(b)"]);
        assert_eq!(s.automorphisms, 2);
        assert!(!s.swap_symmetric);
    }

    #[test]
    fn asymmetric_product_breaks_symmetry() {
        // only the first A gains a bond to the new B
        let s = symmetry(&["A(b!1,b).A(b!1,b)"], &["A(b!1,b!2).A(b!1,b).B(a!2)"]);
        assert_eq!(s.automorphisms, 1);
    }
}
