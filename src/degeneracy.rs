use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::canonical::{Canonicalizer, Marks};
use crate::complex::{ComplexGraph, Pattern, Site, SpeciesGraph};
use crate::matcher::{find_all_embeddings, Embedding, MatchOptions};

/// One representative embedding and the number of raw embeddings it stands
/// for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingClass {
    pub representative: Embedding,
    pub degeneracy: u64,
}

/// The same, for several patterns embedded at once into one target, as
/// when a rule acts on a single complex with both of its reactant patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointClass {
    pub representatives: Vec<Embedding>,
    pub degeneracy: u64,
}

/// Marks the image of `embedding` in `target`: each mapped molecule carries
/// its pattern molecule index + 1 and each mapped component its flat pattern
/// component index + 1.
pub fn image_marks<C>(pattern: &Pattern, target: &ComplexGraph<C>, embedding: &Embedding) -> Marks {
    joint_image_marks(&[pattern], target, &[embedding])
}

/// Marks the images of `embeddings[k]` of `patterns[k]`. Molecules and
/// components are numbered across all patterns in turn. A target molecule
/// hit by several patterns gets one mark encoding all of its pattern
/// molecules.
pub fn joint_image_marks<C>(
    patterns: &[&Pattern],
    target: &ComplexGraph<C>,
    embeddings: &[&Embedding],
) -> Marks {
    let mut marks = Marks::none(target);
    let base = patterns.iter().map(|p| p.molecule_count()).sum::<usize>() + 1;
    let mut molecule_code = 0;
    let mut flat = 0;
    for (pattern, embedding) in patterns.iter().zip(embeddings) {
        for (pm, mol) in pattern.molecules().iter().enumerate() {
            molecule_code += 1;
            let tm = embedding.molecules[pm];
            marks.molecules[tm] = marks.molecules[tm] * base + molecule_code;
            for pc in 0..mol.components.len() {
                flat += 1;
                marks.components[tm][embedding.components[pm][pc]] = flat;
            }
        }
    }
    marks
}

fn image_sites(embedding: &Embedding) -> impl Iterator<Item = Site> + '_ {
    embedding
        .molecules
        .iter()
        .zip(&embedding.components)
        .flat_map(|(&m, comps)| comps.iter().map(move |&c| Site::new(m, c)))
}

/// Pairs of embeddings, one from each list, whose images share no
/// component. The two images may share molecules.
pub fn disjoint_pairs(first: &[Embedding], second: &[Embedding]) -> Vec<Vec<Embedding>> {
    let mut pairs = Vec::new();
    for a in first {
        let taken: HashSet<Site> = image_sites(a).collect();
        for b in second {
            if image_sites(b).all(|s| !taken.contains(&s)) {
                pairs.push(vec![a.clone(), b.clone()]);
            }
        }
    }
    pairs
}

/// Groups `raw` by the marked canonical key of `target`, keeping each
/// class's first member. Regroups from scratch when the canonicalizer
/// changes backend midway, since keys of two backends do not compare.
fn group_by_symmetry<E: Clone>(
    canon: &Canonicalizer,
    target: &SpeciesGraph,
    raw: Vec<E>,
    marks: &dyn Fn(&E) -> Marks,
) -> Vec<(E, u64)> {
    if raw.is_empty() {
        return Vec::new();
    }
    if canon.canonicalize(target).orbits.is_trivial() {
        return raw.into_iter().map(|e| (e, 1)).collect();
    }
    let degraded = canon.is_degraded();
    let mut classes: Vec<(E, u64)> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for e in &raw {
        let key = canon.canonicalize_marked(target, &marks(e)).key;
        match by_key.get(&key) {
            Some(&i) => classes[i].1 += 1,
            None => {
                by_key.insert(key, classes.len());
                classes.push((e.clone(), 1));
            }
        }
    }
    if canon.is_degraded() != degraded {
        return group_by_symmetry(canon, target, raw, marks);
    }
    classes
}

/// Groups raw embeddings into classes related by an automorphism of the
/// target, in order of each class's first member.
pub fn embedding_classes(
    canon: &Canonicalizer,
    pattern: &Pattern,
    target: &SpeciesGraph,
    raw: Vec<Embedding>,
) -> Vec<EmbeddingClass> {
    group_by_symmetry(canon, target, raw, &|e: &Embedding| {
        image_marks(pattern, target, e)
    })
    .into_iter()
    .map(|(representative, degeneracy)| EmbeddingClass {
        representative,
        degeneracy,
    })
    .collect()
}

/// Groups joint embeddings (one embedding per pattern, all into `target`)
/// into classes related by an automorphism of the target.
pub fn joint_embedding_classes(
    canon: &Canonicalizer,
    patterns: &[&Pattern],
    target: &SpeciesGraph,
    raw: Vec<Vec<Embedding>>,
) -> Vec<JointClass> {
    group_by_symmetry(canon, target, raw, &|tuple: &Vec<Embedding>| {
        let refs: Vec<&Embedding> = tuple.iter().collect();
        joint_image_marks(patterns, target, &refs)
    })
    .into_iter()
    .map(|(representatives, degeneracy)| JointClass {
        representatives,
        degeneracy,
    })
    .collect()
}

/// Number of raw embeddings of `pattern` into `target` that are images of
/// `embedding` under a symmetry of the target, `embedding` included.
pub fn count_embedding_degeneracy(
    pattern: &Pattern,
    target: &SpeciesGraph,
    embedding: &Embedding,
) -> u64 {
    count_embedding_degeneracy_with(&Canonicalizer::new(), pattern, target, embedding)
}

pub fn count_embedding_degeneracy_with(
    canon: &Canonicalizer,
    pattern: &Pattern,
    target: &SpeciesGraph,
    embedding: &Embedding,
) -> u64 {
    if canon.canonicalize(target).orbits.is_trivial() {
        return 1;
    }
    let degraded = canon.is_degraded();
    let key_of = |e: &Embedding| {
        canon
            .canonicalize_marked(target, &image_marks(pattern, target, e))
            .key
    };
    let key = key_of(embedding);
    let opts = MatchOptions {
        allow_extra_target_bonds: true,
        ..MatchOptions::default()
    };
    let count = find_all_embeddings(pattern, target, &opts)
        .iter()
        .filter(|e| key_of(e) == key)
        .count() as u64;
    if canon.is_degraded() != degraded {
        return count_embedding_degeneracy_with(canon, pattern, target, embedding);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::{parse_pattern, parse_species};

    fn classes(p: &str, t: &str) -> Vec<EmbeddingClass> {
        let p = parse_pattern(p).unwrap();
        let t = parse_species(t).unwrap();
        let raw = find_all_embeddings(&p, &t, &MatchOptions::default());
        embedding_classes(&Canonicalizer::new(), &p, &t, raw)
    }

    #[test]
    fn equivalent_sites_form_one_class() {
        let c = classes("A(b)", "A(b,b)");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].degeneracy, 2);
    }

    #[test]
    fn symmetric_dimer_bond() {
        let c = classes("A(b!1).A(b!1)", "A(b!1).A(b!1)");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].degeneracy, 2);
    }

    #[test]
    fn asymmetric_target_is_trivial() {
        let c = classes("A(b!1).B(a!1)", "A(b!1).B(a!1)");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].degeneracy, 1);
    }

    #[test]
    fn trimer_ends_and_middle() {
        // A(l,r) chain of three: the free l and free r sit on different ends.
        let c = classes("A(r)", "A(l,r!1).A(l!1,r!2).A(l!2,r)");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].degeneracy, 1);
        let c = classes("A(b)", "A(b!1,b).A(b!1,b!2).A(b!2,b)");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].degeneracy, 2);
    }

    #[test]
    fn degeneracy_of_single_embedding() {
        let p = parse_pattern("A(b)").unwrap();
        let t = parse_species("A(b!1,b).A(b!1,b)").unwrap();
        let raw = find_all_embeddings(&p, &t, &MatchOptions::default());
        assert_eq!(raw.len(), 2);
        for e in &raw {
            assert_eq!(count_embedding_degeneracy(&p, &t, e), 2);
        }
    }

    #[test]
    fn marks_follow_pattern_indices() {
        let p = parse_pattern("A(b!1).B(a!1)").unwrap();
        let t = parse_species("B(a!1).A(b!1)").unwrap();
        let e = find_all_embeddings(&p, &t, &MatchOptions::default()).remove(0);
        let marks = image_marks(&p, &t, &e);
        assert_eq!(marks.molecules, vec![2, 1]);
        assert_eq!(marks.components, vec![vec![2], vec![1]]);
    }

    fn joint(p: &str, t: &str) -> (Pattern, SpeciesGraph, Vec<Vec<Embedding>>) {
        let p = parse_pattern(p).unwrap();
        let t = parse_species(t).unwrap();
        let raw = find_all_embeddings(&p, &t, &MatchOptions::default());
        let pairs = disjoint_pairs(&raw, &raw);
        (p, t, pairs)
    }

    #[test]
    fn pairs_never_share_a_site() {
        let (_, _, pairs) = joint("A(b)", "A(b,b)");
        assert_eq!(pairs.len(), 2);
        for pair in &pairs {
            assert_eq!(pair[0].molecules, pair[1].molecules);
            assert_ne!(pair[0].components, pair[1].components);
        }
        let (_, _, pairs) = joint("A(b)", "A(b!1,b).A(b!1,b)");
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|pair| pair[0].molecules != pair[1].molecules));
    }

    #[test]
    fn both_orders_on_one_monomer_are_one_class() {
        let (p, t, pairs) = joint("A(b)", "A(b,b)");
        let c = joint_embedding_classes(&Canonicalizer::new(), &[&p, &p], &t, pairs);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].degeneracy, 2);
        assert_eq!(c[0].representatives.len(), 2);
    }

    #[test]
    fn both_ends_of_a_chain_are_one_class() {
        let (p, t, pairs) = joint("A(b)", "A(b!1,b).A(b!1,b)");
        let c = joint_embedding_classes(&Canonicalizer::new(), &[&p, &p], &t, pairs);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].degeneracy, 2);
    }

    #[test]
    fn shared_molecule_mark_encodes_both_patterns() {
        let (p, t, pairs) = joint("A(b)", "A(b,b)");
        let pair = &pairs[0];
        let marks = joint_image_marks(&[&p, &p], &t, &[&pair[0], &pair[1]]);
        // two pattern molecules in total, so codes are written in base 3
        assert_eq!(marks.molecules, vec![3 + 2]);
        let mut comps = marks.components[0].clone();
        comps.sort_unstable();
        assert_eq!(comps, vec![1, 2]);
    }
}
