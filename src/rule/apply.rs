use std::collections::VecDeque;
use std::ops::Range;

use super::{DeletionMode, Endpoint, MolRef, ReactionRule, SiteRef, TransportMode};
use crate::complex::{Site, SpeciesGraph};
use crate::graph_ops::{remove_molecules, split_complexes};
use crate::matcher::Embedding;

/// Runs `rule` on one reactant species per reactant pattern, each matched by
/// the given embedding.
///
/// Product complexes are returned in order of their lowest molecule in the
/// joined working graph.
///
/// # Panics
///
/// Panics if the counts of targets and embeddings differ from the rule's
/// arity, or if a bond the rule breaks is absent from the target.
pub(crate) fn apply_rule(
    rule: &ReactionRule,
    targets: &[&SpeciesGraph],
    embeddings: &[&Embedding],
) -> Vec<SpeciesGraph> {
    assert_eq!(targets.len(), rule.reactants.len(), "one target per reactant pattern");
    assert_eq!(embeddings.len(), rule.reactants.len(), "one embedding per reactant pattern");

    let mut work = SpeciesGraph::new();
    let mut ranges = Vec::with_capacity(targets.len());
    let mut placed = Vec::with_capacity(targets.len());
    for (target, embedding) in targets.iter().zip(embeddings) {
        let offset = work.append(target);
        ranges.push(offset..offset + target.molecule_count());
        placed.push(embedding.offset(offset));
    }
    edit(rule, work, &placed, &ranges)
}

/// Runs `rule` with every reactant pattern matched into the one complex
/// `target`. The embeddings must not share components; they may share
/// molecules.
///
/// # Panics
///
/// Same as [`apply_rule`].
pub(crate) fn apply_rule_within(
    rule: &ReactionRule,
    target: &SpeciesGraph,
    embeddings: &[&Embedding],
) -> Vec<SpeciesGraph> {
    assert_eq!(embeddings.len(), rule.reactants.len(), "one embedding per reactant pattern");
    let placed: Vec<Embedding> = embeddings.iter().map(|&e| e.clone()).collect();
    let ranges = vec![0..target.molecule_count(); embeddings.len()];
    edit(rule, target.clone(), &placed, &ranges)
}

/// Applies the rule's transform to `work`, where `placed[p]` embeds reactant
/// pattern `p` and `ranges[p]` spans the molecules of its complex.
fn edit(
    rule: &ReactionRule,
    mut work: SpeciesGraph,
    placed: &[Embedding],
    ranges: &[Range<usize>],
) -> Vec<SpeciesGraph> {
    let site = |r: SiteRef| placed[r.pattern].site(Site::new(r.molecule, r.component));
    let molecule = |r: MolRef| placed[r.pattern].molecules[r.molecule];

    let tf = &rule.transform;
    let created: Vec<usize> = tf
        .creations
        .iter()
        .map(|m| work.add_molecule(m.clone()))
        .collect();
    let endpoint = |e: Endpoint| match e {
        Endpoint::Reactant(r) => site(r),
        Endpoint::Created { index, component } => Site::new(created[index], component),
    };

    for (r, state) in &tf.state_changes {
        work.component_mut(site(*r)).state = Some(state.clone());
    }
    for &(a, b) in &tf.broken {
        let (sa, sb) = (site(a), site(b));
        let idx = work.bond_between(sa, sb).unwrap_or_else(|| {
            panic!("rule '{}' breaks a bond {sa:?} - {sb:?} the target lacks", rule.name)
        });
        work.remove_bond(idx);
    }
    for &(a, b) in &tf.added {
        work.add_bond(endpoint(a), endpoint(b));
    }
    for (r, compartment) in &tf.moves {
        move_molecule(&mut work, molecule(*r), compartment, rule.transport);
    }

    match rule.deletion {
        DeletionMode::None => {}
        DeletionMode::Complex => {
            let mut remove = vec![false; work.molecule_count()];
            for r in &tf.deleted {
                for m in ranges[r.pattern].clone() {
                    remove[m] = true;
                }
            }
            work = remove_molecules(&work, &remove);
        }
        DeletionMode::Molecules => {
            let mut remove = vec![false; work.molecule_count()];
            for r in &tf.deleted {
                remove[molecule(*r)] = true;
            }
            work = remove_molecules(&work, &remove);
        }
    }

    split_complexes(&work)
}

fn move_molecule(work: &mut SpeciesGraph, start: usize, to: &str, mode: TransportMode) {
    let from = work.molecule(start).compartment.clone();
    let mut moving = vec![start];
    if mode == TransportMode::MoveConnected {
        let mut seen = vec![false; work.molecule_count()];
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(m) = queue.pop_front() {
            for n in work.molecule_neighbors(m) {
                if !seen[n] && work.molecule(n).compartment == from {
                    seen[n] = true;
                    moving.push(n);
                    queue.push_back(n);
                }
            }
        }
    }
    for m in moving {
        work.molecule_mut(m).compartment = Some(to.to_string());
    }
}
