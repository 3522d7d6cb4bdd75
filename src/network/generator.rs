use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;
use std::time::Instant;

use super::registry::{SpeciesRegistry, Staging};
use super::{GenerateError, LimitKind, Limits, Network, Progress, Rxn, Seed, TerminalState};
use crate::canonical::Canonicalizer;
use crate::compartment::Compartments;
use crate::complex::SpeciesGraph;
use crate::degeneracy::{
    disjoint_pairs, embedding_classes, joint_embedding_classes, EmbeddingClass, JointClass,
};
use crate::graph_ops::is_connected;
use crate::matcher::{find_all_embeddings, Embedding, MatchOptions};
use crate::notation::write_species;
use crate::rate::{Bindings, RateEvaluator};
use crate::rule::{apply_rule, apply_rule_within, ReactionRule, RuleSet};
use crate::types::Catalog;

/// Builds the reaction network implied by a rule set and seed species.
///
/// The generator itself holds only configuration; every call to
/// [`generate`](Self::generate) works on registries of its own.
pub struct NetworkGenerator<'a> {
    rules: &'a RuleSet,
    evaluator: &'a dyn RateEvaluator,
    limits: Limits,
    catalog: Option<&'a Catalog>,
    compartments: Option<&'a Compartments>,
    canonicalizer: Canonicalizer,
}

impl<'a> NetworkGenerator<'a> {
    pub fn new(rules: &'a RuleSet, evaluator: &'a dyn RateEvaluator) -> Self {
        Self {
            rules,
            evaluator,
            limits: Limits::default(),
            catalog: None,
            compartments: None,
            canonicalizer: Canonicalizer::new(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Validates seed species against `catalog` before the closure starts.
    pub fn with_catalog(mut self, catalog: &'a Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Rejects seeds and products whose bonds cross non-adjacent compartments.
    pub fn with_compartments(mut self, compartments: &'a Compartments) -> Self {
        self.compartments = Some(compartments);
        self
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn generate(&self, seeds: &[Seed]) -> Result<Network, GenerateError> {
        self.generate_with_progress(seeds, |_| ControlFlow::Continue(()))
    }

    /// Like [`generate`](Self::generate), reporting after every iteration.
    /// Returning `ControlFlow::Break` from `progress` ends the run with
    /// [`TerminalState::Cancelled`] and the network committed so far.
    ///
    /// If the primary labeling backend fails during the run, the run starts
    /// over from the seeds with the reference backend, so the result never
    /// mixes keys of two backends. `progress` then sees iterations counted
    /// from 1 again.
    pub fn generate_with_progress<F>(
        &self,
        seeds: &[Seed],
        mut progress: F,
    ) -> Result<Network, GenerateError>
    where
        F: FnMut(&Progress) -> ControlFlow<()>,
    {
        loop {
            let degraded = self.canonicalizer.is_degraded();
            let result = self.run(seeds, &mut progress);
            if self.canonicalizer.is_degraded() == degraded {
                return result;
            }
            log::warn!(
                "labeling backend changed during generation; restarting with '{}'",
                self.canonicalizer.backend_name()
            );
        }
    }

    fn run<F>(&self, seeds: &[Seed], progress: &mut F) -> Result<Network, GenerateError>
    where
        F: FnMut(&Progress) -> ControlFlow<()>,
    {
        log::info!(
            "generating network from {} seed species and {} rules",
            seeds.len(),
            self.rules.len()
        );
        let started = Instant::now();
        let mut run = Run::new(self);
        for (index, seed) in seeds.iter().enumerate() {
            run.register_seed(index, seed)?;
        }

        let mut iterations = 0;
        if self
            .limits
            .max_species
            .is_some_and(|max| run.species.len() > max)
        {
            return run.finish(TerminalState::LimitReached(LimitKind::MaxSpecies), iterations);
        }

        let mut queue: VecDeque<usize> = (0..run.species.len()).collect();
        let mut queued = run.species.len();
        let mut processed: Vec<usize> = Vec::new();
        while !queue.is_empty() {
            if self.limits.max_iterations.is_some_and(|max| iterations >= max) {
                return run.finish(
                    TerminalState::LimitReached(LimitKind::MaxIterations),
                    iterations,
                );
            }
            iterations += 1;
            let batch: Vec<usize> = queue.drain(..).collect();
            for s in batch {
                for rule in self.rules.rules() {
                    if let Some(kind) = run.expand(rule, s, &processed)? {
                        return run.finish(TerminalState::LimitReached(kind), iterations);
                    }
                }
                processed.push(s);
            }
            queue.extend(queued..run.species.len());
            queued = run.species.len();

            log::debug!(
                "iteration {iterations}: {} species, {} reactions, {} queued",
                run.species.len(),
                run.reactions.len(),
                queue.len()
            );
            let snapshot = Progress {
                iteration: iterations,
                species: run.species.len(),
                reactions: run.reactions.len(),
                processed: processed.len(),
                elapsed: started.elapsed(),
            };
            if progress(&snapshot).is_break() {
                return run.finish(TerminalState::Cancelled, iterations);
            }
        }

        let terminal = run
            .truncated
            .map_or(TerminalState::Exhausted, TerminalState::LimitReached);
        run.finish(terminal, iterations)
    }

    /// Why a candidate product may not be registered: a size bound (with its
    /// kind) or a compartment violation (without one).
    fn rejection(
        &self,
        rule: &ReactionRule,
        product: &SpeciesGraph,
    ) -> Option<(Option<LimitKind>, String)> {
        if let Some((kind, detail)) = self.limits.violation(product, &rule.max_stoich) {
            return Some((Some(kind), detail));
        }
        self.compartments
            .and_then(|c| c.find_violation(product))
            .map(|detail| (None, detail))
    }
}

/// Generates the network of `rules` over `seeds` within `limits`.
///
/// For progress reports or cancellation, build a [`NetworkGenerator`] and
/// call [`NetworkGenerator::generate_with_progress`].
pub fn generate(
    seeds: &[Seed],
    rules: &RuleSet,
    limits: &Limits,
    evaluator: &dyn RateEvaluator,
) -> Result<Network, GenerateError> {
    NetworkGenerator::new(rules, evaluator)
        .with_limits(limits.clone())
        .generate(seeds)
}

/// Which species a rule step places its reactant patterns on.
enum Assignment {
    /// Pattern `p` on its own copy of species `reactants[p]`.
    Separate(Vec<usize>),
    /// Every pattern inside the one complex of this species.
    Within(usize),
}

impl Assignment {
    fn reactants(&self) -> Vec<usize> {
        match self {
            Self::Separate(reactants) => reactants.clone(),
            Self::Within(s) => vec![*s],
        }
    }
}

/// State of one generation run.
struct Run<'g, 'a> {
    generator: &'g NetworkGenerator<'a>,
    species: SpeciesRegistry,
    reactions: Vec<Rxn>,
    /// Embedding classes keyed by (rule, reactant pattern, species).
    classes: HashMap<(usize, usize, usize), Vec<EmbeddingClass>>,
    /// Joint classes of both reactant patterns, keyed by (rule, species).
    joint: HashMap<(usize, usize), Vec<JointClass>>,
    occurrences: Vec<usize>,
    truncated: Option<LimitKind>,
}

impl<'g, 'a> Run<'g, 'a> {
    fn new(generator: &'g NetworkGenerator<'a>) -> Self {
        Self {
            generator,
            species: SpeciesRegistry::default(),
            reactions: Vec::new(),
            classes: HashMap::new(),
            joint: HashMap::new(),
            occurrences: vec![0; generator.rules.len()],
            truncated: None,
        }
    }

    fn register_seed(&mut self, index: usize, seed: &Seed) -> Result<(), GenerateError> {
        let generator = self.generator;
        let invalid = |detail: String| GenerateError::InvalidSeed {
            index,
            species: write_species(&seed.graph),
            detail,
        };
        if seed.graph.is_empty() {
            return Err(invalid("no molecules".into()));
        }
        if !is_connected(&seed.graph) {
            return Err(invalid("molecules form more than one complex".into()));
        }
        if let Some(catalog) = generator.catalog {
            catalog
                .validate_species(&seed.graph)
                .map_err(|e| invalid(e.to_string()))?;
        }
        if let Some(detail) = generator
            .compartments
            .and_then(|c| c.find_violation(&seed.graph))
        {
            return Err(invalid(detail));
        }
        let canonical = generator.canonicalizer.canonicalize(&seed.graph);
        if let Some(previous) = self.species.lookup(&canonical.key) {
            return Err(invalid(format!("same species as seed {previous}")));
        }
        let graph = canonical.order.apply(&seed.graph);
        self.species.insert(canonical.key, graph, seed.population);
        Ok(())
    }

    /// Applies `rule` with species `s` in every reactant role it can take,
    /// partnered with the processed species and with itself. A rule that
    /// joins its two patterns is also tried with both inside `s`.
    fn expand(
        &mut self,
        rule: &ReactionRule,
        s: usize,
        processed: &[usize],
    ) -> Result<Option<LimitKind>, GenerateError> {
        let automorphisms = rule.symmetry.automorphisms;
        if !rule.is_bimolecular() {
            return self.step(rule, &[Assignment::Separate(vec![s])], automorphisms);
        }
        for &p in processed.iter().chain(std::iter::once(&s)) {
            let (lo, hi) = (p.min(s), p.max(s));
            let outcome = if p == s {
                self.step(rule, &[Assignment::Separate(vec![s, s])], automorphisms)?
            } else if rule.symmetry.swap_symmetric {
                // swapping the patterns gives the same reactions
                self.step(
                    rule,
                    &[Assignment::Separate(vec![lo, hi])],
                    (automorphisms / 2).max(1),
                )?
            } else {
                self.step(
                    rule,
                    &[
                        Assignment::Separate(vec![lo, hi]),
                        Assignment::Separate(vec![hi, lo]),
                    ],
                    automorphisms,
                )?
            };
            if outcome.is_some() {
                return Ok(outcome);
            }
        }
        if rule.closes_within() {
            return self.step(rule, &[Assignment::Within(s)], automorphisms);
        }
        Ok(None)
    }

    fn classes_of(
        &mut self,
        rule: &ReactionRule,
        pattern: usize,
        species: usize,
    ) -> Vec<EmbeddingClass> {
        let canonicalizer = &self.generator.canonicalizer;
        let graph = self.species.graph(species);
        self.classes
            .entry((rule.index, pattern, species))
            .or_insert_with(|| {
                let pat = &rule.reactants[pattern];
                let raw = find_all_embeddings(pat, graph, &MatchOptions::default());
                let mut classes = embedding_classes(canonicalizer, pat, graph, raw);
                if rule.match_once {
                    classes.truncate(1);
                }
                classes
            })
            .clone()
    }

    fn joint_classes_of(&mut self, rule: &ReactionRule, species: usize) -> Vec<JointClass> {
        let canonicalizer = &self.generator.canonicalizer;
        let graph = self.species.graph(species);
        self.joint
            .entry((rule.index, species))
            .or_insert_with(|| {
                let opts = MatchOptions::default();
                let first = find_all_embeddings(&rule.reactants[0], graph, &opts);
                let second = find_all_embeddings(&rule.reactants[1], graph, &opts);
                let patterns = [&rule.reactants[0], &rule.reactants[1]];
                let raw = disjoint_pairs(&first, &second);
                let mut classes = joint_embedding_classes(canonicalizer, &patterns, graph, raw);
                if rule.match_once {
                    classes.truncate(1);
                }
                classes
            })
            .clone()
    }

    /// Every way to fire `rule` under one assignment: the embeddings, one per
    /// reactant pattern, and the number of raw embedding tuples they stand
    /// for.
    fn candidates(
        &mut self,
        rule: &ReactionRule,
        assignment: &Assignment,
    ) -> Vec<(Vec<Embedding>, u64)> {
        let weight = |degeneracy: u64| if rule.match_once { 1 } else { degeneracy };
        match assignment {
            Assignment::Separate(reactants) => {
                let per_pattern: Vec<Vec<EmbeddingClass>> = reactants
                    .iter()
                    .enumerate()
                    .map(|(p, &sp)| self.classes_of(rule, p, sp))
                    .collect();
                combinations(&per_pattern)
                    .into_iter()
                    .map(|combo| {
                        let w = combo.iter().map(|c| c.degeneracy).product();
                        (
                            combo.iter().map(|c| c.representative.clone()).collect(),
                            weight(w),
                        )
                    })
                    .collect()
            }
            Assignment::Within(s) => self
                .joint_classes_of(rule, *s)
                .into_iter()
                .map(|class| (class.representatives, weight(class.degeneracy)))
                .collect(),
        }
    }

    /// One rule step: all reactions of `rule` on one unordered reactant set,
    /// tried in each listed pattern-to-species assignment. Everything is
    /// built first and committed together, or not at all when a species or
    /// reaction bound would be crossed.
    fn step(
        &mut self,
        rule: &ReactionRule,
        assignments: &[Assignment],
        divisor: u64,
    ) -> Result<Option<LimitKind>, GenerateError> {
        let generator = self.generator;
        let mut staging = Staging::default();

        for assignment in assignments {
            let candidates = self.candidates(rule, assignment);
            let reactants = assignment.reactants();

            'candidate: for (embeddings, weight) in candidates {
                let embeddings: Vec<&Embedding> = embeddings.iter().collect();
                let products = match assignment {
                    Assignment::Separate(_) => {
                        let targets: Vec<&SpeciesGraph> =
                            reactants.iter().map(|&i| self.species.graph(i)).collect();
                        apply_rule(rule, &targets, &embeddings)
                    }
                    Assignment::Within(s) => {
                        apply_rule_within(rule, self.species.graph(*s), &embeddings)
                    }
                };
                for product in &products {
                    if let Some((kind, detail)) = generator.rejection(rule, product) {
                        log::debug!(
                            "rule '{}': rejected product {}: {detail}",
                            rule.name,
                            write_species(product)
                        );
                        if let Some(kind) = kind {
                            self.truncated.get_or_insert(kind);
                        }
                        continue 'candidate;
                    }
                }

                let indices: Vec<usize> = products
                    .into_iter()
                    .map(|product| {
                        let canonical = generator.canonicalizer.canonicalize(&product);
                        let graph = canonical.order.apply(&product);
                        staging.resolve(&self.species, canonical.key, graph)
                    })
                    .collect();

                let mut before = reactants.clone();
                let mut after = indices.clone();
                before.sort_unstable();
                after.sort_unstable();
                if before == after {
                    continue;
                }
                staging.add(reactants.clone(), indices, weight);
            }
        }

        if staging.reactions().is_empty() {
            return Ok(None);
        }
        let limits = &generator.limits;
        if limits
            .max_species
            .is_some_and(|max| self.species.len() + staging.new_species_count() > max)
        {
            return Ok(Some(LimitKind::MaxSpecies));
        }
        if limits
            .max_reactions
            .is_some_and(|max| self.reactions.len() + staging.reactions().len() > max)
        {
            return Ok(Some(LimitKind::MaxReactions));
        }

        let expression = rule.rate.expression();
        let mut built = Vec::with_capacity(staging.reactions().len());
        for staged in staging.reactions() {
            let bindings = Bindings {
                rule: &rule.name,
                reactants: &staged.reactants,
            };
            let value = generator
                .evaluator
                .evaluate(expression, &bindings)
                .map_err(|detail| GenerateError::RateLaw {
                    rule: rule.name.clone(),
                    expression: expression.to_string(),
                    reactants: staged.reactants.clone(),
                    detail,
                })?;
            let degeneracy = staged.weight as f64 / divisor as f64;
            built.push(Rxn {
                index: self.reactions.len() + built.len(),
                reactants: staged.reactants.clone(),
                products: staged.products.clone(),
                rate: if rule.total_rate { value } else { value * degeneracy },
                degeneracy,
                rate_law: expression.to_string(),
                rule: rule.index,
                rule_name: rule.name.clone(),
                occurrence: self.occurrences[rule.index] + built.len(),
            });
        }

        staging.commit_species(&mut self.species);
        self.occurrences[rule.index] += built.len();
        for rxn in built {
            log::trace!(
                "reaction {}: {:?} -> {:?} by '{}' (degeneracy {})",
                rxn.index,
                rxn.reactants,
                rxn.products,
                rxn.rule_name,
                rxn.degeneracy
            );
            self.reactions.push(rxn);
        }
        Ok(None)
    }

    fn finish(self, terminal: TerminalState, iterations: usize) -> Result<Network, GenerateError> {
        let partial = self.generator.limits.partial_return_on_limit;
        let network = Network {
            species: self.species.into_species(),
            reactions: self.reactions,
            terminal,
            iterations,
        };
        log::info!(
            "network generation finished: {} species, {} reactions, {} iterations, {:?}",
            network.species.len(),
            network.reactions.len(),
            iterations,
            terminal
        );
        match terminal {
            TerminalState::LimitReached(kind) if !kind.is_truncation() && !partial => {
                Err(GenerateError::LimitExceeded {
                    kind,
                    network: Box::new(network),
                })
            }
            _ => Ok(network),
        }
    }
}

/// Every choice of one class per reactant pattern, first pattern slowest.
fn combinations(lists: &[Vec<EmbeddingClass>]) -> Vec<Vec<&EmbeddingClass>> {
    lists.iter().fold(vec![Vec::new()], |acc, list| {
        acc.into_iter()
            .flat_map(|prefix| {
                list.iter().map(move |class| {
                    let mut next = prefix.clone();
                    next.push(class);
                    next
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse_species;
    use crate::rate::{ParameterTable, RateLaw};
    use crate::rule::RuleSpec;
    use crate::types::{ComponentType, MoleculeType};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            MoleculeType::new("A", vec![ComponentType::stateless("b")]),
            MoleculeType::new("B", vec![ComponentType::stateless("a")]),
        ])
        .unwrap()
    }

    fn binding_rules() -> RuleSet {
        let spec = RuleSpec::parse(
            "bind",
            &["A(b)", "B(a)"],
            &["A(b!1).B(a!1)"],
            RateLaw::elementary("kf"),
        )
        .unwrap()
        .reversible(RateLaw::elementary("kr"));
        RuleSet::new(&catalog(), vec![spec]).unwrap()
    }

    fn seeds(list: &[&str]) -> Vec<Seed> {
        list.iter()
            .map(|s| Seed::new(parse_species(s).unwrap()))
            .collect()
    }

    fn params() -> ParameterTable {
        ParameterTable::new().with("kf", 2.0).with("kr", 0.5)
    }

    #[test]
    fn rates_and_provenance() {
        let rules = binding_rules();
        let params = params();
        let net = NetworkGenerator::new(&rules, &params)
            .generate(&seeds(&["A(b)", "B(a)"]))
            .unwrap();
        assert_eq!(net.terminal, TerminalState::Exhausted);
        assert_eq!(net.reactions.len(), 2);
        let forward = &net.reactions[0];
        assert_eq!((forward.rule, forward.occurrence), (0, 0));
        assert_eq!(forward.rate, 2.0);
        assert_eq!(forward.rate_law, "kf");
        let reverse = &net.reactions[1];
        assert_eq!(reverse.rule_name, "bind_reverse");
        assert_eq!(reverse.rate, 0.5);
    }

    #[test]
    fn rejects_bad_seeds() {
        let rules = binding_rules();
        let params = params();
        let catalog = catalog();
        let generator = NetworkGenerator::new(&rules, &params).with_catalog(&catalog);
        let err = generator.generate(&seeds(&["A(b)", "A(b)"])).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidSeed { index: 1, .. }));
        let err = generator.generate(&seeds(&["A(b).B(a)"])).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidSeed { index: 0, .. }));
        let err = generator.generate(&seeds(&["C(x)"])).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidSeed { .. }));
    }

    #[test]
    fn species_limit_keeps_last_commit() {
        let rules = binding_rules();
        let params = params();
        let limits = Limits::unbounded().with_max_species(2);
        let generator = NetworkGenerator::new(&rules, &params).with_limits(limits.clone());
        match generator.generate(&seeds(&["A(b)", "B(a)"])) {
            Err(GenerateError::LimitExceeded { kind, network }) => {
                assert_eq!(kind, LimitKind::MaxSpecies);
                assert_eq!(network.species.len(), 2);
                assert!(network.reactions.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }

        let net = NetworkGenerator::new(&rules, &params)
            .with_limits(limits.with_partial_return(true))
            .generate(&seeds(&["A(b)", "B(a)"]))
            .unwrap();
        assert_eq!(net.terminal, TerminalState::LimitReached(LimitKind::MaxSpecies));
    }

    #[test]
    fn iteration_limit() {
        let rules = binding_rules();
        let params = params();
        let net = NetworkGenerator::new(&rules, &params)
            .with_limits(Limits::unbounded().with_max_iterations(1).with_partial_return(true))
            .generate(&seeds(&["A(b)", "B(a)"]))
            .unwrap();
        assert_eq!(net.terminal, TerminalState::LimitReached(LimitKind::MaxIterations));
        assert_eq!(net.iterations, 1);
        assert_eq!(net.species.len(), 3);
        assert_eq!(net.reactions.len(), 1);
    }

    #[test]
    fn cancellation_after_first_iteration() {
        let rules = binding_rules();
        let params = params();
        let mut seen = Vec::new();
        let net = NetworkGenerator::new(&rules, &params)
            .generate_with_progress(&seeds(&["A(b)", "B(a)"]), |p| {
                seen.push(p.iteration);
                ControlFlow::Break(())
            })
            .unwrap();
        assert_eq!(seen, vec![1]);
        assert_eq!(net.terminal, TerminalState::Cancelled);
        assert_eq!(net.reactions.len(), 1);
    }

    #[test]
    fn missing_parameter_is_an_error() {
        let rules = binding_rules();
        let params = ParameterTable::new().with("kf", 1.0);
        let err = NetworkGenerator::new(&rules, &params)
            .generate(&seeds(&["A(b)", "B(a)"]))
            .unwrap_err();
        match err {
            GenerateError::RateLaw { rule, expression, .. } => {
                assert_eq!(rule, "bind_reverse");
                assert_eq!(expression, "kr");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn combinations_cover_all_pairs() {
        let class = |d| EmbeddingClass {
            representative: Embedding {
                molecules: vec![0],
                components: vec![vec![0]],
            },
            degeneracy: d,
        };
        let lists = vec![vec![class(1), class(2)], vec![class(3)]];
        let combos = combinations(&lists);
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[1][0].degeneracy, 2);
        assert_eq!(combos[1][1].degeneracy, 3);
    }
}
