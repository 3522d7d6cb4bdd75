use std::collections::HashMap;

use super::Species;
use crate::complex::SpeciesGraph;

/// Species of one generation run, indexed by canonical key.
#[derive(Debug, Default)]
pub(crate) struct SpeciesRegistry {
    species: Vec<Species>,
    by_key: HashMap<String, usize>,
}

impl SpeciesRegistry {
    pub fn lookup(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    /// Registers a species under a key not seen before.
    ///
    /// # Panics
    ///
    /// Panics if `key` is already registered.
    pub fn insert(&mut self, key: String, graph: SpeciesGraph, population: f64) -> usize {
        let index = self.species.len();
        let previous = self.by_key.insert(key.clone(), index);
        assert!(previous.is_none(), "species '{key}' registered twice");
        self.species.push(Species {
            index,
            key,
            graph,
            population,
        });
        index
    }

    pub fn graph(&self, index: usize) -> &SpeciesGraph {
        &self.species[index].graph
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn into_species(self) -> Vec<Species> {
        self.species
    }
}

/// Products and reactions of one rule step, held back until the whole step
/// has been built.
#[derive(Debug, Default)]
pub(crate) struct Staging {
    new_species: Vec<(String, SpeciesGraph)>,
    staged_keys: HashMap<String, usize>,
    reactions: Vec<StagedRxn>,
    by_channel: HashMap<(Vec<usize>, Vec<usize>), usize>,
}

#[derive(Debug)]
pub(crate) struct StagedRxn {
    pub reactants: Vec<usize>,
    pub products: Vec<usize>,
    pub weight: u64,
}

impl Staging {
    /// Index the species will carry once committed: an existing index, or
    /// the next free one after the registry and earlier staged species.
    pub fn resolve(
        &mut self,
        registry: &SpeciesRegistry,
        key: String,
        graph: SpeciesGraph,
    ) -> usize {
        if let Some(i) = registry.lookup(&key) {
            return i;
        }
        if let Some(&i) = self.staged_keys.get(&key) {
            return registry.len() + i;
        }
        let i = self.new_species.len();
        self.staged_keys.insert(key.clone(), i);
        self.new_species.push((key, graph));
        registry.len() + i
    }

    /// Adds `weight` embedding tuples to the channel `reactants -> products`,
    /// merging with an equal channel staged earlier.
    pub fn add(&mut self, reactants: Vec<usize>, products: Vec<usize>, weight: u64) {
        let mut r = reactants.clone();
        let mut p = products.clone();
        r.sort_unstable();
        p.sort_unstable();
        match self.by_channel.get(&(r.clone(), p.clone())) {
            Some(&i) => self.reactions[i].weight += weight,
            None => {
                self.by_channel.insert((r, p), self.reactions.len());
                self.reactions.push(StagedRxn {
                    reactants,
                    products,
                    weight,
                });
            }
        }
    }

    pub fn new_species_count(&self) -> usize {
        self.new_species.len()
    }

    pub fn reactions(&self) -> &[StagedRxn] {
        &self.reactions
    }

    pub fn commit_species(self, registry: &mut SpeciesRegistry) {
        for (key, graph) in self.new_species {
            registry.insert(key, graph, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse_species;

    #[test]
    fn staged_indices_follow_registry() {
        let mut registry = SpeciesRegistry::default();
        registry.insert("A(b)".into(), parse_species("A(b)").unwrap(), 1.0);
        let mut staging = Staging::default();
        let g = parse_species("B(a)").unwrap();
        assert_eq!(staging.resolve(&registry, "A(b)".into(), g.clone()), 0);
        assert_eq!(staging.resolve(&registry, "B(a)".into(), g.clone()), 1);
        assert_eq!(staging.resolve(&registry, "B(a)".into(), g), 1);
        assert_eq!(staging.new_species_count(), 1);
        staging.commit_species(&mut registry);
        assert_eq!(registry.lookup("B(a)"), Some(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn channels_merge_regardless_of_order() {
        let mut staging = Staging::default();
        staging.add(vec![1, 0], vec![2], 1);
        staging.add(vec![0, 1], vec![2], 2);
        staging.add(vec![0, 1], vec![3], 1);
        assert_eq!(staging.reactions().len(), 2);
        assert_eq!(staging.reactions()[0].weight, 3);
        assert_eq!(staging.reactions()[0].reactants, vec![1, 0]);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_key_panics() {
        let mut registry = SpeciesRegistry::default();
        let g = parse_species("A(b)").unwrap();
        registry.insert("A(b)".into(), g.clone(), 0.0);
        registry.insert("A(b)".into(), g, 0.0);
    }
}
