use serde::{Deserialize, Serialize};

use crate::complex::Pattern;
use crate::matcher::{find_all_embeddings, MatchOptions};
use crate::network::Network;
use crate::notation::{parse_pattern, NotationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservableKind {
    /// Counts every match of every pattern in a species.
    Molecules,
    /// Counts a species once if any pattern matches it.
    Species,
}

/// A named weighted sum over species, defined by patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    pub name: String,
    pub kind: ObservableKind,
    pub patterns: Vec<Pattern>,
}

impl Observable {
    pub fn new(name: impl Into<String>, kind: ObservableKind, patterns: Vec<Pattern>) -> Self {
        Self {
            name: name.into(),
            kind,
            patterns,
        }
    }

    pub fn parse(
        name: impl Into<String>,
        kind: ObservableKind,
        patterns: &[&str],
    ) -> Result<Self, NotationError> {
        let patterns = patterns
            .iter()
            .map(|p| parse_pattern(p))
            .collect::<Result<_, _>>()?;
        Ok(Self::new(name, kind, patterns))
    }

    /// `(species index, weight)` for every species with a non-zero weight,
    /// in species order.
    pub fn evaluate(&self, network: &Network) -> Vec<(usize, u64)> {
        let opts = MatchOptions {
            allow_extra_target_bonds: self.kind == ObservableKind::Molecules,
            ..MatchOptions::default()
        };
        network
            .species
            .iter()
            .filter_map(|species| {
                let weight = match self.kind {
                    ObservableKind::Molecules => self
                        .patterns
                        .iter()
                        .map(|p| find_all_embeddings(p, &species.graph, &opts).len() as u64)
                        .sum(),
                    ObservableKind::Species => self
                        .patterns
                        .iter()
                        .any(|p| !find_all_embeddings(p, &species.graph, &opts).is_empty())
                        as u64,
                };
                (weight > 0).then_some((species.index, weight))
            })
            .collect()
    }

    /// Sum of species populations times their weights.
    pub fn total(&self, network: &Network) -> f64 {
        self.evaluate(network)
            .into_iter()
            .map(|(i, w)| network.species[i].population * w as f64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Seed, Species, TerminalState};
    use crate::notation::parse_species;

    fn network(list: &[&str]) -> Network {
        Network {
            species: list
                .iter()
                .enumerate()
                .map(|(index, s)| {
                    let seed = Seed::new(parse_species(s).unwrap()).with_population(10.0);
                    Species {
                        index,
                        key: s.to_string(),
                        graph: seed.graph,
                        population: seed.population,
                    }
                })
                .collect(),
            reactions: Vec::new(),
            terminal: TerminalState::Exhausted,
            iterations: 0,
        }
    }

    #[test]
    fn molecules_count_every_match() {
        let net = network(&["A(b)", "A(b!1).A(b!1)", "B(a)"]);
        let obs = Observable::parse("Atot", ObservableKind::Molecules, &["A()"]).unwrap();
        assert_eq!(obs.evaluate(&net), vec![(0, 1), (1, 2)]);
        assert_eq!(obs.total(&net), 30.0);
    }

    #[test]
    fn species_count_once() {
        let net = network(&["A(b)", "A(b!1).A(b!1)", "B(a)"]);
        let obs =
            Observable::parse("withA", ObservableKind::Species, &["A()", "B()"]).unwrap();
        assert_eq!(obs.evaluate(&net), vec![(0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn bond_wildcards() {
        let net = network(&["A(b)", "A(b!1).A(b!1)"]);
        let bound = Observable::parse("bound", ObservableKind::Molecules, &["A(b!+)"]).unwrap();
        assert_eq!(bound.evaluate(&net), vec![(1, 2)]);
        let free = Observable::parse("free", ObservableKind::Species, &["A(b)"]).unwrap();
        assert_eq!(free.evaluate(&net), vec![(0, 1)]);
    }
}
