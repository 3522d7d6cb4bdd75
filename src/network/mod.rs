//! Network generation: the closure of a rule set over seed species.
//!
//! [`generate`] and [`NetworkGenerator`] drive the closure; the result is a
//! [`Network`] of species numbered in discovery order and the reactions
//! between them.

pub mod error;
mod generator;
pub mod limits;
mod registry;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::complex::SpeciesGraph;

pub use error::GenerateError;
pub use generator::{generate, NetworkGenerator};
pub use limits::{LimitKind, Limits};

/// A species handed to the generator before the closure starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub graph: SpeciesGraph,
    #[serde(default)]
    pub population: f64,
}

impl Seed {
    pub fn new(graph: SpeciesGraph) -> Self {
        Self {
            graph,
            population: 0.0,
        }
    }

    pub fn with_population(mut self, population: f64) -> Self {
        self.population = population;
        self
    }
}

impl From<SpeciesGraph> for Seed {
    fn from(graph: SpeciesGraph) -> Self {
        Self::new(graph)
    }
}

/// A registered species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Position in discovery order, stable for the run.
    pub index: usize,
    /// Canonical string; parses back into an isomorphic graph.
    pub key: String,
    /// The complex, molecules and components in canonical order.
    pub graph: SpeciesGraph,
    /// Initial amount, copied from the seed; zero for discovered species.
    pub population: f64,
}

/// One concrete reaction of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rxn {
    pub index: usize,
    pub reactants: Vec<usize>,
    pub products: Vec<usize>,
    /// Evaluated rate law times `degeneracy`, or the rate law alone for a
    /// total-rate rule.
    pub rate: f64,
    /// Statistical multiplier: embedding tuples over rule automorphisms.
    pub degeneracy: f64,
    pub rate_law: String,
    pub rule: usize,
    pub rule_name: String,
    /// Running count of reactions produced by this rule, starting at 0.
    pub occurrence: usize,
}

/// How a generation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalState {
    /// No unprocessed species remain.
    Exhausted,
    LimitReached(LimitKind),
    /// The progress callback asked to stop.
    Cancelled,
}

/// Snapshot handed to the progress callback after every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub iteration: usize,
    pub species: usize,
    pub reactions: usize,
    pub processed: usize,
    pub elapsed: Duration,
}

/// The generated species and reactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub species: Vec<Species>,
    pub reactions: Vec<Rxn>,
    pub terminal: TerminalState,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub species: usize,
    pub reactions: usize,
    pub iterations: usize,
    pub terminal: TerminalState,
}

impl Network {
    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            species: self.species.len(),
            reactions: self.reactions.len(),
            iterations: self.iterations,
            terminal: self.terminal,
        }
    }

    pub fn species_by_key(&self, key: &str) -> Option<&Species> {
        self.species.iter().find(|s| s.key == key)
    }

    /// Looks a species up by any rendering of its complex. Uses reference
    /// backend keys.
    pub fn find_species(&self, graph: &SpeciesGraph) -> Option<&Species> {
        self.species_by_key(&crate::canonical::canonical_string(graph))
    }

    pub fn reactions_of_rule<'a>(
        &'a self,
        rule_name: &'a str,
    ) -> impl Iterator<Item = &'a Rxn> + 'a {
        self.reactions.iter().filter(move |r| r.rule_name == rule_name)
    }

    pub fn is_complete(&self) -> bool {
        self.terminal == TerminalState::Exhausted
    }
}
