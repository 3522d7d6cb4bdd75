use std::fmt;

use super::{LimitKind, Network};
use crate::rule::RuleError;

/// Error returned by network generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateError {
    /// A rule could not be registered.
    Rule(RuleError),
    /// A seed species is empty, disconnected, or disagrees with the catalog
    /// or compartment topology.
    InvalidSeed {
        index: usize,
        species: String,
        detail: String,
    },
    /// The rate evaluator rejected a rule's rate expression.
    RateLaw {
        rule: String,
        expression: String,
        reactants: Vec<usize>,
        detail: String,
    },
    /// A species, reaction or iteration bound was hit. Carries the network
    /// as it stood after the last committed step.
    LimitExceeded {
        kind: LimitKind,
        network: Box<Network>,
    },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(e) => write!(f, "{e}"),
            Self::InvalidSeed {
                index,
                species,
                detail,
            } => write!(f, "invalid seed species {index} '{species}': {detail}"),
            Self::RateLaw {
                rule,
                expression,
                reactants,
                detail,
            } => write!(
                f,
                "rule '{}': cannot evaluate rate '{}' for reactants {:?}: {}",
                rule, expression, reactants, detail
            ),
            Self::LimitExceeded { kind, network } => write!(
                f,
                "generation stopped by {kind} with {} species and {} reactions",
                network.species.len(),
                network.reactions.len()
            ),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rule(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RuleError> for GenerateError {
    fn from(e: RuleError) -> Self {
        Self::Rule(e)
    }
}
