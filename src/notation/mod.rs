//! Text notation for species and patterns.
//!
//! A complex is a `.`-separated list of molecules, each written
//! `Name(comp~state!label,...)@compartment`. Patterns additionally accept
//! `~?` (any state), `!+` (bound to something), `!?` (bond unconstrained)
//! and `!=n` (exactly `n` bonds).

pub mod error;
mod parser;
mod writer;

use crate::complex::{BondTest, Component, ComponentPattern, Pattern, SpeciesGraph, StateTest};
pub use error::NotationError;
use parser::StateToken;
pub(crate) use writer::write_ordered;
pub use writer::write_complex;

pub fn parse_species(s: &str) -> Result<SpeciesGraph, NotationError> {
    let tokens = parser::tokenize(s)?;
    parser::build(tokens, |tok| {
        if let Some((_, pos)) = tok.wildcard {
            return Err(NotationError::WildcardInSpecies { pos });
        }
        let state = match &tok.state {
            None => None,
            Some((StateToken::Named(s), _)) => Some(s.clone()),
            Some((StateToken::Wildcard, pos)) => {
                return Err(NotationError::WildcardInSpecies { pos: *pos })
            }
        };
        Ok(Component {
            name: tok.name.clone(),
            state,
        })
    })
}

pub fn parse_pattern(s: &str) -> Result<Pattern, NotationError> {
    let tokens = parser::tokenize(s)?;
    parser::build(tokens, |tok| {
        Ok(ComponentPattern {
            name: tok.name.clone(),
            state: match &tok.state {
                Some((StateToken::Named(s), _)) => StateTest::Is(s.clone()),
                _ => StateTest::Any,
            },
            bonds: tok
                .wildcard
                .map(|(test, _)| test)
                .unwrap_or(BondTest::Specified),
        })
    })
}

pub fn write_species(graph: &SpeciesGraph) -> String {
    write_complex(graph)
}

pub fn write_pattern(pattern: &Pattern) -> String {
    write_complex(pattern)
}
