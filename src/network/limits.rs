use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::complex::SpeciesGraph;

/// The resource bound that stopped or truncated a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitKind {
    MaxSpecies,
    MaxReactions,
    MaxIterations,
    MaxAgg,
    MaxStoich,
}

impl LimitKind {
    /// Whether hitting this bound drops individual products while the
    /// closure keeps running, rather than stopping it.
    pub fn is_truncation(self) -> bool {
        matches!(self, Self::MaxAgg | Self::MaxStoich)
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MaxSpecies => "maxSpecies",
            Self::MaxReactions => "maxReactions",
            Self::MaxIterations => "maxIterations",
            Self::MaxAgg => "maxAgg",
            Self::MaxStoich => "maxStoich",
        };
        f.write_str(name)
    }
}

/// Resource bounds of one generation run. Every bound is off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_species: Option<usize>,
    pub max_reactions: Option<usize>,
    pub max_iterations: Option<usize>,
    /// Largest number of molecules in one product complex.
    pub max_agg: Option<usize>,
    /// Largest number of molecules of a type in one product complex.
    pub max_stoich: BTreeMap<String, usize>,
    /// Return the network built so far instead of an error when a species,
    /// reaction or iteration bound is hit.
    pub partial_return_on_limit: bool,
}

impl Limits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_species(mut self, n: usize) -> Self {
        self.max_species = Some(n);
        self
    }

    pub fn with_max_reactions(mut self, n: usize) -> Self {
        self.max_reactions = Some(n);
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    pub fn with_max_agg(mut self, n: usize) -> Self {
        self.max_agg = Some(n);
        self
    }

    pub fn with_max_stoich(mut self, molecule: impl Into<String>, n: usize) -> Self {
        self.max_stoich.insert(molecule.into(), n);
        self
    }

    pub fn with_partial_return(mut self, partial: bool) -> Self {
        self.partial_return_on_limit = partial;
        self
    }

    /// The size bound a product complex breaks, if any. `rule_caps` are
    /// per-rule stoichiometry caps checked alongside the global ones.
    pub(crate) fn violation(
        &self,
        product: &SpeciesGraph,
        rule_caps: &BTreeMap<String, usize>,
    ) -> Option<(LimitKind, String)> {
        if let Some(max) = self.max_agg {
            if product.molecule_count() > max {
                return Some((
                    LimitKind::MaxAgg,
                    format!("{} molecules exceed maxAgg {max}", product.molecule_count()),
                ));
            }
        }
        self.max_stoich
            .iter()
            .chain(rule_caps)
            .find(|(name, &cap)| product.count_of(name) > cap)
            .map(|(name, cap)| {
                (
                    LimitKind::MaxStoich,
                    format!("{} copies of {name} exceed cap {cap}", product.count_of(name)),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse_species;

    #[test]
    fn defaults_are_unbounded() {
        let limits: Limits = serde_json::from_str("{}").unwrap();
        assert_eq!(limits, Limits::unbounded());
        assert!(!limits.partial_return_on_limit);
    }

    #[test]
    fn from_json() {
        let limits: Limits = serde_json::from_str(
            r#"{
                "max_agg": 3,
                "max_stoich": {"A": 2},
                "partial_return_on_limit": true
            }"#,
        )
        .unwrap();
        assert_eq!(
            limits,
            Limits::unbounded()
                .with_max_agg(3)
                .with_max_stoich("A", 2)
                .with_partial_return(true)
        );
    }

    #[test]
    fn product_violations() {
        let g = parse_species("A(b!1).A(b!1,c!2).B(a!2)").unwrap();
        let none = BTreeMap::new();
        assert_eq!(Limits::unbounded().violation(&g, &none), None);
        assert_eq!(
            Limits::unbounded().with_max_agg(2).violation(&g, &none).map(|v| v.0),
            Some(LimitKind::MaxAgg)
        );
        assert_eq!(
            Limits::unbounded().with_max_stoich("A", 1).violation(&g, &none).map(|v| v.0),
            Some(LimitKind::MaxStoich)
        );
        let rule_caps = BTreeMap::from([("B".to_string(), 0)]);
        assert_eq!(
            Limits::unbounded().violation(&g, &rule_caps).map(|v| v.0),
            Some(LimitKind::MaxStoich)
        );
    }

    #[test]
    fn names() {
        assert_eq!(LimitKind::MaxAgg.to_string(), "maxAgg");
        assert!(LimitKind::MaxStoich.is_truncation());
        assert!(!LimitKind::MaxSpecies.is_truncation());
    }
}
