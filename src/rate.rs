use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rate-law reference carried by a rule. The expression text is opaque to
/// network generation and only handed to a [`RateEvaluator`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLaw {
    /// Mass-action rate constant.
    Elementary(String),
}

impl RateLaw {
    pub fn elementary(expression: impl Into<String>) -> Self {
        Self::Elementary(expression.into())
    }

    pub fn expression(&self) -> &str {
        match self {
            Self::Elementary(e) => e,
        }
    }
}

/// What a rate expression may refer to when a reaction is created.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub rule: &'a str,
    pub reactants: &'a [usize],
}

/// Evaluates rate expressions into numbers.
pub trait RateEvaluator {
    fn evaluate(&self, expression: &str, bindings: &Bindings<'_>) -> Result<f64, String>;
}

impl<F> RateEvaluator for F
where
    F: Fn(&str, &Bindings<'_>) -> Result<f64, String>,
{
    fn evaluate(&self, expression: &str, bindings: &Bindings<'_>) -> Result<f64, String> {
        self(expression, bindings)
    }
}

/// Resolves numeric literals and named parameters. Anything else is an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTable {
    values: BTreeMap<String, f64>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

impl RateEvaluator for ParameterTable {
    fn evaluate(&self, expression: &str, _bindings: &Bindings<'_>) -> Result<f64, String> {
        let expr = expression.trim();
        if let Ok(v) = expr.parse::<f64>() {
            return Ok(v);
        }
        self.get(expr)
            .ok_or_else(|| format!("unknown parameter '{expr}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_BINDINGS: Bindings<'static> = Bindings {
        rule: "r",
        reactants: &[],
    };

    #[test]
    fn literal_and_named() {
        let table = ParameterTable::new().with("kf", 2.5);
        assert_eq!(table.evaluate("kf", &NO_BINDINGS), Ok(2.5));
        assert_eq!(table.evaluate(" 1e-3 ", &NO_BINDINGS), Ok(1e-3));
        assert!(table.evaluate("kf*2", &NO_BINDINGS).is_err());
    }

    #[test]
    fn closure_evaluator_sees_bindings() {
        let eval =
            |_: &str, b: &Bindings<'_>| -> Result<f64, String> { Ok(b.reactants.len() as f64) };
        let b = Bindings {
            rule: "bind",
            reactants: &[0, 3],
        };
        assert_eq!(eval.evaluate("k", &b), Ok(2.0));
    }

    #[test]
    fn table_from_json() {
        let table: ParameterTable = serde_json::from_str(r#"{"k1": 1.0, "k2": 0.5}"#).unwrap();
        assert_eq!(table.get("k2"), Some(0.5));
    }
}
