use std::fmt;

/// Error returned when a rule cannot be registered.
///
/// Every variant names the rule and renders the offending rule text so the
/// problem can be located without the original model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The rule references a molecule, component or type that does not exist,
    /// or asks for a transformation the flags do not permit.
    Structural {
        rule: String,
        pattern: String,
        detail: String,
    },
    /// The rule is well formed, but which target component a product
    /// component stands for cannot be determined.
    MatchingAmbiguity {
        rule: String,
        pattern: String,
        detail: String,
    },
}

impl RuleError {
    pub fn rule(&self) -> &str {
        match self {
            Self::Structural { rule, .. } | Self::MatchingAmbiguity { rule, .. } => rule,
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural {
                rule,
                pattern,
                detail,
            } => write!(f, "malformed rule '{rule}' ({pattern}): {detail}"),
            Self::MatchingAmbiguity {
                rule,
                pattern,
                detail,
            } => write!(f, "ambiguous rule '{rule}' ({pattern}): {detail}"),
        }
    }
}

impl std::error::Error for RuleError {}
