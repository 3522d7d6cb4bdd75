use std::fmt;

/// Errors produced when parsing a complex written in rule-language notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    /// The input string was empty or contained only whitespace.
    EmptyInput,
    /// An unexpected character was encountered at the given position.
    UnexpectedChar { pos: usize, ch: char },
    /// Input ended in the middle of a molecule or component.
    UnexpectedEnd,
    /// A bond label appeared only once.
    UnpairedBond { label: String },
    /// A bond label appeared more than twice.
    BondLabelReused { label: String },
    /// A species used a state or bond wildcard.
    WildcardInSpecies { pos: usize },
    /// Both ends of a bond label sit on the same component.
    SelfBond { label: String },
}

impl fmt::Display for NotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty complex string"),
            Self::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected character '{}' at position {}", ch, pos)
            }
            Self::UnexpectedEnd => write!(f, "unexpected end of complex string"),
            Self::UnpairedBond { label } => write!(f, "bond label !{} is never closed", label),
            Self::BondLabelReused { label } => {
                write!(f, "bond label !{} used more than twice", label)
            }
            Self::WildcardInSpecies { pos } => {
                write!(f, "wildcard at position {} is not allowed in a species", pos)
            }
            Self::SelfBond { label } => {
                write!(f, "bond label !{} joins a component to itself", label)
            }
        }
    }
}

impl std::error::Error for NotationError {}
