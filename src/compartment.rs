use std::fmt;

use serde::{Deserialize, Serialize};

use crate::complex::ComplexGraph;

/// A named reaction volume (dimension 3) or membrane surface (dimension 2).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compartment {
    pub name: String,
    pub dimension: u8,
    #[serde(default)]
    pub outside: Option<String>,
}

impl Compartment {
    pub fn volume(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: 3,
            outside: None,
        }
    }

    pub fn surface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: 2,
            outside: None,
        }
    }

    pub fn inside(mut self, outside: impl Into<String>) -> Self {
        self.outside = Some(outside.into());
        self
    }

    pub fn is_surface(&self) -> bool {
        self.dimension == 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompartmentError {
    Duplicate(String),
    BadDimension { name: String, dimension: u8 },
    UnknownOutside { name: String, outside: String },
    /// A surface must be enclosed by a volume and a volume by a surface.
    SameDimensionNesting { name: String, outside: String },
}

impl fmt::Display for CompartmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(name) => write!(f, "compartment '{name}' defined twice"),
            Self::BadDimension { name, dimension } => {
                write!(f, "compartment '{name}' has dimension {dimension}, expected 2 or 3")
            }
            Self::UnknownOutside { name, outside } => {
                write!(f, "compartment '{name}' lies inside unknown compartment '{outside}'")
            }
            Self::SameDimensionNesting { name, outside } => write!(
                f,
                "compartment '{name}' and its outside '{outside}' have the same dimension"
            ),
        }
    }
}

impl std::error::Error for CompartmentError {}

/// Compartment topology of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Compartment>", into = "Vec<Compartment>")]
pub struct Compartments {
    list: Vec<Compartment>,
}

impl Compartments {
    pub fn new(list: Vec<Compartment>) -> Result<Self, CompartmentError> {
        for (i, c) in list.iter().enumerate() {
            if list[..i].iter().any(|o| o.name == c.name) {
                return Err(CompartmentError::Duplicate(c.name.clone()));
            }
            if c.dimension != 2 && c.dimension != 3 {
                return Err(CompartmentError::BadDimension {
                    name: c.name.clone(),
                    dimension: c.dimension,
                });
            }
        }
        for c in &list {
            if let Some(outside) = &c.outside {
                let parent = list.iter().find(|o| &o.name == outside).ok_or_else(|| {
                    CompartmentError::UnknownOutside {
                        name: c.name.clone(),
                        outside: outside.clone(),
                    }
                })?;
                if parent.dimension == c.dimension {
                    return Err(CompartmentError::SameDimensionNesting {
                        name: c.name.clone(),
                        outside: outside.clone(),
                    });
                }
            }
        }
        Ok(Self { list })
    }

    pub fn get(&self, name: &str) -> Option<&Compartment> {
        self.list.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Compartment> {
        self.list.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Whether molecules in `a` and `b` may be bonded: the same compartment,
    /// or a surface and a volume directly next to it.
    pub fn adjacent(&self, a: &str, b: &str) -> bool {
        if a == b {
            return self.get(a).is_some();
        }
        let (Some(ca), Some(cb)) = (self.get(a), self.get(b)) else {
            return false;
        };
        if ca.dimension == cb.dimension {
            return false;
        }
        ca.outside.as_deref() == Some(b) || cb.outside.as_deref() == Some(a)
    }

    /// The first bond of `graph` that crosses a compartment boundary it may
    /// not cross, rendered for diagnostics.
    pub fn find_violation<C>(&self, graph: &ComplexGraph<C>) -> Option<String> {
        for mol in graph.molecules() {
            if let Some(c) = &mol.compartment {
                if self.get(c).is_none() {
                    return Some(format!("molecule {} in unknown compartment '{c}'", mol.name));
                }
            }
        }
        graph.bonds().iter().find_map(|bond| {
            let (x, y) = bond.endpoints();
            let (mx, my) = (graph.molecule(x.molecule), graph.molecule(y.molecule));
            match (&mx.compartment, &my.compartment) {
                (Some(a), Some(b)) if !self.adjacent(a, b) => Some(format!(
                    "bond between {}@{a} and {}@{b} crosses non-adjacent compartments",
                    mx.name, my.name
                )),
                _ => None,
            }
        })
    }
}

impl TryFrom<Vec<Compartment>> for Compartments {
    type Error = CompartmentError;

    fn try_from(list: Vec<Compartment>) -> Result<Self, Self::Error> {
        Self::new(list)
    }
}

impl From<Compartments> for Vec<Compartment> {
    fn from(c: Compartments) -> Self {
        c.list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse_species;

    fn cell() -> Compartments {
        Compartments::new(vec![
            Compartment::volume("EC"),
            Compartment::surface("PM").inside("EC"),
            Compartment::volume("CP").inside("PM"),
        ])
        .unwrap()
    }

    #[test]
    fn adjacency() {
        let c = cell();
        assert!(c.adjacent("PM", "EC"));
        assert!(c.adjacent("CP", "PM"));
        assert!(!c.adjacent("CP", "EC"));
        assert!(c.adjacent("CP", "CP"));
        assert!(!c.adjacent("CP", "nowhere"));
    }

    #[test]
    fn rejects_bad_topology() {
        assert_eq!(
            Compartments::new(vec![Compartment::volume("A"), Compartment::volume("A")]),
            Err(CompartmentError::Duplicate("A".into()))
        );
        assert!(matches!(
            Compartments::new(vec![Compartment::volume("A").inside("B")]),
            Err(CompartmentError::UnknownOutside { .. })
        ));
        assert!(matches!(
            Compartments::new(vec![
                Compartment::volume("A"),
                Compartment::volume("B").inside("A")
            ]),
            Err(CompartmentError::SameDimensionNesting { .. })
        ));
    }

    #[test]
    fn bond_violations() {
        let c = cell();
        let ok = parse_species("L(r!1)@EC.R(l!1)@PM").unwrap();
        assert_eq!(c.find_violation(&ok), None);
        let bad = parse_species("L(r!1)@EC.R(l!1)@CP").unwrap();
        assert!(c.find_violation(&bad).is_some());
    }

    #[test]
    fn json_round_trip() {
        let c = cell();
        let json = serde_json::to_string(&c).unwrap();
        let back: Compartments = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
