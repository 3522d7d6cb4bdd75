use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::complex::{Molecule, Pattern, SpeciesGraph, StateTest};
use crate::traits::HasName;

/// A named binding site of a molecule type and the internal states it may take.
///
/// An empty `states` list means the component is stateless. The first listed
/// state is the default given to freshly created molecules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentType {
    pub name: String,
    #[serde(default)]
    pub states: Vec<String>,
}

impl ComponentType {
    pub fn stateless(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
        }
    }

    pub fn with_states<S: Into<String>>(
        name: impl Into<String>,
        states: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            states: states.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    pub fn is_stateless(&self) -> bool {
        self.states.is_empty()
    }
}

/// A molecule type: an ordered list of component types. Component names may
/// repeat (`A(b,b)` has two equivalent `b` sites).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoleculeType {
    pub name: String,
    pub components: Vec<ComponentType>,
}

impl MoleculeType {
    pub fn new(name: impl Into<String>, components: Vec<ComponentType>) -> Self {
        Self {
            name: name.into(),
            components,
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentType> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn multiplicity(&self, name: &str) -> usize {
        self.components.iter().filter(|c| c.name == name).count()
    }

    pub fn default_state(&self, name: &str) -> Option<&str> {
        self.component(name)
            .and_then(|c| c.states.first())
            .map(String::as_str)
    }

    /// A fresh, unbound instance with every stateful component in its default state.
    pub fn instantiate(&self) -> Molecule<crate::complex::Component> {
        Molecule::new(
            self.name.clone(),
            self.components
                .iter()
                .map(|ct| crate::complex::Component {
                    name: ct.name.clone(),
                    state: ct.states.first().cloned(),
                })
                .collect(),
        )
    }
}

impl HasName for MoleculeType {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Reasons a species or pattern disagrees with the molecule-type catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Two molecule types share a name.
    DuplicateType(String),
    /// A molecule references a type the catalog does not define.
    UnknownType(String),
    /// A component name is not part of the molecule type.
    UnknownComponent { molecule: String, component: String },
    /// A component name appears more often than the type declares.
    TooManyComponents {
        molecule: String,
        component: String,
        max: usize,
    },
    /// A species molecule omits a component of its type.
    MissingComponent { molecule: String, component: String },
    /// A state outside the component's allowed set.
    InvalidState {
        molecule: String,
        component: String,
        state: String,
    },
    /// A stateful component of a species has no state.
    MissingState { molecule: String, component: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateType(name) => write!(f, "molecule type '{name}' defined twice"),
            Self::UnknownType(name) => write!(f, "unknown molecule type '{name}'"),
            Self::UnknownComponent {
                molecule,
                component,
            } => write!(f, "molecule type '{molecule}' has no component '{component}'"),
            Self::TooManyComponents {
                molecule,
                component,
                max,
            } => write!(
                f,
                "component '{component}' appears more than {max} time(s) in '{molecule}'"
            ),
            Self::MissingComponent {
                molecule,
                component,
            } => write!(f, "species molecule '{molecule}' is missing component '{component}'"),
            Self::InvalidState {
                molecule,
                component,
                state,
            } => write!(
                f,
                "state '{state}' is not allowed for component '{component}' of '{molecule}'"
            ),
            Self::MissingState {
                molecule,
                component,
            } => write!(
                f,
                "component '{component}' of species molecule '{molecule}' needs a state"
            ),
        }
    }
}

impl std::error::Error for CatalogError {}

/// The immutable molecule-type vocabulary of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MoleculeType>", into = "Vec<MoleculeType>")]
pub struct Catalog {
    types: Vec<MoleculeType>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(types: Vec<MoleculeType>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(types.len());
        for (i, t) in types.iter().enumerate() {
            if by_name.insert(t.name.clone(), i).is_some() {
                return Err(CatalogError::DuplicateType(t.name.clone()));
            }
        }
        Ok(Self { types, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&MoleculeType> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    pub fn types(&self) -> &[MoleculeType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn lookup<C>(&self, molecule: &Molecule<C>) -> Result<&MoleculeType, CatalogError> {
        self.get(&molecule.name)
            .ok_or_else(|| CatalogError::UnknownType(molecule.name.clone()))
    }

    /// Checks that every molecule of a species lists exactly the components
    /// of its type, each with an allowed state.
    pub fn validate_species(&self, graph: &SpeciesGraph) -> Result<(), CatalogError> {
        for mol in graph.molecules() {
            let mtype = self.lookup(mol)?;
            check_component_names(mtype, mol.components.iter().map(|c| c.name.as_str()))?;
            if mol.components.len() != mtype.components.len() {
                let missing = mtype
                    .components
                    .iter()
                    .find(|ct| {
                        mol.components.iter().filter(|c| c.name == ct.name).count()
                            < mtype.multiplicity(&ct.name)
                    })
                    .map(|ct| ct.name.clone())
                    .unwrap_or_default();
                return Err(CatalogError::MissingComponent {
                    molecule: mol.name.clone(),
                    component: missing,
                });
            }
            for c in &mol.components {
                let ct = mtype.component(&c.name).expect("component name checked above");
                match &c.state {
                    Some(state) if !ct.allows(state) => {
                        return Err(CatalogError::InvalidState {
                            molecule: mol.name.clone(),
                            component: c.name.clone(),
                            state: state.clone(),
                        })
                    }
                    None if !ct.is_stateless() => {
                        return Err(CatalogError::MissingState {
                            molecule: mol.name.clone(),
                            component: c.name.clone(),
                        })
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Checks that a pattern only names known types, components and states.
    /// Patterns may omit components.
    pub fn validate_pattern(&self, pattern: &Pattern) -> Result<(), CatalogError> {
        for mol in pattern.molecules() {
            let mtype = self.lookup(mol)?;
            check_component_names(mtype, mol.components.iter().map(|c| c.name.as_str()))?;
            for c in &mol.components {
                if let StateTest::Is(state) = &c.state {
                    let ct = mtype.component(&c.name).expect("component name checked above");
                    if !ct.allows(state) {
                        return Err(CatalogError::InvalidState {
                            molecule: mol.name.clone(),
                            component: c.name.clone(),
                            state: state.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_component_names<'a>(
    mtype: &MoleculeType,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for name in names {
        let max = mtype.multiplicity(name);
        if max == 0 {
            return Err(CatalogError::UnknownComponent {
                molecule: mtype.name.clone(),
                component: name.to_string(),
            });
        }
        let count = seen.entry(name).or_insert(0);
        *count += 1;
        if *count > max {
            return Err(CatalogError::TooManyComponents {
                molecule: mtype.name.clone(),
                component: name.to_string(),
                max,
            });
        }
    }
    Ok(())
}

impl TryFrom<Vec<MoleculeType>> for Catalog {
    type Error = CatalogError;

    fn try_from(types: Vec<MoleculeType>) -> Result<Self, Self::Error> {
        Self::new(types)
    }
}

impl From<Catalog> for Vec<MoleculeType> {
    fn from(catalog: Catalog) -> Self {
        catalog.types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::{parse_pattern, parse_species};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            MoleculeType::new(
                "A",
                vec![
                    ComponentType::stateless("b"),
                    ComponentType::stateless("b"),
                    ComponentType::with_states("s", ["U", "P"]),
                ],
            ),
            MoleculeType::new("B", vec![ComponentType::stateless("a")]),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_type_rejected() {
        let err = Catalog::new(vec![
            MoleculeType::new("A", vec![]),
            MoleculeType::new("A", vec![]),
        ])
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateType("A".into()));
    }

    #[test]
    fn complete_species_validates() {
        let s = parse_species("A(b!1,b,s~P).B(a!1)").unwrap();
        assert_eq!(catalog().validate_species(&s), Ok(()));
    }

    #[test]
    fn species_missing_component() {
        let s = parse_species("A(b,s~U)").unwrap();
        assert!(matches!(
            catalog().validate_species(&s),
            Err(CatalogError::MissingComponent { .. })
        ));
    }

    #[test]
    fn species_missing_state() {
        let s = parse_species("A(b,b,s)").unwrap();
        assert!(matches!(
            catalog().validate_species(&s),
            Err(CatalogError::MissingState { .. })
        ));
    }

    #[test]
    fn species_bad_state() {
        let s = parse_species("A(b,b,s~X)").unwrap();
        assert!(matches!(
            catalog().validate_species(&s),
            Err(CatalogError::InvalidState { .. })
        ));
    }

    #[test]
    fn pattern_may_omit_components() {
        let p = parse_pattern("A(s~P)").unwrap();
        assert_eq!(catalog().validate_pattern(&p), Ok(()));
        let p = parse_pattern("A(b,b,b)").unwrap();
        assert!(matches!(
            catalog().validate_pattern(&p),
            Err(CatalogError::TooManyComponents { max: 2, .. })
        ));
        let p = parse_pattern("C()").unwrap();
        assert_eq!(
            catalog().validate_pattern(&p),
            Err(CatalogError::UnknownType("C".into()))
        );
    }

    #[test]
    fn instantiate_uses_default_states() {
        let cat = catalog();
        let m = cat.get("A").unwrap().instantiate();
        assert_eq!(m.components.len(), 3);
        assert_eq!(m.components[2].state.as_deref(), Some("U"));
        assert_eq!(m.components[0].state, None);
    }

    #[test]
    fn catalog_json_round_trip() {
        let cat = catalog();
        let json = serde_json::to_string(&cat).unwrap();
        let back: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cat);
    }
}
