use serde::{Deserialize, Serialize};

use crate::traits::{HasName, HasState, WriteLabel};

/// Address of one component inside a [`ComplexGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Site {
    pub molecule: usize,
    pub component: usize,
}

impl Site {
    pub fn new(molecule: usize, component: usize) -> Self {
        Self {
            molecule,
            component,
        }
    }
}

/// An undirected bond between two component sites. Endpoints are stored
/// sorted so that `Bond::new(a, b) == Bond::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bond {
    a: Site,
    b: Site,
}

impl Bond {
    pub fn new(x: Site, y: Site) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn endpoints(&self) -> (Site, Site) {
        (self.a, self.b)
    }

    pub fn touches(&self, site: Site) -> bool {
        self.a == site || self.b == site
    }

    pub fn other(&self, site: Site) -> Option<Site> {
        if self.a == site {
            Some(self.b)
        } else if self.b == site {
            Some(self.a)
        } else {
            None
        }
    }
}

/// A concrete component of a species: a name and an optional internal state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub state: Option<String>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: None,
        }
    }

    pub fn with_state(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Some(state.into()),
        }
    }
}

impl HasName for Component {
    fn name(&self) -> &str {
        &self.name
    }
}

impl HasState for Component {
    fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }
}

impl WriteLabel for Component {
    fn write_label(&self, out: &mut String) {
        out.push_str(&self.name);
        if let Some(state) = &self.state {
            out.push('~');
            out.push_str(state);
        }
    }
}

/// State constraint of a pattern component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StateTest {
    /// Matches any state (`b`, or `b~?`).
    #[default]
    Any,
    /// Matches exactly this state (`b~P`).
    Is(String),
}

/// Bond constraint of a pattern component, on top of the explicit bonds the
/// pattern draws at the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondTest {
    /// The site carries exactly the explicit bonds of the pattern; with none
    /// drawn the site must be free.
    #[default]
    Specified,
    /// `!?`: any number of extra bonds.
    Any,
    /// `!+`: at least one bond beyond the explicit ones, partner unspecified.
    Bound,
    /// `!=n`: exactly `n` bonds in total.
    Exactly(usize),
}

impl BondTest {
    pub fn is_wildcard(&self) -> bool {
        !matches!(self, BondTest::Specified)
    }
}

/// A pattern-side component carrying state and bond wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentPattern {
    pub name: String,
    pub state: StateTest,
    pub bonds: BondTest,
}

impl ComponentPattern {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StateTest::Any,
            bonds: BondTest::Specified,
        }
    }

    pub fn with_state(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StateTest::Is(state.into()),
            bonds: BondTest::Specified,
        }
    }
}

impl HasName for ComponentPattern {
    fn name(&self) -> &str {
        &self.name
    }
}

impl WriteLabel for ComponentPattern {
    fn write_label(&self, out: &mut String) {
        out.push_str(&self.name);
        if let StateTest::Is(state) = &self.state {
            out.push('~');
            out.push_str(state);
        }
    }

    fn write_wildcard(&self, out: &mut String) {
        match self.bonds {
            BondTest::Specified => {}
            BondTest::Any => out.push_str("!?"),
            BondTest::Bound => out.push_str("!+"),
            BondTest::Exactly(n) => {
                out.push_str("!=");
                out.push_str(&n.to_string());
            }
        }
    }
}

impl From<&Component> for ComponentPattern {
    fn from(c: &Component) -> Self {
        Self {
            name: c.name.clone(),
            state: match &c.state {
                Some(s) => StateTest::Is(s.clone()),
                None => StateTest::Any,
            },
            bonds: BondTest::Specified,
        }
    }
}

/// One molecule instance: its type name, owned components and compartment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Molecule<C> {
    pub name: String,
    pub components: Vec<C>,
    pub compartment: Option<String>,
}

impl<C> Molecule<C> {
    pub fn new(name: impl Into<String>, components: Vec<C>) -> Self {
        Self {
            name: name.into(),
            components,
            compartment: None,
        }
    }

    pub fn in_compartment(mut self, compartment: impl Into<String>) -> Self {
        self.compartment = Some(compartment.into());
        self
    }
}

impl<C> HasName for Molecule<C> {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Arena of molecules plus an edge list of bonds between their components.
///
/// Molecules, components and bonds are addressed by stable integer indices;
/// bonds never hold references, so a graph is trivially cloneable and free of
/// ownership cycles. The same structure serves species (`C = Component`) and
/// patterns (`C = ComponentPattern`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexGraph<C> {
    molecules: Vec<Molecule<C>>,
    bonds: Vec<Bond>,
}

pub type SpeciesGraph = ComplexGraph<Component>;
pub type Pattern = ComplexGraph<ComponentPattern>;

impl<C> ComplexGraph<C> {
    pub fn new() -> Self {
        Self {
            molecules: Vec::new(),
            bonds: Vec::new(),
        }
    }

    pub fn molecules(&self) -> &[Molecule<C>] {
        &self.molecules
    }

    pub fn molecule(&self, idx: usize) -> &Molecule<C> {
        &self.molecules[idx]
    }

    pub fn molecule_mut(&mut self, idx: usize) -> &mut Molecule<C> {
        &mut self.molecules[idx]
    }

    pub fn component(&self, site: Site) -> &C {
        &self.molecules[site.molecule].components[site.component]
    }

    pub fn component_mut(&mut self, site: Site) -> &mut C {
        &mut self.molecules[site.molecule].components[site.component]
    }

    pub fn add_molecule(&mut self, molecule: Molecule<C>) -> usize {
        self.molecules.push(molecule);
        self.molecules.len() - 1
    }

    pub fn contains_site(&self, site: Site) -> bool {
        site.molecule < self.molecules.len()
            && site.component < self.molecules[site.molecule].components.len()
    }

    /// Adds a bond between two existing, distinct sites.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint does not reference an existing component or
    /// if both endpoints are the same site.
    pub fn add_bond(&mut self, a: Site, b: Site) -> usize {
        assert!(
            self.contains_site(a) && self.contains_site(b),
            "bond endpoint must reference an existing component: {a:?} - {b:?}"
        );
        assert_ne!(a, b, "a component cannot bond to itself");
        self.bonds.push(Bond::new(a, b));
        self.bonds.len() - 1
    }

    pub fn remove_bond(&mut self, idx: usize) -> Bond {
        self.bonds.remove(idx)
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn bond(&self, idx: usize) -> Bond {
        self.bonds[idx]
    }

    pub fn molecule_count(&self) -> usize {
        self.molecules.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn component_count(&self) -> usize {
        self.molecules.iter().map(|m| m.components.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    pub fn sites(&self) -> impl Iterator<Item = Site> + '_ {
        self.molecules.iter().enumerate().flat_map(|(m, mol)| {
            (0..mol.components.len()).map(move |c| Site::new(m, c))
        })
    }

    /// Bond indices and partner sites of every bond touching `site`.
    pub fn bonds_at(&self, site: Site) -> impl Iterator<Item = (usize, Site)> + '_ {
        self.bonds
            .iter()
            .enumerate()
            .filter_map(move |(i, b)| b.other(site).map(|o| (i, o)))
    }

    pub fn degree(&self, site: Site) -> usize {
        self.bonds.iter().filter(|b| b.touches(site)).count()
    }

    /// Number of parallel bonds joining `a` and `b`.
    pub fn bond_multiplicity(&self, a: Site, b: Site) -> usize {
        let key = Bond::new(a, b);
        self.bonds.iter().filter(|&&bd| bd == key).count()
    }

    pub fn bond_between(&self, a: Site, b: Site) -> Option<usize> {
        let key = Bond::new(a, b);
        self.bonds.iter().position(|&bd| bd == key)
    }

    /// Molecules bonded to molecule `idx`, in bond order, possibly repeated.
    pub fn molecule_neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.bonds.iter().filter_map(move |b| {
            let (x, y) = b.endpoints();
            if x.molecule == idx && y.molecule != idx {
                Some(y.molecule)
            } else if y.molecule == idx && x.molecule != idx {
                Some(x.molecule)
            } else {
                None
            }
        })
    }

    /// Count of molecules of the named type.
    pub fn count_of(&self, name: &str) -> usize {
        self.molecules.iter().filter(|m| m.name == name).count()
    }
}

impl<C> Default for ComplexGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone> ComplexGraph<C> {
    /// Appends a copy of `other`, returning the molecule offset it was placed at.
    pub fn append(&mut self, other: &ComplexGraph<C>) -> usize {
        let offset = self.molecules.len();
        self.molecules.extend(other.molecules.iter().cloned());
        for bond in &other.bonds {
            let (a, b) = bond.endpoints();
            self.bonds.push(Bond::new(
                Site::new(a.molecule + offset, a.component),
                Site::new(b.molecule + offset, b.component),
            ));
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monomer(name: &str, sites: &[&str]) -> Molecule<Component> {
        Molecule::new(name, sites.iter().map(|s| Component::new(*s)).collect())
    }

    #[test]
    fn bond_is_unordered() {
        let a = Site::new(0, 1);
        let b = Site::new(1, 0);
        assert_eq!(Bond::new(a, b), Bond::new(b, a));
        assert_eq!(Bond::new(a, b).other(a), Some(b));
        assert_eq!(Bond::new(a, b).other(Site::new(2, 0)), None);
    }

    #[test]
    fn degree_and_multiplicity() {
        let mut g = SpeciesGraph::new();
        let a = g.add_molecule(monomer("A", &["b", "b"]));
        let b = g.add_molecule(monomer("B", &["a"]));
        g.add_bond(Site::new(a, 0), Site::new(b, 0));
        g.add_bond(Site::new(a, 1), Site::new(b, 0));

        assert_eq!(g.degree(Site::new(b, 0)), 2);
        assert_eq!(g.degree(Site::new(a, 0)), 1);
        assert_eq!(g.bond_multiplicity(Site::new(b, 0), Site::new(a, 1)), 1);
        assert_eq!(g.molecule_neighbors(a).collect::<Vec<_>>(), vec![b, b]);
        assert_eq!(g.component_count(), 3);
    }

    #[test]
    #[should_panic(expected = "existing component")]
    fn dangling_bond_panics() {
        let mut g = SpeciesGraph::new();
        g.add_molecule(monomer("A", &["b"]));
        g.add_bond(Site::new(0, 0), Site::new(3, 0));
    }

    #[test]
    fn append_offsets_bonds() {
        let mut dimer = SpeciesGraph::new();
        dimer.add_molecule(monomer("A", &["b"]));
        dimer.add_molecule(monomer("A", &["b"]));
        dimer.add_bond(Site::new(0, 0), Site::new(1, 0));

        let mut g = SpeciesGraph::new();
        g.add_molecule(monomer("B", &[]));
        let offset = g.append(&dimer);
        assert_eq!(offset, 1);
        assert_eq!(g.molecule_count(), 3);
        assert_eq!(g.bonds()[0], Bond::new(Site::new(1, 0), Site::new(2, 0)));
    }

    #[test]
    fn pattern_wildcard_rendering() {
        let mut c = ComponentPattern::with_state("s", "P");
        c.bonds = BondTest::Bound;
        let mut out = String::new();
        c.write_label(&mut out);
        c.write_wildcard(&mut out);
        assert_eq!(out, "s~P!+");
    }
}
