//! Reaction rules: registration, validation and compilation into an
//! explicit transformation.

mod apply;
pub mod error;
mod symmetry;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::complex::{Component, ComponentPattern, Molecule, Pattern, StateTest};
use crate::notation::{parse_pattern, write_pattern, NotationError};
use crate::rate::RateLaw;
use crate::traits::HasName;
use crate::types::Catalog;

pub(crate) use apply::{apply_rule, apply_rule_within};
pub use error::RuleError;
pub use symmetry::RuleSymmetry;

/// A molecule of one side of a rule: pattern index and molecule index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MolRef {
    pub pattern: usize,
    pub molecule: usize,
}

impl MolRef {
    pub fn new(pattern: usize, molecule: usize) -> Self {
        Self { pattern, molecule }
    }
}

/// A component of one side of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteRef {
    pub pattern: usize,
    pub molecule: usize,
    pub component: usize,
}

impl SiteRef {
    pub fn new(pattern: usize, molecule: usize, component: usize) -> Self {
        Self {
            pattern,
            molecule,
            component,
        }
    }

    pub fn molecule_ref(&self) -> MolRef {
        MolRef::new(self.pattern, self.molecule)
    }
}

/// Modifiers of a rule as written in the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleFlags {
    /// Delete only the unmapped molecules, not their whole complex.
    pub delete_molecules: bool,
    /// A compartment change drags along everything connected to the moved
    /// molecule in the same compartment.
    pub move_connected: bool,
    /// Each reactant pattern contributes one embedding class with weight 1.
    pub match_once: bool,
    /// The rate law is the total rate of the reaction, not a per-embedding rate.
    pub total_rate: bool,
    /// Per-rule caps on molecules of a type in any product.
    pub max_stoich: BTreeMap<String, usize>,
}

/// What happens to reactant molecules absent from the product side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletionMode {
    /// Nothing is deleted.
    None,
    /// Whole reactant patterns vanish: their matched species are removed entirely.
    Complex,
    /// Only the matched molecules are removed; the rest of the complex stays.
    Molecules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    MatchedOnly,
    MoveConnected,
}

/// A rule as handed over by a model reader, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub name: String,
    pub reactants: Vec<Pattern>,
    pub products: Vec<Pattern>,
    /// Explicit reactant-to-product molecule correspondence. When absent the
    /// k-th reactant molecule of a type pairs with the k-th product molecule
    /// of that type.
    pub molecule_map: Option<Vec<(MolRef, MolRef)>>,
    pub rate: RateLaw,
    pub reverse_rate: Option<RateLaw>,
    pub flags: RuleFlags,
}

impl RuleSpec {
    pub fn new(
        name: impl Into<String>,
        reactants: Vec<Pattern>,
        products: Vec<Pattern>,
        rate: RateLaw,
    ) -> Self {
        Self {
            name: name.into(),
            reactants,
            products,
            molecule_map: None,
            rate,
            reverse_rate: None,
            flags: RuleFlags::default(),
        }
    }

    /// Builds a rule from pattern strings.
    pub fn parse(
        name: impl Into<String>,
        reactants: &[&str],
        products: &[&str],
        rate: RateLaw,
    ) -> Result<Self, NotationError> {
        let reactants = reactants
            .iter()
            .map(|s| parse_pattern(s))
            .collect::<Result<_, _>>()?;
        let products = products
            .iter()
            .map(|s| parse_pattern(s))
            .collect::<Result<_, _>>()?;
        Ok(Self::new(name, reactants, products, rate))
    }

    /// Makes the rule reversible; the reverse direction is registered as a
    /// separate rule named `<name>_reverse`.
    pub fn reversible(mut self, reverse_rate: RateLaw) -> Self {
        self.reverse_rate = Some(reverse_rate);
        self
    }

    pub fn with_flags(mut self, flags: RuleFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_molecule_map(mut self, map: Vec<(MolRef, MolRef)>) -> Self {
        self.molecule_map = Some(map);
        self
    }
}

/// Either end of a bond a rule creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Endpoint {
    Reactant(SiteRef),
    Created { index: usize, component: usize },
}

/// The edit a rule performs, in reactant-pattern coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Transform {
    pub creations: Vec<Molecule<Component>>,
    pub state_changes: Vec<(SiteRef, String)>,
    pub broken: Vec<(SiteRef, SiteRef)>,
    pub added: Vec<(Endpoint, Endpoint)>,
    pub moves: Vec<(MolRef, String)>,
    pub deleted: Vec<MolRef>,
}

/// A validated, compiled, immutable reaction rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionRule {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) reactants: Vec<Pattern>,
    pub(crate) products: Vec<Pattern>,
    pub(crate) rate: RateLaw,
    pub(crate) deletion: DeletionMode,
    pub(crate) transport: TransportMode,
    pub(crate) match_once: bool,
    pub(crate) total_rate: bool,
    pub(crate) max_stoich: BTreeMap<String, usize>,
    pub(crate) molecule_map: Vec<(MolRef, MolRef)>,
    pub(crate) transform: Transform,
    pub(crate) symmetry: RuleSymmetry,
}

impl ReactionRule {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reactants(&self) -> &[Pattern] {
        &self.reactants
    }

    pub fn products(&self) -> &[Pattern] {
        &self.products
    }

    pub fn rate(&self) -> &RateLaw {
        &self.rate
    }

    pub fn deletion(&self) -> DeletionMode {
        self.deletion
    }

    pub fn transport(&self) -> TransportMode {
        self.transport
    }

    pub fn molecule_map(&self) -> &[(MolRef, MolRef)] {
        &self.molecule_map
    }

    pub fn symmetry(&self) -> RuleSymmetry {
        self.symmetry
    }

    pub fn is_bimolecular(&self) -> bool {
        self.reactants.len() == 2
    }

    /// Whether the rule also acts inside a single complex that matches both
    /// reactant patterns: it bonds the two patterns together and deletes
    /// nothing.
    pub fn closes_within(&self) -> bool {
        self.is_bimolecular()
            && self.deletion == DeletionMode::None
            && self.transform.added.iter().any(|&(a, b)| {
                matches!(
                    (a, b),
                    (Endpoint::Reactant(x), Endpoint::Reactant(y)) if x.pattern != y.pattern
                )
            })
    }

    /// `A(b) + B(a) -> A(b!1).B(a!1)`
    pub fn text(&self) -> String {
        rule_text(&self.reactants, &self.products)
    }
}

fn rule_text(reactants: &[Pattern], products: &[Pattern]) -> String {
    let side = |ps: &[Pattern]| {
        if ps.is_empty() {
            "0".to_string()
        } else {
            ps.iter().map(write_pattern).collect::<Vec<_>>().join(" + ")
        }
    };
    format!("{} -> {}", side(reactants), side(products))
}

/// All rules of a model, reversible rules expanded into two directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<ReactionRule>,
}

impl RuleSet {
    pub fn new(catalog: &Catalog, specs: Vec<RuleSpec>) -> Result<Self, RuleError> {
        let mut rules = Vec::new();
        for spec in specs {
            let reverse = spec.reverse_rate.clone().map(|rate| {
                let map = spec.molecule_map.as_ref().map(|m| {
                    m.iter()
                        .map(|&(r, p)| (p, r))
                        .collect::<Vec<_>>()
                });
                (
                    format!("{}_reverse", spec.name),
                    spec.products.clone(),
                    spec.reactants.clone(),
                    map,
                    rate,
                )
            });
            let flags = spec.flags.clone();
            rules.push(compile(
                catalog,
                rules.len(),
                spec.name,
                spec.reactants,
                spec.products,
                spec.molecule_map,
                spec.rate,
                &spec.flags,
            )?);
            if let Some((name, reactants, products, map, rate)) = reverse {
                rules.push(compile(
                    catalog,
                    rules.len(),
                    name,
                    reactants,
                    products,
                    map,
                    rate,
                    &flags,
                )?);
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ReactionRule] {
        &self.rules
    }

    pub fn get(&self, index: usize) -> Option<&ReactionRule> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Pairs the k-th reactant molecule of each type with the k-th product
/// molecule of the same type, in pattern order.
pub fn infer_molecule_map(reactants: &[Pattern], products: &[Pattern]) -> Vec<(MolRef, MolRef)> {
    let reactant_mols: Vec<(MolRef, &str)> = molecule_refs(reactants);
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut map = Vec::new();
    for (pref, name) in molecule_refs(products) {
        let k = seen.entry(name).or_insert(0);
        if let Some(&(rref, _)) = reactant_mols
            .iter()
            .filter(|(_, n)| *n == name)
            .nth(*k)
        {
            map.push((rref, pref));
        }
        *k += 1;
    }
    map
}

fn molecule_refs(patterns: &[Pattern]) -> Vec<(MolRef, &str)> {
    patterns
        .iter()
        .enumerate()
        .flat_map(|(p, pat)| {
            pat.molecules()
                .iter()
                .enumerate()
                .map(move |(m, mol)| (MolRef::new(p, m), mol.name.as_str()))
        })
        .collect()
}

struct Compiler<'a> {
    name: &'a str,
    text: String,
}

impl Compiler<'_> {
    fn structural(&self, detail: impl Into<String>) -> RuleError {
        RuleError::Structural {
            rule: self.name.to_string(),
            pattern: self.text.clone(),
            detail: detail.into(),
        }
    }

    fn ambiguity(&self, detail: impl Into<String>) -> RuleError {
        RuleError::MatchingAmbiguity {
            rule: self.name.to_string(),
            pattern: self.text.clone(),
            detail: detail.into(),
        }
    }
}

fn molecule_at<'p>(patterns: &'p [Pattern], r: MolRef) -> Option<&'p Molecule<ComponentPattern>> {
    patterns
        .get(r.pattern)
        .filter(|p| r.molecule < p.molecule_count())
        .map(|p| p.molecule(r.molecule))
}

/// Pairs the components of two molecules of one type by name, the k-th
/// occurrence of a name with the k-th occurrence on the other side.
fn pair_components<A: HasName, B: HasName>(
    left: &[A],
    right: &[B],
) -> Result<Vec<(usize, usize)>, String> {
    let mut used = vec![false; right.len()];
    let mut pairs = Vec::with_capacity(left.len());
    for (i, c) in left.iter().enumerate() {
        let j = (0..right.len())
            .find(|&j| !used[j] && right[j].name() == c.name())
            .ok_or_else(|| format!("component '{}' has no counterpart", c.name()))?;
        used[j] = true;
        pairs.push((i, j));
    }
    if let Some(j) = used.iter().position(|u| !u) {
        return Err(format!("component '{}' has no counterpart", right[j].name()));
    }
    Ok(pairs)
}

/// Places each written component of a new molecule on an unused component
/// of the same name in the fresh instance. Omitted components keep defaults.
fn place_components(
    written: &[ComponentPattern],
    fresh: &[Component],
) -> Result<Vec<(usize, usize)>, String> {
    let mut used = vec![false; fresh.len()];
    written
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let j = (0..fresh.len())
                .find(|&j| !used[j] && fresh[j].name == c.name)
                .ok_or_else(|| format!("no free component '{}'", c.name))?;
            used[j] = true;
            Ok((i, j))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn compile(
    catalog: &Catalog,
    index: usize,
    name: String,
    reactants: Vec<Pattern>,
    products: Vec<Pattern>,
    explicit_map: Option<Vec<(MolRef, MolRef)>>,
    rate: RateLaw,
    flags: &RuleFlags,
) -> Result<ReactionRule, RuleError> {
    let cx = Compiler {
        name: &name,
        text: rule_text(&reactants, &products),
    };

    if reactants.is_empty() || reactants.len() > 2 {
        return Err(cx.structural(format!(
            "a rule needs one or two reactant patterns, found {}",
            reactants.len()
        )));
    }
    for (side, patterns) in [("reactant", &reactants), ("product", &products)] {
        for (i, p) in patterns.iter().enumerate() {
            if p.is_empty() {
                return Err(cx.structural(format!("{side} pattern {i} is empty")));
            }
            catalog
                .validate_pattern(p)
                .map_err(|e| cx.structural(format!("{side} pattern {i}: {e}")))?;
        }
    }

    let molecule_map = match explicit_map {
        Some(map) => {
            let mut seen_r = Vec::new();
            let mut seen_p = Vec::new();
            for &(r, p) in &map {
                let (Some(rm), Some(pm)) = (molecule_at(&reactants, r), molecule_at(&products, p))
                else {
                    return Err(cx.structural(format!(
                        "dangling molecule-map reference {r:?} -> {p:?}"
                    )));
                };
                if rm.name != pm.name {
                    return Err(cx.structural(format!(
                        "molecule map pairs {} with {}",
                        rm.name, pm.name
                    )));
                }
                if seen_r.contains(&r) || seen_p.contains(&p) {
                    return Err(cx.structural(format!("molecule map uses {r:?} -> {p:?} twice")));
                }
                seen_r.push(r);
                seen_p.push(p);
            }
            map
        }
        None => infer_molecule_map(&reactants, &products),
    };

    let mut transform = Transform::default();
    let mut site_map: HashMap<SiteRef, Endpoint> = HashMap::new();
    let mut component_map: HashMap<SiteRef, SiteRef> = HashMap::new();

    for &(r, p) in &molecule_map {
        let (Some(rm), Some(pm)) = (molecule_at(&reactants, r), molecule_at(&products, p)) else {
            return Err(cx.structural(format!("dangling molecule-map reference {r:?} -> {p:?}")));
        };
        let pairs = pair_components(&rm.components, &pm.components)
            .map_err(|e| cx.ambiguity(format!("molecule {}: {e}", rm.name)))?;
        for (rc, pc) in pairs {
            let rsite = SiteRef::new(r.pattern, r.molecule, rc);
            let psite = SiteRef::new(p.pattern, p.molecule, pc);
            site_map.insert(psite, Endpoint::Reactant(rsite));
            component_map.insert(rsite, psite);

            let (rcomp, pcomp) = (&rm.components[rc], &pm.components[pc]);
            if rcomp.bonds != pcomp.bonds {
                return Err(cx.ambiguity(format!(
                    "bond wildcard on {}({}) changes between reactants and products",
                    rm.name, rcomp.name
                )));
            }
            if let StateTest::Is(state) = &pcomp.state {
                if rcomp.state != pcomp.state {
                    transform.state_changes.push((rsite, state.clone()));
                }
            }
        }
        if let Some(c) = &pm.compartment {
            if rm.compartment.as_ref() != Some(c) {
                transform.moves.push((r, c.clone()));
            }
        }
    }

    for (p, pat) in products.iter().enumerate() {
        for (m, pm) in pat.molecules().iter().enumerate() {
            if molecule_map.iter().any(|&(_, pr)| pr == MolRef::new(p, m)) {
                continue;
            }
            let mtype = catalog.get(&pm.name).ok_or_else(|| {
                cx.structural(format!("unknown molecule type '{}'", pm.name))
            })?;
            let mut template = mtype.instantiate();
            template.compartment = pm.compartment.clone();
            let pairs = place_components(&pm.components, &template.components)
                .map_err(|e| cx.structural(format!("created molecule {}: {e}", pm.name)))?;
            let created = transform.creations.len();
            for (pc, tc) in pairs {
                let comp = &pm.components[pc];
                if comp.bonds.is_wildcard() {
                    return Err(cx.structural(format!(
                        "created molecule {} carries a bond wildcard",
                        pm.name
                    )));
                }
                if let StateTest::Is(state) = &comp.state {
                    template.components[tc].state = Some(state.clone());
                }
                site_map.insert(
                    SiteRef::new(p, m, pc),
                    Endpoint::Created {
                        index: created,
                        component: tc,
                    },
                );
            }
            transform.creations.push(template);
        }
    }

    let mut bond_count: BTreeMap<(Endpoint, Endpoint), isize> = BTreeMap::new();
    let ordered = |a: Endpoint, b: Endpoint| if a <= b { (a, b) } else { (b, a) };
    for (p, pat) in reactants.iter().enumerate() {
        for bond in pat.bonds() {
            let (x, y) = bond.endpoints();
            let key = ordered(
                Endpoint::Reactant(SiteRef::new(p, x.molecule, x.component)),
                Endpoint::Reactant(SiteRef::new(p, y.molecule, y.component)),
            );
            *bond_count.entry(key).or_insert(0) -= 1;
        }
    }
    for (p, pat) in products.iter().enumerate() {
        for bond in pat.bonds() {
            let (x, y) = bond.endpoints();
            let ex = site_map[&SiteRef::new(p, x.molecule, x.component)];
            let ey = site_map[&SiteRef::new(p, y.molecule, y.component)];
            *bond_count.entry(ordered(ex, ey)).or_insert(0) += 1;
        }
    }
    for ((a, b), n) in bond_count {
        if n < 0 {
            let (Endpoint::Reactant(ra), Endpoint::Reactant(rb)) = (a, b) else {
                unreachable!("a reactant bond joins reactant sites");
            };
            for _ in 0..-n {
                transform.broken.push((ra, rb));
            }
        } else {
            for _ in 0..n {
                transform.added.push((a, b));
            }
        }
    }

    for (p, pat) in reactants.iter().enumerate() {
        for m in 0..pat.molecule_count() {
            let r = MolRef::new(p, m);
            if !molecule_map.iter().any(|&(mr, _)| mr == r) {
                transform.deleted.push(r);
            }
        }
    }
    let deletion = if transform.deleted.is_empty() {
        DeletionMode::None
    } else if flags.delete_molecules {
        DeletionMode::Molecules
    } else {
        let whole = (0..reactants.len()).all(|p| {
            let count = transform.deleted.iter().filter(|r| r.pattern == p).count();
            count == 0 || count == reactants[p].molecule_count()
        });
        if !whole {
            return Err(cx.structural(
                "rule deletes part of a reactant complex; set delete_molecules to allow it",
            ));
        }
        DeletionMode::Complex
    };
    let transport = if flags.move_connected {
        TransportMode::MoveConnected
    } else {
        TransportMode::MatchedOnly
    };

    let symmetry = symmetry::rule_symmetry(
        &reactants,
        &products,
        &molecule_map,
        &component_map,
    );

    Ok(ReactionRule {
        index,
        name,
        reactants,
        products,
        rate,
        deletion,
        transport,
        match_once: flags.match_once,
        total_rate: flags.total_rate,
        max_stoich: flags.max_stoich.clone(),
        molecule_map,
        transform,
        symmetry,
    })
}
