use serde::{Deserialize, Serialize};

use crate::canonical::Canonicalizer;
use crate::complex::{
    BondTest, Component, ComplexGraph, ComponentPattern, Molecule, Pattern, Site, SpeciesGraph,
    StateTest,
};
use crate::degeneracy::embedding_classes;
use crate::traits::HasName;

/// Switches for [`find_all_embeddings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Return one embedding per class of embeddings related by a symmetry of
    /// the target.
    pub symmetry_breaking: bool,
    /// Let a target site carry bonds beyond the ones the pattern draws.
    pub allow_extra_target_bonds: bool,
    /// Only match target molecules in this compartment.
    pub compartment: Option<String>,
}

/// An injective map from pattern molecules and components into a target.
///
/// `molecules[pm]` is the target molecule of pattern molecule `pm`, and
/// `components[pm][pc]` the target component (within that molecule) of
/// pattern component `pc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Embedding {
    pub molecules: Vec<usize>,
    pub components: Vec<Vec<usize>>,
}

impl Embedding {
    pub fn site(&self, pattern_site: Site) -> Site {
        Site::new(
            self.molecules[pattern_site.molecule],
            self.components[pattern_site.molecule][pattern_site.component],
        )
    }

    /// The same embedding after the target has been shifted by `offset`
    /// molecules, as happens when targets are joined into one graph.
    pub fn offset(&self, offset: usize) -> Embedding {
        Embedding {
            molecules: self.molecules.iter().map(|m| m + offset).collect(),
            components: self.components.clone(),
        }
    }
}

/// A component together with the number of bonds at its site.
#[derive(Debug, Clone, Copy)]
pub struct SiteView<'a, C> {
    pub component: &'a C,
    pub degree: usize,
}

/// State and bond test of one pattern site against one target site.
///
/// `target.degree` counts every bond of the target site; `pattern.degree`
/// counts the bonds the pattern draws explicitly at its site.
pub fn site_matches(
    target: SiteView<'_, Component>,
    pattern: SiteView<'_, ComponentPattern>,
    allow_extra_target_bonds: bool,
) -> bool {
    if let StateTest::Is(state) = &pattern.component.state {
        if target.component.state.as_deref() != Some(state.as_str()) {
            return false;
        }
    }
    let (t, k) = (target.degree, pattern.degree);
    match pattern.component.bonds {
        BondTest::Specified if k == 0 => t == 0 || allow_extra_target_bonds,
        BondTest::Specified => t == k || (allow_extra_target_bonds && t >= k),
        BondTest::Any => t >= k,
        BondTest::Bound => t > k,
        BondTest::Exactly(n) => t == n,
    }
}

fn molecule_matches(
    target: &Molecule<Component>,
    pattern: &Molecule<ComponentPattern>,
    scope: Option<&str>,
) -> bool {
    if target.name != pattern.name {
        return false;
    }
    if let Some(c) = &pattern.compartment {
        if target.compartment.as_ref() != Some(c) {
            return false;
        }
    }
    match scope {
        Some(c) => target.compartment.as_deref() == Some(c),
        None => true,
    }
}

/// Every embedding of `pattern` into `target` under `opts`, in a
/// deterministic order. Returns an empty list when none exist.
pub fn find_all_embeddings(
    pattern: &Pattern,
    target: &SpeciesGraph,
    opts: &MatchOptions,
) -> Vec<Embedding> {
    let scope = opts.compartment.as_deref();
    let allow_extra = opts.allow_extra_target_bonds;
    let raw = find_embeddings_with(
        target,
        pattern,
        |t, p| molecule_matches(t, p, scope),
        |t, p| site_matches(t, p, allow_extra),
    );
    if !opts.symmetry_breaking {
        return raw;
    }
    embedding_classes(&Canonicalizer::new(), pattern, target, raw)
        .into_iter()
        .map(|class| class.representative)
        .collect()
}

/// Re-checks one embedding against every constraint of the pattern.
pub fn verify_embedding(
    pattern: &Pattern,
    target: &SpeciesGraph,
    embedding: &Embedding,
    opts: &MatchOptions,
) -> bool {
    if embedding.molecules.len() != pattern.molecule_count() {
        return false;
    }
    let mut used = vec![false; target.molecule_count()];
    for (pm, pmol) in pattern.molecules().iter().enumerate() {
        let tm = embedding.molecules[pm];
        if tm >= target.molecule_count() || used[tm] {
            return false;
        }
        used[tm] = true;
        let tmol = target.molecule(tm);
        if !molecule_matches(tmol, pmol, opts.compartment.as_deref()) {
            return false;
        }
        let mut comp_used = vec![false; tmol.components.len()];
        for (pc, pcomp) in pmol.components.iter().enumerate() {
            let tc = embedding.components[pm][pc];
            if tc >= tmol.components.len() || comp_used[tc] {
                return false;
            }
            comp_used[tc] = true;
            if tmol.components[tc].name != pcomp.name {
                return false;
            }
            let t = SiteView {
                component: &tmol.components[tc],
                degree: target.degree(Site::new(tm, tc)),
            };
            let p = SiteView {
                component: pcomp,
                degree: pattern.degree(Site::new(pm, pc)),
            };
            if !site_matches(t, p, opts.allow_extra_target_bonds) {
                return false;
            }
        }
    }
    pattern.bonds().iter().all(|b| {
        let (x, y) = b.endpoints();
        target.bond_multiplicity(embedding.site(x), embedding.site(y))
            >= pattern.bond_multiplicity(x, y)
    })
}

/// Embedding search with caller-supplied molecule and site tests.
///
/// Molecule names and component names must agree; everything else is left
/// to `molecule_match` and `site_match`. Every explicit pattern bond must be
/// present in the target, at least as many times as the pattern draws it.
pub fn find_embeddings_with<T, P, FM, FS>(
    target: &ComplexGraph<T>,
    pattern: &ComplexGraph<P>,
    molecule_match: FM,
    site_match: FS,
) -> Vec<Embedding>
where
    T: HasName,
    P: HasName,
    FM: Fn(&Molecule<T>, &Molecule<P>) -> bool,
    FS: Fn(SiteView<'_, T>, SiteView<'_, P>) -> bool,
{
    let mut search = Search::new(target, pattern, molecule_match, site_match);
    let mut results = Vec::new();
    if pattern.is_empty() {
        return results;
    }
    search.recurse(0, &mut results);
    results
}

struct Step {
    molecule: usize,
    /// A bond from this molecule to one mapped earlier: (site here, site there).
    anchor: Option<(Site, Site)>,
}

struct Search<'a, T, P, FM, FS> {
    target: &'a ComplexGraph<T>,
    pattern: &'a ComplexGraph<P>,
    molecule_match: FM,
    site_match: FS,
    order: Vec<Step>,
    mol_map: Vec<Option<usize>>,
    comp_map: Vec<Vec<usize>>,
    target_used: Vec<bool>,
    pattern_degree: Vec<Vec<usize>>,
}

impl<'a, T, P, FM, FS> Search<'a, T, P, FM, FS>
where
    T: HasName,
    P: HasName,
    FM: Fn(&Molecule<T>, &Molecule<P>) -> bool,
    FS: Fn(SiteView<'_, T>, SiteView<'_, P>) -> bool,
{
    fn new(
        target: &'a ComplexGraph<T>,
        pattern: &'a ComplexGraph<P>,
        molecule_match: FM,
        site_match: FS,
    ) -> Self {
        let n = pattern.molecule_count();
        let mut order = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        for start in 0..n {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            order.push(Step {
                molecule: start,
                anchor: None,
            });
            let mut head = order.len() - 1;
            while head < order.len() {
                let current = order[head].molecule;
                head += 1;
                for bond in pattern.bonds() {
                    let (a, b) = bond.endpoints();
                    let (here, there) = if a.molecule == current {
                        (a, b)
                    } else if b.molecule == current {
                        (b, a)
                    } else {
                        continue;
                    };
                    if !visited[there.molecule] {
                        visited[there.molecule] = true;
                        order.push(Step {
                            molecule: there.molecule,
                            anchor: Some((there, here)),
                        });
                    }
                }
            }
        }

        let pattern_degree = pattern
            .molecules()
            .iter()
            .enumerate()
            .map(|(m, mol)| {
                (0..mol.components.len())
                    .map(|c| pattern.degree(Site::new(m, c)))
                    .collect()
            })
            .collect();

        Self {
            target,
            pattern,
            molecule_match,
            site_match,
            order,
            mol_map: vec![None; n],
            comp_map: pattern
                .molecules()
                .iter()
                .map(|m| vec![usize::MAX; m.components.len()])
                .collect(),
            target_used: vec![false; target.molecule_count()],
            pattern_degree,
        }
    }

    fn candidates(&self, step: &Step) -> Vec<usize> {
        match step.anchor {
            None => (0..self.target.molecule_count()).collect(),
            Some((_, there)) => {
                let mapped_mol = self.mol_map[there.molecule]
                    .unwrap_or_else(|| panic!("anchor molecule {} not mapped", there.molecule));
                let tsite = Site::new(mapped_mol, self.comp_map[there.molecule][there.component]);
                let mut out: Vec<usize> = self
                    .target
                    .bonds_at(tsite)
                    .map(|(_, partner)| partner.molecule)
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            }
        }
    }

    fn recurse(&mut self, depth: usize, results: &mut Vec<Embedding>) {
        if depth == self.order.len() {
            results.push(Embedding {
                molecules: self.mol_map.iter().map(|m| m.unwrap_or(usize::MAX)).collect(),
                components: self.comp_map.clone(),
            });
            return;
        }
        let step_mol = self.order[depth].molecule;
        let candidates = self.candidates(&self.order[depth]);
        for tm in candidates {
            if self.target_used[tm]
                || self.target.molecule(tm).name != self.pattern.molecule(step_mol).name
            {
                continue;
            }
            if !(self.molecule_match)(self.target.molecule(tm), self.pattern.molecule(step_mol)) {
                continue;
            }
            self.mol_map[step_mol] = Some(tm);
            self.target_used[tm] = true;
            let k = self.target.molecule(tm).components.len();
            let mut comp_used = vec![false; k];
            self.assign_components(depth, step_mol, tm, 0, &mut comp_used, results);
            self.target_used[tm] = false;
            self.mol_map[step_mol] = None;
        }
    }

    fn assign_components(
        &mut self,
        depth: usize,
        pm: usize,
        tm: usize,
        pc: usize,
        comp_used: &mut Vec<bool>,
        results: &mut Vec<Embedding>,
    ) {
        let (pattern, target) = (self.pattern, self.target);
        let pmol = pattern.molecule(pm);
        if pc == pmol.components.len() {
            if self.bonds_consistent(pm) {
                self.recurse(depth + 1, results);
            }
            return;
        }
        let pcomp = &pmol.components[pc];
        let tmol = target.molecule(tm);
        for tc in 0..tmol.components.len() {
            if comp_used[tc] || tmol.components[tc].name() != pcomp.name() {
                continue;
            }
            let t = SiteView {
                component: &tmol.components[tc],
                degree: target.degree(Site::new(tm, tc)),
            };
            let p = SiteView {
                component: pcomp,
                degree: self.pattern_degree[pm][pc],
            };
            if !(self.site_match)(t, p) {
                continue;
            }
            comp_used[tc] = true;
            self.comp_map[pm][pc] = tc;
            self.assign_components(depth, pm, tm, pc + 1, comp_used, results);
            self.comp_map[pm][pc] = usize::MAX;
            comp_used[tc] = false;
        }
    }

    /// Checks every pattern bond at molecule `pm` whose other end is mapped.
    fn bonds_consistent(&self, pm: usize) -> bool {
        for bond in self.pattern.bonds() {
            let (a, b) = bond.endpoints();
            if a.molecule != pm && b.molecule != pm {
                continue;
            }
            let (Some(ta), Some(tb)) = (self.mol_map[a.molecule], self.mol_map[b.molecule]) else {
                continue;
            };
            let sa = Site::new(ta, self.comp_map[a.molecule][a.component]);
            let sb = Site::new(tb, self.comp_map[b.molecule][b.component]);
            if self.target.bond_multiplicity(sa, sb) < self.pattern.bond_multiplicity(a, b) {
                return false;
            }
        }
        true
    }
}
