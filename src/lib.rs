pub mod canonical;
pub mod compartment;
pub mod complex;
pub mod degeneracy;
pub mod graph_ops;
pub mod matcher;
pub mod network;
pub mod notation;
pub mod observable;
pub mod rate;
pub mod rule;
pub mod traits;
pub mod types;

pub use canonical::{
    canonical_string, canonicalize, BackendError, Canonical, CanonicalOrder, Canonicalizer,
    ColoredGraph, Labeling, LabelingBackend, Marks, OrbitPartition, ReferenceBackend,
};
pub use compartment::{Compartment, CompartmentError, Compartments};
pub use complex::{
    Bond, BondTest, Component, ComponentPattern, ComplexGraph, Molecule, Pattern, Site,
    SpeciesGraph, StateTest,
};
pub use degeneracy::{
    count_embedding_degeneracy, disjoint_pairs, embedding_classes, joint_embedding_classes,
    EmbeddingClass, JointClass,
};
pub use matcher::{find_all_embeddings, verify_embedding, Embedding, MatchOptions};
pub use network::{
    generate, GenerateError, LimitKind, Limits, Network, NetworkGenerator, NetworkSummary,
    Progress, Rxn, Seed, Species, TerminalState,
};
pub use notation::{parse_pattern, parse_species, write_pattern, write_species, NotationError};
pub use observable::{Observable, ObservableKind};
pub use rate::{Bindings, ParameterTable, RateEvaluator, RateLaw};
pub use rule::{
    infer_molecule_map, DeletionMode, MolRef, ReactionRule, RuleError, RuleFlags, RuleSet,
    RuleSpec, RuleSymmetry, SiteRef, TransportMode,
};
pub use traits::{HasName, HasState, WriteLabel};
pub use types::{Catalog, CatalogError, ComponentType, MoleculeType};
