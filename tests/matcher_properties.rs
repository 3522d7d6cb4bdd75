use rulecrab::{
    count_embedding_degeneracy, embedding_classes, find_all_embeddings, parse_pattern,
    parse_species, verify_embedding, Canonicalizer, MatchOptions,
};

const CASES: &[(&str, &str)] = &[
    ("A(b)", "A(b)"),
    ("A(b)", "A(b!1,b).A(b!1,b)"),
    ("A(b!+)", "A(b!1,b).A(b!1,b!2).A(b!2,b)"),
    ("A(b!?)", "A(b!1,b,s~P).A(b!1,b,s~U)"),
    ("A(s~P)", "A(b!1,b,s~P).A(b!1,b,s~U)"),
    ("A(b!1).A(b!1)", "A(b!1,b!2).A(b!2,b!3).A(b!3,b!1)"),
    ("S(x)", "S(x!1,x!2,x).L(s!1).L(s!2)"),
    ("L(s!1).S(x!1)", "S(x!1,x!2,x!3).L(s!1).L(s!2).L(s!3)"),
    ("R(l!1).L(r!1)", "L(r!1,r!2).R(l!1,d!3).R(l!2,d!3)"),
    ("A()", "A(b!1).B(a!1)"),
];

fn opts_for(allow_extra: bool) -> MatchOptions {
    MatchOptions {
        allow_extra_target_bonds: allow_extra,
        ..MatchOptions::default()
    }
}

#[test]
fn every_embedding_verifies() {
    for &(p, t) in CASES {
        let pattern = parse_pattern(p).unwrap();
        let target = parse_species(t).unwrap();
        for allow_extra in [false, true] {
            let opts = opts_for(allow_extra);
            for emb in find_all_embeddings(&pattern, &target, &opts) {
                assert!(
                    verify_embedding(&pattern, &target, &emb, &opts),
                    "'{p}' in '{t}' (allow_extra={allow_extra}): {emb:?} does not verify"
                );
            }
        }
    }
}

#[test]
fn embeddings_are_distinct_and_ordered() {
    for &(p, t) in CASES {
        let pattern = parse_pattern(p).unwrap();
        let target = parse_species(t).unwrap();
        let found = find_all_embeddings(&pattern, &target, &MatchOptions::default());
        let again = find_all_embeddings(&pattern, &target, &MatchOptions::default());
        assert_eq!(found, again, "'{p}' in '{t}': order changed between calls");
        let mut unique = found.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), found.len(), "'{p}' in '{t}': duplicate embeddings");
    }
}

#[test]
fn classes_partition_the_embeddings() {
    let canon = Canonicalizer::new();
    for &(p, t) in CASES {
        let pattern = parse_pattern(p).unwrap();
        let target = parse_species(t).unwrap();
        let raw = find_all_embeddings(&pattern, &target, &MatchOptions::default());
        let count = raw.len() as u64;
        let classes = embedding_classes(&canon, &pattern, &target, raw);
        let total: u64 = classes.iter().map(|c| c.degeneracy).sum();
        assert_eq!(total, count, "'{p}' in '{t}': class sizes do not add up");
        for class in &classes {
            assert_eq!(
                count_embedding_degeneracy(&pattern, &target, &class.representative),
                class.degeneracy,
                "'{p}' in '{t}': degeneracy of {:?}",
                class.representative
            );
        }
    }
}

#[test]
fn free_sites_on_separate_molecules() {
    let pattern = parse_pattern("A(b)").unwrap();
    let target = parse_species("A(b).A(b)").unwrap();
    assert_eq!(find_all_embeddings(&pattern, &target, &MatchOptions::default()).len(), 2);
}

#[test]
fn unbound_pattern_site_rejects_bound_target() {
    let pattern = parse_pattern("A(b)").unwrap();
    let target = parse_species("A(b!1).A(b!1)").unwrap();
    assert!(find_all_embeddings(&pattern, &target, &MatchOptions::default()).is_empty());
    assert_eq!(find_all_embeddings(&pattern, &target, &opts_for(true)).len(), 2);
}

#[test]
fn symmetry_breaking_keeps_one_per_class() {
    let pattern = parse_pattern("L(s!1).S(x!1)").unwrap();
    let target = parse_species("S(x!1,x!2,x!3).L(s!1).L(s!2).L(s!3)").unwrap();
    let all = find_all_embeddings(&pattern, &target, &MatchOptions::default());
    assert_eq!(all.len(), 3);
    let reduced = find_all_embeddings(
        &pattern,
        &target,
        &MatchOptions {
            symmetry_breaking: true,
            ..MatchOptions::default()
        },
    );
    assert_eq!(reduced.len(), 1);
}

#[test]
fn compartment_scope() {
    let pattern = parse_pattern("L(r)").unwrap();
    let target = parse_species("L(r)@EC").unwrap();
    let inside = MatchOptions {
        compartment: Some("EC".into()),
        ..MatchOptions::default()
    };
    let elsewhere = MatchOptions {
        compartment: Some("CP".into()),
        ..MatchOptions::default()
    };
    assert_eq!(find_all_embeddings(&pattern, &target, &inside).len(), 1);
    assert!(find_all_embeddings(&pattern, &target, &elsewhere).is_empty());
}
