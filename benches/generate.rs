use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rulecrab::{
    parse_species, Catalog, ComponentType, Limits, MoleculeType, NetworkGenerator,
    ParameterTable, RateLaw, RuleSet, RuleSpec, Seed,
};

fn polymer_rules() -> (Catalog, RuleSet) {
    let catalog = Catalog::new(vec![MoleculeType::new(
        "A",
        vec![ComponentType::stateless("b"), ComponentType::stateless("b")],
    )])
    .unwrap();
    let spec = RuleSpec::parse(
        "dim",
        &["A(b)", "A(b)"],
        &["A(b!1).A(b!1)"],
        RateLaw::elementary("k"),
    )
    .unwrap()
    .reversible(RateLaw::elementary("kr"));
    let rules = RuleSet::new(&catalog, vec![spec]).unwrap();
    (catalog, rules)
}

fn receptor_rules() -> (Catalog, RuleSet) {
    let catalog = Catalog::new(vec![
        MoleculeType::new(
            "L",
            vec![ComponentType::stateless("r"), ComponentType::stateless("r")],
        ),
        MoleculeType::new(
            "R",
            vec![
                ComponentType::stateless("l"),
                ComponentType::with_states("y", ["U", "P"]),
            ],
        ),
    ])
    .unwrap();
    let specs = vec![
        RuleSpec::parse("bind", &["L(r)", "R(l)"], &["L(r!1).R(l!1)"], RateLaw::elementary("k"))
            .unwrap()
            .reversible(RateLaw::elementary("kr")),
        RuleSpec::parse("phos", &["R(y~U)"], &["R(y~P)"], RateLaw::elementary("k"))
            .unwrap(),
        RuleSpec::parse("dephos", &["R(y~P)"], &["R(y~U)"], RateLaw::elementary("kr"))
            .unwrap(),
    ];
    let rules = RuleSet::new(&catalog, specs).unwrap();
    (catalog, rules)
}

fn bench_generate(c: &mut Criterion) {
    let params = ParameterTable::new().with("k", 1.0).with("kr", 0.1);
    let (_, polymer) = polymer_rules();
    let (_, receptor) = receptor_rules();
    let monomer = vec![Seed::new(parse_species("A(b,b)").unwrap())];
    let cell = vec![
        Seed::new(parse_species("L(r,r)").unwrap()),
        Seed::new(parse_species("R(l,y~U)").unwrap()),
    ];

    let mut group = c.benchmark_group("generate");

    group.bench_function("polymer_8", |b| {
        let generator = NetworkGenerator::new(&polymer, &params)
            .with_limits(Limits::unbounded().with_max_agg(8));
        b.iter(|| black_box(generator.generate(black_box(&monomer)).unwrap()))
    });
    group.bench_function("bivalent_ligand", |b| {
        let generator = NetworkGenerator::new(&receptor, &params);
        b.iter(|| black_box(generator.generate(black_box(&cell)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_generate);
criterion_main!(benches);
