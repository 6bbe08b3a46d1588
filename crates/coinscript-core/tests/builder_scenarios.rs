use coinscript_core::{Error, Expression, PuzzleBuilder, SolutionBuilder, TreeNode};

/// An empty builder still produces a well-formed mod with a nil body.
#[test]
fn empty_conditions_puzzle() {
    let puzzle = PuzzleBuilder::new().build().expect("build");
    assert_eq!(puzzle.to_chialisp_compact().unwrap(), "(mod @ ())");

    let first = puzzle.mod_hash_hex().expect("mod hash");
    let second = PuzzleBuilder::new()
        .build()
        .expect("build")
        .mod_hash_hex()
        .expect("mod hash");
    assert_eq!(first, second);
    assert!(first.starts_with("0x"));
}

/// A single constant CREATE_COIN: the serialized body carries the
/// symbolic condition, compilation succeeds, and the mod hash is the
/// tree hash of the compiled form.
#[test]
fn simple_create_coin() {
    let mut builder = PuzzleBuilder::new();
    builder.create_coin(Expression::bytes(vec![0x11; 32]), 1000_u64);
    let puzzle = builder.build().expect("build");

    assert_eq!(
        puzzle.included_libraries().iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["condition_codes.clib"]
    );
    let text = puzzle.to_chialisp().expect("chialisp");
    assert!(
        text.contains(&format!("(CREATE_COIN 0x{} 1000)", "11".repeat(32))),
        "{text}"
    );

    let program = puzzle.compile().expect("compile");
    assert!(!program.to_hex().is_empty());
    assert_eq!(puzzle.mod_hash().expect("hash"), program.tree_hash().expect("hash"));

    // reveal hex carries no prefix, the display form does
    assert!(!puzzle.puzzle_reveal().expect("reveal").starts_with("0x"));
    assert!(puzzle.to_clvm_hex().expect("hex").starts_with("0x"));

    // spending it emits exactly the declared condition
    let simulation = puzzle.simulate(&TreeNode::nil()).expect("simulate");
    let conditions = simulation.conditions();
    assert_eq!(conditions.len(), 1);
    let fields = conditions[0].proper_list().expect("condition");
    assert_eq!(fields[0], TreeNode::int(51));
    assert_eq!(fields[1], TreeNode::bytes(vec![0x11; 32]));
    assert_eq!(fields[2], TreeNode::int(1000));
    assert!(simulation.cost > 0);
}

/// Include minimization: each feature pulls exactly its canonical
/// library, and dropping the feature drops the library again.
#[test]
fn include_minimization_follows_features() {
    let mut builder = PuzzleBuilder::new();
    builder.require_after_seconds(3600_u64);
    let puzzle = builder.build().expect("build");
    assert_eq!(
        puzzle.included_libraries().iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["condition_codes.clib"]
    );

    // a require guard adds the macro library on top
    let mut builder = PuzzleBuilder::new();
    builder
        .with_solution_param("flag")
        .require_after_seconds(3600_u64)
        .require(Expression::symbol("flag"));
    let puzzle = builder.build().expect("build");
    assert!(puzzle.included_libraries().contains("utility_macros.clib"));
    assert!(puzzle.included_libraries().contains("condition_codes.clib"));

    // and removing the guard removes it again
    let mut builder = PuzzleBuilder::new();
    builder
        .with_solution_param("flag")
        .require_after_seconds(3600_u64);
    let puzzle = builder.build().expect("build");
    assert!(!puzzle.included_libraries().contains("utility_macros.clib"));
}

#[test]
fn require_guard_raises_on_false_predicate() {
    let mut builder = PuzzleBuilder::new();
    builder
        .with_solution_param("flag")
        .require(Expression::symbol("flag"))
        .reserve_fee(1_u64);
    let puzzle = builder.build().expect("build");

    let ok = puzzle.simulate("(1)").expect("passing guard");
    assert_eq!(ok.conditions().len(), 1);

    let err = puzzle.simulate("(())").unwrap_err();
    assert!(matches!(err, Error::Simulation { .. }));
}

#[test]
fn control_flow_misuse_is_reported_at_build() {
    let mut builder = PuzzleBuilder::new();
    builder.then(|b| {
        b.raise();
    });
    assert!(matches!(builder.build().unwrap_err(), Error::Builder { .. }));

    let mut builder = PuzzleBuilder::new();
    builder.if_(Expression::symbol("x"));
    assert!(matches!(builder.build().unwrap_err(), Error::Builder { .. }));

    let mut builder = PuzzleBuilder::new();
    builder.else_(|b| {
        b.raise();
    });
    assert!(matches!(builder.build().unwrap_err(), Error::Builder { .. }));
}

#[test]
fn conditional_puzzle_runs_both_branches() {
    let mut builder = PuzzleBuilder::new();
    builder
        .with_solution_param("flag")
        .if_(Expression::symbol("flag"))
        .then(|b| {
            b.create_coin(Expression::bytes(vec![0x22; 32]), 1_u64);
        })
        .else_(|b| {
            b.reserve_fee(5_u64);
        });
    let puzzle = builder.build().expect("build");

    let taken = puzzle.simulate("(1)").expect("then branch");
    let fields = taken.conditions()[0].proper_list().expect("condition");
    assert_eq!(fields[0], TreeNode::int(51));

    let skipped = puzzle.simulate("(())").expect("else branch");
    let fields = skipped.conditions()[0].proper_list().expect("condition");
    assert_eq!(fields[0], TreeNode::int(52));
}

#[test]
fn solution_builder_feeds_simulation() {
    let mut builder = PuzzleBuilder::new();
    builder
        .with_solution_param("target")
        .with_solution_param("amount")
        .create_coin(Expression::symbol("target"), Expression::symbol("amount"));
    let puzzle = builder.build().expect("build");

    let mut solution = SolutionBuilder::new();
    solution.add([0x33_u8; 32]).add(750_u64);
    let simulation = puzzle
        .simulate(solution.build().expect("solution"))
        .expect("simulate");
    let fields = simulation.conditions()[0].proper_list().expect("condition");
    assert_eq!(fields[1], TreeNode::bytes(vec![0x33; 32]));
    assert_eq!(fields[2], TreeNode::int(750));
}

#[test]
fn simulation_failure_surfaces_as_simulation_error() {
    let mut builder = PuzzleBuilder::new();
    builder.raise();
    let puzzle = builder.build().expect("build");
    let err = puzzle.simulate(&TreeNode::nil()).unwrap_err();
    assert!(matches!(err, Error::Simulation { .. }));
}

#[test]
fn hex_solution_inputs_are_accepted() {
    let mut builder = PuzzleBuilder::new();
    builder
        .with_solution_param("x")
        .returns(Expression::symbol("x"));
    let puzzle = builder.build().expect("build");

    let mut solution = SolutionBuilder::new();
    solution.add(65535_u64);
    let hex_text = solution.to_hex().expect("hex");
    let simulation = puzzle.simulate(hex_text.as_str()).expect("simulate");
    assert_eq!(simulation.result, TreeNode::int(65535));
}
