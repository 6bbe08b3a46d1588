use coinscript_core::clvm::{compile_chialisp, ClvmProgram, DEFAULT_MAX_COST};
use coinscript_core::curry::{curried_puzzle_hash, curry, curry_tree_hash};
use coinscript_core::hash::tree_hash;
use coinscript_core::parse::parse;
use coinscript_core::{Expression, PuzzleBuilder, TreeNode};

#[test]
fn ir_and_bridge_curry_agree_on_hashes() {
    let source = "(mod (OWNER amount) (c (list 51 OWNER amount) ()))";
    let program = compile_chialisp(source).expect("compile");
    let args = vec![TreeNode::bytes(vec![0x42; 32])];

    let bridge_curried = program.curry(&args).expect("bridge curry");
    let ir_curried = curry(&program.to_ir().expect("ir"), &args);

    assert_eq!(
        bridge_curried.tree_hash().expect("hash"),
        tree_hash(&ir_curried)
    );
    assert_eq!(
        bridge_curried.tree_hash().expect("hash"),
        curry_tree_hash(program.tree_hash().expect("hash"), &[tree_hash(&args[0])])
    );
}

#[test]
fn curry_hash_shortcut_matches_for_many_arities() {
    let program = parse("(+ 2 5)").expect("parse");
    for arity in 0..4 {
        let args: Vec<TreeNode> = (0..arity).map(|i| TreeNode::int(i as i64 + 100)).collect();
        assert_eq!(
            tree_hash(&curry(&program, &args)),
            curried_puzzle_hash(&program, &args),
            "arity {arity}"
        );
    }
}

/// Currying by name (substitution into the body at build time) and by
/// position (classic wrapper over the compiled mod) must accept the
/// same solutions and emit the same conditions.
#[test]
fn named_and_positional_curry_are_equivalent() {
    let owner = TreeNode::bytes(vec![0x42; 32]);
    let solution = parse("(1000)").expect("solution");

    // by name: the value is baked into the body, the parameter list
    // shrinks to the solution parameters
    let mut builder = PuzzleBuilder::new();
    builder
        .with_curried_param("OWNER", Expression::bytes(vec![0x42; 32]))
        .with_solution_param("amount")
        .create_coin(Expression::symbol("OWNER"), Expression::symbol("amount"));
    let by_name = builder.build().expect("build");
    let (named_result, _) = by_name
        .compile()
        .expect("compile")
        .run(&solution, DEFAULT_MAX_COST)
        .expect("run");

    // by position: the full mod keeps both parameters and the wrapper
    // prepends the owner at spend time
    let positional = compile_chialisp("(mod (OWNER amount) (c (list 51 OWNER amount) ()))")
        .expect("compile")
        .curry(&[owner])
        .expect("curry");
    let (positional_result, _) = positional.run(&solution, DEFAULT_MAX_COST).expect("run");

    assert_eq!(named_result, positional_result);
}

#[test]
fn curried_program_prepends_arguments() {
    // identity program returning its whole environment
    let program = ClvmProgram::assemble("1").expect("assemble");
    let curried = program
        .curry(&[TreeNode::int(7), TreeNode::int(8)])
        .expect("curry");
    let (result, _) = curried
        .run(&parse("(9)").expect("solution"), DEFAULT_MAX_COST)
        .expect("run");
    assert_eq!(result, parse("(7 8 9)").expect("expected"));
}
