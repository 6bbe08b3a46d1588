use std::collections::BTreeMap;

use crate::hash::{tree_hash, tree_hash_atom, tree_hash_pair};
use crate::tree::TreeNode;

/// Classic positional curry: `(a (q . P) (c (q . a1) … 1))`. The wrapper
/// prepends the bound values to the incoming solution before invoking
/// the original puzzle.
pub fn curry(program: &TreeNode, args: &[TreeNode]) -> TreeNode {
    let mut env = TreeNode::int(1);
    for arg in args.iter().rev() {
        env = TreeNode::list(vec![
            TreeNode::symbol("c"),
            TreeNode::cons(TreeNode::symbol("q"), arg.clone()),
            env,
        ]);
    }
    TreeNode::list(vec![
        TreeNode::symbol("a"),
        TreeNode::cons(TreeNode::symbol("q"), program.clone()),
        env,
    ])
}

/// Named curry: replaces every symbol atom bound in `bindings` with its
/// value. Capture-free because generated puzzles never shadow curried
/// names; callers strip the bound names from the parameter list.
pub fn substitute(node: &TreeNode, bindings: &BTreeMap<String, TreeNode>) -> TreeNode {
    if bindings.is_empty() {
        return node.clone();
    }
    match node {
        TreeNode::Atom(atom) => match node.as_symbol() {
            Some(name) => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| TreeNode::Atom(atom.clone())),
            None => TreeNode::Atom(atom.clone()),
        },
        TreeNode::List(items) => {
            TreeNode::List(items.iter().map(|item| substitute(item, bindings)).collect())
        }
        TreeNode::Cons(first, rest) => TreeNode::cons(
            substitute(first, bindings),
            substitute(rest, bindings),
        ),
    }
}

/// Tree hash of `curry(P, args)` computed from `tree_hash(P)` and the
/// argument hashes alone, without materializing the wrapper. Matches
/// `puzzle-hash-of-curried-function` from curry-and-treehash.clinc.
pub fn curry_tree_hash(program_hash: [u8; 32], arg_hashes: &[[u8; 32]]) -> [u8; 32] {
    let q_kw = tree_hash_atom(&[1]);
    let a_kw = tree_hash_atom(&[2]);
    let c_kw = tree_hash_atom(&[4]);
    let one = tree_hash_atom(&[1]);
    let nil = tree_hash_atom(&[]);

    // (c (q . arg) env) hashed from the inside out
    let mut env = one;
    for arg_hash in arg_hashes.iter().rev() {
        let quoted = tree_hash_pair(q_kw, *arg_hash);
        env = tree_hash_pair(c_kw, tree_hash_pair(quoted, tree_hash_pair(env, nil)));
    }

    let quoted_program = tree_hash_pair(q_kw, program_hash);
    tree_hash_pair(a_kw, tree_hash_pair(quoted_program, tree_hash_pair(env, nil)))
}

/// Convenience over [`curry_tree_hash`] for IR values.
pub fn curried_puzzle_hash(program: &TreeNode, args: &[TreeNode]) -> [u8; 32] {
    let arg_hashes: Vec<[u8; 32]> = args.iter().map(tree_hash).collect();
    curry_tree_hash(tree_hash(program), &arg_hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::serialize::to_source;

    #[test]
    fn classic_curry_shape() {
        let program = TreeNode::int(2);
        let curried = curry(&program, &[TreeNode::int(5), TreeNode::int(8)]);
        assert_eq!(
            to_source(&curried).unwrap(),
            "(a (q . 2) (c (q . 5) (c (q . 8) 1)))"
        );
    }

    #[test]
    fn curry_with_no_args_wraps_bare() {
        let program = parse("(+ 2 5)").unwrap();
        let curried = curry(&program, &[]);
        assert_eq!(to_source(&curried).unwrap(), "(a (q + 2 5) 1)");
    }

    #[test]
    fn substitution_replaces_named_symbols() {
        let body = parse("(c (list 51 OWNER amount) ())").unwrap();
        let mut bindings = BTreeMap::new();
        bindings.insert("OWNER".to_string(), TreeNode::bytes(vec![0x11; 32]));
        let out = substitute(&body, &bindings);
        let text = to_source(&out).unwrap();
        assert!(text.contains(&format!("0x{}", "11".repeat(32))));
        assert!(text.contains("amount"));
        assert!(!text.contains("OWNER"));
    }

    #[test]
    fn substitution_reaches_cons_tails() {
        let body = parse("(a . X)").unwrap();
        let mut bindings = BTreeMap::new();
        bindings.insert("X".to_string(), TreeNode::int(7));
        assert_eq!(
            substitute(&body, &bindings),
            TreeNode::cons(TreeNode::symbol("a"), TreeNode::int(7))
        );
    }

    #[test]
    fn curry_hash_shortcut_matches_materialized_wrapper() {
        let program = parse("(+ 2 5)").unwrap();
        let args = vec![TreeNode::int(100), TreeNode::bytes(vec![0xaa; 32])];
        let materialized = curry(&program, &args);
        assert_eq!(
            tree_hash(&materialized),
            curried_puzzle_hash(&program, &args)
        );
    }

    #[test]
    fn curry_hash_shortcut_with_no_args() {
        let program = parse("(q . 1)").unwrap();
        let materialized = curry(&program, &[]);
        assert_eq!(tree_hash(&materialized), curried_puzzle_hash(&program, &[]));
    }
}
