//! Slot-machine state persistence. The contract state lives in the
//! leading curried slot of the generated template: on-chain coins are
//! `curry(template, [MOD_HASH, state])`, so the wrapper prepends both
//! to every solution. A stateful spend re-computes its successor's
//! puzzle hash from `MOD_HASH` and the tree hash of the updated state,
//! and recreates the coin with it.

use std::collections::BTreeSet;

use crate::coinscript::ast::Type;
use crate::coinscript::sema::StateSlot;
use crate::error::Result;
use crate::tree::TreeNode;

/// Solution-slot names every state template carries.
pub const MOD_HASH_PARAM: &str = "MOD_HASH";
pub const STATE_PARAM: &str = "CURRENT_STATE";
pub const AMOUNT_PARAM: &str = "my_amount";

/// `(f (r (r … base)))` selecting element `index` of a list value.
pub fn nth_expr(base: TreeNode, index: usize) -> TreeNode {
    let mut node = base;
    for _ in 0..index {
        node = TreeNode::list(vec![TreeNode::symbol("r"), node]);
    }
    TreeNode::list(vec![TreeNode::symbol("f"), node])
}

/// Runtime expression reading state field `index` out of the current
/// state slot.
pub fn state_field_expr(index: usize) -> TreeNode {
    nth_expr(TreeNode::symbol(STATE_PARAM), index)
}

/// `(list f0 f1 …)` rebuilding the state record from per-field
/// expressions, preserving declaration order.
pub fn new_state_expr(field_exprs: &[TreeNode]) -> TreeNode {
    let mut items = vec![TreeNode::symbol("list")];
    items.extend(field_exprs.iter().cloned());
    TreeNode::list(items)
}

/// The successor puzzle hash: the template hash re-curried with the
/// updated state. Matches `puzzle-hash-of-curried-function` with the
/// reversed argument hashes `[hash(new_state), hash(MOD_HASH)]`.
pub fn child_puzzle_hash_expr(new_state: TreeNode) -> TreeNode {
    TreeNode::list(vec![
        TreeNode::symbol("puzzle-hash-of-curried-function"),
        TreeNode::symbol(MOD_HASH_PARAM),
        TreeNode::list(vec![TreeNode::symbol("sha256tree"), new_state]),
        TreeNode::list(vec![
            TreeNode::symbol("sha256"),
            TreeNode::int(1),
            TreeNode::symbol(MOD_HASH_PARAM),
        ]),
    ])
}

/// Conditions tail closing a stateful action: recreate the coin with
/// the new state at the current amount, and pin that amount. A burned
/// chain emits nothing.
pub fn finalize_tail(
    field_exprs: &[TreeNode],
    terminated: bool,
    features: &mut BTreeSet<String>,
) -> Result<TreeNode> {
    if terminated {
        return Ok(TreeNode::nil());
    }
    features.extend(
        [
            "CREATE_COIN",
            "ASSERT_MY_AMOUNT",
            "sha256tree",
            "puzzle-hash-of-curried-function",
        ]
        .map(str::to_string),
    );
    let create = TreeNode::list(vec![
        TreeNode::symbol("list"),
        TreeNode::symbol("CREATE_COIN"),
        child_puzzle_hash_expr(new_state_expr(field_exprs)),
        TreeNode::symbol(AMOUNT_PARAM),
    ]);
    let assert_amount = TreeNode::list(vec![
        TreeNode::symbol("list"),
        TreeNode::symbol("ASSERT_MY_AMOUNT"),
        TreeNode::symbol(AMOUNT_PARAM),
    ]);
    Ok(TreeNode::list(vec![
        TreeNode::symbol("c"),
        create,
        TreeNode::list(vec![
            TreeNode::symbol("c"),
            assert_amount,
            TreeNode::nil(),
        ]),
    ]))
}

/// The zero-value state record a freshly launched coin curries in.
pub fn initial_state(slots: &[StateSlot]) -> TreeNode {
    TreeNode::list(
        slots
            .iter()
            .map(|slot| {
                if slot.is_map {
                    TreeNode::nil()
                } else {
                    match slot.ty {
                        Type::Uint256 => TreeNode::int(0),
                        Type::Bool => TreeNode::bool(false),
                        Type::Address | Type::Bytes32 => TreeNode::bytes(vec![0_u8; 32]),
                        Type::StringTy | Type::Bytes => TreeNode::nil(),
                    }
                }
            })
            .collect(),
    )
}

/// Association-list helpers emitted into the template when state maps
/// are in play. Maps are lists of `(key . value)` pairs: `assoc_set`
/// appends new keys in insertion order, `assoc_set_sorted` keeps the
/// list ascending by key bytes for maps declared `ordered`. Only the
/// helpers a contract actually mutates with are emitted.
pub fn assoc_defuns(unordered: bool, ordered: bool) -> Vec<TreeNode> {
    let mut defuns = vec![
        crate::parse::parse(
            "(defun assoc_get (m k) (if m (if (= (f (f m)) k) (r (f m)) (assoc_get (r m) k)) ()))",
        )
        .expect("assoc_get source"),
    ];
    if unordered {
        defuns.push(
            crate::parse::parse(
                "(defun assoc_set (m k v) (if m (if (= (f (f m)) k) (c (c k v) (r m)) (c (f m) (assoc_set (r m) k v))) (c (c k v) ())))",
            )
            .expect("assoc_set source"),
        );
    }
    if ordered {
        defuns.push(
            crate::parse::parse(
                "(defun assoc_set_sorted (m k v) (if m (if (= (f (f m)) k) (c (c k v) (r m)) (if (>s (f (f m)) k) (c (c k v) m) (c (f m) (assoc_set_sorted (r m) k v)))) (c (c k v) ())))",
            )
            .expect("assoc_set_sorted source"),
        );
    }
    defuns
}
