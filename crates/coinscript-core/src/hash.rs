use chia_sha2::Sha256;

use crate::tree::TreeNode;

enum TreeOp<'a> {
    Node(&'a TreeNode),
    Tail(&'a [TreeNode]),
    Cons,
}

pub fn tree_hash_atom(bytes: &[u8]) -> [u8; 32] {
    let mut sha256 = Sha256::new();
    sha256.update([1_u8]);
    sha256.update(bytes);
    sha256.finalize()
}

pub fn tree_hash_pair(first: [u8; 32], rest: [u8; 32]) -> [u8; 32] {
    let mut sha256 = Sha256::new();
    sha256.update([2_u8]);
    sha256.update(first);
    sha256.update(rest);
    sha256.finalize()
}

/// `sha256tree1` over the IR. Proper lists hash as the equivalent
/// right-nested cons chain, so both spellings of a list agree.
pub fn tree_hash(node: &TreeNode) -> [u8; 32] {
    let mut hashes: Vec<[u8; 32]> = Vec::new();
    let mut ops = vec![TreeOp::Node(node)];

    while let Some(op) = ops.pop() {
        match op {
            TreeOp::Node(node) => match node {
                TreeNode::Atom(atom) => hashes.push(tree_hash_atom(&atom.encode())),
                TreeNode::List(items) => {
                    ops.push(TreeOp::Tail(items));
                }
                TreeNode::Cons(first, rest) => {
                    ops.push(TreeOp::Cons);
                    ops.push(TreeOp::Node(first));
                    ops.push(TreeOp::Node(rest));
                }
            },
            TreeOp::Tail(items) => match items.split_first() {
                None => hashes.push(tree_hash_atom(&[])),
                Some((first, rest)) => {
                    ops.push(TreeOp::Cons);
                    ops.push(TreeOp::Node(first));
                    ops.push(TreeOp::Tail(rest));
                }
            },
            TreeOp::Cons => {
                let first = hashes.pop().expect("first hash");
                let rest = hashes.pop().expect("rest hash");
                hashes.push(tree_hash_pair(first, rest));
            }
        }
    }

    debug_assert!(hashes.len() == 1);
    hashes[0]
}

pub fn tree_hash_hex(node: &TreeNode) -> String {
    format!("0x{}", hex::encode(tree_hash(node)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeNode;

    #[test]
    fn nil_hash_matches_sha256_of_one() {
        // sha256(0x01)
        let expected = "4bf5122f344554c53bde2ebb8cd2b7e3d1600ad631c385a5d7cce23c7785459a";
        assert_eq!(hex::encode(tree_hash(&TreeNode::nil())), expected);
        assert_eq!(hex::encode(tree_hash(&TreeNode::List(Vec::new()))), expected);
        assert_eq!(hex::encode(tree_hash(&TreeNode::int(0))), expected);
    }

    #[test]
    fn pair_hash_composes_atom_hashes() {
        let left = TreeNode::bytes(vec![1, 2, 3]);
        let right = TreeNode::bytes(vec![4, 5, 6]);
        let pair = TreeNode::cons(left.clone(), right.clone());
        let expected = tree_hash_pair(tree_hash(&left), tree_hash(&right));
        assert_eq!(tree_hash(&pair), expected);
    }

    #[test]
    fn list_hash_equals_nested_cons_hash() {
        let list = TreeNode::list(vec![TreeNode::int(1), TreeNode::int(2), TreeNode::int(3)]);
        let conses = TreeNode::cons(
            TreeNode::int(1),
            TreeNode::cons(
                TreeNode::int(2),
                TreeNode::cons(TreeNode::int(3), TreeNode::nil()),
            ),
        );
        assert_eq!(tree_hash(&list), tree_hash(&conses));
        assert_eq!(tree_hash(&list), tree_hash(&list.normalize()));
    }

    #[test]
    fn deep_list_does_not_overflow() {
        let mut node = TreeNode::nil();
        for i in 0..10_000 {
            node = TreeNode::cons(TreeNode::int(i), node);
        }
        let _ = tree_hash(&node);
    }

    #[test]
    fn hex_helper_prefixes() {
        assert!(tree_hash_hex(&TreeNode::nil()).starts_with("0x4bf5122f"));
    }
}
