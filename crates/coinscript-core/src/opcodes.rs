//! Closed tables for condition opcodes and primitive CLVM operators.

use crate::tree::TreeNode;

/// Condition opcodes recognized by the serializer and the builders.
pub const CONDITION_CODES: &[(&str, u64)] = &[
    ("REMARK", 1),
    ("AGG_SIG_UNSAFE", 49),
    ("AGG_SIG_ME", 50),
    ("CREATE_COIN", 51),
    ("RESERVE_FEE", 52),
    ("CREATE_COIN_ANNOUNCEMENT", 60),
    ("ASSERT_COIN_ANNOUNCEMENT", 61),
    ("CREATE_PUZZLE_ANNOUNCEMENT", 62),
    ("ASSERT_PUZZLE_ANNOUNCEMENT", 63),
    ("ASSERT_MY_COIN_ID", 70),
    ("ASSERT_MY_PARENT_ID", 71),
    ("ASSERT_MY_PUZZLEHASH", 72),
    ("ASSERT_MY_AMOUNT", 73),
    ("ASSERT_SECONDS_RELATIVE", 80),
    ("ASSERT_SECONDS_ABSOLUTE", 81),
    ("ASSERT_HEIGHT_RELATIVE", 82),
    ("ASSERT_HEIGHT_ABSOLUTE", 83),
];

/// Primitive operators: symbolic alias, keyword, opcode. The serializer
/// renders the keyword unless `opcodes.clib` is included, in which case
/// the alias is kept.
pub const CLVM_OPERATORS: &[(&str, &str, u8)] = &[
    ("QUOTE", "q", 1),
    ("APPLY", "a", 2),
    ("IF", "i", 3),
    ("CONS", "c", 4),
    ("FIRST", "f", 5),
    ("REST", "r", 6),
    ("LISTP", "l", 7),
    ("RAISE", "x", 8),
    ("EQ", "=", 9),
    ("GTS", ">s", 10),
    ("SHA256", "sha256", 11),
    ("SUBSTR", "substr", 12),
    ("STRLEN", "strlen", 13),
    ("CONCAT", "concat", 14),
    ("ADD", "+", 16),
    ("SUBTRACT", "-", 17),
    ("MULTIPLY", "*", 18),
    ("DIVIDE", "/", 19),
    ("DIVMOD", "divmod", 20),
    ("GT", ">", 21),
    ("ASH", "ash", 22),
    ("LSH", "lsh", 23),
    ("LOGAND", "logand", 24),
    ("LOGIOR", "logior", 25),
    ("LOGXOR", "logxor", 26),
    ("LOGNOT", "lognot", 27),
    ("POINT_ADD", "point_add", 28),
    ("PUBKEY_FOR_EXP", "pubkey_for_exp", 29),
    ("NOT", "not", 30),
    ("ANY", "any", 31),
    ("ALL", "all", 32),
    ("SOFTFORK", "softfork", 33),
];

pub fn condition_name(opcode: u64) -> Option<&'static str> {
    CONDITION_CODES
        .iter()
        .find(|(_, code)| *code == opcode)
        .map(|(name, _)| *name)
}

pub fn condition_opcode(name: &str) -> Option<u64> {
    CONDITION_CODES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, code)| *code)
}

pub fn operator_keyword(alias: &str) -> Option<&'static str> {
    CLVM_OPERATORS
        .iter()
        .find(|(candidate, _, _)| *candidate == alias)
        .map(|(_, keyword, _)| *keyword)
}

pub fn operator_alias(keyword: &str) -> Option<&'static str> {
    CLVM_OPERATORS
        .iter()
        .find(|(_, candidate, _)| *candidate == keyword)
        .map(|(alias, _, _)| *alias)
}

/// A condition list headed by the symbolic opcode name; serialization
/// and compilation resolve the name through `condition_codes.clib`.
pub fn symbolic_condition(name: &str, args: Vec<TreeNode>) -> TreeNode {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(TreeNode::symbol(name));
    items.extend(args);
    TreeNode::list(items)
}

/// A condition list headed by the raw opcode integer, for contexts with
/// no include set (solutions, quoted condition lists).
pub fn numeric_condition(opcode: u64, args: Vec<TreeNode>) -> TreeNode {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(TreeNode::int(opcode));
    items.extend(args);
    TreeNode::list(items)
}

/// Rewrites a symbolic condition head to its numeric opcode. Used when
/// folding constant condition lists under a quote, where symbol
/// substitution would not reach.
pub fn to_numeric_head(node: &TreeNode) -> TreeNode {
    let Some(items) = node.proper_list() else {
        return node.clone();
    };
    let Some((head, rest)) = items.split_first() else {
        return node.clone();
    };
    match head.as_symbol().and_then(condition_opcode) {
        Some(code) => {
            let mut out = vec![TreeNode::int(code)];
            out.extend(rest.iter().cloned());
            TreeNode::list(out)
        }
        None => node.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_table_round_trips() {
        for (name, code) in CONDITION_CODES {
            assert_eq!(condition_name(*code), Some(*name));
            assert_eq!(condition_opcode(name), Some(*code));
        }
        assert_eq!(condition_name(51), Some("CREATE_COIN"));
        assert_eq!(condition_opcode("AGG_SIG_ME"), Some(50));
        assert_eq!(condition_name(42), None);
    }

    #[test]
    fn operator_table_round_trips() {
        assert_eq!(operator_keyword("CONS"), Some("c"));
        assert_eq!(operator_alias("c"), Some("CONS"));
        assert_eq!(operator_alias(">s"), Some("GTS"));
        assert_eq!(operator_keyword("NO_SUCH"), None);
    }
}
