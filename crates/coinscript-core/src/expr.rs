use std::collections::BTreeSet;

use num_bigint::BigInt;

use crate::tree::TreeNode;

/// A ChiaLisp expression under construction. Wraps an IR node and the
/// feature flags its construction pulled in (e.g. `sha256tree`), so the
/// builder can compute the include set from what was actually used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    node: TreeNode,
    features: BTreeSet<String>,
}

impl Expression {
    pub fn from_node(node: TreeNode) -> Self {
        Self {
            node,
            features: BTreeSet::new(),
        }
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::from_node(TreeNode::symbol(name))
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Self::from_node(TreeNode::int(value))
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::from_node(TreeNode::bytes(value))
    }

    pub fn nil() -> Self {
        Self::from_node(TreeNode::nil())
    }

    pub fn node(&self) -> &TreeNode {
        &self.node
    }

    pub fn into_node(self) -> TreeNode {
        self.node
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    fn apply(op: &str, operands: Vec<Expression>) -> Self {
        let mut features = BTreeSet::new();
        let mut items = Vec::with_capacity(operands.len() + 1);
        items.push(TreeNode::symbol(op));
        for operand in operands {
            features.extend(operand.features);
            items.push(operand.node);
        }
        Self {
            node: TreeNode::list(items),
            features,
        }
    }

    pub fn add(self, other: impl Into<Expression>) -> Self {
        Self::apply("+", vec![self, other.into()])
    }

    pub fn sub(self, other: impl Into<Expression>) -> Self {
        Self::apply("-", vec![self, other.into()])
    }

    pub fn mul(self, other: impl Into<Expression>) -> Self {
        Self::apply("*", vec![self, other.into()])
    }

    pub fn div(self, other: impl Into<Expression>) -> Self {
        Self::apply("/", vec![self, other.into()])
    }

    pub fn divmod(self, other: impl Into<Expression>) -> Self {
        Self::apply("divmod", vec![self, other.into()])
    }

    pub fn gt(self, other: impl Into<Expression>) -> Self {
        Self::apply(">", vec![self, other.into()])
    }

    /// Byte-lexicographic comparison.
    pub fn gt_bytes(self, other: impl Into<Expression>) -> Self {
        Self::apply(">s", vec![self, other.into()])
    }

    pub fn eq(self, other: impl Into<Expression>) -> Self {
        Self::apply("=", vec![self, other.into()])
    }

    pub fn not(self) -> Self {
        Self::apply("not", vec![self])
    }

    /// Boolean conjunction via `all`, which evaluates strictly.
    pub fn and(self, other: impl Into<Expression>) -> Self {
        Self::apply("all", vec![self, other.into()])
    }

    /// Boolean disjunction via `any`.
    pub fn or(self, other: impl Into<Expression>) -> Self {
        Self::apply("any", vec![self, other.into()])
    }

    pub fn sha256(self, other: impl Into<Expression>) -> Self {
        Self::apply("sha256", vec![self, other.into()])
    }

    pub fn substr(self, start: impl Into<Expression>, end: impl Into<Expression>) -> Self {
        Self::apply("substr", vec![self, start.into(), end.into()])
    }

    pub fn strlen(self) -> Self {
        Self::apply("strlen", vec![self])
    }

    pub fn concat(self, other: impl Into<Expression>) -> Self {
        Self::apply("concat", vec![self, other.into()])
    }

    /// `sha256tree` over this expression; requires the library helper.
    pub fn tree_hash(self) -> Self {
        Self::apply("sha256tree", vec![self]).with_feature("sha256tree")
    }
}

impl From<TreeNode> for Expression {
    fn from(node: TreeNode) -> Self {
        Self::from_node(node)
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Self::int(value)
    }
}

impl From<u64> for Expression {
    fn from(value: u64) -> Self {
        Self::int(value)
    }
}

impl From<BigInt> for Expression {
    fn from(value: BigInt) -> Self {
        Self::int(value)
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Self::symbol(value)
    }
}

impl From<[u8; 32]> for Expression {
    fn from(value: [u8; 32]) -> Self {
        Self::bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Expression {
    fn from(value: Vec<u8>) -> Self {
        Self::bytes(value)
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Self::from_node(TreeNode::bool(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::to_source;

    #[test]
    fn operators_compose() {
        let expr = Expression::symbol("amount")
            .add(1_i64)
            .mul(Expression::symbol("rate"));
        assert_eq!(to_source(expr.node()).unwrap(), "(* (+ amount 1) rate)");
    }

    #[test]
    fn boolean_operators_use_all_and_any() {
        let expr = Expression::symbol("a").eq(1_i64).and(Expression::symbol("b").gt(2_i64));
        assert_eq!(to_source(expr.node()).unwrap(), "(all (= a 1) (> b 2))");
        let expr = Expression::symbol("a").or(Expression::symbol("b"));
        assert_eq!(to_source(expr.node()).unwrap(), "(any a b)");
    }

    #[test]
    fn tree_hash_tracks_its_feature() {
        let expr = Expression::symbol("state").tree_hash();
        assert!(expr.features().contains("sha256tree"));
        assert_eq!(to_source(expr.node()).unwrap(), "(sha256tree state)");
    }

    #[test]
    fn features_merge_across_operands() {
        let left = Expression::symbol("a").tree_hash();
        let combined = left.eq(Expression::symbol("b"));
        assert!(combined.features().contains("sha256tree"));
    }
}
