use num_bigint::BigInt;
use num_traits::Zero;

/// Atom payloads. The kinds only affect how a value is rendered back to
/// source text; equality and hashing always go through the minimal byte
/// encoding, so `0`, nil and the empty byte string are the same atom.
#[derive(Debug, Clone)]
pub enum Atom {
    Nil,
    Int(BigInt),
    Bytes(Vec<u8>),
    Symbol(String),
    Str(String),
}

impl Atom {
    /// Minimal byte encoding: nil is empty, integers are minimal
    /// two's complement (zero is empty), text is UTF-8.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Atom::Nil => Vec::new(),
            Atom::Int(value) => {
                if value.is_zero() {
                    Vec::new()
                } else {
                    value.to_signed_bytes_be()
                }
            }
            Atom::Bytes(bytes) => bytes.clone(),
            Atom::Symbol(text) | Atom::Str(text) => text.as_bytes().to_vec(),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.encode().is_empty()
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.encode() == other.encode()
    }
}

impl Eq for Atom {}

/// A ChiaLisp expression tree. `List` is shorthand for a right-nested
/// cons chain terminated by nil; the two spellings compare equal and
/// hash identically.
#[derive(Debug, Clone)]
pub enum TreeNode {
    Atom(Atom),
    List(Vec<TreeNode>),
    Cons(Box<TreeNode>, Box<TreeNode>),
}

impl TreeNode {
    pub fn nil() -> Self {
        TreeNode::Atom(Atom::Nil)
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        TreeNode::Atom(Atom::Int(value.into()))
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        TreeNode::Atom(Atom::Bytes(value.into()))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        TreeNode::Atom(Atom::Symbol(name.into()))
    }

    pub fn string(text: impl Into<String>) -> Self {
        TreeNode::Atom(Atom::Str(text.into()))
    }

    /// Booleans follow the CLVM convention: true is `1`, false is nil.
    pub fn bool(value: bool) -> Self {
        if value {
            TreeNode::int(1)
        } else {
            TreeNode::nil()
        }
    }

    pub fn list(items: Vec<TreeNode>) -> Self {
        TreeNode::List(items)
    }

    pub fn cons(first: TreeNode, rest: TreeNode) -> Self {
        TreeNode::Cons(Box::new(first), Box::new(rest))
    }

    pub fn is_nil(&self) -> bool {
        match self {
            TreeNode::Atom(atom) => atom.is_nil(),
            TreeNode::List(items) => items.is_empty(),
            TreeNode::Cons(..) => false,
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, TreeNode::Atom(_)) || self.is_nil()
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            TreeNode::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            TreeNode::Atom(Atom::Symbol(name)) => Some(name),
            _ => None,
        }
    }

    /// Splits off the first element. Nil (in either spelling) has no
    /// head; an improper cons splits into its two halves.
    pub fn uncons(&self) -> Option<(TreeNode, TreeNode)> {
        match self {
            TreeNode::Atom(_) => None,
            TreeNode::List(items) => {
                let (first, rest) = items.split_first()?;
                Some((first.clone(), TreeNode::List(rest.to_vec())))
            }
            TreeNode::Cons(first, rest) => Some((first.as_ref().clone(), rest.as_ref().clone())),
        }
    }

    /// The elements of a nil-terminated chain, or `None` for atoms and
    /// improper lists.
    pub fn proper_list(&self) -> Option<Vec<TreeNode>> {
        match self {
            TreeNode::Atom(atom) => {
                if atom.is_nil() {
                    Some(Vec::new())
                } else {
                    None
                }
            }
            TreeNode::List(items) => Some(items.clone()),
            TreeNode::Cons(first, rest) => {
                let mut items = vec![first.as_ref().clone()];
                items.extend(rest.proper_list()?);
                Some(items)
            }
        }
    }

    /// Canonical form: nil-terminated cons chains collapse to `List`,
    /// improper chains stay `Cons` with normalized halves.
    pub fn normalize(&self) -> TreeNode {
        match self {
            TreeNode::Atom(atom) => {
                if atom.is_nil() {
                    TreeNode::nil()
                } else {
                    TreeNode::Atom(atom.clone())
                }
            }
            TreeNode::List(items) => {
                TreeNode::List(items.iter().map(TreeNode::normalize).collect())
            }
            TreeNode::Cons(first, rest) => {
                let first = first.normalize();
                match rest.normalize() {
                    TreeNode::List(mut items) => {
                        items.insert(0, first);
                        TreeNode::List(items)
                    }
                    TreeNode::Atom(atom) if atom.is_nil() => TreeNode::List(vec![first]),
                    tail => TreeNode::cons(first, tail),
                }
            }
        }
    }

    /// Number of elements when this node is a proper list.
    pub fn len(&self) -> Option<usize> {
        self.proper_list().map(|items| items.len())
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        match (self.uncons(), other.uncons()) {
            (None, None) => match (self, other) {
                (TreeNode::Atom(a), TreeNode::Atom(b)) => a == b,
                // one side is an empty list, the other nil or empty
                _ => self.is_nil() && other.is_nil(),
            },
            (Some((f1, r1)), Some((f2, r2))) => f1 == f2 && r1 == r2,
            _ => false,
        }
    }
}

impl Eq for TreeNode {}

impl From<Atom> for TreeNode {
    fn from(atom: Atom) -> Self {
        TreeNode::Atom(atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_spellings_are_equal() {
        assert_eq!(TreeNode::nil(), TreeNode::List(Vec::new()));
        assert_eq!(TreeNode::nil(), TreeNode::int(0));
        assert_eq!(TreeNode::nil(), TreeNode::bytes(Vec::new()));
        assert!(TreeNode::int(0).is_nil());
    }

    #[test]
    fn list_equals_nested_cons() {
        let list = TreeNode::list(vec![TreeNode::int(1), TreeNode::int(2)]);
        let conses = TreeNode::cons(
            TreeNode::int(1),
            TreeNode::cons(TreeNode::int(2), TreeNode::nil()),
        );
        assert_eq!(list, conses);
        assert_eq!(conses.normalize(), list);
    }

    #[test]
    fn improper_cons_stays_improper() {
        let pair = TreeNode::cons(TreeNode::int(1), TreeNode::int(2));
        assert_eq!(pair.normalize(), pair);
        assert!(pair.proper_list().is_none());
        assert_ne!(pair, TreeNode::list(vec![TreeNode::int(1), TreeNode::int(2)]));
    }

    #[test]
    fn integer_encoding_is_minimal_twos_complement() {
        assert_eq!(Atom::Int(BigInt::from(0)).encode(), Vec::<u8>::new());
        assert_eq!(Atom::Int(BigInt::from(127)).encode(), vec![0x7f]);
        assert_eq!(Atom::Int(BigInt::from(128)).encode(), vec![0x00, 0x80]);
        assert_eq!(Atom::Int(BigInt::from(-1)).encode(), vec![0xff]);
        assert_eq!(Atom::Int(BigInt::from(-128)).encode(), vec![0x80]);
        assert_eq!(Atom::Int(BigInt::from(1000)).encode(), vec![0x03, 0xe8]);
    }

    #[test]
    fn atoms_compare_by_encoding() {
        assert_eq!(
            TreeNode::symbol("A"),
            TreeNode::bytes(vec![0x41]),
        );
        assert_eq!(TreeNode::string("A"), TreeNode::symbol("A"));
        assert_ne!(TreeNode::symbol("A"), TreeNode::symbol("B"));
    }

    #[test]
    fn proper_list_walks_cons_chain() {
        let chain = TreeNode::cons(
            TreeNode::int(1),
            TreeNode::List(vec![TreeNode::int(2), TreeNode::int(3)]),
        );
        let items = chain.proper_list().expect("proper");
        assert_eq!(items.len(), 3);
        assert_eq!(chain.len(), Some(3));
    }
}
