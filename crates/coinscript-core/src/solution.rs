use num_bigint::BigInt;

use crate::clvm;
use crate::error::{Error, Result};
use crate::hash;
use crate::opcodes;
use crate::parse::parse;
use crate::serialize::{serialize, SerializeOptions};
use crate::tree::TreeNode;

/// A value accepted by the solution builder. Strings starting with
/// `0x` decode as bytes, everything else becomes a symbol atom.
#[derive(Debug, Clone)]
pub enum SolutionValue {
    Int(BigInt),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Node(TreeNode),
}

impl SolutionValue {
    fn into_node(self) -> Result<TreeNode> {
        Ok(match self {
            SolutionValue::Int(value) => TreeNode::int(value),
            SolutionValue::Bool(value) => TreeNode::bool(value),
            SolutionValue::Text(text) => {
                if let Some(raw) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    let bytes = hex::decode(raw)
                        .map_err(|_| Error::builder(format!("invalid hex value `{text}`")))?;
                    TreeNode::bytes(bytes)
                } else {
                    TreeNode::symbol(text)
                }
            }
            SolutionValue::Bytes(bytes) => TreeNode::bytes(bytes),
            SolutionValue::Node(node) => node,
        })
    }
}

impl From<i64> for SolutionValue {
    fn from(value: i64) -> Self {
        SolutionValue::Int(value.into())
    }
}

impl From<u64> for SolutionValue {
    fn from(value: u64) -> Self {
        SolutionValue::Int(value.into())
    }
}

impl From<BigInt> for SolutionValue {
    fn from(value: BigInt) -> Self {
        SolutionValue::Int(value)
    }
}

impl From<bool> for SolutionValue {
    fn from(value: bool) -> Self {
        SolutionValue::Bool(value)
    }
}

impl From<&str> for SolutionValue {
    fn from(value: &str) -> Self {
        SolutionValue::Text(value.to_string())
    }
}

impl From<String> for SolutionValue {
    fn from(value: String) -> Self {
        SolutionValue::Text(value)
    }
}

impl From<Vec<u8>> for SolutionValue {
    fn from(value: Vec<u8>) -> Self {
        SolutionValue::Bytes(value)
    }
}

impl From<[u8; 32]> for SolutionValue {
    fn from(value: [u8; 32]) -> Self {
        SolutionValue::Bytes(value.to_vec())
    }
}

impl From<TreeNode> for SolutionValue {
    fn from(value: TreeNode) -> Self {
        SolutionValue::Node(value)
    }
}

/// Typed state record for `add_state`. Records flatten in declaration
/// order; maps become lists of `(key . value)` pairs, sorted by key
/// bytes when declared ordered and in insertion order otherwise.
#[derive(Debug, Clone)]
pub enum StateValue {
    Int(BigInt),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Record(Vec<StateValue>),
    Map(Vec<(String, StateValue)>),
    OrderedMap(Vec<(String, StateValue)>),
}

impl StateValue {
    pub fn int(value: impl Into<BigInt>) -> Self {
        StateValue::Int(value.into())
    }

    pub fn encode(&self) -> TreeNode {
        match self {
            StateValue::Int(value) => TreeNode::int(value.clone()),
            StateValue::Bool(value) => TreeNode::bool(*value),
            StateValue::Text(text) => TreeNode::bytes(text.as_bytes().to_vec()),
            StateValue::Bytes(bytes) => TreeNode::bytes(bytes.clone()),
            StateValue::Record(fields) => {
                TreeNode::list(fields.iter().map(StateValue::encode).collect())
            }
            StateValue::Map(entries) => encode_map(entries.iter()),
            StateValue::OrderedMap(entries) => {
                let mut sorted: Vec<&(String, StateValue)> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
                encode_map(sorted.into_iter())
            }
        }
    }
}

fn encode_map<'a>(entries: impl Iterator<Item = &'a (String, StateValue)>) -> TreeNode {
    TreeNode::list(
        entries
            .map(|(key, value)| {
                TreeNode::cons(TreeNode::bytes(key.as_bytes().to_vec()), value.encode())
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Structure {
    List,
    Cons,
    Raw,
}

/// Fluent construction of solution (argument) programs.
#[derive(Debug, Clone)]
pub struct SolutionBuilder {
    items: Vec<TreeNode>,
    structure: Structure,
    deferred_error: Option<Error>,
}

impl Default for SolutionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SolutionBuilder {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            structure: Structure::List,
            deferred_error: None,
        }
    }

    pub fn add(&mut self, value: impl Into<SolutionValue>) -> &mut Self {
        match value.into().into_node() {
            Ok(node) => self.items.push(node),
            Err(err) => self.defer(err),
        }
        self
    }

    pub fn add_nil(&mut self) -> &mut Self {
        self.items.push(TreeNode::nil());
        self
    }

    pub fn add_list(&mut self, build: impl FnOnce(&mut SolutionBuilder)) -> &mut Self {
        let mut child = SolutionBuilder::new();
        build(&mut child);
        match child.build() {
            Ok(node) => self.items.push(node),
            Err(err) => self.defer(err),
        }
        self
    }

    /// Appends a conditions list, e.g. for delegated spends.
    pub fn add_conditions(&mut self, build: impl FnOnce(&mut ConditionsBuilder)) -> &mut Self {
        let mut child = ConditionsBuilder::new();
        build(&mut child);
        match child.build() {
            Ok(node) => self.items.push(node),
            Err(err) => self.defer(err),
        }
        self
    }

    /// The canonical `(action_name (params…))` prefix consumed by
    /// generated dispatchers. Omitted params emit nil.
    pub fn add_action(&mut self, name: &str, params: Option<Vec<SolutionValue>>) -> &mut Self {
        self.items.push(TreeNode::symbol(name));
        match params {
            None => self.add_nil(),
            Some(values) => {
                let mut nodes = Vec::with_capacity(values.len());
                for value in values {
                    match value.into_node() {
                        Ok(node) => nodes.push(node),
                        Err(err) => {
                            self.defer(err);
                            return self;
                        }
                    }
                }
                self.items.push(TreeNode::list(nodes));
                self
            }
        }
    }

    pub fn add_state(&mut self, state: &StateValue) -> &mut Self {
        self.items.push(state.encode());
        self
    }

    pub fn add_merkle_proof(&mut self, hashes: &[[u8; 32]]) -> &mut Self {
        self.items.push(TreeNode::list(
            hashes
                .iter()
                .map(|h| TreeNode::bytes(h.to_vec()))
                .collect(),
        ));
        self
    }

    pub fn add_delegated_puzzle(&mut self, puzzle: &TreeNode, solution: &TreeNode) -> &mut Self {
        self.items.push(puzzle.clone());
        self.items.push(solution.clone());
        self
    }

    /// Raw ChiaLisp text, parsed to IR rather than inserted as an
    /// opaque symbol.
    pub fn add_raw(&mut self, chialisp: &str) -> &mut Self {
        match parse(chialisp) {
            Ok(node) => self.items.push(node),
            Err(err) => self.defer(err),
        }
        self
    }

    /// Switches to cons-cell structure: build requires exactly two
    /// items and emits `(a . b)`.
    pub fn as_cons_cell(&mut self) -> &mut Self {
        self.structure = Structure::Cons;
        self
    }

    /// Switches to raw structure: build requires exactly one item and
    /// emits it unwrapped.
    pub fn as_raw(&mut self) -> &mut Self {
        self.structure = Structure::Raw;
        self
    }

    fn defer(&mut self, err: Error) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(err);
        }
    }

    pub fn build(&self) -> Result<TreeNode> {
        if let Some(err) = &self.deferred_error {
            return Err(err.clone());
        }
        match self.structure {
            Structure::List => Ok(TreeNode::list(self.items.clone())),
            Structure::Cons => match self.items.as_slice() {
                [first, rest] => Ok(TreeNode::cons(first.clone(), rest.clone())),
                items => Err(Error::builder(format!(
                    "cons-cell solution needs exactly 2 items, got {}",
                    items.len()
                ))),
            },
            Structure::Raw => match self.items.as_slice() {
                [single] => Ok(single.clone()),
                items => Err(Error::builder(format!(
                    "raw solution needs exactly 1 item, got {}",
                    items.len()
                ))),
            },
        }
    }

    pub fn to_chialisp(&self) -> Result<String> {
        serialize(&self.build()?, &SerializeOptions::default())
    }

    /// Wire hex of the solution, ready for a coin spend.
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(clvm::serialize_ir(&self.build()?)?))
    }

    pub fn tree_hash(&self) -> Result<[u8; 32]> {
        Ok(hash::tree_hash(&self.build()?))
    }
}

/// Builds condition lists with numeric opcodes; solutions carry no
/// include set, so symbolic names would not resolve.
#[derive(Debug, Clone, Default)]
pub struct ConditionsBuilder {
    conditions: Vec<TreeNode>,
    deferred_error: Option<Error>,
}

impl ConditionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, values: Vec<SolutionValue>) -> &mut Self {
        let opcode = match opcodes::condition_opcode(name) {
            Some(code) => code,
            None => {
                self.defer(Error::builder(format!("unknown condition `{name}`")));
                return self;
            }
        };
        let mut nodes = Vec::with_capacity(values.len());
        for value in values {
            match value.into_node() {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    self.defer(err);
                    return self;
                }
            }
        }
        self.conditions.push(opcodes::numeric_condition(opcode, nodes));
        self
    }

    fn defer(&mut self, err: Error) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(err);
        }
    }

    pub fn create_coin(
        &mut self,
        puzzle_hash: impl Into<SolutionValue>,
        amount: impl Into<SolutionValue>,
    ) -> &mut Self {
        self.push("CREATE_COIN", vec![puzzle_hash.into(), amount.into()])
    }

    pub fn require_signature(
        &mut self,
        public_key: impl Into<SolutionValue>,
        message: impl Into<SolutionValue>,
    ) -> &mut Self {
        self.push("AGG_SIG_ME", vec![public_key.into(), message.into()])
    }

    pub fn reserve_fee(&mut self, amount: impl Into<SolutionValue>) -> &mut Self {
        self.push("RESERVE_FEE", vec![amount.into()])
    }

    pub fn create_announcement(&mut self, message: impl Into<SolutionValue>) -> &mut Self {
        self.push("CREATE_COIN_ANNOUNCEMENT", vec![message.into()])
    }

    pub fn assert_announcement(&mut self, id: impl Into<SolutionValue>) -> &mut Self {
        self.push("ASSERT_COIN_ANNOUNCEMENT", vec![id.into()])
    }

    pub fn remark(&mut self, message: impl Into<SolutionValue>) -> &mut Self {
        self.push("REMARK", vec![message.into()])
    }

    pub fn add_condition(&mut self, opcode: u64, values: Vec<SolutionValue>) -> &mut Self {
        let mut nodes = Vec::with_capacity(values.len());
        for value in values {
            match value.into_node() {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    self.defer(err);
                    return self;
                }
            }
        }
        self.conditions.push(opcodes::numeric_condition(opcode, nodes));
        self
    }

    pub fn build(&self) -> Result<TreeNode> {
        if let Some(err) = &self.deferred_error {
            return Err(err.clone());
        }
        Ok(TreeNode::list(self.conditions.clone()))
    }
}
