use std::collections::HashMap;
use std::rc::Rc;

use chialisp::classic::clvm::OPERATORS_LATEST_VERSION;
use chialisp::classic::clvm_tools::binutils::{assemble, disassemble};
use chialisp::classic::clvm_tools::clvmc::compile_clvm_text;
use chialisp::compiler::compiler::DefaultCompilerOpts;
use chialisp::compiler::comptypes::CompilerOpts;
use clvm_utils::tree_hash_from_bytes;
use clvmr::allocator::{Allocator, NodePtr, SExp};
use clvmr::chia_dialect::ChiaDialect;
use clvmr::reduction::Reduction;
use clvmr::run_program::run_program;
use clvmr::serde::{node_from_bytes_backrefs, node_to_bytes};

use crate::error::{Error, Result};
use crate::includes;
use crate::tree::TreeNode;

pub const DEFAULT_MAX_COST: u64 = 11_000_000_000;

/// A compiled CLVM program, held in wire form. All operations load the
/// bytes into a fresh allocator; the external library owns evaluation
/// semantics and hashing of the compiled form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClvmProgram {
    bytes: Vec<u8>,
}

impl ClvmProgram {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_hex(hex_text: &str) -> Result<Self> {
        let raw = hex_text
            .strip_prefix("0x")
            .or_else(|| hex_text.strip_prefix("0X"))
            .unwrap_or(hex_text)
            .trim();
        let bytes =
            hex::decode(raw).map_err(|e| Error::compile(format!("invalid program hex: {e}")))?;
        Ok(Self { bytes })
    }

    /// Assembles readable CLVM (not full ChiaLisp; no `mod` handling).
    pub fn assemble(source: &str) -> Result<Self> {
        let mut allocator = Allocator::new();
        let node = assemble(&mut allocator, source)
            .map_err(|e| Error::compile(format!("failed to assemble CLVM: {e}")))?;
        let bytes = node_to_bytes(&allocator, node)
            .map_err(|e| Error::compile(format!("failed to serialize CLVM: {e}")))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Wire hex without prefix, the puzzle-reveal form.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn to_hex_prefixed(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }

    /// On-chain puzzle hash of the compiled form.
    pub fn tree_hash(&self) -> Result<[u8; 32]> {
        let hash = tree_hash_from_bytes(&self.bytes)
            .map_err(|e| Error::compile(format!("invalid program bytes: {e}")))?;
        let mut out = [0_u8; 32];
        out.copy_from_slice(hash.as_ref());
        Ok(out)
    }

    pub fn tree_hash_hex(&self) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.tree_hash()?)))
    }

    /// Classic positional curry over the compiled form.
    pub fn curry(&self, args: &[TreeNode]) -> Result<ClvmProgram> {
        let mut allocator = Allocator::new();
        let program = self.node(&mut allocator)?;

        let mut env = allocator
            .new_atom(&[1])
            .map_err(|e| Error::compile(format!("allocator error: {e}")))?;
        let quote = env;
        for arg in args.iter().rev() {
            let value = ir_to_node(&mut allocator, arg)?;
            let quoted = new_pair(&mut allocator, quote, value)?;
            let nil = allocator.nil();
            let apply_tail = new_pair(&mut allocator, env, nil)?;
            let cons_args = new_pair(&mut allocator, quoted, apply_tail)?;
            let cons_kw = new_atom(&mut allocator, &[4])?;
            env = new_pair(&mut allocator, cons_kw, cons_args)?;
        }

        let quoted_program = new_pair(&mut allocator, quote, program)?;
        let nil = allocator.nil();
        let env_tail = new_pair(&mut allocator, env, nil)?;
        let apply_args = new_pair(&mut allocator, quoted_program, env_tail)?;
        let apply_kw = new_atom(&mut allocator, &[2])?;
        let curried = new_pair(&mut allocator, apply_kw, apply_args)?;

        let bytes = node_to_bytes(&allocator, curried)
            .map_err(|e| Error::compile(format!("failed to serialize CLVM: {e}")))?;
        Ok(ClvmProgram::from_bytes(bytes))
    }

    /// Runs the program against a solution value.
    pub fn run(&self, solution: &TreeNode, max_cost: u64) -> Result<(TreeNode, u64)> {
        let mut allocator = Allocator::new();
        let program = self.node(&mut allocator)?;
        let env = ir_to_node(&mut allocator, solution)?;
        let dialect = ChiaDialect::new(0);
        let Reduction(cost, output) =
            run_program(&mut allocator, &dialect, program, env, max_cost)
                .map_err(|e| Error::simulation(format!("{e}")))?;
        Ok((node_to_ir(&allocator, output), cost))
    }

    pub fn to_ir(&self) -> Result<TreeNode> {
        let mut allocator = Allocator::new();
        let node = self.node(&mut allocator)?;
        Ok(node_to_ir(&allocator, node))
    }

    pub fn disassemble(&self) -> Result<String> {
        let mut allocator = Allocator::new();
        let node = self.node(&mut allocator)?;
        Ok(disassemble(&allocator, node, Some(OPERATORS_LATEST_VERSION)))
    }

    fn node(&self, allocator: &mut Allocator) -> Result<NodePtr> {
        node_from_bytes_backrefs(allocator, &self.bytes)
            .map_err(|e| Error::compile(format!("failed to deserialize program: {e}")))
    }
}

/// Compiles ChiaLisp source text. Known `(include …)` references are
/// replaced with their inline library bodies first, so compilation
/// needs no search path; unknown includes pass through and fail in the
/// external compiler.
pub fn compile_chialisp(source: &str) -> Result<ClvmProgram> {
    let expanded = includes::expand_includes(source);
    let mut allocator = Allocator::new();
    let opts: Rc<dyn CompilerOpts> = Rc::new(DefaultCompilerOpts::new("puzzle.clsp"));
    let mut symbols = HashMap::new();
    let node = compile_clvm_text(
        &mut allocator,
        opts,
        &mut symbols,
        &expanded,
        "puzzle.clsp",
        true,
    )
    .map_err(|e| Error::compile(format!("{e:?}")))?;
    let bytes = node_to_bytes(&allocator, node)
        .map_err(|e| Error::compile(format!("failed to serialize compiled program: {e}")))?;
    Ok(ClvmProgram::from_bytes(bytes))
}

/// Serializes IR straight to CLVM wire bytes.
pub fn serialize_ir(node: &TreeNode) -> Result<Vec<u8>> {
    let mut allocator = Allocator::new();
    let ptr = ir_to_node(&mut allocator, node)?;
    node_to_bytes(&allocator, ptr)
        .map_err(|e| Error::compile(format!("failed to serialize CLVM: {e}")))
}

/// Converts IR to an allocator node. Atom kinds reduce to their minimal
/// byte encodings; list spellings become cons chains.
pub fn ir_to_node(allocator: &mut Allocator, node: &TreeNode) -> Result<NodePtr> {
    match node {
        TreeNode::Atom(atom) => {
            let bytes = atom.encode();
            if bytes.is_empty() {
                Ok(allocator.nil())
            } else {
                new_atom(allocator, &bytes)
            }
        }
        TreeNode::List(items) => {
            let mut tail = allocator.nil();
            for item in items.iter().rev() {
                let first = ir_to_node(allocator, item)?;
                tail = new_pair(allocator, first, tail)?;
            }
            Ok(tail)
        }
        TreeNode::Cons(first, rest) => {
            let first = ir_to_node(allocator, first)?;
            let rest = ir_to_node(allocator, rest)?;
            new_pair(allocator, first, rest)
        }
    }
}

/// Converts an allocator node back to IR. Atom kinds cannot be
/// recovered from bytes: empty atoms become nil, everything else a
/// byte atom; pairs with nil-terminated tails fold back to lists.
pub fn node_to_ir(allocator: &Allocator, node: NodePtr) -> TreeNode {
    match allocator.sexp(node) {
        SExp::Atom => {
            let bytes = allocator.atom(node).as_ref().to_vec();
            if bytes.is_empty() {
                TreeNode::nil()
            } else {
                TreeNode::bytes(bytes)
            }
        }
        SExp::Pair(first, rest) => {
            let first = node_to_ir(allocator, first);
            match node_to_ir(allocator, rest) {
                TreeNode::List(mut items) => {
                    items.insert(0, first);
                    TreeNode::List(items)
                }
                tail if tail.is_nil() => TreeNode::List(vec![first]),
                tail => TreeNode::cons(first, tail),
            }
        }
    }
}

fn new_atom(allocator: &mut Allocator, bytes: &[u8]) -> Result<NodePtr> {
    allocator
        .new_atom(bytes)
        .map_err(|e| Error::compile(format!("allocator error: {e}")))
}

fn new_pair(allocator: &mut Allocator, first: NodePtr, rest: NodePtr) -> Result<NodePtr> {
    allocator
        .new_pair(first, rest)
        .map_err(|e| Error::compile(format!("allocator error: {e}")))
}
