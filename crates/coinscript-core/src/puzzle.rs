use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::clvm::{self, ClvmProgram, DEFAULT_MAX_COST};
use crate::curry::substitute;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::hash;
use crate::includes;
use crate::opcodes;
use crate::parse::parse;
use crate::serialize::{serialize, SerializeOptions};
use crate::tree::TreeNode;

#[derive(Debug, Clone)]
struct BodyNode {
    node: TreeNode,
    is_condition: bool,
}

#[derive(Debug, Clone)]
struct IfFrame {
    condition: TreeNode,
    then_branch: Option<Vec<BodyNode>>,
}

/// Fluent construction of puzzle IR. Conditions and expressions
/// accumulate in order; curried and solution parameters, includes and
/// feature flags ride along as metadata until [`PuzzleBuilder::build`]
/// assembles the final `(mod …)` form.
#[derive(Debug, Clone, Default)]
pub struct PuzzleBuilder {
    nodes: Vec<BodyNode>,
    curried: Vec<(String, TreeNode)>,
    pending_curried: Vec<String>,
    solution_params: Vec<String>,
    includes: Vec<String>,
    features: BTreeSet<String>,
    block_comments: Vec<String>,
    param_comments: BTreeMap<String, String>,
    custom_mod: Option<Vec<TreeNode>>,
    bare: bool,
    guards: Vec<TreeNode>,
    if_stack: Vec<IfFrame>,
    deferred_error: Option<Error>,
}

impl PuzzleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a ChiaLisp `mod`, classifying uppercase parameters as
    /// curried and lowercase ones as solution parameters. The loaded
    /// body is kept as-is and only re-wrapped at build time.
    pub fn from_chialisp(source: &str) -> Result<Self> {
        let node = parse(source)?;
        let mut builder = Self::new();

        let forms = match node.proper_list() {
            Some(items)
                if items.first().and_then(TreeNode::as_symbol) == Some("mod")
                    && items.len() >= 3 =>
            {
                items
            }
            _ => {
                builder.custom_mod = Some(vec![node]);
                builder.bare = true;
                return Ok(builder);
            }
        };

        let params = &forms[1];
        match params.as_symbol() {
            Some(name) if name != "@" => builder.solution_params.push(name.to_string()),
            Some(_) => {}
            None => {
                for param in params.proper_list().unwrap_or_default() {
                    let name = param
                        .as_symbol()
                        .ok_or_else(|| Error::builder("mod parameter is not a symbol"))?
                        .to_string();
                    if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                        builder.pending_curried.push(name);
                    } else {
                        builder.solution_params.push(name);
                    }
                }
            }
        }

        let mut body = Vec::new();
        for form in &forms[2..] {
            let include = form.proper_list().and_then(|items| {
                if items.first().and_then(TreeNode::as_symbol) == Some("include") {
                    items.get(1).and_then(TreeNode::as_symbol).map(str::to_string)
                } else {
                    None
                }
            });
            match include {
                Some(name) => builder.includes.push(name),
                None => body.push(form.clone()),
            }
        }
        builder.custom_mod = Some(body);
        Ok(builder)
    }

    pub fn from_chialisp_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::parse_eof(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_chialisp(&source)
    }

    // --- parameters -----------------------------------------------------

    pub fn with_curried_param(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Expression>,
    ) -> &mut Self {
        let name = name.into();
        let value = value.into();
        self.features.extend(value.features().iter().cloned());
        self.pending_curried.retain(|pending| *pending != name);
        self.curried.retain(|(existing, _)| *existing != name);
        self.curried.push((name, value.into_node()));
        self
    }

    pub fn with_solution_param(&mut self, name: impl Into<String>) -> &mut Self {
        self.solution_params.push(name.into());
        self
    }

    pub fn with_solution_params(
        &mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        for name in names {
            self.solution_params.push(name.into());
        }
        self
    }

    pub fn include(&mut self, library: impl Into<String>) -> &mut Self {
        self.includes.push(library.into());
        self
    }

    pub fn block_comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.block_comments.push(text.into());
        self
    }

    pub fn param_comment(
        &mut self,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> &mut Self {
        self.param_comments.insert(name.into(), text.into());
        self
    }

    /// Emit the body without a `(mod …)` wrapper.
    pub fn without_mod(&mut self) -> &mut Self {
        self.bare = true;
        self
    }

    /// Installs pre-assembled body forms (defuns plus the dispatch
    /// expression); build only substitutes curried names and wraps the
    /// mod around them.
    pub(crate) fn set_custom_body(&mut self, forms: Vec<TreeNode>) {
        self.custom_mod = Some(forms);
    }

    pub(crate) fn add_features(&mut self, features: impl IntoIterator<Item = String>) {
        self.features.extend(features);
    }

    // --- conditions -----------------------------------------------------

    fn push_condition(&mut self, name: &'static str, args: Vec<Expression>) -> &mut Self {
        let mut nodes = Vec::with_capacity(args.len());
        for arg in args {
            self.features.extend(arg.features().iter().cloned());
            nodes.push(arg.into_node());
        }
        self.features.insert(name.to_string());
        self.push(BodyNode {
            node: opcodes::symbolic_condition(name, nodes),
            is_condition: true,
        });
        self
    }

    fn push(&mut self, node: BodyNode) {
        self.nodes.push(node);
    }

    pub fn create_coin(
        &mut self,
        puzzle_hash: impl Into<Expression>,
        amount: impl Into<Expression>,
    ) -> &mut Self {
        self.push_condition("CREATE_COIN", vec![puzzle_hash.into(), amount.into()])
    }

    pub fn create_coin_with_memos(
        &mut self,
        puzzle_hash: impl Into<Expression>,
        amount: impl Into<Expression>,
        memos: Vec<Expression>,
    ) -> &mut Self {
        let memo_list = TreeNode::list(memos.into_iter().map(Expression::into_node).collect());
        self.push_condition(
            "CREATE_COIN",
            vec![
                puzzle_hash.into(),
                amount.into(),
                Expression::from_node(memo_list),
            ],
        )
    }

    /// `AGG_SIG_ME` with the default (empty) message.
    pub fn require_signature(&mut self, public_key: impl Into<Expression>) -> &mut Self {
        self.push_condition("AGG_SIG_ME", vec![public_key.into(), Expression::nil()])
    }

    pub fn require_signature_with_message(
        &mut self,
        public_key: impl Into<Expression>,
        message: impl Into<Expression>,
    ) -> &mut Self {
        self.push_condition("AGG_SIG_ME", vec![public_key.into(), message.into()])
    }

    /// `AGG_SIG_UNSAFE`; the message must be spelled out.
    pub fn require_signature_unsafe(
        &mut self,
        public_key: impl Into<Expression>,
        message: impl Into<Expression>,
    ) -> &mut Self {
        self.push_condition("AGG_SIG_UNSAFE", vec![public_key.into(), message.into()])
    }

    pub fn require_after_seconds(&mut self, seconds: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_SECONDS_RELATIVE", vec![seconds.into()])
    }

    pub fn require_after_seconds_absolute(&mut self, seconds: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_SECONDS_ABSOLUTE", vec![seconds.into()])
    }

    pub fn require_after_height(&mut self, height: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_HEIGHT_RELATIVE", vec![height.into()])
    }

    pub fn require_after_height_absolute(&mut self, height: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_HEIGHT_ABSOLUTE", vec![height.into()])
    }

    /// The before-variants sit outside the symbolic catalog and are
    /// emitted with raw opcodes.
    pub fn require_before_seconds(&mut self, seconds: impl Into<Expression>) -> &mut Self {
        self.add_condition(85, vec![seconds.into()])
    }

    pub fn require_before_height(&mut self, height: impl Into<Expression>) -> &mut Self {
        self.add_condition(87, vec![height.into()])
    }

    pub fn reserve_fee(&mut self, amount: impl Into<Expression>) -> &mut Self {
        self.push_condition("RESERVE_FEE", vec![amount.into()])
    }

    pub fn create_announcement(&mut self, message: impl Into<Expression>) -> &mut Self {
        self.push_condition("CREATE_COIN_ANNOUNCEMENT", vec![message.into()])
    }

    pub fn assert_announcement(&mut self, announcement_id: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_COIN_ANNOUNCEMENT", vec![announcement_id.into()])
    }

    pub fn create_puzzle_announcement(&mut self, message: impl Into<Expression>) -> &mut Self {
        self.push_condition("CREATE_PUZZLE_ANNOUNCEMENT", vec![message.into()])
    }

    pub fn assert_puzzle_announcement(
        &mut self,
        announcement_id: impl Into<Expression>,
    ) -> &mut Self {
        self.push_condition("ASSERT_PUZZLE_ANNOUNCEMENT", vec![announcement_id.into()])
    }

    pub fn assert_my_coin_id(&mut self, coin_id: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_MY_COIN_ID", vec![coin_id.into()])
    }

    pub fn assert_my_parent_id(&mut self, parent_id: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_MY_PARENT_ID", vec![parent_id.into()])
    }

    pub fn assert_my_puzzle_hash(&mut self, puzzle_hash: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_MY_PUZZLEHASH", vec![puzzle_hash.into()])
    }

    pub fn assert_my_amount(&mut self, amount: impl Into<Expression>) -> &mut Self {
        self.push_condition("ASSERT_MY_AMOUNT", vec![amount.into()])
    }

    pub fn remark(&mut self, message: impl Into<Expression>) -> &mut Self {
        self.push_condition("REMARK", vec![message.into()])
    }

    /// Raw condition with a numeric opcode; no feature is recorded and
    /// no symbolic name is ever rendered for it.
    pub fn add_condition(&mut self, opcode: u64, args: Vec<Expression>) -> &mut Self {
        for arg in &args {
            self.features.extend(arg.features().iter().cloned());
        }
        let nodes = args.into_iter().map(Expression::into_node).collect();
        self.push(BodyNode {
            node: opcodes::numeric_condition(opcode, nodes),
            is_condition: true,
        });
        self
    }

    /// Guards the whole body: build wraps it in the `assert` macro so
    /// the spend raises when any predicate is false.
    pub fn require(&mut self, predicate: impl Into<Expression>) -> &mut Self {
        let predicate = predicate.into();
        self.features.extend(predicate.features().iter().cloned());
        self.features.insert("assert".to_string());
        self.guards.push(predicate.into_node());
        self
    }

    /// Appends a bare expression to the body.
    pub fn returns(&mut self, expr: impl Into<Expression>) -> &mut Self {
        let expr = expr.into();
        self.features.extend(expr.features().iter().cloned());
        self.push(BodyNode {
            node: expr.into_node(),
            is_condition: false,
        });
        self
    }

    pub fn raise(&mut self) -> &mut Self {
        self.push(BodyNode {
            node: TreeNode::list(vec![TreeNode::symbol("x")]),
            is_condition: false,
        });
        self
    }

    // --- control flow ---------------------------------------------------

    pub fn if_(&mut self, condition: impl Into<Expression>) -> &mut Self {
        let condition = condition.into();
        if self
            .if_stack
            .last()
            .is_some_and(|frame| frame.then_branch.is_none())
        {
            self.defer(Error::builder("if() opened before the previous then()"));
            return self;
        }
        self.features.extend(condition.features().iter().cloned());
        self.if_stack.push(IfFrame {
            condition: condition.into_node(),
            then_branch: None,
        });
        self
    }

    pub fn then(&mut self, build: impl FnOnce(&mut PuzzleBuilder)) -> &mut Self {
        match self.if_stack.last() {
            None => {
                self.defer(Error::builder("then() without if()"));
                return self;
            }
            Some(frame) if frame.then_branch.is_some() => {
                self.defer(Error::builder("then() called twice for one if()"));
                return self;
            }
            Some(_) => {}
        }
        let branch = self.collect_branch(build);
        if let Some(frame) = self.if_stack.last_mut() {
            frame.then_branch = Some(branch);
        }
        self
    }

    pub fn else_if(&mut self, condition: impl Into<Expression>) -> &mut Self {
        if !self
            .if_stack
            .last()
            .is_some_and(|frame| frame.then_branch.is_some())
        {
            self.defer(Error::builder("else_if() without if().then()"));
            return self;
        }
        let condition = condition.into();
        self.features.extend(condition.features().iter().cloned());
        self.if_stack.push(IfFrame {
            condition: condition.into_node(),
            then_branch: None,
        });
        self
    }

    pub fn else_(&mut self, build: impl FnOnce(&mut PuzzleBuilder)) -> &mut Self {
        if !self
            .if_stack
            .last()
            .is_some_and(|frame| frame.then_branch.is_some())
        {
            self.defer(Error::builder("else() without if().then()"));
            return self;
        }
        let branch = self.collect_branch(build);
        let mut else_expr = fold_branch(&branch);
        while let Some(frame) = self.if_stack.pop() {
            let then_expr = fold_branch(frame.then_branch.as_deref().unwrap_or_default());
            else_expr = TreeNode::list(vec![
                TreeNode::symbol("if"),
                frame.condition,
                then_expr,
                else_expr,
            ]);
        }
        self.nodes.push(BodyNode {
            node: else_expr,
            is_condition: false,
        });
        self
    }

    fn collect_branch(&mut self, build: impl FnOnce(&mut PuzzleBuilder)) -> Vec<BodyNode> {
        let mut child = PuzzleBuilder::new();
        build(&mut child);
        self.features.extend(child.features);
        self.includes.extend(child.includes);
        if let Some(err) = child.deferred_error {
            self.defer(err);
        }
        child.nodes
    }

    fn defer(&mut self, err: Error) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(err);
        }
    }

    // --- build ----------------------------------------------------------

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    pub fn build(&self) -> Result<Puzzle> {
        if let Some(err) = &self.deferred_error {
            return Err(err.clone());
        }

        // open if() frames: then() is required, a missing else() folds
        // against nil
        let mut trailing: Option<TreeNode> = None;
        if !self.if_stack.is_empty() {
            let mut else_expr = TreeNode::nil();
            for frame in self.if_stack.iter().rev() {
                let Some(then_branch) = &frame.then_branch else {
                    return Err(Error::builder("if() without then()"));
                };
                else_expr = TreeNode::list(vec![
                    TreeNode::symbol("if"),
                    frame.condition.clone(),
                    fold_branch(then_branch),
                    else_expr,
                ]);
            }
            trailing = Some(else_expr);
        }

        if let Some(name) = self.pending_curried.first() {
            return Err(Error::builder(format!(
                "curried parameter `{name}` has no value"
            )));
        }
        for (name, _) in &self.curried {
            if self.solution_params.contains(name) {
                return Err(Error::builder(format!(
                    "`{name}` is both curried and a solution parameter"
                )));
            }
        }

        let includes = includes::determine_required_includes(&self.features, &self.includes)?;
        let bindings: BTreeMap<String, TreeNode> = self.curried.iter().cloned().collect();

        if let Some(custom) = &self.custom_mod {
            let body: Vec<TreeNode> = custom
                .iter()
                .map(|form| substitute(form, &bindings))
                .collect();
            let ir = if self.bare {
                match body.as_slice() {
                    [single] => single.clone(),
                    _ => {
                        return Err(Error::builder(
                            "bare puzzle must have exactly one body form",
                        ));
                    }
                }
            } else {
                assemble_mod(&self.solution_params, &includes, body)
            };
            return Ok(self.finish(ir, includes));
        }

        let mut nodes = self.nodes.clone();
        if let Some(node) = trailing {
            nodes.push(BodyNode {
                node,
                is_condition: false,
            });
        }

        let mut body = fold_body(&nodes);
        if !self.guards.is_empty() {
            let mut items = vec![TreeNode::symbol("assert")];
            items.extend(self.guards.iter().cloned());
            items.push(body);
            body = TreeNode::list(items);
        }
        let body = substitute(&body, &bindings);
        let ir = if self.bare {
            body
        } else {
            assemble_mod(&self.solution_params, &includes, vec![body])
        };
        Ok(self.finish(ir, includes))
    }

    fn finish(&self, ir: TreeNode, includes: Vec<String>) -> Puzzle {
        Puzzle {
            source: PuzzleSource::Ir(ir),
            included_libraries: includes.into_iter().collect(),
            block_comments: self.block_comments.clone(),
            param_comments: self.param_comments.clone(),
        }
    }
}

fn assemble_mod(params: &[String], includes: &[String], body: Vec<TreeNode>) -> TreeNode {
    let param_node = if params.is_empty() {
        TreeNode::symbol("@")
    } else {
        TreeNode::list(params.iter().map(TreeNode::symbol).collect())
    };
    let mut items = vec![TreeNode::symbol("mod"), param_node];
    for library in includes {
        items.push(TreeNode::list(vec![
            TreeNode::symbol("include"),
            TreeNode::symbol(library),
        ]));
    }
    items.extend(body);
    TreeNode::list(items)
}

/// Folds a node sequence into a single expression evaluating to a
/// conditions list. A fully constant sequence of conditions folds to a
/// quoted list (with numeric opcodes, since quoting is opaque to
/// constant substitution); otherwise conditions become `(list …)` calls
/// consed together. A trailing bare expression becomes the list tail,
/// and a lone expression passes through untouched.
fn fold_body(nodes: &[BodyNode]) -> TreeNode {
    if nodes.is_empty() {
        return TreeNode::nil();
    }
    if nodes.len() == 1 && !nodes[0].is_condition {
        return nodes[0].node.clone();
    }

    if nodes.iter().all(|n| n.is_condition && is_constant(&n.node)) {
        let quoted: Vec<TreeNode> = nodes
            .iter()
            .map(|n| opcodes::to_numeric_head(&n.node))
            .collect();
        return TreeNode::cons(TreeNode::symbol("q"), TreeNode::list(quoted));
    }

    let (tail, elements) = match nodes.split_last() {
        Some((last, rest)) if !last.is_condition => (last.node.clone(), rest),
        _ => (TreeNode::nil(), nodes),
    };

    let mut out = tail;
    for element in elements.iter().rev() {
        let item = if element.is_condition {
            as_list_call(&element.node)
        } else {
            element.node.clone()
        };
        out = TreeNode::list(vec![TreeNode::symbol("c"), item, out]);
    }
    out
}

fn fold_branch(nodes: &[BodyNode]) -> TreeNode {
    fold_body(nodes)
}

/// `(CREATE_COIN ph amt)` → `(list CREATE_COIN ph amt)`.
fn as_list_call(node: &TreeNode) -> TreeNode {
    let mut items = vec![TreeNode::symbol("list")];
    items.extend(node.proper_list().unwrap_or_else(|| vec![node.clone()]));
    TreeNode::list(items)
}

/// True when no symbol occurs outside head position, i.e. the node can
/// sit under a quote without losing references.
fn is_constant(node: &TreeNode) -> bool {
    fn walk(node: &TreeNode, head: bool) -> bool {
        match node {
            TreeNode::Atom(_) => head || node.as_symbol().is_none(),
            TreeNode::List(items) => items
                .iter()
                .enumerate()
                .all(|(index, item)| walk(item, index == 0)),
            TreeNode::Cons(first, rest) => walk(first, head) && walk(rest, false),
        }
    }
    walk(node, true)
}

#[derive(Debug, Clone)]
enum PuzzleSource {
    Ir(TreeNode),
    Compiled(ClvmProgram),
}

/// A built puzzle: either IR awaiting compilation or an already
/// compiled program (e.g. after layer wrapping).
#[derive(Debug, Clone)]
pub struct Puzzle {
    source: PuzzleSource,
    included_libraries: BTreeSet<String>,
    block_comments: Vec<String>,
    param_comments: BTreeMap<String, String>,
}

impl Puzzle {
    pub fn from_ir(ir: TreeNode) -> Self {
        Self {
            source: PuzzleSource::Ir(ir),
            included_libraries: BTreeSet::new(),
            block_comments: Vec::new(),
            param_comments: BTreeMap::new(),
        }
    }

    /// Compiles a CoinScript contract and returns its main puzzle;
    /// companion puzzles and metadata are available through
    /// [`crate::coinscript::compile_source`].
    pub fn from_coinscript(source: &str) -> Result<Self> {
        Ok(crate::coinscript::compile_source(source)?.main_puzzle)
    }

    pub fn from_coinscript_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(crate::coinscript::compile_file(path)?.main_puzzle)
    }

    pub fn from_program(program: ClvmProgram) -> Self {
        Self {
            source: PuzzleSource::Compiled(program),
            included_libraries: BTreeSet::new(),
            block_comments: Vec::new(),
            param_comments: BTreeMap::new(),
        }
    }

    pub fn ir(&self) -> Option<&TreeNode> {
        match &self.source {
            PuzzleSource::Ir(ir) => Some(ir),
            PuzzleSource::Compiled(_) => None,
        }
    }

    pub fn included_libraries(&self) -> &BTreeSet<String> {
        &self.included_libraries
    }

    fn serialize_options(&self, indent: bool) -> SerializeOptions {
        SerializeOptions {
            indent,
            included_libraries: self.included_libraries.clone(),
            block_comments: self.block_comments.clone(),
            param_comments: self.param_comments.clone(),
            body_comments: BTreeMap::new(),
        }
    }

    /// Pretty ChiaLisp source. Compiled puzzles disassemble through the
    /// bridge instead.
    pub fn to_chialisp(&self) -> Result<String> {
        match &self.source {
            PuzzleSource::Ir(ir) => serialize(ir, &self.serialize_options(true)),
            PuzzleSource::Compiled(program) => program.disassemble(),
        }
    }

    pub fn to_chialisp_compact(&self) -> Result<String> {
        match &self.source {
            PuzzleSource::Ir(ir) => serialize(ir, &self.serialize_options(false)),
            PuzzleSource::Compiled(program) => program.disassemble(),
        }
    }

    pub fn compile(&self) -> Result<ClvmProgram> {
        match &self.source {
            // compile from the numeric rendering: quoted condition
            // lists keep their raw opcodes there, and the spliced
            // defconstants cover the symbolic names in live code
            PuzzleSource::Ir(ir) => {
                let source = serialize(ir, &SerializeOptions::default())?;
                clvm::compile_chialisp(&source)
            }
            PuzzleSource::Compiled(program) => Ok(program.clone()),
        }
    }

    /// Wire hex with `0x` prefix.
    pub fn to_clvm_hex(&self) -> Result<String> {
        Ok(self.compile()?.to_hex_prefixed())
    }

    /// Wire hex without prefix, as embedded in coin spends.
    pub fn puzzle_reveal(&self) -> Result<String> {
        Ok(self.compile()?.to_hex())
    }

    /// Tree hash of the compiled program, the on-chain identity.
    pub fn mod_hash(&self) -> Result<[u8; 32]> {
        self.compile()?.tree_hash()
    }

    pub fn mod_hash_hex(&self) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.mod_hash()?)))
    }

    /// Tree hash of the uncompiled IR (identical across serializations
    /// of the same tree, but distinct from the compiled mod hash).
    pub fn ir_tree_hash(&self) -> Option<[u8; 32]> {
        self.ir().map(hash::tree_hash)
    }

    /// Classic positional curry over the compiled form.
    pub fn curry(&self, args: &[TreeNode]) -> Result<Puzzle> {
        Ok(Puzzle::from_program(self.compile()?.curry(args)?))
    }

    pub fn simulate(&self, solution: impl Into<SolutionInput>) -> Result<Simulation> {
        let solution = solution.into().canonicalize()?;
        let program = self.compile()?;
        let (result, cost) = program.run(&solution, DEFAULT_MAX_COST)?;
        Ok(Simulation { result, cost })
    }
}

#[derive(Debug, Clone)]
pub struct Simulation {
    pub result: TreeNode,
    pub cost: u64,
}

impl Simulation {
    /// The emitted conditions, when the result is a proper list.
    pub fn conditions(&self) -> Vec<TreeNode> {
        self.result.proper_list().unwrap_or_default()
    }
}

/// Anything accepted as a solution: IR, source text, wire hex, or a
/// compiled program. Everything canonicalizes to IR before running.
#[derive(Debug, Clone)]
pub enum SolutionInput {
    Ir(TreeNode),
    Text(String),
    Program(ClvmProgram),
}

impl SolutionInput {
    pub fn canonicalize(self) -> Result<TreeNode> {
        match self {
            SolutionInput::Ir(node) => Ok(node),
            SolutionInput::Program(program) => program.to_ir(),
            SolutionInput::Text(text) => {
                let trimmed = text.trim();
                if looks_like_hex(trimmed) {
                    ClvmProgram::from_hex(trimmed)?.to_ir()
                } else {
                    parse(trimmed)
                }
            }
        }
    }
}

fn looks_like_hex(text: &str) -> bool {
    let raw = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    !raw.is_empty() && raw.len() % 2 == 0 && raw.bytes().all(|b| b.is_ascii_hexdigit())
}

impl From<TreeNode> for SolutionInput {
    fn from(node: TreeNode) -> Self {
        SolutionInput::Ir(node)
    }
}

impl From<&TreeNode> for SolutionInput {
    fn from(node: &TreeNode) -> Self {
        SolutionInput::Ir(node.clone())
    }
}

impl From<&str> for SolutionInput {
    fn from(text: &str) -> Self {
        SolutionInput::Text(text.to_string())
    }
}

impl From<ClvmProgram> for SolutionInput {
    fn from(program: ClvmProgram) -> Self {
        SolutionInput::Program(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_makes_empty_mod() {
        let puzzle = PuzzleBuilder::new().build().expect("build");
        assert_eq!(puzzle.to_chialisp_compact().unwrap(), "(mod @ ())");
    }

    #[test]
    fn constant_conditions_fold_under_quote() {
        let mut builder = PuzzleBuilder::new();
        builder.create_coin(Expression::bytes(vec![0x11; 32]), 1000_u64);
        let puzzle = builder.build().expect("build");
        let text = puzzle.to_chialisp_compact().unwrap();
        assert!(
            text.contains(&format!("(CREATE_COIN 0x{} 1000)", "11".repeat(32))),
            "{text}"
        );
        assert!(text.contains("(include condition_codes.clib)"), "{text}");
    }

    #[test]
    fn dynamic_conditions_fold_with_list_calls() {
        let mut builder = PuzzleBuilder::new();
        builder
            .with_solution_param("recipient")
            .create_coin(Expression::symbol("recipient"), 1_u64)
            .reserve_fee(10_u64);
        let puzzle = builder.build().expect("build");
        let text = puzzle.to_chialisp_compact().unwrap();
        assert!(
            text.contains("(c (list CREATE_COIN recipient 1) (c (list RESERVE_FEE 10) ()))"),
            "{text}"
        );
    }

    #[test]
    fn curried_params_substitute_into_body() {
        let mut builder = PuzzleBuilder::new();
        builder
            .with_curried_param("OWNER", Expression::bytes(vec![0x22; 32]))
            .with_solution_param("amount")
            .create_coin(Expression::symbol("OWNER"), Expression::symbol("amount"));
        let puzzle = builder.build().expect("build");
        let text = puzzle.to_chialisp_compact().unwrap();
        assert!(text.contains(&"22".repeat(32)), "{text}");
        assert!(!text.contains("OWNER"), "{text}");
        assert!(text.contains("(mod (amount)"), "{text}");
    }

    #[test]
    fn curried_name_clashing_with_solution_param_is_rejected() {
        let mut builder = PuzzleBuilder::new();
        builder
            .with_curried_param("amount", 1_u64)
            .with_solution_param("amount");
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::Builder { .. }));
    }

    #[test]
    fn control_flow_assembles_if() {
        let mut builder = PuzzleBuilder::new();
        builder
            .with_solution_param("flag")
            .if_(Expression::symbol("flag"))
            .then(|b| {
                b.create_coin(Expression::bytes(vec![0x11; 32]), 1_u64);
            })
            .else_(|b| {
                b.raise();
            });
        let puzzle = builder.build().expect("build");
        let text = puzzle.to_chialisp_compact().unwrap();
        assert!(text.contains("(if flag"), "{text}");
        assert!(text.contains("(x)"), "{text}");
    }

    #[test]
    fn else_if_nests_in_else_branch() {
        let mut builder = PuzzleBuilder::new();
        builder
            .with_solution_param("n")
            .if_(Expression::symbol("n").eq(1_i64))
            .then(|b| {
                b.reserve_fee(1_u64);
            })
            .else_if(Expression::symbol("n").eq(2_i64))
            .then(|b| {
                b.reserve_fee(2_u64);
            })
            .else_(|b| {
                b.raise();
            });
        let puzzle = builder.build().expect("build");
        let text = puzzle.to_chialisp_compact().unwrap();
        assert!(
            text.contains("(if (= n 1)") && text.contains("(if (= n 2)"),
            "{text}"
        );
    }

    #[test]
    fn then_without_if_is_a_builder_error() {
        let mut builder = PuzzleBuilder::new();
        builder.then(|b| {
            b.raise();
        });
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::Builder { .. }));
    }

    #[test]
    fn if_without_then_is_a_builder_error() {
        let mut builder = PuzzleBuilder::new();
        builder.if_(Expression::symbol("flag"));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::Builder { .. }));
    }

    #[test]
    fn if_then_without_else_folds_against_nil() {
        let mut builder = PuzzleBuilder::new();
        builder
            .with_solution_param("flag")
            .if_(Expression::symbol("flag"))
            .then(|b| {
                b.reserve_fee(1_u64);
            });
        let puzzle = builder.build().expect("build");
        let text = puzzle.to_chialisp_compact().unwrap();
        assert!(text.contains("(if flag (q (RESERVE_FEE 1)) ())"), "{text}");
    }

    #[test]
    fn loader_classifies_params_by_case() {
        let builder = PuzzleBuilder::from_chialisp(
            "(mod (OWNER amount) (include condition_codes.clib) (c (list CREATE_COIN OWNER amount) ()))",
        )
        .expect("load");
        assert_eq!(builder.pending_curried, vec!["OWNER".to_string()]);
        assert_eq!(builder.solution_params, vec!["amount".to_string()]);

        // unbound curried parameter is a build-time error
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::Builder { .. }));

        let mut builder = builder;
        builder.with_curried_param("OWNER", Expression::bytes(vec![0x33; 32]));
        let puzzle = builder.build().expect("build");
        let text = puzzle.to_chialisp_compact().unwrap();
        assert!(text.contains(&"33".repeat(32)), "{text}");
        assert!(text.contains("(mod (amount)"), "{text}");
    }

    #[test]
    fn features_flow_into_includes() {
        let mut builder = PuzzleBuilder::new();
        builder.require_after_seconds(3600_u64);
        let puzzle = builder.build().expect("build");
        assert_eq!(
            puzzle
                .included_libraries()
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>(),
            vec!["condition_codes.clib"]
        );
    }
}
