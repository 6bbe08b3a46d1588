use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chia_sha2::Sha256;
use serde::Serialize;

use crate::coinscript::ast::*;
use crate::coinscript::layers::Layer;
use crate::coinscript::parser::parse_program;
use crate::coinscript::sema::{analyze_coin, eval_const, CoinAnalysis};
use crate::coinscript::state;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::puzzle::{Puzzle, PuzzleBuilder};
use crate::tree::TreeNode;

#[derive(Debug, Clone, Serialize)]
pub struct CompileMetadata {
    pub coin: String,
    pub has_stateful_actions: bool,
    pub has_singleton: bool,
    pub layers: Vec<String>,
    pub actions: Vec<String>,
    pub events: Vec<String>,
    pub state_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub main_puzzle: Puzzle,
    pub additional_puzzles: BTreeMap<String, Puzzle>,
    /// Zero-value state record for stateful contracts, the record a
    /// freshly launched coin curries in.
    pub initial_state: Option<TreeNode>,
    pub metadata: CompileMetadata,
}

impl CompileOutput {
    /// For stateful contracts: the template curried with its own hash
    /// and the given state record.
    pub fn curried_with_state(&self, state_record: &TreeNode) -> Result<Puzzle> {
        if self.initial_state.is_none() {
            return Err(Error::builder("contract has no state to curry"));
        }
        let template = self
            .additional_puzzles
            .get("inner")
            .unwrap_or(&self.main_puzzle);
        let mod_hash = template.mod_hash()?;
        template.curry(&[TreeNode::bytes(mod_hash.to_vec()), state_record.clone()])
    }

    /// The launch-time puzzle carrying the zero-value state.
    pub fn launch_puzzle(&self) -> Result<Puzzle> {
        let initial = self
            .initial_state
            .clone()
            .ok_or_else(|| Error::builder("contract has no state to curry"))?;
        self.curried_with_state(&initial)
    }
}

pub fn compile_source(source: &str) -> Result<CompileOutput> {
    compile_source_with_inners(source, &BTreeMap::new())
}

/// `inners` supplies compiled puzzles for `inner puzzle` slots that
/// have no inline definition, keyed by slot name.
pub fn compile_source_with_inners(
    source: &str,
    inners: &BTreeMap<String, TreeNode>,
) -> Result<CompileOutput> {
    let program = parse_program(source)?;
    compile_ast(&program, inners)
}

pub fn compile_file(path: impl AsRef<Path>) -> Result<CompileOutput> {
    let source = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        Error::parse_eof(format!("cannot read {}: {e}", path.as_ref().display()))
    })?;
    compile_source(&source)
}

fn compile_ast(program: &Program, inners: &BTreeMap<String, TreeNode>) -> Result<CompileOutput> {
    let Some(main_coin) = program.coins.first() else {
        // a file may hold only standalone puzzles
        let Some(main) = program.puzzles.first() else {
            return Err(Error::codegen("source defines no coin or puzzle"));
        };
        let puzzle = compile_puzzle_decl(main, &program.consts)?;
        let mut additional = BTreeMap::new();
        for decl in &program.puzzles[1..] {
            additional.insert(decl.name.clone(), compile_puzzle_decl(decl, &program.consts)?);
        }
        return Ok(CompileOutput {
            main_puzzle: puzzle,
            additional_puzzles: additional,
            initial_state: None,
            metadata: CompileMetadata {
                coin: main.name.clone(),
                has_stateful_actions: false,
                has_singleton: false,
                layers: Vec::new(),
                actions: Vec::new(),
                events: Vec::new(),
                state_fields: Vec::new(),
            },
        });
    };

    let mut output = compile_coin(main_coin, program, inners)?;
    for coin in &program.coins[1..] {
        let sibling = compile_coin(coin, program, inners)?;
        output
            .additional_puzzles
            .insert(coin.name.clone(), sibling.main_puzzle);
    }
    for decl in &program.puzzles {
        output
            .additional_puzzles
            .insert(decl.name.clone(), compile_puzzle_decl(decl, &program.consts)?);
    }
    Ok(output)
}

fn compile_coin(
    coin: &CoinDecl,
    program: &Program,
    inners: &BTreeMap<String, TreeNode>,
) -> Result<CompileOutput> {
    let analysis = analyze_coin(coin, &program.consts)?;
    let has_state = analysis.has_state();
    let unordered_maps = analysis.state.iter().any(|slot| slot.is_map && !slot.ordered);
    let ordered_maps = analysis.state.iter().any(|slot| slot.is_map && slot.ordered);
    let mut additional = BTreeMap::new();

    // inner puzzle slots: inline definitions compile in place,
    // external slots must be supplied by the caller
    let mut inner_slots = BTreeSet::new();
    let mut inner_values = Vec::new();
    for slot in &coin.inners {
        let curried_name = format!("{}_INNER_PUZZLE", slot.name);
        let value = match (&slot.inline, inners.get(&slot.name)) {
            (Some(decl), _) => {
                let puzzle = compile_puzzle_decl(decl, &program.consts)?;
                additional.insert(slot.name.clone(), puzzle.clone());
                puzzle.compile()?.to_ir()?
            }
            (None, Some(node)) => node.clone(),
            (None, None) => {
                return Err(Error::semantic(
                    format!("inner puzzle slot `{}` was not supplied", slot.name),
                    slot.offset,
                ));
            }
        };
        inner_slots.insert(slot.name.clone());
        inner_values.push((curried_name, value));
    }

    // lower every action, collecting features and implicit-parameter
    // usage across the whole contract
    let mut features = BTreeSet::new();
    let mut needs_amount = has_state;
    let mut needs_puzzlehash = false;
    let mut branches = Vec::new();
    for action in &coin.actions {
        let mut ctx = Ctx::for_action(coin, &analysis, &inner_slots, action)?;
        let stmts = ctx.prelude(coin, action)?;
        let body = lower_stmts(&mut ctx, &stmts)?;
        features.extend(ctx.features.iter().cloned());
        needs_amount |= ctx.needs_amount;
        needs_puzzlehash |= ctx.needs_puzzlehash;
        branches.push((action.name.clone(), body));
    }

    // dispatcher: compare the action-name solution slot against each
    // declared action, raise on anything else
    let mut dispatch = TreeNode::list(vec![TreeNode::symbol("x")]);
    for (name, body) in branches.into_iter().rev() {
        let guard = TreeNode::list(vec![
            TreeNode::symbol("="),
            TreeNode::symbol("action_name"),
            TreeNode::string(name),
        ]);
        dispatch = TreeNode::list(vec![TreeNode::symbol("if"), guard, body, dispatch]);
    }

    let mut forms = Vec::new();
    if unordered_maps || ordered_maps {
        forms.extend(state::assoc_defuns(unordered_maps, ordered_maps));
    }
    forms.push(dispatch);

    let mut params: Vec<String> = Vec::new();
    if has_state {
        params.push(state::MOD_HASH_PARAM.to_string());
        params.push(state::STATE_PARAM.to_string());
    }
    params.push("action_name".to_string());
    params.push("action_params".to_string());
    if needs_amount {
        params.push(state::AMOUNT_PARAM.to_string());
    }
    if needs_puzzlehash {
        params.push("my_puzzlehash".to_string());
    }

    let mut builder = PuzzleBuilder::new();
    builder.with_solution_params(params);
    for include in &program.includes {
        builder.include(include.path.clone());
    }
    for slot in &analysis.storage {
        builder.with_curried_param(&slot.name, Expression::from_node(slot.value.clone()));
    }
    for (name, value) in inner_values {
        builder.with_curried_param(name, Expression::from_node(value));
    }
    builder.set_custom_body(forms);
    builder.add_features(features);
    let inner_puzzle = builder.build()?;

    let layers = resolve_layers(coin, &analysis)?;
    let has_singleton = layers
        .iter()
        .any(|layer| matches!(layer, Layer::Singleton { .. }));

    let main_puzzle = if layers.is_empty() {
        inner_puzzle
    } else {
        let mut compiled = inner_puzzle.compile()?;
        for layer in &layers {
            let (wrapped, companions) = layer.apply(&compiled)?;
            compiled = wrapped;
            additional.extend(companions);
        }
        additional.insert("inner".to_string(), inner_puzzle);
        Puzzle::from_program(compiled)
    };

    Ok(CompileOutput {
        main_puzzle,
        additional_puzzles: additional,
        initial_state: has_state.then(|| state::initial_state(&analysis.state)),
        metadata: CompileMetadata {
            coin: coin.name.clone(),
            has_stateful_actions: !analysis.stateful_actions.is_empty(),
            has_singleton,
            layers: layers.iter().map(|l| l.name().to_string()).collect(),
            actions: coin.actions.iter().map(|a| a.name.clone()).collect(),
            events: coin.events.iter().map(|e| e.name.clone()).collect(),
            state_fields: analysis.state.iter().map(|s| s.name.clone()).collect(),
        },
    })
}

fn compile_puzzle_decl(decl: &PuzzleDecl, globals: &[ConstDecl]) -> Result<Puzzle> {
    let mut consts = BTreeMap::new();
    for global in globals {
        let value = eval_const(&global.value, &global.ty, &consts)?;
        consts.insert(global.name.clone(), (global.ty.clone(), value));
    }
    let analysis = CoinAnalysis {
        storage: Vec::new(),
        state: Vec::new(),
        consts,
        events: BTreeMap::new(),
        stateful_actions: BTreeSet::new(),
    };
    let empty_slots = BTreeSet::new();
    let mut ctx = Ctx {
        analysis: &analysis,
        inner_slots: &empty_slots,
        direct_params: true,
        params: decl.params.iter().map(|p| p.name.clone()).collect(),
        locals: Vec::new(),
        state_exprs: Vec::new(),
        stateful: false,
        features: BTreeSet::new(),
        needs_amount: false,
        needs_puzzlehash: false,
        terminated: false,
    };
    let body = lower_stmts(&mut ctx, &decl.body)?;
    if ctx.needs_amount || ctx.needs_puzzlehash {
        return Err(Error::codegen(
            "standalone puzzles cannot use msg.amount or recreateSelf",
        ));
    }

    let mut builder = PuzzleBuilder::new();
    builder.with_solution_params(decl.params.iter().map(|p| p.name.clone()));
    builder.set_custom_body(vec![body]);
    builder.add_features(ctx.features);
    builder.build()
}

fn resolve_layers(coin: &CoinDecl, analysis: &CoinAnalysis) -> Result<Vec<Layer>> {
    let mut layers = Vec::new();

    for decorator in &coin.decorators {
        match decorator.name.as_str() {
            "singleton" => {
                let launcher_id = single_hash_arg(&decorator.args, decorator.offset, analysis)?;
                layers.push(Layer::Singleton { launcher_id });
            }
            "cat" => {
                let asset_id = single_hash_arg(&decorator.args, decorator.offset, analysis)?;
                layers.push(Layer::Cat { asset_id });
            }
            other => {
                return Err(Error::semantic(
                    format!("unknown coin decorator `@{other}`"),
                    decorator.offset,
                ));
            }
        }
    }

    for layer in &coin.layers {
        match layer.name.as_str() {
            "singleton" => layers.push(Layer::Singleton {
                launcher_id: named_hash_arg(layer, "launcher_id", analysis)?,
            }),
            "cat" => layers.push(Layer::Cat {
                asset_id: named_hash_arg(layer, "asset_id", analysis)?,
            }),
            "nft_state" => layers.push(Layer::NftState {
                metadata: TreeNode::nil(),
                metadata_updater_hash: named_hash_arg(layer, "metadata_updater", analysis)?,
            }),
            "nft_ownership" => {
                let owner = layer
                    .args
                    .iter()
                    .find(|(key, _)| key == "owner")
                    .map(|(_, expr)| hash_value(expr, analysis))
                    .transpose()?;
                layers.push(Layer::NftOwnership {
                    current_owner: owner,
                    transfer_program: TreeNode::nil(),
                });
            }
            other => {
                return Err(Error::semantic(
                    format!("unknown layer `{other}`"),
                    layer.offset,
                ));
            }
        }
    }
    Ok(layers)
}

fn single_hash_arg(args: &[Expr], offset: usize, analysis: &CoinAnalysis) -> Result<[u8; 32]> {
    match args {
        [arg] => hash_value(arg, analysis),
        _ => Err(Error::semantic(
            "layer decorator takes exactly one 32-byte argument",
            offset,
        )),
    }
}

fn named_hash_arg(layer: &LayerDecl, key: &str, analysis: &CoinAnalysis) -> Result<[u8; 32]> {
    let Some((_, expr)) = layer.args.iter().find(|(name, _)| name == key) else {
        return Err(Error::semantic(
            format!("layer `{}` requires a `{key}` argument", layer.name),
            layer.offset,
        ));
    };
    hash_value(expr, analysis)
}

fn hash_value(expr: &Expr, analysis: &CoinAnalysis) -> Result<[u8; 32]> {
    let value = eval_const(expr, &Type::Bytes32, &analysis.consts)?;
    let Some(atom) = value.as_atom() else {
        return Err(Error::semantic("expected a 32-byte constant", expr.offset));
    };
    let bytes = atom.encode();
    let mut out = [0_u8; 32];
    if bytes.len() != 32 {
        return Err(Error::semantic("expected a 32-byte constant", expr.offset));
    }
    out.copy_from_slice(&bytes);
    Ok(out)
}

// --- action lowering ----------------------------------------------------

#[derive(Clone)]
struct Ctx<'a> {
    analysis: &'a CoinAnalysis,
    inner_slots: &'a BTreeSet<String>,
    /// standalone puzzles bind parameters by name; actions receive
    /// them packed in the `action_params` solution slot
    direct_params: bool,
    params: Vec<String>,
    locals: Vec<(String, TreeNode)>,
    state_exprs: Vec<TreeNode>,
    stateful: bool,
    features: BTreeSet<String>,
    needs_amount: bool,
    needs_puzzlehash: bool,
    terminated: bool,
}

impl<'a> Ctx<'a> {
    fn for_action(
        _coin: &CoinDecl,
        analysis: &'a CoinAnalysis,
        inner_slots: &'a BTreeSet<String>,
        action: &ActionDecl,
    ) -> Result<Self> {
        Ok(Self {
            analysis,
            inner_slots,
            direct_params: false,
            params: action.params.iter().map(|p| p.name.clone()).collect(),
            locals: Vec::new(),
            state_exprs: (0..analysis.state.len()).map(state::state_field_expr).collect(),
            stateful: analysis.stateful_actions.contains(&action.name),
            features: BTreeSet::new(),
            needs_amount: false,
            needs_puzzlehash: false,
            terminated: false,
        })
    }

    /// Decorator expansion: `@onlyOwner` prepends a signature check,
    /// custom modifiers inline their parameter bindings and body.
    fn prelude(&mut self, coin: &CoinDecl, action: &ActionDecl) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        for decorator in &action.decorators {
            match decorator.name.as_str() {
                "stateful" => {}
                "onlyOwner" => stmts.push(Stmt {
                    kind: StmtKind::Expr(Expr {
                        kind: ExprKind::Call {
                            callee: "requireSignature".to_string(),
                            args: vec![Expr {
                                kind: ExprKind::Ident("owner".to_string()),
                                offset: decorator.offset,
                            }],
                        },
                        offset: decorator.offset,
                    }),
                    offset: decorator.offset,
                }),
                name => {
                    let modifier = coin
                        .modifiers
                        .iter()
                        .find(|m| m.name == name)
                        .ok_or_else(|| {
                            Error::semantic(
                                format!("unknown decorator `@{name}`"),
                                decorator.offset,
                            )
                        })?;
                    for (param, arg) in modifier.params.iter().zip(&decorator.args) {
                        stmts.push(Stmt {
                            kind: StmtKind::VarDecl {
                                ty: Some(param.ty.clone()),
                                name: param.name.clone(),
                                init: arg.clone(),
                            },
                            offset: decorator.offset,
                        });
                    }
                    stmts.extend(modifier.body.iter().cloned());
                }
            }
        }
        stmts.extend(action.body.iter().cloned());
        Ok(stmts)
    }

    fn branch(&self) -> Self {
        self.clone()
    }

    fn absorb(&mut self, branch: Ctx) {
        self.features.extend(branch.features);
        self.needs_amount |= branch.needs_amount;
        self.needs_puzzlehash |= branch.needs_puzzlehash;
    }

    fn lookup_local(&self, name: &str) -> Option<&TreeNode> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    fn set_local(&mut self, name: &str, value: TreeNode) {
        if let Some(entry) = self.locals.iter_mut().rev().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.locals.push((name.to_string(), value));
        }
    }

    fn finish_tail(&mut self) -> Result<TreeNode> {
        if self.stateful {
            let exprs = self.state_exprs.clone();
            return state::finalize_tail(&exprs, self.terminated, &mut self.features);
        }
        let mut tail = TreeNode::nil();
        if self.needs_puzzlehash {
            self.features.insert("ASSERT_MY_PUZZLEHASH".to_string());
            tail = cons_condition(
                list_condition("ASSERT_MY_PUZZLEHASH", vec![TreeNode::symbol("my_puzzlehash")]),
                tail,
            );
        }
        if self.needs_amount {
            self.features.insert("ASSERT_MY_AMOUNT".to_string());
            tail = cons_condition(
                list_condition("ASSERT_MY_AMOUNT", vec![TreeNode::symbol(state::AMOUNT_PARAM)]),
                tail,
            );
        }
        Ok(tail)
    }
}

/// `(list NAME args…)` — a condition constructed at runtime.
fn list_condition(name: &str, args: Vec<TreeNode>) -> TreeNode {
    let mut items = vec![TreeNode::symbol("list"), TreeNode::symbol(name)];
    items.extend(args);
    TreeNode::list(items)
}

fn list_condition_numeric(opcode: u64, args: Vec<TreeNode>) -> TreeNode {
    let mut items = vec![TreeNode::symbol("list"), TreeNode::int(opcode)];
    items.extend(args);
    TreeNode::list(items)
}

fn cons_condition(condition: TreeNode, rest: TreeNode) -> TreeNode {
    TreeNode::list(vec![TreeNode::symbol("c"), condition, rest])
}

fn lower_stmts(ctx: &mut Ctx, stmts: &[Stmt]) -> Result<TreeNode> {
    let Some((stmt, rest)) = stmts.split_first() else {
        return ctx.finish_tail();
    };

    match &stmt.kind {
        StmtKind::VarDecl { name, init, .. } => {
            let value = lower_expr(ctx, init)?;
            ctx.locals.push((name.clone(), value));
            lower_stmts(ctx, rest)
        }
        StmtKind::Assign { target, op, value } => {
            lower_assign(ctx, target, *op, value)?;
            lower_stmts(ctx, rest)
        }
        StmtKind::Require { condition, .. } => lower_require(ctx, condition, rest),
        StmtKind::Revert { .. } => Ok(TreeNode::list(vec![TreeNode::symbol("x")])),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let guard = lower_expr(ctx, condition)?;

            let mut then_stmts = then_branch.clone();
            then_stmts.extend_from_slice(rest);
            let mut then_ctx = ctx.branch();
            let then_expr = lower_stmts(&mut then_ctx, &then_stmts)?;
            ctx.absorb(then_ctx);

            let mut else_stmts = else_branch.clone().unwrap_or_default();
            else_stmts.extend_from_slice(rest);
            let mut else_ctx = ctx.branch();
            let else_expr = lower_stmts(&mut else_ctx, &else_stmts)?;
            ctx.absorb(else_ctx);

            Ok(TreeNode::list(vec![
                TreeNode::symbol("if"),
                guard,
                then_expr,
                else_expr,
            ]))
        }
        StmtKind::Return { value } => match value {
            None => ctx.finish_tail(),
            Some(expr) => lower_return_value(ctx, expr),
        },
        StmtKind::Emit { event, args } => {
            let message = event_message(ctx, event, args)?;
            ctx.features.insert("CREATE_COIN_ANNOUNCEMENT".to_string());
            let condition = list_condition("CREATE_COIN_ANNOUNCEMENT", vec![message]);
            Ok(cons_condition(condition, lower_stmts(ctx, rest)?))
        }
        StmtKind::Expr(expr) => match &expr.kind {
            ExprKind::Call { callee, args } => {
                let emitted = lower_call_stmt(ctx, expr, callee, args)?;
                let rest_expr = lower_stmts(ctx, rest)?;
                Ok(emitted
                    .into_iter()
                    .rev()
                    .fold(rest_expr, |acc, cond| cons_condition(cond, acc)))
            }
            _ => {
                // a bare value expression contributes nothing
                lower_stmts(ctx, rest)
            }
        },
    }
}

/// Events announce as `CREATE_COIN_ANNOUNCEMENT` with a message tagged
/// by the hash of the event name, so distinct events cannot collide.
fn event_message(ctx: &mut Ctx, event: &str, args: &[Expr]) -> Result<TreeNode> {
    let mut sha256 = Sha256::new();
    sha256.update(event.as_bytes());
    let tag: [u8; 32] = sha256.finalize();

    let mut arg_list = vec![TreeNode::symbol("list")];
    for arg in args {
        arg_list.push(lower_expr(ctx, arg)?);
    }
    ctx.features.insert("sha256tree".to_string());
    Ok(TreeNode::list(vec![
        TreeNode::symbol("sha256"),
        TreeNode::bytes(tag.to_vec()),
        TreeNode::list(vec![TreeNode::symbol("sha256tree"), TreeNode::list(arg_list)]),
    ]))
}

fn lower_require(ctx: &mut Ctx, condition: &Expr, rest: &[Stmt]) -> Result<TreeNode> {
    // require(msg.sender == X) pins the spender identity with a
    // signature over the default message
    if let ExprKind::Binary { op: BinaryOp::Eq, lhs, rhs } = &condition.kind {
        let other = if is_msg_sender(lhs) {
            Some(rhs)
        } else if is_msg_sender(rhs) {
            Some(lhs)
        } else {
            None
        };
        if let Some(other) = other {
            let identity = lower_expr(ctx, other)?;
            ctx.features.insert("AGG_SIG_ME".to_string());
            let condition = list_condition("AGG_SIG_ME", vec![identity, TreeNode::nil()]);
            return Ok(cons_condition(condition, lower_stmts(ctx, rest)?));
        }
    }

    // require(block.height >= X) and the timestamp equivalent lower to
    // absolute time-lock conditions
    if let ExprKind::Binary { op, lhs, rhs } = &condition.kind {
        let clock = [lhs, rhs].into_iter().find_map(|side| block_field(side));
        if let Some(field) = clock {
            let threshold = if block_field(lhs).is_some() { rhs } else { lhs };
            let ordered_ge = matches!(
                (*op, block_field(lhs).is_some()),
                (BinaryOp::Ge, true) | (BinaryOp::Le, false)
            );
            if !ordered_ge {
                return Err(Error::codegen(format!(
                    "block.{field} can only be constrained with `block.{field} >= <value>`"
                )));
            }
            let value = lower_expr(ctx, threshold)?;
            let name = match field {
                "height" => "ASSERT_HEIGHT_ABSOLUTE",
                _ => "ASSERT_SECONDS_ABSOLUTE",
            };
            ctx.features.insert(name.to_string());
            let condition = list_condition(name, vec![value]);
            return Ok(cons_condition(condition, lower_stmts(ctx, rest)?));
        }
    }

    // generic predicate: guard the remaining body with the assert
    // macro, which raises when the predicate is false
    let guard = lower_expr(ctx, condition)?;
    ctx.features.insert("assert".to_string());
    Ok(TreeNode::list(vec![
        TreeNode::symbol("assert"),
        guard,
        lower_stmts(ctx, rest)?,
    ]))
}

fn is_msg_sender(expr: &Expr) -> bool {
    matches!(
        &expr.kind,
        ExprKind::Member { object, field }
            if field == "sender" && matches!(&object.kind, ExprKind::Ident(n) if n == "msg")
    )
}

fn block_field(expr: &Expr) -> Option<&'static str> {
    match &expr.kind {
        ExprKind::Member { object, field }
            if matches!(&object.kind, ExprKind::Ident(n) if n == "block") =>
        {
            match field.as_str() {
                "height" => Some("height"),
                "timestamp" => Some("timestamp"),
                _ => None,
            }
        }
        _ => None,
    }
}

fn lower_assign(ctx: &mut Ctx, target: &Expr, op: AssignOp, value: &Expr) -> Result<()> {
    let new_value = lower_expr(ctx, value)?;
    match &target.kind {
        ExprKind::Ident(name) => {
            let combined = match op {
                AssignOp::Assign => new_value,
                AssignOp::AddAssign | AssignOp::SubAssign => {
                    let old = lower_expr(ctx, target)?;
                    arith(op, old, new_value)
                }
            };
            ctx.set_local(name, combined);
            Ok(())
        }
        ExprKind::Member { field, .. } => {
            let index = ctx.analysis.state_index(field).ok_or_else(|| {
                Error::codegen(format!("unknown state field `{field}`"))
            })?;
            let combined = match op {
                AssignOp::Assign => new_value,
                AssignOp::AddAssign | AssignOp::SubAssign => {
                    arith(op, ctx.state_exprs[index].clone(), new_value)
                }
            };
            ctx.state_exprs[index] = combined;
            Ok(())
        }
        ExprKind::Index { object, index } => {
            let ExprKind::Member { field, .. } = &object.kind else {
                return Err(Error::codegen("invalid assignment target"));
            };
            let slot = ctx.analysis.state_index(field).ok_or_else(|| {
                Error::codegen(format!("unknown state field `{field}`"))
            })?;
            // ordered maps keep their pair list sorted by key bytes on
            // every mutation
            let setter = if ctx.analysis.state[slot].ordered {
                "assoc_set_sorted"
            } else {
                "assoc_set"
            };
            let key = lower_expr(ctx, index)?;
            let combined = match op {
                AssignOp::Assign => new_value,
                AssignOp::AddAssign | AssignOp::SubAssign => {
                    let old = TreeNode::list(vec![
                        TreeNode::symbol("assoc_get"),
                        ctx.state_exprs[slot].clone(),
                        key.clone(),
                    ]);
                    arith(op, old, new_value)
                }
            };
            ctx.state_exprs[slot] = TreeNode::list(vec![
                TreeNode::symbol(setter),
                ctx.state_exprs[slot].clone(),
                key,
                combined,
            ]);
            Ok(())
        }
        _ => Err(Error::codegen("invalid assignment target")),
    }
}

fn arith(op: AssignOp, old: TreeNode, value: TreeNode) -> TreeNode {
    let symbol = match op {
        AssignOp::AddAssign => "+",
        AssignOp::SubAssign => "-",
        AssignOp::Assign => unreachable!("plain assignment handled by caller"),
    };
    TreeNode::list(vec![TreeNode::symbol(symbol), old, value])
}

fn lower_return_value(ctx: &mut Ctx, expr: &Expr) -> Result<TreeNode> {
    if let ExprKind::Call { callee, args } = &expr.kind {
        if callee == "delegateTo" {
            if ctx.stateful {
                return Err(Error::codegen(
                    "delegateTo cannot be combined with a stateful action",
                ));
            }
            let ExprKind::Ident(slot) = &args[0].kind else {
                return Err(Error::codegen("delegateTo must name an inner puzzle slot"));
            };
            if !ctx.inner_slots.contains(slot) {
                return Err(Error::codegen(format!(
                    "unknown inner puzzle slot `{slot}`"
                )));
            }
            let solution = lower_expr(ctx, &args[1])?;
            // the inner program must stay quoted: its env paths are
            // compiled CLVM, not source to recompile
            return Ok(TreeNode::list(vec![
                TreeNode::symbol("a"),
                TreeNode::cons(
                    TreeNode::symbol("q"),
                    TreeNode::symbol(format!("{slot}_INNER_PUZZLE")),
                ),
                solution,
            ]));
        }
    }
    lower_expr(ctx, expr)
}

/// Statement-position builtin calls; returns the condition nodes to
/// emit at this point, in order.
fn lower_call_stmt(
    ctx: &mut Ctx,
    expr: &Expr,
    callee: &str,
    args: &[Expr],
) -> Result<Vec<TreeNode>> {
    let mut lowered = Vec::with_capacity(args.len());
    for arg in args {
        lowered.push(lower_expr(ctx, arg)?);
    }

    let symbolic = |ctx: &mut Ctx, name: &str, args: Vec<TreeNode>| {
        ctx.features.insert(name.to_string());
        vec![list_condition(name, args)]
    };

    Ok(match callee {
        "send" | "sendCoins" => {
            let mut args = lowered;
            let amount = args.pop().expect("arity checked");
            let to = args.pop().expect("arity checked");
            symbolic(ctx, "CREATE_COIN", vec![to, amount])
        }
        "requireSignature" => {
            let key = lowered.into_iter().next().expect("arity checked");
            symbolic(ctx, "AGG_SIG_ME", vec![key, TreeNode::nil()])
        }
        "requireSignatureUnsafe" => symbolic(ctx, "AGG_SIG_UNSAFE", lowered),
        "requireAfterSeconds" => symbolic(ctx, "ASSERT_SECONDS_RELATIVE", lowered),
        "requireAfterHeight" => symbolic(ctx, "ASSERT_HEIGHT_RELATIVE", lowered),
        "requireBeforeSeconds" => vec![list_condition_numeric(85, lowered)],
        "requireBeforeHeight" => vec![list_condition_numeric(87, lowered)],
        "fee" | "reserveFee" => symbolic(ctx, "RESERVE_FEE", lowered),
        "announce" | "createAnnouncement" => {
            symbolic(ctx, "CREATE_COIN_ANNOUNCEMENT", lowered)
        }
        "assertAnnouncement" => symbolic(ctx, "ASSERT_COIN_ANNOUNCEMENT", lowered),
        "createPuzzleAnnouncement" => symbolic(ctx, "CREATE_PUZZLE_ANNOUNCEMENT", lowered),
        "assertPuzzleAnnouncement" => symbolic(ctx, "ASSERT_PUZZLE_ANNOUNCEMENT", lowered),
        "assertMyCoinId" => symbolic(ctx, "ASSERT_MY_COIN_ID", lowered),
        "assertMyParentId" => symbolic(ctx, "ASSERT_MY_PARENT_ID", lowered),
        "assertMyPuzzleHash" => symbolic(ctx, "ASSERT_MY_PUZZLEHASH", lowered),
        "assertMyAmount" => symbolic(ctx, "ASSERT_MY_AMOUNT", lowered),
        "burn" => {
            ctx.terminated = true;
            Vec::new()
        }
        "recreateSelf" => {
            if ctx.stateful {
                // the state-layer finalizer recreates the coin
                Vec::new()
            } else {
                ctx.needs_amount = true;
                ctx.needs_puzzlehash = true;
                symbolic(
                    ctx,
                    "CREATE_COIN",
                    vec![
                        TreeNode::symbol("my_puzzlehash"),
                        TreeNode::symbol(state::AMOUNT_PARAM),
                    ],
                )
            }
        }
        "sha256" | "sha256tree" => Vec::new(),
        other => {
            return Err(Error::codegen(format!(
                "unknown built-in `{other}` at offset {}",
                expr.offset
            )));
        }
    })
}

fn lower_expr(ctx: &mut Ctx, expr: &Expr) -> Result<TreeNode> {
    match &expr.kind {
        ExprKind::IntLit(value) => Ok(TreeNode::int(value.clone())),
        ExprKind::StrLit(text) => Ok(TreeNode::string(text.clone())),
        ExprKind::HexLit(bytes) => Ok(TreeNode::bytes(bytes.clone())),
        ExprKind::BoolLit(value) => Ok(TreeNode::bool(*value)),
        ExprKind::AddressLit(text) => {
            let hash = crate::address::decode_address(text)?;
            Ok(TreeNode::bytes(hash.to_vec()))
        }
        ExprKind::Ident(name) => {
            if let Some(value) = ctx.lookup_local(name) {
                return Ok(value.clone());
            }
            if let Some(index) = ctx.params.iter().position(|p| p == name) {
                if ctx.direct_params {
                    return Ok(TreeNode::symbol(name.clone()));
                }
                return Ok(state::nth_expr(TreeNode::symbol("action_params"), index));
            }
            if ctx.analysis.storage.iter().any(|slot| slot.name == *name) {
                // storage resolves by name and is substituted away at
                // build time
                return Ok(TreeNode::symbol(name.clone()));
            }
            if let Some((_, value)) = ctx.analysis.consts.get(name) {
                return Ok(value.clone());
            }
            Err(Error::codegen(format!("unresolved identifier `{name}`")))
        }
        ExprKind::Member { object, field } => {
            if matches!(&object.kind, ExprKind::Ident(n) if n == "state") {
                let index = ctx.analysis.state_index(field).ok_or_else(|| {
                    Error::codegen(format!("unknown state field `{field}`"))
                })?;
                return Ok(ctx.state_exprs[index].clone());
            }
            if matches!(&object.kind, ExprKind::Ident(n) if n == "msg") {
                return match field.as_str() {
                    "amount" => {
                        ctx.needs_amount = true;
                        Ok(TreeNode::symbol(state::AMOUNT_PARAM))
                    }
                    "puzzle" => {
                        ctx.needs_puzzlehash = true;
                        Ok(TreeNode::symbol("my_puzzlehash"))
                    }
                    other => Err(Error::codegen(format!("unsupported `msg.{other}`"))),
                };
            }
            Err(Error::codegen("unsupported member access"))
        }
        ExprKind::Index { object, index } => {
            let ExprKind::Member { field, .. } = &object.kind else {
                return Err(Error::codegen("only state mappings can be indexed"));
            };
            let slot = ctx.analysis.state_index(field).ok_or_else(|| {
                Error::codegen(format!("unknown state field `{field}`"))
            })?;
            let key = lower_expr(ctx, index)?;
            Ok(TreeNode::list(vec![
                TreeNode::symbol("assoc_get"),
                ctx.state_exprs[slot].clone(),
                key,
            ]))
        }
        ExprKind::Unary { op, operand } => {
            let value = lower_expr(ctx, operand)?;
            Ok(match op {
                UnaryOp::Not => TreeNode::list(vec![TreeNode::symbol("not"), value]),
                UnaryOp::Neg => TreeNode::list(vec![
                    TreeNode::symbol("-"),
                    TreeNode::int(0),
                    value,
                ]),
            })
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let left = lower_expr(ctx, lhs)?;
            let right = lower_expr(ctx, rhs)?;
            Ok(lower_binary(*op, left, right))
        }
        ExprKind::Ternary {
            condition,
            then_value,
            else_value,
        } => {
            let guard = lower_expr(ctx, condition)?;
            let then_value = lower_expr(ctx, then_value)?;
            let else_value = lower_expr(ctx, else_value)?;
            Ok(TreeNode::list(vec![
                TreeNode::symbol("if"),
                guard,
                then_value,
                else_value,
            ]))
        }
        ExprKind::Call { callee, args } => {
            if callee == "sha256" {
                let mut items = vec![TreeNode::symbol("sha256")];
                for arg in args {
                    items.push(lower_expr(ctx, arg)?);
                }
                return Ok(TreeNode::list(items));
            }
            if callee == "sha256tree" {
                ctx.features.insert("sha256tree".to_string());
                let value = lower_expr(ctx, &args[0])?;
                return Ok(TreeNode::list(vec![TreeNode::symbol("sha256tree"), value]));
            }
            // casts pass their value through unchanged
            if matches!(
                callee.as_str(),
                "address" | "uint256" | "bool" | "string" | "bytes32" | "bytes"
            ) {
                return lower_expr(ctx, &args[0]);
            }
            Err(Error::codegen(format!(
                "`{callee}` cannot be used in an expression"
            )))
        }
    }
}

fn lower_binary(op: BinaryOp, left: TreeNode, right: TreeNode) -> TreeNode {
    let apply = |symbol: &str, a: TreeNode, b: TreeNode| {
        TreeNode::list(vec![TreeNode::symbol(symbol), a, b])
    };
    let negate = |node: TreeNode| TreeNode::list(vec![TreeNode::symbol("not"), node]);
    match op {
        BinaryOp::Add => apply("+", left, right),
        BinaryOp::Sub => apply("-", left, right),
        BinaryOp::Mul => apply("*", left, right),
        BinaryOp::Div => apply("/", left, right),
        BinaryOp::Mod => TreeNode::list(vec![
            TreeNode::symbol("r"),
            apply("divmod", left, right),
        ]),
        BinaryOp::Eq => apply("=", left, right),
        BinaryOp::NotEq => negate(apply("=", left, right)),
        BinaryOp::Gt => apply(">", left, right),
        BinaryOp::Lt => apply(">", right, left),
        BinaryOp::Ge => negate(apply(">", right, left)),
        BinaryOp::Le => negate(apply(">", left, right)),
        BinaryOp::And => apply("all", left, right),
        BinaryOp::Or => apply("any", left, right),
    }
}
