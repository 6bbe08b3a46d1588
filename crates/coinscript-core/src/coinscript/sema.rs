use std::collections::{BTreeMap, BTreeSet};

use crate::address::decode_address;
use crate::coinscript::ast::*;
use crate::error::{Error, Result};
use crate::tree::TreeNode;

/// Resolved facts about a contract, handed to the code generator.
#[derive(Debug, Clone)]
pub struct CoinAnalysis {
    pub storage: Vec<StorageSlot>,
    pub state: Vec<StateSlot>,
    pub consts: BTreeMap<String, (Type, TreeNode)>,
    pub events: BTreeMap<String, Vec<Param>>,
    pub stateful_actions: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct StorageSlot {
    pub name: String,
    pub ty: Type,
    pub value: TreeNode,
}

#[derive(Debug, Clone)]
pub struct StateSlot {
    pub name: String,
    pub ty: Type,
    pub is_map: bool,
    pub ordered: bool,
    pub key_ty: Option<Type>,
}

impl CoinAnalysis {
    pub fn has_state(&self) -> bool {
        !self.state.is_empty()
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.state.iter().position(|slot| slot.name == name)
    }
}

pub fn analyze_coin(coin: &CoinDecl, globals: &[ConstDecl]) -> Result<CoinAnalysis> {
    let mut consts = BTreeMap::new();
    for decl in globals.iter().chain(coin.consts.iter()) {
        let value = eval_const(&decl.value, &decl.ty, &consts)?;
        if consts.insert(decl.name.clone(), (decl.ty.clone(), value)).is_some() {
            return Err(Error::semantic(
                format!("duplicate constant `{}`", decl.name),
                decl.offset,
            ));
        }
    }

    let mut storage = Vec::new();
    for decl in &coin.storage {
        if storage.iter().any(|slot: &StorageSlot| slot.name == decl.name) {
            return Err(Error::semantic(
                format!("duplicate storage entry `{}`", decl.name),
                decl.offset,
            ));
        }
        let value = match &decl.init {
            Some(init) => eval_const(init, &decl.ty, &consts)?,
            None => default_value(&decl.ty),
        };
        storage.push(StorageSlot {
            name: decl.name.clone(),
            ty: decl.ty.clone(),
            value,
        });
    }

    let mut state = Vec::new();
    for decl in &coin.state {
        if state.iter().any(|slot: &StateSlot| slot.name == decl.name()) {
            return Err(Error::semantic(
                format!("duplicate state field `{}`", decl.name()),
                decl.offset(),
            ));
        }
        match decl {
            StateDecl::Field { ty, name, .. } => state.push(StateSlot {
                name: name.clone(),
                ty: ty.clone(),
                is_map: false,
                ordered: false,
                key_ty: None,
            }),
            StateDecl::Map {
                key_ty,
                value_ty,
                name,
                ordered,
                ..
            } => state.push(StateSlot {
                name: name.clone(),
                ty: value_ty.clone(),
                is_map: true,
                ordered: *ordered,
                key_ty: Some(key_ty.clone()),
            }),
        }
    }

    let mut events = BTreeMap::new();
    for event in &coin.events {
        if events.insert(event.name.clone(), event.params.clone()).is_some() {
            return Err(Error::semantic(
                format!("duplicate event `{}`", event.name),
                event.offset,
            ));
        }
    }

    let mut stateful_actions = BTreeSet::new();
    let mut seen_actions = BTreeSet::new();
    for action in &coin.actions {
        if !seen_actions.insert(action.name.clone()) {
            return Err(Error::semantic(
                format!("duplicate action `{}`", action.name),
                action.offset,
            ));
        }
        if action.decorators.iter().any(|d| d.name == "stateful") {
            stateful_actions.insert(action.name.clone());
        }
    }
    if coin.actions.is_empty() {
        return Err(Error::semantic(
            format!("coin `{}` declares no actions", coin.name),
            coin.offset,
        ));
    }

    let analysis = CoinAnalysis {
        storage,
        state,
        consts,
        events,
        stateful_actions,
    };

    for action in &coin.actions {
        check_action(coin, &analysis, action)?;
    }
    for modifier in &coin.modifiers {
        // modifier bodies are checked standalone with their own params
        let mut scope = Scope::for_modifier(&analysis, modifier);
        for stmt in &modifier.body {
            check_statement(&analysis, &mut scope, stmt)?;
        }
    }

    Ok(analysis)
}

fn default_value(ty: &Type) -> TreeNode {
    match ty {
        Type::Uint256 => TreeNode::int(0),
        Type::Bool => TreeNode::bool(false),
        Type::Address | Type::Bytes32 => TreeNode::bytes(vec![0_u8; 32]),
        Type::StringTy | Type::Bytes => TreeNode::bytes(Vec::new()),
    }
}

/// Evaluates a compile-time constant expression against its declared
/// type.
pub fn eval_const(
    expr: &Expr,
    ty: &Type,
    consts: &BTreeMap<String, (Type, TreeNode)>,
) -> Result<TreeNode> {
    let (actual, value) = match &expr.kind {
        ExprKind::IntLit(v) => (Type::Uint256, TreeNode::int(v.clone())),
        ExprKind::StrLit(s) => (Type::StringTy, TreeNode::string(s.clone())),
        ExprKind::BoolLit(b) => (Type::Bool, TreeNode::bool(*b)),
        ExprKind::HexLit(bytes) => {
            let actual = if bytes.len() == 32 {
                Type::Bytes32
            } else {
                Type::Bytes
            };
            (actual, TreeNode::bytes(bytes.clone()))
        }
        ExprKind::AddressLit(text) => {
            let hash = decode_address(text).map_err(|e| match e {
                Error::Semantic { message, .. } => Error::semantic(message, expr.offset),
                other => other,
            })?;
            (Type::Address, TreeNode::bytes(hash.to_vec()))
        }
        ExprKind::Ident(name) => match consts.get(name) {
            Some((const_ty, value)) => (const_ty.clone(), value.clone()),
            None => {
                return Err(Error::semantic(
                    format!("`{name}` is not a compile-time constant"),
                    expr.offset,
                ));
            }
        },
        _ => {
            return Err(Error::semantic(
                "storage and const initializers must be compile-time constants",
                expr.offset,
            ));
        }
    };
    if !types_compatible(ty, &actual) {
        return Err(Error::semantic(
            format!("expected {} value, found {}", ty.name(), actual.name()),
            expr.offset,
        ));
    }
    if matches!(ty, Type::Address | Type::Bytes32) {
        if let Some(atom) = value.as_atom() {
            if atom.encode().len() != 32 {
                return Err(Error::semantic(
                    format!("{} value must be exactly 32 bytes", ty.name()),
                    expr.offset,
                ));
            }
        }
    }
    Ok(value)
}

/// Address and bytes32 interconvert freely, as do the byte-shaped
/// types; everything else must match exactly.
fn types_compatible(expected: &Type, actual: &Type) -> bool {
    if expected == actual {
        return true;
    }
    matches!(
        (expected, actual),
        (Type::Address, Type::Bytes32)
            | (Type::Bytes32, Type::Address)
            | (Type::Bytes, Type::Bytes32)
            | (Type::Bytes32, Type::Bytes)
            | (Type::Bytes, Type::StringTy)
            | (Type::StringTy, Type::Bytes)
    )
}

#[derive(Debug, Clone, PartialEq)]
enum ValueType {
    Typed(Type),
    Unit,
}

struct Scope<'a> {
    analysis: &'a CoinAnalysis,
    params: Vec<(String, Type)>,
    locals: Vec<(String, Type)>,
    stateful: bool,
}

impl<'a> Scope<'a> {
    fn for_action(analysis: &'a CoinAnalysis, action: &ActionDecl, stateful: bool) -> Self {
        Self {
            analysis,
            params: action
                .params
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
            locals: Vec::new(),
            stateful,
        }
    }

    fn for_modifier(analysis: &'a CoinAnalysis, modifier: &ModifierDecl) -> Self {
        Self {
            analysis,
            params: modifier
                .params
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
            locals: Vec::new(),
            stateful: false,
        }
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.locals
            .iter()
            .rev()
            .chain(self.params.iter())
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty.clone())
            .or_else(|| {
                self.analysis
                    .storage
                    .iter()
                    .find(|slot| slot.name == name)
                    .map(|slot| slot.ty.clone())
            })
            .or_else(|| {
                self.analysis
                    .consts
                    .get(name)
                    .map(|(ty, _)| ty.clone())
            })
    }
}

fn check_action(coin: &CoinDecl, analysis: &CoinAnalysis, action: &ActionDecl) -> Result<()> {
    let stateful = analysis.stateful_actions.contains(&action.name);

    for decorator in &action.decorators {
        match decorator.name.as_str() {
            "stateful" => {
                if analysis.state.is_empty() {
                    return Err(Error::semantic(
                        "@stateful action in a coin without a state block",
                        decorator.offset,
                    ));
                }
            }
            "onlyOwner" => {
                let owner = analysis.storage.iter().find(|slot| slot.name == "owner");
                match owner {
                    Some(slot) if matches!(slot.ty, Type::Address | Type::Bytes32) => {}
                    _ => {
                        return Err(Error::semantic(
                            "@onlyOwner requires an address storage entry named `owner`",
                            decorator.offset,
                        ));
                    }
                }
            }
            name => {
                let modifier = coin.modifiers.iter().find(|m| m.name == name);
                match modifier {
                    Some(modifier) => {
                        if modifier.params.len() != decorator.args.len() {
                            return Err(Error::semantic(
                                format!(
                                    "modifier `{name}` takes {} argument(s), {} given",
                                    modifier.params.len(),
                                    decorator.args.len()
                                ),
                                decorator.offset,
                            ));
                        }
                    }
                    None => {
                        return Err(Error::semantic(
                            format!("unknown decorator `@{name}`"),
                            decorator.offset,
                        ));
                    }
                }
            }
        }
    }

    let mut scope = Scope::for_action(analysis, action, stateful);
    for stmt in &action.body {
        check_statement(analysis, &mut scope, stmt)?;
    }
    Ok(())
}

fn check_statement(analysis: &CoinAnalysis, scope: &mut Scope, stmt: &Stmt) -> Result<()> {
    match &stmt.kind {
        StmtKind::Expr(expr) => {
            infer(analysis, scope, expr, false)?;
            Ok(())
        }
        StmtKind::VarDecl { ty, name, init } => {
            let inferred = infer(analysis, scope, init, false)?;
            let var_ty = match (ty, inferred) {
                (Some(declared), ValueType::Typed(actual)) => {
                    if !types_compatible(declared, &actual) {
                        return Err(Error::semantic(
                            format!(
                                "cannot initialize {} variable `{name}` with {}",
                                declared.name(),
                                actual.name()
                            ),
                            stmt.offset,
                        ));
                    }
                    declared.clone()
                }
                (None, ValueType::Typed(actual)) => actual,
                (_, ValueType::Unit) => {
                    return Err(Error::semantic(
                        format!("initializer of `{name}` has no value"),
                        stmt.offset,
                    ));
                }
            };
            scope.locals.push((name.clone(), var_ty));
            Ok(())
        }
        StmtKind::Assign { target, op, value } => {
            check_assign_target(analysis, scope, target, scope.stateful)?;
            let target_ty = infer(analysis, scope, target, false)?;
            let value_ty = infer(analysis, scope, value, false)?;
            if *op != AssignOp::Assign {
                let ValueType::Typed(Type::Uint256) = target_ty else {
                    return Err(Error::semantic(
                        "compound assignment requires a uint256 target",
                        stmt.offset,
                    ));
                };
            }
            if let (ValueType::Typed(t), ValueType::Typed(v)) = (&target_ty, &value_ty) {
                if !types_compatible(t, v) {
                    return Err(Error::semantic(
                        format!("cannot assign {} to {}", v.name(), t.name()),
                        stmt.offset,
                    ));
                }
            }
            Ok(())
        }
        StmtKind::Require { condition, .. } => {
            let ty = infer(analysis, scope, condition, true)?;
            if ty != ValueType::Typed(Type::Bool) {
                return Err(Error::semantic(
                    "require() predicate must be boolean",
                    condition.offset,
                ));
            }
            Ok(())
        }
        StmtKind::Revert { .. } => Ok(()),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let ty = infer(analysis, scope, condition, false)?;
            if ty != ValueType::Typed(Type::Bool) {
                return Err(Error::semantic(
                    "if condition must be boolean",
                    condition.offset,
                ));
            }
            let depth = scope.locals.len();
            for stmt in then_branch {
                check_statement(analysis, scope, stmt)?;
            }
            scope.locals.truncate(depth);
            if let Some(branch) = else_branch {
                for stmt in branch {
                    check_statement(analysis, scope, stmt)?;
                }
                scope.locals.truncate(depth);
            }
            Ok(())
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                infer(analysis, scope, value, false)?;
            }
            Ok(())
        }
        StmtKind::Emit { event, args } => {
            let params = analysis.events.get(event).ok_or_else(|| {
                Error::semantic(format!("unknown event `{event}`"), stmt.offset)
            })?;
            if params.len() != args.len() {
                return Err(Error::semantic(
                    format!(
                        "event `{event}` takes {} argument(s), {} given",
                        params.len(),
                        args.len()
                    ),
                    stmt.offset,
                ));
            }
            for (param, arg) in params.iter().zip(args) {
                let ty = infer(analysis, scope, arg, false)?;
                if let ValueType::Typed(actual) = ty {
                    if !types_compatible(&param.ty, &actual) {
                        return Err(Error::semantic(
                            format!(
                                "event argument `{}` expects {}, found {}",
                                param.name,
                                param.ty.name(),
                                actual.name()
                            ),
                            arg.offset,
                        ));
                    }
                }
            }
            Ok(())
        }
    }
}

fn check_assign_target(
    analysis: &CoinAnalysis,
    scope: &Scope,
    target: &Expr,
    stateful: bool,
) -> Result<()> {
    match &target.kind {
        ExprKind::Ident(name) => {
            if analysis.storage.iter().any(|slot| slot.name == *name) {
                return Err(Error::semantic(
                    format!("storage entry `{name}` is immutable"),
                    target.offset,
                ));
            }
            if scope.lookup(name).is_none() {
                return Err(Error::semantic(
                    format!("unknown assignment target `{name}`"),
                    target.offset,
                ));
            }
            Ok(())
        }
        ExprKind::Member { object, field } => {
            if is_ident(object, "state") {
                if analysis.state_index(field).is_none() {
                    return Err(Error::semantic(
                        format!("unknown state field `{field}`"),
                        target.offset,
                    ));
                }
                if !stateful {
                    return Err(Error::semantic(
                        format!("state field `{field}` can only be written in a @stateful action"),
                        target.offset,
                    ));
                }
                return Ok(());
            }
            if is_ident(object, "storage") {
                return Err(Error::semantic("storage entries are immutable", target.offset));
            }
            Err(Error::semantic("invalid assignment target", target.offset))
        }
        ExprKind::Index { object, .. } => check_assign_target(analysis, scope, object, stateful),
        _ => Err(Error::semantic("invalid assignment target", target.offset)),
    }
}

fn is_ident(expr: &Expr, name: &str) -> bool {
    matches!(&expr.kind, ExprKind::Ident(n) if n == name)
}

fn infer(
    analysis: &CoinAnalysis,
    scope: &Scope,
    expr: &Expr,
    require_root: bool,
) -> Result<ValueType> {
    match &expr.kind {
        ExprKind::IntLit(_) => Ok(ValueType::Typed(Type::Uint256)),
        ExprKind::StrLit(_) => Ok(ValueType::Typed(Type::StringTy)),
        ExprKind::BoolLit(_) => Ok(ValueType::Typed(Type::Bool)),
        ExprKind::HexLit(bytes) => Ok(ValueType::Typed(if bytes.len() == 32 {
            Type::Bytes32
        } else {
            Type::Bytes
        })),
        ExprKind::AddressLit(text) => {
            decode_address(text).map_err(|e| match e {
                Error::Semantic { message, .. } => Error::semantic(message, expr.offset),
                other => other,
            })?;
            Ok(ValueType::Typed(Type::Address))
        }
        ExprKind::Ident(name) => scope
            .lookup(name)
            .map(ValueType::Typed)
            .ok_or_else(|| Error::semantic(format!("unknown identifier `{name}`"), expr.offset)),
        ExprKind::Member { object, field } => {
            if is_ident(object, "state") {
                let slot = analysis
                    .state
                    .iter()
                    .find(|slot| slot.name == *field)
                    .ok_or_else(|| {
                        Error::semantic(format!("unknown state field `{field}`"), expr.offset)
                    })?;
                if slot.is_map {
                    return Err(Error::semantic(
                        format!("state mapping `{field}` must be indexed"),
                        expr.offset,
                    ));
                }
                return Ok(ValueType::Typed(slot.ty.clone()));
            }
            if is_ident(object, "msg") {
                return match field.as_str() {
                    "sender" => Err(Error::semantic(
                        "msg.sender can only be compared against an address in require()",
                        expr.offset,
                    )),
                    "amount" => Ok(ValueType::Typed(Type::Uint256)),
                    "puzzle" => Ok(ValueType::Typed(Type::Bytes32)),
                    other => Err(Error::semantic(
                        format!("unknown field `msg.{other}`"),
                        expr.offset,
                    )),
                };
            }
            if is_ident(object, "block") {
                return match field.as_str() {
                    "height" | "timestamp" => {
                        if require_root {
                            Ok(ValueType::Typed(Type::Uint256))
                        } else {
                            Err(Error::semantic(
                                format!("block.{field} can only be used inside require()"),
                                expr.offset,
                            ))
                        }
                    }
                    other => Err(Error::semantic(
                        format!("unknown field `block.{other}`"),
                        expr.offset,
                    )),
                };
            }
            Err(Error::semantic("unknown member access", expr.offset))
        }
        ExprKind::Index { object, index } => {
            let ExprKind::Member { object: base, field } = &object.kind else {
                return Err(Error::semantic("only state mappings can be indexed", expr.offset));
            };
            if !is_ident(base, "state") {
                return Err(Error::semantic("only state mappings can be indexed", expr.offset));
            }
            let slot = analysis
                .state
                .iter()
                .find(|slot| slot.name == *field)
                .ok_or_else(|| {
                    Error::semantic(format!("unknown state field `{field}`"), expr.offset)
                })?;
            if !slot.is_map {
                return Err(Error::semantic(
                    format!("state field `{field}` is not a mapping"),
                    expr.offset,
                ));
            }
            let index_ty = infer(analysis, scope, index, false)?;
            if let (Some(key_ty), ValueType::Typed(actual)) = (&slot.key_ty, &index_ty) {
                if !types_compatible(key_ty, actual) {
                    return Err(Error::semantic(
                        format!(
                            "mapping `{field}` is keyed by {}, found {}",
                            key_ty.name(),
                            actual.name()
                        ),
                        index.offset,
                    ));
                }
            }
            Ok(ValueType::Typed(slot.ty.clone()))
        }
        ExprKind::Unary { op, operand } => {
            let ty = infer(analysis, scope, operand, false)?;
            match op {
                UnaryOp::Not => {
                    if ty != ValueType::Typed(Type::Bool) {
                        return Err(Error::semantic("`!` requires a boolean operand", expr.offset));
                    }
                    Ok(ValueType::Typed(Type::Bool))
                }
                UnaryOp::Neg => {
                    if ty != ValueType::Typed(Type::Uint256) {
                        return Err(Error::semantic("`-` requires a uint256 operand", expr.offset));
                    }
                    Ok(ValueType::Typed(Type::Uint256))
                }
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            // `msg.sender == <address>` is permitted as a require
            // predicate; the comparison lowers to a signature check
            if require_root && *op == BinaryOp::Eq {
                let sender_side = [lhs, rhs]
                    .into_iter()
                    .find(|side| is_msg_sender(side));
                if let Some(_sender) = sender_side {
                    let other = if is_msg_sender(lhs) { rhs } else { lhs };
                    let other_ty = infer(analysis, scope, other, false)?;
                    if !matches!(
                        other_ty,
                        ValueType::Typed(Type::Address) | ValueType::Typed(Type::Bytes32)
                    ) {
                        return Err(Error::semantic(
                            "msg.sender must be compared against an address",
                            other.offset,
                        ));
                    }
                    return Ok(ValueType::Typed(Type::Bool));
                }
            }
            // block.height / block.timestamp comparisons stay
            // require-rooted
            let lhs_ty = infer_operand(analysis, scope, lhs, require_root, *op)?;
            let rhs_ty = infer_operand(analysis, scope, rhs, require_root, *op)?;
            if op.is_boolean() {
                if lhs_ty != ValueType::Typed(Type::Bool) || rhs_ty != ValueType::Typed(Type::Bool)
                {
                    return Err(Error::semantic(
                        "boolean operators require boolean operands",
                        expr.offset,
                    ));
                }
                return Ok(ValueType::Typed(Type::Bool));
            }
            if op.is_comparison() {
                if let (ValueType::Typed(l), ValueType::Typed(r)) = (&lhs_ty, &rhs_ty) {
                    if !types_compatible(l, r) {
                        return Err(Error::semantic(
                            format!("cannot compare {} with {}", l.name(), r.name()),
                            expr.offset,
                        ));
                    }
                }
                return Ok(ValueType::Typed(Type::Bool));
            }
            if lhs_ty != ValueType::Typed(Type::Uint256) || rhs_ty != ValueType::Typed(Type::Uint256)
            {
                return Err(Error::semantic(
                    "arithmetic requires uint256 operands",
                    expr.offset,
                ));
            }
            Ok(ValueType::Typed(Type::Uint256))
        }
        ExprKind::Ternary {
            condition,
            then_value,
            else_value,
        } => {
            let cond_ty = infer(analysis, scope, condition, false)?;
            if cond_ty != ValueType::Typed(Type::Bool) {
                return Err(Error::semantic(
                    "ternary condition must be boolean",
                    condition.offset,
                ));
            }
            let then_ty = infer(analysis, scope, then_value, false)?;
            let else_ty = infer(analysis, scope, else_value, false)?;
            match (&then_ty, &else_ty) {
                (ValueType::Typed(t), ValueType::Typed(e)) if types_compatible(t, e) => {
                    Ok(then_ty)
                }
                _ => Err(Error::semantic(
                    "ternary branches must have the same type",
                    expr.offset,
                )),
            }
        }
        ExprKind::Call { callee, args } => check_call(analysis, scope, expr, callee, args),
    }
}

fn is_msg_sender(expr: &Expr) -> bool {
    matches!(
        &expr.kind,
        ExprKind::Member { object, field } if field == "sender" && is_ident(object, "msg")
    )
}

fn infer_operand(
    analysis: &CoinAnalysis,
    scope: &Scope,
    expr: &Expr,
    require_root: bool,
    op: BinaryOp,
) -> Result<ValueType> {
    let passthrough = require_root && op.is_comparison();
    infer(analysis, scope, expr, passthrough)
}

/// Built-in call signatures: (name, arity, returns-a-value).
const BUILTINS: &[(&str, usize, bool)] = &[
    ("send", 2, false),
    ("sendCoins", 2, false),
    ("requireSignature", 1, false),
    ("requireSignatureUnsafe", 2, false),
    ("requireAfterSeconds", 1, false),
    ("requireAfterHeight", 1, false),
    ("requireBeforeSeconds", 1, false),
    ("requireBeforeHeight", 1, false),
    ("fee", 1, false),
    ("reserveFee", 1, false),
    ("announce", 1, false),
    ("createAnnouncement", 1, false),
    ("assertAnnouncement", 1, false),
    ("createPuzzleAnnouncement", 1, false),
    ("assertPuzzleAnnouncement", 1, false),
    ("assertMyCoinId", 1, false),
    ("assertMyParentId", 1, false),
    ("assertMyPuzzleHash", 1, false),
    ("assertMyAmount", 1, false),
    ("recreateSelf", 0, false),
    ("burn", 0, false),
    ("sha256tree", 1, true),
];

fn check_call(
    analysis: &CoinAnalysis,
    scope: &Scope,
    expr: &Expr,
    callee: &str,
    args: &[Expr],
) -> Result<ValueType> {
    // casts
    if let Some(ty) = cast_target(callee) {
        if args.len() != 1 {
            return Err(Error::semantic(
                format!("cast to {callee} takes exactly one argument"),
                expr.offset,
            ));
        }
        infer(analysis, scope, &args[0], false)?;
        return Ok(ValueType::Typed(ty));
    }

    if callee == "sha256" {
        if args.is_empty() {
            return Err(Error::semantic("sha256 needs at least one argument", expr.offset));
        }
        for arg in args {
            infer(analysis, scope, arg, false)?;
        }
        return Ok(ValueType::Typed(Type::Bytes32));
    }

    if callee == "delegateTo" {
        if args.len() != 2 {
            return Err(Error::semantic(
                "delegateTo(slot, solution) takes exactly two arguments",
                expr.offset,
            ));
        }
        if !matches!(&args[0].kind, ExprKind::Ident(_)) {
            return Err(Error::semantic(
                "delegateTo's first argument must name an inner puzzle slot",
                args[0].offset,
            ));
        }
        infer(analysis, scope, &args[1], false)?;
        return Ok(ValueType::Unit);
    }

    let Some((_, arity, has_value)) = BUILTINS.iter().find(|(name, ..)| *name == callee) else {
        return Err(Error::semantic(
            format!("unknown function `{callee}`"),
            expr.offset,
        ));
    };
    if args.len() != *arity {
        return Err(Error::semantic(
            format!("`{callee}` takes {arity} argument(s), {} given", args.len()),
            expr.offset,
        ));
    }
    for arg in args {
        infer(analysis, scope, arg, false)?;
    }
    if callee == "burn" && !scope.stateful {
        return Err(Error::semantic(
            "burn() is only valid inside a @stateful action",
            expr.offset,
        ));
    }
    if *has_value {
        Ok(ValueType::Typed(Type::Bytes32))
    } else {
        Ok(ValueType::Unit)
    }
}

fn cast_target(callee: &str) -> Option<Type> {
    match callee {
        "address" => Some(Type::Address),
        "uint256" => Some(Type::Uint256),
        "bool" => Some(Type::Bool),
        "string" => Some(Type::StringTy),
        "bytes32" => Some(Type::Bytes32),
        "bytes" => Some(Type::Bytes),
        _ => None,
    }
}
