//! Syntax tree for CoinScript contracts.

use num_bigint::BigInt;

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub includes: Vec<IncludeDecl>,
    pub consts: Vec<ConstDecl>,
    pub coins: Vec<CoinDecl>,
    pub puzzles: Vec<PuzzleDecl>,
}

#[derive(Debug, Clone)]
pub struct IncludeDecl {
    pub path: String,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub ty: Type,
    pub name: String,
    pub value: Expr,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct CoinDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub storage: Vec<StorageDecl>,
    pub state: Vec<StateDecl>,
    pub inners: Vec<InnerDecl>,
    pub actions: Vec<ActionDecl>,
    pub events: Vec<EventDecl>,
    pub modifiers: Vec<ModifierDecl>,
    pub layers: Vec<LayerDecl>,
    pub consts: Vec<ConstDecl>,
    pub offset: usize,
}

/// A standalone `puzzle` block: solution parameters plus a body,
/// compiled like a single anonymous action.
#[derive(Debug, Clone)]
pub struct PuzzleDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Decorator {
    pub name: String,
    pub args: Vec<Expr>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct StorageDecl {
    pub ty: Type,
    pub name: String,
    pub init: Option<Expr>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub enum StateDecl {
    Field {
        ty: Type,
        name: String,
        offset: usize,
    },
    Map {
        key_ty: Type,
        value_ty: Type,
        name: String,
        ordered: bool,
        offset: usize,
    },
}

impl StateDecl {
    pub fn name(&self) -> &str {
        match self {
            StateDecl::Field { name, .. } | StateDecl::Map { name, .. } => name,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            StateDecl::Field { offset, .. } | StateDecl::Map { offset, .. } => *offset,
        }
    }
}

/// `inner puzzle <name>;` declares a slot filled by an externally
/// supplied puzzle; an inline block supplies it in place.
#[derive(Debug, Clone)]
pub struct InnerDecl {
    pub name: String,
    pub inline: Option<PuzzleDecl>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct ActionDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub ty: Type,
    pub name: String,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct EventDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub offset: usize,
}

/// Reusable precondition block, inlined ahead of the action body at
/// each decorated use site.
#[derive(Debug, Clone)]
pub struct ModifierDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct LayerDecl {
    pub name: String,
    pub args: Vec<(String, Expr)>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Address,
    Uint256,
    Bool,
    StringTy,
    Bytes32,
    Bytes,
}

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Address => "address",
            Type::Uint256 => "uint256",
            Type::Bool => "bool",
            Type::StringTy => "string",
            Type::Bytes32 => "bytes32",
            Type::Bytes => "bytes",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    VarDecl {
        ty: Option<Type>,
        name: String,
        init: Expr,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    Require {
        condition: Expr,
        message: Option<String>,
    },
    Revert {
        message: Option<String>,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    Return {
        value: Option<Expr>,
    },
    Emit {
        event: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit(BigInt),
    StrLit(String),
    HexLit(Vec<u8>),
    BoolLit(bool),
    AddressLit(String),
    Ident(String),
    Member {
        object: Box<Expr>,
        field: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}
