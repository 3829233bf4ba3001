//! Mini abstract syntax tree
//!
//! The raw, unresolved tree the parser hands to the binding pass:
//! identifiers are plain names, no types have been inferred, and every
//! statement and expression remembers the source line it started on.

use crate::types::Type;

/// A complete Mini program: one implicit top-level block.
#[derive(Debug, Clone)]
pub struct Program {
    pub block: Block,
}

/// A block scope. Declarations always precede statements.
#[derive(Debug, Clone)]
pub struct Block {
    pub declarations: Vec<Declaration>,
    pub statements: Vec<Stmt>,
    pub line: u32,
}

/// One declaration statement, possibly declaring several names:
/// `int a, b[2][3];`
#[derive(Debug, Clone)]
pub struct Declaration {
    pub ty: Type,
    pub declarators: Vec<Declarator>,
    pub line: u32,
}

/// A single declared name with its literal dimension sizes (empty for
/// scalars).
#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: String,
    pub dims: Vec<i64>,
}

/// Statement node
#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),

    Expr {
        expr: Expr,
        line: u32,
    },

    If {
        condition: Expr,
        then_body: Box<Stmt>,
        else_body: Option<Box<Stmt>>,
        line: u32,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        line: u32,
    },

    /// `read x;` / `read x, hex;`
    Read {
        name: String,
        hex: bool,
        line: u32,
    },

    /// `write expr;` / `write expr, hex;`
    Write {
        expr: Expr,
        hex: bool,
        line: u32,
    },

    /// `write "text";` — the value is the raw quoted token
    WriteString {
        raw: String,
        line: u32,
    },

    Return {
        line: u32,
    },

    /// `break;` is depth 1, `break n;` unwinds n loops
    Break {
        depth: i64,
        line: u32,
    },

    Continue {
        depth: i64,
        line: u32,
    },
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Block(block) => block.line,
            Stmt::Expr { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Read { line, .. }
            | Stmt::Write { line, .. }
            | Stmt::WriteString { line, .. }
            | Stmt::Return { line }
            | Stmt::Break { line, .. }
            | Stmt::Continue { line, .. } => *line,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    BitOr,
    BitAnd,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

/// Unary operators, including the cast-like explicit conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    BitNot,
    Not,
    ToInt,
    ToDouble,
}

/// Expression node
#[derive(Debug, Clone)]
pub enum Expr {
    IntLit {
        value: i64,
        line: u32,
    },

    DoubleLit {
        value: f64,
        line: u32,
    },

    BoolLit {
        value: bool,
        line: u32,
    },

    Ident {
        name: String,
        line: u32,
    },

    /// `a[i][j]` — index arity is checked against the declaration during
    /// binding
    ArrayAccess {
        name: String,
        indices: Vec<Expr>,
        line: u32,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: u32,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },

    /// `target = value`; the parser guarantees the target is an identifier
    /// or an array access
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        line: u32,
    },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::IntLit { line, .. }
            | Expr::DoubleLit { line, .. }
            | Expr::BoolLit { line, .. }
            | Expr::Ident { line, .. }
            | Expr::ArrayAccess { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Assign { line, .. } => *line,
        }
    }
}
