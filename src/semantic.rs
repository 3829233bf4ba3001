//! Semantic analysis for Mini
//!
//! The binding pass: turns the raw AST into a bound tree in which every
//! identifier carries its declaration's type and storage name, every
//! `break`/`continue` carries the label it jumps to, and every expression
//! knows its inferred type.
//!
//! All semantic errors are recovered locally: the offending node gets a
//! safe fallback (an `int` symbol, a one-element dimension list, depth 1)
//! and traversal continues, so one pass reports every error in the
//! program. The caller must not run code generation when the diagnostics
//! sink is non-empty.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Block, Declaration, Expr, Program, Stmt, UnaryOp};
use crate::context::{Context, StringLiteral};
use crate::types::Type;

/// A resolved variable: one per declarator, shared by every use site.
#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    /// Unique name of the alloca backing this variable; empty for the
    /// fallback symbol of an undeclared name.
    pub storage: String,
    /// Dimension sizes; empty for scalars.
    pub dims: Vec<i64>,
}

impl Symbol {
    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    /// Size of the flat allocation backing an array.
    pub fn total_elements(&self) -> i64 {
        self.dims.iter().product()
    }
}

/// Labels of one `while` loop, allocated during binding so that a
/// `break n` appearing before the loop's own code generation can already
/// name the exit label.
#[derive(Debug, Clone)]
pub struct LoopLabels {
    pub start: String,
    pub body: String,
    pub end: String,
}

#[derive(Debug)]
pub struct BoundProgram {
    pub block: BoundBlock,
}

#[derive(Debug)]
pub struct BoundBlock {
    pub locals: Vec<Rc<Symbol>>,
    pub statements: Vec<BoundStmt>,
}

#[derive(Debug)]
pub enum BoundStmt {
    Block(BoundBlock),
    Expr(BoundExpr),
    If {
        condition: BoundExpr,
        then_body: Box<BoundStmt>,
        else_body: Option<Box<BoundStmt>>,
    },
    While {
        condition: BoundExpr,
        body: Box<BoundStmt>,
        labels: LoopLabels,
    },
    Read {
        symbol: Rc<Symbol>,
        hex: bool,
    },
    Write {
        expr: BoundExpr,
        hex: bool,
    },
    WriteString(StringLiteral),
    Return,
    /// Unconditional jump to the resolved loop's end label.
    Break {
        target: String,
    },
    /// Unconditional jump to the resolved loop's start label.
    Continue {
        target: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    Or,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// An assignable location.
#[derive(Debug)]
pub enum BoundTarget {
    Scalar(Rc<Symbol>),
    Element {
        symbol: Rc<Symbol>,
        indices: Vec<BoundExpr>,
    },
}

impl BoundTarget {
    pub fn ty(&self) -> Type {
        match self {
            BoundTarget::Scalar(symbol) => symbol.ty,
            BoundTarget::Element { symbol, .. } => symbol.ty,
        }
    }
}

/// Typed expression node. Operand conversions implied by the stored result
/// types are emitted by the generation pass through the conversion engine.
#[derive(Debug)]
pub enum BoundExpr {
    IntLit(i64),
    DoubleLit(f64),
    BoolLit(bool),
    Load(Rc<Symbol>),
    LoadElement {
        symbol: Rc<Symbol>,
        indices: Vec<BoundExpr>,
    },
    Neg(Box<BoundExpr>),
    BitNot(Box<BoundExpr>),
    Not(Box<BoundExpr>),
    /// Explicit `int(...)` / `double(...)` conversion.
    Convert {
        to: Type,
        operand: Box<BoundExpr>,
    },
    Arith {
        op: ArithOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
        /// `double` if either operand is `double`, else `int`.
        ty: Type,
    },
    Bit {
        op: BitOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Cmp {
        op: CmpOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
        /// The common type both operands are compared at.
        operand_ty: Type,
    },
    Logic {
        op: LogicOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Assign {
        target: BoundTarget,
        value: Box<BoundExpr>,
    },
}

impl BoundExpr {
    /// The inferred type. On recovered errors this is the documented
    /// fallback (the operand's type, or `bool` for relations), so that
    /// ancestors keep type checking meaningfully.
    pub fn ty(&self) -> Type {
        match self {
            BoundExpr::IntLit(_) => Type::Int,
            BoundExpr::DoubleLit(_) => Type::Double,
            BoundExpr::BoolLit(_) => Type::Bool,
            BoundExpr::Load(symbol) => symbol.ty,
            BoundExpr::LoadElement { symbol, .. } => symbol.ty,
            BoundExpr::Neg(operand) => operand.ty(),
            BoundExpr::BitNot(operand) => operand.ty(),
            BoundExpr::Not(operand) => operand.ty(),
            BoundExpr::Convert { to, .. } => *to,
            BoundExpr::Arith { ty, .. } => *ty,
            BoundExpr::Bit { .. } => Type::Int,
            BoundExpr::Cmp { .. } => Type::Bool,
            BoundExpr::Logic { .. } => Type::Bool,
            BoundExpr::Assign { target, .. } => target.ty(),
        }
    }
}

/// Binding pass: resolve and type check the whole program, collecting
/// diagnostics in the context. Always returns a tree; it is only
/// meaningful for generation when no diagnostics were reported.
pub fn bind(program: &Program, ctx: &mut Context) -> BoundProgram {
    let mut binder = Binder {
        ctx,
        scopes: Vec::new(),
        loops: Vec::new(),
    };
    BoundProgram {
        block: binder.bind_block(&program.block),
    }
}

struct Binder<'a> {
    ctx: &'a mut Context,
    /// Innermost scope last; lookup walks the chain outward.
    scopes: Vec<IndexMap<String, Rc<Symbol>>>,
    /// Enclosing loops, innermost last.
    loops: Vec<LoopLabels>,
}

impl Binder<'_> {
    // =========================================================================
    // Scopes and symbols
    // =========================================================================

    fn bind_block(&mut self, block: &Block) -> BoundBlock {
        self.scopes.push(IndexMap::new());

        let mut locals = Vec::new();
        for declaration in &block.declarations {
            self.bind_declaration(declaration, &mut locals);
        }

        let statements = block
            .statements
            .iter()
            .map(|stmt| self.bind_stmt(stmt))
            .collect();

        self.scopes.pop();
        BoundBlock { locals, statements }
    }

    fn bind_declaration(&mut self, declaration: &Declaration, locals: &mut Vec<Rc<Symbol>>) {
        for declarator in &declaration.declarators {
            let scope = self.scopes.last_mut().expect("scope stack is never empty");
            if scope.contains_key(&declarator.name) {
                // First occurrence wins.
                self.ctx.diagnostics.report(
                    declaration.line,
                    format!("Variable \"{}\" already declared", declarator.name),
                );
                continue;
            }

            let mut dims = declarator.dims.clone();
            for dim in &mut dims {
                if *dim < 1 {
                    self.ctx
                        .diagnostics
                        .report(declaration.line, "Array dimension must be positive");
                    *dim = 1;
                }
            }

            let symbol = Rc::new(Symbol {
                name: declarator.name.clone(),
                ty: declaration.ty,
                storage: self.ctx.fresh_storage(&declarator.name),
                dims,
            });
            self.scopes
                .last_mut()
                .expect("scope stack is never empty")
                .insert(declarator.name.clone(), Rc::clone(&symbol));
            locals.push(symbol);
        }
    }

    fn lookup(&self, name: &str) -> Option<Rc<Symbol>> {
        for scope in self.scopes.iter().rev() {
            if let Some(symbol) = scope.get(name) {
                return Some(Rc::clone(symbol));
            }
        }
        None
    }

    /// Resolve a name, falling back to an `int` scalar so analysis can
    /// continue past an undeclared identifier.
    fn resolve(&mut self, name: &str, line: u32) -> Rc<Symbol> {
        match self.lookup(name) {
            Some(symbol) => symbol,
            None => {
                self.ctx
                    .diagnostics
                    .report(line, format!("Undeclared variable \"{}\"", name));
                Rc::new(Symbol {
                    name: name.to_string(),
                    ty: Type::Int,
                    storage: String::new(),
                    dims: Vec::new(),
                })
            }
        }
    }

    /// Resolve a name used without indices; using an array this way is an
    /// arity error.
    fn resolve_scalar(&mut self, name: &str, line: u32) -> Rc<Symbol> {
        let symbol = self.resolve(name, line);
        if symbol.is_array() {
            self.ctx.diagnostics.report(
                line,
                format!("Expected {} indexes on \"{}\"", symbol.dims.len(), name),
            );
        }
        symbol
    }

    /// Resolve an array access: check arity and index types, producing the
    /// symbol (or a safe one-dimension stand-in) plus bound indices.
    fn resolve_element(
        &mut self,
        name: &str,
        indices: &[Expr],
        line: u32,
    ) -> (Rc<Symbol>, Vec<BoundExpr>) {
        let declared = self.lookup(name);
        let symbol = match declared {
            Some(symbol) if symbol.dims.len() == indices.len() => symbol,
            Some(symbol) => {
                self.ctx.diagnostics.report(
                    line,
                    format!("Expected {} indexes on \"{}\"", symbol.dims.len(), name),
                );
                Rc::new(Symbol {
                    name: symbol.name.clone(),
                    ty: symbol.ty,
                    storage: symbol.storage.clone(),
                    dims: vec![1],
                })
            }
            None => {
                self.ctx
                    .diagnostics
                    .report(line, format!("Undeclared variable \"{}\"", name));
                Rc::new(Symbol {
                    name: name.to_string(),
                    ty: Type::Int,
                    storage: String::new(),
                    dims: vec![1],
                })
            }
        };

        let mut bound_indices = Vec::with_capacity(indices.len());
        for index in indices {
            let bound = self.bind_expr(index);
            if bound.ty() != Type::Int {
                self.ctx
                    .diagnostics
                    .report(index.line(), "Array index must be an int expression");
            }
            bound_indices.push(bound);
        }

        (symbol, bound_indices)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn bind_stmt(&mut self, stmt: &Stmt) -> BoundStmt {
        match stmt {
            Stmt::Block(block) => BoundStmt::Block(self.bind_block(block)),

            Stmt::Expr { expr, .. } => BoundStmt::Expr(self.bind_expr(expr)),

            Stmt::If {
                condition,
                then_body,
                else_body,
                line,
            } => {
                let condition = self.bind_expr(condition);
                if condition.ty() != Type::Bool {
                    self.ctx
                        .diagnostics
                        .report(*line, "If condition is not a bool type");
                }
                BoundStmt::If {
                    condition,
                    then_body: Box::new(self.bind_stmt(then_body)),
                    else_body: else_body
                        .as_ref()
                        .map(|stmt| Box::new(self.bind_stmt(stmt))),
                }
            }

            Stmt::While {
                condition,
                body,
                line,
            } => {
                // Labels are allocated now, not at generation time, so
                // break/continue inside the body can capture them.
                let labels = LoopLabels {
                    start: self.ctx.fresh_label(),
                    body: self.ctx.fresh_label(),
                    end: self.ctx.fresh_label(),
                };
                let condition = self.bind_expr(condition);
                if condition.ty() != Type::Bool {
                    self.ctx
                        .diagnostics
                        .report(*line, "While condition is not a bool type");
                }
                self.loops.push(labels.clone());
                let body = Box::new(self.bind_stmt(body));
                self.loops.pop();
                BoundStmt::While {
                    condition,
                    body,
                    labels,
                }
            }

            Stmt::Read { name, hex, line } => {
                let symbol = self.resolve_scalar(name, *line);
                if *hex {
                    if symbol.ty != Type::Int {
                        self.ctx
                            .diagnostics
                            .report(*line, "Read hex expects an int variable");
                    }
                } else if !symbol.ty.is_numeric() {
                    self.ctx
                        .diagnostics
                        .report(*line, "Read expects an int or double variable");
                }
                BoundStmt::Read { symbol, hex: *hex }
            }

            Stmt::Write { expr, hex, line } => {
                let expr = self.bind_expr(expr);
                if *hex && expr.ty() != Type::Int {
                    self.ctx
                        .diagnostics
                        .report(*line, "Write hex expects an int expression");
                }
                BoundStmt::Write { expr, hex: *hex }
            }

            Stmt::WriteString { raw, .. } => {
                BoundStmt::WriteString(self.ctx.intern_string(raw))
            }

            Stmt::Return { .. } => BoundStmt::Return,

            Stmt::Break { depth, line } => BoundStmt::Break {
                target: self.resolve_jump(*depth, *line, "Break", |labels| labels.end.clone()),
            },

            Stmt::Continue { depth, line } => BoundStmt::Continue {
                target: self.resolve_jump(*depth, *line, "Continue", |labels| {
                    labels.start.clone()
                }),
            },
        }
    }

    /// Resolve a `break n` / `continue n` to the n-th enclosing loop,
    /// counting from the innermost. Returns an empty label on failure;
    /// the reported diagnostic keeps generation from ever running then.
    fn resolve_jump(
        &mut self,
        depth: i64,
        line: u32,
        what: &str,
        label: impl Fn(&LoopLabels) -> String,
    ) -> String {
        let mut depth = depth;
        if depth < 1 {
            self.ctx
                .diagnostics
                .report(line, format!("{} depth must be positive", what));
            depth = 1;
        }
        let depth = depth as usize;

        if self.loops.len() < depth {
            let message = if depth == 1 {
                format!("{} not inside a loop", what)
            } else {
                format!("{} not inside {} loops", what, depth)
            };
            self.ctx.diagnostics.report(line, message);
            return String::new();
        }
        label(&self.loops[self.loops.len() - depth])
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn bind_expr(&mut self, expr: &Expr) -> BoundExpr {
        match expr {
            Expr::IntLit { value, .. } => BoundExpr::IntLit(*value),
            Expr::DoubleLit { value, .. } => BoundExpr::DoubleLit(*value),
            Expr::BoolLit { value, .. } => BoundExpr::BoolLit(*value),

            Expr::Ident { name, line } => BoundExpr::Load(self.resolve_scalar(name, *line)),

            Expr::ArrayAccess {
                name,
                indices,
                line,
            } => {
                let (symbol, indices) = self.resolve_element(name, indices, *line);
                BoundExpr::LoadElement { symbol, indices }
            }

            Expr::Unary { op, operand, line } => self.bind_unary(*op, operand, *line),

            Expr::Binary {
                op,
                left,
                right,
                line,
            } => self.bind_binary(*op, left, right, *line),

            Expr::Assign {
                target,
                value,
                line,
            } => {
                let target = self.bind_target(target);
                let value = self.bind_expr(value);
                if !value.ty().implicitly_convertible_to(target.ty()) {
                    self.ctx.diagnostics.report(
                        *line,
                        format!("Cannot assign {} to {}", value.ty(), target.ty()),
                    );
                }
                BoundExpr::Assign {
                    target,
                    value: Box::new(value),
                }
            }
        }
    }

    fn bind_target(&mut self, target: &Expr) -> BoundTarget {
        match target {
            Expr::Ident { name, line } => BoundTarget::Scalar(self.resolve_scalar(name, *line)),
            Expr::ArrayAccess {
                name,
                indices,
                line,
            } => {
                let (symbol, indices) = self.resolve_element(name, indices, *line);
                BoundTarget::Element { symbol, indices }
            }
            // The parser only produces identifier or array-access targets.
            other => unreachable!("invalid assignment target: {:?}", other),
        }
    }

    fn bind_unary(&mut self, op: UnaryOp, operand: &Expr, line: u32) -> BoundExpr {
        let operand = Box::new(self.bind_expr(operand));
        match op {
            UnaryOp::Neg => {
                if !operand.ty().is_numeric() {
                    self.ctx
                        .diagnostics
                        .report(line, "Unary minus expects a numeric operand");
                }
                BoundExpr::Neg(operand)
            }
            UnaryOp::BitNot => {
                if operand.ty() != Type::Int {
                    self.ctx
                        .diagnostics
                        .report(line, "Bitwise not expects an int operand");
                }
                BoundExpr::BitNot(operand)
            }
            UnaryOp::Not => {
                if operand.ty() != Type::Bool {
                    self.ctx
                        .diagnostics
                        .report(line, "Logical not expects a bool operand");
                }
                BoundExpr::Not(operand)
            }
            UnaryOp::ToInt | UnaryOp::ToDouble => {
                let to = if op == UnaryOp::ToInt {
                    Type::Int
                } else {
                    Type::Double
                };
                if !operand.ty().explicitly_convertible_to(to) {
                    self.ctx
                        .diagnostics
                        .report(line, format!("Cannot convert {} to {}", operand.ty(), to));
                }
                BoundExpr::Convert { to, operand }
            }
        }
    }

    fn bind_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, line: u32) -> BoundExpr {
        let left = Box::new(self.bind_expr(left));
        let right = Box::new(self.bind_expr(right));
        let (lt, rt) = (left.ty(), right.ty());

        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.ctx
                        .diagnostics
                        .report(line, "Wrong type on arithmetic expression");
                }
                let ty = if lt == Type::Double || rt == Type::Double {
                    Type::Double
                } else {
                    Type::Int
                };
                let op = match op {
                    BinaryOp::Add => ArithOp::Add,
                    BinaryOp::Sub => ArithOp::Sub,
                    BinaryOp::Mul => ArithOp::Mul,
                    _ => ArithOp::Div,
                };
                BoundExpr::Arith {
                    op,
                    left,
                    right,
                    ty,
                }
            }

            BinaryOp::BitOr | BinaryOp::BitAnd => {
                if lt != Type::Int || rt != Type::Int {
                    self.ctx
                        .diagnostics
                        .report(line, "Wrong type on bitwise expression");
                }
                let op = if op == BinaryOp::BitOr {
                    BitOp::Or
                } else {
                    BitOp::And
                };
                BoundExpr::Bit { op, left, right }
            }

            BinaryOp::Eq | BinaryOp::Ne => {
                let both_numeric = lt.is_numeric() && rt.is_numeric();
                let both_bool = lt == Type::Bool && rt == Type::Bool;
                if !both_numeric && !both_bool {
                    self.ctx
                        .diagnostics
                        .report(line, "Wrong type on relation expression");
                }
                let operand_ty = if lt == Type::Double || rt == Type::Double {
                    Type::Double
                } else if both_bool {
                    Type::Bool
                } else {
                    Type::Int
                };
                let op = if op == BinaryOp::Eq { CmpOp::Eq } else { CmpOp::Ne };
                BoundExpr::Cmp {
                    op,
                    left,
                    right,
                    operand_ty,
                }
            }

            BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.ctx
                        .diagnostics
                        .report(line, "Wrong type on relation expression");
                }
                let operand_ty = if lt == Type::Double || rt == Type::Double {
                    Type::Double
                } else {
                    Type::Int
                };
                let op = match op {
                    BinaryOp::Gt => CmpOp::Gt,
                    BinaryOp::Ge => CmpOp::Ge,
                    BinaryOp::Lt => CmpOp::Lt,
                    _ => CmpOp::Le,
                };
                BoundExpr::Cmp {
                    op,
                    left,
                    right,
                    operand_ty,
                }
            }

            BinaryOp::And | BinaryOp::Or => {
                if lt != Type::Bool || rt != Type::Bool {
                    self.ctx
                        .diagnostics
                        .report(line, "Wrong type on logic expression");
                }
                let op = if op == BinaryOp::And {
                    LogicOp::And
                } else {
                    LogicOp::Or
                };
                BoundExpr::Logic { op, left, right }
            }
        }
    }
}
