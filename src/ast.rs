use std::rc::Rc;

use derive_more::{Display, From, TryInto};

use crate::common::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperator {
    #[display(fmt = "+")]
    Add,
    #[display(fmt = "-")]
    Sub,
    #[display(fmt = "*")]
    Mul,
    #[display(fmt = "/")]
    Div,
    #[display(fmt = "%")]
    Mod,
    #[display(fmt = "**")]
    Pow,
    #[display(fmt = "==")]
    Eq,
    #[display(fmt = "!=")]
    NotEq,
    #[display(fmt = "<")]
    Lt,
    #[display(fmt = ">")]
    Gt,
    #[display(fmt = "<=")]
    LtEq,
    #[display(fmt = ">=")]
    GtEq,
    #[display(fmt = "and")]
    And,
    #[display(fmt = "or")]
    Or,
}

impl BinaryOperator {
    /// Operators that distribute element-wise over arrays.
    pub fn is_vectorized(&self) -> bool {
        matches!(*self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Pow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOperator {
    #[display(fmt = "-")]
    Neg,
    #[display(fmt = "not")]
    Not,
}

/// Scalar literal value as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub type_annotation: Option<String>,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Rc<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_block: Vec<Stmt>,
    pub else_block: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub var_name: String,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, From, TryInto)]
pub enum Stmt {
    VarDecl(VarDecl),
    FuncDecl(FuncDecl),
    If(IfStmt),
    For(ForStmt),
    While(WhileStmt),
    Return(ReturnStmt),
    Assignment(Assignment),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOperator,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOperator,
    pub operand: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrLit {
    pub elements: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeExpr {
    pub start: Box<Expr>,
    pub end: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarExpr {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, From, TryInto)]
pub enum ExprKind {
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    ArrLit(ArrLit),
    Range(RangeExpr),
    Var(VarExpr),
    Lit(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: impl Into<ExprKind>, pos: Position) -> Self {
        Expr {
            kind: kind.into(),
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

// Deeply nested trees are torn down with an explicit work list so that
// dropping a parsed program never recurses once per nesting level.

impl ExprKind {
    fn take_children(&mut self, pending: &mut Vec<Expr>) {
        match std::mem::replace(self, ExprKind::Lit(Literal::Bool(false))) {
            ExprKind::Binary(binary) => {
                pending.push(*binary.left);
                pending.push(*binary.right);
            }
            ExprKind::Unary(unary) => pending.push(*unary.operand),
            ExprKind::Call(call) => pending.extend(call.args),
            ExprKind::ArrLit(arr) => pending.extend(arr.elements),
            ExprKind::Range(range) => {
                pending.push(*range.start);
                pending.push(*range.end);
            }
            ExprKind::Var(_) | ExprKind::Lit(_) => {}
        }
    }
}

impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.kind.take_children(&mut pending);
        while let Some(mut expr) = pending.pop() {
            expr.kind.take_children(&mut pending);
        }
    }
}

fn drop_block(block: &mut Vec<Stmt>) {
    let mut pending = std::mem::take(block);
    while let Some(stmt) = pending.pop() {
        match stmt {
            Stmt::If(mut if_stmt) => {
                pending.append(&mut if_stmt.then_block);
                if let Some(mut else_block) = if_stmt.else_block.take() {
                    pending.append(&mut else_block);
                }
            }
            Stmt::For(mut for_stmt) => pending.append(&mut for_stmt.body),
            Stmt::While(mut while_stmt) => pending.append(&mut while_stmt.body),
            Stmt::FuncDecl(mut func_decl) => {
                if let Some(body) = Rc::get_mut(&mut func_decl.body) {
                    pending.append(body);
                }
            }
            _ => {}
        }
    }
}

impl Drop for IfStmt {
    fn drop(&mut self) {
        drop_block(&mut self.then_block);
        if let Some(else_block) = &mut self.else_block {
            drop_block(else_block);
        }
    }
}

impl Drop for ForStmt {
    fn drop(&mut self) {
        drop_block(&mut self.body);
    }
}

impl Drop for WhileStmt {
    fn drop(&mut self) {
        drop_block(&mut self.body);
    }
}

impl Drop for FuncDecl {
    fn drop(&mut self) {
        if let Some(body) = Rc::get_mut(&mut self.body) {
            drop_block(body);
        }
    }
}
