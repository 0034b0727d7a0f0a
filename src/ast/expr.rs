use std::{rc::Rc, sync::atomic::{AtomicUsize, Ordering}};

use crate::lexer::Token;

use super::{Literal, Stmt};

/// Identifies a single variable-referencing node in the tree, so that scope resolution can
/// be recorded against the node rather than against the name it references.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        ExprId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Assign(ExprId, Token, Box<Expr>),
    Binary(Box<Expr>, Token, Box<Expr>),
    Call(Box<Expr>, Token, Vec<Expr>),
    Get(Box<Expr>, Token),
    Fun(Token, Vec<Token>, Rc<[Stmt]>),
    Grouping(Box<Expr>),
    Literal(Literal),
    Logical(Box<Expr>, Token, Box<Expr>),
    Set(Box<Expr>, Token, Box<Expr>),
    Super(ExprId, Token, Token),
    Ternary(Box<Expr>, Token, Box<Expr>, Box<Expr>),
    This(ExprId, Token),
    Unary(Token, Box<Expr>),
    Var(ExprId, Token),
}

pub trait ExprVisitor<T> {
    fn visit_expr(&mut self, expr: &Expr) -> T {
        match expr {
            Expr::Assign(id, ident, value) => {
                self.visit_assign(*id, ident, value)
            },
            Expr::Binary(left, op, right) => {
                self.visit_binary(left, op, right)
            },
            Expr::Call(callee, paren, args) => {
                self.visit_call(callee, paren, args)
            },
            Expr::Get(obj, name) => {
                self.visit_get(obj, name)
            },
            Expr::Fun(keyword, params, body) => {
                self.visit_fun_expr(keyword, params, body)
            },
            Expr::Grouping(expr) => {
                self.visit_grouping(expr)
            },
            Expr::Literal(value) => {
                self.visit_literal(value)
            },
            Expr::Logical(left, op, right) => {
                self.visit_logical(left, op, right)
            },
            Expr::Set(obj, property, value) => {
                self.visit_set(obj, property, value)
            },
            Expr::Super(id, keyword, method) => {
                self.visit_super(*id, keyword, method)
            },
            Expr::Ternary(cond, op, then_branch, else_branch) => {
                self.visit_ternary(cond, op, then_branch, else_branch)
            },
            Expr::This(id, keyword) => {
                self.visit_this(*id, keyword)
            },
            Expr::Unary(op, expr) => {
                self.visit_unary(op, expr)
            },
            Expr::Var(id, name) => {
                self.visit_var_ref(*id, name)
            }
        }
    }

    fn visit_assign(&mut self, id: ExprId, ident: &Token, value: &Expr) -> T;

    fn visit_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> T;

    fn visit_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> T;

    fn visit_get(&mut self, obj: &Expr, property: &Token) -> T;

    fn visit_fun_expr(&mut self, keyword: &Token, params: &[Token], body: &Rc<[Stmt]>) -> T;

    fn visit_grouping(&mut self, expr: &Expr) -> T;

    fn visit_literal(&mut self, value: &Literal) -> T;

    fn visit_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> T;

    fn visit_set(&mut self, obj: &Expr, property: &Token, value: &Expr) -> T;

    fn visit_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> T;

    fn visit_ternary(&mut self, cond: &Expr, op: &Token, then_branch: &Expr, else_branch: &Expr) -> T;

    fn visit_this(&mut self, id: ExprId, keyword: &Token) -> T;

    fn visit_unary(&mut self, op: &Token, expr: &Expr) -> T;

    fn visit_var_ref(&mut self, id: ExprId, name: &Token) -> T;
}
