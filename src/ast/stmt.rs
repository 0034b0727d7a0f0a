use std::rc::Rc;

use crate::lexer::Token;

use super::Expr;

#[derive(Debug, Clone, PartialEq)]
pub struct FunDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Rc<[Stmt]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Token,
    pub superclass: Option<Expr>,
    pub methods: Vec<FunDecl>,
    pub getters: Vec<FunDecl>,
    pub statics: Vec<FunDecl>,
    pub static_getters: Vec<FunDecl>,
}

impl ClassDecl {
    /// Every member of the class body, instance members first.
    pub fn members(&self) -> impl Iterator<Item = &FunDecl> {
        self.methods.iter()
            .chain(self.getters.iter())
            .chain(self.statics.iter())
            .chain(self.static_getters.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Break(Token),
    Class(ClassDecl),
    Expression(Expr),
    Fun(FunDecl),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Print(Expr),
    Return(Token, Option<Expr>),
    Var(Token, Option<Expr>),
    While(Expr, Box<Stmt>),
}

pub trait StmtVisitor<T> {
    fn visit_stmt(&mut self, stmt: &Stmt) -> T {
        match stmt {
            Stmt::Block(stmts) => self.visit_block(stmts),
            Stmt::Break(keyword) => self.visit_break(keyword),
            Stmt::Class(class) => self.visit_class(class),
            Stmt::Expression(expr) => self.visit_expr_stmt(expr),
            Stmt::Fun(fun) => self.visit_fun_def(fun),
            Stmt::If(cond, then_branch, else_branch) => self.visit_if(cond, then_branch, else_branch.as_deref()),
            Stmt::Print(expr) => self.visit_print(expr),
            Stmt::Return(keyword, expr) => self.visit_return(keyword, expr.as_ref()),
            Stmt::Var(name, init) => self.visit_var_def(name, init.as_ref()),
            Stmt::While(cond, body) => self.visit_while(cond, body),
        }
    }

    fn visit_block(&mut self, stmts: &[Stmt]) -> T;

    fn visit_break(&mut self, keyword: &Token) -> T;

    fn visit_class(&mut self, class: &ClassDecl) -> T;

    fn visit_expr_stmt(&mut self, expr: &Expr) -> T;

    fn visit_fun_def(&mut self, fun: &FunDecl) -> T;

    fn visit_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> T;

    fn visit_print(&mut self, expr: &Expr) -> T;

    fn visit_return(&mut self, keyword: &Token, expr: Option<&Expr>) -> T;

    fn visit_var_def(&mut self, name: &Token, init: Option<&Expr>) -> T;

    fn visit_while(&mut self, cond: &Expr, body: &Stmt) -> T;
}
