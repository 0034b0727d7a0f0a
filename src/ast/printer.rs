use std::rc::Rc;

use crate::lexer::Token;

use super::{ClassDecl, Expr, ExprId, ExprVisitor, FunDecl, Literal, Stmt, StmtVisitor};

/// Renders trees as S-expressions.
pub struct AstPrinter{}

impl AstPrinter {
    fn function(&mut self, kind: &str, name: &str, params: &[Token], body: &[Stmt]) -> String {
        let mut s = format!("({} {}", kind, name);
        for param in params {
            s.push(' ');
            s.push_str(param.lexeme());
        }
        s.push(' ');
        s.push_str(&self.visit_block(body));
        s.push(')');
        s
    }

    fn member(&mut self, kind: &str, fun: &FunDecl) -> String {
        self.function(kind, fun.name.lexeme(), &fun.params, &fun.body)
    }
}

impl ExprVisitor<String> for AstPrinter {
    fn visit_assign(&mut self, _id: ExprId, ident: &Token, value: &Expr) -> String {
        format!("(= {} {})", ident.lexeme(), self.visit_expr(value))
    }

    fn visit_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> String {
        format!("({} {} {})", op.lexeme(), self.visit_expr(left), self.visit_expr(right))
    }

    fn visit_call(&mut self, callee: &Expr, _paren: &Token, args: &[Expr]) -> String {
        let mut s = format!("(call {}", self.visit_expr(callee));
        for arg in args {
            s.push(' ');
            s.push_str(&self.visit_expr(arg));
        }
        s.push(')');
        s
    }

    fn visit_get(&mut self, obj: &Expr, name: &Token) -> String {
        format!("{}.{}", self.visit_expr(obj), name.lexeme())
    }

    fn visit_fun_expr(&mut self, _keyword: &Token, params: &[Token], body: &Rc<[Stmt]>) -> String {
        self.function("fun", "@anonymous", params, body)
    }

    fn visit_grouping(&mut self, expr: &Expr) -> String {
        format!("(group {})", self.visit_expr(expr))
    }

    fn visit_literal(&mut self, value: &Literal) -> String {
        match value {
            Literal::String(string) => format!("\"{}\"", string),
            other => other.to_string(),
        }
    }

    fn visit_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> String {
        format!("({} {} {})", op.lexeme(), self.visit_expr(left), self.visit_expr(right))
    }

    fn visit_set(&mut self, obj: &Expr, name: &Token, value: &Expr) -> String {
        format!("(set {}.{} {})", self.visit_expr(obj), name.lexeme(), self.visit_expr(value))
    }

    fn visit_super(&mut self, _id: ExprId, _keyword: &Token, method: &Token) -> String {
        format!("super.{}", method.lexeme())
    }

    fn visit_ternary(&mut self, cond: &Expr, _op: &Token, then_branch: &Expr, else_branch: &Expr) -> String {
        format!("(? {} {} {})", self.visit_expr(cond), self.visit_expr(then_branch), self.visit_expr(else_branch))
    }

    fn visit_this(&mut self, _id: ExprId, _keyword: &Token) -> String {
        "this".to_string()
    }

    fn visit_unary(&mut self, op: &Token, expr: &Expr) -> String {
        format!("({} {})", op.lexeme(), self.visit_expr(expr))
    }

    fn visit_var_ref(&mut self, _id: ExprId, name: &Token) -> String {
        name.lexeme().to_string()
    }
}

impl StmtVisitor<String> for AstPrinter {
    fn visit_block(&mut self, stmts: &[Stmt]) -> String {
        let mut result = String::new();
        result.push_str("(block");
        for stmt in stmts {
            result.push(' ');
            result.push_str(&self.visit_stmt(stmt));
        }
        result.push(')');
        result
    }

    fn visit_break(&mut self, _keyword: &Token) -> String {
        "(break)".to_string()
    }

    fn visit_class(&mut self, class: &ClassDecl) -> String {
        let mut result = String::new();
        result.push_str("(class ");
        result.push_str(class.name.lexeme());
        if let Some(superclass) = &class.superclass {
            result.push_str(" < ");
            result.push_str(&self.visit_expr(superclass));
        }

        let members = class.methods.iter().map(|m| ("fun", m))
            .chain(class.getters.iter().map(|m| ("get", m)))
            .chain(class.statics.iter().map(|m| ("class-fun", m)))
            .chain(class.static_getters.iter().map(|m| ("class-get", m)))
            .collect::<Vec<_>>();

        for (kind, member) in members {
            result.push(' ');
            result.push_str(&self.member(kind, member));
        }
        result.push(')');
        result
    }

    fn visit_expr_stmt(&mut self, expr: &Expr) -> String {
        format!("({})", self.visit_expr(expr))
    }

    fn visit_fun_def(&mut self, fun: &FunDecl) -> String {
        self.member("fun", fun)
    }

    fn visit_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> String {
        let mut result = String::new();
        result.push_str("(if ");
        result.push_str(&self.visit_expr(cond));
        result.push(' ');
        result.push_str(&self.visit_stmt(then_branch));
        if let Some(else_branch) = else_branch {
            result.push(' ');
            result.push_str(&self.visit_stmt(else_branch));
        }
        result.push(')');
        result
    }

    fn visit_print(&mut self, expr: &Expr) -> String {
        format!("(print {})", self.visit_expr(expr))
    }

    fn visit_return(&mut self, _keyword: &Token, expr: Option<&Expr>) -> String {
        let mut result = String::new();
        result.push_str("(return");
        if let Some(expr) = expr {
            result.push(' ');
            result.push_str(&self.visit_expr(expr));
        }
        result.push(')');
        result
    }

    fn visit_var_def(&mut self, name: &Token, init: Option<&Expr>) -> String {
        match init {
            Some(expr) => format!("(var {} {})", name.lexeme(), self.visit_expr(expr)),
            None => format!("(var {})", name.lexeme()),
        }
    }

    fn visit_while(&mut self, cond: &Expr, body: &Stmt) -> String {
        format!("(while {} {})", self.visit_expr(cond), self.visit_stmt(body))
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::TokenType;

    use super::*;

    #[test]
    fn test_ast_printer() {
        let expr = Expr::Binary(
            Box::new(Expr::Unary(Token::new(TokenType::Minus, "-", 1, 1), Box::new(Expr::Literal(Literal::Number(123.))))),
            Token::new(TokenType::Star, "*", 1, 6),
            Box::new(Expr::Grouping(Box::new(Expr::Literal(Literal::Number(45.67))))),
        );

        let mut printer = AstPrinter{};
        let result = printer.visit_expr(&expr);
        assert_eq!(result, "(* (- 123) (group 45.67))");
    }

    #[test]
    fn test_var_without_initializer() {
        let stmt = Stmt::Var(Token::new(TokenType::Identifier, "a", 1, 5), None);

        assert_eq!(AstPrinter{}.visit_stmt(&stmt), "(var a)");
    }
}
