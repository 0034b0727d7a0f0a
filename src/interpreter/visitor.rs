use std::{io::Write, rc::Rc};

use crate::{ast::{ClassDecl, Expr, ExprId, ExprVisitor, FunDecl, Literal, Stmt, StmtVisitor}, errors, lexer::{Token, TokenType}, LoxError};

use super::{class::{Instance, MemberKind}, Callable, Class, Fun, Interpreter, Value};

const MAX_CALL_DEPTH: usize = 1000;

/// Stack space which must remain before a call is made, and the amount to grow by when it doesn't.
const RED_ZONE: usize = 128 * 1024;
const STACK_PER_CALL: usize = 1024 * 1024;

/// How a statement finished executing. `Break` and `Return` unwind to the nearest enclosing
/// loop or call respectively.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break,
    Return(Value),
}

impl Interpreter {
    fn invoke<C: Callable>(&mut self, callee: &C, paren: &Token, args: Vec<Value>) -> Result<Value, LoxError> {
        if args.len() != callee.arity() {
            return Err(errors::runtime(
                paren,
                format!("Expected {} arguments but got {}.", callee.arity(), args.len()),
                "Make sure that you are passing the correct number of arguments to the function.",
            ));
        }

        if self.depth >= MAX_CALL_DEPTH {
            return Err(errors::runtime(
                paren,
                "Stack overflow.",
                format!("Calls may only be nested {} deep, make sure that your recursion has a base case which is reached.", MAX_CALL_DEPTH),
            ));
        }

        self.depth += 1;
        let result = stacker::maybe_grow(RED_ZONE, STACK_PER_CALL, || callee.call(self, args));
        self.depth -= 1;
        result
    }

    fn instance_property(&mut self, instance: &Instance, name: &Token) -> Result<Value, LoxError> {
        if let Some(value) = instance.field(name.lexeme()) {
            return Ok(value);
        }

        let class = instance.class();
        let this = Value::Instance(instance.clone());
        if let Some(getter) = class.find(MemberKind::Getter, name.lexeme()) {
            return self.invoke(&getter.bind(this), name, vec![]);
        }

        match class.find(MemberKind::Method, name.lexeme()) {
            Some(method) => Ok(Value::Function(method.bind(this))),
            None => Err(Self::undefined_property(name)),
        }
    }

    fn static_property(&mut self, class: &Rc<Class>, name: &Token) -> Result<Value, LoxError> {
        let this = Value::Class(class.clone());
        if let Some(getter) = class.find(MemberKind::StaticGetter, name.lexeme()) {
            return self.invoke(&getter.bind(this), name, vec![]);
        }

        match class.find(MemberKind::Static, name.lexeme()) {
            Some(method) => Ok(Value::Function(method.bind(this))),
            None => Err(Self::undefined_property(name)),
        }
    }

    fn undefined_property(name: &Token) -> LoxError {
        errors::runtime(
            name,
            format!("Undefined property '{}'.", name.lexeme()),
            "Make sure that the property is assigned, or declared by the class, before reading it.",
        )
    }

    fn numbers(op: &Token, left: &Value, right: &Value) -> Result<(f64, f64), LoxError> {
        match (left, right) {
            (Value::Number(left), Value::Number(right)) => Ok((*left, *right)),
            (left, right) => Err(errors::runtime(
                op,
                "Operands must be numbers.",
                format!("Provide numbers on both sides of the '{}' operator, rather than a {} and a {}.", op.lexeme(), left.type_name(), right.type_name()),
            )),
        }
    }

    fn divisor(op: &Token, right: f64) -> Result<f64, LoxError> {
        if right == 0.0 {
            return Err(errors::runtime(
                op,
                "Division by zero.",
                "Check that the right hand side of the operator is not zero before dividing.",
            ));
        }

        Ok(right)
    }

    fn integers(op: &Token, left: &Value, right: &Value) -> Result<(i64, i64), LoxError> {
        fn integral(n: f64) -> Option<i64> {
            // 2^63 is the first value which does not fit.
            if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
                Some(n as i64)
            } else {
                None
            }
        }

        let (left, right) = Self::numbers(op, left, right)?;
        match (integral(left), integral(right)) {
            (Some(left), Some(right)) => Ok((left, right)),
            _ => Err(errors::runtime(
                op,
                "Operands must be integers.",
                format!("The '{}' operator only works on whole numbers, try rounding the operands first.", op.lexeme()),
            )),
        }
    }

    fn shift(op: &Token, value: i64, amount: i64) -> Result<i64, LoxError> {
        let shifted = u32::try_from(amount).ok().and_then(|amount| match op.token_type() {
            TokenType::LessLess => value.checked_shl(amount),
            _ => value.checked_shr(amount),
        });

        shifted.ok_or_else(|| errors::runtime(
            op,
            "Shift amount must be between 0 and 63.",
            "Make sure that the right hand side of the shift operator is within the width of a 64-bit integer.",
        ))
    }
}

impl ExprVisitor<Result<Value, LoxError>> for Interpreter {
    fn visit_assign(&mut self, id: ExprId, ident: &Token, value: &Expr) -> Result<Value, LoxError> {
        let value = self.visit_expr(value)?;
        self.assign_variable(id, ident, value.clone())?;
        Ok(value)
    }

    fn visit_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value, LoxError> {
        let left = self.visit_expr(left)?;
        let right = self.visit_expr(right)?;

        match op.token_type() {
            TokenType::EqualEqual => Ok(Value::Bool(left == right)),
            TokenType::BangEqual => Ok(Value::Bool(left != right)),
            TokenType::Greater => Self::numbers(op, &left, &right).map(|(l, r)| Value::Bool(l > r)),
            TokenType::GreaterEqual => Self::numbers(op, &left, &right).map(|(l, r)| Value::Bool(l >= r)),
            TokenType::Less => Self::numbers(op, &left, &right).map(|(l, r)| Value::Bool(l < r)),
            TokenType::LessEqual => Self::numbers(op, &left, &right).map(|(l, r)| Value::Bool(l <= r)),
            TokenType::Plus => match (left, right) {
                (Value::Number(left), Value::Number(right)) => Ok(Value::Number(left + right)),
                (Value::String(left), right) => Ok(Value::String(format!("{}{}", left, right))),
                (left, right) => Err(errors::runtime(
                    op,
                    "Operands must be two numbers or a string followed by a value.",
                    format!("Provide numbers on both sides of the '+' operator, or a string on its left, rather than a {} and a {}.", left.type_name(), right.type_name()),
                )),
            },
            TokenType::Minus => Self::numbers(op, &left, &right).map(|(l, r)| Value::Number(l - r)),
            TokenType::Star => Self::numbers(op, &left, &right).map(|(l, r)| Value::Number(l * r)),
            TokenType::Slash => {
                let (left, right) = Self::numbers(op, &left, &right)?;
                Ok(Value::Number(left / Self::divisor(op, right)?))
            },
            TokenType::Percent => {
                let (left, right) = Self::numbers(op, &left, &right)?;
                Ok(Value::Number(left % Self::divisor(op, right)?))
            },
            TokenType::Ampersand => Self::integers(op, &left, &right).map(|(l, r)| Value::Number((l & r) as f64)),
            TokenType::Pipe => Self::integers(op, &left, &right).map(|(l, r)| Value::Number((l | r) as f64)),
            TokenType::Caret => Self::integers(op, &left, &right).map(|(l, r)| Value::Number((l ^ r) as f64)),
            TokenType::LessLess | TokenType::GreaterGreater => {
                let (left, right) = Self::integers(op, &left, &right)?;
                Self::shift(op, left, right).map(|v| Value::Number(v as f64))
            },
            _ => Err(errors::system(
                format!("We received an unexpected binary operator: {}", op),
                "This is a bug in the interpreter, please report it with example code.",
            )),
        }
    }

    fn visit_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> Result<Value, LoxError> {
        let callee = self.visit_expr(callee)?;

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.visit_expr(arg)?);
        }

        match callee {
            Value::Function(fun) => self.invoke(&fun, paren, values),
            Value::Class(class) => self.invoke(&class, paren, values),
            other => Err(errors::runtime(
                paren,
                "Can only call functions and classes.",
                format!("A {} cannot be called, make sure you are calling the value you intended to.", other.type_name()),
            )),
        }
    }

    fn visit_get(&mut self, obj: &Expr, property: &Token) -> Result<Value, LoxError> {
        match self.visit_expr(obj)? {
            Value::Instance(instance) => self.instance_property(&instance, property),
            Value::Class(class) => self.static_property(&class, property),
            other => Err(errors::runtime(
                property,
                "Only instances have properties.",
                format!("Make sure that you are reading '{}' from an instance of a class rather than a {}.", property.lexeme(), other.type_name()),
            )),
        }
    }

    fn visit_fun_expr(&mut self, _keyword: &Token, params: &[Token], body: &Rc<[Stmt]>) -> Result<Value, LoxError> {
        self.env.pin(self.scope);
        Ok(Value::Function(Fun::lambda(params, body.clone(), self.scope)))
    }

    fn visit_grouping(&mut self, expr: &Expr) -> Result<Value, LoxError> {
        self.visit_expr(expr)
    }

    fn visit_literal(&mut self, value: &Literal) -> Result<Value, LoxError> {
        Ok(value.into())
    }

    fn visit_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value, LoxError> {
        let left = self.visit_expr(left)?;

        match op.token_type() {
            TokenType::And if left.is_truthy() => self.visit_expr(right),
            TokenType::Or if !left.is_truthy() => self.visit_expr(right),
            _ => Ok(left)
        }
    }

    fn visit_set(&mut self, obj: &Expr, property: &Token, value: &Expr) -> Result<Value, LoxError> {
        match self.visit_expr(obj)? {
            Value::Instance(instance) => {
                let value = self.visit_expr(value)?;
                instance.set(property.lexeme(), value.clone());
                Ok(value)
            },
            other => Err(errors::runtime(
                property,
                "Only instances have fields.",
                format!("Make sure that you are assigning '{}' on an instance of a class rather than a {}.", property.lexeme(), other.type_name()),
            )),
        }
    }

    fn visit_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value, LoxError> {
        let unresolved = || errors::system(
            "Failed to resolve `super` within a method.",
            "This is a bug in the interpreter, please report it with example code.",
        );

        let hops = self.bindings.get(id).ok_or_else(unresolved)?;
        let Value::Class(superclass) = self.env.get_at(self.scope, hops, keyword)? else {
            return Err(unresolved());
        };

        let this = Token::new(TokenType::This, "this", keyword.line(), keyword.column());
        let receiver = self.env.get_at(self.scope, hops.checked_sub(1).ok_or_else(unresolved)?, &this)?;

        let (getter, member) = match receiver {
            Value::Class(_) => (MemberKind::StaticGetter, MemberKind::Static),
            _ => (MemberKind::Getter, MemberKind::Method),
        };

        if let Some(getter) = superclass.find(getter, method.lexeme()) {
            return self.invoke(&getter.bind(receiver), method, vec![]);
        }

        match superclass.find(member, method.lexeme()) {
            Some(fun) => Ok(Value::Function(fun.bind(receiver))),
            None => Err(Self::undefined_property(method)),
        }
    }

    fn visit_ternary(&mut self, cond: &Expr, op: &Token, then_branch: &Expr, else_branch: &Expr) -> Result<Value, LoxError> {
        match self.visit_expr(cond)? {
            Value::Bool(true) => self.visit_expr(then_branch),
            Value::Bool(false) => self.visit_expr(else_branch),
            other => Err(errors::runtime(
                op,
                "Ternary condition must be a boolean.",
                format!("The condition evaluated to a {}, try comparing it explicitly, e.g. `x != nil ? a : b`.", other.type_name()),
            )),
        }
    }

    fn visit_this(&mut self, id: ExprId, keyword: &Token) -> Result<Value, LoxError> {
        self.lookup_variable(id, keyword)
    }

    fn visit_unary(&mut self, op: &Token, expr: &Expr) -> Result<Value, LoxError> {
        let right = self.visit_expr(expr)?;

        match op.token_type() {
            TokenType::Minus => match right {
                Value::Number(num) => Ok(Value::Number(-num)),
                other => Err(errors::runtime(
                    op,
                    "Operand must be a number.",
                    format!("Provide a number to the unary negation operator rather than a {}, or remove the minus sign.", other.type_name()),
                )),
            },
            TokenType::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => Err(errors::system(
                format!("We received an unexpected unary operator: {}", op),
                "This is a bug in the interpreter, please report it with example code.",
            )),
        }
    }

    fn visit_var_ref(&mut self, id: ExprId, name: &Token) -> Result<Value, LoxError> {
        self.lookup_variable(id, name)
    }
}

impl StmtVisitor<Result<Flow, LoxError>> for Interpreter {
    fn visit_block(&mut self, stmts: &[Stmt]) -> Result<Flow, LoxError> {
        let scope = self.env.child(self.scope);
        let result = self.execute_block(stmts, scope);
        self.env.release(scope);
        result
    }

    fn visit_break(&mut self, _keyword: &Token) -> Result<Flow, LoxError> {
        Ok(Flow::Break)
    }

    fn visit_class(&mut self, class: &ClassDecl) -> Result<Flow, LoxError> {
        let superclass = match &class.superclass {
            Some(expr) => match self.visit_expr(expr)? {
                Value::Class(superclass) => Some(superclass),
                _ => {
                    let token = match expr {
                        Expr::Var(_, token) => token,
                        _ => &class.name,
                    };

                    return Err(errors::runtime(
                        token,
                        "Superclass must be a class.",
                        "Make sure that the name after '<' refers to a class declaration.",
                    ));
                }
            },
            None => None,
        };

        self.env.define(self.scope, class.name.lexeme(), Value::Nil);

        let scope = match &superclass {
            Some(superclass) => {
                let scope = self.env.child(self.scope);
                self.env.define(scope, "super", Value::Class(superclass.clone()));
                scope
            },
            None => self.scope,
        };
        self.env.pin(scope);

        let mut definition = Class::new(class.name.lexeme(), superclass);
        for method in class.methods.iter() {
            let fun = if method.name.lexeme() == "init" {
                Fun::initializer(&method.name, &method.params, method.body.clone(), scope)
            } else {
                Fun::closure(&method.name, &method.params, method.body.clone(), scope)
            };

            definition.define(MemberKind::Method, method.name.lexeme(), fun);
        }

        let members = [
            (MemberKind::Getter, &class.getters),
            (MemberKind::Static, &class.statics),
            (MemberKind::StaticGetter, &class.static_getters),
        ];

        for (kind, funs) in members {
            for fun in funs.iter() {
                definition.define(kind, fun.name.lexeme(), Fun::closure(&fun.name, &fun.params, fun.body.clone(), scope));
            }
        }

        tracing::debug!(
            class = class.name.lexeme(),
            superclass = definition.superclass().map(|s| s.name()),
            "defined class"
        );

        self.env.define(self.scope, class.name.lexeme(), Value::Class(Rc::new(definition)));
        Ok(Flow::Normal)
    }

    fn visit_expr_stmt(&mut self, expr: &Expr) -> Result<Flow, LoxError> {
        self.visit_expr(expr)?;
        Ok(Flow::Normal)
    }

    fn visit_fun_def(&mut self, fun: &FunDecl) -> Result<Flow, LoxError> {
        self.env.pin(self.scope);
        let closure = Fun::closure(&fun.name, &fun.params, fun.body.clone(), self.scope);
        self.env.define(self.scope, fun.name.lexeme(), Value::Function(closure));
        Ok(Flow::Normal)
    }

    fn visit_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Result<Flow, LoxError> {
        if self.visit_expr(cond)?.is_truthy() {
            self.visit_stmt(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.visit_stmt(else_branch)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn visit_print(&mut self, expr: &Expr) -> Result<Flow, LoxError> {
        let value = self.visit_expr(expr)?;
        writeln!(self.output, "{}", value)?;
        Ok(Flow::Normal)
    }

    fn visit_return(&mut self, _keyword: &Token, expr: Option<&Expr>) -> Result<Flow, LoxError> {
        let value = match expr {
            Some(expr) => self.visit_expr(expr)?,
            None => Value::Nil,
        };

        Ok(Flow::Return(value))
    }

    fn visit_var_def(&mut self, name: &Token, init: Option<&Expr>) -> Result<Flow, LoxError> {
        let value = match init {
            Some(expr) => Some(self.visit_expr(expr)?),
            None => None,
        };

        self.env.define(self.scope, name.lexeme(), value);
        Ok(Flow::Normal)
    }

    fn visit_while(&mut self, cond: &Expr, body: &Stmt) -> Result<Flow, LoxError> {
        while self.visit_expr(cond)?.is_truthy() {
            match self.visit_stmt(body)? {
                Flow::Normal => {},
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
            }
        }

        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{ast::Parser, interpreter::ErrorPolicy, lexer::Scanner, CaptureOutput, CaptureReports};

    use super::*;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tree, errs) = Parser::parse(&mut Scanner::new(source).filter_map(|t| t.ok()));
        assert!(errs.is_empty(), "no parsing errors, got {:?}", errs);
        tree
    }

    fn run_with(source: &str, policy: ErrorPolicy) -> (String, Vec<LoxError>) {
        let output = CaptureOutput::new();
        let mut interpreter = Interpreter::default()
            .with_output(Box::new(output.clone()))
            .with_reporter(Box::new(CaptureReports::new()))
            .with_error_policy(policy);

        let errs = interpreter.run(&parse(source));
        (output.to_string(), errs)
    }

    fn run(source: &str) -> (String, Vec<LoxError>) {
        run_with(source, ErrorPolicy::AbortProgram)
    }

    fn output(source: &str) -> String {
        let (output, errs) = run(source);
        assert!(errs.is_empty(), "no errors, got {:?}", errs);
        output
    }

    fn runtime_error(source: &str) -> String {
        let (_, errs) = run(source);
        assert_eq!(errs.len(), 1, "expected exactly one error, got {:?}", errs);
        assert!(errs[0].is_runtime(), "expected a runtime error, got {:?}", errs[0]);
        errs[0].message().to_string()
    }

    #[test]
    fn test_basic_math() {
        let lexer = Scanner::new("10 - 12 / (2 * 3)");
        let tree = Parser::parse_expr(&mut lexer.filter_map(|x| x.ok())).expect("no errors");

        let mut interpreter = Interpreter::default();
        let result = interpreter.evaluate_one(&tree).expect("no errors");
        assert_eq!(result, Value::Number(8.0));
    }

    #[test]
    fn test_operators() {
        assert_eq!(output("print 7 % 4; print -2 * 3; print 1 + 2 == 3; print !nil;"), "3\n-6\ntrue\ntrue\n");
        assert_eq!(output("print 6 & 3; print 6 | 3; print 6 ^ 3; print 1 << 4; print -16 >> 2;"), "2\n7\n5\n16\n-4\n");
        assert_eq!(output("print \"a\" + 1; print \"b\" + nil; print nil == false;"), "a1\nbnil\nfalse\n");
        assert_eq!(output("print nil or \"x\"; print false and missing;"), "x\nfalse\n");
    }

    #[test]
    fn test_runtime_type_errors() {
        assert_eq!(runtime_error("1 / 0;"), "Division by zero.");
        assert_eq!(runtime_error("1 % 0;"), "Division by zero.");
        assert_eq!(runtime_error("1 < \"2\";"), "Operands must be numbers.");
        assert_eq!(runtime_error("1 + \"2\";"), "Operands must be two numbers or a string followed by a value.");
        assert_eq!(runtime_error("1.5 & 1;"), "Operands must be integers.");
        assert_eq!(runtime_error("1 << 64;"), "Shift amount must be between 0 and 63.");
        assert_eq!(runtime_error("-\"a\";"), "Operand must be a number.");
        assert_eq!(runtime_error("print 1 ? 2 : 3;"), "Ternary condition must be a boolean.");
        assert_eq!(runtime_error("\"a\"();"), "Can only call functions and classes.");
        assert_eq!(runtime_error("fun f(a) {} f();"), "Expected 1 arguments but got 0.");
        assert_eq!(runtime_error("print undefined;"), "Undefined variable 'undefined'.");
        assert_eq!(runtime_error("undefined = 1;"), "Undefined variable 'undefined'.");
        assert_eq!(runtime_error("var a; print a;"), "Uninitialized variable 'a'.");
        assert_eq!(runtime_error("var a = 1; a.b;"), "Only instances have properties.");
        assert_eq!(runtime_error("var a = 1; a.b = 2;"), "Only instances have fields.");
        assert_eq!(runtime_error("class A {} A().b;"), "Undefined property 'b'.");
        assert_eq!(runtime_error("var A = 1; class B < A {}"), "Superclass must be a class.");
    }

    #[test]
    fn test_ternary_evaluates_one_branch() {
        assert_eq!(output("print true ? \"yes\" : missing; print false ? missing : \"no\";"), "yes\nno\n");
    }

    #[test]
    fn test_initializer_shadowing() {
        assert_eq!(output("var a = 1; { var a = a + 1; print a; } print a;"), "2\n1\n");
    }

    #[test]
    fn test_counter_closure() {
        let source = "fun counter() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } var c = counter(); print c(); print c();";
        assert_eq!(output(source), "1\n2\n");
    }

    #[test]
    fn test_per_iteration_closures() {
        let source = r#"
            var fns = nil;
            var i = 0;
            var first; var second;
            while (i < 2) {
                var j = i;
                fun show() { print j; }
                if (i == 0) first = show; else second = show;
                i = i + 1;
            }
            first();
            second();
        "#;

        assert_eq!(output(source), "0\n1\n");
    }

    #[test]
    fn test_break_unwinds_one_loop() {
        let source = r#"
            for (var i = 0; i < 3; i = i + 1) {
                for (var j = 0; j < 3; j = j + 1) {
                    if (j == 1) break;
                    print i * 10 + j;
                }
            }
        "#;

        assert_eq!(output(source), "0\n10\n20\n");
    }

    #[test]
    fn test_return_from_loop() {
        assert_eq!(output("fun f() { while (true) { return \"done\"; } } print f();"), "done\n");
    }

    #[test]
    fn test_classes() {
        assert_eq!(output("class Cake { taste() { return \"good\"; } } print Cake().taste();"), "good\n");
        assert_eq!(output("class A {} print A; print A(); fun f() {} print f; print clock; print fun () {};"), "<class A>\n<instance of A>\n<fn f>\n<native fn clock>\n<lambda>\n");
    }

    #[test]
    fn test_initializer() {
        let source = r#"
            class Point {
                init(x, y) { this.x = x; this.y = y; }
                sum() { return this.x + this.y; }
            }
            var p = Point(1, 2);
            print p.sum();
            print p.init(3, 4) == p;
            print p.sum();
        "#;

        assert_eq!(output(source), "3\ntrue\n7\n");
        assert_eq!(runtime_error("class P { init(a) {} } P();"), "Expected 1 arguments but got 0.");
    }

    #[test]
    fn test_super_dispatch() {
        let source = r#"
            class A {
                m() { return "A.m on " + this.name; }
            }
            class B < A {
                m() { return "B.m then " + super.m(); }
            }
            class C < B {}
            var c = C();
            c.name = "c";
            print c.m();
        "#;

        assert_eq!(output(source), "B.m then A.m on c\n");
    }

    #[test]
    fn test_fields_shadow_members() {
        let source = r#"
            class A {
                m() { return "method"; }
                g { return "getter"; }
            }
            var a = A();
            print a.m();
            print a.g;
            a.m = "field";
            a.g = "field";
            print a.m;
            print a.g;
        "#;

        assert_eq!(output(source), "method\ngetter\nfield\nfield\n");
    }

    #[test]
    fn test_static_members() {
        let source = r#"
            class Math {
                class square(n) { return n * n; }
                class name { return "Math"; }
                class describe() { return this.name; }
            }
            class Extended < Math {
                class cube(n) { return n * super.square(n); }
            }
            print Math.square(3);
            print Math.name;
            print Math.describe();
            print Extended.cube(2);
        "#;

        assert_eq!(output(source), "9\nMath\nMath\n8\n");
        assert_eq!(runtime_error("class A { class s() {} } A().s();"), "Undefined property 's'.");
    }

    #[test]
    fn test_bound_method_keeps_receiver() {
        let source = r#"
            class Greeter {
                init(name) { this.name = name; }
                greet() { return "hi " + this.name; }
            }
            var greet = Greeter("bob").greet;
            print greet();
        "#;

        assert_eq!(output(source), "hi bob\n");
    }

    #[test]
    fn test_recursion() {
        assert_eq!(output("fun fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } print fib(10);"), "55\n");
    }

    #[test]
    fn test_deep_recursion() {
        assert_eq!(output("fun count(n) { if (n == 0) return 0; return 1 + count(n - 1); } print count(900);"), "900\n");
    }

    #[test]
    fn test_stack_overflow() {
        assert_eq!(runtime_error("fun f(n) { return f(n + 1); } f(0);"), "Stack overflow.");
        assert_eq!(runtime_error("class A { x { return this.x; } } A().x;"), "Stack overflow.");

        let output = CaptureOutput::new();
        let mut interpreter = Interpreter::default().with_output(Box::new(output.clone()));
        let errs = interpreter.run(&parse("fun f() { f(); } f();"));
        assert_eq!(errs.len(), 1);
        assert_eq!(interpreter.depth, 0);

        let errs = interpreter.run(&parse("fun g(n) { if (n > 0) return g(n - 1); return \"done\"; } print g(500);"));
        assert!(errs.is_empty(), "no errors, got {:?}", errs);
        assert_eq!(output.to_string(), "done\n");
    }

    #[test]
    fn test_lambda_in_own_initializer() {
        assert_eq!(runtime_error("{ var f = (fun () { return f; })(); print f; }"), "Undefined variable 'f'.");
        assert_eq!(runtime_error("var f = (fun () { return f; })();"), "Undefined variable 'f'.");
    }

    #[test]
    fn test_abort_program_policy() {
        let (output, errs) = run_with("print 1; print nil + 1; print 2;", ErrorPolicy::AbortProgram);
        assert_eq!(output, "1\n");
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_abort_statement_policy() {
        let (output, errs) = run_with("print 1; print nil + 1; print 2; 1 / 0; print 3;", ErrorPolicy::AbortStatement);
        assert_eq!(output, "1\n2\n3\n");
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let (output, errs) = run("print 1; var a = a;");
        assert_eq!(output, "");
        assert_eq!(errs.len(), 1);
        assert!(!errs[0].is_runtime());
    }

    #[test]
    fn test_errors_are_reported() {
        let reports = CaptureReports::new();
        let mut interpreter = Interpreter::default()
            .with_output(Box::new(CaptureOutput::new()))
            .with_reporter(Box::new(reports.clone()));

        interpreter.run(&parse("{ var unused = 1; } 1 / 0;"));

        assert_eq!(reports.warnings().len(), 1);
        assert_eq!(reports.errors().len(), 1);
        assert_eq!(reports.errors()[0].message(), "Division by zero.");
    }

    #[test]
    fn test_interactive_session() {
        let output = CaptureOutput::new();
        let mut interpreter = Interpreter::default()
            .with_output(Box::new(output.clone()))
            .with_reporter(Box::new(CaptureReports::new()));

        for line in ["var a = 1;", "var a = a + 1;", "print a;", "print b;", "print a * 10;"] {
            let stmts = parse(line);
            assert!(interpreter.resolve(&stmts).is_empty(), "no static errors for {}", line);
            for stmt in stmts.iter() {
                let _ = interpreter.execute_one(stmt);
            }
        }

        let expr = Parser::parse_expr(&mut Scanner::new("a / 0").filter_map(|t| t.ok())).expect("no errors");
        assert!(interpreter.resolve_expr(&expr).is_empty());
        assert_eq!(interpreter.evaluate_one(&expr).expect_err("an error").message(), "Division by zero.");

        assert_eq!(output.to_string(), "2\n20\n");
    }

    #[test]
    fn test_native_functions() {
        let output = CaptureOutput::new();
        let mut interpreter = Interpreter::default()
            .with_output(Box::new(output.clone()))
            .with_native("double", 1, |_, args| match &args[0] {
                Value::Number(n) => Ok(Value::Number(n * 2.0)),
                _ => Ok(Value::Nil),
            });

        interpreter.define_native("answer", 0, |_, _| Ok(Value::Number(42.0)));

        let errs = interpreter.run(&parse("print double(answer()); print clock() > 0;"));
        assert!(errs.is_empty(), "no errors, got {:?}", errs);
        assert_eq!(output.to_string(), "84\ntrue\n");
    }

    #[test]
    fn test_loops_reclaim_scopes() {
        let mut interpreter = Interpreter::default().with_output(Box::new(CaptureOutput::new()));
        let errs = interpreter.run(&parse("for (var i = 0; i < 100; i = i + 1) { var j = i; { var k = j; } }"));

        assert!(errs.is_empty(), "no errors, got {:?}", errs);
        assert_eq!(interpreter.env.len(), 1, "only the global scope remains");
    }
}
