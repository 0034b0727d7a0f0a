use std::rc::Rc;

use fnv::FnvHashMap;

use crate::{ast::{ClassDecl, Expr, ExprId, ExprVisitor, FunDecl, Literal, Stmt, StmtVisitor}, errors, lexer::Token, LoxError};

use super::{Bindings, Resolution};

#[derive(Debug, PartialEq, Copy, Clone)]
enum VarState {
    Declared,
    Defined,
    Used,
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum ClassType {
    None,
    Class,
    Subclass,
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug)]
struct Binding {
    state: VarState,
    token: Token,
    report_unused: bool,
}

#[derive(Debug, Default)]
struct Frame {
    names: FnvHashMap<String, Binding>,
    /// Whether this frame holds the parameters of a function, which means that any reads which
    /// resolve beyond it are deferred until the function is called.
    function: bool,
}

/// Walks a program once, before it is executed, computing the scope distance of every local
/// variable reference and rejecting programs which misuse scopes or control flow.
#[derive(Debug)]
pub struct Resolver {
    scopes: Vec<Frame>,
    globals: FnvHashMap<String, VarState>,
    current_class: ClassType,
    current_function: FunctionType,
    loop_depth: usize,
    bindings: Bindings,
    errors: Vec<LoxError>,
    warnings: Vec<LoxError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            globals: FnvHashMap::default(),
            current_class: ClassType::None,
            current_function: FunctionType::None,
            loop_depth: 0,
            bindings: Bindings::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl Resolver {
    /// Seeds the resolver with globals which already exist at runtime, such as native functions
    /// or variables defined by earlier interactive inputs.
    pub fn with_globals<I: IntoIterator<Item = String>>(self, globals: I) -> Self {
        let mut resolver = self;
        resolver.globals.extend(globals.into_iter().map(|name| (name, VarState::Defined)));
        resolver
    }

    pub fn finish(self) -> Resolution {
        Resolution {
            bindings: self.bindings,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn error<M: Into<String>, A: Into<String>>(&mut self, token: &Token, message: M, advice: A) {
        self.errors.push(errors::language(token.location(), message, advice));
    }

    fn begin_scope(&mut self, function: bool) {
        self.scopes.push(Frame { names: FnvHashMap::default(), function });
    }

    fn end_scope(&mut self) {
        if let Some(frame) = self.scopes.pop() {
            let mut unused = frame.names.into_values()
                .filter(|b| b.report_unused && b.state != VarState::Used)
                .map(|b| b.token)
                .collect::<Vec<_>>();
            unused.sort_by_key(|t| (t.line(), t.column()));

            for token in unused {
                self.warnings.push(errors::language(
                    token.location(),
                    format!("Local variable '{}' is never used.", token.lexeme()),
                    "Remove the declaration, or prefix it with an underscore if it is intentionally unused.",
                ));
            }
        }
    }

    fn insert_keyword(&mut self, keyword: &str, token: &Token) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.names.insert(keyword.to_string(), Binding {
                state: VarState::Used,
                token: token.clone(),
                report_unused: false,
            });
        }
    }

    fn declare(&mut self, name: &Token, report_unused: bool) {
        let Some(frame) = self.scopes.last_mut() else {
            self.globals.entry(name.lexeme().to_string()).or_insert(VarState::Declared);
            return;
        };

        if frame.names.contains_key(name.lexeme()) {
            self.error(
                name,
                format!("Already a variable named '{}' in this scope.", name.lexeme()),
                "Remove the `var` keyword to assign a new value to this variable, or rename it if you intended to maintain a separate instance.",
            );
            return;
        }

        frame.names.insert(name.lexeme().to_string(), Binding {
            state: VarState::Declared,
            token: name.clone(),
            report_unused: report_unused && !name.lexeme().starts_with('_'),
        });
    }

    fn define(&mut self, name: &Token) {
        match self.scopes.last_mut() {
            Some(frame) => {
                if let Some(binding) = frame.names.get_mut(name.lexeme()) {
                    if binding.state == VarState::Declared {
                        binding.state = VarState::Defined;
                    }
                }
            },
            None => {
                self.globals.insert(name.lexeme().to_string(), VarState::Defined);
            }
        }
    }

    /// Records the distance to the nearest scope which defines `name`. Scopes in which the name
    /// is still being initialized are skipped, unless the reference is inside a function body.
    fn resolve_local(&mut self, id: ExprId, name: &Token, read: bool) {
        let mut initializing = false;
        let mut deferred = false;

        for (hops, frame) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(binding) = frame.names.get_mut(name.lexeme()) {
                if binding.state == VarState::Declared && !deferred {
                    initializing = true;
                } else {
                    if read {
                        binding.state = VarState::Used;
                    }

                    self.bindings.insert(id, hops);
                    return;
                }
            }

            deferred |= frame.function;
        }

        if !deferred && self.globals.get(name.lexeme()) == Some(&VarState::Declared) {
            initializing = true;
        } else if self.globals.get(name.lexeme()).is_some() {
            initializing = false;
        }

        if initializing {
            self.error(
                name,
                format!("Can't read local variable '{}' in its own initializer.", name.lexeme()),
                "Make sure you are not masking a variable with the same name and try using a different name for this variable if you are.",
            );
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], ty: FunctionType) {
        let enclosing_function = self.current_function;
        let enclosing_loops = self.loop_depth;
        self.current_function = ty;
        self.loop_depth = 0;

        self.begin_scope(true);
        for param in params {
            self.declare(param, false);
            self.define(param);
        }

        for stmt in body {
            self.visit_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing_function;
        self.loop_depth = enclosing_loops;
    }

    fn resolve_method(&mut self, method: &FunDecl, ty: FunctionType) {
        self.resolve_function(&method.params, &method.body, ty);
    }
}

impl ExprVisitor<()> for Resolver {
    fn visit_assign(&mut self, id: ExprId, ident: &Token, value: &Expr) {
        self.visit_expr(value);
        self.resolve_local(id, ident, false);
    }

    fn visit_binary(&mut self, left: &Expr, _op: &Token, right: &Expr) {
        self.visit_expr(left);
        self.visit_expr(right);
    }

    fn visit_call(&mut self, callee: &Expr, _paren: &Token, args: &[Expr]) {
        self.visit_expr(callee);
        for arg in args {
            self.visit_expr(arg);
        }
    }

    fn visit_get(&mut self, obj: &Expr, _property: &Token) {
        self.visit_expr(obj);
    }

    fn visit_fun_expr(&mut self, _keyword: &Token, params: &[Token], body: &Rc<[Stmt]>) {
        self.resolve_function(params, body, FunctionType::Function);
    }

    fn visit_grouping(&mut self, expr: &Expr) {
        self.visit_expr(expr);
    }

    fn visit_literal(&mut self, _value: &Literal) {}

    fn visit_logical(&mut self, left: &Expr, _op: &Token, right: &Expr) {
        self.visit_expr(left);
        self.visit_expr(right);
    }

    fn visit_set(&mut self, obj: &Expr, _property: &Token, value: &Expr) {
        self.visit_expr(value);
        self.visit_expr(obj);
    }

    fn visit_super(&mut self, id: ExprId, keyword: &Token, _method: &Token) {
        match self.current_class {
            ClassType::None => self.error(
                keyword,
                "Can't use 'super' outside of a class.",
                "Make sure you are inside a class method, and that you are using 'super' in the correct context.",
            ),
            ClassType::Class => self.error(
                keyword,
                "Can't use 'super' in a class with no superclass.",
                "Declare a superclass using `class Name < Superclass` before using 'super'.",
            ),
            ClassType::Subclass => self.resolve_local(id, keyword, true),
        }
    }

    fn visit_ternary(&mut self, cond: &Expr, _op: &Token, then_branch: &Expr, else_branch: &Expr) {
        self.visit_expr(cond);
        self.visit_expr(then_branch);
        self.visit_expr(else_branch);
    }

    fn visit_this(&mut self, id: ExprId, keyword: &Token) {
        if self.current_class == ClassType::None {
            self.error(
                keyword,
                "Can't use 'this' outside of a class.",
                "You can only access `this` within a class method.",
            );
            return;
        }

        self.resolve_local(id, keyword, true);
    }

    fn visit_unary(&mut self, _op: &Token, expr: &Expr) {
        self.visit_expr(expr);
    }

    fn visit_var_ref(&mut self, id: ExprId, name: &Token) {
        self.resolve_local(id, name, true);
    }
}

impl StmtVisitor<()> for Resolver {
    fn visit_block(&mut self, stmts: &[Stmt]) {
        self.begin_scope(false);
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
        self.end_scope();
    }

    fn visit_break(&mut self, keyword: &Token) {
        if self.loop_depth == 0 {
            self.error(
                keyword,
                "Can't use 'break' outside of a loop.",
                "You can only use the `break` keyword within the body of a `while` or `for` loop.",
            );
        }
    }

    fn visit_class(&mut self, class: &ClassDecl) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(&class.name, true);
        self.define(&class.name);

        if let Some(superclass) = &class.superclass {
            if let Expr::Var(_, name) = superclass {
                if name.lexeme() == class.name.lexeme() {
                    self.error(
                        name,
                        "A class can't inherit from itself.",
                        "Remove the superclass from this declaration or choose a different class to inherit from.",
                    );
                }
            }

            self.current_class = ClassType::Subclass;
            self.visit_expr(superclass);

            self.begin_scope(false);
            self.insert_keyword("super", &class.name);
        }

        self.begin_scope(false);
        self.insert_keyword("this", &class.name);

        for (idx, member) in class.members().enumerate() {
            let ty = if idx < class.methods.len() && member.name.lexeme() == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_method(member, ty);
        }

        self.end_scope();
        if class.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn visit_expr_stmt(&mut self, expr: &Expr) {
        self.visit_expr(expr);
    }

    fn visit_fun_def(&mut self, fun: &FunDecl) {
        self.declare(&fun.name, true);
        self.define(&fun.name);

        self.resolve_function(&fun.params, &fun.body, FunctionType::Function);
    }

    fn visit_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        self.visit_expr(cond);
        self.visit_stmt(then_branch);
        if let Some(else_branch) = else_branch {
            self.visit_stmt(else_branch);
        }
    }

    fn visit_print(&mut self, expr: &Expr) {
        self.visit_expr(expr);
    }

    fn visit_return(&mut self, keyword: &Token, expr: Option<&Expr>) {
        if self.current_function == FunctionType::None {
            self.error(
                keyword,
                "Can't return from top-level code.",
                "You can only use the `return` keyword within a function.",
            );
        }

        if let Some(expr) = expr {
            if self.current_function == FunctionType::Initializer {
                self.error(
                    keyword,
                    "Can't return a value from an initializer.",
                    "Initializers always return the new instance, use a bare `return;` to exit early.",
                );
            }

            self.visit_expr(expr);
        }
    }

    fn visit_var_def(&mut self, name: &Token, init: Option<&Expr>) {
        self.declare(name, true);
        if let Some(init) = init {
            self.visit_expr(init);
        }
        self.define(name);
    }

    fn visit_while(&mut self, cond: &Expr, body: &Stmt) {
        self.visit_expr(cond);

        self.loop_depth += 1;
        self.visit_stmt(body);
        self.loop_depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{analysis::{resolve, Resolution}, ast::{Expr, Parser, Stmt}, lexer::Scanner};

    fn analyze(source: &str) -> (Vec<Stmt>, Resolution) {
        let (tree, errs) = Parser::parse(&mut Scanner::new(source).filter_map(|t| t.ok()));
        assert!(errs.is_empty(), "no parsing errors, got {:?}", errs);

        let resolution = resolve(&tree);
        (tree, resolution)
    }

    fn error_messages(source: &str) -> Vec<String> {
        analyze(source).1.errors.iter().map(|e| e.message().to_string()).collect()
    }

    #[test]
    fn duplicate_local_variables() {
        let (_, resolution) = analyze(
            r#"
            {
                var a = 1;
                var a = 2;
            }
            "#
        );

        assert_eq!(resolution.errors.len(), 1, "expected 1 error");
        assert_eq!(resolution.errors[0].message(), "Already a variable named 'a' in this scope.");
        assert_eq!(resolution.errors[0].line(), Some(4));
    }

    #[test]
    fn duplicate_globals_are_allowed() {
        assert!(error_messages("var a = 1; var a = 2;").is_empty());
    }

    #[test]
    fn duplicate_parameters() {
        assert_eq!(error_messages("fun f(a, a) {}"), vec!["Already a variable named 'a' in this scope."]);
    }

    #[test]
    fn reads_own_initializer() {
        assert_eq!(error_messages("{ var a = a; }"), vec!["Can't read local variable 'a' in its own initializer."]);
        assert_eq!(error_messages("var b = b + 1;"), vec!["Can't read local variable 'b' in its own initializer."]);
        assert_eq!(error_messages("fun f() { var c = 1 + c; }"), vec!["Can't read local variable 'c' in its own initializer."]);
    }

    #[test]
    fn initializer_reads_outer_binding() {
        let (tree, resolution) = analyze("{ var a = 1; { var a = a + 1; } }");
        assert!(resolution.is_ok(), "got {:?}", resolution.errors);

        // The inner initializer's `a` resolves to the outer block, one scope away.
        let Stmt::Block(outer) = &tree[0] else { panic!("expected a block") };
        let Stmt::Block(inner) = &outer[1] else { panic!("expected a block") };
        let Stmt::Var(_, Some(Expr::Binary(left, _, _))) = &inner[0] else { panic!("expected a var with an initializer") };
        let Expr::Var(id, _) = left.as_ref() else { panic!("expected a variable reference") };

        assert_eq!(resolution.bindings.get(*id), Some(1));
    }

    #[test]
    fn initializer_reads_global_binding() {
        let (tree, resolution) = analyze("var a = 1; { var a = a + 1; }");
        assert!(resolution.is_ok(), "got {:?}", resolution.errors);

        let Stmt::Block(block) = &tree[1] else { panic!("expected a block") };
        let Stmt::Var(_, Some(Expr::Binary(left, _, _))) = &block[0] else { panic!("expected a var with an initializer") };
        let Expr::Var(id, _) = left.as_ref() else { panic!("expected a variable reference") };

        assert_eq!(resolution.bindings.get(*id), None, "globals are resolved dynamically");
    }

    #[test]
    fn recursive_lambda_is_deferred() {
        assert!(error_messages("{ var f = fun (n) { if (n > 0) f(n - 1); }; f(3); }").is_empty());
    }

    #[test]
    fn hop_counts_follow_scopes() {
        let (tree, resolution) = analyze("{ var a = 1; fun f(b) { { print a + b; } } f(1); }");
        assert!(resolution.is_ok());

        let Stmt::Block(outer) = &tree[0] else { panic!("expected a block") };
        let Stmt::Fun(fun) = &outer[1] else { panic!("expected a function") };
        let Stmt::Block(inner) = &fun.body[0] else { panic!("expected a block") };
        let Stmt::Print(Expr::Binary(a, _, b)) = &inner[0] else { panic!("expected a print") };
        let (Expr::Var(a, _), Expr::Var(b, _)) = (a.as_ref(), b.as_ref()) else { panic!("expected variables") };

        assert_eq!(resolution.bindings.get(*a), Some(2));
        assert_eq!(resolution.bindings.get(*b), Some(1));
    }

    #[test]
    fn this_outside_class_method() {
        assert_eq!(error_messages("var a = 1;\nthis.a = 2;"), vec!["Can't use 'this' outside of a class."]);
    }

    #[test]
    fn return_value_inside_initializer() {
        let (_, resolution) = analyze(
            r#"
            class A {
                init() {
                    return 1;
                }
            }
            "#
        );

        assert_eq!(resolution.errors.len(), 1, "expected 1 error");
        assert_eq!(resolution.errors[0].message(), "Can't return a value from an initializer.");
        assert_eq!(resolution.errors[0].line(), Some(4));
    }

    #[test]
    fn bare_return_inside_initializer() {
        assert!(error_messages("class A { init() { return; } }").is_empty());
    }

    #[test]
    fn return_outside_function() {
        assert_eq!(error_messages("return 1;"), vec!["Can't return from top-level code."]);
    }

    #[test]
    fn break_outside_loop() {
        assert_eq!(error_messages("break;"), vec!["Can't use 'break' outside of a loop."]);
        assert_eq!(error_messages("while (true) { fun f() { break; } }"), vec!["Can't use 'break' outside of a loop."]);
        assert!(error_messages("while (true) { if (true) { break; } }").is_empty());
    }

    #[test]
    fn super_outside_class_method() {
        assert_eq!(error_messages("super.a();"), vec!["Can't use 'super' outside of a class."]);
    }

    #[test]
    fn super_in_root_class() {
        assert_eq!(error_messages("class A { init() { super.a(); } }"), vec!["Can't use 'super' in a class with no superclass."]);
    }

    #[test]
    fn class_inherits_from_itself() {
        assert_eq!(error_messages("class A < A {}"), vec!["A class can't inherit from itself."]);
    }

    #[test]
    fn unused_locals_are_warnings() {
        let (_, resolution) = analyze("fun f(unused) { var a = 1; var _b = 2; var c = 3; print c; } f(1);");

        assert!(resolution.is_ok());
        let warnings = resolution.warnings.iter().map(|w| w.message().to_string()).collect::<Vec<_>>();
        assert_eq!(warnings, vec!["Local variable 'a' is never used."]);
    }
}
