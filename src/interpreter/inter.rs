use std::io::Write;

use crate::{analysis::{self, Bindings, Resolution, Resolver}, ast::{Expr, ExprId, ExprVisitor, Stmt, StmtVisitor}, core::{LogReporter, Reporter}, errors, lexer::Token, LoxError};

use super::{env::{Environment, ScopeId}, Flow, Fun, Value};

/// Determines how much of a program is abandoned when a runtime error is raised.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop executing the program at the first runtime error.
    #[default]
    AbortProgram,
    /// Skip the top-level statement which raised the error and continue with the next one.
    AbortStatement,
}

pub struct Interpreter {
    pub(super) env: Environment,
    pub(super) scope: ScopeId,
    pub(super) bindings: Bindings,
    pub(super) output: Box<dyn Write>,
    pub(super) depth: usize,
    reporter: Box<dyn Reporter>,
    policy: ErrorPolicy,
}

impl Interpreter {
    pub fn with_output(self, output: Box<dyn Write>) -> Self {
        Self {
            output,
            ..self
        }
    }

    pub fn with_reporter(self, reporter: Box<dyn Reporter>) -> Self {
        Self {
            reporter,
            ..self
        }
    }

    pub fn with_error_policy(self, policy: ErrorPolicy) -> Self {
        Self {
            policy,
            ..self
        }
    }

    pub fn with_native<T: Fn(&mut Interpreter, Vec<Value>) -> Result<Value, LoxError> + 'static, S: Into<String>>(mut self, name: S, arity: usize, fun: T) -> Self {
        self.define_native(name, arity, fun);
        self
    }

    /// Registers a host function in the global scope.
    pub fn define_native<T: Fn(&mut Interpreter, Vec<Value>) -> Result<Value, LoxError> + 'static, S: Into<String>>(&mut self, name: S, arity: usize, fun: T) {
        let name = name.into();
        let globals = self.env.globals();
        self.env.define(globals, name.clone(), Value::Function(Fun::native(name, arity, fun)));
    }

    /// Statically analyses a program, recording its variable bindings for later execution. The
    /// returned errors indicate that the program must not be executed.
    #[tracing::instrument(level = "debug", skip_all, fields(count = stmts.len()))]
    pub fn resolve(&mut self, stmts: &[Stmt]) -> Vec<LoxError> {
        let resolution = analysis::resolve_with_globals(stmts, self.global_names());
        self.absorb(resolution)
    }

    pub fn resolve_expr(&mut self, expr: &Expr) -> Vec<LoxError> {
        let mut resolver = Resolver::default().with_globals(self.global_names());
        resolver.visit_expr(expr);
        self.absorb(resolver.finish())
    }

    /// Executes a resolved program, reporting any runtime errors rather than returning early.
    #[tracing::instrument(level = "debug", skip_all, fields(count = stmts.len()))]
    pub fn interpret(&mut self, stmts: &[Stmt]) -> Vec<LoxError> {
        let mut errs = Vec::new();
        for stmt in stmts {
            if let Err(err) = self.execute_one(stmt) {
                self.reporter.error(&err);
                errs.push(err);

                if self.policy == ErrorPolicy::AbortProgram {
                    tracing::debug!("aborting the program after a runtime error");
                    break;
                }
            }
        }

        errs
    }

    /// Resolves and then, if there were no static errors, executes a program.
    pub fn run(&mut self, stmts: &[Stmt]) -> Vec<LoxError> {
        let errs = self.resolve(stmts);
        if !errs.is_empty() {
            return errs;
        }

        self.interpret(stmts)
    }

    pub fn execute_one(&mut self, stmt: &Stmt) -> Result<(), LoxError> {
        self.visit_stmt(stmt).map(|_| ())
    }

    pub fn evaluate_one(&mut self, expr: &Expr) -> Result<Value, LoxError> {
        self.visit_expr(expr)
    }

    fn global_names(&self) -> Vec<String> {
        self.env.names(self.env.globals())
    }

    fn absorb(&mut self, resolution: Resolution) -> Vec<LoxError> {
        for warning in resolution.warnings.iter() {
            self.reporter.warning(warning);
        }

        for error in resolution.errors.iter() {
            self.reporter.error(error);
        }

        self.bindings.extend(resolution.bindings);
        resolution.errors
    }

    pub(super) fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value, LoxError> {
        match self.bindings.get(id) {
            Some(hops) => self.env.get_at(self.scope, hops, name),
            None => self.env.get(self.env.globals(), name),
        }
    }

    pub(super) fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> Result<(), LoxError> {
        match self.bindings.get(id) {
            Some(hops) => self.env.assign_at(self.scope, hops, name, value),
            None => {
                let globals = self.env.globals();
                self.env.assign(globals, name, value)
            }
        }
    }

    /// Runs a sequence of statements within `scope`, restoring the current scope afterwards
    /// regardless of how the statements exit.
    pub(super) fn execute_block(&mut self, stmts: &[Stmt], scope: ScopeId) -> Result<Flow, LoxError> {
        let previous = std::mem::replace(&mut self.scope, scope);

        let mut result = Ok(Flow::Normal);
        for stmt in stmts {
            match self.visit_stmt(stmt) {
                Ok(Flow::Normal) => {},
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.scope = previous;
        result
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        let env = Environment::new();
        let scope = env.globals();

        let interpreter = Self {
            env,
            scope,
            bindings: Bindings::default(),
            output: Box::new(std::io::stdout()),
            depth: 0,
            reporter: Box::new(LogReporter),
            policy: ErrorPolicy::default(),
        };

        interpreter.with_native("clock", 0, |_, _| {
            let offset = std::time::SystemTime::now().duration_since(std::time::SystemTime::UNIX_EPOCH)
                .map_err(|_| errors::runtime(
                    &Token::native("clock"),
                    "Failed to get current system time because the system time is currently set to a time earlier than 1970-01-01T00:00:00Z.",
                    "Make sure that you have set your system clock correctly."))?;

            Ok(Value::Number(offset.as_secs_f64()))
        })
    }
}
