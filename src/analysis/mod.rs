use fnv::FnvHashMap;

use crate::{ast::{Expr, ExprId, ExprVisitor, Stmt, StmtVisitor}, LoxError};

mod resolver;

pub use resolver::Resolver;

/// The scope distance of every variable reference which resolved to a local scope.
///
/// References which are absent from the table are looked up in the global scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(FnvHashMap<ExprId, usize>);

impl Bindings {
    pub fn get(&self, id: ExprId) -> Option<usize> {
        self.0.get(&id).copied()
    }

    pub fn insert(&mut self, id: ExprId, hops: usize) {
        self.0.insert(id, hops);
    }

    pub fn extend(&mut self, other: Bindings) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The outcome of statically analysing a program.
#[derive(Debug, Default)]
pub struct Resolution {
    pub bindings: Bindings,
    pub errors: Vec<LoxError>,
    pub warnings: Vec<LoxError>,
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn resolve(stmts: &[Stmt]) -> Resolution {
    resolve_with_globals(stmts, std::iter::empty())
}

/// Resolves a program against a set of globals which are already defined, so that
/// initializers may refer to them.
#[tracing::instrument(level = "debug", skip_all, fields(count = stmts.len()))]
pub fn resolve_with_globals<I: IntoIterator<Item = String>>(stmts: &[Stmt], globals: I) -> Resolution {
    let mut resolver = Resolver::default().with_globals(globals);
    for stmt in stmts {
        resolver.visit_stmt(stmt);
    }

    let resolution = resolver.finish();
    tracing::debug!(bindings = resolution.bindings.len(), errors = resolution.errors.len(), "resolution complete");
    resolution
}

pub fn resolve_expr(expr: &Expr) -> Resolution {
    let mut resolver = Resolver::default();
    resolver.visit_expr(expr);
    resolver.finish()
}
