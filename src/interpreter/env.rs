use fnv::FnvHashMap;

use crate::{errors, lexer::Token, LoxError};

use super::Value;

/// A handle to a single scope within an [`Environment`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Scope {
    /// Declared names, where `None` marks a variable which has been declared without an initializer.
    values: FnvHashMap<String, Option<Value>>,
    parent: Option<ScopeId>,
    /// Captured by a closure, and therefore never reclaimed.
    pinned: bool,
}

/// The runtime scope chain of a program, stored as an arena of scopes addressed by [`ScopeId`].
///
/// Closures may capture a scope which is reachable from a value stored within that same scope,
/// so scopes refer to their parents by handle rather than by ownership.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    free: Vec<ScopeId>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            scopes: vec![Scope { pinned: true, ..Default::default() }],
            free: Vec::new(),
        }
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn globals(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Opens a new scope nested within `parent`.
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let scope = Scope { parent: Some(parent), ..Default::default() };

        match self.free.pop() {
            Some(id) => {
                self.scopes[id.0] = scope;
                id
            },
            None => {
                self.scopes.push(scope);
                ScopeId(self.scopes.len() - 1)
            }
        }
    }

    /// Marks a scope, and every scope enclosing it, as captured.
    pub fn pin(&mut self, scope: ScopeId) {
        let mut current = Some(scope);
        while let Some(id) = current {
            match self.scopes.get_mut(id.0) {
                Some(scope) if !scope.pinned => {
                    scope.pinned = true;
                    current = scope.parent;
                },
                _ => break,
            }
        }
    }

    /// Returns a scope to the arena once the block or call which opened it has exited, unless
    /// a closure has captured it.
    pub fn release(&mut self, scope: ScopeId) {
        if let Some(entry) = self.scopes.get_mut(scope.0) {
            if entry.pinned {
                return;
            }

            *entry = Scope::default();
            self.free.push(scope);
            tracing::trace!(scope = scope.0, "released scope");
        }
    }

    /// The number of scopes which are currently in use.
    pub fn len(&self) -> usize {
        self.scopes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self, scope: ScopeId) -> Vec<String> {
        self.scopes.get(scope.0)
            .map(|s| s.values.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn define<K: Into<String>, V: Into<Option<Value>>>(&mut self, scope: ScopeId, key: K, value: V) {
        if let Some(scope) = self.scopes.get_mut(scope.0) {
            scope.values.insert(key.into(), value.into());
        }
    }

    pub fn get(&self, scope: ScopeId, name: &Token) -> Result<Value, LoxError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id)?;
            if let Some(value) = scope.values.get(name.lexeme()) {
                return Self::initialized(name, value);
            }

            current = scope.parent;
        }

        Err(Self::undefined(name))
    }

    pub fn get_at(&self, scope: ScopeId, hops: usize, name: &Token) -> Result<Value, LoxError> {
        let scope = self.scope(self.ancestor(scope, hops)?)?;
        match scope.values.get(name.lexeme()) {
            Some(value) => Self::initialized(name, value),
            None => Err(Self::undefined(name)),
        }
    }

    pub fn assign(&mut self, scope: ScopeId, name: &Token, value: Value) -> Result<(), LoxError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope_mut(id)?;
            if let Some(slot) = scope.values.get_mut(name.lexeme()) {
                *slot = Some(value);
                return Ok(());
            }

            current = scope.parent;
        }

        Err(Self::undefined(name))
    }

    pub fn assign_at(&mut self, scope: ScopeId, hops: usize, name: &Token, value: Value) -> Result<(), LoxError> {
        let id = self.ancestor(scope, hops)?;
        match self.scope_mut(id)?.values.get_mut(name.lexeme()) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            },
            None => Err(Self::undefined(name)),
        }
    }

    fn ancestor(&self, scope: ScopeId, hops: usize) -> Result<ScopeId, LoxError> {
        let mut current = scope;
        for _ in 0..hops {
            current = self.scope(current)?.parent.ok_or_else(|| errors::system(
                format!("A variable was resolved {} scopes away, but the scope chain is shorter than that.", hops),
                "This is a bug in the interpreter, please report it with example code.",
            ))?;
        }

        Ok(current)
    }

    fn scope(&self, id: ScopeId) -> Result<&Scope, LoxError> {
        self.scopes.get(id.0).ok_or_else(|| Self::missing(id))
    }

    fn scope_mut(&mut self, id: ScopeId) -> Result<&mut Scope, LoxError> {
        self.scopes.get_mut(id.0).ok_or_else(|| Self::missing(id))
    }

    fn initialized(name: &Token, value: &Option<Value>) -> Result<Value, LoxError> {
        value.clone().ok_or_else(|| errors::runtime(
            name,
            format!("Uninitialized variable '{}'.", name.lexeme()),
            format!("Assign a value to '{}' before reading it, or initialize it where it is declared.", name.lexeme()),
        ))
    }

    fn undefined(name: &Token) -> LoxError {
        errors::runtime(
            name,
            format!("Undefined variable '{}'.", name.lexeme()),
            format!("Try defining the variable first using `var {} = ...;`.", name.lexeme()),
        )
    }

    fn missing(id: ScopeId) -> LoxError {
        errors::system(
            format!("Attempted to access scope {} which does not exist.", id.0),
            "This is a bug in the interpreter, please report it with example code.",
        )
    }
}
