use std::{cell::RefCell, rc::Rc};

use super::errors::LoxError;

/// Receives the diagnostics produced while checking and running a program.
pub trait Reporter {
    fn error(&mut self, error: &LoxError);

    /// Non-fatal diagnostics, such as local variables which are never read.
    fn warning(&mut self, _warning: &LoxError) {}
}

/// Forwards diagnostics to the `tracing` subscriber installed by the host, if any.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn error(&mut self, error: &LoxError) {
        tracing::error!(line = ?error.line(), advice = error.advice(), "{}", error);
    }

    fn warning(&mut self, warning: &LoxError) {
        tracing::warn!(line = ?warning.line(), "{}", warning);
    }
}

/// Collects diagnostics in memory; clones share the same collections.
#[derive(Debug, Clone, Default)]
pub struct CaptureReports {
    errors: Rc<RefCell<Vec<LoxError>>>,
    warnings: Rc<RefCell<Vec<LoxError>>>,
}

impl CaptureReports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<LoxError> {
        self.errors.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<LoxError> {
        self.warnings.borrow().clone()
    }
}

impl Reporter for CaptureReports {
    fn error(&mut self, error: &LoxError) {
        self.errors.borrow_mut().push(error.clone());
    }

    fn warning(&mut self, warning: &LoxError) {
        self.warnings.borrow_mut().push(warning.clone());
    }
}
