mod core;
pub mod ast;
pub mod analysis;
pub mod lexer;
pub mod interpreter;

pub use crate::core::errors::{self, LoxError};
pub use crate::core::{CaptureOutput, CaptureReports, LogReporter, Reporter, SourceLocation};
