mod expr;
pub mod printer;
mod parser;
mod stmt;
mod value;

pub use expr::{Expr, ExprId, ExprVisitor};
pub use parser::Parser;
pub use stmt::{ClassDecl, FunDecl, Stmt, StmtVisitor};
pub use value::Literal;
