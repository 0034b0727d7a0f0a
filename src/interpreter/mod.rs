mod class;
mod env;
mod fun;
mod inter;
mod value;
mod visitor;

pub use class::{Class, Instance, MemberKind};
pub use env::{Environment, ScopeId};
pub use fun::{Callable, Closure, Fun, NativeFun};
pub use inter::{ErrorPolicy, Interpreter};
pub use value::Value;
pub use visitor::Flow;
