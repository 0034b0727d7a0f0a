use std::{fmt::{Debug, Display}, rc::Rc};

use crate::{ast::Stmt, errors, lexer::Token, LoxError};

use super::{env::ScopeId, Flow, Interpreter, Value};

/// A value which may be invoked with a fixed number of arguments.
pub trait Callable {
    fn arity(&self) -> usize;

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError>;
}

#[derive(Clone)]
pub enum Fun {
    Native(Rc<NativeFun>),
    Initializer(Rc<Closure>),
    Closure(Rc<Closure>),
}

impl Fun {
    pub fn native<T: Fn(&mut Interpreter, Vec<Value>) -> Result<Value, LoxError> + 'static, S: Into<String>>(name: S, arity: usize, fun: T) -> Self {
        Fun::Native(Rc::new(NativeFun::new(name, arity, fun)))
    }

    pub fn initializer(name: &Token, params: &[Token], body: Rc<[Stmt]>, closure: ScopeId) -> Self {
        Fun::Initializer(Rc::new(Closure::new(Some(name.lexeme().to_string()), params, body, closure)))
    }

    pub fn closure(name: &Token, params: &[Token], body: Rc<[Stmt]>, closure: ScopeId) -> Self {
        Fun::Closure(Rc::new(Closure::new(Some(name.lexeme().to_string()), params, body, closure)))
    }

    pub fn lambda(params: &[Token], body: Rc<[Stmt]>, closure: ScopeId) -> Self {
        Fun::Closure(Rc::new(Closure::new(None, params, body, closure)))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Fun::Native(fun) => Some(fun.name()),
            Fun::Initializer(closure) | Fun::Closure(closure) => closure.name(),
        }
    }

    /// Produces a copy of this function in which `this` refers to the given receiver.
    pub fn bind(&self, this: Value) -> Self {
        match self {
            Fun::Native(fun) => Fun::Native(fun.clone()),
            Fun::Initializer(closure) => Fun::Initializer(Rc::new(closure.bind(this))),
            Fun::Closure(closure) => Fun::Closure(Rc::new(closure.bind(this))),
        }
    }
}

impl Callable for Fun {
    fn arity(&self) -> usize {
        match self {
            Fun::Native(fun) => fun.arity(),
            Fun::Initializer(closure) | Fun::Closure(closure) => closure.arity(),
        }
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
        match self {
            Fun::Native(fun) => fun.call(interpreter, args),
            Fun::Initializer(closure) => {
                let this = closure.this.clone().ok_or_else(|| errors::system(
                    "Failed to resolve `this` within the initializer function.",
                    "This is a bug in the interpreter, please report it with example code."
                ))?;

                closure.call(interpreter, args).map(|_| this)
            },
            Fun::Closure(closure) => closure.call(interpreter, args),
        }
    }
}

impl Display for Fun {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Fun::Native(fun) => write!(f, "<native fn {}>", fun.name()),
            Fun::Initializer(closure) | Fun::Closure(closure) => match closure.name() {
                Some(name) => write!(f, "<fn {}>", name),
                None => write!(f, "<lambda>"),
            },
        }
    }
}

impl Debug for Fun {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl PartialEq for Fun {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Fun::Native(fun1), Fun::Native(fun2)) => Rc::ptr_eq(fun1, fun2),
            (Fun::Initializer(closure1), Fun::Initializer(closure2)) => Rc::ptr_eq(closure1, closure2),
            (Fun::Closure(closure1), Fun::Closure(closure2)) => Rc::ptr_eq(closure1, closure2),
            _ => false,
        }
    }
}

pub struct NativeFun {
    name: String,
    arity: usize,
    #[allow(clippy::type_complexity)]
    fun: Box<dyn Fn(&mut Interpreter, Vec<Value>) -> Result<Value, LoxError>>,
}

impl NativeFun {
    pub fn new<T: Fn(&mut Interpreter, Vec<Value>) -> Result<Value, LoxError> + 'static, S: Into<String>>(name: S, arity: usize, fun: T) -> Self {
        Self { name: name.into(), arity, fun: Box::new(fun) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
        (self.fun)(interpreter, args)
    }
}

/// A function declared in source code, together with the scope it was declared in.
///
/// Methods are bound by recording their receiver; the scope holding `this` is only created
/// once the method is actually called.
pub struct Closure {
    name: Option<String>,
    params: Vec<Token>,
    body: Rc<[Stmt]>,
    closure: ScopeId,
    this: Option<Value>,
}

impl Closure {
    fn new(name: Option<String>, params: &[Token], body: Rc<[Stmt]>, closure: ScopeId) -> Self {
        Self { name, params: params.into(), body, closure, this: None }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    fn bind(&self, this: Value) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            closure: self.closure,
            this: Some(this),
        }
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
        let receiver = self.this.as_ref().map(|this| {
            let scope = interpreter.env.child(self.closure);
            interpreter.env.define(scope, "this", this.clone());
            scope
        });

        let scope = interpreter.env.child(receiver.unwrap_or(self.closure));
        for (param, value) in self.params.iter().zip(args) {
            interpreter.env.define(scope, param.lexeme(), value);
        }

        let result = interpreter.execute_block(&self.body, scope);

        interpreter.env.release(scope);
        if let Some(receiver) = receiver {
            interpreter.env.release(receiver);
        }

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break => Ok(Value::Nil),
        }
    }
}
