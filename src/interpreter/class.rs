use std::{cell::RefCell, fmt::{Debug, Display}, rc::Rc};

use fnv::FnvHashMap;

use crate::LoxError;

use super::{Callable, Fun, Interpreter, Value};

/// The table a class member is stored in, determined by how it was declared.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Getter,
    Static,
    StaticGetter,
}

pub struct Class {
    name: String,
    superclass: Option<Rc<Class>>,
    methods: FnvHashMap<String, Fun>,
    getters: FnvHashMap<String, Fun>,
    statics: FnvHashMap<String, Fun>,
    static_getters: FnvHashMap<String, Fun>,
}

impl Class {
    pub fn new<S: Into<String>>(name: S, superclass: Option<Rc<Class>>) -> Self {
        Self {
            name: name.into(),
            superclass,
            methods: Default::default(),
            getters: Default::default(),
            statics: Default::default(),
            static_getters: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Rc<Class>> {
        self.superclass.as_ref()
    }

    pub fn define<S: Into<String>>(&mut self, kind: MemberKind, name: S, fun: Fun) {
        let table = match kind {
            MemberKind::Method => &mut self.methods,
            MemberKind::Getter => &mut self.getters,
            MemberKind::Static => &mut self.statics,
            MemberKind::StaticGetter => &mut self.static_getters,
        };

        table.insert(name.into(), fun);
    }

    /// Finds a member on this class, or the nearest superclass which declares it.
    pub fn find(&self, kind: MemberKind, name: &str) -> Option<Fun> {
        let table = match kind {
            MemberKind::Method => &self.methods,
            MemberKind::Getter => &self.getters,
            MemberKind::Static => &self.statics,
            MemberKind::StaticGetter => &self.static_getters,
        };

        table.get(name).cloned()
            .or_else(|| self.superclass.as_ref().and_then(|s| s.find(kind, name)))
    }
}

impl Callable for Rc<Class> {
    fn arity(&self) -> usize {
        self.find(MemberKind::Method, "init").map(|init| init.arity()).unwrap_or(0)
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
        let instance = Instance::new(self.clone());

        if let Some(init) = self.find(MemberKind::Method, "init") {
            init.bind(Value::Instance(instance.clone())).call(interpreter, args)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "<class {}>", &self.name)
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

struct InstanceData {
    class: Rc<Class>,
    fields: FnvHashMap<String, Value>,
}

/// A shared handle to an object constructed by calling a class.
#[derive(Clone)]
pub struct Instance(Rc<RefCell<InstanceData>>);

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self(Rc::new(RefCell::new(InstanceData { class, fields: Default::default() })))
    }

    pub fn class(&self) -> Rc<Class> {
        self.0.borrow().class.clone()
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.borrow().fields.get(name).cloned()
    }

    pub fn set<S: Into<String>>(&self, name: S, value: Value) {
        self.0.borrow_mut().fields.insert(name.into(), value);
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "<instance of {}>", self.0.borrow().class.name())
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}
