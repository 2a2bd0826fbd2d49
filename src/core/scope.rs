use crate::core::metadata::PrivateName;
use crate::core::value::{JSObjectDataPtr, Value, next_identity};
use crate::{JSError, raise_reference_error, raise_type_error};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Class,
    /// Name of a named function expression, visible inside its own body.
    FunctionName,
    Parameter,
}

impl BindingKind {
    pub fn is_lexical(self) -> bool {
        matches!(self, BindingKind::Let | BindingKind::Const | BindingKind::Class)
    }

    pub fn is_mutable(self) -> bool {
        !matches!(self, BindingKind::Const | BindingKind::FunctionName)
    }
}

#[derive(Clone, Debug)]
pub struct Binding {
    /// `None` while in the temporal dead zone.
    pub value: Option<Value>,
    pub kind: BindingKind,
}

/// State of a function activation that `this`, `new.target` and `super` read.
#[derive(Debug)]
pub struct FunctionFrame {
    /// `None` until a derived constructor calls `super()`.
    pub this: RefCell<Option<Value>>,
    pub new_target: Value,
    pub function: Option<JSObjectDataPtr>,
    pub home_object: Option<JSObjectDataPtr>,
    /// Arrow frames take `this`, `new.target` and `super` from their parent.
    pub is_arrow: bool,
}

#[derive(Debug)]
pub enum ScopeKind {
    Global { global_object: JSObjectDataPtr },
    Module { this: Value },
    Function(FunctionFrame),
    Block,
}

#[derive(Debug)]
pub struct Scope {
    pub id: u64,
    pub kind: ScopeKind,
    pub parent: Option<Rc<Scope>>,
    bindings: RefCell<HashMap<Rc<str>, Binding>>,
    private_names: RefCell<HashMap<Rc<str>, Rc<PrivateName>>>,
}

/// Outcome of reading a binding that exists in a scope.
pub enum BindingRead {
    Value(Value),
    Uninitialized,
}

impl Scope {
    fn with_kind(kind: ScopeKind, parent: Option<Rc<Scope>>) -> Rc<Scope> {
        Rc::new(Scope {
            id: next_identity(),
            kind,
            parent,
            bindings: RefCell::new(HashMap::new()),
            private_names: RefCell::new(HashMap::new()),
        })
    }

    pub fn new_global(global_object: JSObjectDataPtr) -> Rc<Scope> {
        Self::with_kind(ScopeKind::Global { global_object }, None)
    }

    pub fn new_module(parent: &Rc<Scope>, this: Value) -> Rc<Scope> {
        Self::with_kind(ScopeKind::Module { this }, Some(parent.clone()))
    }

    pub fn new_function(parent: &Rc<Scope>, frame: FunctionFrame) -> Rc<Scope> {
        Self::with_kind(ScopeKind::Function(frame), Some(parent.clone()))
    }

    pub fn new_block(parent: &Rc<Scope>) -> Rc<Scope> {
        Self::with_kind(ScopeKind::Block, Some(parent.clone()))
    }

    /// A fresh block scope carrying a copy of this scope's bindings, used for
    /// per-iteration `let` bindings of `for` loops.
    pub fn copy_for_iteration(&self) -> Rc<Scope> {
        let copy = Scope {
            id: next_identity(),
            kind: ScopeKind::Block,
            parent: self.parent.clone(),
            bindings: RefCell::new(self.bindings.borrow().clone()),
            private_names: RefCell::new(self.private_names.borrow().clone()),
        };
        Rc::new(copy)
    }

    pub fn is_global(&self) -> bool {
        matches!(self.kind, ScopeKind::Global { .. })
    }

    pub fn global_object(&self) -> Option<&JSObjectDataPtr> {
        match &self.kind {
            ScopeKind::Global { global_object } => Some(global_object),
            _ => None,
        }
    }

    pub fn function_frame(&self) -> Option<&FunctionFrame> {
        match &self.kind {
            ScopeKind::Function(frame) => Some(frame),
            _ => None,
        }
    }

    /// The nearest scope that receives `var` declarations.
    pub fn var_scope(self: &Rc<Self>) -> Rc<Scope> {
        let mut scope = self.clone();
        loop {
            if !matches!(scope.kind, ScopeKind::Block) {
                return scope;
            }
            match &scope.parent {
                Some(parent) => scope = parent.clone(),
                None => return scope,
            }
        }
    }

    /// The nearest scope that determines `this`, skipping arrow function scopes.
    pub fn this_scope(self: &Rc<Self>) -> Rc<Scope> {
        let mut scope = self.clone();
        loop {
            let next = match &scope.kind {
                ScopeKind::Block => scope.parent.clone(),
                ScopeKind::Function(frame) if frame.is_arrow => scope.parent.clone(),
                _ => return scope,
            };
            match next {
                Some(parent) => scope = parent,
                None => return scope,
            }
        }
    }

    pub fn has_own_binding(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn own_binding(&self, name: &str) -> Option<Binding> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Creates a binding in this scope, enforcing redeclaration rules.
    ///
    /// Redeclaring a `var` (or parameter) with `var` keeps the current value.
    pub fn declare(&self, name: &str, kind: BindingKind, value: Option<Value>) -> Result<(), JSError> {
        let mut bindings = self.bindings.borrow_mut();
        if let Some(existing) = bindings.get_mut(name) {
            if kind.is_lexical() || existing.kind.is_lexical() {
                return Err(JSError::SyntaxError {
                    message: format!("Identifier '{name}' has already been declared"),
                    line: 0,
                    column: 0,
                });
            }
            if let (Some(v), BindingKind::Var) = (value, kind) {
                existing.value = Some(v);
            }
            return Ok(());
        }
        bindings.insert(name.into(), Binding { value, kind });
        Ok(())
    }

    /// Creates or replaces a binding without redeclaration checks.
    pub fn set_binding(&self, name: &str, kind: BindingKind, value: Option<Value>) {
        self.bindings.borrow_mut().insert(name.into(), Binding { value, kind });
    }

    /// Ends the temporal dead zone of a lexical binding.
    pub fn initialize(&self, name: &str, value: Value) {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            binding.value = Some(value);
        }
    }

    pub fn read(&self, name: &str) -> Option<BindingRead> {
        self.bindings.borrow().get(name).map(|b| match &b.value {
            Some(v) => BindingRead::Value(v.clone()),
            None => BindingRead::Uninitialized,
        })
    }

    /// Assigns to an existing binding of this scope.
    ///
    /// Immutable function-name bindings ignore the write in sloppy mode.
    pub fn write(&self, name: &str, value: Value, strict: bool) -> Result<(), JSError> {
        let mut bindings = self.bindings.borrow_mut();
        let Some(binding) = bindings.get_mut(name) else {
            return Err(raise_reference_error!("{name} is not defined"));
        };
        if binding.value.is_none() {
            return Err(raise_reference_error!("Cannot access '{name}' before initialization"));
        }
        match binding.kind {
            BindingKind::Const => Err(raise_type_error!("Assignment to constant variable.")),
            BindingKind::FunctionName if strict => Err(raise_type_error!("Assignment to constant variable.")),
            BindingKind::FunctionName => Ok(()),
            _ => {
                binding.value = Some(value);
                Ok(())
            }
        }
    }

    /// Finds the innermost scope declaring `name`.
    pub fn resolve(self: &Rc<Self>, name: &str) -> Option<Rc<Scope>> {
        let mut scope = self.clone();
        loop {
            if scope.has_own_binding(name) {
                return Some(scope);
            }
            match &scope.parent {
                Some(parent) => scope = parent.clone(),
                None => return None,
            }
        }
    }

    /// Names bound directly in this scope, sorted.
    pub fn binding_names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn declare_private_name(&self, name: &str) -> Rc<PrivateName> {
        self.private_names
            .borrow_mut()
            .entry(name.into())
            .or_insert_with(|| PrivateName::new(&format!("#{name}")))
            .clone()
    }

    pub fn resolve_private_name(self: &Rc<Self>, name: &str) -> Option<Rc<PrivateName>> {
        let mut scope = self.clone();
        loop {
            if let Some(p) = scope.private_names.borrow().get(name) {
                return Some(p.clone());
            }
            match &scope.parent {
                Some(parent) => scope = parent.clone(),
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::new_object;

    #[test]
    fn lexical_redeclaration_is_rejected() {
        let global = Scope::new_global(new_object(None));
        let block = Scope::new_block(&global);
        block.declare("x", BindingKind::Let, None).unwrap();
        assert!(block.declare("x", BindingKind::Var, None).is_err());
        block.declare("y", BindingKind::Var, Some(Value::Number(1.0))).unwrap();
        block.declare("y", BindingKind::Var, None).unwrap();
        assert!(matches!(block.read("y"), Some(BindingRead::Value(Value::Number(n))) if n == 1.0));
    }

    #[test]
    fn temporal_dead_zone_and_const() {
        let global = Scope::new_global(new_object(None));
        let scope = Scope::new_block(&global);
        scope.declare("c", BindingKind::Const, None).unwrap();
        let err = scope.write("c", Value::Null, true).unwrap_err();
        assert_eq!(err.message(), "Cannot access 'c' before initialization");
        scope.initialize("c", Value::Number(1.0));
        let err = scope.write("c", Value::Null, true).unwrap_err();
        assert_eq!(err.message(), "Assignment to constant variable.");
    }

    #[test]
    fn iteration_copies_are_independent() {
        let global = Scope::new_global(new_object(None));
        let scope = Scope::new_block(&global);
        scope.declare("i", BindingKind::Let, Some(Value::Number(0.0))).unwrap();
        let next = scope.copy_for_iteration();
        next.write("i", Value::Number(1.0), true).unwrap();
        assert!(matches!(scope.read("i"), Some(BindingRead::Value(Value::Number(n))) if n == 0.0));
        assert_ne!(scope.id, next.id);
        assert_eq!(Scope::new_block(&next).var_scope().id, global.id);
    }
}
