//! Identity-keyed side tables for engine bookkeeping.
//!
//! Entries hold a weak reference to their object and never keep it alive.
//! Keys are allocation addresses: a live `Weak` pins its allocation, so an
//! address cannot be reused while its entry exists.

use crate::core::property_key::PropertyKey;
use crate::core::value::{JSObjectDataPtr, Value, WeakObjectPtr, next_identity};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

const PRUNE_INTERVAL: usize = 256;

pub struct WeakIdentityMap<T> {
    entries: RefCell<HashMap<usize, (WeakObjectPtr, T)>>,
    inserts_since_prune: Cell<usize>,
}

impl<T> Default for WeakIdentityMap<T> {
    fn default() -> Self {
        WeakIdentityMap {
            entries: RefCell::new(HashMap::new()),
            inserts_since_prune: Cell::new(0),
        }
    }
}

fn identity_key(obj: &JSObjectDataPtr) -> usize {
    Rc::as_ptr(obj) as *const () as usize
}

impl<T: Clone> WeakIdentityMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, obj: &JSObjectDataPtr, value: T) -> Option<T> {
        let count = self.inserts_since_prune.get() + 1;
        if count >= PRUNE_INTERVAL {
            self.prune();
            self.inserts_since_prune.set(0);
        } else {
            self.inserts_since_prune.set(count);
        }
        self.entries
            .borrow_mut()
            .insert(identity_key(obj), (Rc::downgrade(obj), value))
            .map(|(_, old)| old)
    }

    pub fn get(&self, obj: &JSObjectDataPtr) -> Option<T> {
        self.entries.borrow().get(&identity_key(obj)).map(|(_, v)| v.clone())
    }

    pub fn contains(&self, obj: &JSObjectDataPtr) -> bool {
        self.entries.borrow().contains_key(&identity_key(obj))
    }

    pub fn remove(&self, obj: &JSObjectDataPtr) -> Option<T> {
        self.entries.borrow_mut().remove(&identity_key(obj)).map(|(_, v)| v)
    }

    /// Live entries, in no particular order.
    pub fn entries(&self) -> Vec<(JSObjectDataPtr, T)> {
        self.entries
            .borrow()
            .values()
            .filter_map(|(weak, v)| weak.upgrade().map(|o| (o, v.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.prune();
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries whose object has been collected.
    pub fn prune(&self) {
        self.entries.borrow_mut().retain(|_, (weak, _)| weak.strong_count() > 0);
    }
}

#[derive(Debug)]
pub struct PrivateName {
    pub id: u64,
    /// Source spelling including the leading `#`.
    pub description: Rc<str>,
}

impl PrivateName {
    pub fn new(description: &str) -> Rc<PrivateName> {
        Rc::new(PrivateName {
            id: next_identity(),
            description: description.into(),
        })
    }
}

#[derive(Clone, Debug)]
pub enum PrivateElement {
    Field(Value),
    Method(Value),
    Accessor { get: Option<Value>, set: Option<Value> },
}

#[derive(Clone, Debug)]
struct PrivateEntry {
    name: Rc<PrivateName>,
    element: PrivateElement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Base,
    Derived,
}

#[derive(Clone, Debug)]
pub enum FieldKey {
    Public(PropertyKey),
    Private(Rc<PrivateName>),
}

/// Per-instance work a class constructor performs once `this` exists.
#[derive(Clone, Debug)]
pub enum InstanceElement {
    Field { key: FieldKey, initializer: Option<Value> },
    PrivateMethod { name: Rc<PrivateName>, element: PrivateElement },
}

/// What the engine knows about a user function beyond its properties.
#[derive(Debug)]
pub struct FunctionMetadata {
    /// Exact source slice the function was created from.
    pub source_text: Rc<str>,
    pub is_arrow: bool,
    pub is_async: bool,
    pub is_generator: bool,
    pub constructable: bool,
    pub class_kind: Option<ClassKind>,
    pub home_object: RefCell<Option<JSObjectDataPtr>>,
    pub instance_elements: RefCell<Vec<InstanceElement>>,
}

impl FunctionMetadata {
    pub fn is_class_constructor(&self) -> bool {
        self.class_kind.is_some()
    }

    pub fn home_object(&self) -> Option<JSObjectDataPtr> {
        self.home_object.borrow().clone()
    }
}

/// The registry shared by the evaluator and the inspector accessors.
#[derive(Default)]
pub struct Metadata {
    functions: WeakIdentityMap<Rc<FunctionMetadata>>,
    private_elements: WeakIdentityMap<Rc<RefCell<Vec<PrivateEntry>>>>,
    stamped_errors: WeakIdentityMap<()>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&self, func: &JSObjectDataPtr, meta: Rc<FunctionMetadata>) {
        self.functions.insert(func, meta);
    }

    pub fn function_metadata(&self, func: &JSObjectDataPtr) -> Option<Rc<FunctionMetadata>> {
        self.functions.get(func)
    }

    pub fn private_element(&self, obj: &JSObjectDataPtr, name: &PrivateName) -> Option<PrivateElement> {
        let list = self.private_elements.get(obj)?;
        let list = list.borrow();
        list.iter().find(|e| e.name.id == name.id).map(|e| e.element.clone())
    }

    pub fn has_private(&self, obj: &JSObjectDataPtr, name: &PrivateName) -> bool {
        self.private_element(obj, name).is_some()
    }

    /// Adds a private element; `false` if `obj` already carries `name`.
    pub fn add_private(&self, obj: &JSObjectDataPtr, name: &Rc<PrivateName>, element: PrivateElement) -> bool {
        let list = match self.private_elements.get(obj) {
            Some(list) => list,
            None => {
                let list = Rc::new(RefCell::new(Vec::new()));
                self.private_elements.insert(obj, list.clone());
                list
            }
        };
        let mut list = list.borrow_mut();
        if list.iter().any(|e| e.name.id == name.id) {
            return false;
        }
        list.push(PrivateEntry {
            name: name.clone(),
            element,
        });
        true
    }

    /// Inserts or replaces the element stored under `name`.
    pub fn put_private(&self, obj: &JSObjectDataPtr, name: &Rc<PrivateName>, element: PrivateElement) {
        if let Some(list) = self.private_elements.get(obj) {
            let mut list = list.borrow_mut();
            if let Some(entry) = list.iter_mut().find(|e| e.name.id == name.id) {
                entry.element = element;
                return;
            }
        }
        self.add_private(obj, name, element);
    }

    /// Overwrites a private field; `false` if `obj` has no such field.
    pub fn set_private_field(&self, obj: &JSObjectDataPtr, name: &PrivateName, value: Value) -> bool {
        let Some(list) = self.private_elements.get(obj) else {
            return false;
        };
        let mut list = list.borrow_mut();
        match list.iter_mut().find(|e| e.name.id == name.id) {
            Some(PrivateEntry {
                element: PrivateElement::Field(slot),
                ..
            }) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Marks an error as carrying its stack string; `false` if it already did.
    pub fn mark_stamped(&self, error: &JSObjectDataPtr) -> bool {
        self.stamped_errors.insert(error, ()).is_none()
    }

    pub fn is_stamped(&self, error: &JSObjectDataPtr) -> bool {
        self.stamped_errors.contains(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::new_object;

    #[test]
    fn entries_do_not_keep_objects_alive() {
        let map = WeakIdentityMap::new();
        let kept = new_object(None);
        map.insert(&kept, 1);
        {
            let dropped = new_object(None);
            map.insert(&dropped, 2);
            assert_eq!(map.len(), 2);
        }
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&kept), Some(1));
    }

    #[test]
    fn private_fields_are_added_once() {
        let meta = Metadata::new();
        let obj = new_object(None);
        let name = PrivateName::new("#x");
        assert!(meta.add_private(&obj, &name, PrivateElement::Field(Value::Number(1.0))));
        assert!(!meta.add_private(&obj, &name, PrivateElement::Field(Value::Number(2.0))));
        assert!(meta.set_private_field(&obj, &name, Value::Number(3.0)));
        assert!(matches!(meta.private_element(&obj, &name), Some(PrivateElement::Field(Value::Number(n))) if n == 3.0));
        assert!(!meta.has_private(&new_object(None), &name));
    }
}
