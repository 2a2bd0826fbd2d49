use crate::core::context::Context;
use crate::core::js_error::EvalResult;
use crate::core::property::{get_property, has_property};
use crate::core::value::{JSObjectDataPtr, Value, new_object, to_boolean};
use crate::raise_type_error;
use std::rc::Rc;

/// Storage of an own property.
#[derive(Clone, Debug)]
pub enum PropertySlot {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Value>, set: Option<Value> },
}

#[derive(Clone, Debug)]
pub struct Property {
    pub slot: PropertySlot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    pub fn is_accessor(&self) -> bool {
        matches!(self.slot, PropertySlot::Accessor { .. })
    }

    pub fn to_descriptor(&self) -> PropertyDescriptor {
        match &self.slot {
            PropertySlot::Data { value, writable } => PropertyDescriptor::new_data(value.clone(), *writable, self.enumerable, self.configurable),
            PropertySlot::Accessor { get, set } => PropertyDescriptor::new_accessor(
                Some(get.clone().unwrap_or_default()),
                Some(set.clone().unwrap_or_default()),
                self.enumerable,
                self.configurable,
            ),
        }
    }
}

/// A possibly partial property descriptor, as accepted by `Object.defineProperty`.
///
/// `get`/`set` hold `Some(Value::Undefined)` when the field is present but undefined.
#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<Value>,
    pub set: Option<Value>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn new_data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn new_accessor(get: Option<Value>, set: Option<Value>, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor {
            value: None,
            writable: None,
            get,
            set,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    /// Descriptor used by ordinary assignment: `{value, writable, enumerable, configurable: true}`.
    pub fn new_default_data(value: Value) -> Self {
        Self::new_data(value, true, true, true)
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.is_accessor() && !self.is_data()
    }

    /// `ToPropertyDescriptor`.
    pub fn from_object(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<Self> {
        let receiver = Value::Object(obj.clone());
        let mut desc = PropertyDescriptor::default();
        let read = |name: &str| -> EvalResult<Option<Value>> {
            let key = name.into();
            if has_property(ctx, obj, &key)? {
                Ok(Some(get_property(ctx, obj, &key, &receiver)?))
            } else {
                Ok(None)
            }
        };
        desc.enumerable = read("enumerable")?.map(|v| to_boolean(&v));
        desc.configurable = read("configurable")?.map(|v| to_boolean(&v));
        desc.value = read("value")?;
        desc.writable = read("writable")?.map(|v| to_boolean(&v));
        if let Some(get) = read("get")? {
            if !get.is_undefined() && !get.is_callable() {
                return Err(raise_type_error!("Getter must be a function: {get:?}").into());
            }
            desc.get = Some(get);
        }
        if let Some(set) = read("set")? {
            if !set.is_undefined() && !set.is_callable() {
                return Err(raise_type_error!("Setter must be a function: {set:?}").into());
            }
            desc.set = Some(set);
        }
        if desc.is_accessor() && desc.is_data() {
            return Err(raise_type_error!("Invalid property descriptor. Cannot both specify accessors and a value or writable attribute").into());
        }
        Ok(desc)
    }

    /// `FromPropertyDescriptor`: a plain object with the present fields.
    pub fn to_object(&self, ctx: &Rc<Context>) -> JSObjectDataPtr {
        let obj = new_object(Some(&ctx.realm.intrinsics.object_prototype));
        {
            let mut o = obj.borrow_mut();
            if let Some(v) = &self.value {
                o.insert_data("value", v.clone(), true, true, true);
            }
            if let Some(w) = self.writable {
                o.insert_data("writable", Value::Boolean(w), true, true, true);
            }
            if let Some(g) = &self.get {
                o.insert_data("get", g.clone(), true, true, true);
            }
            if let Some(s) = &self.set {
                o.insert_data("set", s.clone(), true, true, true);
            }
            if let Some(e) = self.enumerable {
                o.insert_data("enumerable", Value::Boolean(e), true, true, true);
            }
            if let Some(c) = self.configurable {
                o.insert_data("configurable", Value::Boolean(c), true, true, true);
            }
        }
        obj
    }

    /// Completes missing fields with their defaults (`CompletePropertyDescriptor`).
    pub fn into_property(self) -> Property {
        let enumerable = self.enumerable.unwrap_or(false);
        let configurable = self.configurable.unwrap_or(false);
        if self.is_accessor() {
            Property {
                slot: PropertySlot::Accessor {
                    get: self.get.filter(|g| !g.is_undefined()),
                    set: self.set.filter(|s| !s.is_undefined()),
                },
                enumerable,
                configurable,
            }
        } else {
            Property {
                slot: PropertySlot::Data {
                    value: self.value.unwrap_or_default(),
                    writable: self.writable.unwrap_or(false),
                },
                enumerable,
                configurable,
            }
        }
    }
}
