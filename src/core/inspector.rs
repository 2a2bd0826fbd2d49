//! Read-only views of engine state for a host UI: promise and proxy slots,
//! what is known about a function, and the contents of weak collections.
//!
//! Nothing here runs script code or changes an object.

use crate::core::callable::Callable;
use crate::core::metadata::Metadata;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value};
use crate::js_promise::PromiseState;
use crate::js_weakmap::weak_entries;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct PromiseInfo {
    pub state: PromiseState,
    /// Whether a reaction was ever attached.
    pub handled: bool,
}

#[derive(Clone, Debug)]
pub struct ProxyInfo {
    /// `None` for both once the proxy has been revoked.
    pub target: Option<JSObjectDataPtr>,
    pub handler: Option<JSObjectDataPtr>,
    pub revoked: bool,
}

#[derive(Clone, Debug, Default)]
pub struct FunctionInfo {
    pub name: Rc<str>,
    /// Exact source of a user function; `None` for natives and bound functions.
    pub source_text: Option<Rc<str>>,
    pub is_native: bool,
    pub is_arrow: bool,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_class: bool,
    pub constructable: bool,
    pub home_object: Option<JSObjectDataPtr>,
    pub bound_target: Option<JSObjectDataPtr>,
    pub bound_this: Option<Value>,
    pub bound_args: Vec<Value>,
}

/// One entry of a `WeakMap` (`value` set) or `WeakSet` (`value` is `None`).
#[derive(Clone, Debug)]
pub struct WeakCollectionEntry {
    pub key: JSObjectDataPtr,
    pub value: Option<Value>,
}

impl Metadata {
    pub fn promise_info(&self, obj: &JSObjectDataPtr) -> Option<PromiseInfo> {
        match &obj.borrow().kind {
            ObjectKind::Promise(data) => Some(PromiseInfo {
                state: data.state.clone(),
                handled: data.handled,
            }),
            _ => None,
        }
    }

    pub fn proxy_info(&self, obj: &JSObjectDataPtr) -> Option<ProxyInfo> {
        match &obj.borrow().kind {
            ObjectKind::Proxy(Some(data)) => Some(ProxyInfo {
                target: Some(data.target.clone()),
                handler: Some(data.handler.clone()),
                revoked: false,
            }),
            ObjectKind::Proxy(None) => Some(ProxyInfo {
                target: None,
                handler: None,
                revoked: true,
            }),
            _ => None,
        }
    }

    pub fn function_info(&self, obj: &JSObjectDataPtr) -> Option<FunctionInfo> {
        let callable = obj.borrow().callable().cloned()?;
        let name = crate::js_function::function_name_of(obj);
        let constructable = callable.is_constructor();
        let info = match callable {
            Callable::Native(_) => FunctionInfo {
                name,
                is_native: true,
                constructable,
                ..FunctionInfo::default()
            },
            Callable::Bound(bound) => FunctionInfo {
                name,
                constructable,
                bound_target: Some(bound.target.clone()),
                bound_this: Some(bound.this.clone()),
                bound_args: bound.args.clone(),
                ..FunctionInfo::default()
            },
            Callable::Closure(closure) => {
                let meta = self.function_metadata(obj).unwrap_or_else(|| closure.meta.clone());
                FunctionInfo {
                    name,
                    source_text: Some(meta.source_text.clone()),
                    is_arrow: meta.is_arrow,
                    is_async: meta.is_async,
                    is_generator: meta.is_generator,
                    is_class: meta.is_class_constructor(),
                    constructable: meta.constructable,
                    home_object: meta.home_object(),
                    ..FunctionInfo::default()
                }
            }
        };
        Some(info)
    }

    /// Live entries of a `WeakMap` or `WeakSet`, in no particular order.
    pub fn weak_collection_entries(&self, obj: &JSObjectDataPtr) -> Option<Vec<WeakCollectionEntry>> {
        let is_set = matches!(obj.borrow().kind, ObjectKind::WeakSet(_));
        let entries = weak_entries(obj)?;
        Some(
            entries
                .into_iter()
                .map(|(key, value)| WeakCollectionEntry {
                    key,
                    value: if is_set { None } else { Some(value) },
                })
                .collect(),
        )
    }
}
