use crate::core::context::{Context, SourceInfo};
use crate::core::expr::FunctionNode;
use crate::core::js_error::EvalResult;
use crate::core::metadata::FunctionMetadata;
use crate::core::scope::Scope;
use crate::core::value::{JSObjectDataPtr, Value, is_constructor};
use std::fmt;
use std::rc::Rc;

/// Native call behavior: `(context, this, arguments)`.
pub type NativeCall = dyn Fn(&Rc<Context>, &Value, &[Value]) -> EvalResult<Value>;

/// Native construct behavior: `(context, arguments, new_target)`.
pub type NativeConstruct = dyn Fn(&Rc<Context>, &[Value], &JSObjectDataPtr) -> EvalResult<Value>;

pub struct NativeFunction {
    pub name: Rc<str>,
    pub call: Rc<NativeCall>,
    pub construct: Option<Rc<NativeConstruct>>,
}

/// A user function: its node, defining scope and defining source.
pub struct Closure {
    pub node: Rc<FunctionNode>,
    pub scope: Rc<Scope>,
    pub source: Rc<SourceInfo>,
    pub strict: bool,
    pub meta: Rc<FunctionMetadata>,
}

pub struct BoundFunction {
    pub target: JSObjectDataPtr,
    pub this: Value,
    pub args: Vec<Value>,
}

#[derive(Clone)]
pub enum Callable {
    Closure(Rc<Closure>),
    Native(Rc<NativeFunction>),
    Bound(Rc<BoundFunction>),
}

impl Callable {
    pub fn is_constructor(&self) -> bool {
        match self {
            Callable::Closure(c) => c.meta.constructable,
            Callable::Native(n) => n.construct.is_some(),
            Callable::Bound(b) => is_constructor(&b.target),
        }
    }

    pub fn as_closure(&self) -> Option<&Rc<Closure>> {
        match self {
            Callable::Closure(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Closure(c) => write!(f, "Closure({:?})", c.node.name),
            Callable::Native(n) => write!(f, "Native({})", n.name),
            Callable::Bound(_) => write!(f, "Bound"),
        }
    }
}
