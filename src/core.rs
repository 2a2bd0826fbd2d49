//! The evaluator: front end, value model, scopes and the machinery that
//! runs a program against a realm.

pub mod call_stack;
pub mod callable;
pub mod context;
pub mod conversion;
pub mod descriptor;
pub mod eval;
pub mod expr;
pub mod expression;
pub mod inspector;
pub mod interrupt;
pub mod js_error;
pub mod metadata;
pub mod parser;
pub mod pattern;
pub mod property;
pub mod property_key;
pub mod realm;
pub mod scope;
pub mod side_effects;
pub mod statement;
pub mod token;
pub mod trampoline;
pub mod value;

pub use parser::parse_program;
pub use property_key::PropertyKey;
pub use realm::Realm;
pub use value::{JSObjectData, JSObjectDataPtr, ObjectKind, Value};
