//! Destructuring: binding initialization and assignment through patterns.

use crate::core::context::Context;
use crate::core::conversion::primitive_to_string;
use crate::core::expr::{Pattern, PatternProperty};
use crate::core::expression::{assign_identifier, assign_to_expression, evaluate_named, evaluate_property_name};
use crate::core::js_error::EvalResult;
use crate::core::property::{copy_data_properties, get_value};
use crate::core::property_key::PropertyKey;
use crate::core::scope::Scope;
use crate::core::value::{Value, new_object};
use crate::js_array::create_array;
use crate::js_iterator::get_iterator;
use crate::raise_type_error;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::rc::Rc;

/// How the identifiers of a pattern receive their values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingMode {
    /// `PutValue` through the scope chain: assignments and `var` declarations.
    Assign,
    /// Ends the dead zone of a binding already declared in the given scope.
    Initialize,
}

fn bind_identifier(ctx: &Rc<Context>, scope: &Rc<Scope>, name: &str, value: Value, mode: BindingMode) -> EvalResult<()> {
    match mode {
        BindingMode::Assign => assign_identifier(ctx, scope, name, value),
        BindingMode::Initialize => {
            ctx.check_scope_write(scope, name)?;
            scope.initialize(name, value);
            Ok(())
        }
    }
}

/// Binds `value` to every target of `pattern`.
pub fn bind_pattern<'a>(
    ctx: &'a Rc<Context>,
    scope: &'a Rc<Scope>,
    pattern: &'a Pattern,
    value: Value,
    mode: BindingMode,
) -> LocalBoxFuture<'a, EvalResult<()>> {
    async move {
        match pattern {
            Pattern::Identifier { name, .. } => bind_identifier(ctx, scope, name, value, mode),
            Pattern::Expression(target) => assign_to_expression(ctx, scope, target, value).await,
            Pattern::Default { target, default } => {
                let value = if value.is_undefined() {
                    match &**target {
                        Pattern::Identifier { name, .. } => evaluate_named(ctx, scope, default, name).await?,
                        _ => evaluate_named(ctx, scope, default, "").await?,
                    }
                } else {
                    value
                };
                bind_pattern(ctx, scope, target, value, mode).await
            }
            Pattern::Array { elements, rest, .. } => bind_array_pattern(ctx, scope, elements, rest.as_deref(), value, mode).await,
            Pattern::Object { properties, .. } => bind_object_pattern(ctx, scope, properties, value, mode).await,
        }
    }
    .boxed_local()
}

async fn bind_array_pattern(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    elements: &[Option<Pattern>],
    rest: Option<&Pattern>,
    value: Value,
    mode: BindingMode,
) -> EvalResult<()> {
    let mut record = get_iterator(ctx, &value)?;
    for element in elements {
        let item = record.step(ctx)?.unwrap_or_default();
        let Some(target) = element else {
            continue;
        };
        if let Err(e) = bind_pattern(ctx, scope, target, item, mode).await {
            return Err(record.close_on_error(ctx, e));
        }
    }
    if let Some(rest) = rest {
        let mut items = Vec::new();
        while let Some(item) = record.step(ctx)? {
            items.push(item);
        }
        let array = Value::Object(create_array(&ctx.realm.intrinsics, items));
        return bind_pattern(ctx, scope, rest, array, mode).await;
    }
    record.close(ctx)
}

async fn bind_object_pattern(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    properties: &[PatternProperty],
    value: Value,
    mode: BindingMode,
) -> EvalResult<()> {
    if value.is_nullish() {
        let shown = primitive_to_string(&value);
        return Err(raise_type_error!("Cannot destructure '{shown}' as it is {shown}.").into());
    }
    let mut used: Vec<PropertyKey> = Vec::new();
    for property in properties {
        match property {
            PatternProperty::KeyValue { key, value: target } => {
                let key = evaluate_property_name(ctx, scope, key).await?;
                let item = get_value(ctx, &value, &key)?;
                used.push(key);
                bind_pattern(ctx, scope, target, item, mode).await?;
            }
            PatternProperty::Rest(target) => {
                let rest = new_object(Some(&ctx.realm.intrinsics.object_prototype));
                copy_data_properties(ctx, &rest, &value, &used)?;
                bind_pattern(ctx, scope, target, Value::Object(rest), mode).await?;
            }
        }
    }
    Ok(())
}
