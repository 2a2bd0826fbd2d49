//! Expression evaluation.

use crate::core::context::Context;
use crate::core::conversion::{
    PreferredType, loose_equals, primitive_to_string, to_int32, to_number, to_object, to_primitive, to_property_key, to_string, to_uint32,
};
use crate::core::expr::{
    Argument, ArrayElement, BinaryOp, Expr, ExprKind, FunctionNode, LogicalOp, MemberProperty, MethodKind, ObjectMember, Pattern, PropertyName, UnaryOp,
};
use crate::core::js_error::EvalResult;
use crate::core::metadata::PrivateName;
use crate::core::pattern::{BindingMode, bind_pattern};
use crate::core::property::{
    IntegrityLevel, copy_data_properties, create_data_property_or_throw, delete_failure, delete_property, get_property, get_value, has_in,
    has_property, instance_of, put_value, set_integrity_level, set_with_outcome, set_failure, SetOutcome,
};
use crate::core::property_key::PropertyKey;
use crate::core::scope::{BindingKind, BindingRead, Scope, ScopeKind};
use crate::core::token::TemplateQuasi;
use crate::core::trampoline::await_value;
use crate::core::value::{JSObjectDataPtr, Value, new_object, strict_equals, to_boolean, type_of};
use crate::js_array::create_array;
use crate::js_function::{call_function, construct, create_function, define_method_property, set_function_name};
use crate::js_iterator::get_iterator;
use crate::{JSError, raise_reference_error, raise_syntax_error, raise_type_error, raise_unsupported};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::rc::Rc;

/// Something an expression can be assigned to.
pub enum Reference {
    Binding(Rc<str>),
    /// `this` differs from `base` only for `super.x`.
    Property { base: Value, key: PropertyKey, this: Value },
    Private { base: Value, name: Rc<PrivateName> },
}

fn not_defined(name: &str) -> JSError {
    raise_reference_error!("{name} is not defined")
}

/// `this` of the nearest non-arrow function, module or the global scope.
pub fn resolve_this(scope: &Rc<Scope>) -> EvalResult<Value> {
    let this_scope = scope.this_scope();
    match &this_scope.kind {
        ScopeKind::Global { global_object } => Ok(Value::Object(global_object.clone())),
        ScopeKind::Module { this } => Ok(this.clone()),
        ScopeKind::Function(frame) => match frame.this.borrow().clone() {
            Some(this) => Ok(this),
            None => Err(raise_reference_error!(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor"
            )
            .into()),
        },
        ScopeKind::Block => Ok(Value::Undefined),
    }
}

/// Reads an identifier, falling back to the global object when no scope binds it.
pub fn read_identifier(ctx: &Rc<Context>, scope: &Rc<Scope>, name: &str) -> EvalResult<Value> {
    if let Some(found) = scope.resolve(name) {
        return match found.read(name) {
            Some(BindingRead::Value(v)) => Ok(v),
            _ => Err(raise_reference_error!("Cannot access '{name}' before initialization").into()),
        };
    }
    let global = &ctx.realm.global_object;
    let key = PropertyKey::from(name);
    if has_property(ctx, global, &key)? {
        return get_property(ctx, global, &key, &Value::Object(global.clone()));
    }
    Err(not_defined(name).into())
}

/// `PutValue` for an identifier reference.
pub fn assign_identifier(ctx: &Rc<Context>, scope: &Rc<Scope>, name: &str, value: Value) -> EvalResult<()> {
    if let Some(found) = scope.resolve(name) {
        ctx.check_scope_write(&found, name)?;
        return Ok(found.write(name, value, ctx.strict)?);
    }
    let global = &ctx.realm.global_object;
    let key = PropertyKey::from(name);
    if ctx.strict && !has_property(ctx, global, &key)? {
        return Err(not_defined(name).into());
    }
    put_value(ctx, &Value::Object(global.clone()), &key, value, ctx.strict)
}

// ---------------------------------------------------------------------------
// Operators

fn is_string(v: &Value) -> bool {
    matches!(v, Value::String(_))
}

fn exponentiate(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// `IsLessThan`; `None` when either side is NaN.
fn less_than(ctx: &Rc<Context>, a: &Value, b: &Value, left_first: bool) -> EvalResult<Option<bool>> {
    let (pa, pb) = if left_first {
        let pa = to_primitive(ctx, a, PreferredType::Number)?;
        (pa, to_primitive(ctx, b, PreferredType::Number)?)
    } else {
        let pb = to_primitive(ctx, b, PreferredType::Number)?;
        (to_primitive(ctx, a, PreferredType::Number)?, pb)
    };
    if let (Value::String(x), Value::String(y)) = (&pa, &pb) {
        return Ok(Some(x.encode_utf16().lt(y.encode_utf16())));
    }
    let x = to_number(ctx, &pa)?;
    let y = to_number(ctx, &pb)?;
    if x.is_nan() || y.is_nan() {
        return Ok(None);
    }
    Ok(Some(x < y))
}

/// Applies a binary operator to two evaluated operands.
pub fn apply_binary(ctx: &Rc<Context>, op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let number = |f: fn(f64, f64) -> f64| -> EvalResult<Value> { Ok(Value::Number(f(to_number(ctx, left)?, to_number(ctx, right)?))) };
    Ok(match op {
        BinaryOp::Add => {
            let a = to_primitive(ctx, left, PreferredType::Default)?;
            let b = to_primitive(ctx, right, PreferredType::Default)?;
            if is_string(&a) || is_string(&b) {
                let mut s = to_string(ctx, &a)?.to_string();
                s.push_str(&to_string(ctx, &b)?);
                Value::from(s)
            } else {
                Value::Number(to_number(ctx, &a)? + to_number(ctx, &b)?)
            }
        }
        BinaryOp::Sub => return number(|a, b| a - b),
        BinaryOp::Mul => return number(|a, b| a * b),
        BinaryOp::Div => return number(|a, b| a / b),
        BinaryOp::Mod => return number(|a, b| a % b),
        BinaryOp::Exp => return number(exponentiate),
        BinaryOp::Shl => Value::Number(to_int32(ctx, left)?.wrapping_shl(to_uint32(ctx, right)? & 31) as f64),
        BinaryOp::Shr => Value::Number((to_int32(ctx, left)? >> (to_uint32(ctx, right)? & 31)) as f64),
        BinaryOp::UShr => Value::Number((to_uint32(ctx, left)? >> (to_uint32(ctx, right)? & 31)) as f64),
        BinaryOp::BitAnd => Value::Number((to_int32(ctx, left)? & to_int32(ctx, right)?) as f64),
        BinaryOp::BitOr => Value::Number((to_int32(ctx, left)? | to_int32(ctx, right)?) as f64),
        BinaryOp::BitXor => Value::Number((to_int32(ctx, left)? ^ to_int32(ctx, right)?) as f64),
        BinaryOp::Equal => Value::Boolean(loose_equals(ctx, left, right)?),
        BinaryOp::NotEqual => Value::Boolean(!loose_equals(ctx, left, right)?),
        BinaryOp::StrictEqual => Value::Boolean(strict_equals(left, right)),
        BinaryOp::StrictNotEqual => Value::Boolean(!strict_equals(left, right)),
        BinaryOp::LessThan => Value::Boolean(less_than(ctx, left, right, true)? == Some(true)),
        BinaryOp::GreaterThan => Value::Boolean(less_than(ctx, right, left, false)? == Some(true)),
        BinaryOp::LessEqual => Value::Boolean(less_than(ctx, right, left, false)? == Some(false)),
        BinaryOp::GreaterEqual => Value::Boolean(less_than(ctx, left, right, true)? == Some(false)),
        BinaryOp::InstanceOf => Value::Boolean(instance_of(ctx, left, right)?),
        BinaryOp::In => Value::Boolean(has_in(ctx, left, right)?),
    })
}

// ---------------------------------------------------------------------------
// References

fn private_name(scope: &Rc<Scope>, name: &str, expr: &Expr) -> Result<Rc<PrivateName>, JSError> {
    scope
        .resolve_private_name(name)
        .ok_or_else(|| raise_syntax_error!(expr.span, "Private field '#{name}' must be declared in an enclosing class"))
}

async fn member_key(ctx: &Rc<Context>, scope: &Rc<Scope>, property: &MemberProperty) -> EvalResult<PropertyKey> {
    match property {
        MemberProperty::Static(name) => Ok(PropertyKey::from(name.clone())),
        MemberProperty::Computed(e) => {
            let v = evaluate_expr(ctx, scope, e).await?;
            to_property_key(ctx, &v)
        }
        MemberProperty::Private(name) => Err(crate::raise_internal_error!("private name #{name} used as a property key").into()),
    }
}

async fn member_reference(ctx: &Rc<Context>, scope: &Rc<Scope>, base: Value, property: &MemberProperty, expr: &Expr) -> EvalResult<Reference> {
    if let MemberProperty::Private(name) = property {
        let name = private_name(scope, name, expr)?;
        return Ok(Reference::Private { base, name });
    }
    let key = member_key(ctx, scope, property).await?;
    Ok(Reference::Property {
        this: base.clone(),
        base,
        key,
    })
}

async fn super_reference(ctx: &Rc<Context>, scope: &Rc<Scope>, property: &MemberProperty) -> EvalResult<Reference> {
    let (home_proto, this) = crate::js_class::super_base(scope)?;
    let key = member_key(ctx, scope, property).await?;
    Ok(Reference::Property { base: home_proto, key, this })
}

/// Evaluates an expression in reference position.
fn evaluate_reference<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, expr: &'a Expr) -> LocalBoxFuture<'a, EvalResult<Reference>> {
    async move {
        match &expr.kind {
            ExprKind::Identifier(name) => Ok(Reference::Binding(name.clone())),
            ExprKind::Member { object, property, .. } => {
                let base = evaluate_expr(ctx, scope, object).await?;
                member_reference(ctx, scope, base, property, expr).await
            }
            ExprKind::SuperMember { property } => super_reference(ctx, scope, property).await,
            _ => Err(raise_syntax_error!(expr.span, "Invalid left-hand side in assignment").into()),
        }
    }
    .boxed_local()
}

/// `GetValue` on a reference.
pub fn get_reference_value(ctx: &Rc<Context>, scope: &Rc<Scope>, reference: &Reference) -> EvalResult<Value> {
    match reference {
        Reference::Binding(name) => read_identifier(ctx, scope, name),
        Reference::Property { base, key, this } => match base {
            Value::Object(obj) => get_property(ctx, obj, key, this),
            other => get_value(ctx, other, key),
        },
        Reference::Private { base, name } => crate::js_class::private_get(ctx, base, name),
    }
}

/// `PutValue` on a reference.
pub fn put_reference_value(ctx: &Rc<Context>, scope: &Rc<Scope>, reference: &Reference, value: Value) -> EvalResult<()> {
    match reference {
        Reference::Binding(name) => assign_identifier(ctx, scope, name, value),
        Reference::Property { base, key, this } => match base {
            Value::Object(obj) => {
                let outcome = set_with_outcome(ctx, obj, key, value, this)?;
                if outcome != SetOutcome::Done && ctx.strict {
                    return Err(set_failure(outcome, this, key).into());
                }
                Ok(())
            }
            other => put_value(ctx, other, key, value, ctx.strict),
        },
        Reference::Private { base, name } => crate::js_class::private_set(ctx, base, name, value),
    }
}

/// Assigns `value` to an assignment target expression such as `a.b`.
pub fn assign_to_expression<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, target: &'a Expr, value: Value) -> LocalBoxFuture<'a, EvalResult<()>> {
    async move {
        let reference = evaluate_reference(ctx, scope, target).await?;
        put_reference_value(ctx, scope, &reference, value)
    }
    .boxed_local()
}

// ---------------------------------------------------------------------------
// Functions, objects and arrays

/// Function expressions with a name see themselves through an immutable binding.
fn evaluate_function_expression(ctx: &Rc<Context>, scope: &Rc<Scope>, node: &Rc<FunctionNode>, name_hint: Option<&str>) -> JSObjectDataPtr {
    match (&node.name, node.is_arrow()) {
        (Some(own), false) => {
            let func_scope = Scope::new_block(scope);
            func_scope.set_binding(own, BindingKind::FunctionName, None);
            let func = create_function(ctx, node, &func_scope, own, None);
            func_scope.initialize(own, Value::Object(func.clone()));
            func
        }
        _ => create_function(ctx, node, scope, name_hint.unwrap_or(""), None),
    }
}

/// Evaluates `expr`, naming it `name` if it is an anonymous function or class.
pub fn evaluate_named<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, expr: &'a Expr, name: &'a str) -> LocalBoxFuture<'a, EvalResult<Value>> {
    async move {
        match &expr.kind {
            ExprKind::Function(node) if node.name.is_none() => Ok(Value::Object(evaluate_function_expression(ctx, scope, node, Some(name)))),
            ExprKind::Class(node) if node.name.is_none() => {
                Ok(Value::Object(crate::js_class::evaluate_class(ctx, scope, node, name.into()).await?))
            }
            _ => evaluate_expr(ctx, scope, expr).await,
        }
    }
    .boxed_local()
}

/// Key of an object literal or class member.
pub fn evaluate_property_name<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, name: &'a PropertyName) -> LocalBoxFuture<'a, EvalResult<PropertyKey>> {
    async move {
        match name {
            PropertyName::Static(s) => Ok(PropertyKey::from(s.clone())),
            PropertyName::Computed(e) => {
                let v = evaluate_expr(ctx, scope, e).await?;
                to_property_key(ctx, &v)
            }
            PropertyName::Private(n) => Err(crate::raise_internal_error!("private name #{n} outside a class body").into()),
        }
    }
    .boxed_local()
}

async fn evaluate_object_literal(ctx: &Rc<Context>, scope: &Rc<Scope>, members: &[ObjectMember]) -> EvalResult<Value> {
    let obj = new_object(Some(&ctx.realm.intrinsics.object_prototype));
    for member in members {
        match member {
            ObjectMember::Property {
                key: PropertyName::Static(name),
                value,
                shorthand: false,
            } if &**name == "__proto__" => {
                let proto = evaluate_expr(ctx, scope, value).await?;
                match proto {
                    Value::Object(p) => obj.borrow_mut().prototype = Some(p),
                    Value::Null => obj.borrow_mut().prototype = None,
                    _ => {}
                }
            }
            ObjectMember::Property { key, value, .. } => {
                let key = evaluate_property_name(ctx, scope, key).await?;
                let v = if value.is_anonymous_function_definition() {
                    evaluate_named(ctx, scope, value, &key.function_name()).await?
                } else {
                    evaluate_expr(ctx, scope, value).await?
                };
                create_data_property_or_throw(ctx, &obj, &key, v)?;
            }
            ObjectMember::CoverInitialized { span, .. } => {
                return Err(raise_syntax_error!(span, "Invalid shorthand property initializer").into());
            }
            ObjectMember::Method { key, kind, function } => {
                let key = evaluate_property_name(ctx, scope, key).await?;
                let func = create_function(ctx, function, scope, "", Some(&obj));
                match kind {
                    MethodKind::Method => {
                        set_function_name(&func, &key, None);
                        define_method_property(ctx, &obj, &key, &func, true)?;
                    }
                    MethodKind::Getter | MethodKind::Setter => {
                        let getter = *kind == MethodKind::Getter;
                        set_function_name(&func, &key, Some(if getter { "get" } else { "set" }));
                        let desc = if getter {
                            crate::core::descriptor::PropertyDescriptor {
                                get: Some(Value::Object(func)),
                                enumerable: Some(true),
                                configurable: Some(true),
                                ..Default::default()
                            }
                        } else {
                            crate::core::descriptor::PropertyDescriptor {
                                set: Some(Value::Object(func)),
                                enumerable: Some(true),
                                configurable: Some(true),
                                ..Default::default()
                            }
                        };
                        crate::core::property::define_property_or_throw(ctx, &obj, &key, desc)?;
                    }
                }
            }
            ObjectMember::Spread(e) => {
                let source = evaluate_expr(ctx, scope, e).await?;
                copy_data_properties(ctx, &obj, &source, &[])?;
            }
        }
    }
    Ok(Value::Object(obj))
}

/// Array literal; holes leave the index absent while still counting toward `length`.
async fn evaluate_array_literal(ctx: &Rc<Context>, scope: &Rc<Scope>, elements: &[Option<ArrayElement>]) -> EvalResult<Value> {
    let array = create_array(&ctx.realm.intrinsics, Vec::new());
    let mut index = 0usize;
    for element in elements {
        match element {
            None => index += 1,
            Some(ArrayElement::Item(e)) => {
                let v = evaluate_expr(ctx, scope, e).await?;
                array.borrow_mut().insert_data(index, v, true, true, true);
                index += 1;
            }
            Some(ArrayElement::Spread(e)) => {
                let iterable = evaluate_expr(ctx, scope, e).await?;
                let mut record = get_iterator(ctx, &iterable)?;
                while let Some(v) = record.step(ctx)? {
                    array.borrow_mut().insert_data(index, v, true, true, true);
                    index += 1;
                }
            }
        }
    }
    array.borrow_mut().insert_data("length", Value::Number(index as f64), true, false, false);
    Ok(Value::Object(array))
}

/// Evaluates call arguments, expanding spreads.
pub fn evaluate_arguments<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, args: &'a [Argument]) -> LocalBoxFuture<'a, EvalResult<Vec<Value>>> {
    async move {
        let mut out = Vec::with_capacity(args.len());
        for a in args {
            match a {
                Argument::Item(e) => out.push(evaluate_expr(ctx, scope, e).await?),
                Argument::Spread(e) => {
                    let iterable = evaluate_expr(ctx, scope, e).await?;
                    let mut record = get_iterator(ctx, &iterable)?;
                    while let Some(v) = record.step(ctx)? {
                        out.push(v);
                    }
                }
            }
        }
        Ok(out)
    }
    .boxed_local()
}

fn template_object(ctx: &Rc<Context>, quasis: &Rc<Vec<TemplateQuasi>>) -> EvalResult<JSObjectDataPtr> {
    let site = Rc::as_ptr(quasis) as usize;
    if let Some((_, obj)) = ctx.realm.template_objects.borrow().get(&site) {
        return Ok(obj.clone());
    }
    let intrinsics = &ctx.realm.intrinsics;
    let cooked: Vec<Value> = quasis
        .iter()
        .map(|q| q.cooked.clone().map(Value::String).unwrap_or_default())
        .collect();
    let raw: Vec<Value> = quasis.iter().map(|q| Value::String(q.raw.clone())).collect();
    let strings = create_array(intrinsics, cooked);
    let raw = create_array(intrinsics, raw);
    set_integrity_level(ctx, &raw, IntegrityLevel::Frozen)?;
    strings.borrow_mut().insert_data("raw", Value::Object(raw), false, false, false);
    set_integrity_level(ctx, &strings, IntegrityLevel::Frozen)?;
    ctx.realm
        .template_objects
        .borrow_mut()
        .insert(site, (quasis.clone(), strings.clone()));
    Ok(strings)
}

// ---------------------------------------------------------------------------
// Calls and optional chains

fn not_callable(ctx: &Context, callee: &Expr, what: &str) -> JSError {
    let text = ctx.source.slice(callee.span);
    let text = if text.is_empty() { "expression" } else { text };
    raise_type_error!("{text} is not a {what}")
}

/// Evaluates the members and calls of an optional chain, yielding the value
/// and the `this` a call on it would receive. `None` means a `?.`
/// short-circuited.
fn evaluate_chain<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, expr: &'a Expr) -> LocalBoxFuture<'a, EvalResult<Option<(Value, Value)>>> {
    async move {
        match &expr.kind {
            ExprKind::Member { object, property, optional } => {
                let Some((base, _)) = evaluate_chain(ctx, scope, object).await? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let reference = member_reference(ctx, scope, base.clone(), property, expr).await?;
                let value = get_reference_value(ctx, scope, &reference)?;
                Ok(Some((value, base)))
            }
            ExprKind::SuperMember { property } => {
                let reference = super_reference(ctx, scope, property).await?;
                let value = get_reference_value(ctx, scope, &reference)?;
                let Reference::Property { this, .. } = reference else {
                    return Ok(Some((value, Value::Undefined)));
                };
                Ok(Some((value, this)))
            }
            ExprKind::Call { callee, arguments, optional } => {
                let Some((func, this)) = evaluate_chain(ctx, scope, callee).await? else {
                    return Ok(None);
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = evaluate_arguments(ctx, scope, arguments).await?;
                if !func.is_callable() {
                    return Err(not_callable(ctx, callee, "function").into());
                }
                ctx.at(expr.span);
                let result = call_function(ctx, &func, &this, &args)?;
                Ok(Some((result, Value::Undefined)))
            }
            _ => Ok(Some((evaluate_expr(ctx, scope, expr).await?, Value::Undefined))),
        }
    }
    .boxed_local()
}

async fn evaluate_tagged_template(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    tag: &Expr,
    quasis: &Rc<Vec<TemplateQuasi>>,
    exprs: &[Expr],
) -> EvalResult<Value> {
    let (func, this) = evaluate_chain(ctx, scope, tag).await?.unwrap_or_default();
    let strings = template_object(ctx, quasis)?;
    let mut args = vec![Value::Object(strings)];
    for e in exprs {
        args.push(evaluate_expr(ctx, scope, e).await?);
    }
    if !func.is_callable() {
        return Err(not_callable(ctx, tag, "function").into());
    }
    ctx.at(tag.span);
    call_function(ctx, &func, &this, &args)
}

// ---------------------------------------------------------------------------
// Unary, update and assignment

async fn evaluate_delete(ctx: &Rc<Context>, scope: &Rc<Scope>, argument: &Expr) -> EvalResult<Value> {
    match &argument.kind {
        ExprKind::Member { object, property, .. } => {
            let base = evaluate_expr(ctx, scope, object).await?;
            let key = member_key(ctx, scope, property).await?;
            let obj = to_object(ctx, &base)?;
            let deleted = delete_property(ctx, &obj, &key)?;
            if !deleted && ctx.strict {
                return Err(delete_failure(&obj, &key).into());
            }
            Ok(Value::Boolean(deleted))
        }
        ExprKind::SuperMember { .. } => Err(raise_reference_error!("Unsupported reference to 'super'").into()),
        ExprKind::Identifier(name) => {
            if scope.resolve(name).is_some() {
                return Ok(Value::Boolean(false));
            }
            let global = &ctx.realm.global_object;
            Ok(Value::Boolean(delete_property(ctx, global, &PropertyKey::from(name.clone()))?))
        }
        ExprKind::OptionalChain(inner) => match evaluate_chain(ctx, scope, inner).await? {
            None => Ok(Value::Boolean(true)),
            Some(_) => Err(raise_unsupported!("delete of an optional chain member").into()),
        },
        _ => {
            evaluate_expr(ctx, scope, argument).await?;
            Ok(Value::Boolean(true))
        }
    }
}

async fn evaluate_unary(ctx: &Rc<Context>, scope: &Rc<Scope>, op: UnaryOp, argument: &Expr) -> EvalResult<Value> {
    match op {
        UnaryOp::Delete => return evaluate_delete(ctx, scope, argument).await,
        UnaryOp::TypeOf => {
            if let ExprKind::Identifier(name) = &argument.kind
                && scope.resolve(name).is_none()
                && !has_property(ctx, &ctx.realm.global_object, &PropertyKey::from(name.clone()))?
            {
                return Ok(Value::from("undefined"));
            }
            let v = evaluate_expr(ctx, scope, argument).await?;
            return Ok(Value::from(type_of(&v)));
        }
        _ => {}
    }
    let v = evaluate_expr(ctx, scope, argument).await?;
    Ok(match op {
        UnaryOp::Minus => Value::Number(-to_number(ctx, &v)?),
        UnaryOp::Plus => Value::Number(to_number(ctx, &v)?),
        UnaryOp::Not => Value::Boolean(!to_boolean(&v)),
        UnaryOp::BitNot => Value::Number(!to_int32(ctx, &v)? as f64),
        UnaryOp::Void => Value::Undefined,
        UnaryOp::TypeOf | UnaryOp::Delete => Value::Undefined,
    })
}

async fn evaluate_update(ctx: &Rc<Context>, scope: &Rc<Scope>, increment: bool, prefix: bool, target: &Expr) -> EvalResult<Value> {
    let reference = evaluate_reference(ctx, scope, target).await?;
    let old = to_number(ctx, &get_reference_value(ctx, scope, &reference)?)?;
    let new = if increment { old + 1.0 } else { old - 1.0 };
    put_reference_value(ctx, scope, &reference, Value::Number(new))?;
    Ok(Value::Number(if prefix { new } else { old }))
}

async fn evaluate_assign(ctx: &Rc<Context>, scope: &Rc<Scope>, target: &Pattern, value: &Expr) -> EvalResult<Value> {
    match target {
        Pattern::Identifier { name, .. } => {
            let v = evaluate_named(ctx, scope, value, name).await?;
            assign_identifier(ctx, scope, name, v.clone())?;
            Ok(v)
        }
        Pattern::Expression(target) => {
            let reference = evaluate_reference(ctx, scope, target).await?;
            let v = evaluate_expr(ctx, scope, value).await?;
            put_reference_value(ctx, scope, &reference, v.clone())?;
            Ok(v)
        }
        pattern => {
            let v = evaluate_expr(ctx, scope, value).await?;
            bind_pattern(ctx, scope, pattern, v.clone(), BindingMode::Assign).await?;
            Ok(v)
        }
    }
}

/// `a op= b`; logical forms evaluate `b` only when they assign.
async fn evaluate_compound_assign(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    op: crate::core::token::AssignOp,
    target: &Expr,
    value: &Expr,
) -> EvalResult<Value> {
    let reference = evaluate_reference(ctx, scope, target).await?;
    let current = get_reference_value(ctx, scope, &reference)?;
    if let Some(logical) = LogicalOp::from_assign(op) {
        let short_circuit = match logical {
            LogicalOp::And => !to_boolean(&current),
            LogicalOp::Or => to_boolean(&current),
            LogicalOp::Nullish => !current.is_nullish(),
        };
        if short_circuit {
            return Ok(current);
        }
        let v = match &reference {
            Reference::Binding(name) => evaluate_named(ctx, scope, value, name).await?,
            _ => evaluate_expr(ctx, scope, value).await?,
        };
        put_reference_value(ctx, scope, &reference, v.clone())?;
        return Ok(v);
    }
    let Some(binary) = BinaryOp::from_assign(op) else {
        return Err(crate::raise_internal_error!("unknown assignment operator").into());
    };
    let rhs = evaluate_expr(ctx, scope, value).await?;
    let result = apply_binary(ctx, binary, &current, &rhs)?;
    put_reference_value(ctx, scope, &reference, result.clone())?;
    Ok(result)
}

// ---------------------------------------------------------------------------
// Dispatch

/// Evaluates an expression to a value.
pub fn evaluate_expr<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, expr: &'a Expr) -> LocalBoxFuture<'a, EvalResult<Value>> {
    async move {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::BigInt(_) => Err(raise_unsupported!("BigInt literals").into()),
            ExprKind::RegExp { .. } => Err(raise_unsupported!("regular expression literals").into()),
            ExprKind::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    match &quasi.cooked {
                        Some(s) => out.push_str(s),
                        None => return Err(raise_syntax_error!(expr.span, "Invalid escape sequence in template").into()),
                    }
                    if let Some(e) = exprs.get(i) {
                        let v = evaluate_expr(ctx, scope, e).await?;
                        out.push_str(&to_string(ctx, &v)?);
                    }
                }
                Ok(Value::from(out))
            }
            ExprKind::TaggedTemplate { tag, quasis, exprs } => evaluate_tagged_template(ctx, scope, tag, quasis, exprs).await,
            ExprKind::Identifier(name) => read_identifier(ctx, scope, name),
            ExprKind::This => resolve_this(scope),
            ExprKind::NewTarget => Ok(scope
                .this_scope()
                .function_frame()
                .map(|f| f.new_target.clone())
                .unwrap_or_default()),
            ExprKind::Array(elements) => evaluate_array_literal(ctx, scope, elements).await,
            ExprKind::Object(members) => evaluate_object_literal(ctx, scope, members).await,
            ExprKind::Function(node) => Ok(Value::Object(evaluate_function_expression(ctx, scope, node, None))),
            ExprKind::Class(node) => {
                let name = node.name.clone().unwrap_or_else(|| "".into());
                Ok(Value::Object(crate::js_class::evaluate_class(ctx, scope, node, name).await?))
            }
            ExprKind::Unary { op, argument } => evaluate_unary(ctx, scope, *op, argument).await,
            ExprKind::Update { increment, prefix, target } => evaluate_update(ctx, scope, *increment, *prefix, target).await,
            ExprKind::Binary { op, left, right } => {
                let l = evaluate_expr(ctx, scope, left).await?;
                let r = evaluate_expr(ctx, scope, right).await?;
                apply_binary(ctx, *op, &l, &r)
            }
            ExprKind::Logical { op, left, right } => {
                let l = evaluate_expr(ctx, scope, left).await?;
                let take_left = match op {
                    LogicalOp::And => !to_boolean(&l),
                    LogicalOp::Or => to_boolean(&l),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if take_left { Ok(l) } else { evaluate_expr(ctx, scope, right).await }
            }
            ExprKind::PrivateIn { name, object } => {
                let name = private_name(scope, name, expr)?;
                let target = evaluate_expr(ctx, scope, object).await?;
                let Value::Object(obj) = &target else {
                    return Err(raise_type_error!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        name.description,
                        primitive_to_string(&target)
                    )
                    .into());
                };
                Ok(Value::Boolean(ctx.metadata.has_private(obj, &name)))
            }
            ExprKind::Assign { target, value } => evaluate_assign(ctx, scope, target, value).await,
            ExprKind::CompoundAssign { op, target, value } => evaluate_compound_assign(ctx, scope, *op, target, value).await,
            ExprKind::Conditional { test, consequent, alternate } => {
                let t = evaluate_expr(ctx, scope, test).await?;
                let branch = if to_boolean(&t) { consequent } else { alternate };
                evaluate_expr(ctx, scope, branch).await
            }
            ExprKind::Member { .. } | ExprKind::SuperMember { .. } | ExprKind::Call { .. } => {
                Ok(evaluate_chain(ctx, scope, expr).await?.map(|(v, _)| v).unwrap_or_default())
            }
            ExprKind::OptionalChain(inner) => Ok(evaluate_chain(ctx, scope, inner).await?.map(|(v, _)| v).unwrap_or_default()),
            ExprKind::SuperCall { arguments } => {
                let args = evaluate_arguments(ctx, scope, arguments).await?;
                ctx.at(expr.span);
                crate::js_class::super_call(ctx, scope, &args)
            }
            ExprKind::New { callee, arguments } => {
                let func = evaluate_expr(ctx, scope, callee).await?;
                let args = evaluate_arguments(ctx, scope, arguments).await?;
                if !func.is_constructor() {
                    return Err(not_callable(ctx, callee, "constructor").into());
                }
                ctx.at(expr.span);
                construct(ctx, &func, &args, &func)
            }
            ExprKind::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for e in exprs {
                    last = evaluate_expr(ctx, scope, e).await?;
                }
                Ok(last)
            }
            ExprKind::Await(argument) => {
                let v = evaluate_expr(ctx, scope, argument).await?;
                let resolved = await_value(ctx, v)?.await;
                ctx.check_interrupts()?;
                resolved
            }
            ExprKind::Yield { .. } => Err(raise_unsupported!("generator functions").into()),
        }
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::exponentiate;

    #[test]
    fn exponent_edge_cases() {
        assert!(exponentiate(1.0, f64::NAN).is_nan());
        assert!(exponentiate(-1.0, f64::INFINITY).is_nan());
        assert_eq!(exponentiate(2.0, 10.0), 1024.0);
        assert_eq!(exponentiate(f64::NAN, 0.0), 1.0);
    }
}
