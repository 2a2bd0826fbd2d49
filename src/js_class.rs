//! Class definition evaluation, `super` and private names.

use crate::core::context::Context;
use crate::core::descriptor::PropertyDescriptor;
use crate::core::expr::{Argument, ClassElement, ClassNode, Expr, ExprKind, FunctionBody, FunctionKind, FunctionNode, MethodKind, Param, Pattern, PropertyName};
use crate::core::expression::{evaluate_expr, evaluate_property_name, resolve_this};
use crate::core::js_error::EvalResult;
use crate::core::metadata::{ClassKind, FieldKey, FunctionMetadata, InstanceElement, PrivateElement, PrivateName};
use crate::core::property::{create_data_property_or_throw, define_property_or_throw, get_property, get_prototype_of};
use crate::core::property_key::PropertyKey;
use crate::core::scope::{BindingKind, Scope};
use crate::core::statement::{Statement, StatementKind};
use crate::core::value::{JSObjectDataPtr, Value, is_constructor, new_object};
use crate::core::conversion::value_description;
use crate::js_function::{call_function, construct, create_closure, create_function, define_method_property, function_metadata, function_name_of, set_function_name};
use crate::{raise_reference_error, raise_syntax_error, raise_type_error};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Static fields and blocks, run once the class binding is initialized.
enum StaticElement {
    Field { key: FieldKey, initializer: Option<Value> },
    Block(Value),
}

/// `constructor() {}` or `constructor(...args) { super(...args); }`.
fn default_constructor(node: &ClassNode, derived: bool) -> Rc<FunctionNode> {
    let span = node.span;
    let (params, body, kind) = if derived {
        let args: Rc<str> = "args".into();
        let call = Expr::new(
            ExprKind::SuperCall {
                arguments: vec![Argument::Spread(Expr::new(ExprKind::Identifier(args.clone()), span))],
            },
            span,
        );
        let params = vec![Param {
            pattern: Pattern::Identifier { name: args, span },
            rest: true,
        }];
        (params, vec![Statement::new(StatementKind::Expr(call), span)], FunctionKind::DerivedConstructor)
    } else {
        (Vec::new(), Vec::new(), FunctionKind::ClassConstructor)
    };
    Rc::new(FunctionNode {
        name: node.name.clone(),
        params,
        body: FunctionBody::Block(body),
        kind,
        is_async: false,
        is_generator: false,
        strict: true,
        span,
    })
}

/// Rejects a private name declared twice, except for a getter/setter pair.
fn check_private_names(node: &ClassNode) -> Result<(), crate::JSError> {
    // name -> (is_static, has getter, has setter, other)
    let mut seen: HashMap<&str, (bool, bool, bool, bool)> = HashMap::new();
    for element in &node.elements {
        let (name, is_static, kind, span) = match element {
            ClassElement::Method {
                key: PropertyName::Private(n),
                kind,
                is_static,
                function,
            } => (n, *is_static, Some(*kind), function.span),
            ClassElement::Field {
                key: PropertyName::Private(n),
                is_static,
                span,
                ..
            } => (n, *is_static, None, *span),
            _ => continue,
        };
        let entry = seen.entry(&**name).or_insert((is_static, false, false, false));
        let clash = entry.0 != is_static
            || entry.3
            || match kind {
                Some(MethodKind::Getter) => entry.1,
                Some(MethodKind::Setter) => entry.2,
                _ => entry.1 || entry.2,
            };
        if clash {
            return Err(raise_syntax_error!(span, "Identifier '#{name}' has already been declared"));
        }
        match kind {
            Some(MethodKind::Getter) => entry.1 = true,
            Some(MethodKind::Setter) => entry.2 = true,
            _ => entry.3 = true,
        }
    }
    Ok(())
}

/// Merges a private accessor half into what is already known for `name`.
fn merge_private(existing: Option<PrivateElement>, kind: MethodKind, func: Value) -> PrivateElement {
    match (kind, existing) {
        (MethodKind::Method, _) => PrivateElement::Method(func),
        (MethodKind::Getter, Some(PrivateElement::Accessor { set, .. })) => PrivateElement::Accessor { get: Some(func), set },
        (MethodKind::Setter, Some(PrivateElement::Accessor { get, .. })) => PrivateElement::Accessor { get, set: Some(func) },
        (MethodKind::Getter, _) => PrivateElement::Accessor { get: Some(func), set: None },
        (MethodKind::Setter, _) => PrivateElement::Accessor { get: None, set: Some(func) },
    }
}

fn define_accessor(ctx: &Rc<Context>, target: &JSObjectDataPtr, key: &PropertyKey, kind: MethodKind, func: Value) -> EvalResult<()> {
    let desc = match kind {
        MethodKind::Getter => PropertyDescriptor {
            get: Some(func),
            enumerable: Some(false),
            configurable: Some(true),
            ..Default::default()
        },
        _ => PropertyDescriptor {
            set: Some(func),
            enumerable: Some(false),
            configurable: Some(true),
            ..Default::default()
        },
    };
    define_property_or_throw(ctx, target, key, desc)
}

/// `ClassDefinitionEvaluation`: builds the constructor, its prototype and
/// every element, then runs static initializers in order.
pub fn evaluate_class<'a>(
    ctx: &'a Rc<Context>,
    scope: &'a Rc<Scope>,
    node: &'a Rc<ClassNode>,
    name: Rc<str>,
) -> LocalBoxFuture<'a, EvalResult<JSObjectDataPtr>> {
    async move {
        let ctx = &ctx.with_strict(true);
        let intrinsics = &ctx.realm.intrinsics;
        check_private_names(node)?;
        let class_scope = Scope::new_block(scope);
        if let Some(own) = &node.name {
            class_scope.set_binding(own, BindingKind::Const, None);
        }
        for element in &node.elements {
            if let ClassElement::Method { key: PropertyName::Private(n), .. } | ClassElement::Field { key: PropertyName::Private(n), .. } = element {
                class_scope.declare_private_name(n);
            }
        }

        let (proto_parent, ctor_parent, derived) = match &node.heritage {
            None => (Some(intrinsics.object_prototype.clone()), intrinsics.function_prototype.clone(), false),
            Some(heritage) => match evaluate_expr(ctx, &class_scope, heritage).await? {
                Value::Null => (None, intrinsics.function_prototype.clone(), true),
                Value::Object(parent_obj) if is_constructor(&parent_obj) => {
                    let parent = Value::Object(parent_obj.clone());
                    let proto_parent = match get_property(ctx, &parent_obj, &"prototype".into(), &parent)? {
                        Value::Object(p) => Some(p),
                        Value::Null => None,
                        other => {
                            return Err(raise_type_error!("Class extends value does not have valid prototype property {}", value_description(&other)).into());
                        }
                    };
                    (proto_parent, parent_obj.clone(), true)
                }
                other => return Err(raise_type_error!("Class extends value {} is not a constructor or null", value_description(&other)).into()),
            },
        };
        let proto = new_object(proto_parent.as_ref());

        let ctor_node = match &node.constructor {
            Some(c) => c.clone(),
            None => default_constructor(node, derived),
        };
        let base_meta = function_metadata(ctx, &ctor_node);
        let meta = FunctionMetadata {
            source_text: ctx.source.slice(node.span).into(),
            constructable: true,
            class_kind: Some(if derived { ClassKind::Derived } else { ClassKind::Base }),
            home_object: RefCell::new(Some(proto.clone())),
            ..base_meta
        };
        let ctor = create_closure(ctx, &ctor_node, &class_scope, meta, &name);
        {
            let mut c = ctor.borrow_mut();
            c.prototype = Some(ctor_parent);
            c.insert_data("prototype", Value::Object(proto.clone()), false, false, false);
        }
        proto.borrow_mut().insert_builtin("constructor", Value::Object(ctor.clone()));
        let Some(ctor_meta) = ctx.metadata.function_metadata(&ctor) else {
            return Err(crate::raise_internal_error!("class constructor without metadata").into());
        };

        let mut statics: Vec<StaticElement> = Vec::new();
        let mut instance: Vec<InstanceElement> = Vec::new();
        for element in &node.elements {
            match element {
                ClassElement::Method {
                    key,
                    kind,
                    is_static,
                    function,
                } => {
                    let target = if *is_static { &ctor } else { &proto };
                    let func = create_function(ctx, function, &class_scope, "", Some(target));
                    let prefix = match kind {
                        MethodKind::Method => None,
                        MethodKind::Getter => Some("get"),
                        MethodKind::Setter => Some("set"),
                    };
                    if let PropertyName::Private(n) = key {
                        let private = class_scope.declare_private_name(n);
                        set_function_name(&func, &PropertyKey::from(private.description.clone()), prefix);
                        let func = Value::Object(func);
                        if *is_static {
                            let element = merge_private(ctx.metadata.private_element(&ctor, &private), *kind, func);
                            ctx.metadata.put_private(&ctor, &private, element);
                        } else {
                            let existing = instance.iter_mut().find_map(|e| match e {
                                InstanceElement::PrivateMethod { name, element } if name.id == private.id => Some(element),
                                _ => None,
                            });
                            match existing {
                                Some(slot) => *slot = merge_private(Some(slot.clone()), *kind, func),
                                None => instance.push(InstanceElement::PrivateMethod {
                                    name: private,
                                    element: merge_private(None, *kind, func),
                                }),
                            }
                        }
                        continue;
                    }
                    let key = evaluate_property_name(ctx, &class_scope, key).await?;
                    set_function_name(&func, &key, prefix);
                    match kind {
                        MethodKind::Method => define_method_property(ctx, target, &key, &func, false)?,
                        _ => define_accessor(ctx, target, &key, *kind, Value::Object(func))?,
                    }
                }
                ClassElement::Field {
                    key,
                    is_static,
                    initializer,
                    ..
                } => {
                    let key = match key {
                        PropertyName::Private(n) => FieldKey::Private(class_scope.declare_private_name(n)),
                        other => FieldKey::Public(evaluate_property_name(ctx, &class_scope, other).await?),
                    };
                    let home = if *is_static { &ctor } else { &proto };
                    let initializer = initializer
                        .as_ref()
                        .map(|f| Value::Object(create_function(ctx, f, &class_scope, "", Some(home))));
                    if *is_static {
                        statics.push(StaticElement::Field { key, initializer });
                    } else {
                        instance.push(InstanceElement::Field { key, initializer });
                    }
                }
                ClassElement::StaticBlock(block) => {
                    let func = create_function(ctx, block, &class_scope, "", Some(&ctor));
                    statics.push(StaticElement::Block(Value::Object(func)));
                }
            }
        }
        *ctor_meta.instance_elements.borrow_mut() = instance;
        if let Some(own) = &node.name {
            class_scope.initialize(own, Value::Object(ctor.clone()));
        }

        let ctor_value = Value::Object(ctor.clone());
        for element in statics {
            match element {
                StaticElement::Block(func) => {
                    call_function(ctx, &func, &ctor_value, &[])?;
                }
                StaticElement::Field { key, initializer } => {
                    let value = match &initializer {
                        Some(f) => call_function(ctx, f, &ctor_value, &[])?,
                        None => Value::Undefined,
                    };
                    define_field(ctx, &ctor, &key, value)?;
                }
            }
        }
        log::debug!("defined class '{name}' #{}", ctor.borrow().id);
        Ok(ctor)
    }
    .boxed_local()
}

fn define_field(ctx: &Rc<Context>, target: &JSObjectDataPtr, key: &FieldKey, value: Value) -> EvalResult<()> {
    match key {
        FieldKey::Public(key) => create_data_property_or_throw(ctx, target, key, value),
        FieldKey::Private(name) => {
            ctx.check_object_write(target, "private field definition")?;
            if !ctx.metadata.add_private(target, name, PrivateElement::Field(value)) {
                return Err(raise_type_error!("Cannot initialize {} twice on the same object", name.description).into());
            }
            Ok(())
        }
    }
}

/// Installs private methods, then runs field initializers, on a freshly
/// bound `this`.
pub fn initialize_instance_elements(ctx: &Rc<Context>, this_obj: &JSObjectDataPtr, func: &JSObjectDataPtr) -> EvalResult<()> {
    let meta = {
        let f = func.borrow();
        match f.callable().and_then(|c| c.as_closure()) {
            Some(closure) => closure.meta.clone(),
            None => return Ok(()),
        }
    };
    let elements = meta.instance_elements.borrow().clone();
    if elements.is_empty() {
        return Ok(());
    }
    for element in &elements {
        if let InstanceElement::PrivateMethod { name, element } = element {
            ctx.check_object_write(this_obj, "private method definition")?;
            if !ctx.metadata.add_private(this_obj, name, element.clone()) {
                let class_name = function_name_of(func);
                return Err(raise_type_error!("Cannot initialize private methods of class {class_name} twice on the same object").into());
            }
        }
    }
    let this = Value::Object(this_obj.clone());
    for element in &elements {
        if let InstanceElement::Field { key, initializer } = element {
            let value = match initializer {
                Some(f) => call_function(ctx, f, &this, &[])?,
                None => Value::Undefined,
            };
            define_field(ctx, this_obj, key, value)?;
        }
    }
    Ok(())
}

/// `super(...args)`: constructs through the parent and binds `this`.
pub fn super_call(ctx: &Rc<Context>, scope: &Rc<Scope>, args: &[Value]) -> EvalResult<Value> {
    let this_scope = scope.this_scope();
    let Some(frame) = this_scope.function_frame() else {
        return Err(raise_reference_error!("'super' keyword unexpected here").into());
    };
    let Some(func) = &frame.function else {
        return Err(raise_reference_error!("'super' keyword unexpected here").into());
    };
    let parent = get_prototype_of(ctx, func)?;
    let parent = match parent {
        Some(p) if is_constructor(&p) => Value::Object(p),
        other => {
            let shown = other.map(|p| value_description(&Value::Object(p))).unwrap_or_else(|| "null".into());
            return Err(raise_type_error!("Super constructor {shown} of anonymous class is not a constructor").into());
        }
    };
    let result = construct(ctx, &parent, args, &frame.new_target)?;
    let Value::Object(this_obj) = &result else {
        return Err(crate::raise_internal_error!("super constructor returned a primitive").into());
    };
    if frame.this.borrow().is_some() {
        return Err(raise_reference_error!("Super constructor may only be called once").into());
    }
    *frame.this.borrow_mut() = Some(result.clone());
    initialize_instance_elements(ctx, this_obj, func)?;
    Ok(result)
}

/// Base object and receiver of `super.x` in the current method.
pub fn super_base(scope: &Rc<Scope>) -> EvalResult<(Value, Value)> {
    let this_scope = scope.this_scope();
    let home = this_scope.function_frame().and_then(|f| f.home_object.clone());
    let Some(home) = home else {
        return Err(raise_reference_error!("'super' keyword unexpected here").into());
    };
    let this = resolve_this(scope)?;
    let base = match home.borrow().prototype.clone() {
        Some(p) => Value::Object(p),
        None => Value::Null,
    };
    Ok((base, this))
}

fn private_target<'v>(base: &'v Value, name: &PrivateName, verb: &str, preposition: &str) -> EvalResult<&'v JSObjectDataPtr> {
    match base {
        Value::Object(obj) => Ok(obj),
        _ => Err(raise_type_error!(
            "Cannot {verb} private member {} {preposition} an object whose class did not declare it",
            name.description
        )
        .into()),
    }
}

/// Reads `base.#name`.
pub fn private_get(ctx: &Rc<Context>, base: &Value, name: &PrivateName) -> EvalResult<Value> {
    let obj = private_target(base, name, "read", "from")?;
    match ctx.metadata.private_element(obj, name) {
        Some(PrivateElement::Field(v)) | Some(PrivateElement::Method(v)) => Ok(v),
        Some(PrivateElement::Accessor { get: Some(getter), .. }) => call_function(ctx, &getter, base, &[]),
        Some(PrivateElement::Accessor { get: None, .. }) => Err(raise_type_error!("'{}' was defined without a getter", name.description).into()),
        None => Err(raise_type_error!(
            "Cannot read private member {} from an object whose class did not declare it",
            name.description
        )
        .into()),
    }
}

/// Writes `base.#name = value`.
pub fn private_set(ctx: &Rc<Context>, base: &Value, name: &PrivateName, value: Value) -> EvalResult<()> {
    let obj = private_target(base, name, "write", "to")?;
    match ctx.metadata.private_element(obj, name) {
        Some(PrivateElement::Field(_)) => {
            ctx.check_object_write(obj, "private field assignment")?;
            ctx.metadata.set_private_field(obj, name, value);
            Ok(())
        }
        Some(PrivateElement::Method(_)) => Err(raise_type_error!("Private method '{}' is not writable", name.description).into()),
        Some(PrivateElement::Accessor { set: Some(setter), .. }) => {
            call_function(ctx, &setter, base, &[value])?;
            Ok(())
        }
        Some(PrivateElement::Accessor { set: None, .. }) => Err(raise_type_error!("'{}' was defined without a setter", name.description).into()),
        None => Err(raise_type_error!(
            "Cannot write private member {} to an object whose class did not declare it",
            name.description
        )
        .into()),
    }
}
