use crate::core::conversion::value_description;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, new_object_with_kind};
use crate::js_function::{arg, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::raise_type_error;
use std::rc::Rc;

pub fn initialize_weakref(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.weak_ref_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "WeakRef",
        1,
        |_ctx, _this, _args| Err(raise_type_error!("Constructor WeakRef requires 'new'").into()),
        |ctx, args, new_target| {
            let target = match arg(args, 0) {
                Value::Object(target) => target,
                other => return Err(raise_type_error!("WeakRef: invalid target {}", value_description(&other)).into()),
            };
            let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.weak_ref_prototype)?;
            Ok(Value::Object(new_object_with_kind(Some(&proto), ObjectKind::WeakRef(Rc::downgrade(&target)))))
        },
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, proto, "deref", 0, |_ctx, this, _args| {
        if let Value::Object(o) = this
            && let ObjectKind::WeakRef(target) = &o.borrow().kind
        {
            return Ok(target.upgrade().map(Value::Object).unwrap_or_default());
        }
        Err(raise_type_error!("WeakRef.prototype.deref: 'this' is not a WeakRef").into())
    });
    proto
        .borrow_mut()
        .insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("WeakRef"), false, false, true);

    global.borrow_mut().insert_builtin("WeakRef", Value::Object(ctor));
}
