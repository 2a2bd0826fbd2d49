use crate::core::callable::Closure;
use crate::core::context::Context;
use crate::core::js_error::{EvalResult, on_frame_exit};
use crate::core::scope::Scope;
use crate::core::value::{JSObjectDataPtr, Value};
use crate::js_function::closure_frame;
use crate::js_promise::{new_promise, settle_from_result};
use futures::FutureExt;
use std::rc::Rc;

/// Calls an async function: runs its body as an executor task up to the
/// first suspension and returns the promise the body settles.
pub fn start_async_function(
    ctx: &Rc<Context>,
    func: &JSObjectDataPtr,
    closure: &Rc<Closure>,
    scope: Rc<Scope>,
    args: Vec<Value>,
) -> EvalResult<Value> {
    let promise = new_promise(ctx);
    let frame = closure_frame(func, closure);
    let body = {
        let ctx = ctx.clone();
        let func = func.clone();
        let closure = closure.clone();
        let promise = promise.clone();
        async move {
            let result = crate::core::eval::evaluate_function_body(&ctx, &scope, &closure, &func, &args).await;
            // Stamp while the task's frame is still live.
            let result = result.map_err(|e| on_frame_exit(&ctx, e));
            if let Err(fatal) = settle_from_result(&ctx, &promise, result) {
                ctx.realm.set_fatal(fatal);
            }
        }
    };
    ctx.realm.executor.spawn_now(&ctx.realm, frame, body.boxed_local())?;
    if let Some(fatal) = ctx.realm.take_fatal() {
        return Err(fatal.into());
    }
    Ok(Value::Object(promise))
}
