//! Statement evaluation, declaration hoisting and function activation.
//!
//! Every routine returns a boxed local future. Code that never reaches an
//! `await` completes on the first poll, which is how plain function calls
//! run their bodies synchronously with `now_or_never`.

use crate::core::callable::Closure;
use crate::core::context::Context;
use crate::core::conversion::to_object;
use crate::core::descriptor::PropertyDescriptor;
use crate::core::expr::{FunctionBody, FunctionNode, Pattern};
use crate::core::expression::{evaluate_expr, evaluate_named};
use crate::core::js_error::{EvalError, EvalResult, into_thrown_value};
use crate::core::pattern::{BindingMode, bind_pattern};
use crate::core::property::{define_property_or_throw, get_own_property, get_property, has_property, peek_property, put_value};
use crate::core::property_key::PropertyKey;
use crate::core::scope::{BindingKind, BindingRead, Scope};
use crate::core::statement::{CatchClause, ForHead, ForInit, Program, Statement, StatementKind, SwitchCase, VarDeclaration, VarKind};
use crate::core::token::Span;
use crate::core::trampoline::await_value;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, new_object_with_kind, strict_equals, to_boolean};
use crate::js_array::create_array;
use crate::js_function::{MappedArguments, arg, create_function, new_native_function};
use crate::js_iterator::{IteratorRecord, get_iterator};
use crate::{JSError, raise_type_error, raise_unsupported};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::rc::Rc;

/// Completion of a statement. Throws travel as `Err`.
#[derive(Clone, Debug)]
pub enum ControlFlow {
    /// `None` is the empty completion value.
    Normal(Option<Value>),
    Return(Value),
    Break(Option<Rc<str>>, Option<Value>),
    Continue(Option<Rc<str>>, Option<Value>),
}

impl ControlFlow {
    fn value(&self) -> Option<&Value> {
        match self {
            ControlFlow::Normal(v) | ControlFlow::Break(_, v) | ControlFlow::Continue(_, v) => v.as_ref(),
            ControlFlow::Return(v) => Some(v),
        }
    }

    /// `UpdateEmpty(completion, value)`.
    fn update_empty(self, value: Option<Value>) -> ControlFlow {
        match self {
            ControlFlow::Normal(None) => ControlFlow::Normal(value),
            ControlFlow::Break(l, None) => ControlFlow::Break(l, value),
            ControlFlow::Continue(l, None) => ControlFlow::Continue(l, value),
            other => other,
        }
    }
}

/// `LoopContinues`: whether a body completion lets the loop go on.
fn loop_continues(completion: &ControlFlow, labels: &[Rc<str>]) -> bool {
    match completion {
        ControlFlow::Normal(_) | ControlFlow::Continue(None, _) => true,
        ControlFlow::Continue(Some(label), _) => labels.contains(label),
        _ => false,
    }
}

/// Result of a loop that stopped because its body completed abruptly.
fn loop_exit(completion: ControlFlow, last: Option<Value>) -> ControlFlow {
    match completion {
        ControlFlow::Break(None, v) => ControlFlow::Normal(v.or(last).or(Some(Value::Undefined))),
        other => other.update_empty(last),
    }
}

fn redeclared_at(err: JSError, span: Span) -> JSError {
    match err {
        JSError::SyntaxError { message, .. } => JSError::SyntaxError {
            message,
            line: span.line,
            column: span.column,
        },
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Declaration collection

fn var_declared_names(stmt: &Statement, out: &mut Vec<Rc<str>>) {
    match &stmt.kind {
        StatementKind::VarDecl(decl) if decl.kind == VarKind::Var => {
            for d in &decl.declarations {
                d.target.bound_names(out);
            }
        }
        StatementKind::If { consequent, alternate, .. } => {
            var_declared_names(consequent, out);
            if let Some(alt) = alternate {
                var_declared_names(alt, out);
            }
        }
        StatementKind::For { init, body, .. } => {
            if let Some(ForInit::Declaration(decl)) = init
                && decl.kind == VarKind::Var
            {
                for d in &decl.declarations {
                    d.target.bound_names(out);
                }
            }
            var_declared_names(body, out);
        }
        StatementKind::ForIn { head, body, .. } | StatementKind::ForOf { head, body, .. } => {
            if let ForHead::Declaration(VarKind::Var, p) = head {
                p.bound_names(out);
            }
            var_declared_names(body, out);
        }
        StatementKind::While { body, .. } | StatementKind::DoWhile { body, .. } | StatementKind::Labeled { body, .. } => {
            var_declared_names(body, out)
        }
        StatementKind::Block(stmts) => stmts.iter().for_each(|s| var_declared_names(s, out)),
        StatementKind::Switch { cases, .. } => cases.iter().flat_map(|c| &c.body).for_each(|s| var_declared_names(s, out)),
        StatementKind::Try { block, handler, finalizer } => {
            block.iter().for_each(|s| var_declared_names(s, out));
            if let Some(h) = handler {
                h.body.iter().for_each(|s| var_declared_names(s, out));
            }
            if let Some(f) = finalizer {
                f.iter().for_each(|s| var_declared_names(s, out));
            }
        }
        _ => {}
    }
}

/// Function declarations directly in a statement list, looking through labels.
fn direct_functions<'s>(stmts: impl IntoIterator<Item = &'s Statement>) -> Vec<&'s Rc<FunctionNode>> {
    fn visit<'s>(stmt: &'s Statement, out: &mut Vec<&'s Rc<FunctionNode>>) {
        match &stmt.kind {
            StatementKind::FunctionDecl(f) => out.push(f),
            StatementKind::Labeled { body, .. } => visit(body, out),
            _ => {}
        }
    }
    let mut out = Vec::new();
    for stmt in stmts {
        visit(stmt, &mut out);
    }
    out
}

/// `let`, `const` and `class` names declared directly in a statement list.
fn lexical_declarations<'s>(stmts: impl IntoIterator<Item = &'s Statement>) -> Vec<(Rc<str>, BindingKind, Span)> {
    let mut out = Vec::new();
    for stmt in stmts {
        match &stmt.kind {
            StatementKind::VarDecl(decl) if decl.kind != VarKind::Var => {
                let kind = if decl.kind == VarKind::Const { BindingKind::Const } else { BindingKind::Let };
                let mut names = Vec::new();
                for d in &decl.declarations {
                    d.target.bound_names(&mut names);
                }
                out.extend(names.into_iter().map(|n| (n, kind, stmt.span)));
            }
            StatementKind::ClassDecl(class) => {
                if let Some(name) = &class.name {
                    out.push((name.clone(), BindingKind::Class, stmt.span));
                }
            }
            _ => {}
        }
    }
    out
}

/// Names of functions declared inside nested blocks, which sloppy code also
/// exposes as `var` bindings of the enclosing function.
fn nested_block_functions(stmt: &Statement, top_level: bool, out: &mut Vec<Rc<str>>) {
    match &stmt.kind {
        StatementKind::FunctionDecl(f) if !top_level => {
            if let Some(name) = &f.name {
                out.push(name.clone());
            }
        }
        StatementKind::Labeled { body, .. } => nested_block_functions(body, top_level, out),
        StatementKind::If { consequent, alternate, .. } => {
            nested_block_functions(consequent, false, out);
            if let Some(alt) = alternate {
                nested_block_functions(alt, false, out);
            }
        }
        StatementKind::For { body, .. }
        | StatementKind::ForIn { body, .. }
        | StatementKind::ForOf { body, .. }
        | StatementKind::While { body, .. }
        | StatementKind::DoWhile { body, .. } => nested_block_functions(body, false, out),
        StatementKind::Block(stmts) => stmts.iter().for_each(|s| nested_block_functions(s, false, out)),
        StatementKind::Switch { cases, .. } => cases.iter().flat_map(|c| &c.body).for_each(|s| nested_block_functions(s, false, out)),
        StatementKind::Try { block, handler, finalizer } => {
            block.iter().for_each(|s| nested_block_functions(s, false, out));
            if let Some(h) = handler {
                h.body.iter().for_each(|s| nested_block_functions(s, false, out));
            }
            if let Some(f) = finalizer {
                f.iter().for_each(|s| nested_block_functions(s, false, out));
            }
        }
        _ => {}
    }
}

fn function_name(node: &FunctionNode) -> Rc<str> {
    node.name.clone().unwrap_or_else(|| "default".into())
}

// ---------------------------------------------------------------------------
// Hoisting

/// Declaration instantiation for a block body: lexical names enter their
/// dead zone and function declarations are created up front.
///
/// Returns the names of functions that sloppy code copies up to the
/// enclosing `var` binding when the block completes normally.
fn hoist_block<'s>(ctx: &Rc<Context>, scope: &Rc<Scope>, stmts: impl IntoIterator<Item = &'s Statement> + Clone) -> Result<Vec<Rc<str>>, JSError> {
    for (name, kind, span) in lexical_declarations(stmts.clone()) {
        scope.declare(&name, kind, None).map_err(|e| redeclared_at(e, span))?;
    }
    let mut functions: Vec<Rc<str>> = Vec::new();
    for node in direct_functions(stmts) {
        let name = function_name(node);
        if scope.has_own_binding(&name) && !functions.contains(&name) {
            return Err(redeclared_at(
                JSError::SyntaxError {
                    message: format!("Identifier '{name}' has already been declared"),
                    line: 0,
                    column: 0,
                },
                node.span,
            ));
        }
        let func = create_function(ctx, node, scope, &name, None);
        scope.set_binding(&name, BindingKind::Let, Some(Value::Object(func)));
        if !functions.contains(&name) {
            functions.push(name);
        }
    }
    if ctx.strict {
        functions.clear();
    }
    log::trace!("hoisted block scope #{} ({} function(s))", scope.id, functions.len());
    Ok(functions)
}

/// Mirrors block-level functions into their `var` binding once the block
/// has completed normally.
fn copy_up_block_functions(ctx: &Rc<Context>, block: &Rc<Scope>, names: &[Rc<str>]) -> EvalResult<()> {
    let Some(parent) = &block.parent else {
        return Ok(());
    };
    let var_scope = block.var_scope();
    for name in names {
        let Some(BindingRead::Value(value)) = block.read(name) else {
            continue;
        };
        match parent.resolve(name) {
            Some(target) if Rc::ptr_eq(&target, &var_scope) => {
                if target.own_binding(name).is_some_and(|b| !b.kind.is_lexical()) {
                    ctx.check_scope_write(&target, name)?;
                    target.write(name, value, false)?;
                }
            }
            None if var_scope.is_global() => {
                let global = Value::Object(ctx.realm.global_object.clone());
                put_value(ctx, &global, &PropertyKey::from(&**name), value, false)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Var-scoped declarations of a function body, program or dry-run scope
/// that keeps its bindings in the scope itself.
fn hoist_var_scope(ctx: &Rc<Context>, scope: &Rc<Scope>, stmts: &[Statement], reserved: &[Rc<str>]) -> Result<(), JSError> {
    let lexical = lexical_declarations(stmts);
    let mut vars = Vec::new();
    stmts.iter().for_each(|s| var_declared_names(s, &mut vars));
    for name in &vars {
        if lexical.iter().any(|(n, _, _)| n == name) {
            return Err(JSError::SyntaxError {
                message: format!("Identifier '{name}' has already been declared"),
                line: 0,
                column: 0,
            });
        }
        if !scope.has_own_binding(name) {
            scope.set_binding(name, BindingKind::Var, Some(Value::Undefined));
        }
    }
    if !ctx.strict {
        let mut nested = Vec::new();
        stmts.iter().for_each(|s| nested_block_functions(s, true, &mut nested));
        for name in nested {
            let shadowed = lexical.iter().any(|(n, _, _)| *n == name) || reserved.contains(&name);
            if !shadowed && !scope.has_own_binding(&name) {
                scope.set_binding(&name, BindingKind::Var, Some(Value::Undefined));
            }
        }
    }
    for node in direct_functions(stmts) {
        let name = function_name(node);
        let func = create_function(ctx, node, scope, &name, None);
        scope.set_binding(&name, BindingKind::Var, Some(Value::Object(func)));
    }
    for (name, kind, span) in lexical {
        scope.declare(&name, kind, None).map_err(|e| redeclared_at(e, span))?;
    }
    Ok(())
}

/// `GlobalDeclarationInstantiation`: `var` and function declarations become
/// properties of the global object, lexical ones bindings of the global scope.
fn hoist_global(ctx: &Rc<Context>, scope: &Rc<Scope>, stmts: &[Statement]) -> EvalResult<()> {
    let global = &ctx.realm.global_object;
    let lexical = lexical_declarations(stmts);
    let already_declared = |name: &str, span: Span| JSError::SyntaxError {
        message: format!("Identifier '{name}' has already been declared"),
        line: span.line,
        column: span.column,
    };
    for (name, _, span) in &lexical {
        if scope.has_own_binding(name) {
            return Err(already_declared(name, *span).into());
        }
        if let Some(existing) = get_own_property(ctx, global, &PropertyKey::from(&**name))?
            && !existing.configurable
        {
            return Err(already_declared(name, *span).into());
        }
    }
    let mut vars = Vec::new();
    stmts.iter().for_each(|s| var_declared_names(s, &mut vars));
    let functions = direct_functions(stmts);
    let function_names: Vec<Rc<str>> = functions.iter().map(|f| function_name(f)).collect();
    for name in vars.iter().chain(&function_names) {
        let lexically_bound = scope.own_binding(name).is_some_and(|b| b.kind.is_lexical()) || lexical.iter().any(|(n, _, _)| n == name);
        if lexically_bound {
            return Err(already_declared(name, Span::default()).into());
        }
    }
    let declare_var = |name: &str| -> EvalResult<()> {
        let key = PropertyKey::from(name);
        if get_own_property(ctx, global, &key)?.is_none() {
            define_property_or_throw(ctx, global, &key, PropertyDescriptor::new_data(Value::Undefined, true, true, false))?;
        }
        Ok(())
    };
    for name in &vars {
        declare_var(name)?;
    }
    if !ctx.strict {
        let mut nested = Vec::new();
        stmts.iter().for_each(|s| nested_block_functions(s, true, &mut nested));
        for name in nested {
            if !lexical.iter().any(|(n, _, _)| *n == name) && !scope.has_own_binding(&name) {
                declare_var(&name)?;
            }
        }
    }
    for node in functions {
        let name = function_name(node);
        let key = PropertyKey::from(&*name);
        let func = Value::Object(create_function(ctx, node, scope, &name, None));
        match get_own_property(ctx, global, &key)? {
            Some(existing) if !existing.configurable => put_value(ctx, &Value::Object(global.clone()), &key, func, true)?,
            _ => define_property_or_throw(ctx, global, &key, PropertyDescriptor::new_data(func, true, true, false))?,
        }
    }
    for (name, kind, span) in lexical {
        scope.declare(&name, kind, None).map_err(|e| redeclared_at(e, span))?;
    }
    log::debug!("global declaration instantiation: {} var(s)", vars.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Programs and function bodies

/// Evaluates a parsed script in `scope`, returning its completion value.
pub fn evaluate_program<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, program: &'a Program) -> LocalBoxFuture<'a, EvalResult<Value>> {
    async move {
        if scope.is_global() {
            hoist_global(ctx, scope, &program.body)?;
        } else {
            hoist_var_scope(ctx, scope, &program.body, &[])?;
        }
        let completion = evaluate_statements(ctx, scope, &program.body).await?;
        Ok(match completion {
            ControlFlow::Normal(v) => v.unwrap_or_default(),
            ControlFlow::Return(v) => v,
            ControlFlow::Break(..) | ControlFlow::Continue(..) => Value::Undefined,
        })
    }
    .boxed_local()
}

fn throw_type_error_accessor(ctx: &Rc<Context>) -> Value {
    Value::Object(new_native_function(&ctx.realm.intrinsics, "", 0, |_ctx, _this, _args| {
        Err(raise_type_error!(
            "'caller', 'callee', and 'arguments' properties may not be accessed on strict mode functions or the arguments objects for calls to them"
        )
        .into())
    }))
}

/// `CreateMappedArgumentsObject` / `CreateUnmappedArgumentsObject`.
fn create_arguments_object(ctx: &Rc<Context>, scope: &Rc<Scope>, func: &JSObjectDataPtr, node: &FunctionNode, args: &[Value]) -> JSObjectDataPtr {
    let mapped = !ctx.strict && node.has_simple_params();
    let mapping = mapped.then(|| {
        let mut names: Vec<Option<Rc<str>>> = vec![None; args.len()];
        for (i, param) in node.params.iter().enumerate().take(args.len()) {
            if let Pattern::Identifier { name, .. } = &param.pattern {
                // A repeated parameter name maps only its last position.
                names.iter_mut().filter(|n| n.as_deref() == Some(&**name)).for_each(|n| *n = None);
                names[i] = Some(name.clone());
            }
        }
        MappedArguments {
            scope: scope.clone(),
            names,
        }
    });
    let intrinsics = &ctx.realm.intrinsics;
    let obj = new_object_with_kind(Some(&intrinsics.object_prototype), ObjectKind::Arguments(mapping));
    {
        let mut o = obj.borrow_mut();
        for (i, v) in args.iter().enumerate() {
            o.insert_data(PropertyKey::from(i), v.clone(), true, true, true);
        }
        o.insert_builtin("length", Value::Number(args.len() as f64));
        if let Some(values) = peek_property(&intrinsics.array_prototype, &"values".into()) {
            o.insert_builtin(PropertyKey::from(&intrinsics.symbols.iterator), values);
        }
    }
    if mapped {
        obj.borrow_mut().insert_builtin("callee", Value::Object(func.clone()));
    } else {
        let thrower = throw_type_error_accessor(ctx);
        obj.borrow_mut().insert_accessor("callee", Some(thrower.clone()), Some(thrower), false, false);
    }
    obj
}

/// `FunctionDeclarationInstantiation` followed by the body.
pub fn evaluate_function_body<'a>(
    ctx: &'a Rc<Context>,
    scope: &'a Rc<Scope>,
    closure: &'a Rc<Closure>,
    func: &'a JSObjectDataPtr,
    args: &'a [Value],
) -> LocalBoxFuture<'a, EvalResult<Value>> {
    async move {
        let node = &closure.node;
        let mut param_names = Vec::new();
        for param in &node.params {
            param.pattern.bound_names(&mut param_names);
        }
        for name in &param_names {
            scope.set_binding(name, BindingKind::Parameter, None);
        }
        let body = node.body_statements();
        let arguments_name: Rc<str> = "arguments".into();
        let needs_arguments = !node.is_arrow()
            && !param_names.contains(&arguments_name)
            && !lexical_declarations(body).iter().any(|(n, _, _)| *n == arguments_name)
            && !direct_functions(body).iter().any(|f| f.name.as_ref() == Some(&arguments_name));
        if needs_arguments {
            let arguments = create_arguments_object(ctx, scope, func, node, args);
            scope.set_binding("arguments", BindingKind::Var, Some(Value::Object(arguments)));
        }
        if node.has_simple_params() {
            for (i, name) in param_names.iter().enumerate() {
                scope.initialize(name, arg(args, i));
            }
        } else {
            for (i, param) in node.params.iter().enumerate() {
                let value = if param.rest {
                    let rest = args.get(i..).map(<[Value]>::to_vec).unwrap_or_default();
                    Value::Object(create_array(&ctx.realm.intrinsics, rest))
                } else {
                    arg(args, i)
                };
                bind_pattern(ctx, scope, &param.pattern, value, BindingMode::Initialize).await?;
            }
        }
        match &node.body {
            FunctionBody::Expression(expr) => evaluate_expr(ctx, scope, expr).await,
            FunctionBody::Block(stmts) => {
                hoist_var_scope(ctx, scope, stmts, &param_names)?;
                match evaluate_statements(ctx, scope, stmts).await? {
                    ControlFlow::Return(v) => Ok(v),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }
    .boxed_local()
}

// ---------------------------------------------------------------------------
// Statements

/// Runs a statement list, keeping the last non-empty completion value.
pub fn evaluate_statements<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, stmts: &'a [Statement]) -> LocalBoxFuture<'a, EvalResult<ControlFlow>> {
    async move {
        let mut last: Option<Value> = None;
        for stmt in stmts {
            let completion = evaluate_statement(ctx, scope, stmt, &[]).await?;
            match completion {
                ControlFlow::Normal(v) => {
                    if v.is_some() {
                        last = v;
                    }
                }
                abrupt => return Ok(abrupt.update_empty(last)),
            }
        }
        Ok(ControlFlow::Normal(last))
    }
    .boxed_local()
}

/// A `{ ... }` body: its own scope when it declares anything lexically.
fn evaluate_block<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, stmts: &'a [Statement]) -> LocalBoxFuture<'a, EvalResult<ControlFlow>> {
    async move {
        let declares = stmts
            .iter()
            .any(|s| matches!(&s.kind, StatementKind::ClassDecl(_) | StatementKind::FunctionDecl(_) | StatementKind::Labeled { .. }) || matches!(&s.kind, StatementKind::VarDecl(d) if d.kind != VarKind::Var));
        if !declares {
            return evaluate_statements(ctx, scope, stmts).await;
        }
        let block = Scope::new_block(scope);
        let functions = hoist_block(ctx, &block, stmts)?;
        let completion = evaluate_statements(ctx, &block, stmts).await?;
        if matches!(completion, ControlFlow::Normal(_)) {
            copy_up_block_functions(ctx, &block, &functions)?;
        }
        Ok(completion)
    }
    .boxed_local()
}

fn evaluate_var_declaration<'a>(ctx: &'a Rc<Context>, scope: &'a Rc<Scope>, decl: &'a VarDeclaration) -> LocalBoxFuture<'a, EvalResult<()>> {
    async move {
        for d in &decl.declarations {
            let mode = if decl.kind == VarKind::Var { BindingMode::Assign } else { BindingMode::Initialize };
            let value = match &d.init {
                Some(init) => match &d.target {
                    Pattern::Identifier { name, .. } => evaluate_named(ctx, scope, init, name).await?,
                    _ => evaluate_expr(ctx, scope, init).await?,
                },
                None if decl.kind == VarKind::Var => continue,
                None => Value::Undefined,
            };
            bind_pattern(ctx, scope, &d.target, value, mode).await?;
        }
        Ok(())
    }
    .boxed_local()
}

/// Evaluates one statement. `labels` is the label set of an enclosing
/// labeled statement, consumed by loops and `switch`.
pub fn evaluate_statement<'a>(
    ctx: &'a Rc<Context>,
    scope: &'a Rc<Scope>,
    stmt: &'a Statement,
    labels: &'a [Rc<str>],
) -> LocalBoxFuture<'a, EvalResult<ControlFlow>> {
    async move {
        ctx.at(stmt.span);
        if let Some(sink) = &ctx.debug {
            sink.statement(&ctx.source, stmt.span);
        }
        match &stmt.kind {
            StatementKind::Expr(expr) => Ok(ControlFlow::Normal(Some(evaluate_expr(ctx, scope, expr).await?))),
            StatementKind::VarDecl(decl) => {
                evaluate_var_declaration(ctx, scope, decl).await?;
                Ok(ControlFlow::Normal(None))
            }
            StatementKind::FunctionDecl(_) | StatementKind::Empty => Ok(ControlFlow::Normal(None)),
            StatementKind::ClassDecl(class) => {
                let name = class.name.clone().unwrap_or_else(|| "default".into());
                let ctor = crate::js_class::evaluate_class(ctx, scope, class, name.clone()).await?;
                ctx.check_scope_write(scope, &name)?;
                scope.initialize(&name, Value::Object(ctor));
                Ok(ControlFlow::Normal(None))
            }
            StatementKind::Return(expr) => {
                let value = match expr {
                    Some(e) => evaluate_expr(ctx, scope, e).await?,
                    None => Value::Undefined,
                };
                Ok(ControlFlow::Return(value))
            }
            StatementKind::If { test, consequent, alternate } => {
                let test = evaluate_expr(ctx, scope, test).await?;
                let completion = if to_boolean(&test) {
                    evaluate_statement(ctx, scope, consequent, &[]).await?
                } else if let Some(alt) = alternate {
                    evaluate_statement(ctx, scope, alt, &[]).await?
                } else {
                    ControlFlow::Normal(None)
                };
                Ok(completion.update_empty(Some(Value::Undefined)))
            }
            StatementKind::Block(stmts) => evaluate_block(ctx, scope, stmts).await,
            StatementKind::Throw(expr) => {
                let value = evaluate_expr(ctx, scope, expr).await?;
                Err(EvalError::Throw(value))
            }
            StatementKind::Break(label) => Ok(ControlFlow::Break(label.clone(), None)),
            StatementKind::Continue(label) => Ok(ControlFlow::Continue(label.clone(), None)),
            StatementKind::Labeled { label, body } => {
                let mut set = labels.to_vec();
                set.push(label.clone());
                let nested = matches!(
                    body.kind,
                    StatementKind::Labeled { .. }
                        | StatementKind::For { .. }
                        | StatementKind::ForIn { .. }
                        | StatementKind::ForOf { .. }
                        | StatementKind::While { .. }
                        | StatementKind::DoWhile { .. }
                        | StatementKind::Switch { .. }
                );
                let completion = if nested {
                    evaluate_statement(ctx, scope, body, &set).await?
                } else {
                    evaluate_statement(ctx, scope, body, &[]).await?
                };
                Ok(match completion {
                    ControlFlow::Break(Some(l), v) if l == *label => ControlFlow::Normal(v),
                    other => other,
                })
            }
            StatementKind::While { test, body } => {
                let mut last = None;
                loop {
                    ctx.check_interrupts()?;
                    if !to_boolean(&evaluate_expr(ctx, scope, test).await?) {
                        break;
                    }
                    let completion = evaluate_statement(ctx, scope, body, &[]).await?;
                    if let Some(v) = completion.value() {
                        last = Some(v.clone());
                    }
                    if !loop_continues(&completion, labels) {
                        return Ok(loop_exit(completion, last));
                    }
                }
                Ok(ControlFlow::Normal(Some(last.unwrap_or_default())))
            }
            StatementKind::DoWhile { body, test } => {
                let mut last = None;
                loop {
                    ctx.check_interrupts()?;
                    let completion = evaluate_statement(ctx, scope, body, &[]).await?;
                    if let Some(v) = completion.value() {
                        last = Some(v.clone());
                    }
                    if !loop_continues(&completion, labels) {
                        return Ok(loop_exit(completion, last));
                    }
                    if !to_boolean(&evaluate_expr(ctx, scope, test).await?) {
                        break;
                    }
                }
                Ok(ControlFlow::Normal(Some(last.unwrap_or_default())))
            }
            StatementKind::For { init, test, update, body } => evaluate_for(ctx, scope, init.as_ref(), test.as_ref(), update.as_ref(), body, labels).await,
            StatementKind::ForIn { head, object, body } => evaluate_for_in(ctx, scope, head, object, body, labels).await,
            StatementKind::ForOf {
                head,
                iterable,
                body,
                is_await,
            } => evaluate_for_of(ctx, scope, head, iterable, body, *is_await, labels).await,
            StatementKind::Switch { discriminant, cases } => evaluate_switch(ctx, scope, discriminant, cases).await,
            StatementKind::Try { block, handler, finalizer } => evaluate_try(ctx, scope, block, handler.as_ref(), finalizer.as_deref()).await,
            StatementKind::Debugger => {
                match &ctx.debug {
                    Some(sink) => sink.debugger(&ctx.source, stmt.span),
                    None => log::debug!("debugger statement at {}:{}", stmt.span.line, stmt.span.column),
                }
                Ok(ControlFlow::Normal(None))
            }
            StatementKind::ModuleDecl(kind) => Err(raise_unsupported!("{kind} declarations").into()),
        }
    }
    .boxed_local()
}

async fn evaluate_for(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    init: Option<&ForInit>,
    test: Option<&crate::core::expr::Expr>,
    update: Option<&crate::core::expr::Expr>,
    body: &Statement,
    labels: &[Rc<str>],
) -> EvalResult<ControlFlow> {
    let (loop_scope, per_iteration) = match init {
        Some(ForInit::Declaration(decl)) if decl.kind != VarKind::Var => {
            let loop_scope = Scope::new_block(scope);
            let kind = if decl.kind == VarKind::Const { BindingKind::Const } else { BindingKind::Let };
            let mut names = Vec::new();
            for d in &decl.declarations {
                d.target.bound_names(&mut names);
            }
            for name in &names {
                loop_scope.declare(name, kind, None)?;
            }
            evaluate_var_declaration(ctx, &loop_scope, decl).await?;
            (loop_scope, decl.kind == VarKind::Let)
        }
        Some(ForInit::Declaration(decl)) => {
            evaluate_var_declaration(ctx, scope, decl).await?;
            (scope.clone(), false)
        }
        Some(ForInit::Expression(expr)) => {
            evaluate_expr(ctx, scope, expr).await?;
            (scope.clone(), false)
        }
        None => (scope.clone(), false),
    };
    let mut iteration = if per_iteration { loop_scope.copy_for_iteration() } else { loop_scope };
    let mut last = None;
    loop {
        ctx.check_interrupts()?;
        if let Some(test) = test
            && !to_boolean(&evaluate_expr(ctx, &iteration, test).await?)
        {
            break;
        }
        let completion = evaluate_statement(ctx, &iteration, body, &[]).await?;
        if let Some(v) = completion.value() {
            last = Some(v.clone());
        }
        if !loop_continues(&completion, labels) {
            return Ok(loop_exit(completion, last));
        }
        if per_iteration {
            iteration = iteration.copy_for_iteration();
        }
        if let Some(update) = update {
            evaluate_expr(ctx, &iteration, update).await?;
        }
    }
    Ok(ControlFlow::Normal(Some(last.unwrap_or_default())))
}

/// Binds the value of one `for-in`/`for-of` iteration, returning the scope
/// the body runs in.
async fn bind_for_head(ctx: &Rc<Context>, scope: &Rc<Scope>, head: &ForHead, value: Value) -> EvalResult<Rc<Scope>> {
    match head {
        ForHead::Declaration(VarKind::Var, pattern) | ForHead::Target(pattern) => {
            bind_pattern(ctx, scope, pattern, value, BindingMode::Assign).await?;
            Ok(scope.clone())
        }
        ForHead::Declaration(kind, pattern) => {
            let iteration = Scope::new_block(scope);
            let binding = if *kind == VarKind::Const { BindingKind::Const } else { BindingKind::Let };
            let mut names = Vec::new();
            pattern.bound_names(&mut names);
            for name in &names {
                iteration.declare(name, binding, None)?;
            }
            bind_pattern(ctx, &iteration, pattern, value, BindingMode::Initialize).await?;
            Ok(iteration)
        }
    }
}

/// Scope for evaluating the subject of a loop whose head declares lexical
/// names: those names are in their dead zone there.
fn head_tdz_scope(scope: &Rc<Scope>, head: &ForHead) -> Result<Rc<Scope>, JSError> {
    match head {
        ForHead::Declaration(kind, pattern) if *kind != VarKind::Var => {
            let tdz = Scope::new_block(scope);
            let mut names = Vec::new();
            pattern.bound_names(&mut names);
            for name in &names {
                tdz.declare(name, BindingKind::Let, None)?;
            }
            Ok(tdz)
        }
        _ => Ok(scope.clone()),
    }
}

async fn evaluate_for_in(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    head: &ForHead,
    object: &crate::core::expr::Expr,
    body: &Statement,
    labels: &[Rc<str>],
) -> EvalResult<ControlFlow> {
    let subject = evaluate_expr(ctx, &head_tdz_scope(scope, head)?, object).await?;
    if subject.is_nullish() {
        return Ok(ControlFlow::Normal(Some(Value::Undefined)));
    }
    let obj = to_object(ctx, &subject)?;
    let keys = crate::core::property::for_in_keys(ctx, &obj)?;
    let mut last = None;
    for key in keys {
        ctx.check_interrupts()?;
        // Properties deleted before being visited are skipped.
        if !has_property(ctx, &obj, &PropertyKey::String(key.clone()))? {
            continue;
        }
        let iteration = bind_for_head(ctx, scope, head, Value::String(key)).await?;
        let completion = evaluate_statement(ctx, &iteration, body, &[]).await?;
        if let Some(v) = completion.value() {
            last = Some(v.clone());
        }
        if !loop_continues(&completion, labels) {
            return Ok(loop_exit(completion, last));
        }
    }
    Ok(ControlFlow::Normal(Some(last.unwrap_or_default())))
}

/// Iterator driving a `for-of` or `for await-of` loop.
enum LoopIterator {
    Sync { record: IteratorRecord, await_values: bool },
    Async(IteratorRecord),
}

impl LoopIterator {
    async fn next(&mut self, ctx: &Rc<Context>) -> EvalResult<Option<Value>> {
        match self {
            LoopIterator::Sync { record, await_values } => match record.step(ctx)? {
                Some(v) if *await_values => Ok(Some(await_value(ctx, v)?.await?)),
                other => Ok(other),
            },
            LoopIterator::Async(record) => {
                if record.done {
                    return Ok(None);
                }
                ctx.check_interrupts()?;
                let result = crate::js_function::call_function(ctx, &record.next, &record.iterator, &[])?;
                let result = await_value(ctx, result)?.await?;
                let Value::Object(obj) = &result else {
                    record.done = true;
                    return Err(raise_type_error!("Iterator result {} is not an object", crate::core::conversion::value_description(&result)).into());
                };
                if to_boolean(&get_property(ctx, obj, &"done".into(), &result)?) {
                    record.done = true;
                    return Ok(None);
                }
                Ok(Some(get_property(ctx, obj, &"value".into(), &result)?))
            }
        }
    }

    async fn close(&mut self, ctx: &Rc<Context>) -> EvalResult<()> {
        match self {
            LoopIterator::Sync { record, .. } => record.close(ctx),
            LoopIterator::Async(record) => {
                if record.done {
                    return Ok(());
                }
                record.done = true;
                let Some(ret) = crate::core::property::get_method(ctx, &record.iterator, &"return".into())? else {
                    return Ok(());
                };
                let result = crate::js_function::call_function(ctx, &ret, &record.iterator, &[])?;
                await_value(ctx, result)?.await?;
                Ok(())
            }
        }
    }

    async fn close_on_error(&mut self, ctx: &Rc<Context>, err: EvalError) -> EvalError {
        if err.is_catchable() {
            let _ = self.close(ctx).await;
        }
        err
    }
}

async fn evaluate_for_of(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    head: &ForHead,
    iterable: &crate::core::expr::Expr,
    body: &Statement,
    is_await: bool,
    labels: &[Rc<str>],
) -> EvalResult<ControlFlow> {
    let subject = evaluate_expr(ctx, &head_tdz_scope(scope, head)?, iterable).await?;
    let mut iterator = if is_await {
        let key = PropertyKey::from(&ctx.realm.intrinsics.symbols.async_iterator);
        match crate::core::property::get_method(ctx, &subject, &key)? {
            Some(method) => {
                let iterator = crate::js_function::call_function(ctx, &method, &subject, &[])?;
                if !matches!(iterator, Value::Object(_)) {
                    return Err(raise_type_error!("Result of the Symbol.asyncIterator method is not an object").into());
                }
                let next = crate::core::property::get_value(ctx, &iterator, &"next".into())?;
                LoopIterator::Async(IteratorRecord { iterator, next, done: false })
            }
            None => LoopIterator::Sync {
                record: get_iterator(ctx, &subject)?,
                await_values: true,
            },
        }
    } else {
        LoopIterator::Sync {
            record: get_iterator(ctx, &subject)?,
            await_values: false,
        }
    };
    let mut last = None;
    while let Some(value) = iterator.next(ctx).await? {
        let iteration = match bind_for_head(ctx, scope, head, value).await {
            Ok(s) => s,
            Err(e) => return Err(iterator.close_on_error(ctx, e).await),
        };
        let completion = match evaluate_statement(ctx, &iteration, body, &[]).await {
            Ok(c) => c,
            Err(e) => return Err(iterator.close_on_error(ctx, e).await),
        };
        if let Some(v) = completion.value() {
            last = Some(v.clone());
        }
        if !loop_continues(&completion, labels) {
            iterator.close(ctx).await?;
            return Ok(loop_exit(completion, last));
        }
    }
    Ok(ControlFlow::Normal(Some(last.unwrap_or_default())))
}

/// Case tests run once in source order; the first match (or `default`)
/// is where evaluation starts, falling through from there.
async fn evaluate_switch(ctx: &Rc<Context>, scope: &Rc<Scope>, discriminant: &crate::core::expr::Expr, cases: &[SwitchCase]) -> EvalResult<ControlFlow> {
    let value = evaluate_expr(ctx, scope, discriminant).await?;
    let block = Scope::new_block(scope);
    let functions = hoist_block(ctx, &block, cases.iter().flat_map(|c| &c.body))?;
    let mut start = None;
    for (i, case) in cases.iter().enumerate() {
        let Some(test) = &case.test else {
            continue;
        };
        let candidate = evaluate_expr(ctx, &block, test).await?;
        if strict_equals(&value, &candidate) {
            start = Some(i);
            break;
        }
    }
    let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
    let mut last = None;
    if let Some(start) = start {
        for case in &cases[start..] {
            match evaluate_statements(ctx, &block, &case.body).await? {
                ControlFlow::Normal(v) => {
                    if v.is_some() {
                        last = v;
                    }
                }
                ControlFlow::Break(None, v) => {
                    if v.is_some() {
                        last = v;
                    }
                    break;
                }
                abrupt => return Ok(abrupt.update_empty(last)),
            }
        }
    }
    copy_up_block_functions(ctx, &block, &functions)?;
    Ok(ControlFlow::Normal(Some(last.unwrap_or_default())))
}

async fn evaluate_catch(ctx: &Rc<Context>, scope: &Rc<Scope>, handler: &CatchClause, thrown: Value) -> EvalResult<ControlFlow> {
    let catch_scope = Scope::new_block(scope);
    if let Some(param) = &handler.param {
        let mut names = Vec::new();
        param.bound_names(&mut names);
        for name in &names {
            catch_scope.declare(name, BindingKind::Let, None)?;
        }
        bind_pattern(ctx, &catch_scope, param, thrown, BindingMode::Initialize).await?;
    }
    evaluate_block(ctx, &catch_scope, &handler.body).await
}

/// `try`: engine conditions skip both `catch` and `finally`; an abrupt
/// `finally` replaces the pending completion.
async fn evaluate_try(
    ctx: &Rc<Context>,
    scope: &Rc<Scope>,
    block: &[Statement],
    handler: Option<&CatchClause>,
    finalizer: Option<&[Statement]>,
) -> EvalResult<ControlFlow> {
    let mut result = evaluate_block(ctx, scope, block).await;
    if let Some(handler) = handler {
        result = match result {
            Err(err) if err.is_catchable() => {
                let thrown = into_thrown_value(ctx, err)?;
                evaluate_catch(ctx, scope, handler, thrown).await
            }
            other => other,
        };
    }
    if let Some(finalizer) = finalizer {
        if let Err(e) = &result
            && !e.is_catchable()
        {
            return result;
        }
        match evaluate_block(ctx, scope, finalizer).await? {
            ControlFlow::Normal(_) => {}
            abrupt => return Ok(abrupt),
        }
    }
    Ok(result?.update_empty(Some(Value::Undefined)))
}
