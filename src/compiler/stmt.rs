use inkwell::{
    basic_block::BasicBlock,
    values::{IntValue, PointerValue},
    IntPredicate,
};

use crate::{
    ast::{
        ast::{ExprId, StmtId, TokenId},
        expressions::Expr,
        statements::Stmt,
        types::TypeExpr,
    },
    errors::errors::ErrorImpl,
    types::types::{Type, TypeKind},
};

use super::{
    compiler::Compiler,
    environment::{LoopTargets, DISCARD},
    expr::gen_expression,
    runtime_abi::RuntimeFn,
    value::Value,
};

/// How control leaves a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Completed,
    Break,
    Continue,
    Returned,
}

/// Generates the IR of a statement.
pub fn gen_statement(compiler: &mut Compiler<'_, '_>, id: StmtId) -> Flow {
    let ast = compiler.ast;

    match ast.stmt(id) {
        Stmt::Block { body, .. } => {
            compiler.push_scope();
            let flow = gen_statements(compiler, body);
            compiler.pop_scope();
            flow
        }
        Stmt::Expression { expr, .. } => {
            gen_expression(compiler, *expr, None);
            Flow::Completed
        }
        Stmt::Print {
            args,
            newline,
            token,
        } => {
            gen_print(compiler, args, *newline, *token);
            Flow::Completed
        }
        Stmt::VarDecl { ty, name, init } => {
            gen_var_decl(compiler, ty.as_ref(), *name, *init);
            Flow::Completed
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
            token,
        } => gen_if(compiler, *condition, *then_branch, *else_branch, *token),
        Stmt::While {
            condition,
            body,
            post,
            token,
        } => {
            gen_while(compiler, *condition, *body, *post, *token);
            Flow::Completed
        }
        Stmt::For {
            bindings,
            iterable,
            body,
            token,
        } => {
            gen_for(compiler, bindings, *iterable, *body, *token);
            Flow::Completed
        }
        Stmt::Function(decl) => {
            // Functions of the top level and its namespaces were declared in
            // pass one; nested ones are declared where they appear.
            let descriptor = match compiler.functions_by_stmt.get(&id).cloned() {
                Some(descriptor) => Some(descriptor),
                None if !compiler.env.is_global() => compiler.declare_function(id, decl),
                None => None,
            };
            if let Some(descriptor) = descriptor.filter(|descriptor| descriptor.is_valid) {
                if let Some(llvm) = descriptor.llvm {
                    compiler.lower_function_body(&descriptor, llvm, decl.body, decl.name);
                }
            }
            Flow::Completed
        }
        Stmt::Break { token } => gen_jump(compiler, Flow::Break, *token),
        Stmt::Continue { token } => gen_jump(compiler, Flow::Continue, *token),
        Stmt::DestructureDecl {
            targets,
            value,
            token,
        } => {
            gen_destructure_decl(compiler, targets, *value, *token);
            Flow::Completed
        }
        Stmt::Return { value, token } => gen_return(compiler, *value, *token),
        // Layouts are registered in pass one.
        Stmt::StructDecl { .. } => Flow::Completed,
        Stmt::Namespace { name, body } => {
            compiler.env.push_namespace(ast.lexeme(*name));
            gen_statements(compiler, body);
            compiler.env.pop_namespace();
            Flow::Completed
        }
    }
}

/// Lowers a statement list; the flow is the first one that is not
/// `Completed`.
fn gen_statements(compiler: &mut Compiler<'_, '_>, body: &[StmtId]) -> Flow {
    let mut flow = Flow::Completed;
    for &id in body {
        if compiler.is_saturated() {
            break;
        }
        let current = gen_statement(compiler, id);
        if flow == Flow::Completed {
            flow = current;
        }
    }
    flow
}

/// Lowers a branch or loop body in its own frame.
fn gen_scoped(compiler: &mut Compiler<'_, '_>, id: StmtId) -> Flow {
    compiler.push_scope();
    let flow = gen_statement(compiler, id);
    compiler.pop_scope();
    flow
}

fn gen_print(compiler: &mut Compiler<'_, '_>, args: &[ExprId], newline: bool, token: TokenId) {
    let mut parts = vec![];
    for (index, &arg) in args.iter().enumerate() {
        if index > 0 {
            parts.push(compiler.string_literal(" "));
        }
        let value = gen_expression(compiler, arg, None);
        let text = compiler.to_display_string(&value, token);
        if !text.is_valid() {
            return;
        }
        parts.push(text);
    }

    let joined = compiler.concat_strings(parts, token);
    let Some(handle) = compiler.materialize(&joined) else {
        return;
    };
    let newline = compiler
        .context
        .i32_type()
        .const_int(u64::from(newline), false);
    compiler.call_rt(RuntimeFn::Print, &[handle.into(), newline.into()]);
}

fn gen_var_decl(
    compiler: &mut Compiler<'_, '_>,
    ty: Option<&TypeExpr>,
    name: TokenId,
    init: Option<ExprId>,
) {
    let ast = compiler.ast;
    let variable = ast.lexeme(name);

    let declared = ty.map(|ty| compiler.resolve_type(ty));
    let hint = declared
        .as_ref()
        .map(|ty| ty.clone().with_const(false).with_reference(false));
    let value = init.map(|init| gen_expression(compiler, init, hint.as_ref()));

    let ty = match (&declared, &value) {
        (Some(declared), _) => declared.clone(),
        (None, Some(value)) => value.ty.clone().with_const(false).with_reference(false),
        (None, None) => {
            compiler.report(ErrorImpl::ExpectedExplicitValue, name);
            Type::invalid()
        }
    };

    let is_valid = ty.is_valid && value.as_ref().map_or(true, Value::is_valid);
    if !is_valid {
        // Keeps later uses from cascading into unknown-variable errors.
        if let Err(error) = compiler.env.define_variable(variable, Value::invalid()) {
            compiler.report(error, name);
        }
        return;
    }

    if ty.kind == TypeKind::Void || value.as_ref().is_some_and(|value| value.is_pair()) {
        compiler.report(ErrorImpl::ExpectedExplicitValue, name);
        return;
    }
    if ty.is_const && value.is_none() {
        compiler.report(ErrorImpl::ExpectedExplicitValue, name);
        return;
    }

    // A reference variable aliases existing storage.
    if ty.is_reference {
        let Some(value) = value else {
            compiler.report(ErrorImpl::ExpectedExplicitValue, name);
            return;
        };
        let target = ty.clone().with_reference(false);
        if !value.ty.clone().with_const(false).is_type_matched(&target.clone().with_const(false)) {
            compiler.report(
                ErrorImpl::TypeMismatch {
                    expected: target.to_string(),
                    received: value.ty.to_string(),
                },
                name,
            );
            return;
        }
        let Some(address) = value.address() else {
            compiler.report(ErrorImpl::NotAssignable, name);
            return;
        };
        let is_const = ty.is_const || value.ty.is_const;
        let ty = ty.with_const(is_const);
        if let Err(error) = compiler
            .env
            .define_variable(variable, Value::storage(ty, address))
        {
            compiler.report(error, name);
        }
        return;
    }

    let storage = ty.clone().with_const(false);
    let slot = compiler.variable_slot(&storage, variable);
    match value {
        Some(value) => {
            let casted = compiler.implicit_cast(&value, &storage, name);
            if !casted.is_valid() {
                let _ = compiler.env.define_variable(variable, Value::invalid());
                return;
            }
            compiler.copy_storage(slot, &casted, &storage);
        }
        None => compiler.init_storage(slot, &storage),
    }
    compiler.register_cleanup(slot, &storage);

    if let Err(error) = compiler
        .env
        .define_variable(variable, Value::storage(ty, slot))
    {
        compiler.report(error, name);
    }
}

/// Lowers a condition to an `i1`. Invalid conditions lower to `false` so
/// the guarded code is still checked.
fn gen_condition<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    condition: ExprId,
    token: TokenId,
) -> IntValue<'ctx> {
    let fallback = compiler.context.bool_type().const_zero();
    let value = gen_expression(compiler, condition, Some(&Type::boolean()));
    if !value.is_valid() {
        return fallback;
    }
    if value.ty.kind != TypeKind::Bool {
        compiler.report(
            ErrorImpl::TypeMismatch {
                expected: String::from("bool"),
                received: value.ty.to_string(),
            },
            token,
        );
        return fallback;
    }
    compiler
        .materialize(&value)
        .map(|value| value.into_int_value())
        .unwrap_or(fallback)
}

fn gen_if(
    compiler: &mut Compiler<'_, '_>,
    condition: ExprId,
    then_branch: StmtId,
    else_branch: Option<StmtId>,
    token: TokenId,
) -> Flow {
    let condition = gen_condition(compiler, condition, token);

    let then_block = compiler.append_block("if.then");
    let else_block = else_branch.map(|_| compiler.append_block("if.else"));
    let merge_block = compiler.append_block("if.end");
    compiler
        .builder
        .build_conditional_branch(condition, then_block, else_block.unwrap_or(merge_block))
        .unwrap();

    compiler.builder.position_at_end(then_block);
    let then_flow = gen_scoped(compiler, then_branch);
    compiler.branch_to(merge_block);

    let else_flow = match (else_branch, else_block) {
        (Some(else_branch), Some(else_block)) => {
            compiler.builder.position_at_end(else_block);
            let flow = gen_scoped(compiler, else_branch);
            compiler.branch_to(merge_block);
            Some(flow)
        }
        _ => None,
    };

    compiler.builder.position_at_end(merge_block);
    match else_flow {
        Some(else_flow) if else_flow == then_flow => then_flow,
        _ => Flow::Completed,
    }
}

fn gen_while(
    compiler: &mut Compiler<'_, '_>,
    condition: ExprId,
    body: StmtId,
    post: Option<ExprId>,
    token: TokenId,
) {
    let cond_block = compiler.append_block("while.cond");
    let body_block = compiler.append_block("while.body");
    let step_block = compiler.append_block("while.step");
    let end_block = compiler.append_block("while.end");

    compiler.push_scope();
    compiler.branch_to(cond_block);

    compiler.builder.position_at_end(cond_block);
    let condition = gen_condition(compiler, condition, token);
    compiler
        .builder
        .build_conditional_branch(condition, body_block, end_block)
        .unwrap();

    compiler.builder.position_at_end(body_block);
    compiler.env.set_loop_targets(LoopTargets {
        break_block: end_block,
        continue_block: step_block,
    });
    gen_statement(compiler, body);
    compiler.branch_to(step_block);

    compiler.builder.position_at_end(step_block);
    if let Some(post) = post {
        gen_expression(compiler, post, None);
    }
    compiler.branch_to(cond_block);

    compiler.builder.position_at_end(end_block);
    compiler.pop_scope();
}

/// Declares a loop binding in the loop frame; `_` binds nothing.
fn bind_loop_variable<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    name: TokenId,
    ty: &Type,
) -> Option<PointerValue<'ctx>> {
    let ast = compiler.ast;
    let variable = ast.lexeme(name);
    if variable == DISCARD {
        return None;
    }

    let ty = ty.clone().with_const(false).with_reference(false);
    let slot = compiler.variable_slot(&ty, variable);
    compiler.register_cleanup(slot, &ty);
    match compiler
        .env
        .define_variable(variable, Value::storage(ty, slot))
    {
        Ok(()) => Some(slot),
        Err(error) => {
            compiler.report(error, name);
            None
        }
    }
}

fn check_bindings(
    compiler: &mut Compiler<'_, '_>,
    bindings: &[TokenId],
    max: usize,
    token: TokenId,
) -> bool {
    if bindings.is_empty() || bindings.len() > max {
        compiler.report(
            ErrorImpl::ArgumentCount {
                expected: max,
                received: bindings.len(),
            },
            token,
        );
        return false;
    }
    true
}

fn gen_for(
    compiler: &mut Compiler<'_, '_>,
    bindings: &[TokenId],
    iterable: ExprId,
    body: StmtId,
    token: TokenId,
) {
    let ast = compiler.ast;

    compiler.push_scope();

    if let Expr::Range { start, end, .. } = ast.expr(iterable) {
        gen_range_loop(compiler, bindings, *start, *end, body, token);
    } else {
        let container = gen_expression(compiler, iterable, None);
        match container.ty.kind {
            _ if !container.is_valid() => {}
            TypeKind::FixedVec | TypeKind::DynVec | TypeKind::String => {
                gen_indexed_loop(compiler, bindings, &container, body, token)
            }
            TypeKind::Set | TypeKind::Map => {
                gen_cursor_loop(compiler, bindings, &container, body, token)
            }
            _ => compiler.report(
                ErrorImpl::NotIterable {
                    ty: container.ty.to_string(),
                },
                token,
            ),
        }
    }

    compiler.pop_scope();
}

/// `for i in a..b`: a counter, no vector is built.
fn gen_range_loop(
    compiler: &mut Compiler<'_, '_>,
    bindings: &[TokenId],
    start: ExprId,
    end: ExprId,
    body: StmtId,
    token: TokenId,
) {
    if !check_bindings(compiler, bindings, 1, token) {
        return;
    }

    let start = gen_expression(compiler, start, None);
    let hint = start.ty.is_integer().then(|| start.ty.clone());
    let end = gen_expression(compiler, end, hint.as_ref());
    if !start.is_valid() || !end.is_valid() {
        return;
    }
    if !start.ty.is_integer() || !end.ty.is_integer() {
        compiler.report(
            ErrorImpl::InvalidOperands {
                op: String::from(".."),
                left: start.ty.to_string(),
                right: end.ty.to_string(),
            },
            token,
        );
        return;
    }

    let counter_type = Type::int(64);
    let element = start.ty.widen(&end.ty);
    let (Some(from), Some(to)) = (compiler.materialize(&start), compiler.materialize(&end)) else {
        return;
    };
    let from = compiler.convert_numeric(from, &start.ty, &counter_type);
    let to = compiler
        .convert_numeric(to, &end.ty, &counter_type)
        .into_int_value();

    let i64_type = compiler.context.i64_type();
    let counter = compiler.entry_alloca(i64_type.into(), "counter");
    compiler.builder.build_store(counter, from).unwrap();
    let binding = bind_loop_variable(compiler, bindings[0], &element);

    let cond_block = compiler.append_block("for.cond");
    let body_block = compiler.append_block("for.body");
    let step_block = compiler.append_block("for.step");
    let end_block = compiler.append_block("for.end");
    compiler.branch_to(cond_block);

    compiler.builder.position_at_end(cond_block);
    let current = compiler
        .builder
        .build_load(counter, "current")
        .unwrap()
        .into_int_value();
    let more = compiler
        .builder
        .build_int_compare(IntPredicate::SLT, current, to, "more")
        .unwrap();
    compiler
        .builder
        .build_conditional_branch(more, body_block, end_block)
        .unwrap();

    compiler.builder.position_at_end(body_block);
    compiler.env.set_loop_targets(LoopTargets {
        break_block: end_block,
        continue_block: step_block,
    });
    if let Some(binding) = binding {
        let value = compiler.convert_numeric(current.into(), &counter_type, &element);
        compiler.builder.build_store(binding, value).unwrap();
    }
    gen_statement(compiler, body);
    compiler.branch_to(step_block);

    gen_counter_step(compiler, step_block, counter, cond_block);
    compiler.builder.position_at_end(end_block);
}

fn gen_counter_step<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    step_block: BasicBlock<'ctx>,
    counter: PointerValue<'ctx>,
    cond_block: BasicBlock<'ctx>,
) {
    let i64_type = compiler.context.i64_type();
    compiler.builder.position_at_end(step_block);
    let current = compiler
        .builder
        .build_load(counter, "current")
        .unwrap()
        .into_int_value();
    let next = compiler
        .builder
        .build_int_add(current, i64_type.const_int(1, false), "next")
        .unwrap();
    compiler.builder.build_store(counter, next).unwrap();
    compiler.branch_to(cond_block);
}

/// Vectors and strings: `value` or `index, value` against the length
/// queried on every iteration.
fn gen_indexed_loop<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    bindings: &[TokenId],
    container: &Value<'ctx>,
    body: StmtId,
    token: TokenId,
) {
    if !check_bindings(compiler, bindings, 2, token) {
        return;
    }

    let element = match container.ty.kind {
        TypeKind::String => Type::string(),
        _ => match container.ty.element() {
            Some(element) => element.clone(),
            None => return,
        },
    };
    let index_type = Type::int(64);
    let (index_binding, value_binding) = match bindings {
        [index, value] => (
            bind_loop_variable(compiler, *index, &index_type),
            bind_loop_variable(compiler, *value, &element),
        ),
        [value] => (None, bind_loop_variable(compiler, *value, &element)),
        _ => return,
    };

    let i64_type = compiler.context.i64_type();
    let counter = compiler.entry_alloca(i64_type.into(), "counter");
    compiler
        .builder
        .build_store(counter, i64_type.const_zero())
        .unwrap();

    let cond_block = compiler.append_block("for.cond");
    let body_block = compiler.append_block("for.body");
    let step_block = compiler.append_block("for.step");
    let end_block = compiler.append_block("for.end");
    compiler.branch_to(cond_block);

    compiler.builder.position_at_end(cond_block);
    let length = compiler.length(container, token);
    let Some(length) = compiler.materialize(&length) else {
        compiler.branch_to(end_block);
        compiler.builder.position_at_end(end_block);
        return;
    };
    let current = compiler
        .builder
        .build_load(counter, "current")
        .unwrap()
        .into_int_value();
    let more = compiler
        .builder
        .build_int_compare(IntPredicate::SLT, current, length.into_int_value(), "more")
        .unwrap();
    compiler
        .builder
        .build_conditional_branch(more, body_block, end_block)
        .unwrap();

    compiler.builder.position_at_end(body_block);
    compiler.env.set_loop_targets(LoopTargets {
        break_block: end_block,
        continue_block: step_block,
    });
    if let Some(slot) = index_binding {
        compiler.builder.build_store(slot, current).unwrap();
    }
    if let Some(slot) = value_binding {
        let index = Value::materialized(index_type, current.into());
        let item = compiler.get_at_index(container, &index, token);
        compiler.copy_storage(slot, &item, &element.clone().with_const(false));
    }
    gen_statement(compiler, body);
    compiler.branch_to(step_block);

    gen_counter_step(compiler, step_block, counter, cond_block);
    compiler.builder.position_at_end(end_block);
}

/// Sets and maps: the container's single cursor, `key` or `key, value`.
fn gen_cursor_loop<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    bindings: &[TokenId],
    container: &Value<'ctx>,
    body: StmtId,
    token: TokenId,
) {
    let max = match container.ty.kind {
        TypeKind::Map => 2,
        _ => 1,
    };
    if !check_bindings(compiler, bindings, max, token) {
        return;
    }

    let key_type = container.ty.inner[0].clone();
    let value_type = container.ty.inner.get(1).cloned();
    let key_binding = bind_loop_variable(compiler, bindings[0], &key_type);
    let value_binding = match (bindings.get(1), &value_type) {
        (Some(name), Some(value_type)) => bind_loop_variable(compiler, *name, value_type),
        _ => None,
    };

    compiler.start_iterator(container);

    let cond_block = compiler.append_block("for.cond");
    let body_block = compiler.append_block("for.body");
    let end_block = compiler.append_block("for.end");
    compiler.branch_to(cond_block);

    compiler.builder.position_at_end(cond_block);
    let more = compiler
        .iter_next(container)
        .unwrap_or_else(|| compiler.context.bool_type().const_zero());
    compiler
        .builder
        .build_conditional_branch(more, body_block, end_block)
        .unwrap();

    compiler.builder.position_at_end(body_block);
    compiler.env.set_loop_targets(LoopTargets {
        break_block: end_block,
        continue_block: cond_block,
    });
    if let Some(slot) = key_binding {
        let key = compiler.get_iter_key(container);
        compiler.copy_storage(slot, &key, &key_type);
    }
    if let (Some(slot), Some(value_type)) = (value_binding, value_type) {
        let value = compiler.get_iter_value(container);
        compiler.copy_storage(slot, &value, &value_type);
    }
    gen_statement(compiler, body);
    compiler.branch_to(cond_block);

    compiler.builder.position_at_end(end_block);
}

/// `break` and `continue`: release every frame inside the loop, then jump.
fn gen_jump(compiler: &mut Compiler<'_, '_>, flow: Flow, token: TokenId) -> Flow {
    let Some((targets, index)) = compiler.env.loop_targets() else {
        let error = match flow {
            Flow::Break => ErrorImpl::BreakOutsideLoop,
            _ => ErrorImpl::ContinueOutsideLoop,
        };
        compiler.report(error, token);
        return Flow::Completed;
    };

    let leaving = compiler.env.frames_until(index, false);
    compiler.release_frames(&leaving);

    let target = match flow {
        Flow::Break => targets.break_block,
        _ => targets.continue_block,
    };
    compiler.builder.build_unconditional_branch(target).unwrap();
    compiler.open_dead_tail();
    flow
}

fn gen_return(compiler: &mut Compiler<'_, '_>, value: Option<ExprId>, token: TokenId) -> Flow {
    let Some(function) = compiler.env.function().cloned() else {
        compiler.report(ErrorImpl::ReturnOutsideFunction, token);
        return Flow::Completed;
    };
    let Some(returns) = function.returns else {
        compiler.report(ErrorImpl::ReturnOutsideFunction, token);
        return Flow::Completed;
    };

    match (value, function.ret_slot) {
        (Some(value), Some(ret_slot)) => {
            let storage = returns.clone().with_const(false).with_reference(false);
            let value = gen_expression(compiler, value, Some(&storage));
            if value.is_valid() {
                let compatible = value.ty.is_type_matched(&storage)
                    || (value.ty.is_numeric() && storage.is_numeric());
                if compatible {
                    let casted = compiler.implicit_cast(&value, &storage, token);
                    compiler.copy_storage(ret_slot, &casted, &storage);
                } else {
                    compiler.report(
                        ErrorImpl::ReturnTypeMismatch {
                            expected: returns.to_string(),
                            received: value.ty.to_string(),
                        },
                        token,
                    );
                }
            }
        }
        (Some(value), None) => {
            let value = gen_expression(compiler, value, None);
            if value.is_valid() {
                compiler.report(
                    ErrorImpl::ReturnTypeMismatch {
                        expected: returns.to_string(),
                        received: value.ty.to_string(),
                    },
                    token,
                );
            }
        }
        (None, Some(_)) => compiler.report(
            ErrorImpl::ReturnTypeMismatch {
                expected: returns.to_string(),
                received: String::from("void"),
            },
            token,
        ),
        (None, None) => {}
    }

    let leaving = compiler.env.frames_until(compiler.env.function_root(), true);
    compiler.release_frames(&leaving);
    compiler.builder.build_return(None).unwrap();
    compiler.open_dead_tail();
    Flow::Returned
}

fn gen_destructure_decl(
    compiler: &mut Compiler<'_, '_>,
    targets: &[(Option<TypeExpr>, TokenId)],
    value: ExprId,
    token: TokenId,
) {
    let ast = compiler.ast;

    let mut declared = vec![];
    for (ty, _) in targets {
        declared.push(ty.as_ref().map(|ty| compiler.resolve_type(ty)));
    }
    let hint = declared
        .iter()
        .all(Option::is_some)
        .then(|| Type::tuple(declared.iter().flatten().cloned().collect()));

    let source = gen_expression(compiler, value, hint.as_ref());
    if !source.is_valid() {
        return;
    }
    if source.ty.kind != TypeKind::Tuple {
        compiler.report(
            ErrorImpl::TypeMismatch {
                expected: String::from("tuple"),
                received: source.ty.to_string(),
            },
            token,
        );
        return;
    }
    if source.ty.inner.len() != targets.len() {
        compiler.report(
            ErrorImpl::ArgumentCount {
                expected: source.ty.inner.len(),
                received: targets.len(),
            },
            token,
        );
        return;
    }
    let Some(base) = source.address() else {
        return;
    };

    for (index, (_, name)) in targets.iter().enumerate() {
        let variable = ast.lexeme(*name);
        if variable == DISCARD {
            continue;
        }

        let component = source.ty.inner[index].clone();
        let ty = declared[index].clone().unwrap_or_else(|| component.clone());
        if !ty.is_valid {
            continue;
        }
        let storage = ty.clone().with_const(false).with_reference(false);

        let address = compiler.field_address(base, &source.ty, index as u32);
        let item = compiler.implicit_cast(&Value::storage(component, address), &storage, *name);
        if !item.is_valid() {
            continue;
        }

        let slot = compiler.variable_slot(&storage, variable);
        compiler.copy_storage(slot, &item, &storage);
        compiler.register_cleanup(slot, &storage);
        if let Err(error) = compiler
            .env
            .define_variable(variable, Value::storage(ty.with_reference(false), slot))
        {
            compiler.report(error, *name);
        }
    }
}
