use inkwell::{values::BasicValue, AddressSpace};

use crate::{
    ast::{
        ast::{ExprId, StmtId, TokenId},
        expressions::{AssignOp, Expr, FormatPart, Literal, LogicalOp},
        types::TypeExpr,
    },
    errors::errors::ErrorImpl,
    types::types::{Type, TypeKind},
};

use super::{
    aggregates::{CallTarget, FunctionBody, FunctionDescriptor},
    builtins::{lower_intrinsic, lower_native},
    compiler::Compiler,
    environment::DISCARD,
    value::Value,
};

/// Generates the IR of an expression.
///
/// `expected` is the type the surrounding code wants; literals and
/// container literals are built directly in it when they can be.
pub fn gen_expression<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    id: ExprId,
    expected: Option<&Type>,
) -> Value<'ctx> {
    let ast = compiler.ast;

    match ast.expr(id) {
        Expr::Literal { value, token } => gen_literal(compiler, value, expected, *token),
        Expr::Variable { name } => match compiler.env.get_variable(ast.lexeme(*name)) {
            Some(value) => value.with_token(*name),
            None => {
                compiler.report(
                    ErrorImpl::UnknownVariable {
                        name: String::from(ast.lexeme(*name)),
                    },
                    *name,
                );
                Value::invalid()
            }
        },
        Expr::Assignment {
            target,
            op,
            value,
            token,
        } => gen_assignment(compiler, *target, *op, *value, *token),
        Expr::Binary {
            left,
            op,
            right,
            token,
        } => {
            let arithmetic = expected.filter(|ty| !op.is_comparison() && ty.is_numeric());
            let left = gen_expression(compiler, *left, arithmetic);
            let hint = left.ty.is_numeric().then(|| left.ty.clone());
            let right = gen_expression(compiler, *right, hint.as_ref());
            compiler.binary_op(*op, &left, &right, *token)
        }
        Expr::Logical {
            left,
            op,
            right,
            token,
        } => gen_logical(compiler, *left, *op, *right, *token),
        Expr::Unary { op, operand, token } => {
            let operand = gen_expression(compiler, *operand, expected);
            compiler.unary_op(*op, &operand, *token)
        }
        Expr::Call { callee, args } => gen_call(compiler, *callee, args),
        Expr::Group { items, token } => {
            if items.len() == 1 {
                return gen_expression(compiler, items[0], expected);
            }
            gen_tuple(compiler, items, expected, *token)
        }
        Expr::Index {
            target,
            index,
            token,
        } => {
            let container = gen_expression(compiler, *target, None);
            let key = index_hint(&container.ty);
            let index = gen_expression(compiler, *index, key.as_ref());
            compiler.get_at_index(&container, &index, *token)
        }
        Expr::Range { start, end, token } => {
            let start = gen_expression(compiler, *start, None);
            let hint = start.ty.is_integer().then(|| start.ty.clone());
            let end = gen_expression(compiler, *end, hint.as_ref());
            compiler.range_value(&start, &end, *token)
        }
        Expr::Replicate {
            value,
            count,
            token,
        } => {
            let element = expected
                .filter(|ty| matches!(ty.kind, TypeKind::FixedVec | TypeKind::DynVec))
                .and_then(|ty| ty.element().cloned());
            let item = gen_expression(compiler, *value, element.as_ref());
            let count = gen_expression(compiler, *count, None);
            compiler.replicate(&item, &count, expected, *token)
        }
        Expr::StructLiteral { name, fields } => gen_struct_literal(compiler, *name, fields),
        Expr::Destructure {
            targets,
            value,
            token,
        } => gen_destructure(compiler, targets, *value, *token),
        Expr::MemberGet { object, member } => {
            let object = gen_expression(compiler, *object, None);
            compiler.member_address(&object, ast.lexeme(*member), *member)
        }
        Expr::MemberSet {
            object,
            member,
            value,
        } => {
            let object = gen_expression(compiler, *object, None);
            let target = compiler.member_address(&object, ast.lexeme(*member), *member);
            if !target.is_valid() {
                return Value::invalid();
            }
            let hint = target.ty.clone().with_const(false);
            let value = gen_expression(compiler, *value, Some(&hint));
            compiler.replace(&target, &value, *member)
        }
        Expr::Functor {
            params,
            ret,
            body,
            token,
        } => gen_functor(compiler, params, ret.as_ref(), *body, *token),
        Expr::Format { parts, token } => {
            let mut strings = vec![];
            for part in parts {
                let piece = match part {
                    FormatPart::Text(text) => compiler.string_literal(text),
                    FormatPart::Expr(inner) => {
                        let value = gen_expression(compiler, *inner, None);
                        compiler.to_display_string(&value, *token)
                    }
                };
                if !piece.is_valid() {
                    return Value::invalid();
                }
                strings.push(piece);
            }
            compiler.concat_strings(strings, *token)
        }
        Expr::Cast {
            value,
            target,
            token,
        } => {
            let target = compiler.resolve_type(target);
            let hint = target.is_numeric().then(|| target.clone());
            let value = gen_expression(compiler, *value, hint.as_ref());
            compiler.cast(&value, &target, *token)
        }
    }
}

/// Expected type of an index expression.
fn index_hint(container: &Type) -> Option<Type> {
    match container.kind {
        TypeKind::Map => container.inner.first().cloned(),
        _ => None,
    }
}

fn gen_literal<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    literal: &Literal,
    expected: Option<&Type>,
    token: TokenId,
) -> Value<'ctx> {
    let value = match literal {
        Literal::Int(value) => compiler.int_literal(*value, expected),
        Literal::Float(value) => compiler.float_literal(*value, expected),
        Literal::Bool(value) => compiler.bool_literal(*value),
        Literal::Str(value) => compiler.string_literal(value),
        Literal::Enum(value) => compiler.enum_literal(value),
        Literal::Container(items) => {
            let items = gen_container_items(compiler, items, expected);
            compiler.container_literal(items, expected, token)
        }
        Literal::Pair(..) => {
            compiler.report(
                ErrorImpl::MalformedContainer {
                    reason: String::from("key/value pair outside a container literal"),
                },
                token,
            );
            Value::invalid()
        }
    };

    value.with_token(token)
}

/// Evaluates the items of a container literal; `k: v` items become pair
/// values.
fn gen_container_items<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    items: &[ExprId],
    expected: Option<&Type>,
) -> Vec<Value<'ctx>> {
    let ast = compiler.ast;

    let (key_hint, element_hint) = match expected {
        Some(ty) if ty.kind == TypeKind::Map => (ty.inner.first().cloned(), ty.inner.get(1).cloned()),
        Some(ty) => (None, ty.element().cloned()),
        None => (None, None),
    };

    let mut values = vec![];
    let mut first_key: Option<Type> = None;
    let mut first_element: Option<Type> = None;

    for &item in items {
        match ast.expr(item) {
            Expr::Literal {
                value: Literal::Pair(key, value),
                ..
            } => {
                let key_expected = key_hint.clone().or_else(|| first_key.clone());
                let value_expected = element_hint.clone().or_else(|| first_element.clone());
                let key = gen_expression(compiler, *key, key_expected.as_ref());
                let value = gen_expression(compiler, *value, value_expected.as_ref());
                first_key.get_or_insert_with(|| key.ty.clone());
                first_element.get_or_insert_with(|| value.ty.clone());
                values.push(Value::key_value(key, value));
            }
            _ => {
                let expected = element_hint.clone().or_else(|| first_element.clone());
                let value = gen_expression(compiler, item, expected.as_ref());
                first_element.get_or_insert_with(|| value.ty.clone());
                values.push(value);
            }
        }
    }

    values
}

fn gen_assignment<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    target: ExprId,
    op: AssignOp,
    value: ExprId,
    token: TokenId,
) -> Value<'ctx> {
    let ast = compiler.ast;

    // Runtime containers are written through their store primitive.
    if let Expr::Index {
        target: container,
        index,
        ..
    } = ast.expr(target)
    {
        let container = gen_expression(compiler, *container, None);
        if matches!(container.ty.kind, TypeKind::DynVec | TypeKind::Map) {
            let key = index_hint(&container.ty);
            let index = gen_expression(compiler, *index, key.as_ref());
            let element = container.ty.element().cloned();
            let mut item = gen_expression(compiler, value, element.as_ref());
            if let Some(binary) = op.binary() {
                let current = compiler.get_at_index(&container, &index, token);
                item = compiler.binary_op(binary, &current, &item, token);
            }
            return compiler.store_at_index(&container, &index, &item, token);
        }

        let key = index_hint(&container.ty);
        let index = gen_expression(compiler, *index, key.as_ref());
        let current = compiler.get_at_index(&container, &index, token);
        return assign_to(compiler, &current, op, value, token);
    }

    let current = gen_expression(compiler, target, None);
    assign_to(compiler, &current, op, value, token)
}

fn assign_to<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    target: &Value<'ctx>,
    op: AssignOp,
    value: ExprId,
    token: TokenId,
) -> Value<'ctx> {
    if !target.is_valid() {
        return Value::invalid();
    }

    let hint = target.ty.clone().with_const(false);
    let mut item = gen_expression(compiler, value, Some(&hint));
    if let Some(binary) = op.binary() {
        item = compiler.binary_op(binary, target, &item, token);
    }
    compiler.replace(target, &item, token)
}

fn gen_logical<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    left: ExprId,
    op: LogicalOp,
    right: ExprId,
    token: TokenId,
) -> Value<'ctx> {
    let symbol = match op {
        LogicalOp::And => "and",
        LogicalOp::Or => "or",
    };

    let left = gen_expression(compiler, left, Some(&Type::boolean()));
    if !left.is_valid() {
        return Value::invalid();
    }
    if left.ty.kind != TypeKind::Bool {
        compiler.report(
            ErrorImpl::InvalidOperands {
                op: String::from(symbol),
                left: left.ty.to_string(),
                right: String::from("bool"),
            },
            token,
        );
        return Value::invalid();
    }
    let Some(condition) = compiler.materialize(&left) else {
        return Value::invalid();
    };
    let Some(left_block) = compiler.builder.get_insert_block() else {
        return Value::invalid();
    };

    let rhs_block = compiler.append_block("logic.rhs");
    let merge_block = compiler.append_block("logic.end");
    match op {
        LogicalOp::And => compiler
            .builder
            .build_conditional_branch(condition.into_int_value(), rhs_block, merge_block)
            .unwrap(),
        LogicalOp::Or => compiler
            .builder
            .build_conditional_branch(condition.into_int_value(), merge_block, rhs_block)
            .unwrap(),
    };

    compiler.builder.position_at_end(rhs_block);
    let right = gen_expression(compiler, right, Some(&Type::boolean()));
    let right_value = if right.is_valid() && right.ty.kind == TypeKind::Bool {
        compiler.materialize(&right)
    } else {
        if right.is_valid() {
            compiler.report(
                ErrorImpl::InvalidOperands {
                    op: String::from(symbol),
                    left: String::from("bool"),
                    right: right.ty.to_string(),
                },
                token,
            );
        }
        None
    };
    let right_end = compiler.builder.get_insert_block().unwrap_or(rhs_block);
    compiler.branch_to(merge_block);

    compiler.builder.position_at_end(merge_block);
    let Some(right_value) = right_value else {
        return Value::invalid();
    };

    let short_circuit = compiler
        .context
        .bool_type()
        .const_int(u64::from(op == LogicalOp::Or), false);
    let phi = compiler
        .builder
        .build_phi(compiler.context.bool_type(), "logic")
        .unwrap();
    phi.add_incoming(&[
        (&short_circuit as &dyn BasicValue<'ctx>, left_block),
        (&right_value, right_end),
    ]);

    Value::materialized(Type::boolean(), phi.as_basic_value())
}

fn gen_call<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    callee: TokenId,
    args: &[ExprId],
) -> Value<'ctx> {
    let ast = compiler.ast;
    let path = ast.lexeme(callee);

    if let Some(function) = compiler.env.get_function(path) {
        if !function.is_valid {
            return Value::invalid();
        }
        return match function.body {
            FunctionBody::Intrinsic(intrinsic) => lower_intrinsic(compiler, intrinsic, args, callee),
            FunctionBody::Native(native) => lower_native(compiler, &function, native, args, callee),
            FunctionBody::Deferred(_) => {
                let params = function
                    .params
                    .iter()
                    .map(|(_, ty)| ty.clone())
                    .collect::<Vec<Type>>();
                let Some(lowered) = compiler.lower_call_args(&params, args, callee) else {
                    return Value::invalid();
                };
                let Some(llvm) = function.llvm else {
                    return Value::invalid();
                };
                compiler.emit_call(CallTarget::Direct(llvm), &function.ret, lowered)
            }
        }
        .with_token(callee);
    }

    // Quiet fallback: a variable holding a functor.
    let Some(variable) = compiler.env.get_variable(path) else {
        compiler.report(
            ErrorImpl::UnknownFunction {
                name: String::from(path),
            },
            callee,
        );
        return Value::invalid();
    };

    if variable.ty.kind != TypeKind::Closure {
        compiler.report(
            ErrorImpl::NotCallable {
                ty: variable.ty.to_string(),
            },
            callee,
        );
        return Value::invalid();
    }

    let ret = variable
        .ty
        .closure_ret()
        .cloned()
        .unwrap_or_else(Type::void);
    let params = variable.ty.closure_params().to_vec();
    let Some(lowered) = compiler.lower_call_args(&params, args, callee) else {
        return Value::invalid();
    };
    let Some(handle) = compiler.materialize(&variable) else {
        return Value::invalid();
    };

    let fn_type = compiler.function_type(&ret, &params);
    let pointer = compiler
        .builder
        .build_pointer_cast(
            handle.into_pointer_value(),
            fn_type.ptr_type(AddressSpace::default()),
            "functor",
        )
        .unwrap();
    compiler
        .emit_call(CallTarget::Indirect(pointer), &ret, lowered)
        .with_token(callee)
}

fn gen_tuple<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    items: &[ExprId],
    expected: Option<&Type>,
    token: TokenId,
) -> Value<'ctx> {
    let hints = expected
        .filter(|ty| ty.kind == TypeKind::Tuple && ty.inner.len() == items.len())
        .map(|ty| ty.inner.clone());

    let mut values = vec![];
    for (index, &item) in items.iter().enumerate() {
        let hint = hints.as_ref().map(|hints| hints[index].clone());
        let value = gen_expression(compiler, item, hint.as_ref());
        if !value.is_valid() {
            return Value::invalid();
        }
        if value.ty.kind == TypeKind::Void || value.is_pair() {
            compiler.report(
                ErrorImpl::MalformedContainer {
                    reason: format!("tuple item of type {}", value.ty),
                },
                token,
            );
            return Value::invalid();
        }
        values.push(value);
    }

    let ty = match hints {
        Some(hints) => Type::tuple(
            hints
                .into_iter()
                .map(|hint| hint.with_const(false).with_reference(false))
                .collect(),
        ),
        None => Type::tuple(
            values
                .iter()
                .map(|value| value.ty.clone().with_const(false))
                .collect(),
        ),
    };

    let slot = compiler.temp_slot(&ty);
    for (index, value) in values.iter().enumerate() {
        let component = ty.inner[index].clone();
        let casted = compiler.implicit_cast(value, &component, token);
        if !casted.is_valid() {
            return Value::invalid();
        }
        let address = compiler.field_address(slot, &ty, index as u32);
        compiler.copy_storage(address, &casted, &component);
    }

    Value::storage(ty, slot).with_token(token)
}

fn gen_struct_literal<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    name: TokenId,
    fields: &[(TokenId, ExprId)],
) -> Value<'ctx> {
    let ast = compiler.ast;

    let Some(descriptor) = compiler
        .env
        .get_struct(ast.lexeme(name))
        .filter(|descriptor| descriptor.is_valid)
    else {
        compiler.report(
            ErrorImpl::UnknownStruct {
                name: String::from(ast.lexeme(name)),
            },
            name,
        );
        return Value::invalid();
    };

    let ty = Type::structure(&descriptor.qualified_name(), descriptor.size);
    let slot = compiler.temp_slot(&ty);
    compiler.init_storage(slot, &ty);

    let mut seen: Vec<&str> = vec![];
    for (field, value) in fields {
        let field_name = ast.lexeme(*field);
        let Some((index, member)) = descriptor.member(field_name) else {
            compiler.report(
                ErrorImpl::UnknownMember {
                    ty: descriptor.qualified_name(),
                    member: String::from(field_name),
                },
                *field,
            );
            return Value::invalid();
        };
        if seen.contains(&field_name) {
            compiler.report(
                ErrorImpl::DuplicateDefinition {
                    name: format!("{}.{}", descriptor.qualified_name(), field_name),
                },
                *field,
            );
            return Value::invalid();
        }
        seen.push(field_name);

        let member = member.clone().with_const(false);
        let value = gen_expression(compiler, *value, Some(&member));
        let casted = compiler.implicit_cast(&value, &member, *field);
        if !casted.is_valid() {
            return Value::invalid();
        }
        let address = compiler.field_address(slot, &ty, index);
        compiler.copy_storage(address, &casted, &member);
    }

    Value::storage(ty, slot).with_token(name)
}

fn gen_destructure<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    targets: &[ExprId],
    value: ExprId,
    token: TokenId,
) -> Value<'ctx> {
    let ast = compiler.ast;

    let source = gen_expression(compiler, value, None);
    if !source.is_valid() {
        return Value::invalid();
    }
    if source.ty.kind != TypeKind::Tuple {
        compiler.report(
            ErrorImpl::TypeMismatch {
                expected: String::from("tuple"),
                received: source.ty.to_string(),
            },
            token,
        );
        return Value::invalid();
    }
    if source.ty.inner.len() != targets.len() {
        compiler.report(
            ErrorImpl::ArgumentCount {
                expected: source.ty.inner.len(),
                received: targets.len(),
            },
            token,
        );
        return Value::invalid();
    }
    let Some(base) = source.address() else {
        return Value::invalid();
    };

    for (index, &target) in targets.iter().enumerate() {
        if let Expr::Variable { name } = ast.expr(target) {
            if ast.lexeme(*name) == DISCARD {
                continue;
            }
        }
        let component = source.ty.inner[index].clone();
        let address = compiler.field_address(base, &source.ty, index as u32);
        let item = Value::storage(component, address);
        let destination = gen_expression(compiler, target, None);
        compiler.replace(&destination, &item, token);
    }

    Value::void()
}

fn gen_functor<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    params: &[(TypeExpr, TokenId)],
    ret: Option<&TypeExpr>,
    body: StmtId,
    token: TokenId,
) -> Value<'ctx> {
    let ast = compiler.ast;

    let mut resolved = vec![];
    for (ty, name) in params {
        let ty = compiler.resolve_type(ty);
        resolved.push((String::from(ast.lexeme(*name)), ty.with_reference(false)));
    }
    let ret = match ret {
        Some(ret) => compiler.resolve_type(ret),
        None => Type::void(),
    };
    if !ret.is_valid || resolved.iter().any(|(_, ty)| !ty.is_valid) {
        return Value::invalid();
    }

    let index = compiler.functor_count;
    compiler.functor_count += 1;

    let param_types = resolved
        .iter()
        .map(|(_, ty)| ty.clone())
        .collect::<Vec<Type>>();
    let llvm = compiler.module.add_function(
        &format!("lang.functor.{}", index),
        compiler.function_type(&ret, &param_types),
        None,
    );

    let descriptor = FunctionDescriptor {
        name: format!("functor.{}", index),
        namespace: compiler.env.namespace().to_vec(),
        params: resolved,
        ret: ret.clone(),
        is_valid: true,
        body: FunctionBody::Deferred(body),
        llvm: Some(llvm),
    };
    compiler.lower_function_body(&descriptor, llvm, body, token);

    let handle = compiler
        .builder
        .build_pointer_cast(
            llvm.as_global_value().as_pointer_value(),
            compiler.handle_type(),
            "functor",
        )
        .unwrap();
    Value::materialized(Type::closure(ret, param_types), handle.as_basic_value_enum()).with_token(token)
}
