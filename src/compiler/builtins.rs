//! Builtin functions.
//!
//! Builtins are ordinary function descriptors in the global frame. Generic
//! ones are intrinsics lowered through the value model; the numeric ones
//! call runtime primitives directly.

use tracing::debug;

use crate::{
    ast::{
        ast::{ExprId, TokenId},
        expressions::BinaryOp,
    },
    errors::errors::ErrorImpl,
    types::types::{Type, TypeKind},
};

use super::{
    aggregates::{FunctionBody, FunctionDescriptor},
    compiler::Compiler,
    expr::gen_expression,
    runtime_abi::RuntimeFn,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Len,
    Contains,
    VecAppend,
    VecContains,
    VecReplace,
    SetInsert,
    SetContains,
    MapInsert,
    MapContains,
    StringSubstr,
    StringUpper,
    StringLower,
    StringTrim,
    MathMin,
    MathMax,
    MathAbs,
}

impl Intrinsic {
    pub fn arity(&self) -> usize {
        match self {
            Intrinsic::Len
            | Intrinsic::StringUpper
            | Intrinsic::StringLower
            | Intrinsic::StringTrim
            | Intrinsic::MathAbs => 1,
            Intrinsic::MapInsert | Intrinsic::StringSubstr => 3,
            _ => 2,
        }
    }
}

const INTRINSICS: [(&str, &str, Intrinsic); 16] = [
    ("", "len", Intrinsic::Len),
    ("", "contains", Intrinsic::Contains),
    ("vec", "append", Intrinsic::VecAppend),
    ("vec", "contains", Intrinsic::VecContains),
    ("vec", "replace", Intrinsic::VecReplace),
    ("set", "insert", Intrinsic::SetInsert),
    ("set", "contains", Intrinsic::SetContains),
    ("map", "insert", Intrinsic::MapInsert),
    ("map", "contains", Intrinsic::MapContains),
    ("string", "substr", Intrinsic::StringSubstr),
    ("string", "upper", Intrinsic::StringUpper),
    ("string", "lower", Intrinsic::StringLower),
    ("string", "trim", Intrinsic::StringTrim),
    ("math", "min", Intrinsic::MathMin),
    ("math", "max", Intrinsic::MathMax),
    ("math", "abs", Intrinsic::MathAbs),
];

fn native_signature(function: RuntimeFn) -> (Vec<Type>, Type) {
    match function {
        RuntimeFn::MathPow => (vec![Type::float(64), Type::float(64)], Type::float(64)),
        RuntimeFn::MathRandom => (vec![Type::int(64), Type::int(64)], Type::int(64)),
        _ => (vec![Type::float(64)], Type::float(64)),
    }
}

const NATIVES: [(&str, RuntimeFn); 5] = [
    ("pow", RuntimeFn::MathPow),
    ("sqrt", RuntimeFn::MathSqrt),
    ("sin", RuntimeFn::MathSin),
    ("cos", RuntimeFn::MathCos),
    ("random", RuntimeFn::MathRandom),
];

/// Registers every builtin in the global frame.
pub fn register_builtins(compiler: &mut Compiler<'_, '_>) {
    for (namespace, name, intrinsic) in INTRINSICS {
        let namespace = namespace_of(namespace);
        let descriptor = FunctionDescriptor {
            name: String::from(name),
            namespace: namespace.clone(),
            params: vec![],
            ret: Type::void(),
            is_valid: true,
            body: FunctionBody::Intrinsic(intrinsic),
            llvm: None,
        };
        // Builtins are registered first, into empty tables.
        let _ = compiler.env.define_function(&namespace, descriptor);
    }

    for (name, function) in NATIVES {
        let namespace = namespace_of("math");
        let (params, ret) = native_signature(function);
        let descriptor = FunctionDescriptor {
            name: String::from(name),
            namespace: namespace.clone(),
            params: params
                .into_iter()
                .enumerate()
                .map(|(index, ty)| (format!("arg{}", index), ty))
                .collect(),
            ret,
            is_valid: true,
            body: FunctionBody::Native(function),
            llvm: None,
        };
        let _ = compiler.env.define_function(&namespace, descriptor);
    }

    debug!(
        count = INTRINSICS.len() + NATIVES.len(),
        "builtins registered"
    );
}

fn namespace_of(namespace: &str) -> Vec<String> {
    if namespace.is_empty() {
        vec![]
    } else {
        vec![String::from(namespace)]
    }
}

/// Calls a runtime primitive with arguments converted to its signature.
pub fn lower_native<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    descriptor: &FunctionDescriptor<'ctx>,
    function: RuntimeFn,
    args: &[ExprId],
    token: TokenId,
) -> Value<'ctx> {
    let params = descriptor
        .params
        .iter()
        .map(|(_, ty)| ty.clone())
        .collect::<Vec<Type>>();
    let Some(lowered) = compiler.lower_call_args(&params, args, token) else {
        return Value::invalid();
    };

    match compiler.call_rt(function, &lowered) {
        Some(result) => Value::materialized(descriptor.ret.clone(), result),
        None => Value::invalid(),
    }
}

fn expect_kind<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    value: &Value<'ctx>,
    kinds: &[TypeKind],
    expected: &str,
    token: TokenId,
) -> bool {
    if !value.is_valid() {
        return false;
    }
    if kinds.contains(&value.ty.kind) {
        return true;
    }
    compiler.report(
        ErrorImpl::TypeMismatch {
            expected: String::from(expected),
            received: value.ty.to_string(),
        },
        token,
    );
    false
}

/// Expected type of the item argument of `contains` / `insert`.
fn key_type(container: &Type) -> Option<Type> {
    match container.kind {
        TypeKind::String => Some(Type::string()),
        TypeKind::FixedVec | TypeKind::DynVec | TypeKind::Set | TypeKind::Map => {
            container.inner.first().cloned()
        }
        _ => None,
    }
}

fn string_call<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    function: RuntimeFn,
    args: &[ExprId],
    token: TokenId,
) -> Value<'ctx> {
    let text = gen_expression(compiler, args[0], Some(&Type::string()));
    if !expect_kind(compiler, &text, &[TypeKind::String], "string", token) {
        return Value::invalid();
    }
    let Some(handle) = compiler.materialize(&text) else {
        return Value::invalid();
    };

    let mut call_args = vec![handle.into()];
    for &arg in args[1..].iter() {
        let number = gen_expression(compiler, arg, Some(&Type::int(64)));
        let number = compiler.implicit_cast(&number, &Type::int(64), token);
        let Some(number) = compiler.materialize(&number) else {
            return Value::invalid();
        };
        call_args.push(number.into());
    }

    match compiler.call_rt(function, &call_args) {
        Some(result) => compiler.owned_temp(Type::string(), result),
        None => Value::invalid(),
    }
}

fn min_max<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    op: BinaryOp,
    args: &[ExprId],
    token: TokenId,
) -> Value<'ctx> {
    let left = gen_expression(compiler, args[0], None);
    let right = gen_expression(compiler, args[1], Some(&left.ty));
    if !left.is_valid() || !right.is_valid() {
        return Value::invalid();
    }
    if !left.ty.is_numeric() || !right.ty.is_numeric() {
        compiler.report(
            ErrorImpl::InvalidOperands {
                op: String::from(if op == BinaryOp::Less { "min" } else { "max" }),
                left: left.ty.to_string(),
                right: right.ty.to_string(),
            },
            token,
        );
        return Value::invalid();
    }

    let common = left.ty.widen(&right.ty);
    let left = compiler.implicit_cast(&left, &common, token);
    let right = compiler.implicit_cast(&right, &common, token);
    let pick_left = compiler.binary_op(op, &left, &right, token);

    let (Some(condition), Some(l), Some(r)) = (
        compiler.materialize(&pick_left),
        compiler.materialize(&left),
        compiler.materialize(&right),
    ) else {
        return Value::invalid();
    };
    let result = compiler
        .builder
        .build_select(condition.into_int_value(), l, r, "pick")
        .unwrap();
    Value::materialized(common, result)
}

fn abs<'ctx>(compiler: &mut Compiler<'_, 'ctx>, args: &[ExprId], token: TokenId) -> Value<'ctx> {
    let value = gen_expression(compiler, args[0], None);
    if !value.is_valid() {
        return Value::invalid();
    }
    let ty = value.ty.clone().with_const(false);
    let Some(materialized) = compiler.materialize(&value) else {
        return Value::invalid();
    };

    if ty.is_float() {
        let result = compiler.float_abs(materialized.into_float_value());
        return Value::materialized(ty, result.into());
    }

    if ty.is_integer() {
        let int = materialized.into_int_value();
        let negative = compiler
            .builder
            .build_int_compare(
                inkwell::IntPredicate::SLT,
                int,
                int.get_type().const_zero(),
                "neg",
            )
            .unwrap();
        let negated = compiler.builder.build_int_neg(int, "ineg").unwrap();
        let result = compiler
            .builder
            .build_select(negative, negated, int, "abs")
            .unwrap();
        return Value::materialized(ty, result);
    }

    compiler.report(
        ErrorImpl::InvalidOperands {
            op: String::from("abs"),
            left: ty.to_string(),
            right: String::from("-"),
        },
        token,
    );
    Value::invalid()
}

/// Lowers a call of an intrinsic builtin.
pub fn lower_intrinsic<'ctx>(
    compiler: &mut Compiler<'_, 'ctx>,
    intrinsic: Intrinsic,
    args: &[ExprId],
    token: TokenId,
) -> Value<'ctx> {
    if args.len() != intrinsic.arity() {
        compiler.report(
            ErrorImpl::ArgumentCount {
                expected: intrinsic.arity(),
                received: args.len(),
            },
            token,
        );
        return Value::invalid();
    }

    match intrinsic {
        Intrinsic::Len => {
            let container = gen_expression(compiler, args[0], None);
            compiler.length(&container, token)
        }
        Intrinsic::Contains
        | Intrinsic::VecContains
        | Intrinsic::SetContains
        | Intrinsic::MapContains => {
            let container = gen_expression(compiler, args[0], None);
            let kinds: &[TypeKind] = match intrinsic {
                Intrinsic::VecContains => &[TypeKind::FixedVec, TypeKind::DynVec],
                Intrinsic::SetContains => &[TypeKind::Set],
                Intrinsic::MapContains => &[TypeKind::Map],
                _ => &[
                    TypeKind::FixedVec,
                    TypeKind::DynVec,
                    TypeKind::Set,
                    TypeKind::Map,
                    TypeKind::String,
                ],
            };
            if !expect_kind(compiler, &container, kinds, "container", token) {
                return Value::invalid();
            }
            let expected = key_type(&container.ty);
            let item = gen_expression(compiler, args[1], expected.as_ref());
            compiler.contains(&container, &item, token)
        }
        Intrinsic::VecAppend => {
            let container = gen_expression(compiler, args[0], None);
            let expected = container.ty.element().cloned();
            let item = gen_expression(compiler, args[1], expected.as_ref());
            compiler.append(&container, &item, token)
        }
        Intrinsic::VecReplace => {
            let target = gen_expression(compiler, args[0], None);
            if !target.is_valid() {
                return Value::invalid();
            }
            let expected = target.ty.clone().with_const(false);
            let source = gen_expression(compiler, args[1], Some(&expected));
            let replaced = compiler.replace(&target, &source, token);
            if replaced.is_valid() {
                Value::void()
            } else {
                replaced
            }
        }
        Intrinsic::SetInsert => {
            let container = gen_expression(compiler, args[0], None);
            if !expect_kind(compiler, &container, &[TypeKind::Set], "set<K>", token) {
                return Value::invalid();
            }
            let expected = key_type(&container.ty);
            let key = gen_expression(compiler, args[1], expected.as_ref());
            compiler.insert(&container, &key, None, token)
        }
        Intrinsic::MapInsert => {
            let container = gen_expression(compiler, args[0], None);
            if !expect_kind(compiler, &container, &[TypeKind::Map], "map<K, V>", token) {
                return Value::invalid();
            }
            let key_expected = key_type(&container.ty);
            let value_expected = container.ty.element().cloned();
            let key = gen_expression(compiler, args[1], key_expected.as_ref());
            let value = gen_expression(compiler, args[2], value_expected.as_ref());
            compiler.insert(&container, &key, Some(&value), token)
        }
        Intrinsic::StringSubstr => string_call(compiler, RuntimeFn::StringSubstr, args, token),
        Intrinsic::StringUpper => string_call(compiler, RuntimeFn::StringUpper, args, token),
        Intrinsic::StringLower => string_call(compiler, RuntimeFn::StringLower, args, token),
        Intrinsic::StringTrim => string_call(compiler, RuntimeFn::StringTrim, args, token),
        Intrinsic::MathMin => min_max(compiler, BinaryOp::Less, args, token),
        Intrinsic::MathMax => min_max(compiler, BinaryOp::Greater, args, token),
        Intrinsic::MathAbs => abs(compiler, args, token),
    }
}
