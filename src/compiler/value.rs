//! Values and the operations lowered on them.
//!
//! A [`Value`] describes a typed result of code generation: either the
//! address it lives at or a materialized LLVM value. Values never own
//! anything; heap resources are owned by the scope frame that registered
//! their slot.

use inkwell::{
    types::{BasicType, BasicTypeEnum},
    values::{BasicValue, BasicValueEnum, FloatValue, IntValue, PointerValue},
    FloatPredicate, IntPredicate,
};

use crate::{
    ast::{ast::TokenId, expressions::BinaryOp, expressions::UnaryOp},
    errors::errors::ErrorImpl,
    types::types::{Type, TypeKind},
};

use super::{compiler::Compiler, runtime_abi::RuntimeFn};

/// Absolute tolerance of `~=`.
pub const APPROX_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Repr<'ctx> {
    Invalid,
    Void,
    /// Address of the value, to be loaded
    Storage(PointerValue<'ctx>),
    /// Ready to use
    Materialized(BasicValueEnum<'ctx>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value<'ctx> {
    pub ty: Type,
    pub repr: Repr<'ctx>,
    pub token: Option<TokenId>,
    /// Key and value of a `k: v` item while a map literal is built
    pub pair: Option<Box<(Value<'ctx>, Value<'ctx>)>>,
}

impl<'ctx> Value<'ctx> {
    pub fn invalid() -> Self {
        Value {
            ty: Type::invalid(),
            repr: Repr::Invalid,
            token: None,
            pair: None,
        }
    }

    pub fn void() -> Self {
        Value {
            ty: Type::void(),
            repr: Repr::Void,
            token: None,
            pair: None,
        }
    }

    pub fn storage(ty: Type, ptr: PointerValue<'ctx>) -> Self {
        Value {
            ty,
            repr: Repr::Storage(ptr),
            token: None,
            pair: None,
        }
    }

    pub fn materialized(ty: Type, value: BasicValueEnum<'ctx>) -> Self {
        Value {
            ty,
            repr: Repr::Materialized(value),
            token: None,
            pair: None,
        }
    }

    pub fn key_value(key: Value<'ctx>, value: Value<'ctx>) -> Self {
        Value {
            ty: Type::void(),
            repr: Repr::Void,
            token: key.token,
            pair: Some(Box::new((key, value))),
        }
    }

    pub fn with_token(mut self, token: TokenId) -> Self {
        self.token = Some(token);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.ty.is_valid && self.repr != Repr::Invalid
    }

    pub fn is_pair(&self) -> bool {
        self.pair.is_some()
    }

    pub fn address(&self) -> Option<PointerValue<'ctx>> {
        match self.repr {
            Repr::Storage(ptr) => Some(ptr),
            _ => None,
        }
    }
}

/// Zero of any first-class type; null for handles.
pub fn zero_value(ty: BasicTypeEnum<'_>) -> BasicValueEnum<'_> {
    match ty {
        BasicTypeEnum::ArrayType(t) => t.const_zero().into(),
        BasicTypeEnum::FloatType(t) => t.const_zero().into(),
        BasicTypeEnum::IntType(t) => t.const_zero().into(),
        BasicTypeEnum::PointerType(t) => t.const_null().into(),
        BasicTypeEnum::StructType(t) => t.const_zero().into(),
        BasicTypeEnum::VectorType(t) => t.const_zero().into(),
    }
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    /// Loads a value held in storage. Aggregates stay addressed.
    pub fn from_storage(&self, value: &Value<'ctx>) -> Value<'ctx> {
        match value.repr {
            Repr::Storage(ptr) if !value.ty.is_aggregate() => {
                let loaded = self
                    .builder
                    .build_load(ptr, "load")
                    .unwrap();
                Value {
                    repr: Repr::Materialized(loaded),
                    ..value.clone()
                }
            }
            _ => value.clone(),
        }
    }

    /// The LLVM value of a scalar or handle, loading it when needed.
    pub fn materialize(&self, value: &Value<'ctx>) -> Option<BasicValueEnum<'ctx>> {
        match self.from_storage(value).repr {
            Repr::Materialized(materialized) => Some(materialized),
            _ => None,
        }
    }

    fn materialize_int(&self, value: &Value<'ctx>) -> Option<IntValue<'ctx>> {
        self.materialize(value)
            .filter(|v| v.is_int_value())
            .map(|v| v.into_int_value())
    }

    pub fn int_literal(&self, literal: i64, expected: Option<&Type>) -> Value<'ctx> {
        match expected {
            Some(ty) if ty.is_integer() => {
                let int_type = self.llvm_type(ty).into_int_type();
                Value::materialized(
                    Type::int(ty.bit_width()),
                    int_type.const_int(literal as u64, true).into(),
                )
            }
            Some(ty) if ty.is_float() => {
                let float_type = self.llvm_type(ty).into_float_type();
                Value::materialized(
                    Type::float(ty.bit_width()),
                    float_type.const_float(literal as f64).into(),
                )
            }
            _ => Value::materialized(
                Type::int(32),
                self.context
                    .i32_type()
                    .const_int(literal as u64, true)
                    .into(),
            ),
        }
    }

    pub fn float_literal(&self, literal: f64, expected: Option<&Type>) -> Value<'ctx> {
        let ty = match expected {
            Some(ty) if ty.is_float() => Type::float(ty.bit_width()),
            _ => Type::float(64),
        };
        let float_type = self.llvm_type(&ty).into_float_type();
        Value::materialized(ty, float_type.const_float(literal).into())
    }

    pub fn bool_literal(&self, literal: bool) -> Value<'ctx> {
        Value::materialized(
            Type::boolean(),
            self.context
                .bool_type()
                .const_int(literal as u64, false)
                .into(),
        )
    }

    /// Owned string built from literal text, registered for cleanup.
    pub fn string_literal(&mut self, literal: &str) -> Value<'ctx> {
        let text = self
            .builder
            .build_global_string_ptr(literal, "str")
            .unwrap()
            .as_pointer_value();
        let handle = self
            .call_rt(RuntimeFn::StringFromCstr, &[text.into()])
            .unwrap_or_else(|| self.handle_type().const_null().into());
        self.owned_temp(Type::string(), handle)
    }

    pub fn enum_literal(&mut self, literal: &str) -> Value<'ctx> {
        let id = self.ctx.enums.intern(literal);
        Value::materialized(
            Type::enumeration(),
            self.context.i32_type().const_int(id as u64, true).into(),
        )
    }

    /// Converts between numeric types (and bool to integer).
    pub fn convert_numeric(
        &self,
        value: BasicValueEnum<'ctx>,
        from: &Type,
        to: &Type,
    ) -> BasicValueEnum<'ctx> {
        let target = self.llvm_type(to);

        if from.kind == TypeKind::Bool && to.is_integer() {
            return self
                .builder
                .build_int_z_extend(value.into_int_value(), target.into_int_type(), "zext")
                .unwrap()
                .into();
        }

        match (from.is_integer(), to.is_integer()) {
            (true, true) => {
                let (from_bits, to_bits) = (from.bit_width(), to.bit_width());
                let int = value.into_int_value();
                if from_bits < to_bits {
                    self.builder
                        .build_int_s_extend(int, target.into_int_type(), "sext")
                        .unwrap()
                        .into()
                } else if from_bits > to_bits {
                    self.builder
                        .build_int_truncate(int, target.into_int_type(), "trunc")
                        .unwrap()
                        .into()
                } else {
                    value
                }
            }
            (true, false) => self
                .builder
                .build_signed_int_to_float(value.into_int_value(), target.into_float_type(), "sitofp")
                .unwrap()
                .into(),
            (false, true) => self
                .builder
                .build_float_to_signed_int(value.into_float_value(), target.into_int_type(), "fptosi")
                .unwrap()
                .into(),
            (false, false) => {
                let (from_bits, to_bits) = (from.bit_width(), to.bit_width());
                let float = value.into_float_value();
                if from_bits < to_bits {
                    self.builder
                        .build_float_ext(float, target.into_float_type(), "fpext")
                        .unwrap()
                        .into()
                } else if from_bits > to_bits {
                    self.builder
                        .build_float_trunc(float, target.into_float_type(), "fptrunc")
                        .unwrap()
                        .into()
                } else {
                    value
                }
            }
        }
    }

    fn numeric_operand(&self, value: &Value<'ctx>, to: &Type) -> BasicValueEnum<'ctx> {
        let materialized = self
            .materialize(value)
            .unwrap_or_else(|| zero_value(self.llvm_type(to)));
        self.convert_numeric(materialized, &value.ty, to)
    }

    fn invalid_operands(
        &mut self,
        op: &str,
        left: &Type,
        right: &Type,
        token: TokenId,
    ) -> Value<'ctx> {
        self.report(
            ErrorImpl::InvalidOperands {
                op: String::from(op),
                left: left.to_string(),
                right: right.to_string(),
            },
            token,
        );
        Value::invalid()
    }

    pub fn float_abs(&self, value: FloatValue<'ctx>) -> FloatValue<'ctx> {
        let negative = self
            .builder
            .build_float_compare(
                FloatPredicate::OLT,
                value,
                value.get_type().const_zero(),
                "neg",
            )
            .unwrap();
        let negated = self.builder.build_float_neg(value, "fneg").unwrap();
        self.builder
            .build_select(negative, negated, value, "abs")
            .unwrap()
            .into_float_value()
    }

    /// Lowers a binary operator. Operands of different numeric types are
    /// widened to a common type first.
    pub fn binary_op(
        &mut self,
        op: BinaryOp,
        left: &Value<'ctx>,
        right: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !left.is_valid() || !right.is_valid() {
            return Value::invalid();
        }

        let (lt, rt) = (left.ty.clone(), right.ty.clone());

        if lt.is_numeric() && rt.is_numeric() {
            return self.numeric_binary(op, left, right, token);
        }

        match (lt.kind, rt.kind) {
            (TypeKind::String, TypeKind::String) => self.string_binary(op, left, right, token),
            (TypeKind::Bool, TypeKind::Bool) | (TypeKind::Enum, TypeKind::Enum) => {
                let predicate = match op {
                    BinaryOp::Eq => IntPredicate::EQ,
                    BinaryOp::NotEq => IntPredicate::NE,
                    _ => return self.invalid_operands(op.symbol(), &lt, &rt, token),
                };
                let (Some(l), Some(r)) = (self.materialize_int(left), self.materialize_int(right))
                else {
                    return Value::invalid();
                };
                let result = self
                    .builder
                    .build_int_compare(predicate, l, r, "cmp")
                    .unwrap();
                Value::materialized(Type::boolean(), result.into())
            }
            _ => self.invalid_operands(op.symbol(), &lt, &rt, token),
        }
    }

    fn numeric_binary(
        &mut self,
        op: BinaryOp,
        left: &Value<'ctx>,
        right: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        let common = left.ty.widen(&right.ty);

        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) && common.is_float() {
            self.report(ErrorImpl::FloatEquality, token);
            return Value::invalid();
        }

        if op == BinaryOp::ApproxEq {
            let f64_type = Type::float(64);
            let l = self.numeric_operand(left, &f64_type).into_float_value();
            let r = self.numeric_operand(right, &f64_type).into_float_value();
            let difference = self.builder.build_float_sub(l, r, "diff").unwrap();
            let distance = self.float_abs(difference);
            let epsilon = self.context.f64_type().const_float(APPROX_EPSILON);
            let result = self
                .builder
                .build_float_compare(FloatPredicate::OLE, distance, epsilon, "approx")
                .unwrap();
            return Value::materialized(Type::boolean(), result.into());
        }

        // Division always yields a float.
        let common = if op == BinaryOp::Div && !common.is_float() {
            Type::float(64)
        } else {
            common
        };

        let l = self.numeric_operand(left, &common);
        let r = self.numeric_operand(right, &common);

        if common.is_float() {
            let (l, r) = (l.into_float_value(), r.into_float_value());
            let predicate = match op {
                BinaryOp::Less => Some(FloatPredicate::OLT),
                BinaryOp::LessEq => Some(FloatPredicate::OLE),
                BinaryOp::Greater => Some(FloatPredicate::OGT),
                BinaryOp::GreaterEq => Some(FloatPredicate::OGE),
                _ => None,
            };
            if let Some(predicate) = predicate {
                let result = self
                    .builder
                    .build_float_compare(predicate, l, r, "fcmp")
                    .unwrap();
                return Value::materialized(Type::boolean(), result.into());
            }

            let result = match op {
                BinaryOp::Add => self.builder.build_float_add(l, r, "fadd"),
                BinaryOp::Sub => self.builder.build_float_sub(l, r, "fsub"),
                BinaryOp::Mul => self.builder.build_float_mul(l, r, "fmul"),
                BinaryOp::Div => self.builder.build_float_div(l, r, "fdiv"),
                _ => self.builder.build_float_rem(l, r, "frem"),
            }
            .unwrap();
            return Value::materialized(common, result.as_basic_value_enum());
        }

        let (l, r) = (l.into_int_value(), r.into_int_value());
        let predicate = match op {
            BinaryOp::Eq => Some(IntPredicate::EQ),
            BinaryOp::NotEq => Some(IntPredicate::NE),
            BinaryOp::Less => Some(IntPredicate::SLT),
            BinaryOp::LessEq => Some(IntPredicate::SLE),
            BinaryOp::Greater => Some(IntPredicate::SGT),
            BinaryOp::GreaterEq => Some(IntPredicate::SGE),
            _ => None,
        };
        if let Some(predicate) = predicate {
            let result = self
                .builder
                .build_int_compare(predicate, l, r, "icmp")
                .unwrap();
            return Value::materialized(Type::boolean(), result.into());
        }

        let result = match op {
            BinaryOp::Add => self.builder.build_int_add(l, r, "add"),
            BinaryOp::Sub => self.builder.build_int_sub(l, r, "sub"),
            BinaryOp::Mul => self.builder.build_int_mul(l, r, "mul"),
            _ => return self.int_remainder(common, l, r),
        }
        .unwrap();
        Value::materialized(common, result.into())
    }

    /// `%` goes through the runtime so a zero divisor becomes a recorded
    /// fault instead of a trap.
    fn int_remainder(&self, ty: Type, l: IntValue<'ctx>, r: IntValue<'ctx>) -> Value<'ctx> {
        let i64_type = self.context.i64_type();
        let widen = |value: IntValue<'ctx>| {
            if ty.bit_width() == 64 {
                value
            } else {
                self.builder
                    .build_int_s_extend(value, i64_type, "sext")
                    .unwrap()
            }
        };
        let (l, r) = (widen(l), widen(r));
        let Some(result) = self.call_rt(RuntimeFn::MathMod, &[l.into(), r.into()]) else {
            return Value::invalid();
        };
        let result = result.into_int_value();
        let result = if ty.bit_width() == 64 {
            result
        } else {
            self.builder
                .build_int_truncate(result, self.llvm_type(&ty).into_int_type(), "trunc")
                .unwrap()
        };
        Value::materialized(ty, result.into())
    }

    fn string_binary(
        &mut self,
        op: BinaryOp,
        left: &Value<'ctx>,
        right: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        let (Some(l), Some(r)) = (self.materialize(left), self.materialize(right)) else {
            return Value::invalid();
        };

        if op == BinaryOp::Add {
            let Some(joined) = self.call_rt(RuntimeFn::StringConcat, &[l.into(), r.into()]) else {
                return Value::invalid();
            };
            return self.owned_temp(Type::string(), joined);
        }

        let predicate = match op {
            BinaryOp::Eq => IntPredicate::EQ,
            BinaryOp::NotEq => IntPredicate::NE,
            BinaryOp::Less => IntPredicate::SLT,
            BinaryOp::LessEq => IntPredicate::SLE,
            BinaryOp::Greater => IntPredicate::SGT,
            BinaryOp::GreaterEq => IntPredicate::SGE,
            _ => return self.invalid_operands(op.symbol(), &left.ty, &right.ty, token),
        };

        let Some(ordering) = self.call_rt(RuntimeFn::StringCompare, &[l.into(), r.into()]) else {
            return Value::invalid();
        };
        let result = self
            .builder
            .build_int_compare(
                predicate,
                ordering.into_int_value(),
                self.context.i32_type().const_zero(),
                "strcmp",
            )
            .unwrap();
        Value::materialized(Type::boolean(), result.into())
    }

    pub fn unary_op(&mut self, op: UnaryOp, operand: &Value<'ctx>, token: TokenId) -> Value<'ctx> {
        if !operand.is_valid() {
            return Value::invalid();
        }

        let ty = operand.ty.clone();
        let Some(value) = self.materialize(operand) else {
            return Value::invalid();
        };

        match op {
            UnaryOp::Negate if ty.is_integer() => {
                let result = self
                    .builder
                    .build_int_neg(value.into_int_value(), "neg")
                    .unwrap();
                Value::materialized(ty.with_const(false), result.into())
            }
            UnaryOp::Negate if ty.is_float() => {
                let result = self
                    .builder
                    .build_float_neg(value.into_float_value(), "fneg")
                    .unwrap();
                Value::materialized(ty.with_const(false), result.into())
            }
            UnaryOp::Not if ty.kind == TypeKind::Bool => {
                let result = self.builder.build_not(value.into_int_value(), "not").unwrap();
                Value::materialized(Type::boolean(), result.into())
            }
            _ => {
                let symbol = match op {
                    UnaryOp::Negate => "-",
                    UnaryOp::Not => "!",
                };
                self.report(
                    ErrorImpl::InvalidOperands {
                        op: String::from(symbol),
                        left: ty.to_string(),
                        right: String::from("-"),
                    },
                    token,
                );
                Value::invalid()
            }
        }
    }

    /// Implicit conversion for assignments, arguments, returns and
    /// container elements: an exact match or a numeric conversion.
    pub fn implicit_cast(
        &mut self,
        value: &Value<'ctx>,
        target: &Type,
        token: TokenId,
    ) -> Value<'ctx> {
        if !value.is_valid() || !target.is_valid {
            return Value::invalid();
        }

        if value.ty.is_type_matched(target) {
            return value.clone();
        }

        if value.ty.is_numeric() && target.is_numeric() {
            let converted = self.numeric_operand(value, target);
            return Value::materialized(target.clone().with_const(false), converted);
        }

        self.report(
            ErrorImpl::TypeMismatch {
                expected: target.to_string(),
                received: value.ty.to_string(),
            },
            token,
        );
        Value::invalid()
    }

    /// Explicit `value as type`.
    pub fn cast(&mut self, value: &Value<'ctx>, target: &Type, token: TokenId) -> Value<'ctx> {
        if !value.is_valid() || !target.is_valid {
            return Value::invalid();
        }

        let from = value.ty.clone();

        if from.is_type_matched(target) {
            return value.clone();
        }

        if target.kind == TypeKind::String {
            return self.to_display_string(value, token);
        }

        if from.is_numeric() && target.is_numeric() {
            let converted = self.numeric_operand(value, target);
            return Value::materialized(target.clone(), converted);
        }

        let Some(materialized) = self.materialize(value) else {
            return Value::invalid();
        };

        match (from.kind, target.kind) {
            (TypeKind::Bool, _) if target.is_integer() => Value::materialized(
                target.clone(),
                self.convert_numeric(materialized, &from, target),
            ),
            (_, TypeKind::Bool) if from.is_integer() => {
                let int = materialized.into_int_value();
                let result = self
                    .builder
                    .build_int_compare(IntPredicate::NE, int, int.get_type().const_zero(), "tobool")
                    .unwrap();
                Value::materialized(Type::boolean(), result.into())
            }
            (TypeKind::Enum, _) if target.is_integer() => Value::materialized(
                target.clone(),
                self.convert_numeric(materialized, &Type::int(32), target),
            ),
            (_, TypeKind::Enum) if from.is_integer() => Value::materialized(
                Type::enumeration(),
                self.convert_numeric(materialized, &from, &Type::int(32)),
            ),
            (TypeKind::String, _) if target.is_integer() => {
                let Some(parsed) = self.call_rt(RuntimeFn::StringToInt, &[materialized.into()])
                else {
                    return Value::invalid();
                };
                Value::materialized(
                    target.clone(),
                    self.convert_numeric(parsed, &Type::int(64), target),
                )
            }
            (TypeKind::String, _) if target.is_float() => {
                let Some(parsed) = self.call_rt(RuntimeFn::StringToFloat, &[materialized.into()])
                else {
                    return Value::invalid();
                };
                Value::materialized(
                    target.clone(),
                    self.convert_numeric(parsed, &Type::float(64), target),
                )
            }
            _ => {
                self.report(
                    ErrorImpl::InvalidCast {
                        from: from.to_string(),
                        to: target.to_string(),
                    },
                    token,
                );
                Value::invalid()
            }
        }
    }

    /// Printable form of a value as an owned string. Strings are returned
    /// as they are.
    pub fn to_display_string(&mut self, value: &Value<'ctx>, token: TokenId) -> Value<'ctx> {
        if !value.is_valid() {
            return Value::invalid();
        }

        let ty = value.ty.clone();
        if ty.kind == TypeKind::String {
            return value.clone();
        }

        if ty.is_aggregate() {
            return self.aggregate_to_string(value, token);
        }

        let Some(materialized) = self.materialize(value) else {
            return Value::invalid();
        };

        let converted = match ty.kind {
            TypeKind::Int16 | TypeKind::Int32 | TypeKind::Int64 => self.call_rt(
                RuntimeFn::IntToString,
                &[self
                    .convert_numeric(materialized, &ty, &Type::int(64))
                    .into()],
            ),
            TypeKind::Float32 | TypeKind::Float64 => self.call_rt(
                RuntimeFn::FloatToString,
                &[self
                    .convert_numeric(materialized, &ty, &Type::float(64))
                    .into()],
            ),
            TypeKind::Bool => self.call_rt(
                RuntimeFn::BoolToString,
                &[self
                    .convert_numeric(materialized, &ty, &Type::int(32))
                    .into()],
            ),
            TypeKind::Enum => self.call_rt(RuntimeFn::EnumToString, &[materialized.into()]),
            TypeKind::DynVec => self.call_rt(RuntimeFn::VecToString, &[materialized.into()]),
            TypeKind::Set => self.call_rt(RuntimeFn::SetToString, &[materialized.into()]),
            TypeKind::Map => self.call_rt(RuntimeFn::MapToString, &[materialized.into()]),
            _ => {
                self.report(
                    ErrorImpl::InvalidCast {
                        from: ty.to_string(),
                        to: String::from("string"),
                    },
                    token,
                );
                return Value::invalid();
            }
        };

        match converted {
            Some(handle) => self.owned_temp(Type::string(), handle),
            None => Value::invalid(),
        }
    }

    /// Joins string values into one owned string.
    pub fn concat_strings(&mut self, parts: Vec<Value<'ctx>>, token: TokenId) -> Value<'ctx> {
        let mut parts = parts.into_iter();
        let Some(mut joined) = parts.next() else {
            return self.string_literal("");
        };
        for part in parts {
            joined = self.binary_op(BinaryOp::Add, &joined, &part, token);
        }
        joined
    }
}

impl<'ctx> Value<'ctx> {
    /// Same representation under another type.
    pub fn retyped(mut self, ty: &Type) -> Self {
        self.ty = ty.clone();
        self
    }
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    /// Stores a value of any basic type into a fresh stack slot.
    pub fn spill(&self, value: BasicValueEnum<'ctx>, name: &str) -> PointerValue<'ctx> {
        let slot = self.entry_alloca(value.get_type(), name);
        self.builder.build_store(slot, value).unwrap();
        slot
    }

    pub fn basic_type_of(&self, ty: &Type) -> BasicTypeEnum<'ctx> {
        self.llvm_type(ty).as_basic_type_enum()
    }
}
