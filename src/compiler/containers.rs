//! Container operations of the value model.
//!
//! Fixed vectors and tuples live in storage and are addressed directly.
//! Dynamic vectors, sets and maps are runtime handles; their elements cross
//! the runtime ABI as 64-bit slots.

use inkwell::{values::IntValue, IntPredicate};

use crate::{
    ast::{ast::TokenId, expressions::BinaryOp},
    errors::errors::ErrorImpl,
    types::types::{Type, TypeKind},
};

use super::{compiler::Compiler, runtime_abi::RuntimeFn, value::Value};

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    /// Encodes a value of slot type `ty` as a 64-bit slot.
    pub fn to_slot_bits(&self, value: &Value<'ctx>, ty: &Type) -> Option<IntValue<'ctx>> {
        let materialized = self.materialize(value)?;
        let i64_type = self.context.i64_type();

        let bits = match ty.kind {
            TypeKind::Int16 | TypeKind::Int32 => self
                .builder
                .build_int_s_extend(materialized.into_int_value(), i64_type, "sext")
                .unwrap(),
            TypeKind::Int64 => materialized.into_int_value(),
            TypeKind::Float32 | TypeKind::Float64 => {
                let wide = if ty.kind == TypeKind::Float32 {
                    self.builder
                        .build_float_ext(
                            materialized.into_float_value(),
                            self.context.f64_type(),
                            "fpext",
                        )
                        .unwrap()
                } else {
                    materialized.into_float_value()
                };
                self.builder
                    .build_bit_cast(wide, i64_type, "bits")
                    .unwrap()
                    .into_int_value()
            }
            TypeKind::Bool | TypeKind::Enum => self
                .builder
                .build_int_z_extend(materialized.into_int_value(), i64_type, "zext")
                .unwrap(),
            TypeKind::String => self
                .builder
                .build_ptr_to_int(materialized.into_pointer_value(), i64_type, "addr")
                .unwrap(),
            _ => return None,
        };

        Some(bits)
    }

    /// Decodes a 64-bit slot. Strings come out of the runtime as fresh
    /// handles and become owned temporaries.
    pub fn from_slot_bits(&mut self, bits: IntValue<'ctx>, ty: &Type) -> Value<'ctx> {
        let value = match ty.kind {
            TypeKind::Int16 | TypeKind::Int32 => self
                .builder
                .build_int_truncate(bits, self.llvm_type(ty).into_int_type(), "trunc")
                .unwrap()
                .into(),
            TypeKind::Int64 => bits.into(),
            TypeKind::Float32 | TypeKind::Float64 => {
                let wide = self
                    .builder
                    .build_bit_cast(bits, self.context.f64_type(), "float")
                    .unwrap()
                    .into_float_value();
                if ty.kind == TypeKind::Float32 {
                    self.builder
                        .build_float_trunc(wide, self.context.f32_type(), "fptrunc")
                        .unwrap()
                        .into()
                } else {
                    wide.into()
                }
            }
            TypeKind::Bool => self
                .builder
                .build_int_compare(IntPredicate::NE, bits, bits.get_type().const_zero(), "bool")
                .unwrap()
                .into(),
            TypeKind::Enum => self
                .builder
                .build_int_truncate(bits, self.context.i32_type(), "enum")
                .unwrap()
                .into(),
            TypeKind::String => {
                let handle = self
                    .builder
                    .build_int_to_ptr(bits, self.handle_type(), "handle")
                    .unwrap();
                return self.owned_temp(Type::string(), handle.into());
            }
            _ => return Value::invalid(),
        };

        Value::materialized(ty.clone().with_const(false), value)
    }

    fn i64_value(&self, value: &Value<'ctx>) -> Option<IntValue<'ctx>> {
        let materialized = self.materialize(value)?;
        Some(
            self.convert_numeric(materialized, &value.ty, &Type::int(64))
                .into_int_value(),
        )
    }

    fn const_i64(&self, value: i64) -> IntValue<'ctx> {
        self.context.i64_type().const_int(value as u64, true)
    }

    fn truthy(&self, flag: IntValue<'ctx>) -> Value<'ctx> {
        let result = self
            .builder
            .build_int_compare(IntPredicate::NE, flag, flag.get_type().const_zero(), "flag")
            .unwrap();
        Value::materialized(Type::boolean(), result.into())
    }

    /// Constant value of an integer index, if it is one.
    pub fn constant_index(&self, index: &Value<'ctx>) -> Option<i64> {
        if !index.ty.is_integer() {
            return None;
        }
        self.materialize(index)
            .filter(|value| value.is_int_value())
            .and_then(|value| value.into_int_value().get_sign_extended_constant())
    }

    fn expect_integer_index(&mut self, index: &Value<'ctx>, token: TokenId) -> bool {
        if index.ty.is_integer() {
            return true;
        }
        self.report(
            ErrorImpl::TypeMismatch {
                expected: String::from("integer index"),
                received: index.ty.to_string(),
            },
            token,
        );
        false
    }

    /// Element cast for insertion into a container of element type
    /// `element`. Nested containers are never inserted.
    fn element_operand(
        &mut self,
        item: &Value<'ctx>,
        element: &Type,
        token: TokenId,
    ) -> Option<IntValue<'ctx>> {
        let casted = self.implicit_cast(item, element, token);
        if !casted.is_valid() {
            return None;
        }
        self.to_slot_bits(&casted, element)
    }

    fn handle_of(&self, value: &Value<'ctx>) -> Option<inkwell::values::BasicValueEnum<'ctx>> {
        self.materialize(value)
    }

    /// `len(container)` as an `i64`.
    pub fn length(&mut self, container: &Value<'ctx>, token: TokenId) -> Value<'ctx> {
        if !container.is_valid() {
            return Value::invalid();
        }

        let ty = container.ty.clone();
        let length = match ty.kind {
            TypeKind::FixedVec => Some(self.const_i64(ty.count as i64)),
            TypeKind::Tuple => Some(self.const_i64(ty.inner.len() as i64)),
            TypeKind::String | TypeKind::DynVec | TypeKind::Set | TypeKind::Map => {
                let function = match ty.kind {
                    TypeKind::String => RuntimeFn::StringLen,
                    TypeKind::DynVec => RuntimeFn::VecLen,
                    TypeKind::Set => RuntimeFn::SetLen,
                    _ => RuntimeFn::MapLen,
                };
                let handle = self.handle_of(container);
                handle
                    .and_then(|handle| self.call_rt(function, &[handle.into()]))
                    .map(|length| length.into_int_value())
            }
            _ => {
                self.report(
                    ErrorImpl::TypeMismatch {
                        expected: String::from("container or string"),
                        received: ty.to_string(),
                    },
                    token,
                );
                return Value::invalid();
            }
        };

        match length {
            Some(length) => Value::materialized(Type::int(64), length.into()),
            None => Value::invalid(),
        }
    }

    /// Membership test; keys for sets and maps, substrings for strings.
    pub fn contains(
        &mut self,
        container: &Value<'ctx>,
        item: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !container.is_valid() || !item.is_valid() {
            return Value::invalid();
        }

        let ty = container.ty.clone();
        // Membership is an equality test, so float vectors are held to the
        // same rule as `==`.
        if matches!(ty.kind, TypeKind::DynVec | TypeKind::FixedVec) && ty.inner[0].is_float() {
            self.report(ErrorImpl::FloatEquality, token);
            return Value::invalid();
        }
        match ty.kind {
            TypeKind::DynVec | TypeKind::Set | TypeKind::Map => {
                let (function, element) = match ty.kind {
                    TypeKind::DynVec => (RuntimeFn::VecContains, ty.inner[0].clone()),
                    TypeKind::Set => (RuntimeFn::SetContains, ty.inner[0].clone()),
                    _ => (RuntimeFn::MapContains, ty.inner[0].clone()),
                };
                let Some(bits) = self.element_operand(item, &element, token) else {
                    return Value::invalid();
                };
                let Some(handle) = self.handle_of(container) else {
                    return Value::invalid();
                };
                match self.call_rt(function, &[handle.into(), bits.into()]) {
                    Some(found) => self.truthy(found.into_int_value()),
                    None => Value::invalid(),
                }
            }
            TypeKind::String => {
                let needle = self.implicit_cast(item, &Type::string(), token);
                let (Some(handle), Some(needle)) =
                    (self.handle_of(container), self.materialize(&needle))
                else {
                    return Value::invalid();
                };
                match self.call_rt(RuntimeFn::StringContains, &[handle.into(), needle.into()]) {
                    Some(found) => self.truthy(found.into_int_value()),
                    None => Value::invalid(),
                }
            }
            TypeKind::FixedVec => {
                let Some(base) = container.address() else {
                    return Value::invalid();
                };
                let element = ty.inner[0].clone();
                let mut found = self.bool_literal(false);
                for index in 0..ty.count {
                    let address = self.element_address(base, &ty, self.const_i64(index as i64));
                    let current = Value::storage(element.clone(), address);
                    let equal = self.binary_op(BinaryOp::Eq, &current, item, token);
                    let (Some(left), Some(right)) =
                        (self.materialize(&found), self.materialize(&equal))
                    else {
                        return Value::invalid();
                    };
                    let either = self
                        .builder
                        .build_or(left.into_int_value(), right.into_int_value(), "any")
                        .unwrap();
                    found = Value::materialized(Type::boolean(), either.into());
                }
                found
            }
            _ => {
                self.report(
                    ErrorImpl::TypeMismatch {
                        expected: String::from("container or string"),
                        received: ty.to_string(),
                    },
                    token,
                );
                Value::invalid()
            }
        }
    }

    fn check_mutable(&mut self, target: &Value<'ctx>, token: TokenId) -> bool {
        if target.ty.is_const {
            self.report(
                ErrorImpl::ConstAssignment {
                    name: String::from(self.ast.lexeme(target.token.unwrap_or(token))),
                },
                token,
            );
            return false;
        }
        true
    }

    /// `vec::append`: dynamic vectors only, and never a container item.
    pub fn append(
        &mut self,
        container: &Value<'ctx>,
        item: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !container.is_valid() || !item.is_valid() {
            return Value::invalid();
        }

        if container.ty.kind != TypeKind::DynVec {
            self.report(
                ErrorImpl::TypeMismatch {
                    expected: String::from("vec<T>"),
                    received: container.ty.to_string(),
                },
                token,
            );
            return Value::invalid();
        }

        if item.ty.is_aggregate() || (item.ty.is_heap() && item.ty.kind != TypeKind::String) {
            self.report(ErrorImpl::ContainerAppend, token);
            return Value::invalid();
        }

        if !self.check_mutable(container, token) {
            return Value::invalid();
        }

        let element = container.ty.inner[0].clone();
        let Some(bits) = self.element_operand(item, &element, token) else {
            return Value::invalid();
        };
        let Some(handle) = self.handle_of(container) else {
            return Value::invalid();
        };
        self.call_rt(RuntimeFn::VecPush, &[handle.into(), bits.into()]);
        Value::void()
    }

    /// `set::insert(s, key)` and `map::insert(m, key, value)`.
    pub fn insert(
        &mut self,
        container: &Value<'ctx>,
        key: &Value<'ctx>,
        value: Option<&Value<'ctx>>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !container.is_valid() || !key.is_valid() {
            return Value::invalid();
        }

        let ty = container.ty.clone();
        match (ty.kind, value) {
            (TypeKind::Set, None) => {
                if !self.check_mutable(container, token) {
                    return Value::invalid();
                }
                let Some(bits) = self.element_operand(key, &ty.inner[0], token) else {
                    return Value::invalid();
                };
                let Some(handle) = self.handle_of(container) else {
                    return Value::invalid();
                };
                self.call_rt(RuntimeFn::SetInsert, &[handle.into(), bits.into()]);
                Value::void()
            }
            (TypeKind::Map, Some(value)) => {
                if !value.is_valid() || !self.check_mutable(container, token) {
                    return Value::invalid();
                }
                let Some(key_bits) = self.element_operand(key, &ty.inner[0], token) else {
                    return Value::invalid();
                };
                let Some(value_bits) = self.element_operand(value, &ty.inner[1], token) else {
                    return Value::invalid();
                };
                let Some(handle) = self.handle_of(container) else {
                    return Value::invalid();
                };
                self.call_rt(
                    RuntimeFn::MapInsert,
                    &[handle.into(), key_bits.into(), value_bits.into()],
                );
                Value::void()
            }
            (TypeKind::Set, Some(_)) | (TypeKind::Map, None) => {
                self.report(
                    ErrorImpl::ArgumentCount {
                        expected: if ty.kind == TypeKind::Set { 2 } else { 3 },
                        received: if ty.kind == TypeKind::Set { 3 } else { 2 },
                    },
                    token,
                );
                Value::invalid()
            }
            _ => {
                self.report(
                    ErrorImpl::TypeMismatch {
                        expected: String::from("set or map"),
                        received: ty.to_string(),
                    },
                    token,
                );
                Value::invalid()
            }
        }
    }

    /// Bounds-checked element address of a fixed vector.
    fn fixed_element(
        &mut self,
        container: &Value<'ctx>,
        index: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        let ty = container.ty.clone();
        let Some(base) = container.address() else {
            return Value::invalid();
        };

        let checked = match self.constant_index(index) {
            Some(constant) => {
                if constant < 0 || constant >= ty.count as i64 {
                    self.report(
                        ErrorImpl::IndexOutOfBounds {
                            index: constant,
                            length: ty.count,
                        },
                        token,
                    );
                    return Value::invalid();
                }
                self.const_i64(constant)
            }
            None => {
                let Some(dynamic) = self.i64_value(index) else {
                    return Value::invalid();
                };
                let length = self.const_i64(ty.count as i64);
                match self.call_rt(RuntimeFn::CheckIndex, &[dynamic.into(), length.into()]) {
                    Some(checked) => checked.into_int_value(),
                    None => return Value::invalid(),
                }
            }
        };

        let element = ty.inner[0].clone().with_const(ty.is_const);
        let address = self.element_address(base, &ty, checked);
        Value::storage(element, address).with_token(token)
    }

    /// `container[index]`. Fixed vectors and tuples give an addressable
    /// element; runtime containers and strings give a copy.
    pub fn get_at_index(
        &mut self,
        container: &Value<'ctx>,
        index: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !container.is_valid() || !index.is_valid() {
            return Value::invalid();
        }

        let ty = container.ty.clone();
        match ty.kind {
            TypeKind::FixedVec => {
                if !self.expect_integer_index(index, token) {
                    return Value::invalid();
                }
                self.fixed_element(container, index, token)
            }
            TypeKind::Tuple => {
                let Some(constant) = self.constant_index(index) else {
                    self.report(
                        ErrorImpl::NotIndexable {
                            ty: format!("{} with a non-constant index", ty),
                        },
                        token,
                    );
                    return Value::invalid();
                };
                if constant < 0 || constant >= ty.inner.len() as i64 {
                    self.report(
                        ErrorImpl::IndexOutOfBounds {
                            index: constant,
                            length: ty.inner.len() as u32,
                        },
                        token,
                    );
                    return Value::invalid();
                }
                let Some(base) = container.address() else {
                    return Value::invalid();
                };
                let address = self.field_address(base, &ty, constant as u32);
                let item = ty.inner[constant as usize].clone().with_const(ty.is_const);
                Value::storage(item, address).with_token(token)
            }
            TypeKind::DynVec => {
                if !self.expect_integer_index(index, token) {
                    return Value::invalid();
                }
                let (Some(handle), Some(position)) =
                    (self.handle_of(container), self.i64_value(index))
                else {
                    return Value::invalid();
                };
                match self.call_rt(RuntimeFn::VecGet, &[handle.into(), position.into()]) {
                    Some(bits) => self.from_slot_bits(bits.into_int_value(), &ty.inner[0]),
                    None => Value::invalid(),
                }
            }
            TypeKind::Map => {
                let Some(key) = self.element_operand(index, &ty.inner[0], token) else {
                    return Value::invalid();
                };
                let Some(handle) = self.handle_of(container) else {
                    return Value::invalid();
                };
                match self.call_rt(RuntimeFn::MapGet, &[handle.into(), key.into()]) {
                    Some(bits) => self.from_slot_bits(bits.into_int_value(), &ty.inner[1]),
                    None => Value::invalid(),
                }
            }
            TypeKind::String => {
                if !self.expect_integer_index(index, token) {
                    return Value::invalid();
                }
                let (Some(handle), Some(position)) =
                    (self.handle_of(container), self.i64_value(index))
                else {
                    return Value::invalid();
                };
                let Some(length) = self.call_rt(RuntimeFn::StringLen, &[handle.into()]) else {
                    return Value::invalid();
                };
                let Some(checked) =
                    self.call_rt(RuntimeFn::CheckIndex, &[position.into(), length.into()])
                else {
                    return Value::invalid();
                };
                let one = self.const_i64(1);
                match self.call_rt(
                    RuntimeFn::StringSubstr,
                    &[handle.into(), checked.into(), one.into()],
                ) {
                    Some(character) => self.owned_temp(Type::string(), character),
                    None => Value::invalid(),
                }
            }
            _ => {
                self.report(ErrorImpl::NotIndexable { ty: ty.to_string() }, token);
                Value::invalid()
            }
        }
    }

    /// `container[index] = item`.
    pub fn store_at_index(
        &mut self,
        container: &Value<'ctx>,
        index: &Value<'ctx>,
        item: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !container.is_valid() || !index.is_valid() || !item.is_valid() {
            return Value::invalid();
        }
        if !self.check_mutable(container, token) {
            return Value::invalid();
        }

        let ty = container.ty.clone();
        match ty.kind {
            TypeKind::FixedVec | TypeKind::Tuple => {
                let target = self.get_at_index(container, index, token);
                if !target.is_valid() {
                    return Value::invalid();
                }
                self.replace(&target, item, token)
            }
            TypeKind::DynVec => {
                if !self.expect_integer_index(index, token) {
                    return Value::invalid();
                }
                let Some(bits) = self.element_operand(item, &ty.inner[0], token) else {
                    return Value::invalid();
                };
                let (Some(handle), Some(position)) =
                    (self.handle_of(container), self.i64_value(index))
                else {
                    return Value::invalid();
                };
                self.call_rt(
                    RuntimeFn::VecSet,
                    &[handle.into(), position.into(), bits.into()],
                );
                Value::void()
            }
            TypeKind::Map => self.insert(container, index, Some(item), token),
            TypeKind::String => {
                self.report(ErrorImpl::NotAssignable, token);
                Value::invalid()
            }
            _ => {
                self.report(ErrorImpl::NotIndexable { ty: ty.to_string() }, token);
                Value::invalid()
            }
        }
    }

    /// Structural replace: deep-copies `source` into the storage of
    /// `target`.
    pub fn replace(
        &mut self,
        target: &Value<'ctx>,
        source: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !target.is_valid() || !source.is_valid() {
            return Value::invalid();
        }
        if !self.check_mutable(target, token) {
            return Value::invalid();
        }
        let Some(address) = target.address() else {
            self.report(ErrorImpl::NotAssignable, token);
            return Value::invalid();
        };

        let ty = target.ty.clone().with_const(false);
        let casted = self.implicit_cast(source, &ty, token);
        if !casted.is_valid() {
            return Value::invalid();
        }
        self.copy_storage(address, &casted, &ty);
        Value::storage(ty, address)
    }

    /// Resets the single cursor of a set or map.
    pub fn start_iterator(&self, container: &Value<'ctx>) {
        let function = match container.ty.kind {
            TypeKind::Set => RuntimeFn::SetIterStart,
            _ => RuntimeFn::MapIterStart,
        };
        if let Some(handle) = self.handle_of(container) {
            self.call_rt(function, &[handle.into()]);
        }
    }

    /// Advances the cursor; true while it points at an entry.
    pub fn iter_next(&self, container: &Value<'ctx>) -> Option<IntValue<'ctx>> {
        let function = match container.ty.kind {
            TypeKind::Set => RuntimeFn::SetIterNext,
            _ => RuntimeFn::MapIterNext,
        };
        let handle = self.handle_of(container)?;
        let more = self.call_rt(function, &[handle.into()])?.into_int_value();
        Some(
            self.builder
                .build_int_compare(IntPredicate::NE, more, more.get_type().const_zero(), "more")
                .unwrap(),
        )
    }

    pub fn get_iter_key(&mut self, container: &Value<'ctx>) -> Value<'ctx> {
        let function = match container.ty.kind {
            TypeKind::Set => RuntimeFn::SetIterKey,
            _ => RuntimeFn::MapIterKey,
        };
        let key = container.ty.inner[0].clone();
        let Some(handle) = self.handle_of(container) else {
            return Value::invalid();
        };
        match self.call_rt(function, &[handle.into()]) {
            Some(bits) => self.from_slot_bits(bits.into_int_value(), &key),
            None => Value::invalid(),
        }
    }

    pub fn get_iter_value(&mut self, container: &Value<'ctx>) -> Value<'ctx> {
        let Some(value_type) = container.ty.inner.get(1).cloned() else {
            return Value::invalid();
        };
        let Some(handle) = self.handle_of(container) else {
            return Value::invalid();
        };
        match self.call_rt(RuntimeFn::MapIterValue, &[handle.into()]) {
            Some(bits) => self.from_slot_bits(bits.into_int_value(), &value_type),
            None => Value::invalid(),
        }
    }

    fn malformed(&mut self, reason: String, token: TokenId) -> Value<'ctx> {
        self.report(ErrorImpl::MalformedContainer { reason }, token);
        Value::invalid()
    }

    /// Type a container literal builds: the expected container type when
    /// there is one, otherwise inferred from the first item.
    fn literal_type(
        &mut self,
        items: &[Value<'ctx>],
        expected: Option<&Type>,
        token: TokenId,
    ) -> Option<Type> {
        if let Some(expected) = expected {
            if matches!(
                expected.kind,
                TypeKind::FixedVec | TypeKind::DynVec | TypeKind::Set | TypeKind::Map
            ) {
                return Some(expected.clone().with_const(false).with_reference(false));
            }
        }

        let Some(first) = items.first() else {
            self.malformed(String::from("cannot infer the type of an empty container"), token);
            return None;
        };

        if let Some(pair) = &first.pair {
            let (key, value) = (&pair.0.ty, &pair.1.ty);
            if !key.is_key() {
                self.report(ErrorImpl::InvalidKeyType { ty: key.to_string() }, token);
                return None;
            }
            if value.slot_kind().is_none() {
                self.report(
                    ErrorImpl::UnsupportedElementType {
                        ty: value.to_string(),
                    },
                    token,
                );
                return None;
            }
            return Some(Type::map(key.clone().with_const(false), value.clone().with_const(false)));
        }

        let element = first.ty.clone().with_const(false);
        if element.slot_kind().is_some() {
            Some(Type::dyn_vec(element))
        } else {
            Some(Type::fixed_vec(element, items.len() as u32))
        }
    }

    fn checked_item(
        &mut self,
        item: &Value<'ctx>,
        element: &Type,
        token: TokenId,
    ) -> Option<Value<'ctx>> {
        if item.is_pair() {
            self.malformed(String::from("key/value pair outside a map"), token);
            return None;
        }
        if !item.is_valid() {
            return None;
        }
        if !item.ty.can_cast(element) {
            self.malformed(
                format!("element of type {} in a container of {}", item.ty, element),
                token,
            );
            return None;
        }
        let casted = self.implicit_cast(item, element, token);
        casted.is_valid().then_some(casted)
    }

    /// Builds a container from evaluated literal items.
    pub fn container_literal(
        &mut self,
        items: Vec<Value<'ctx>>,
        expected: Option<&Type>,
        token: TokenId,
    ) -> Value<'ctx> {
        let Some(ty) = self.literal_type(&items, expected, token) else {
            return Value::invalid();
        };

        match ty.kind {
            TypeKind::FixedVec => {
                if ty.count as usize != items.len() {
                    return self.malformed(
                        format!("expected {} elements, found {}", ty.count, items.len()),
                        token,
                    );
                }
                let element = ty.inner[0].clone();
                let slot = self.temp_slot(&ty);
                for (index, item) in items.iter().enumerate() {
                    let Some(casted) = self.checked_item(item, &element, token) else {
                        return Value::invalid();
                    };
                    let address = self.element_address(slot, &ty, self.const_i64(index as i64));
                    self.copy_storage(address, &casted, &element);
                }
                Value::storage(ty, slot)
            }
            TypeKind::DynVec | TypeKind::Set => {
                let element = ty.inner[0].clone();
                let kind = element.slot_kind().map(|kind| kind as i32).unwrap_or(0);
                let kind = self.context.i32_type().const_int(kind as u64, false);
                let (create, add) = if ty.kind == TypeKind::DynVec {
                    (RuntimeFn::VecNew, RuntimeFn::VecPush)
                } else {
                    (RuntimeFn::SetNew, RuntimeFn::SetInsert)
                };
                let Some(handle) = self.call_rt(create, &[kind.into()]) else {
                    return Value::invalid();
                };
                let container = self.owned_temp(ty.clone(), handle);

                for item in items.iter() {
                    let Some(casted) = self.checked_item(item, &element, token) else {
                        return Value::invalid();
                    };
                    let Some(bits) = self.to_slot_bits(&casted, &element) else {
                        return Value::invalid();
                    };
                    self.call_rt(add, &[handle.into(), bits.into()]);
                }
                container
            }
            _ => {
                let (key_type, value_type) = (ty.inner[0].clone(), ty.inner[1].clone());
                let kind_of = |ty: &Type| ty.slot_kind().map(|kind| kind as i32).unwrap_or(0) as u64;
                let key_kind = self.context.i32_type().const_int(kind_of(&key_type), false);
                let value_kind = self.context.i32_type().const_int(kind_of(&value_type), false);
                let Some(handle) =
                    self.call_rt(RuntimeFn::MapNew, &[key_kind.into(), value_kind.into()])
                else {
                    return Value::invalid();
                };
                let container = self.owned_temp(ty.clone(), handle);

                for item in items.iter() {
                    let Some(pair) = &item.pair else {
                        return self.malformed(String::from("map item without a key"), token);
                    };
                    let (key, value) = (&pair.0, &pair.1);
                    if key.is_pair() || value.is_pair() {
                        return self.malformed(String::from("nested key/value pair"), token);
                    }
                    let Some(key_bits) = self.element_operand(key, &key_type, token) else {
                        return Value::invalid();
                    };
                    let Some(value_bits) = self.element_operand(value, &value_type, token) else {
                        return Value::invalid();
                    };
                    self.call_rt(
                        RuntimeFn::MapInsert,
                        &[handle.into(), key_bits.into(), value_bits.into()],
                    );
                }
                container
            }
        }
    }

    /// `[value; count]`.
    pub fn replicate(
        &mut self,
        item: &Value<'ctx>,
        count: &Value<'ctx>,
        expected: Option<&Type>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !item.is_valid() || !count.is_valid() {
            return Value::invalid();
        }
        if !self.expect_integer_index(count, token) {
            return Value::invalid();
        }

        if let Some(expected) = expected.filter(|ty| ty.kind == TypeKind::FixedVec) {
            let ty = expected.clone().with_const(false).with_reference(false);
            match self.constant_index(count) {
                Some(constant) if constant == ty.count as i64 => {}
                _ => {
                    return self.malformed(
                        format!("a {} needs the constant count {}", ty, ty.count),
                        token,
                    )
                }
            }
            let element = ty.inner[0].clone();
            let Some(casted) = self.checked_item(item, &element, token) else {
                return Value::invalid();
            };
            let slot = self.temp_slot(&ty);
            for index in 0..ty.count {
                let address = self.element_address(slot, &ty, self.const_i64(index as i64));
                self.copy_storage(address, &casted, &element);
            }
            return Value::storage(ty, slot);
        }

        let element = match expected.filter(|ty| ty.kind == TypeKind::DynVec) {
            Some(expected) => expected.inner[0].clone(),
            None => item.ty.clone().with_const(false),
        };
        let Some(kind) = element.slot_kind() else {
            self.report(
                ErrorImpl::UnsupportedElementType {
                    ty: element.to_string(),
                },
                token,
            );
            return Value::invalid();
        };

        let Some(bits) = self.element_operand(item, &element, token) else {
            return Value::invalid();
        };
        let Some(count) = self.i64_value(count) else {
            return Value::invalid();
        };
        let kind = self.context.i32_type().const_int(kind as i32 as u64, false);
        match self.call_rt(RuntimeFn::VecFill, &[kind.into(), bits.into(), count.into()]) {
            Some(handle) => self.owned_temp(Type::dyn_vec(element), handle),
            None => Value::invalid(),
        }
    }

    /// `start..end` as a dynamic vector of the wider integer type.
    pub fn range_value(
        &mut self,
        start: &Value<'ctx>,
        end: &Value<'ctx>,
        token: TokenId,
    ) -> Value<'ctx> {
        if !start.is_valid() || !end.is_valid() {
            return Value::invalid();
        }
        if !start.ty.is_integer() || !end.ty.is_integer() {
            self.report(
                ErrorImpl::InvalidOperands {
                    op: String::from(".."),
                    left: start.ty.to_string(),
                    right: end.ty.to_string(),
                },
                token,
            );
            return Value::invalid();
        }

        let element = start.ty.widen(&end.ty);
        let (Some(from), Some(to)) = (self.i64_value(start), self.i64_value(end)) else {
            return Value::invalid();
        };
        match self.call_rt(RuntimeFn::VecRange, &[from.into(), to.into()]) {
            Some(handle) => self.owned_temp(Type::dyn_vec(element), handle),
            None => Value::invalid(),
        }
    }
}
