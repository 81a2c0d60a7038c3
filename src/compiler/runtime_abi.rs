//! Declarations of the runtime primitives used by generated code.
//!
//! Every primitive is declared lazily the first time it is called, so a
//! compiled module only references what it uses.

use inkwell::{
    module::Linkage,
    types::{BasicMetadataTypeEnum, FunctionType},
    values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue},
    AddressSpace,
};

use super::compiler::Compiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    Void,
    /// Opaque `i8*`
    Handle,
    I32,
    I64,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFn {
    StringNew,
    StringFromCstr,
    StringAssign,
    StringConcat,
    StringCompare,
    StringLen,
    StringSubstr,
    StringUpper,
    StringLower,
    StringTrim,
    StringContains,
    StringFree,
    StringToInt,
    StringToFloat,
    IntToString,
    FloatToString,
    BoolToString,
    EnumToString,
    EnumRegister,
    Print,
    VecNew,
    VecFree,
    VecLen,
    VecPush,
    VecGet,
    VecSet,
    VecContains,
    VecAssign,
    VecFill,
    VecRange,
    VecToString,
    SetNew,
    SetFree,
    SetLen,
    SetInsert,
    SetContains,
    SetAssign,
    SetIterStart,
    SetIterNext,
    SetIterKey,
    SetToString,
    MapNew,
    MapFree,
    MapLen,
    MapInsert,
    MapGet,
    MapContains,
    MapAssign,
    MapIterStart,
    MapIterNext,
    MapIterKey,
    MapIterValue,
    MapToString,
    CheckIndex,
    MathMod,
    MathPow,
    MathSqrt,
    MathSin,
    MathCos,
    MathRandom,
}

impl RuntimeFn {
    pub const ALL: [RuntimeFn; 60] = [
        RuntimeFn::StringNew,
        RuntimeFn::StringFromCstr,
        RuntimeFn::StringAssign,
        RuntimeFn::StringConcat,
        RuntimeFn::StringCompare,
        RuntimeFn::StringLen,
        RuntimeFn::StringSubstr,
        RuntimeFn::StringUpper,
        RuntimeFn::StringLower,
        RuntimeFn::StringTrim,
        RuntimeFn::StringContains,
        RuntimeFn::StringFree,
        RuntimeFn::StringToInt,
        RuntimeFn::StringToFloat,
        RuntimeFn::IntToString,
        RuntimeFn::FloatToString,
        RuntimeFn::BoolToString,
        RuntimeFn::EnumToString,
        RuntimeFn::EnumRegister,
        RuntimeFn::Print,
        RuntimeFn::VecNew,
        RuntimeFn::VecFree,
        RuntimeFn::VecLen,
        RuntimeFn::VecPush,
        RuntimeFn::VecGet,
        RuntimeFn::VecSet,
        RuntimeFn::VecContains,
        RuntimeFn::VecAssign,
        RuntimeFn::VecFill,
        RuntimeFn::VecRange,
        RuntimeFn::VecToString,
        RuntimeFn::SetNew,
        RuntimeFn::SetFree,
        RuntimeFn::SetLen,
        RuntimeFn::SetInsert,
        RuntimeFn::SetContains,
        RuntimeFn::SetAssign,
        RuntimeFn::SetIterStart,
        RuntimeFn::SetIterNext,
        RuntimeFn::SetIterKey,
        RuntimeFn::SetToString,
        RuntimeFn::MapNew,
        RuntimeFn::MapFree,
        RuntimeFn::MapLen,
        RuntimeFn::MapInsert,
        RuntimeFn::MapGet,
        RuntimeFn::MapContains,
        RuntimeFn::MapAssign,
        RuntimeFn::MapIterStart,
        RuntimeFn::MapIterNext,
        RuntimeFn::MapIterKey,
        RuntimeFn::MapIterValue,
        RuntimeFn::MapToString,
        RuntimeFn::CheckIndex,
        RuntimeFn::MathMod,
        RuntimeFn::MathPow,
        RuntimeFn::MathSqrt,
        RuntimeFn::MathSin,
        RuntimeFn::MathCos,
        RuntimeFn::MathRandom,
    ];

    /// Symbol name, identical to the Rust implementation's name.
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeFn::StringNew => "rt_string_new",
            RuntimeFn::StringFromCstr => "rt_string_from_cstr",
            RuntimeFn::StringAssign => "rt_string_assign",
            RuntimeFn::StringConcat => "rt_string_concat",
            RuntimeFn::StringCompare => "rt_string_compare",
            RuntimeFn::StringLen => "rt_string_len",
            RuntimeFn::StringSubstr => "rt_string_substr",
            RuntimeFn::StringUpper => "rt_string_upper",
            RuntimeFn::StringLower => "rt_string_lower",
            RuntimeFn::StringTrim => "rt_string_trim",
            RuntimeFn::StringContains => "rt_string_contains",
            RuntimeFn::StringFree => "rt_string_free",
            RuntimeFn::StringToInt => "rt_string_to_int",
            RuntimeFn::StringToFloat => "rt_string_to_float",
            RuntimeFn::IntToString => "rt_int_to_string",
            RuntimeFn::FloatToString => "rt_float_to_string",
            RuntimeFn::BoolToString => "rt_bool_to_string",
            RuntimeFn::EnumToString => "rt_enum_to_string",
            RuntimeFn::EnumRegister => "rt_enum_register",
            RuntimeFn::Print => "rt_print",
            RuntimeFn::VecNew => "rt_vec_new",
            RuntimeFn::VecFree => "rt_vec_free",
            RuntimeFn::VecLen => "rt_vec_len",
            RuntimeFn::VecPush => "rt_vec_push",
            RuntimeFn::VecGet => "rt_vec_get",
            RuntimeFn::VecSet => "rt_vec_set",
            RuntimeFn::VecContains => "rt_vec_contains",
            RuntimeFn::VecAssign => "rt_vec_assign",
            RuntimeFn::VecFill => "rt_vec_fill",
            RuntimeFn::VecRange => "rt_vec_range",
            RuntimeFn::VecToString => "rt_vec_to_string",
            RuntimeFn::SetNew => "rt_set_new",
            RuntimeFn::SetFree => "rt_set_free",
            RuntimeFn::SetLen => "rt_set_len",
            RuntimeFn::SetInsert => "rt_set_insert",
            RuntimeFn::SetContains => "rt_set_contains",
            RuntimeFn::SetAssign => "rt_set_assign",
            RuntimeFn::SetIterStart => "rt_set_iter_start",
            RuntimeFn::SetIterNext => "rt_set_iter_next",
            RuntimeFn::SetIterKey => "rt_set_iter_key",
            RuntimeFn::SetToString => "rt_set_to_string",
            RuntimeFn::MapNew => "rt_map_new",
            RuntimeFn::MapFree => "rt_map_free",
            RuntimeFn::MapLen => "rt_map_len",
            RuntimeFn::MapInsert => "rt_map_insert",
            RuntimeFn::MapGet => "rt_map_get",
            RuntimeFn::MapContains => "rt_map_contains",
            RuntimeFn::MapAssign => "rt_map_assign",
            RuntimeFn::MapIterStart => "rt_map_iter_start",
            RuntimeFn::MapIterNext => "rt_map_iter_next",
            RuntimeFn::MapIterKey => "rt_map_iter_key",
            RuntimeFn::MapIterValue => "rt_map_iter_value",
            RuntimeFn::MapToString => "rt_map_to_string",
            RuntimeFn::CheckIndex => "rt_check_index",
            RuntimeFn::MathMod => "rt_math_mod",
            RuntimeFn::MathPow => "rt_math_pow",
            RuntimeFn::MathSqrt => "rt_math_sqrt",
            RuntimeFn::MathSin => "rt_math_sin",
            RuntimeFn::MathCos => "rt_math_cos",
            RuntimeFn::MathRandom => "rt_math_random",
        }
    }

    /// Return and parameter types.
    pub fn signature(&self) -> (Abi, &'static [Abi]) {
        use Abi::*;

        match self {
            RuntimeFn::StringNew => (Handle, &[]),
            RuntimeFn::StringFromCstr => (Handle, &[Handle]),
            RuntimeFn::StringAssign | RuntimeFn::StringConcat => (Handle, &[Handle, Handle]),
            RuntimeFn::StringCompare | RuntimeFn::StringContains => (I32, &[Handle, Handle]),
            RuntimeFn::StringLen => (I64, &[Handle]),
            RuntimeFn::StringSubstr => (Handle, &[Handle, I64, I64]),
            RuntimeFn::StringUpper | RuntimeFn::StringLower | RuntimeFn::StringTrim => {
                (Handle, &[Handle])
            }
            RuntimeFn::StringFree | RuntimeFn::VecFree | RuntimeFn::SetFree | RuntimeFn::MapFree => {
                (Void, &[Handle])
            }
            RuntimeFn::StringToInt => (I64, &[Handle]),
            RuntimeFn::StringToFloat => (F64, &[Handle]),
            RuntimeFn::IntToString => (Handle, &[I64]),
            RuntimeFn::FloatToString => (Handle, &[F64]),
            RuntimeFn::BoolToString | RuntimeFn::EnumToString => (Handle, &[I32]),
            RuntimeFn::EnumRegister => (Void, &[I32, Handle]),
            RuntimeFn::Print => (Void, &[Handle, I32]),
            RuntimeFn::VecNew | RuntimeFn::SetNew => (Handle, &[I32]),
            RuntimeFn::MapNew => (Handle, &[I32, I32]),
            RuntimeFn::VecLen | RuntimeFn::SetLen | RuntimeFn::MapLen => (I64, &[Handle]),
            RuntimeFn::VecPush | RuntimeFn::SetInsert => (Void, &[Handle, I64]),
            RuntimeFn::VecGet | RuntimeFn::MapGet => (I64, &[Handle, I64]),
            RuntimeFn::VecSet | RuntimeFn::MapInsert => (Void, &[Handle, I64, I64]),
            RuntimeFn::VecContains | RuntimeFn::SetContains | RuntimeFn::MapContains => {
                (I32, &[Handle, I64])
            }
            RuntimeFn::VecAssign | RuntimeFn::SetAssign | RuntimeFn::MapAssign => {
                (Handle, &[Handle, Handle])
            }
            RuntimeFn::VecFill => (Handle, &[I32, I64, I64]),
            RuntimeFn::VecRange => (Handle, &[I64, I64]),
            RuntimeFn::VecToString | RuntimeFn::SetToString | RuntimeFn::MapToString => {
                (Handle, &[Handle])
            }
            RuntimeFn::SetIterStart | RuntimeFn::MapIterStart => (Void, &[Handle]),
            RuntimeFn::SetIterNext | RuntimeFn::MapIterNext => (I32, &[Handle]),
            RuntimeFn::SetIterKey | RuntimeFn::MapIterKey | RuntimeFn::MapIterValue => {
                (I64, &[Handle])
            }
            RuntimeFn::CheckIndex | RuntimeFn::MathMod => (I64, &[I64, I64]),
            RuntimeFn::MathPow => (F64, &[F64, F64]),
            RuntimeFn::MathSqrt | RuntimeFn::MathSin | RuntimeFn::MathCos => (F64, &[F64]),
            RuntimeFn::MathRandom => (I64, &[I64, I64]),
        }
    }
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    fn runtime_fn_type(&self, function: RuntimeFn) -> FunctionType<'ctx> {
        let (ret, params) = function.signature();
        let params = params
            .iter()
            .map(|param| -> BasicMetadataTypeEnum<'ctx> {
                match param {
                    Abi::Handle => self.handle_type().into(),
                    Abi::I32 => self.context.i32_type().into(),
                    Abi::I64 => self.context.i64_type().into(),
                    Abi::F64 => self.context.f64_type().into(),
                    Abi::Void => unreachable!("void parameter"),
                }
            })
            .collect::<Vec<BasicMetadataTypeEnum<'ctx>>>();

        match ret {
            Abi::Void => self.context.void_type().fn_type(&params, false),
            Abi::Handle => self.handle_type().fn_type(&params, false),
            Abi::I32 => self.context.i32_type().fn_type(&params, false),
            Abi::I64 => self.context.i64_type().fn_type(&params, false),
            Abi::F64 => self.context.f64_type().fn_type(&params, false),
        }
    }

    /// Declares a runtime primitive on first use.
    pub fn rt(&self, function: RuntimeFn) -> FunctionValue<'ctx> {
        match self.module.get_function(function.name()) {
            Some(declared) => declared,
            None => self.module.add_function(
                function.name(),
                self.runtime_fn_type(function),
                Some(Linkage::External),
            ),
        }
    }

    /// Calls a runtime primitive; `None` for primitives returning nothing.
    pub fn call_rt(
        &self,
        function: RuntimeFn,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Option<BasicValueEnum<'ctx>> {
        self.builder
            .build_call(self.rt(function), args, "")
            .unwrap()
            .try_as_basic_value()
            .left()
    }

    /// `i8*`, the type of every runtime handle.
    pub fn handle_type(&self) -> inkwell::types::PointerType<'ctx> {
        self.context.i8_type().ptr_type(AddressSpace::default())
    }
}
