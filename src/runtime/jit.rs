//! JIT execution of compiled modules.

use inkwell::{
    execution_engine::ExecutionEngine,
    module::Module,
    targets::{InitializationConfig, Target},
    OptimizationLevel,
};
use thiserror::Error;
use tracing::debug;

use crate::compiler::runtime_abi::RuntimeFn;

use super::{begin_capture, containers::*, end_capture, numeric::*, reset, strings::*, take_fault};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("execution engine error: {0}")]
    Engine(String),
    #[error("module has no main function")]
    MissingMain,
    #[error("runtime fault: {message} (output so far: {output:?})")]
    Fault { message: String, output: String },
}

/// Address of the Rust implementation of a runtime primitive.
fn address(function: RuntimeFn) -> usize {
    match function {
        RuntimeFn::StringNew => rt_string_new as *const () as usize,
        RuntimeFn::StringFromCstr => rt_string_from_cstr as *const () as usize,
        RuntimeFn::StringAssign => rt_string_assign as *const () as usize,
        RuntimeFn::StringConcat => rt_string_concat as *const () as usize,
        RuntimeFn::StringCompare => rt_string_compare as *const () as usize,
        RuntimeFn::StringLen => rt_string_len as *const () as usize,
        RuntimeFn::StringSubstr => rt_string_substr as *const () as usize,
        RuntimeFn::StringUpper => rt_string_upper as *const () as usize,
        RuntimeFn::StringLower => rt_string_lower as *const () as usize,
        RuntimeFn::StringTrim => rt_string_trim as *const () as usize,
        RuntimeFn::StringContains => rt_string_contains as *const () as usize,
        RuntimeFn::StringFree => rt_string_free as *const () as usize,
        RuntimeFn::StringToInt => rt_string_to_int as *const () as usize,
        RuntimeFn::StringToFloat => rt_string_to_float as *const () as usize,
        RuntimeFn::IntToString => rt_int_to_string as *const () as usize,
        RuntimeFn::FloatToString => rt_float_to_string as *const () as usize,
        RuntimeFn::BoolToString => rt_bool_to_string as *const () as usize,
        RuntimeFn::EnumToString => rt_enum_to_string as *const () as usize,
        RuntimeFn::EnumRegister => rt_enum_register as *const () as usize,
        RuntimeFn::Print => rt_print as *const () as usize,
        RuntimeFn::VecNew => rt_vec_new as *const () as usize,
        RuntimeFn::VecFree => rt_vec_free as *const () as usize,
        RuntimeFn::VecLen => rt_vec_len as *const () as usize,
        RuntimeFn::VecPush => rt_vec_push as *const () as usize,
        RuntimeFn::VecGet => rt_vec_get as *const () as usize,
        RuntimeFn::VecSet => rt_vec_set as *const () as usize,
        RuntimeFn::VecContains => rt_vec_contains as *const () as usize,
        RuntimeFn::VecAssign => rt_vec_assign as *const () as usize,
        RuntimeFn::VecFill => rt_vec_fill as *const () as usize,
        RuntimeFn::VecRange => rt_vec_range as *const () as usize,
        RuntimeFn::VecToString => rt_vec_to_string as *const () as usize,
        RuntimeFn::SetNew => rt_set_new as *const () as usize,
        RuntimeFn::SetFree => rt_set_free as *const () as usize,
        RuntimeFn::SetLen => rt_set_len as *const () as usize,
        RuntimeFn::SetInsert => rt_set_insert as *const () as usize,
        RuntimeFn::SetContains => rt_set_contains as *const () as usize,
        RuntimeFn::SetAssign => rt_set_assign as *const () as usize,
        RuntimeFn::SetIterStart => rt_set_iter_start as *const () as usize,
        RuntimeFn::SetIterNext => rt_set_iter_next as *const () as usize,
        RuntimeFn::SetIterKey => rt_set_iter_key as *const () as usize,
        RuntimeFn::SetToString => rt_set_to_string as *const () as usize,
        RuntimeFn::MapNew => rt_map_new as *const () as usize,
        RuntimeFn::MapFree => rt_map_free as *const () as usize,
        RuntimeFn::MapLen => rt_map_len as *const () as usize,
        RuntimeFn::MapInsert => rt_map_insert as *const () as usize,
        RuntimeFn::MapGet => rt_map_get as *const () as usize,
        RuntimeFn::MapContains => rt_map_contains as *const () as usize,
        RuntimeFn::MapAssign => rt_map_assign as *const () as usize,
        RuntimeFn::MapIterStart => rt_map_iter_start as *const () as usize,
        RuntimeFn::MapIterNext => rt_map_iter_next as *const () as usize,
        RuntimeFn::MapIterKey => rt_map_iter_key as *const () as usize,
        RuntimeFn::MapIterValue => rt_map_iter_value as *const () as usize,
        RuntimeFn::MapToString => rt_map_to_string as *const () as usize,
        RuntimeFn::CheckIndex => rt_check_index as *const () as usize,
        RuntimeFn::MathMod => rt_math_mod as *const () as usize,
        RuntimeFn::MathPow => rt_math_pow as *const () as usize,
        RuntimeFn::MathSqrt => rt_math_sqrt as *const () as usize,
        RuntimeFn::MathSin => rt_math_sin as *const () as usize,
        RuntimeFn::MathCos => rt_math_cos as *const () as usize,
        RuntimeFn::MathRandom => rt_math_random as *const () as usize,
    }
}

/// Maps every runtime primitive the module declares to its implementation.
fn add_runtime_mappings(module: &Module<'_>, engine: &ExecutionEngine<'_>) {
    for function in RuntimeFn::ALL {
        if let Some(declared) = module.get_function(function.name()) {
            engine.add_global_mapping(&declared, address(function));
        }
    }
}

/// Runs `main` of a compiled module and returns everything it printed.
///
/// The module is handed to an execution engine, so it can only be executed
/// once.
pub fn execute(module: &Module<'_>) -> Result<String, RuntimeError> {
    Target::initialize_native(&InitializationConfig::default()).map_err(RuntimeError::Engine)?;

    reset();

    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| RuntimeError::Engine(e.to_string()))?;

    add_runtime_mappings(module, &engine);

    debug!(module = %module.get_name().to_string_lossy(), "executing");

    begin_capture();
    // The generated `main` has signature () -> i32 and only calls into the
    // runtime mapped above.
    let status = unsafe {
        match engine.get_function::<unsafe extern "C" fn() -> i32>("main") {
            Ok(main) => Some(main.call()),
            Err(_) => None,
        }
    };
    let output = end_capture();

    let Some(status) = status else {
        return Err(RuntimeError::MissingMain);
    };
    debug!(status, "main returned");

    match take_fault() {
        Some(message) => Err(RuntimeError::Fault { message, output }),
        None => Ok(output),
    }
}
