//! Code generation module for the compiler.
//!
//! This module contains the LLVM-based code generator that lowers the
//! syntax tree into LLVM IR. It handles:
//!
//! - The value model: storage, materialization, operators and casts
//! - Struct and function descriptors, the calling convention
//! - Runtime containers and the builtin functions
//! - The symbol environment and the two compilation passes

pub mod aggregates;
pub mod builtins;
pub mod compiler;
pub mod containers;
pub mod context;
pub mod environment;
pub mod expr;
pub mod options;
pub mod runtime_abi;
pub mod stmt;
pub mod value;

#[cfg(test)]
mod tests;
