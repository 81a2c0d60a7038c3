//! Error types and error handling for the compiler.
//!
//! This module defines the diagnostics produced while lowering a syntax
//! tree. It includes:
//!
//! - Error structures with source position and context information
//! - One error variant per failure, grouped into broad kinds
//! - The capped per-compilation diagnostic sink

pub mod diagnostics;
pub mod errors;

#[cfg(test)]
mod tests;
