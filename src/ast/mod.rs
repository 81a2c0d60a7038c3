/// AST (Abstract Syntax Tree) module
/// Contains the arena-backed syntax tree handed over by the parser
///
/// Submodules:
/// - ast: Arena, handles and tokens
/// - expressions: Expression kinds and their builders
/// - statements: Statement kinds and their builders
/// - types: Syntactic type annotations
pub mod ast;
pub mod expressions;
pub mod statements;
pub mod types;

#[cfg(test)]
mod tests;
