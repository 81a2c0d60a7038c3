/// Semantic type descriptors
///
/// Submodules:
/// - types: The `Type` descriptor, its construction from annotations and
///   its conversion rules
pub mod types;

#[cfg(test)]
mod tests;
