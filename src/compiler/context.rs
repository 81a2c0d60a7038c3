use std::collections::HashMap;

use tracing::debug;

use crate::errors::diagnostics::Diagnostics;

use super::options::CompileOptions;

/// Enum literal interning
///
/// Maps literal text to a dense id and back. Ids are handed out in order of
/// first sight and never reused.
#[derive(Debug, Clone, Default)]
pub struct EnumTable {
    by_name: HashMap<String, i32>,
    names: Vec<String>,
}

impl EnumTable {
    /// Id of a literal; `:north` and `north` are the same literal.
    pub fn intern(&mut self, literal: &str) -> i32 {
        let name = literal.trim_start_matches(':');
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }

        let id = self.names.len() as i32;
        debug!(name, id, "interned enum literal");
        self.by_name.insert(String::from(name), id);
        self.names.push(String::from(name));
        id
    }

    pub fn name_of(&self, id: i32) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.names.get(index))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as i32, name.as_str()))
    }
}

/// State shared by every component for the duration of one `compile` call.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    pub options: CompileOptions,
    pub diagnostics: Diagnostics,
    pub enums: EnumTable,
}

impl CompilationContext {
    pub fn new(options: CompileOptions) -> Self {
        CompilationContext {
            diagnostics: Diagnostics::new(options.error_limit),
            enums: EnumTable::default(),
            options,
        }
    }
}
