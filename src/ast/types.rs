//! Syntactic type annotations.
//!
//! A [`TypeExpr`] is what the parser saw: a name token, optional type
//! arguments and an optional element count. The compiler turns it into a
//! semantic [`crate::types::types::Type`].

use super::ast::{Ast, TokenId};

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub token: TokenId,
    pub args: Vec<TypeExpr>,
    /// Element count of a fixed-length vector (`vec<i32, 4>`)
    pub count: Option<u32>,
    pub is_const: bool,
    pub is_ref: bool,
}

impl TypeExpr {
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn reference(mut self) -> Self {
        self.is_ref = true;
        self
    }
}

impl Ast {
    /// A type annotation without type arguments, e.g. `i32` or `Point`.
    pub fn ty(&mut self, name: &str) -> TypeExpr {
        let token = self.token(name);
        TypeExpr {
            token,
            args: vec![],
            count: None,
            is_const: false,
            is_ref: false,
        }
    }

    /// A type annotation with type arguments, e.g. `map<string, i32>`.
    pub fn ty_args(&mut self, name: &str, args: Vec<TypeExpr>) -> TypeExpr {
        let mut ty = self.ty(name);
        ty.args = args;
        ty
    }

    /// A fixed-length vector annotation, `vec<T, count>`.
    pub fn ty_fixed(&mut self, element: TypeExpr, count: u32) -> TypeExpr {
        let mut ty = self.ty_args("vec", vec![element]);
        ty.count = Some(count);
        ty
    }
}
