use std::fmt::Display;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    ast::{ast::Ast, types::TypeExpr},
    errors::errors::{Error, ErrorImpl},
    runtime::SlotKind,
};

lazy_static! {
    static ref SIZED_NUMBER: Regex = Regex::new(r"^([if])(16|32|64)$").unwrap();
}

/// Storage size of every handle kind (strings, dynamic containers,
/// pointers, closures).
pub const HANDLE_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Invalid,
    Void,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    String,
    Enum,
    Pointer,
    FixedVec,
    DynVec,
    Set,
    Map,
    Tuple,
    Struct,
    Closure,
}

/// Semantic type descriptor
///
/// Immutable once built. Composite kinds keep their components in `inner`:
/// the element of a vector or set, key and value of a map, the components of
/// a tuple, and `[ret, params..]` for a closure. Struct types only carry the
/// fully qualified struct name, the layout lives in the struct registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    pub inner: Vec<Type>,
    /// Element count of a fixed vector
    pub count: u32,
    /// Fully qualified name of a struct type
    pub name: String,
    pub is_valid: bool,
    pub is_const: bool,
    pub is_reference: bool,
    /// Storage size in bytes
    pub size: u32,
}

impl Type {
    fn simple(kind: TypeKind, size: u32) -> Self {
        Type {
            kind,
            inner: vec![],
            count: 0,
            name: String::new(),
            is_valid: true,
            is_const: false,
            is_reference: false,
            size,
        }
    }

    pub fn invalid() -> Self {
        Type {
            is_valid: false,
            ..Type::simple(TypeKind::Invalid, 0)
        }
    }

    pub fn void() -> Self {
        Type::simple(TypeKind::Void, 0)
    }

    /// Signed integer of the given bit width (16, 32 or 64).
    pub fn int(bits: u32) -> Self {
        match bits {
            16 => Type::simple(TypeKind::Int16, 2),
            64 => Type::simple(TypeKind::Int64, 8),
            _ => Type::simple(TypeKind::Int32, 4),
        }
    }

    /// Float of the given bit width (32 or 64).
    pub fn float(bits: u32) -> Self {
        match bits {
            32 => Type::simple(TypeKind::Float32, 4),
            _ => Type::simple(TypeKind::Float64, 8),
        }
    }

    pub fn boolean() -> Self {
        Type::simple(TypeKind::Bool, 1)
    }

    pub fn string() -> Self {
        Type::simple(TypeKind::String, HANDLE_SIZE)
    }

    pub fn enumeration() -> Self {
        Type::simple(TypeKind::Enum, 4)
    }

    pub fn pointer() -> Self {
        Type::simple(TypeKind::Pointer, HANDLE_SIZE)
    }

    pub fn fixed_vec(element: Type, count: u32) -> Self {
        Type {
            size: element.size * count,
            inner: vec![element],
            count,
            ..Type::simple(TypeKind::FixedVec, 0)
        }
    }

    pub fn dyn_vec(element: Type) -> Self {
        Type {
            inner: vec![element],
            ..Type::simple(TypeKind::DynVec, HANDLE_SIZE)
        }
    }

    pub fn set(key: Type) -> Self {
        Type {
            inner: vec![key],
            ..Type::simple(TypeKind::Set, HANDLE_SIZE)
        }
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type {
            inner: vec![key, value],
            ..Type::simple(TypeKind::Map, HANDLE_SIZE)
        }
    }

    pub fn tuple(items: Vec<Type>) -> Self {
        Type {
            size: items.iter().map(|item| item.size).sum(),
            inner: items,
            ..Type::simple(TypeKind::Tuple, 0)
        }
    }

    pub fn structure(name: &str, size: u32) -> Self {
        Type {
            name: String::from(name),
            ..Type::simple(TypeKind::Struct, size)
        }
    }

    pub fn closure(ret: Type, params: Vec<Type>) -> Self {
        let mut inner = vec![ret];
        inner.extend(params);
        Type {
            inner,
            ..Type::simple(TypeKind::Closure, HANDLE_SIZE)
        }
    }

    pub fn with_const(mut self, is_const: bool) -> Self {
        self.is_const = is_const;
        self
    }

    pub fn with_reference(mut self, is_reference: bool) -> Self {
        self.is_reference = is_reference;
        self
    }

    /// Builds a descriptor from a syntactic annotation.
    ///
    /// `resolve_struct` maps a struct name (as written) to its fully
    /// qualified name and storage size.
    pub fn from_syntax(
        expr: &TypeExpr,
        ast: &Ast,
        resolve_struct: &dyn Fn(&str) -> Option<(String, u32)>,
    ) -> Result<Type, Error> {
        let token = ast.get_token(expr.token);
        let name = token.lexeme.as_str();
        let error = |error: ErrorImpl| Err(Error::new(error, token.position()));

        let expect_args = |expected: usize| -> Result<(), Error> {
            if expr.args.is_empty() && expected > 0 {
                return Err(Error::new(
                    ErrorImpl::MissingTypeArguments {
                        name: String::from(name),
                    },
                    token.position(),
                ));
            }
            if expr.args.len() != expected {
                return Err(Error::new(
                    ErrorImpl::TypeArgumentCount {
                        name: String::from(name),
                        expected,
                        received: expr.args.len(),
                    },
                    token.position(),
                ));
            }
            Ok(())
        };

        let inner = |index: usize| Type::from_syntax(&expr.args[index], ast, resolve_struct);

        let ty = if let Some(captures) = SIZED_NUMBER.captures(name) {
            expect_args(0)?;
            let bits: u32 = captures[2].parse().unwrap_or(32);
            match (&captures[1], bits) {
                ("i", _) => Type::int(bits),
                ("f", 32) | ("f", 64) => Type::float(bits),
                _ => {
                    return error(ErrorImpl::UnknownType {
                        name: String::from(name),
                    })
                }
            }
        } else {
            match name {
                "bool" | "string" | "enum" | "ptr" | "void" => {
                    expect_args(0)?;
                    match name {
                        "bool" => Type::boolean(),
                        "string" => Type::string(),
                        "enum" => Type::enumeration(),
                        "ptr" => Type::pointer(),
                        _ => Type::void(),
                    }
                }
                "vec" => {
                    expect_args(1)?;
                    let element = inner(0)?;
                    match expr.count {
                        Some(count) => {
                            if element.kind == TypeKind::Void {
                                return error(ErrorImpl::UnsupportedElementType {
                                    ty: element.to_string(),
                                });
                            }
                            Type::fixed_vec(element, count)
                        }
                        None => {
                            if element.slot_kind().is_none() {
                                return error(ErrorImpl::UnsupportedElementType {
                                    ty: element.to_string(),
                                });
                            }
                            Type::dyn_vec(element)
                        }
                    }
                }
                "set" => {
                    expect_args(1)?;
                    let key = inner(0)?;
                    if !key.is_key() {
                        return error(ErrorImpl::InvalidKeyType {
                            ty: key.to_string(),
                        });
                    }
                    Type::set(key)
                }
                "map" => {
                    expect_args(2)?;
                    let key = inner(0)?;
                    if !key.is_key() {
                        return error(ErrorImpl::InvalidKeyType {
                            ty: key.to_string(),
                        });
                    }
                    let value = inner(1)?;
                    if value.slot_kind().is_none() {
                        return error(ErrorImpl::UnsupportedElementType {
                            ty: value.to_string(),
                        });
                    }
                    Type::map(key, value)
                }
                "tuple" => {
                    if expr.args.is_empty() {
                        expect_args(1)?;
                    }
                    let items = (0..expr.args.len())
                        .map(inner)
                        .collect::<Result<Vec<Type>, Error>>()?;
                    if let Some(void) = items.iter().find(|item| item.kind == TypeKind::Void) {
                        return error(ErrorImpl::UnsupportedElementType {
                            ty: void.to_string(),
                        });
                    }
                    Type::tuple(items)
                }
                "fn" => {
                    if expr.args.is_empty() {
                        expect_args(1)?;
                    }
                    let ret = inner(0)?;
                    let params = (1..expr.args.len())
                        .map(inner)
                        .collect::<Result<Vec<Type>, Error>>()?;
                    Type::closure(ret, params)
                }
                _ => {
                    expect_args(0)?;
                    match resolve_struct(name) {
                        Some((fqname, size)) => Type::structure(&fqname, size),
                        None => {
                            return error(ErrorImpl::UnknownStruct {
                                name: String::from(name),
                            })
                        }
                    }
                }
            }
        };

        Ok(ty.with_const(expr.is_const).with_reference(expr.is_ref))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Int16 | TypeKind::Int32 | TypeKind::Int64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, TypeKind::Float32 | TypeKind::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Bit width of numeric kinds, zero for everything else.
    pub fn bit_width(&self) -> u32 {
        match self.kind {
            TypeKind::Int16 => 16,
            TypeKind::Int32 | TypeKind::Float32 => 32,
            TypeKind::Int64 | TypeKind::Float64 => 64,
            _ => 0,
        }
    }

    /// Types whose values own a runtime heap object.
    pub fn is_heap(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::String | TypeKind::DynVec | TypeKind::Set | TypeKind::Map
        )
    }

    /// Types that live in storage and are copied member or element wise.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Struct | TypeKind::Tuple | TypeKind::FixedVec
        )
    }

    pub fn is_key(&self) -> bool {
        self.is_integer() || matches!(self.kind, TypeKind::String | TypeKind::Enum)
    }

    /// Element kind used when values of this type cross into a runtime
    /// container, `None` when the type cannot be stored there.
    pub fn slot_kind(&self) -> Option<SlotKind> {
        match self.kind {
            TypeKind::Int16 | TypeKind::Int32 | TypeKind::Int64 => Some(SlotKind::Int),
            TypeKind::Float32 | TypeKind::Float64 => Some(SlotKind::Float),
            TypeKind::String => Some(SlotKind::Str),
            TypeKind::Bool => Some(SlotKind::Bool),
            TypeKind::Enum => Some(SlotKind::Enum),
            _ => None,
        }
    }

    /// Element type of vectors and sets, value type of maps.
    pub fn element(&self) -> Option<&Type> {
        match self.kind {
            TypeKind::FixedVec | TypeKind::DynVec | TypeKind::Set => self.inner.first(),
            TypeKind::Map => self.inner.get(1),
            _ => None,
        }
    }

    /// Result type of a closure.
    pub fn closure_ret(&self) -> Option<&Type> {
        match self.kind {
            TypeKind::Closure => self.inner.first(),
            _ => None,
        }
    }

    pub fn closure_params(&self) -> &[Type] {
        match self.kind {
            TypeKind::Closure if !self.inner.is_empty() => &self.inner[1..],
            _ => &[],
        }
    }

    /// Exact kind and component equality. Flags are ignored.
    pub fn is_type_matched(&self, other: &Type) -> bool {
        if !self.is_valid || !other.is_valid {
            return false;
        }

        self.kind == other.kind
            && self.count == other.count
            && self.name == other.name
            && self.inner.len() == other.inner.len()
            && self
                .inner
                .iter()
                .zip(other.inner.iter())
                .all(|(a, b)| a.is_type_matched(b))
    }

    /// Whether a value of this type converts implicitly to `other`.
    pub fn can_cast(&self, other: &Type) -> bool {
        if !self.is_valid || !other.is_valid {
            return false;
        }

        if self.is_numeric() && other.is_numeric() {
            return true;
        }

        if self.kind == TypeKind::Tuple && other.kind == TypeKind::Tuple {
            return self.inner.len() == other.inner.len()
                && self
                    .inner
                    .iter()
                    .zip(other.inner.iter())
                    .all(|(a, b)| a.is_type_matched(b));
        }

        self.is_type_matched(other)
    }

    /// Common type two numeric operands are widened to.
    ///
    /// Never narrows: two integers give the wider integer, a float operand
    /// gives a float at least as wide as both operands.
    pub fn widen(&self, other: &Type) -> Type {
        if self.is_float() || other.is_float() {
            let bits = self.bit_width().max(other.bit_width());
            return Type::float(if bits > 32 { 64 } else { 32 });
        }

        Type::int(self.bit_width().max(other.bit_width()))
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let list = |items: &[Type]| {
            items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        };

        match self.kind {
            TypeKind::Invalid => write!(f, "<invalid>"),
            TypeKind::Void => write!(f, "void"),
            TypeKind::Int16 => write!(f, "i16"),
            TypeKind::Int32 => write!(f, "i32"),
            TypeKind::Int64 => write!(f, "i64"),
            TypeKind::Float32 => write!(f, "f32"),
            TypeKind::Float64 => write!(f, "f64"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::String => write!(f, "string"),
            TypeKind::Enum => write!(f, "enum"),
            TypeKind::Pointer => write!(f, "ptr"),
            TypeKind::FixedVec => write!(f, "vec<{}, {}>", list(&self.inner), self.count),
            TypeKind::DynVec => write!(f, "vec<{}>", list(&self.inner)),
            TypeKind::Set => write!(f, "set<{}>", list(&self.inner)),
            TypeKind::Map => write!(f, "map<{}>", list(&self.inner)),
            TypeKind::Tuple => write!(f, "tuple<{}>", list(&self.inner)),
            TypeKind::Struct => write!(f, "{}", self.name),
            TypeKind::Closure => write!(f, "fn<{}>", list(&self.inner)),
        }
    }
}
