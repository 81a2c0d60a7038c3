//! Unit tests for type descriptors.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::{
    ast::{ast::Ast, types::TypeExpr},
    errors::errors::Error,
    runtime::SlotKind,
    types::types::{Type, TypeKind},
};

fn resolve(name: &str) -> Option<(String, u32)> {
    match name {
        "Point" => Some((String::from("Point"), 8)),
        _ => None,
    }
}

fn build(ast: &Ast, expr: &TypeExpr) -> Result<Type, Error> {
    Type::from_syntax(expr, ast, &resolve)
}

#[test]
fn test_primitive_names() {
    let mut ast = Ast::new("test.lang");
    for (name, kind, size) in [
        ("i16", TypeKind::Int16, 2),
        ("i32", TypeKind::Int32, 4),
        ("i64", TypeKind::Int64, 8),
        ("f32", TypeKind::Float32, 4),
        ("f64", TypeKind::Float64, 8),
        ("bool", TypeKind::Bool, 1),
        ("string", TypeKind::String, 8),
        ("enum", TypeKind::Enum, 4),
    ] {
        let expr = ast.ty(name);
        let ty = build(&ast, &expr).unwrap();
        assert_eq!(ty.kind, kind);
        assert_eq!(ty.size, size);
        assert_eq!(ty.to_string(), name);
    }
}

#[test]
fn test_f16_is_unknown() {
    let mut ast = Ast::new("test.lang");
    let expr = ast.ty("f16");

    let error = build(&ast, &expr).unwrap_err();
    assert_eq!(error.get_error_name(), "UnknownType");
}

#[test]
fn test_composites() {
    let mut ast = Ast::new("test.lang");
    let string = ast.ty("string");
    let i32_ty = ast.ty("i32");
    let map = ast.ty_args("map", vec![string, i32_ty]);
    let ty = build(&ast, &map).unwrap();

    assert_eq!(ty.kind, TypeKind::Map);
    assert_eq!(ty.to_string(), "map<string, i32>");
    assert_eq!(ty.element().map(|e| e.kind), Some(TypeKind::Int32));

    let f32_ty = ast.ty("f32");
    let fixed = ast.ty_fixed(f32_ty, 4);
    let ty = build(&ast, &fixed).unwrap();
    assert_eq!(ty.kind, TypeKind::FixedVec);
    assert_eq!(ty.count, 4);
    assert_eq!(ty.size, 16);
}

#[test]
fn test_tuple_size_is_sum() {
    let mut ast = Ast::new("test.lang");
    let a = ast.ty("i16");
    let b = ast.ty("f64");
    let c = ast.ty("Point");
    let tuple = ast.ty_args("tuple", vec![a, b, c]);
    let ty = build(&ast, &tuple).unwrap();

    assert_eq!(ty.size, 2 + 8 + 8);
    assert_eq!(ty.inner[2].name, "Point");
}

#[test]
fn test_missing_type_arguments() {
    let mut ast = Ast::new("test.lang");
    let vec = ast.ty("vec");

    let error = build(&ast, &vec).unwrap_err();
    assert_eq!(error.get_error_name(), "MissingTypeArguments");

    let k = ast.ty("i32");
    let map = ast.ty_args("map", vec![k]);
    let error = build(&ast, &map).unwrap_err();
    assert_eq!(error.get_error_name(), "TypeArgumentCount");
}

#[test]
fn test_invalid_key_type() {
    let mut ast = Ast::new("test.lang");
    let key = ast.ty("f64");
    let set = ast.ty_args("set", vec![key]);

    let error = build(&ast, &set).unwrap_err();
    assert_eq!(error.get_error_name(), "InvalidKeyType");
}

#[test]
fn test_dynamic_vector_of_structs_rejected() {
    let mut ast = Ast::new("test.lang");
    let point = ast.ty("Point");
    let vec = ast.ty_args("vec", vec![point]);

    let error = build(&ast, &vec).unwrap_err();
    assert_eq!(error.get_error_name(), "UnsupportedElementType");

    let point = ast.ty("Point");
    let fixed = ast.ty_fixed(point, 2);
    assert!(build(&ast, &fixed).is_ok());
}

#[test]
fn test_unknown_struct() {
    let mut ast = Ast::new("test.lang");
    let expr = ast.ty("Missing");

    let error = build(&ast, &expr).unwrap_err();
    assert_eq!(error.get_error_name(), "UnknownStruct");
}

#[test]
fn test_closure_layout() {
    let mut ast = Ast::new("test.lang");
    let ret = ast.ty("void");
    let param = ast.ty("i32");
    let closure = ast.ty_args("fn", vec![ret, param]);
    let ty = build(&ast, &closure).unwrap();

    assert_eq!(ty.closure_ret().map(|r| r.kind), Some(TypeKind::Void));
    assert_eq!(ty.closure_params().len(), 1);
    assert_eq!(ty.to_string(), "fn<void, i32>");
}

#[test]
fn test_flags() {
    let mut ast = Ast::new("test.lang");
    let expr = ast.ty("string").constant().reference();
    let ty = build(&ast, &expr).unwrap();

    assert!(ty.is_const);
    assert!(ty.is_reference);
    assert!(ty.is_type_matched(&Type::string()));
}

#[test]
fn test_cast_rules() {
    assert!(Type::int(16).can_cast(&Type::float(64)));
    assert!(!Type::string().can_cast(&Type::int(32)));
    assert!(Type::dyn_vec(Type::int(32)).can_cast(&Type::dyn_vec(Type::int(32))));
    assert!(!Type::dyn_vec(Type::int(32)).can_cast(&Type::dyn_vec(Type::int(64))));
    assert!(!Type::tuple(vec![Type::int(32)]).can_cast(&Type::tuple(vec![Type::float(32)])));
    assert!(!Type::invalid().can_cast(&Type::invalid()));
}

#[test]
fn test_slot_kinds() {
    assert_eq!(Type::int(16).slot_kind(), Some(SlotKind::Int));
    assert_eq!(Type::float(32).slot_kind(), Some(SlotKind::Float));
    assert_eq!(Type::string().slot_kind(), Some(SlotKind::Str));
    assert_eq!(Type::structure("Point", 8).slot_kind(), None);
}

fn numeric() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::int(16)),
        Just(Type::int(32)),
        Just(Type::int(64)),
        Just(Type::float(32)),
        Just(Type::float(64)),
    ]
}

proptest! {
    #[test]
    fn numeric_casts_are_symmetric(a in numeric(), b in numeric()) {
        prop_assert!(a.can_cast(&b));
        prop_assert!(b.can_cast(&a));
    }

    #[test]
    fn widening_never_narrows(a in numeric(), b in numeric()) {
        let wide = a.widen(&b);
        prop_assert!(wide.bit_width() >= a.bit_width().min(b.bit_width()));
        if a.is_float() || b.is_float() {
            prop_assert!(wide.is_float());
        } else {
            prop_assert_eq!(wide.bit_width(), a.bit_width().max(b.bit_width()));
        }
    }
}
