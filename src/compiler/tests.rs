//! Unit tests for the symbol environment, enum interning, options and the
//! shape of generated modules.

use inkwell::context::Context;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::{
    ast::{
        ast::Ast,
        expressions::BinaryOp,
    },
    compiler::{
        compiler::compile,
        context::EnumTable,
        environment::{join_path, split_path, Environment, OwnedResource},
        options::CompileOptions,
        value::Value,
    },
    errors::errors::{ErrorImpl, ErrorKind},
    types::types::Type,
};

fn externals() -> Vec<String> {
    CompileOptions::default().external_namespaces
}

#[test]
fn test_split_and_join_path() {
    assert_eq!(
        split_path("a::b::c"),
        (vec![String::from("a"), String::from("b")], String::from("c"))
    );
    assert_eq!(split_path("c"), (vec![], String::from("c")));
    assert_eq!(join_path(&[String::from("a")], "c"), "a::c");
    assert_eq!(join_path(&[], "c"), "c");
}

#[test]
fn test_candidate_namespaces_nearest_first() {
    let mut env: Environment<'_> = Environment::new(externals(), None);
    env.push_namespace("a");
    env.push_namespace("b");

    assert_eq!(
        env.candidate_namespaces(&[String::from("x")]),
        vec!["a::b::x", "a::x", "x"]
    );
    assert_eq!(
        env.candidate_namespaces(&[String::from("global"), String::from("x")]),
        vec!["x"]
    );
    assert_eq!(env.candidate_namespaces(&[String::from("vec")]), vec!["vec"]);
}

#[test]
fn test_lookup_walks_parent_namespaces() {
    let mut env: Environment<'_> = Environment::new(externals(), None);
    env.push_namespace("a");
    env.define_variable("c", Value::invalid()).unwrap();
    env.push_namespace("b");

    assert!(env.get_variable("c").is_some());
    assert!(env.get_variable("a::c").is_some());
    assert!(env.get_variable("global::a::c").is_some());
    assert!(env.get_variable("global::c").is_none());
    assert!(env.get_variable("b::c").is_none());
}

#[test]
fn test_global_frame_survives_its_release() {
    let context = Context::create();
    let module = context.create_module("frames");
    let slot = module
        .add_global(context.i64_type(), None, "slot")
        .as_pointer_value();
    let mut env: Environment<'_> = Environment::new(externals(), None);
    env.register_cleanup(OwnedResource::new(slot, Type::string()));
    env.push();
    env.register_cleanup(OwnedResource::new(slot, Type::string()));

    assert_eq!(env.take_cleanup().len(), 1);
    assert!(env.pop().is_some());
    assert_eq!(env.take_cleanup().len(), 1);
    assert!(env.take_cleanup().is_empty());
    assert!(env.pop().is_none());
    assert_eq!(env.top_index(), 0);
    assert!(env.is_global());
}

#[test]
fn test_inner_frames_shadow_outer_ones() {
    let mut env: Environment<'_> = Environment::new(externals(), None);
    env.define_variable("x", Value::invalid()).unwrap();
    env.push();
    env.define_variable("x", Value::void()).unwrap();

    assert!(env.get_variable("x").unwrap().is_valid());
    env.pop();
    assert!(!env.get_variable("x").unwrap().is_valid());
}

#[test]
fn test_duplicate_and_reserved_names() {
    let mut env: Environment<'_> = Environment::new(externals(), None);
    env.define_variable("x", Value::invalid()).unwrap();

    assert!(matches!(
        env.define_variable("x", Value::invalid()),
        Err(ErrorImpl::DuplicateDefinition { .. })
    ));
    assert!(matches!(
        env.define_variable("_", Value::invalid()),
        Err(ErrorImpl::InvalidName { .. })
    ));
    assert!(matches!(
        env.define_variable("a::x", Value::invalid()),
        Err(ErrorImpl::InvalidName { .. })
    ));
}

#[test]
fn test_global_frame_is_never_popped() {
    let mut env: Environment<'_> = Environment::new(externals(), None);
    assert!(env.is_global());
    assert!(env.pop().is_none());
    env.push();
    assert!(!env.is_global());
    assert_eq!(env.frames_until(0, false), vec![1]);
    assert_eq!(env.frames_until(0, true), vec![1, 0]);
}

#[test]
fn test_enum_interning() {
    let mut table = EnumTable::default();
    let north = table.intern(":north");
    let south = table.intern("south");

    assert_eq!(table.intern("north"), north);
    assert_ne!(north, south);
    assert_eq!(table.name_of(south), Some("south"));
    assert_eq!(table.name_of(7), None);
    assert_eq!(table.len(), 2);
}

proptest! {
    #[test]
    fn test_enum_ids_are_dense_and_stable(names in prop::collection::vec("[a-z]{1,6}", 1..20)) {
        let mut table = EnumTable::default();
        let first: Vec<i32> = names.iter().map(|name| table.intern(name)).collect();
        let second: Vec<i32> = names.iter().map(|name| table.intern(name)).collect();

        prop_assert_eq!(&first, &second);
        for (name, id) in names.iter().zip(first.iter()) {
            prop_assert_eq!(table.name_of(*id), Some(name.as_str()));
            prop_assert!((*id as usize) < table.len());
        }
    }
}

#[test]
fn test_default_options() {
    let options = CompileOptions::default();
    assert_eq!(options.module_name, "main");
    assert_eq!(options.error_limit, 10);
    assert!(options.verify);
    assert!(options.external_namespaces.iter().any(|n| n == "math"));

    let options = options
        .with_error_limit(3)
        .with_external_namespace("gfx")
        .with_external_namespace("gfx");
    assert_eq!(options.error_limit, 3);
    assert_eq!(
        options
            .external_namespaces
            .iter()
            .filter(|n| *n == "gfx")
            .count(),
        1
    );
}

#[test]
fn test_module_layout() {
    let mut ast = Ast::new("test.lang");
    let i32_ty = ast.ty("i32");
    let a = ast.var("a");
    let b = ast.var("b");
    let sum = ast.binary(a, BinaryOp::Add, b);
    let ret = ast.return_stmt(Some(sum));
    let body = ast.block(vec![ret]);
    let (pa, pb) = (ast.ty("i32"), ast.ty("i32"));
    let add = ast.function("add", vec![(pa, "a"), (pb, "b")], Some(i32_ty), body);
    let namespace = ast.namespace("geo", vec![add]);
    ast.push_root(namespace);
    let one = ast.int(1);
    let counter = ast.var_decl(None, "counter", Some(one));
    ast.push_root(counter);

    let context = Context::create();
    let module = compile(&ast, &context, CompileOptions::default()).unwrap();

    assert!(module.get_function("main").is_some());
    assert!(module.get_function("__init_enums").is_some());
    let add = module.get_function("lang.geo::add").unwrap();
    // Return slot first, then both parameters.
    assert_eq!(add.count_params(), 3);
    assert!(module.get_global("global.counter").is_some());
}

#[test]
fn test_missing_return_is_reported() {
    let mut ast = Ast::new("test.lang");
    let i32_ty = ast.ty("i32");
    let body = ast.block(vec![]);
    let function = ast.function("nothing", vec![], Some(i32_ty), body);
    ast.push_root(function);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();

    assert_eq!(diagnostics.len(), 1);
    let error = &diagnostics.records()[0];
    assert_eq!(error.kind(), ErrorKind::ControlFlow);
    assert!(matches!(error.get_impl(), ErrorImpl::MissingReturn { .. }));
}

#[test]
fn test_diagnostics_carry_function_context() {
    let mut ast = Ast::new("test.lang");
    let missing = ast.var("missing");
    let stmt = ast.expr_stmt(missing);
    let body = ast.block(vec![stmt]);
    let function = ast.function("broken", vec![], None, body);
    let namespace = ast.namespace("geo", vec![function]);
    ast.push_root(namespace);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.records()[0].get_context(), "geo::broken");
}
