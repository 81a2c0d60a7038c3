//! Integration tests for end-to-end compilation.
//!
//! These tests build syntax trees, lower them to LLVM IR and run the result
//! through the JIT, checking what the program printed.

use inkwell::context::Context;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use semantic_backend::{
    ast::{
        ast::{Ast, ExprId, StmtId},
        expressions::{AssignOp, BinaryOp, FormatPart},
    },
    compile,
    errors::errors::{ErrorImpl, ErrorKind},
    render_diagnostics,
    runtime::{execute, handle_stats, HandleStats, RuntimeError},
    CompileOptions,
};

fn push_all(ast: &mut Ast, statements: Vec<StmtId>) {
    for statement in statements {
        ast.push_root(statement);
    }
}

fn run(ast: &Ast) -> Result<String, RuntimeError> {
    let context = Context::create();
    let module = match compile(ast, &context, CompileOptions::default()) {
        Ok(module) => module,
        Err(diagnostics) => panic!("unexpected diagnostics:\n{}", render_diagnostics(&diagnostics)),
    };
    execute(&module)
}

/// Runs a program that must not fault and reports how many runtime handles
/// it allocated and released.
fn run_counted(ast: &Ast) -> (String, HandleStats) {
    let output = run(ast).unwrap();
    (output, handle_stats())
}

fn assert_all_released(stats: HandleStats) {
    assert!(stats.allocated > 0, "program allocated no handles");
    assert_eq!(stats.released, stats.allocated);
}

/// `struct Inner { string s; }` and `struct Outer { Inner i; }`
fn nested_structs(ast: &mut Ast) -> Vec<StmtId> {
    let s_ty = ast.ty("string");
    let inner = ast.struct_decl("Inner", vec![(s_ty, "s")]);
    let i_ty = ast.ty("Inner");
    let outer = ast.struct_decl("Outer", vec![(i_ty, "i")]);
    vec![inner, outer]
}

/// `target.i.s = text`
fn set_nested(ast: &mut Ast, target: &str, text: &str) -> StmtId {
    let object = ast.var(target);
    let inner = ast.member(object, "i");
    let value = ast.string(text);
    let set = ast.member_set(inner, "s", value);
    ast.expr_stmt(set)
}

/// `target.i.s`
fn get_nested(ast: &mut Ast, target: &str) -> ExprId {
    let object = ast.var(target);
    let inner = ast.member(object, "i");
    ast.member(inner, "s")
}

/// `Outer b; b.i.s = "orig"; Outer a = b; b.i.s = "x"; println(a.i.s, b.i.s);`
fn nested_copy_program(ast: &mut Ast) -> Vec<StmtId> {
    let b_ty = ast.ty("Outer");
    let b = ast.var_decl(Some(b_ty), "b", None);
    let set_orig = set_nested(ast, "b", "orig");
    let (a_ty, b_var) = (ast.ty("Outer"), ast.var("b"));
    let a = ast.var_decl(Some(a_ty), "a", Some(b_var));
    let set_x = set_nested(ast, "b", "x");
    let (a_s, b_s) = (get_nested(ast, "a"), get_nested(ast, "b"));
    let print = ast.println(vec![a_s, b_s]);
    vec![b, set_orig, a, set_x, print]
}

#[test]
fn test_float_cast_to_string() {
    let mut ast = Ast::new("test.lang");
    let (i32_ty, f32_ty, f32_cast, string_ty, string_cast) = (
        ast.ty("i32"),
        ast.ty("f32"),
        ast.ty("f32"),
        ast.ty("string"),
        ast.ty("string"),
    );
    let five = ast.int(5);
    let x = ast.var_decl(Some(i32_ty), "x", Some(five));
    let x_var = ast.var("x");
    let as_f32 = ast.cast(x_var, f32_cast);
    let y = ast.var_decl(Some(f32_ty), "y", Some(as_f32));
    let y_var = ast.var("y");
    let as_string = ast.cast(y_var, string_cast);
    let s = ast.var_decl(Some(string_ty), "s", Some(as_string));
    let s_var = ast.var("s");
    let print = ast.println(vec![s_var]);
    push_all(&mut ast, vec![x, y, s, print]);

    assert_eq!(run(&ast).unwrap(), "5.000000\n");
}

#[test]
fn test_vec_append_then_len() {
    let mut ast = Ast::new("test.lang");
    let element = ast.ty("i32");
    let vec_ty = ast.ty_args("vec", vec![element]);
    let items = vec![ast.int(1), ast.int(2), ast.int(3)];
    let literal = ast.list(items);
    let decl = ast.var_decl(Some(vec_ty), "v", Some(literal));
    let (v, four) = (ast.var("v"), ast.int(4));
    let append = ast.call("vec::append", vec![v, four]);
    let append = ast.expr_stmt(append);
    let v = ast.var("v");
    let len = ast.call("len", vec![v]);
    let print = ast.println(vec![len]);
    push_all(&mut ast, vec![decl, append, print]);

    assert_eq!(run(&ast).unwrap(), "4\n");
}

#[test]
fn test_top_level_break_is_rejected() {
    let mut ast = Ast::new("test.lang");
    let brk = ast.break_stmt();
    ast.push_root(brk);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.count_kind(ErrorKind::ControlFlow), 1);
}

#[test]
fn test_integer_division_yields_float() {
    let mut ast = Ast::new("test.lang");
    let (ten, two) = (ast.int(10), ast.int(2));
    let quotient = ast.binary(ten, BinaryOp::Div, two);
    let (seven, three) = (ast.int(7), ast.int(3));
    let remainder = ast.binary(seven, BinaryOp::Mod, three);
    let print = ast.println(vec![quotient, remainder]);
    ast.push_root(print);

    assert_eq!(run(&ast).unwrap(), "5.000000 1\n");
}

#[test]
fn test_struct_copies_are_deep() {
    let mut ast = Ast::new("test.lang");
    let (x_ty, name_ty) = (ast.ty("i32"), ast.ty("string"));
    let point = ast.struct_decl("Point", vec![(x_ty, "x"), (name_ty, "name")]);

    let (one, a_name) = (ast.int(1), ast.string("a"));
    let literal = ast.struct_lit("Point", vec![("x", one), ("name", a_name)]);
    let a_ty = ast.ty("Point");
    let a = ast.var_decl(Some(a_ty), "a", Some(literal));
    let a_var = ast.var("a");
    let b_ty = ast.ty("Point");
    let b = ast.var_decl(Some(b_ty), "b", Some(a_var));

    let (b_var, two) = (ast.var("b"), ast.int(2));
    let set_x = ast.member_set(b_var, "x", two);
    let set_x = ast.expr_stmt(set_x);
    let (b_var, b_name) = (ast.var("b"), ast.string("b"));
    let set_name = ast.member_set(b_var, "name", b_name);
    let set_name = ast.expr_stmt(set_name);

    let a_var = ast.var("a");
    let print_a = ast.println(vec![a_var]);
    let b_var = ast.var("b");
    let b_x = ast.member(b_var, "x");
    let print_b = ast.println(vec![b_x]);
    let b_var = ast.var("b");
    let print_whole_b = ast.println(vec![b_var]);
    push_all(
        &mut ast,
        vec![point, a, b, set_x, set_name, print_a, print_b, print_whole_b],
    );

    assert_eq!(
        run(&ast).unwrap(),
        "Point { x: 1, name: a }\n2\nPoint { x: 2, name: b }\n"
    );
}

#[test]
fn test_structs_may_reference_later_structs() {
    let mut ast = Ast::new("test.lang");
    let inner_ty = ast.ty("Inner");
    let outer = ast.struct_decl("Outer", vec![(inner_ty, "inner")]);
    let value_ty = ast.ty("i32");
    let inner = ast.struct_decl("Inner", vec![(value_ty, "value")]);
    let outer_ty = ast.ty("Outer");
    let decl = ast.var_decl(Some(outer_ty), "o", None);
    let o = ast.var("o");
    let print = ast.println(vec![o]);
    push_all(&mut ast, vec![outer, inner, decl, print]);

    assert_eq!(run(&ast).unwrap(), "Outer { inner: Inner { value: 0 } }\n");
}

#[test]
fn test_recursive_struct_is_rejected() {
    let mut ast = Ast::new("test.lang");
    let node_ty = ast.ty("Node");
    let node = ast.struct_decl("Node", vec![(node_ty, "next")]);
    ast.push_root(node);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();
    assert!(diagnostics
        .iter()
        .any(|error| matches!(error.get_impl(), ErrorImpl::RecursiveStruct { .. })));
}

#[test]
fn test_namespace_resolution() {
    let mut ast = Ast::new("test.lang");
    let (w, h) = (ast.var("w"), ast.var("h"));
    let product = ast.binary(w, BinaryOp::Mul, h);
    let ret = ast.return_stmt(Some(product));
    let body = ast.block(vec![ret]);
    let (w_ty, h_ty, ret_ty) = (ast.ty("i32"), ast.ty("i32"), ast.ty("i32"));
    let area = ast.function("area", vec![(w_ty, "w"), (h_ty, "h")], Some(ret_ty), body);

    let (w, h) = (ast.var("w"), ast.var("h"));
    let call = ast.call("area", vec![w, h]);
    let two = ast.int(2);
    let doubled = ast.binary(call, BinaryOp::Mul, two);
    let ret = ast.return_stmt(Some(doubled));
    let body = ast.block(vec![ret]);
    let (w_ty, h_ty, ret_ty) = (ast.ty("i32"), ast.ty("i32"), ast.ty("i32"));
    let double_area = ast.function(
        "double_area",
        vec![(w_ty, "w"), (h_ty, "h")],
        Some(ret_ty),
        body,
    );
    let geo = ast.namespace("geo", vec![area, double_area]);

    let (a, b) = (ast.int(2), ast.int(3));
    let first = ast.call("geo::area", vec![a, b]);
    let (a, b) = (ast.int(2), ast.int(3));
    let second = ast.call("global::geo::double_area", vec![a, b]);
    let print = ast.println(vec![first, second]);
    push_all(&mut ast, vec![geo, print]);

    assert_eq!(run(&ast).unwrap(), "6 12\n");
}

#[test]
fn test_unknown_function_outside_its_namespace() {
    let mut ast = Ast::new("test.lang");
    let body = ast.block(vec![]);
    let helper = ast.function("helper", vec![], None, body);
    let geo = ast.namespace("geo", vec![helper]);
    let call = ast.call("helper", vec![]);
    let call = ast.expr_stmt(call);
    push_all(&mut ast, vec![geo, call]);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.records()[0].get_error_name(), "UnknownFunction");
}

#[test]
fn test_functions_see_globals() {
    let mut ast = Ast::new("test.lang");
    let (ty, ten) = (ast.ty("i32"), ast.int(10));
    let counter = ast.var_decl(Some(ty), "counter", Some(ten));
    let (target, one) = (ast.var("counter"), ast.int(1));
    let bump = ast.compound_assign(target, AssignOp::Add, one);
    let bump = ast.expr_stmt(bump);
    let body = ast.block(vec![bump]);
    let function = ast.function("bump", vec![], None, body);
    let first = ast.call("bump", vec![]);
    let first = ast.expr_stmt(first);
    let second = ast.call("bump", vec![]);
    let second = ast.expr_stmt(second);
    let value = ast.var("counter");
    let print = ast.println(vec![value]);
    push_all(&mut ast, vec![counter, function, first, second, print]);

    assert_eq!(run(&ast).unwrap(), "12\n");
}

#[test]
fn test_enum_printing_and_equality() {
    let mut ast = Ast::new("test.lang");
    let (ty, north) = (ast.ty("enum"), ast.enum_lit(":north"));
    let decl = ast.var_decl(Some(ty), "d", Some(north));
    let d = ast.var("d");
    let (d_again, north) = (ast.var("d"), ast.enum_lit("north"));
    let same = ast.binary(d_again, BinaryOp::Eq, north);
    let (d_again, south) = (ast.var("d"), ast.enum_lit("south"));
    let different = ast.binary(d_again, BinaryOp::Eq, south);
    let print = ast.println(vec![d, same, different]);
    push_all(&mut ast, vec![decl, print]);

    assert_eq!(run(&ast).unwrap(), "north true false\n");
}

#[test]
fn test_range_loop_with_break_and_continue() {
    let mut ast = Ast::new("test.lang");
    let (ty, zero) = (ast.ty("i32"), ast.int(0));
    let total = ast.var_decl(Some(ty), "total", Some(zero));

    let (i, five) = (ast.var("i"), ast.int(5));
    let is_five = ast.binary(i, BinaryOp::Eq, five);
    let brk = ast.break_stmt();
    let stop = ast.if_stmt(is_five, brk, None);

    let (i, two) = (ast.var("i"), ast.int(2));
    let rem = ast.binary(i, BinaryOp::Mod, two);
    let zero = ast.int(0);
    let is_even = ast.binary(rem, BinaryOp::Eq, zero);
    let cont = ast.continue_stmt();
    let skip = ast.if_stmt(is_even, cont, None);

    let (target, i) = (ast.var("total"), ast.var("i"));
    let add = ast.compound_assign(target, AssignOp::Add, i);
    let add = ast.expr_stmt(add);
    let body = ast.block(vec![stop, skip, add]);
    let (start, end) = (ast.int(0), ast.int(10));
    let range = ast.range(start, end);
    let looped = ast.for_in(vec!["i"], range, body);

    let total_var = ast.var("total");
    let print = ast.println(vec![total_var]);
    push_all(&mut ast, vec![total, looped, print]);

    assert_eq!(run(&ast).unwrap(), "4\n");
}

#[test]
fn test_strings_in_loops_with_continue() {
    let mut ast = Ast::new("test.lang");
    let (prefix, i) = (ast.string("x"), ast.var("i"));
    let cast_ty = ast.ty("string");
    let text = ast.cast(i, cast_ty);
    let joined = ast.binary(prefix, BinaryOp::Add, text);
    let ty = ast.ty("string");
    let decl = ast.var_decl(Some(ty), "s", Some(joined));
    let (i, one) = (ast.var("i"), ast.int(1));
    let is_one = ast.binary(i, BinaryOp::Eq, one);
    let cont = ast.continue_stmt();
    let skip = ast.if_stmt(is_one, cont, None);
    let s = ast.var("s");
    let print = ast.println(vec![s]);
    let body = ast.block(vec![decl, skip, print]);
    let (start, end) = (ast.int(0), ast.int(3));
    let range = ast.range(start, end);
    let looped = ast.for_in(vec!["i"], range, body);
    ast.push_root(looped);

    assert_eq!(run(&ast).unwrap(), "x0\nx2\n");
}

#[test]
fn test_c_style_for() {
    let mut ast = Ast::new("test.lang");
    let (ty, zero) = (ast.ty("i32"), ast.int(0));
    let init = ast.var_decl(Some(ty), "i", Some(zero));
    let (i, three) = (ast.var("i"), ast.int(3));
    let condition = ast.binary(i, BinaryOp::Less, three);
    let (i, one) = (ast.var("i"), ast.int(1));
    let post = ast.compound_assign(i, AssignOp::Add, one);
    let i = ast.var("i");
    let print = ast.print(vec![i]);
    let body = ast.block(vec![print]);
    let looped = ast.c_for(Some(init), condition, post, body);
    ast.push_root(looped);

    assert_eq!(run(&ast).unwrap(), "012");
}

#[test]
fn test_return_from_inside_a_loop() {
    let mut ast = Ast::new("test.lang");
    let (ty, v) = (ast.ty("string"), ast.string("v"));
    let decl = ast.var_decl(Some(ty), "s", Some(v));

    let (s, bang) = (ast.var("s"), ast.string("!"));
    let grown = ast.binary(s, BinaryOp::Add, bang);
    let s = ast.var("s");
    let assign = ast.assign(s, grown);
    let assign = ast.expr_stmt(assign);
    let (i, one) = (ast.var("i"), ast.int(1));
    let is_one = ast.binary(i, BinaryOp::Eq, one);
    let s = ast.var("s");
    let early = ast.return_stmt(Some(s));
    let stop = ast.if_stmt(is_one, early, None);
    let loop_body = ast.block(vec![assign, stop]);
    let (start, n) = (ast.int(0), ast.var("n"));
    let range = ast.range(start, n);
    let looped = ast.for_in(vec!["i"], range, loop_body);
    let s = ast.var("s");
    let last = ast.return_stmt(Some(s));
    let body = ast.block(vec![decl, looped, last]);
    let (n_ty, ret_ty) = (ast.ty("i32"), ast.ty("string"));
    let function = ast.function("make", vec![(n_ty, "n")], Some(ret_ty), body);

    let five = ast.int(5);
    let first = ast.call("make", vec![five]);
    let zero = ast.int(0);
    let second = ast.call("make", vec![zero]);
    let print = ast.println(vec![first, second]);
    push_all(&mut ast, vec![function, print]);

    assert_eq!(run(&ast).unwrap(), "v!! v\n");
}

#[test]
fn test_map_and_set_iteration() {
    let mut ast = Ast::new("test.lang");
    let (key_ty, value_ty) = (ast.ty("string"), ast.ty("i32"));
    let map_ty = ast.ty_args("map", vec![key_ty, value_ty]);
    let (a, one) = (ast.string("a"), ast.int(1));
    let first = ast.pair(a, one);
    let (b, two) = (ast.string("b"), ast.int(2));
    let second = ast.pair(b, two);
    let literal = ast.list(vec![first, second]);
    let map = ast.var_decl(Some(map_ty), "m", Some(literal));
    let (k, v) = (ast.var("k"), ast.var("v"));
    let print = ast.println(vec![k, v]);
    let body = ast.block(vec![print]);
    let m = ast.var("m");
    let map_loop = ast.for_in(vec!["k", "v"], m, body);

    let element = ast.ty("i32");
    let set_ty = ast.ty_args("set", vec![element]);
    let items = vec![ast.int(3), ast.int(1), ast.int(3)];
    let literal = ast.list(items);
    let set = ast.var_decl(Some(set_ty), "s", Some(literal));
    let key = ast.var("key");
    let print = ast.print(vec![key]);
    let body = ast.block(vec![print]);
    let s = ast.var("s");
    let set_loop = ast.for_in(vec!["key"], s, body);
    let s = ast.var("s");
    let len = ast.call("len", vec![s]);
    let print_len = ast.println(vec![len]);

    push_all(&mut ast, vec![map, map_loop, set, set_loop, print_len]);

    assert_eq!(run(&ast).unwrap(), "a 1\nb 2\n312\n");
}

#[test]
fn test_vector_iteration_with_index() {
    let mut ast = Ast::new("test.lang");
    let element = ast.ty("string");
    let vec_ty = ast.ty_args("vec", vec![element]);
    let items = vec![ast.string("x"), ast.string("y")];
    let literal = ast.list(items);
    let decl = ast.var_decl(Some(vec_ty), "v", Some(literal));
    let (index, item) = (ast.var("index"), ast.var("item"));
    let print = ast.println(vec![index, item]);
    let body = ast.block(vec![print]);
    let v = ast.var("v");
    let looped = ast.for_in(vec!["index", "item"], v, body);
    push_all(&mut ast, vec![decl, looped]);

    assert_eq!(run(&ast).unwrap(), "0 x\n1 y\n");
}

#[test]
fn test_functor_call_through_variable() {
    let mut ast = Ast::new("test.lang");
    let (x, two) = (ast.var("x"), ast.int(2));
    let doubled = ast.binary(x, BinaryOp::Mul, two);
    let ret = ast.return_stmt(Some(doubled));
    let body = ast.block(vec![ret]);
    let (param_ty, ret_ty) = (ast.ty("i32"), ast.ty("i32"));
    let functor = ast.functor(vec![(param_ty, "x")], Some(ret_ty), body);
    let (closure_ret, closure_param) = (ast.ty("i32"), ast.ty("i32"));
    let closure_ty = ast.ty_args("fn", vec![closure_ret, closure_param]);
    let decl = ast.var_decl(Some(closure_ty), "twice", Some(functor));
    let arg = ast.int(21);
    let call = ast.call("twice", vec![arg]);
    let print = ast.println(vec![call]);
    push_all(&mut ast, vec![decl, print]);

    assert_eq!(run(&ast).unwrap(), "42\n");
}

#[test]
fn test_tuple_destructuring_and_format() {
    let mut ast = Ast::new("test.lang");
    let (one, x) = (ast.int(1), ast.string("x"));
    let tuple = ast.group(vec![one, x]);
    let (a_ty, b_ty) = (ast.ty("i32"), ast.ty("string"));
    let decl = ast.destructure_decl(vec![(Some(a_ty), "a"), (Some(b_ty), "b")], tuple);
    let (a, b) = (ast.var("a"), ast.var("b"));
    let text = ast.format(vec![
        FormatPart::Text(String::from("a=")),
        FormatPart::Expr(a),
        FormatPart::Text(String::from(", b=")),
        FormatPart::Expr(b),
    ]);
    let print = ast.println(vec![text]);
    push_all(&mut ast, vec![decl, print]);

    assert_eq!(run(&ast).unwrap(), "a=1, b=x\n");
}

#[test]
fn test_float_equality_is_rejected() {
    let mut ast = Ast::new("test.lang");
    let (a, b) = (ast.float(0.1), ast.float(0.1));
    let eq = ast.binary(a, BinaryOp::Eq, b);
    let print = ast.println(vec![eq]);
    let (a, b) = (ast.float(0.1), ast.float(0.1000001));
    let approx = ast.binary(a, BinaryOp::ApproxEq, b);
    let print_approx = ast.println(vec![approx]);
    push_all(&mut ast, vec![print, print_approx]);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.records()[0].get_error_name(), "FloatEquality");
}

#[test]
fn test_float_vector_membership_is_rejected() {
    let mut ast = Ast::new("test.lang");
    let element = ast.ty("f64");
    let vec_ty = ast.ty_args("vec", vec![element]);
    let items = vec![ast.float(0.5), ast.float(1.5)];
    let literal = ast.list(items);
    let decl = ast.var_decl(Some(vec_ty), "v", Some(literal));
    let (v, needle) = (ast.var("v"), ast.float(0.5));
    let found = ast.call("contains", vec![v, needle]);
    let print = ast.println(vec![found]);
    push_all(&mut ast, vec![decl, print]);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.records()[0].get_error_name(), "FloatEquality");
}

#[test]
fn test_approximate_float_equality() {
    let mut ast = Ast::new("test.lang");
    let (a, b) = (ast.float(0.1), ast.float(0.1000001));
    let approx = ast.binary(a, BinaryOp::ApproxEq, b);
    let (c, d) = (ast.float(0.1), ast.float(0.2));
    let far = ast.binary(c, BinaryOp::ApproxEq, d);
    let print = ast.println(vec![approx, far]);
    ast.push_root(print);

    assert_eq!(run(&ast).unwrap(), "true false\n");
}

#[test]
fn test_runtime_fault_is_reported() {
    let mut ast = Ast::new("test.lang");
    let element = ast.ty("i32");
    let vec_ty = ast.ty_args("vec", vec![element]);
    let items = vec![ast.int(1)];
    let literal = ast.list(items);
    let decl = ast.var_decl(Some(vec_ty), "v", Some(literal));
    let (v, five) = (ast.var("v"), ast.int(5));
    let item = ast.index(v, five);
    let print = ast.println(vec![item]);
    push_all(&mut ast, vec![decl, print]);

    assert!(matches!(run(&ast), Err(RuntimeError::Fault { .. })));
}

#[test]
fn test_error_limit() {
    let mut ast = Ast::new("test.lang");
    for line in 1..=15 {
        ast.at_line(line);
        let missing = ast.var("missing");
        let stmt = ast.expr_stmt(missing);
        ast.push_root(stmt);
    }

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();

    assert_eq!(diagnostics.len(), 11);
    assert_eq!(diagnostics.count_kind(ErrorKind::Resolution), 10);
    assert_eq!(diagnostics.count_kind(ErrorKind::Limit), 1);
    assert!(diagnostics.is_saturated());
}

#[test]
fn test_const_assignment_is_rejected() {
    let mut ast = Ast::new("test.lang");
    let ty = ast.ty("i32").constant();
    let one = ast.int(1);
    let decl = ast.var_decl(Some(ty), "fixed", Some(one));
    let (target, two) = (ast.var("fixed"), ast.int(2));
    let assign = ast.assign(target, two);
    let assign = ast.expr_stmt(assign);
    push_all(&mut ast, vec![decl, assign]);

    let context = Context::create();
    let diagnostics = compile(&ast, &context, CompileOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.records()[0].get_error_name(), "ConstAssignment");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_widening_casts_round_trip(value in -32768i64..=32767) {
        let mut ast = Ast::new("test.lang");
        let (narrow, literal) = (ast.ty("i16"), ast.int(value));
        let decl = ast.var_decl(Some(narrow), "a", Some(literal));
        let a = ast.var("a");
        let wide_ty = ast.ty("f64");
        let wide = ast.cast(a, wide_ty);
        let back_ty = ast.ty("i16");
        let back = ast.cast(wide, back_ty);
        let a = ast.var("a");
        let long_ty = ast.ty("i64");
        let long = ast.cast(a, long_ty);
        let print = ast.println(vec![back, long]);
        push_all(&mut ast, vec![decl, print]);

        prop_assert_eq!(run(&ast).unwrap(), format!("{} {}\n", value, value));
    }
}

#[test]
fn test_nested_struct_copy_at_top_level() {
    let mut ast = Ast::new("test.lang");
    let mut statements = nested_structs(&mut ast);
    statements.extend(nested_copy_program(&mut ast));
    push_all(&mut ast, statements);

    let (output, stats) = run_counted(&ast);
    assert_eq!(output, "orig x\n");
    assert_all_released(stats);
}

#[test]
fn test_nested_struct_copy_in_block() {
    let mut ast = Ast::new("test.lang");
    let mut statements = nested_structs(&mut ast);
    let body = nested_copy_program(&mut ast);
    statements.push(ast.block(body));
    push_all(&mut ast, statements);

    let (output, stats) = run_counted(&ast);
    assert_eq!(output, "orig x\n");
    assert_all_released(stats);
}

#[test]
fn test_nested_struct_argument_is_copied() {
    let mut ast = Ast::new("test.lang");
    let mut statements = nested_structs(&mut ast);

    let change = set_nested(&mut ast, "o", "changed");
    let o_s = get_nested(&mut ast, "o");
    let print = ast.println(vec![o_s]);
    let body = ast.block(vec![change, print]);
    let param_ty = ast.ty("Outer");
    statements.push(ast.function("touch", vec![(param_ty, "o")], None, body));

    let b_ty = ast.ty("Outer");
    statements.push(ast.var_decl(Some(b_ty), "b", None));
    statements.push(set_nested(&mut ast, "b", "orig"));
    let b = ast.var("b");
    let call = ast.call("touch", vec![b]);
    statements.push(ast.expr_stmt(call));
    let b_s = get_nested(&mut ast, "b");
    statements.push(ast.println(vec![b_s]));
    push_all(&mut ast, statements);

    let (output, stats) = run_counted(&ast);
    assert_eq!(output, "changed\norig\n");
    assert_all_released(stats);
}

#[test]
fn test_loop_exits_release_locals() {
    let mut ast = Ast::new("test.lang");
    let (prefix, i) = (ast.string("x"), ast.var("i"));
    let cast_ty = ast.ty("string");
    let text = ast.cast(i, cast_ty);
    let joined = ast.binary(prefix, BinaryOp::Add, text);
    let s_ty = ast.ty("string");
    let s = ast.var_decl(Some(s_ty), "s", Some(joined));

    let element = ast.ty("string");
    let vec_ty = ast.ty_args("vec", vec![element]);
    let (s_var, y) = (ast.var("s"), ast.string("y"));
    let literal = ast.list(vec![s_var, y]);
    let v = ast.var_decl(Some(vec_ty), "v", Some(literal));

    let (i, one) = (ast.var("i"), ast.int(1));
    let is_one = ast.binary(i, BinaryOp::Eq, one);
    let cont = ast.continue_stmt();
    let skip = ast.if_stmt(is_one, cont, None);
    let (i, three) = (ast.var("i"), ast.int(3));
    let is_three = ast.binary(i, BinaryOp::Eq, three);
    let brk = ast.break_stmt();
    let stop = ast.if_stmt(is_three, brk, None);

    let (s_var, v_var) = (ast.var("s"), ast.var("v"));
    let len = ast.call("len", vec![v_var]);
    let print = ast.println(vec![s_var, len]);
    let body = ast.block(vec![s, v, skip, stop, print]);
    let (start, end) = (ast.int(0), ast.int(5));
    let range = ast.range(start, end);
    let looped = ast.for_in(vec!["i"], range, body);
    ast.push_root(looped);

    let (output, stats) = run_counted(&ast);
    assert_eq!(output, "x0 2\nx2 2\n");
    assert_all_released(stats);
}

#[test]
fn test_while_continue_releases_locals() {
    let mut ast = Ast::new("test.lang");
    let (ty, zero) = (ast.ty("i32"), ast.int(0));
    let counter = ast.var_decl(Some(ty), "i", Some(zero));

    let (i, one) = (ast.var("i"), ast.int(1));
    let bump = ast.compound_assign(i, AssignOp::Add, one);
    let bump = ast.expr_stmt(bump);
    let (prefix, i) = (ast.string("t"), ast.var("i"));
    let cast_ty = ast.ty("string");
    let text = ast.cast(i, cast_ty);
    let joined = ast.binary(prefix, BinaryOp::Add, text);
    let t_ty = ast.ty("string");
    let t = ast.var_decl(Some(t_ty), "t", Some(joined));
    let (i, two) = (ast.var("i"), ast.int(2));
    let is_two = ast.binary(i, BinaryOp::Eq, two);
    let cont = ast.continue_stmt();
    let skip = ast.if_stmt(is_two, cont, None);
    let t_var = ast.var("t");
    let print = ast.print(vec![t_var]);
    let body = ast.block(vec![bump, t, skip, print]);

    let (i, three) = (ast.var("i"), ast.int(3));
    let condition = ast.binary(i, BinaryOp::Less, three);
    let looped = ast.while_stmt(condition, body);
    push_all(&mut ast, vec![counter, looped]);

    let (output, stats) = run_counted(&ast);
    assert_eq!(output, "t1t3");
    assert_all_released(stats);
}

#[test]
fn test_early_return_releases_locals() {
    let mut ast = Ast::new("test.lang");
    let (s_ty, v) = (ast.ty("string"), ast.string("v"));
    let s = ast.var_decl(Some(s_ty), "s", Some(v));
    let element = ast.ty("i32");
    let vec_ty = ast.ty_args("vec", vec![element]);
    let items = vec![ast.int(1), ast.int(2)];
    let literal = ast.list(items);
    let seen = ast.var_decl(Some(vec_ty), "seen", Some(literal));

    let (s_var, bang) = (ast.var("s"), ast.string("!"));
    let grown = ast.binary(s_var, BinaryOp::Add, bang);
    let target = ast.var("s");
    let assign = ast.assign(target, grown);
    let assign = ast.expr_stmt(assign);
    let (i, one) = (ast.var("i"), ast.int(1));
    let is_one = ast.binary(i, BinaryOp::Eq, one);
    let s_var = ast.var("s");
    let early = ast.return_stmt(Some(s_var));
    let stop = ast.if_stmt(is_one, early, None);
    let loop_body = ast.block(vec![assign, stop]);
    let seen_var = ast.var("seen");
    let looped = ast.for_in(vec!["i"], seen_var, loop_body);
    let s_var = ast.var("s");
    let last = ast.return_stmt(Some(s_var));
    let body = ast.block(vec![s, seen, looped, last]);
    let ret_ty = ast.ty("string");
    let function = ast.function("grow", vec![], Some(ret_ty), body);

    let first = ast.call("grow", vec![]);
    let second = ast.call("grow", vec![]);
    let print = ast.println(vec![first, second]);
    push_all(&mut ast, vec![function, print]);

    let (output, stats) = run_counted(&ast);
    assert_eq!(output, "v! v!\n");
    assert_all_released(stats);
}

#[test]
fn test_globals_are_released_at_exit() {
    let mut ast = Ast::new("test.lang");
    let mut statements = nested_structs(&mut ast);
    let outer_ty = ast.ty("Outer");
    statements.push(ast.var_decl(Some(outer_ty), "o", None));
    statements.push(set_nested(&mut ast, "o", "kept"));

    let (key_ty, value_ty) = (ast.ty("string"), ast.ty("i32"));
    let map_ty = ast.ty_args("map", vec![key_ty, value_ty]);
    let (a, one) = (ast.string("a"), ast.int(1));
    let entry = ast.pair(a, one);
    let literal = ast.list(vec![entry]);
    statements.push(ast.var_decl(Some(map_ty), "m", Some(literal)));

    let (k, v) = (ast.var("k"), ast.var("v"));
    let print = ast.println(vec![k, v]);
    let body = ast.block(vec![print]);
    let m = ast.var("m");
    statements.push(ast.for_in(vec!["k", "v"], m, body));
    let o_s = get_nested(&mut ast, "o");
    statements.push(ast.println(vec![o_s]));
    push_all(&mut ast, statements);

    let (output, stats) = run_counted(&ast);
    assert_eq!(output, "a 1\nkept\n");
    assert_all_released(stats);
}

#[test]
fn test_remainder_by_zero_faults() {
    let mut ast = Ast::new("test.lang");
    let (a_ty, five) = (ast.ty("i32"), ast.int(5));
    let a = ast.var_decl(Some(a_ty), "a", Some(five));
    let (b_ty, zero) = (ast.ty("i32"), ast.int(0));
    let b = ast.var_decl(Some(b_ty), "b", Some(zero));
    let (a_var, b_var) = (ast.var("a"), ast.var("b"));
    let remainder = ast.binary(a_var, BinaryOp::Mod, b_var);
    let print = ast.println(vec![remainder]);
    let after = ast.string("after");
    let print_after = ast.println(vec![after]);
    push_all(&mut ast, vec![a, b, print, print_after]);

    match run(&ast) {
        Err(RuntimeError::Fault { message, output }) => {
            assert_eq!(message, "remainder of 5 by zero");
            assert_eq!(output, "0\nafter\n");
        }
        other => panic!("expected a fault, got {:?}", other),
    }
}

#[test]
fn test_negative_remainder() {
    let mut ast = Ast::new("test.lang");
    let (ty, value) = (ast.ty("i64"), ast.int(-7));
    let a = ast.var_decl(Some(ty), "a", Some(value));
    let (a_var, three) = (ast.var("a"), ast.int(3));
    let remainder = ast.binary(a_var, BinaryOp::Mod, three);
    let print = ast.println(vec![remainder]);
    push_all(&mut ast, vec![a, print]);

    assert_eq!(run(&ast).unwrap(), "-1\n");
}
