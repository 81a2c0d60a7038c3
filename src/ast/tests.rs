//! Unit tests for the syntax tree arena and its builders.

use crate::ast::{
    ast::Ast,
    expressions::{BinaryOp, Expr, Literal},
    statements::Stmt,
};

#[test]
fn test_tokens_take_current_line() {
    let mut ast = Ast::new("test.lang");
    let first = ast.int(1);
    ast.at_line(7);
    let second = ast.int(2);

    assert_eq!(ast.expr_token(first).line, 1);
    assert_eq!(ast.expr_token(second).line, 7);
    assert_eq!(ast.expr_token(second).file.as_str(), "test.lang");
}

#[test]
fn test_enum_literal_drops_colon() {
    let mut ast = Ast::new("test.lang");
    let north = ast.enum_lit(":north");

    match ast.expr(north) {
        Expr::Literal {
            value: Literal::Enum(name),
            ..
        } => assert_eq!(name, "north"),
        other => panic!("unexpected expression {:?}", other),
    }
    assert_eq!(ast.expr_token(north).lexeme, ":north");
}

#[test]
fn test_binary_token_is_operator() {
    let mut ast = Ast::new("test.lang");
    let left = ast.int(1);
    let right = ast.int(2);
    let sum = ast.binary(left, BinaryOp::Add, right);

    assert_eq!(ast.expr_token(sum).lexeme, "+");
}

#[test]
fn test_c_for_wraps_initialiser() {
    let mut ast = Ast::new("test.lang");
    let ty = ast.ty("i32");
    let zero = ast.int(0);
    let init = ast.var_decl(Some(ty), "i", Some(zero));
    let i = ast.var("i");
    let ten = ast.int(10);
    let condition = ast.binary(i, BinaryOp::Less, ten);
    let i = ast.var("i");
    let one = ast.int(1);
    let post = ast.compound_assign(i, crate::ast::expressions::AssignOp::Add, one);
    let body = ast.block(vec![]);
    let looped = ast.c_for(Some(init), condition, post, body);

    match ast.stmt(looped) {
        Stmt::Block { body, .. } => {
            assert_eq!(body.len(), 2);
            assert!(matches!(ast.stmt(body[1]), Stmt::While { post: Some(_), .. }));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_expression_statement_reuses_token() {
    let mut ast = Ast::new("test.lang");
    let call = ast.call("vec::append", vec![]);
    let stmt = ast.expr_stmt(call);

    assert_eq!(ast.stmt_token(stmt).lexeme, "vec::append");
}
