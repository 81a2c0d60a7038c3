use std::rc::Rc;

use crate::Position;

use super::{expressions::Expr, statements::Stmt};

/// Handle of a token stored in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(pub u32);

/// Handle of an expression stored in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Handle of a statement stored in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub u32);

/// A source token, kept for diagnostic attribution.
///
/// The lexeme of variable and call tokens may be a namespace path such as
/// `geo::area`.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub lexeme: String,
    pub line: u32,
    pub file: Rc<String>,
}

impl Token {
    pub fn position(&self) -> Position {
        Position(self.line, Rc::clone(&self.file))
    }
}

/// Syntax tree arena
///
/// Owns every token, expression and statement of one compilation unit.
/// Nodes refer to each other through small integer handles, so the tree can
/// be shared immutably with the code generator while it is being walked.
#[derive(Debug, Clone)]
pub struct Ast {
    file: Rc<String>,
    line: u32,
    tokens: Vec<Token>,
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    /// Top-level statements in source order
    pub root: Vec<StmtId>,
}

impl Ast {
    pub fn new(file: &str) -> Self {
        Ast {
            file: Rc::new(String::from(file)),
            line: 1,
            tokens: vec![],
            exprs: vec![],
            stmts: vec![],
            root: vec![],
        }
    }

    pub fn file(&self) -> &Rc<String> {
        &self.file
    }

    /// Sets the line attributed to every token created afterwards.
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    pub fn token(&mut self, lexeme: &str) -> TokenId {
        self.tokens.push(Token {
            lexeme: String::from(lexeme),
            line: self.line,
            file: Rc::clone(&self.file),
        });
        TokenId(self.tokens.len() as u32 - 1)
    }

    pub fn get_token(&self, id: TokenId) -> &Token {
        &self.tokens[id.0 as usize]
    }

    pub fn lexeme(&self, id: TokenId) -> &str {
        &self.tokens[id.0 as usize].lexeme
    }

    pub fn push_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() as u32 - 1)
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn push_stmt(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.push(stmt);
        StmtId(self.stmts.len() as u32 - 1)
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    /// Appends a statement to the top level of the unit.
    pub fn push_root(&mut self, stmt: StmtId) {
        self.root.push(stmt);
    }

    /// Token an expression is attributed to.
    pub fn expr_token(&self, id: ExprId) -> &Token {
        self.get_token(self.expr(id).token())
    }

    /// Token a statement is attributed to.
    pub fn stmt_token(&self, id: StmtId) -> &Token {
        self.get_token(self.stmt(id).token())
    }
}
