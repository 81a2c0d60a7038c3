use super::{
    ast::{Ast, ExprId, StmtId, TokenId},
    types::TypeExpr,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeExpr,
    pub name: TokenId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Token holding the plain function name
    pub name: TokenId,
    pub params: Vec<Param>,
    /// `None` for functions returning nothing
    pub ret: Option<TypeExpr>,
    pub body: StmtId,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block {
        body: Vec<StmtId>,
        token: TokenId,
    },
    Expression {
        expr: ExprId,
        token: TokenId,
    },
    /// `print` / `println`
    Print {
        args: Vec<ExprId>,
        newline: bool,
        token: TokenId,
    },
    /// `T name = init;`, or `name := init;` when no type is written
    VarDecl {
        ty: Option<TypeExpr>,
        name: TokenId,
        init: Option<ExprId>,
    },
    If {
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
        token: TokenId,
    },
    /// A `while` loop; with a post expression it is a C-style `for`
    While {
        condition: ExprId,
        body: StmtId,
        post: Option<ExprId>,
        token: TokenId,
    },
    /// `for value in iterable` or `for key, value in iterable`
    For {
        bindings: Vec<TokenId>,
        iterable: ExprId,
        body: StmtId,
        token: TokenId,
    },
    Function(FunctionDecl),
    Break {
        token: TokenId,
    },
    Continue {
        token: TokenId,
    },
    /// `(T a, U b) = tuple;`
    DestructureDecl {
        targets: Vec<(Option<TypeExpr>, TokenId)>,
        value: ExprId,
        token: TokenId,
    },
    Return {
        value: Option<ExprId>,
        token: TokenId,
    },
    StructDecl {
        name: TokenId,
        members: Vec<(TypeExpr, TokenId)>,
    },
    Namespace {
        name: TokenId,
        body: Vec<StmtId>,
    },
}

impl Stmt {
    pub fn token(&self) -> TokenId {
        match self {
            Stmt::Block { token, .. }
            | Stmt::Print { token, .. }
            | Stmt::If { token, .. }
            | Stmt::While { token, .. }
            | Stmt::For { token, .. }
            | Stmt::Break { token }
            | Stmt::Continue { token }
            | Stmt::DestructureDecl { token, .. }
            | Stmt::Return { token, .. }
            | Stmt::Expression { token, .. } => *token,
            Stmt::VarDecl { name, .. } => *name,
            Stmt::Function(decl) => decl.name,
            Stmt::StructDecl { name, .. } | Stmt::Namespace { name, .. } => *name,
        }
    }
}

impl Ast {
    pub fn block(&mut self, body: Vec<StmtId>) -> StmtId {
        let token = self.token("{");
        self.push_stmt(Stmt::Block { body, token })
    }

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        let token = self.expr(expr).token();
        self.push_stmt(Stmt::Expression { expr, token })
    }

    pub fn print(&mut self, args: Vec<ExprId>) -> StmtId {
        let token = self.token("print");
        self.push_stmt(Stmt::Print {
            args,
            newline: false,
            token,
        })
    }

    pub fn println(&mut self, args: Vec<ExprId>) -> StmtId {
        let token = self.token("println");
        self.push_stmt(Stmt::Print {
            args,
            newline: true,
            token,
        })
    }

    pub fn var_decl(&mut self, ty: Option<TypeExpr>, name: &str, init: Option<ExprId>) -> StmtId {
        let name = self.token(name);
        self.push_stmt(Stmt::VarDecl { ty, name, init })
    }

    pub fn if_stmt(
        &mut self,
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    ) -> StmtId {
        let token = self.token("if");
        self.push_stmt(Stmt::If {
            condition,
            then_branch,
            else_branch,
            token,
        })
    }

    pub fn while_stmt(&mut self, condition: ExprId, body: StmtId) -> StmtId {
        let token = self.token("while");
        self.push_stmt(Stmt::While {
            condition,
            body,
            post: None,
            token,
        })
    }

    /// C-style `for (init; condition; post)`, lowered as a block holding the
    /// initialiser and a `while` loop with a post expression.
    pub fn c_for(
        &mut self,
        init: Option<StmtId>,
        condition: ExprId,
        post: ExprId,
        body: StmtId,
    ) -> StmtId {
        let token = self.token("for");
        let looped = self.push_stmt(Stmt::While {
            condition,
            body,
            post: Some(post),
            token,
        });
        let body = init.into_iter().chain(Some(looped)).collect();
        self.block(body)
    }

    pub fn for_in(&mut self, bindings: Vec<&str>, iterable: ExprId, body: StmtId) -> StmtId {
        let token = self.token("for");
        let bindings = bindings.into_iter().map(|name| self.token(name)).collect();
        self.push_stmt(Stmt::For {
            bindings,
            iterable,
            body,
            token,
        })
    }

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<(TypeExpr, &str)>,
        ret: Option<TypeExpr>,
        body: StmtId,
    ) -> StmtId {
        let name = self.token(name);
        let params = params
            .into_iter()
            .map(|(ty, param)| Param {
                ty,
                name: self.token(param),
            })
            .collect();
        self.push_stmt(Stmt::Function(FunctionDecl {
            name,
            params,
            ret,
            body,
        }))
    }

    pub fn break_stmt(&mut self) -> StmtId {
        let token = self.token("break");
        self.push_stmt(Stmt::Break { token })
    }

    pub fn continue_stmt(&mut self) -> StmtId {
        let token = self.token("continue");
        self.push_stmt(Stmt::Continue { token })
    }

    pub fn destructure_decl(
        &mut self,
        targets: Vec<(Option<TypeExpr>, &str)>,
        value: ExprId,
    ) -> StmtId {
        let token = self.token("=");
        let targets = targets
            .into_iter()
            .map(|(ty, name)| (ty, self.token(name)))
            .collect();
        self.push_stmt(Stmt::DestructureDecl {
            targets,
            value,
            token,
        })
    }

    pub fn return_stmt(&mut self, value: Option<ExprId>) -> StmtId {
        let token = self.token("return");
        self.push_stmt(Stmt::Return { value, token })
    }

    pub fn struct_decl(&mut self, name: &str, members: Vec<(TypeExpr, &str)>) -> StmtId {
        let name = self.token(name);
        let members = members
            .into_iter()
            .map(|(ty, member)| (ty, self.token(member)))
            .collect();
        self.push_stmt(Stmt::StructDecl { name, members })
    }

    pub fn namespace(&mut self, name: &str, body: Vec<StmtId>) -> StmtId {
        let name = self.token(name);
        self.push_stmt(Stmt::Namespace { name, body })
    }
}
