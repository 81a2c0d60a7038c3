use super::{
    ast::{Ast, ExprId, StmtId, TokenId},
    types::TypeExpr,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// `:north`, stored without the leading colon
    Enum(String),
    /// `[a, b, c]`; map literals are containers of `Pair`s
    Container(Vec<ExprId>),
    /// `key: value`, only meaningful inside a container literal
    Pair(ExprId, ExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `~=`
    ApproxEq,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::ApproxEq => "~=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// Binary operator a compound assignment expands to.
    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormatPart {
    Text(String),
    Expr(ExprId),
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        token: TokenId,
    },
    Variable {
        name: TokenId,
    },
    Assignment {
        target: ExprId,
        op: AssignOp,
        value: ExprId,
        token: TokenId,
    },
    Binary {
        left: ExprId,
        op: BinaryOp,
        right: ExprId,
        token: TokenId,
    },
    Logical {
        left: ExprId,
        op: LogicalOp,
        right: ExprId,
        token: TokenId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
        token: TokenId,
    },
    Call {
        callee: TokenId,
        args: Vec<ExprId>,
    },
    /// One item is a parenthesised expression, more is a tuple literal
    Group {
        items: Vec<ExprId>,
        token: TokenId,
    },
    Index {
        target: ExprId,
        index: ExprId,
        token: TokenId,
    },
    /// `start..end`, end exclusive
    Range {
        start: ExprId,
        end: ExprId,
        token: TokenId,
    },
    /// `[value; count]`
    Replicate {
        value: ExprId,
        count: ExprId,
        token: TokenId,
    },
    StructLiteral {
        name: TokenId,
        fields: Vec<(TokenId, ExprId)>,
    },
    /// `(a, b) = tuple`
    Destructure {
        targets: Vec<ExprId>,
        value: ExprId,
        token: TokenId,
    },
    MemberGet {
        object: ExprId,
        member: TokenId,
    },
    MemberSet {
        object: ExprId,
        member: TokenId,
        value: ExprId,
    },
    Functor {
        params: Vec<(TypeExpr, TokenId)>,
        ret: Option<TypeExpr>,
        body: StmtId,
        token: TokenId,
    },
    Format {
        parts: Vec<FormatPart>,
        token: TokenId,
    },
    Cast {
        value: ExprId,
        target: TypeExpr,
        token: TokenId,
    },
}

impl Expr {
    pub fn token(&self) -> TokenId {
        match self {
            Expr::Literal { token, .. }
            | Expr::Assignment { token, .. }
            | Expr::Binary { token, .. }
            | Expr::Logical { token, .. }
            | Expr::Unary { token, .. }
            | Expr::Group { token, .. }
            | Expr::Index { token, .. }
            | Expr::Range { token, .. }
            | Expr::Replicate { token, .. }
            | Expr::Destructure { token, .. }
            | Expr::Functor { token, .. }
            | Expr::Format { token, .. }
            | Expr::Cast { token, .. } => *token,
            Expr::Variable { name } => *name,
            Expr::Call { callee, .. } => *callee,
            Expr::StructLiteral { name, .. } => *name,
            Expr::MemberGet { member, .. } | Expr::MemberSet { member, .. } => *member,
        }
    }
}

impl Ast {
    fn literal(&mut self, lexeme: &str, value: Literal) -> ExprId {
        let token = self.token(lexeme);
        self.push_expr(Expr::Literal { value, token })
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.literal(&value.to_string(), Literal::Int(value))
    }

    pub fn float(&mut self, value: f64) -> ExprId {
        self.literal(&value.to_string(), Literal::Float(value))
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.literal(&value.to_string(), Literal::Bool(value))
    }

    pub fn string(&mut self, value: &str) -> ExprId {
        self.literal(&format!("{:?}", value), Literal::Str(String::from(value)))
    }

    /// Enum literal; a leading `:` is accepted and dropped.
    pub fn enum_lit(&mut self, name: &str) -> ExprId {
        let name = name.trim_start_matches(':');
        self.literal(&format!(":{}", name), Literal::Enum(String::from(name)))
    }

    pub fn list(&mut self, items: Vec<ExprId>) -> ExprId {
        self.literal("[", Literal::Container(items))
    }

    pub fn pair(&mut self, key: ExprId, value: ExprId) -> ExprId {
        self.literal(":", Literal::Pair(key, value))
    }

    pub fn var(&mut self, name: &str) -> ExprId {
        let name = self.token(name);
        self.push_expr(Expr::Variable { name })
    }

    pub fn assign(&mut self, target: ExprId, value: ExprId) -> ExprId {
        self.compound_assign(target, AssignOp::Assign, value)
    }

    pub fn compound_assign(&mut self, target: ExprId, op: AssignOp, value: ExprId) -> ExprId {
        let lexeme = match op {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
        };
        let token = self.token(lexeme);
        self.push_expr(Expr::Assignment {
            target,
            op,
            value,
            token,
        })
    }

    pub fn binary(&mut self, left: ExprId, op: BinaryOp, right: ExprId) -> ExprId {
        let token = self.token(op.symbol());
        self.push_expr(Expr::Binary {
            left,
            op,
            right,
            token,
        })
    }

    pub fn logical(&mut self, left: ExprId, op: LogicalOp, right: ExprId) -> ExprId {
        let token = self.token(match op {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        });
        self.push_expr(Expr::Logical {
            left,
            op,
            right,
            token,
        })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        let token = self.token(match op {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        });
        self.push_expr(Expr::Unary { op, operand, token })
    }

    pub fn call(&mut self, callee: &str, args: Vec<ExprId>) -> ExprId {
        let callee = self.token(callee);
        self.push_expr(Expr::Call { callee, args })
    }

    pub fn group(&mut self, items: Vec<ExprId>) -> ExprId {
        let token = self.token("(");
        self.push_expr(Expr::Group { items, token })
    }

    pub fn index(&mut self, target: ExprId, index: ExprId) -> ExprId {
        let token = self.token("[");
        self.push_expr(Expr::Index {
            target,
            index,
            token,
        })
    }

    pub fn range(&mut self, start: ExprId, end: ExprId) -> ExprId {
        let token = self.token("..");
        self.push_expr(Expr::Range { start, end, token })
    }

    pub fn replicate(&mut self, value: ExprId, count: ExprId) -> ExprId {
        let token = self.token(";");
        self.push_expr(Expr::Replicate {
            value,
            count,
            token,
        })
    }

    pub fn struct_lit(&mut self, name: &str, fields: Vec<(&str, ExprId)>) -> ExprId {
        let name = self.token(name);
        let fields = fields
            .into_iter()
            .map(|(field, value)| (self.token(field), value))
            .collect();
        self.push_expr(Expr::StructLiteral { name, fields })
    }

    pub fn destructure(&mut self, targets: Vec<ExprId>, value: ExprId) -> ExprId {
        let token = self.token("=");
        self.push_expr(Expr::Destructure {
            targets,
            value,
            token,
        })
    }

    pub fn member(&mut self, object: ExprId, member: &str) -> ExprId {
        let member = self.token(member);
        self.push_expr(Expr::MemberGet { object, member })
    }

    pub fn member_set(&mut self, object: ExprId, member: &str, value: ExprId) -> ExprId {
        let member = self.token(member);
        self.push_expr(Expr::MemberSet {
            object,
            member,
            value,
        })
    }

    pub fn functor(
        &mut self,
        params: Vec<(TypeExpr, &str)>,
        ret: Option<TypeExpr>,
        body: StmtId,
    ) -> ExprId {
        let token = self.token("fn");
        let params = params
            .into_iter()
            .map(|(ty, name)| (ty, self.token(name)))
            .collect();
        self.push_expr(Expr::Functor {
            params,
            ret,
            body,
            token,
        })
    }

    pub fn format(&mut self, parts: Vec<FormatPart>) -> ExprId {
        let token = self.token("f\"");
        self.push_expr(Expr::Format { parts, token })
    }

    pub fn cast(&mut self, value: ExprId, target: TypeExpr) -> ExprId {
        let token = self.token("as");
        self.push_expr(Expr::Cast {
            value,
            target,
            token,
        })
    }
}
