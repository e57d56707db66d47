//! The typed tree handed from the parser to the compiler.
//!
//! Nodes are never mutated once built. Spans are optional so that trees can also be
//! assembled by hand (tests, other front ends); structural equality ignores them.
use core::fmt;

use arbitrary::Arbitrary;

use crate::lexer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Declared types. Only checked for spelling, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum Type {
    Int,
    Bool,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral(i64),
    BoolLiteral(bool),
    Variable(Box<str>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        function: Box<str>,
        args: Vec<Expr>,
    },
    Let {
        name: Box<str>,
        value: Box<Expr>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Option<Span>,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Self { kind, span: None }
    }
}

impl Expr {
    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn int(value: i64) -> Self {
        ExprKind::IntLiteral(value).into()
    }

    pub fn bool(value: bool) -> Self {
        ExprKind::BoolLiteral(value).into()
    }

    pub fn var(name: impl AsRef<str>) -> Self {
        ExprKind::Variable(Box::from(name.as_ref())).into()
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
        .into()
    }

    pub fn if_else(condition: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        ExprKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
        .into()
    }

    pub fn call(function: impl AsRef<str>, args: impl IntoIterator<Item = Expr>) -> Self {
        ExprKind::Call {
            function: Box::from(function.as_ref()),
            args: args.into_iter().collect(),
        }
        .into()
    }

    pub fn let_in(name: impl AsRef<str>, value: Expr, body: Expr) -> Self {
        ExprKind::Let {
            name: Box::from(name.as_ref()),
            value: Box::new(value),
            body: Box::new(body),
        }
        .into()
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: Box<str>,
    pub ty: Type,
    pub span: Option<Span>,
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty
    }
}

impl Parameter {
    pub fn new(name: impl AsRef<str>, ty: Type) -> Self {
        Self {
            name: Box::from(name.as_ref()),
            ty,
            span: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Box<str>,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub body: Expr,
    /// Span of the function name
    pub span: Option<Span>,
}

impl PartialEq for FunctionDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.params == other.params
            && self.return_type == other.return_type
            && self.body == other.body
    }
}

impl FunctionDef {
    pub fn new(
        name: impl AsRef<str>,
        params: impl IntoIterator<Item = Parameter>,
        return_type: Type,
        body: Expr,
    ) -> Self {
        Self {
            name: Box::from(name.as_ref()),
            params: params.into_iter().collect(),
            return_type,
            body,
            span: None,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: Vec<FunctionDef>,
}

impl Program {
    pub fn new(functions: impl IntoIterator<Item = FunctionDef>) -> Self {
        Self {
            functions: functions.into_iter().collect(),
        }
    }

    /// First definition with the given name
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name.as_ref() == name)
    }
}
