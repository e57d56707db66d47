//! Recursive descent over the token stream, producing the [`crate::ast`] tree.
//!
//! Every binary level is left associative; `*`/`/` bind tighter than `+`/`-`, which bind
//! tighter than the comparisons.
use crate::{
    ast::{BinaryOp, Expr, ExprKind, FunctionDef, Parameter, Program, Type},
    lexer::{LexerError, Span, Token},
};

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum ParseError {
    #[error("{error}")]
    Lexer { error: LexerError, span: Span },
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: Token,
        span: Span,
    },
    #[error("expected {expected}, found end of input")]
    UnexpectedEof { expected: &'static str, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lexer { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. } => span.clone(),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

pub fn parse_program(source: &str) -> ParseResult<Program> {
    Parser::new(source)?.program()
}

/// Parses a lone expression, which must span the whole input.
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    parser.finish("end of input")?;
    Ok(expr)
}

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    eof: Span,
}

impl Parser {
    /// Lexes the whole source up front; the first lexer error aborts.
    pub fn new(source: &str) -> ParseResult<Self> {
        let tokens = Token::lexer(source)
            .spanned()
            .map(|(token, span)| {
                token
                    .map(|t| (t, span.clone()))
                    .map_err(|error| ParseError::Lexer { error, span })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tokens,
            pos: 0,
            eof: source.len()..source.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((found, span)) => ParseError::UnexpectedToken {
                expected,
                found: found.clone(),
                span: span.clone(),
            },
            None => ParseError::UnexpectedEof {
                expected,
                span: self.eof.clone(),
            },
        }
    }

    fn eat(&mut self, token: &Token) -> Option<Span> {
        if self.peek() == Some(token) {
            self.bump().map(|(_, span)| span)
        } else {
            None
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> ParseResult<Span> {
        self.eat(token).ok_or_else(|| self.unexpected(expected))
    }

    fn expect_identifier(&mut self, expected: &'static str) -> ParseResult<(Box<str>, Span)> {
        match self.tokens.get(self.pos).cloned() {
            Some((Token::Identifier(name), span)) => {
                self.pos += 1;
                Ok((name, span))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn finish(&self, expected: &'static str) -> ParseResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected(expected)),
        }
    }

    pub fn program(&mut self) -> ParseResult<Program> {
        let mut functions = vec![];
        while self.peek().is_some() {
            functions.push(self.function()?);
        }
        Ok(Program { functions })
    }

    fn function(&mut self) -> ParseResult<FunctionDef> {
        self.expect(&Token::Fn, "`fn`")?;
        let (name, span) = self.expect_identifier("a function name")?;
        self.expect(&Token::LParen, "`(`")?;

        let mut params = vec![];
        if self.eat(&Token::RParen).is_none() {
            loop {
                params.push(self.parameter()?);
                if self.eat(&Token::Comma).is_none() {
                    break;
                }
            }
            self.expect(&Token::RParen, "`,` or `)`")?;
        }

        self.expect(&Token::Arrow, "`->`")?;
        let return_type = self.ty()?;
        self.expect(&Token::Assign, "`=`")?;
        let body = self.expression()?;

        Ok(FunctionDef {
            name,
            params,
            return_type,
            body,
            span: Some(span),
        })
    }

    fn parameter(&mut self) -> ParseResult<Parameter> {
        let (name, span) = self.expect_identifier("a parameter name")?;
        self.expect(&Token::Colon, "`:`")?;
        let ty = self.ty()?;
        Ok(Parameter {
            name,
            ty,
            span: Some(span),
        })
    }

    fn ty(&mut self) -> ParseResult<Type> {
        if self.eat(&Token::IntType).is_some() {
            Ok(Type::Int)
        } else if self.eat(&Token::BoolType).is_some() {
            Ok(Type::Bool)
        } else {
            Err(self.unexpected("a type"))
        }
    }

    pub fn expression(&mut self) -> ParseResult<Expr> {
        self.comparison()
    }

    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<Expr>,
        operator: fn(&Token) -> Option<BinaryOp>,
    ) -> ParseResult<Expr> {
        let mut left = operand(self)?;
        while let Some(op) = self.peek().and_then(operator) {
            self.pos += 1;
            let right = operand(self)?;
            let span = join(&left, &right);
            left = Expr::binary(op, left, right).at(span);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::additive, |token| match token {
            Token::EqualEqual => Some(BinaryOp::Equal),
            Token::NotEqual => Some(BinaryOp::NotEqual),
            Token::Less => Some(BinaryOp::LessThan),
            Token::Greater => Some(BinaryOp::GreaterThan),
            Token::LessEqual => Some(BinaryOp::LessEqual),
            Token::GreaterEqual => Some(BinaryOp::GreaterEqual),
            _ => None,
        })
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::multiplicative, |token| match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::primary, |token| match token {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            _ => None,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let Some((token, span)) = self.tokens.get(self.pos).cloned() else {
            return Err(self.unexpected("an expression"));
        };

        match token {
            Token::Integer(value) => {
                self.pos += 1;
                Ok(Expr::int(value).at(span))
            }
            Token::Boolean(value) => {
                self.pos += 1;
                Ok(Expr::bool(value).at(span))
            }
            // negative literal, the only place a leading `-` is allowed
            Token::Minus => match self.tokens.get(self.pos + 1).cloned() {
                Some((Token::Integer(value), end)) => {
                    self.pos += 2;
                    Ok(Expr::int(-value).at(span.start..end.end))
                }
                _ => Err(self.unexpected("an expression")),
            },
            Token::LParen => {
                self.pos += 1;
                let expr = self.expression()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(expr)
            }
            Token::If => self.if_expr(),
            Token::Let => self.let_expr(),
            Token::Identifier(name) => {
                self.pos += 1;
                if self.eat(&Token::LParen).is_none() {
                    return Ok(Expr::var(name).at(span));
                }
                let mut args = vec![];
                let end = match self.eat(&Token::RParen) {
                    Some(end) => end,
                    None => {
                        loop {
                            args.push(self.expression()?);
                            if self.eat(&Token::Comma).is_none() {
                                break;
                            }
                        }
                        self.expect(&Token::RParen, "`,` or `)`")?
                    }
                };
                Ok(Expr::call(name, args).at(span.start..end.end))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn if_expr(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&Token::If, "`if`")?;
        let condition = self.expression()?;
        self.expect(&Token::Then, "`then`")?;
        let then_branch = self.expression()?;
        self.expect(&Token::Else, "`else`")?;
        let else_branch = self.expression()?;
        let end = span_of(&else_branch).end;
        Ok(Expr::if_else(condition, then_branch, else_branch).at(start.start..end))
    }

    fn let_expr(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&Token::Let, "`let`")?;
        let (name, _) = self.expect_identifier("a binding name")?;
        self.expect(&Token::Assign, "`=`")?;
        let value = self.expression()?;
        self.expect(&Token::In, "`in`")?;
        let body = self.expression()?;
        let end = span_of(&body).end;
        Ok(Expr {
            kind: ExprKind::Let {
                name,
                value: Box::new(value),
                body: Box::new(body),
            },
            span: Some(start.start..end),
        })
    }
}

fn span_of(expr: &Expr) -> Span {
    expr.span.clone().unwrap_or_default()
}

fn join(left: &Expr, right: &Expr) -> Span {
    span_of(left).start..span_of(right).end
}
