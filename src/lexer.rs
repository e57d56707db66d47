use core::fmt;

pub use logos::Span;
use logos::{Lexer, Logos};

fn read_integer(lexer: &mut Lexer<Token>) -> Result<i64, LexerError> {
    lexer
        .slice()
        .parse()
        .map_err(|_| LexerError::IntegerTooBig(Box::from(lexer.slice())))
}

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("integer literal too big: {0}")]
    IntegerTooBig(Box<str>),
}

/// Tokens of Squawk source. Whitespace (newlines included) and `#` comments are skipped.
#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("fn")]
    Fn,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("let")]
    Let,
    #[token("in")]
    In,

    #[token("Int")]
    IntType,
    #[token("Bool")]
    BoolType,

    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),
    // unsigned, a leading `-` belongs to the parser
    #[regex("[0-9]+", read_integer)]
    Integer(i64),
    #[regex("[A-Za-z_][A-Za-z0-9_]*", |l| Box::from(l.slice()))]
    Identifier(Box<str>),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Assign,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("->")]
    Arrow,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
}

impl Token {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Fn => write!(f, "`fn`"),
            Token::If => write!(f, "`if`"),
            Token::Then => write!(f, "`then`"),
            Token::Else => write!(f, "`else`"),
            Token::Let => write!(f, "`let`"),
            Token::In => write!(f, "`in`"),
            Token::IntType => write!(f, "`Int`"),
            Token::BoolType => write!(f, "`Bool`"),
            Token::Boolean(b) => write!(f, "`{b}`"),
            Token::Integer(i) => write!(f, "integer `{i}`"),
            Token::Identifier(id) => write!(f, "identifier `{id}`"),
            Token::Plus => write!(f, "`+`"),
            Token::Minus => write!(f, "`-`"),
            Token::Star => write!(f, "`*`"),
            Token::Slash => write!(f, "`/`"),
            Token::Assign => write!(f, "`=`"),
            Token::EqualEqual => write!(f, "`==`"),
            Token::NotEqual => write!(f, "`!=`"),
            Token::Less => write!(f, "`<`"),
            Token::Greater => write!(f, "`>`"),
            Token::LessEqual => write!(f, "`<=`"),
            Token::GreaterEqual => write!(f, "`>=`"),
            Token::Arrow => write!(f, "`->`"),
            Token::LParen => write!(f, "`(`"),
            Token::RParen => write!(f, "`)`"),
            Token::Comma => write!(f, "`,`"),
            Token::Colon => write!(f, "`:`"),
        }
    }
}
