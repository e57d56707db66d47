//! Source text in, listings out: parse, lower, emit.
use log::debug;

use crate::{
    ast::Program,
    codegen::{emit_program, EmitOptions},
    compiler::{ir::ImpProgram, lower_program, LowerError, LoweredProgram},
    lexer::Span,
    parser::{parse_program, ParseError},
    runtime::Machine,
};

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{} function(s) failed to lower", .0.len())]
    Lower(Vec<LowerError>),
}

/// A message with the source range it is about, if known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Option<Span>,
}

impl From<&LowerError> for Diagnostic {
    fn from(error: &LowerError) -> Self {
        Self {
            message: error.to_string(),
            span: error.span().cloned(),
        }
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(error: &ParseError) -> Self {
        Self {
            message: error.to_string(),
            span: Some(error.span()),
        }
    }
}

impl CompileError {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CompileError::Parse(error) => vec![error.into()],
            CompileError::Lower(errors) => errors.iter().map(Diagnostic::from).collect(),
        }
    }
}

/// A parsed and lowered program. Functions that failed to lower are missing from
/// [`Compilation::program`] and reported in [`Compilation::errors`].
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub ast: Program,
    pub lowered: LoweredProgram,
}

impl Compilation {
    pub fn program(&self) -> &ImpProgram {
        &self.lowered.program
    }

    pub fn errors(&self) -> &[LowerError] {
        &self.lowered.errors
    }

    pub fn render(&self, options: &EmitOptions) -> String {
        emit_program(self.program(), options)
    }

    /// A machine over the functions that lowered successfully
    pub fn machine(&self) -> Machine<'_> {
        Machine::new(self.program())
    }

    pub fn into_result(self) -> Result<ImpProgram, CompileError> {
        self.lowered.into_result().map_err(CompileError::Lower)
    }
}

/// Parses and lowers `source`. Only a parse error fails outright; lowering errors are
/// kept beside the functions that did lower.
pub fn compile(source: &str) -> Result<Compilation, CompileError> {
    let ast = parse_program(source)?;
    debug!("parsed {} function(s)", ast.functions.len());
    let lowered = lower_program(&ast);
    Ok(Compilation { ast, lowered })
}

/// Like [`compile`], but any failing function fails the whole program.
pub fn compile_strict(source: &str) -> Result<ImpProgram, CompileError> {
    compile(source)?.into_result()
}
