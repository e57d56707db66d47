pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod runtime;

pub use ast::{BinaryOp, Expr, ExprKind, FunctionDef, Parameter, Program, Type};
pub use codegen::{emit_function, emit_program, EmitOptions};
pub use compiler::{
    ir::{ImpFunction, ImpProgram, Instruction},
    lower_program, LowerError, LoweredProgram,
};
pub use parser::{parse_expression, parse_program, ParseError};
pub use pipeline::{compile, compile_strict, CompileError, Compilation, Diagnostic};
pub use runtime::{Fuel, Machine, RuntimeError, Value};
