//! The state transformer: lowers pure expressions into an ordered list of
//! state-mutating instructions.
//!
//! Lowering is destination driven. The caller picks the temporary an expression must
//! leave its value in, and each node writes exactly that temporary last. Operands get
//! fresh temporaries of their own, allocated right before they are lowered, which is
//! what fixes the numbering of the emitted trace.
use std::collections::HashSet;

use log::{debug, warn};

use crate::{
    ast::{Expr, ExprKind, FunctionDef, Program},
    lexer::Span,
};

use super::{
    environment::{Environment, Signatures, Storage},
    ir::{ImpFunction, ImpProgram, Instruction, LabelKind, Operand, Temp},
    names::NameGen,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LowerError {
    #[error("unresolved name `{name}`")]
    UnresolvedName { name: Box<str>, span: Option<Span> },
    #[error("call to unknown function `{name}`")]
    UnknownFunction { name: Box<str>, span: Option<Span> },
    #[error("`{name}` takes {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        name: Box<str>,
        expected: usize,
        found: usize,
        span: Option<Span>,
    },
    #[error("function `{name}` is defined more than once")]
    DuplicateFunction { name: Box<str>, span: Option<Span> },
}

impl LowerError {
    /// The offending variable or function name
    pub fn name(&self) -> &str {
        match self {
            LowerError::UnresolvedName { name, .. }
            | LowerError::UnknownFunction { name, .. }
            | LowerError::ArityMismatch { name, .. }
            | LowerError::DuplicateFunction { name, .. } => name,
        }
    }

    pub fn span(&self) -> Option<&Span> {
        match self {
            LowerError::UnresolvedName { span, .. }
            | LowerError::UnknownFunction { span, .. }
            | LowerError::ArityMismatch { span, .. }
            | LowerError::DuplicateFunction { span, .. } => span.as_ref(),
        }
    }
}

/// The instructions computing an expression, and the temporary holding its value
/// once they have run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lowered {
    pub instructions: Vec<Instruction>,
    pub result: Temp,
}

/// Lowers the functions of one program. Holds nothing but the call signatures, so it
/// can be shared freely; all per-function state is passed explicitly.
#[derive(Debug, Clone, Copy)]
pub struct StateTransformer<'p> {
    signatures: &'p Signatures,
}

impl<'p> StateTransformer<'p> {
    pub fn new(signatures: &'p Signatures) -> Self {
        Self { signatures }
    }

    /// Lowers `expr` under `env` into a fresh result temporary taken from `names`.
    pub fn lower_expr(
        &self,
        expr: &Expr,
        env: &Environment,
        names: &mut NameGen,
    ) -> Result<Lowered, LowerError> {
        let result = names.temp();
        let mut instructions = vec![];
        self.lower_into(expr, result, env, names, &mut instructions)?;
        Ok(Lowered {
            instructions,
            result,
        })
    }

    /// Lowers a whole function with its own name generator; parameters are bound to
    /// themselves and the body's result is returned by a trailing `ret`.
    pub fn lower_function(&self, function: &FunctionDef) -> Result<ImpFunction, LowerError> {
        let env = Environment::for_function(function);
        let mut names = NameGen::new();
        let Lowered {
            mut instructions,
            result,
        } = self.lower_expr(&function.body, &env, &mut names)?;
        instructions.push(Instruction::Return(result.into()));

        debug!(
            "lowered `{}`: {} instructions, {} temporaries, {} labels",
            function.name,
            instructions.len(),
            names.temps_issued(),
            names.labels_issued()
        );

        Ok(ImpFunction {
            name: function.name.clone(),
            params: function.params.iter().map(|p| p.name.clone()).collect(),
            instructions,
        })
    }

    fn lower_into(
        &self,
        expr: &Expr,
        dest: Temp,
        env: &Environment,
        names: &mut NameGen,
        out: &mut Vec<Instruction>,
    ) -> Result<(), LowerError> {
        match &expr.kind {
            ExprKind::IntLiteral(value) => out.push(Instruction::Move {
                dest,
                src: Operand::Int(*value),
            }),
            ExprKind::BoolLiteral(value) => out.push(Instruction::Move {
                dest,
                src: Operand::Bool(*value),
            }),
            ExprKind::Variable(name) => {
                let storage = env.get(name).ok_or_else(|| LowerError::UnresolvedName {
                    name: name.clone(),
                    span: expr.span.clone(),
                })?;
                out.push(Instruction::Move {
                    dest,
                    src: storage.operand(),
                });
            }
            ExprKind::Binary { op, left, right } => {
                let left_temp = names.temp();
                self.lower_into(left, left_temp, env, names, out)?;
                let right_temp = names.temp();
                self.lower_into(right, right_temp, env, names, out)?;
                out.push(Instruction::BinOp {
                    kind: (*op).into(),
                    dest,
                    left: left_temp.into(),
                    right: right_temp.into(),
                });
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = names.temp();
                self.lower_into(condition, cond, env, names, out)?;

                let then_label = names.label(LabelKind::Then);
                let else_label = names.label(LabelKind::Else);
                let end_label = names.label(LabelKind::EndIf);

                out.push(Instruction::JumpIf {
                    cond: cond.into(),
                    target: then_label,
                });
                out.push(Instruction::Jump(else_label));

                // both branches write `dest`, only one of them runs
                out.push(Instruction::Label(then_label));
                self.lower_into(then_branch, dest, env, names, out)?;
                out.push(Instruction::Jump(end_label));

                out.push(Instruction::Label(else_label));
                self.lower_into(else_branch, dest, env, names, out)?;
                out.push(Instruction::Label(end_label));
            }
            ExprKind::Call { function, args } => {
                self.signatures
                    .check_call(function, args.len(), expr.span.as_ref())?;

                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    let temp = names.temp();
                    self.lower_into(arg, temp, env, names, out)?;
                    operands.push(temp.into());
                }
                out.push(Instruction::Call {
                    dest,
                    function: function.clone(),
                    args: operands,
                });
            }
            ExprKind::Let { name, value, body } => {
                let bound = names.temp();
                self.lower_into(value, bound, env, names, out)?;
                let scope = env.extend(name, Storage::Local(bound));
                self.lower_into(body, dest, &scope, names, out)?;
            }
        }
        Ok(())
    }
}

/// Result of lowering a whole program.
///
/// Lowering is all-or-nothing per function but not per program: a function that fails
/// contributes its error and no instructions, the others are still lowered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoweredProgram {
    pub program: ImpProgram,
    pub errors: Vec<LowerError>,
}

impl LoweredProgram {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fails the whole program if any function failed
    pub fn into_result(self) -> Result<ImpProgram, Vec<LowerError>> {
        if self.errors.is_empty() {
            Ok(self.program)
        } else {
            Err(self.errors)
        }
    }
}

pub fn lower_program(program: &Program) -> LoweredProgram {
    let signatures = Signatures::from_program(program);
    let transformer = StateTransformer::new(&signatures);
    let mut seen = HashSet::new();
    let mut lowered = LoweredProgram::default();

    for function in &program.functions {
        let result = if seen.insert(function.name.as_ref()) {
            transformer.lower_function(function)
        } else {
            Err(LowerError::DuplicateFunction {
                name: function.name.clone(),
                span: function.span.clone(),
            })
        };

        match result {
            Ok(imp) => lowered.program.functions.push(imp),
            Err(err) => {
                warn!("failed to lower `{}`: {err}", function.name);
                lowered.errors.push(err);
            }
        }
    }

    lowered
}
