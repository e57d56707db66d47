//! Text listings of lowered code.
//!
//! Rendering is mechanical: one line per instruction, in order. Labels sit at the left
//! margin, everything else is indented by four spaces.
use core::fmt;

use crate::compiler::ir::{ImpFunction, ImpProgram, Instruction};

pub const BANNER: [&str; 2] = ["; Squawk Compiler Output", "; Generated from functional code"];

const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitOptions {
    /// Start program listings with the [`BANNER`] comment lines
    pub banner: bool,
}

impl EmitOptions {
    pub fn with_banner() -> Self {
        Self { banner: true }
    }
}

/// Displays one function as a listing
#[derive(Debug, Clone, Copy)]
pub struct FunctionListing<'a>(pub &'a ImpFunction);

impl fmt::Display for FunctionListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = self.0;
        writeln!(f, "function {}({}):", function.name, function.params.join(", "))?;
        for instruction in &function.instructions {
            write_instruction(f, instruction)?;
        }
        Ok(())
    }
}

/// Displays a whole program, functions separated by blank lines
#[derive(Debug, Clone, Copy)]
pub struct ProgramListing<'a> {
    pub program: &'a ImpProgram,
    pub options: EmitOptions,
}

impl fmt::Display for ProgramListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.options.banner {
            for line in BANNER {
                writeln!(f, "{line}")?;
            }
        }
        for (i, function) in self.program.functions.iter().enumerate() {
            if self.options.banner || i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", FunctionListing(function))?;
        }
        Ok(())
    }
}

fn write_instruction(f: &mut fmt::Formatter<'_>, instruction: &Instruction) -> fmt::Result {
    if instruction.is_label() {
        writeln!(f, "{instruction}")
    } else {
        writeln!(f, "{INDENT}{instruction}")
    }
}

pub fn emit_function(function: &ImpFunction) -> String {
    FunctionListing(function).to_string()
}

pub fn emit_program(program: &ImpProgram, options: &EmitOptions) -> String {
    ProgramListing {
        program,
        options: *options,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::{emit_function, emit_program, EmitOptions};
    use crate::compiler::ir::{
        BinOpKind, ImpFunction, ImpProgram, Instruction, Label, LabelKind, Operand, Temp,
    };
    use assert2::check;

    fn factorial() -> ImpFunction {
        let then = Label { kind: LabelKind::Then, index: 0 };
        let otherwise = Label { kind: LabelKind::Else, index: 1 };
        let end = Label { kind: LabelKind::EndIf, index: 2 };
        let var = |name: &str| Operand::Var(name.into());
        let binop = |kind, dest, left: u32, right: u32| Instruction::BinOp {
            kind,
            dest: Temp(dest),
            left: Temp(left).into(),
            right: Temp(right).into(),
        };
        ImpFunction {
            name: "factorial".into(),
            params: vec!["n".into()],
            instructions: vec![
                Instruction::Move { dest: Temp(2), src: var("n") },
                Instruction::Move { dest: Temp(3), src: Operand::Int(1) },
                binop(BinOpKind::Leq, 1, 2, 3),
                Instruction::JumpIf { cond: Temp(1).into(), target: then },
                Instruction::Jump(otherwise),
                Instruction::Label(then),
                Instruction::Move { dest: Temp(0), src: Operand::Int(1) },
                Instruction::Jump(end),
                Instruction::Label(otherwise),
                Instruction::Move { dest: Temp(4), src: var("n") },
                Instruction::Move { dest: Temp(7), src: var("n") },
                Instruction::Move { dest: Temp(8), src: Operand::Int(1) },
                binop(BinOpKind::Sub, 6, 7, 8),
                Instruction::Call {
                    dest: Temp(5),
                    function: "factorial".into(),
                    args: vec![Temp(6).into()],
                },
                binop(BinOpKind::Mul, 0, 4, 5),
                Instruction::Label(end),
                Instruction::Return(Temp(0).into()),
            ],
        }
    }

    const FACTORIAL: &str = "\
function factorial(n):
    mov t2, n
    mov t3, 1
    leq t1, t2, t3
    jmpif t1, then0
    jmp else1
then0:
    mov t0, 1
    jmp end_if2
else1:
    mov t4, n
    mov t7, n
    mov t8, 1
    sub t6, t7, t8
    call t5 = factorial(t6)
    mul t0, t4, t5
end_if2:
    ret t0
";

    const YES: &str = "function yes():\n    mov t0, 1\n    ret t0\n";

    fn constant(name: &str, params: &[&str], value: bool) -> ImpFunction {
        ImpFunction {
            name: name.into(),
            params: params.iter().map(|&p| p.into()).collect(),
            instructions: vec![
                Instruction::Move { dest: Temp(0), src: Operand::Bool(value) },
                Instruction::Return(Temp(0).into()),
            ],
        }
    }

    #[test]
    fn factorial_listing() {
        check!(emit_function(&factorial()) == FACTORIAL);
    }

    #[test]
    fn header_lists_parameters() {
        check!(emit_function(&constant("yes", &[], true)) == YES);
        let listing = emit_function(&constant("no", &["a", "b"], false));
        check!(listing.starts_with("function no(a, b):\n    mov t0, 0\n"));
    }

    #[test]
    fn program_listing() {
        let program = ImpProgram {
            functions: vec![constant("yes", &[], true), constant("no", &["x"], false)],
        };
        let no = "function no(x):\n    mov t0, 0\n    ret t0\n";
        let banner = "; Squawk Compiler Output\n; Generated from functional code\n";
        check!(emit_program(&program, &EmitOptions::default()) == format!("{YES}\n{no}"));
        check!(
            emit_program(&program, &EmitOptions::with_banner())
                == format!("{banner}\n{YES}\n{no}")
        );
        check!(emit_program(&ImpProgram::default(), &EmitOptions::default()) == "");
    }
}
