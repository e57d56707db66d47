//! The flat three-address instruction set produced by the state transformer.
//!
//! Instructions are plain records. `Display` gives the bare text of one instruction
//! (no indentation), which [`crate::codegen`] lays out into listings.
use core::fmt;

use crate::ast::BinaryOp;

/// A compiler generated storage slot, rendered `t<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temp(pub u32);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Then,
    Else,
    EndIf,
}

impl LabelKind {
    pub fn prefix(self) -> &'static str {
        match self {
            LabelKind::Then => "then",
            LabelKind::Else => "else",
            LabelKind::EndIf => "end_if",
        }
    }
}

/// Jump target. The index comes from a counter shared by every kind, so
/// `then0`/`else0` can never both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    pub kind: LabelKind,
    pub index: u32,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Int(i64),
    /// rendered as `1`/`0`
    Bool(bool),
    Temp(Temp),
    /// a parameter, addressed by name
    Var(Box<str>),
}

impl Operand {
    pub fn as_temp(&self) -> Option<Temp> {
        match self {
            Operand::Temp(temp) => Some(*temp),
            _ => None,
        }
    }
}

impl From<Temp> for Operand {
    fn from(temp: Temp) -> Self {
        Operand::Temp(temp)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(value) => write!(f, "{value}"),
            Operand::Bool(value) => write!(f, "{}", u8::from(*value)),
            Operand::Temp(temp) => write!(f, "{temp}"),
            Operand::Var(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
}

impl BinOpKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOpKind::Add => "add",
            BinOpKind::Sub => "sub",
            BinOpKind::Mul => "mul",
            BinOpKind::Div => "div",
            BinOpKind::Eq => "eq",
            BinOpKind::Neq => "neq",
            BinOpKind::Lt => "lt",
            BinOpKind::Gt => "gt",
            BinOpKind::Leq => "leq",
            BinOpKind::Geq => "geq",
        }
    }
}

impl From<BinaryOp> for BinOpKind {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => BinOpKind::Add,
            BinaryOp::Subtract => BinOpKind::Sub,
            BinaryOp::Multiply => BinOpKind::Mul,
            BinaryOp::Divide => BinOpKind::Div,
            BinaryOp::Equal => BinOpKind::Eq,
            BinaryOp::NotEqual => BinOpKind::Neq,
            BinaryOp::LessThan => BinOpKind::Lt,
            BinaryOp::GreaterThan => BinOpKind::Gt,
            BinaryOp::LessEqual => BinOpKind::Leq,
            BinaryOp::GreaterEqual => BinOpKind::Geq,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Move {
        dest: Temp,
        src: Operand,
    },
    BinOp {
        kind: BinOpKind,
        dest: Temp,
        left: Operand,
        right: Operand,
    },
    Label(Label),
    Jump(Label),
    JumpIf {
        cond: Operand,
        target: Label,
    },
    Call {
        dest: Temp,
        function: Box<str>,
        args: Vec<Operand>,
    },
    Return(Operand),
}

impl Instruction {
    /// The temporary this instruction writes, if any
    pub fn dest(&self) -> Option<Temp> {
        match self {
            Instruction::Move { dest, .. }
            | Instruction::BinOp { dest, .. }
            | Instruction::Call { dest, .. } => Some(*dest),
            Instruction::Label(_)
            | Instruction::Jump(_)
            | Instruction::JumpIf { .. }
            | Instruction::Return(_) => None,
        }
    }

    /// Operands read by this instruction, in evaluation order
    pub fn sources(&self) -> Vec<&Operand> {
        match self {
            Instruction::Move { src, .. } => vec![src],
            Instruction::BinOp { left, right, .. } => vec![left, right],
            Instruction::JumpIf { cond, .. } => vec![cond],
            Instruction::Call { args, .. } => args.iter().collect(),
            Instruction::Return(value) => vec![value],
            Instruction::Label(_) | Instruction::Jump(_) => vec![],
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Move { .. } => "mov",
            Instruction::BinOp { kind, .. } => kind.mnemonic(),
            Instruction::Label(_) => "label",
            Instruction::Jump(_) => "jmp",
            Instruction::JumpIf { .. } => "jmpif",
            Instruction::Call { .. } => "call",
            Instruction::Return(_) => "ret",
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Instruction::Label(_))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Move { dest, src } => write!(f, "mov {dest}, {src}"),
            Instruction::BinOp {
                kind,
                dest,
                left,
                right,
            } => write!(f, "{} {dest}, {left}, {right}", kind.mnemonic()),
            Instruction::Label(label) => write!(f, "{label}:"),
            Instruction::Jump(target) => write!(f, "jmp {target}"),
            Instruction::JumpIf { cond, target } => write!(f, "jmpif {cond}, {target}"),
            Instruction::Call {
                dest,
                function,
                args,
            } => {
                write!(f, "call {dest} = {function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instruction::Return(value) => write!(f, "ret {value}"),
        }
    }
}

/// One lowered function: its parameter names and ordered instruction list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpFunction {
    pub name: Box<str>,
    pub params: Vec<Box<str>>,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImpProgram {
    pub functions: Vec<ImpFunction>,
}

impl ImpProgram {
    pub fn function(&self, name: &str) -> Option<&ImpFunction> {
        self.functions.iter().find(|f| f.name.as_ref() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::{BinOpKind, Instruction, Label, LabelKind, Operand, Temp};
    use crate::ast::BinaryOp;
    use assert2::check;

    #[test]
    fn instruction_text() {
        let end = Label {
            kind: LabelKind::EndIf,
            index: 2,
        };
        let mov = |dest, src| Instruction::Move { dest: Temp(dest), src }.to_string();
        check!(mov(0, Operand::Var("n".into())) == "mov t0, n");
        check!(mov(3, Operand::Bool(true)) == "mov t3, 1");
        check!(mov(3, Operand::Int(-7)) == "mov t3, -7");
        let leq = Instruction::BinOp {
            kind: BinOpKind::Leq,
            dest: Temp(1),
            left: Temp(2).into(),
            right: Temp(3).into(),
        };
        check!(leq.to_string() == "leq t1, t2, t3");
        check!(Instruction::Label(end).to_string() == "end_if2:");
        check!(Instruction::Jump(end).to_string() == "jmp end_if2");
        let then = Label {
            kind: LabelKind::Then,
            index: 0,
        };
        check!(
            Instruction::JumpIf { cond: Temp(1).into(), target: then }.to_string()
                == "jmpif t1, then0"
        );
        let call = |dest, function: &str, args: &[u32]| {
            Instruction::Call {
                dest: Temp(dest),
                function: function.into(),
                args: args.iter().map(|&t| Temp(t).into()).collect(),
            }
            .to_string()
        };
        check!(call(5, "f", &[6, 7]) == "call t5 = f(t6, t7)");
        check!(call(0, "zero", &[]) == "call t0 = zero()");
        check!(Instruction::Return(Temp(0).into()).to_string() == "ret t0");
    }

    #[test]
    fn operator_mnemonics() {
        let pairs = [
            (BinaryOp::Add, "add"),
            (BinaryOp::Subtract, "sub"),
            (BinaryOp::Multiply, "mul"),
            (BinaryOp::Divide, "div"),
            (BinaryOp::Equal, "eq"),
            (BinaryOp::NotEqual, "neq"),
            (BinaryOp::LessThan, "lt"),
            (BinaryOp::GreaterThan, "gt"),
            (BinaryOp::LessEqual, "leq"),
            (BinaryOp::GreaterEqual, "geq"),
        ];
        for (op, mnemonic) in pairs {
            check!(BinOpKind::from(op).mnemonic() == mnemonic);
        }
    }

    #[test]
    fn dest_and_sources() {
        let call = Instruction::Call {
            dest: Temp(5),
            function: "f".into(),
            args: vec![Temp(6).into(), Operand::Int(1)],
        };
        check!(call.dest() == Some(Temp(5)));
        check!(call.sources() == [&Operand::Temp(Temp(6)), &Operand::Int(1)]);
        check!(Instruction::Return(Temp(0).into()).dest() == None);
        check!(Instruction::Jump(Label { kind: LabelKind::Else, index: 1 }).sources().is_empty());
    }
}
