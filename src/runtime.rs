//! A machine for lowered programs, used to observe what the instructions compute.
//!
//! Values are plain `i64`s: booleans are `0`/`1` and `jmpif` jumps on anything non-zero.
//! Call frames live on an explicit stack, so deep recursion in a program never
//! recurses in Rust; it stops at [`Machine::max_depth`] instead.
use std::collections::HashMap;

use log::trace;

use crate::compiler::ir::{BinOpKind, ImpFunction, ImpProgram, Instruction, Label, Operand, Temp};

pub mod fuel;

pub use fuel::Fuel;

pub type Value = i64;

pub const DEFAULT_MAX_DEPTH: usize = 10_000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no function named `{name}`")]
    UnknownFunction { name: Box<str> },
    #[error("`{name}` takes {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        name: Box<str>,
        expected: usize,
        found: usize,
    },
    #[error("`{storage}` read before it was written in `{function}`")]
    UnboundStorage { function: Box<str>, storage: Box<str> },
    #[error("jump to undefined label `{label}` in `{function}`")]
    UnknownLabel { function: Box<str>, label: Label },
    #[error("division by zero in `{function}`")]
    DivisionByZero { function: Box<str> },
    #[error("integer overflow in `{function}`")]
    Overflow { function: Box<str> },
    #[error("`{function}` ran past its last instruction without returning")]
    MissingReturn { function: Box<str> },
    #[error("out of fuel")]
    OutOfFuel,
    #[error("call depth exceeded {limit}")]
    CallDepthExceeded { limit: usize },
}

/// One function prepared for execution: its code and where each label points.
#[derive(Debug)]
struct Code<'p> {
    function: &'p ImpFunction,
    labels: HashMap<Label, usize>,
}

impl<'p> Code<'p> {
    fn new(function: &'p ImpFunction) -> Self {
        let labels = function
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(pc, instruction)| match instruction {
                Instruction::Label(label) => Some((*label, pc)),
                _ => None,
            })
            .collect();
        Self { function, labels }
    }

    fn target(&self, label: &Label) -> Result<usize, RuntimeError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownLabel {
                function: self.function.name.clone(),
                label: *label,
            })
    }
}

#[derive(Debug)]
struct Frame<'m, 'p> {
    code: &'m Code<'p>,
    pc: usize,
    vars: HashMap<&'p str, Value>,
    temps: HashMap<Temp, Value>,
    /// Where the caller wants the result; `None` for the outermost call
    return_to: Option<Temp>,
}

impl<'m, 'p> Frame<'m, 'p> {
    fn enter(
        code: &'m Code<'p>,
        args: &[Value],
        return_to: Option<Temp>,
    ) -> Result<Self, RuntimeError> {
        let function: &'p ImpFunction = code.function;
        let params = &function.params;
        if params.len() != args.len() {
            return Err(RuntimeError::ArityMismatch {
                name: function.name.clone(),
                expected: params.len(),
                found: args.len(),
            });
        }
        Ok(Self {
            code,
            pc: 0,
            vars: params.iter().map(|param| &**param).zip(args.iter().copied()).collect(),
            temps: HashMap::new(),
            return_to,
        })
    }

    fn name(&self) -> &'p str {
        let function: &'p ImpFunction = self.code.function;
        &function.name
    }

    fn read(&self, operand: &Operand) -> Result<Value, RuntimeError> {
        let value = match operand {
            Operand::Int(value) => Some(*value),
            Operand::Bool(value) => Some(Value::from(*value)),
            Operand::Temp(temp) => self.temps.get(temp).copied(),
            Operand::Var(name) => self.vars.get(&**name).copied(),
        };
        value.ok_or_else(|| RuntimeError::UnboundStorage {
            function: Box::from(self.name()),
            storage: operand.to_string().into_boxed_str(),
        })
    }

    fn binop(&self, kind: BinOpKind, left: Value, right: Value) -> Result<Value, RuntimeError> {
        let overflow = || RuntimeError::Overflow {
            function: Box::from(self.name()),
        };
        match kind {
            BinOpKind::Add => left.checked_add(right).ok_or_else(overflow),
            BinOpKind::Sub => left.checked_sub(right).ok_or_else(overflow),
            BinOpKind::Mul => left.checked_mul(right).ok_or_else(overflow),
            BinOpKind::Div if right == 0 => Err(RuntimeError::DivisionByZero {
                function: Box::from(self.name()),
            }),
            BinOpKind::Div => left.checked_div(right).ok_or_else(overflow),
            BinOpKind::Eq => Ok(Value::from(left == right)),
            BinOpKind::Neq => Ok(Value::from(left != right)),
            BinOpKind::Lt => Ok(Value::from(left < right)),
            BinOpKind::Gt => Ok(Value::from(left > right)),
            BinOpKind::Leq => Ok(Value::from(left <= right)),
            BinOpKind::Geq => Ok(Value::from(left >= right)),
        }
    }
}

/// Executes functions of one lowered program.
#[derive(Debug)]
pub struct Machine<'p> {
    functions: HashMap<&'p str, Code<'p>>,
    max_depth: usize,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p ImpProgram) -> Self {
        let mut functions = HashMap::new();
        for function in &program.functions {
            functions
                .entry(function.name.as_ref())
                .or_insert_with(|| Code::new(function));
        }
        Self {
            functions,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn code(&self, name: &str) -> Result<&Code<'p>, RuntimeError> {
        self.functions
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownFunction { name: Box::from(name) })
    }

    /// Calls `name` with `args`, running until its outermost `ret`.
    pub fn call(&self, name: &str, args: &[Value], fuel: &mut Fuel) -> Result<Value, RuntimeError> {
        let mut frame = Frame::enter(self.code(name)?, args, None)?;
        let mut callers = vec![];

        loop {
            if !fuel.should_continue() {
                return Err(RuntimeError::OutOfFuel);
            }
            let code = frame.code;
            let Some(instruction) = code.function.instructions.get(frame.pc) else {
                return Err(RuntimeError::MissingReturn {
                    function: code.function.name.clone(),
                });
            };
            fuel.consume(1);
            trace!("{}:{} {instruction}", code.function.name, frame.pc);
            frame.pc += 1;

            match instruction {
                Instruction::Move { dest, src } => {
                    let value = frame.read(src)?;
                    frame.temps.insert(*dest, value);
                }
                Instruction::BinOp {
                    kind,
                    dest,
                    left,
                    right,
                } => {
                    let value = frame.binop(*kind, frame.read(left)?, frame.read(right)?)?;
                    frame.temps.insert(*dest, value);
                }
                Instruction::Label(_) => {}
                Instruction::Jump(target) => frame.pc = code.target(target)?,
                Instruction::JumpIf { cond, target } => {
                    if frame.read(cond)? != 0 {
                        frame.pc = code.target(target)?;
                    }
                }
                Instruction::Call {
                    dest,
                    function,
                    args,
                } => {
                    let values = args
                        .iter()
                        .map(|arg| frame.read(arg))
                        .collect::<Result<Vec<_>, _>>()?;
                    if callers.len() + 1 >= self.max_depth {
                        return Err(RuntimeError::CallDepthExceeded {
                            limit: self.max_depth,
                        });
                    }
                    let callee = Frame::enter(self.code(function)?, &values, Some(*dest))?;
                    callers.push(std::mem::replace(&mut frame, callee));
                }
                Instruction::Return(value) => {
                    let value = frame.read(value)?;
                    match (frame.return_to, callers.pop()) {
                        (Some(dest), Some(mut caller)) => {
                            caller.temps.insert(dest, value);
                            frame = caller;
                        }
                        _ => return Ok(value),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Fuel, Machine, RuntimeError};
    use crate::compiler::{
        ir::{ImpFunction, ImpProgram, Instruction, Label, LabelKind, Operand, Temp},
        lower_program,
    };
    use crate::parser::parse_program;
    use assert2::{check, let_assert};

    fn lower(source: &str) -> ImpProgram {
        let_assert!(Ok(ast) = parse_program(source));
        let_assert!(Ok(program) = lower_program(&ast).into_result());
        program
    }

    const FACTORIAL: &str =
        "fn factorial(n: Int) -> Int = if n <= 1 then 1 else n * factorial(n - 1)";

    #[test]
    fn factorial() {
        let program = lower(FACTORIAL);
        let machine = Machine::new(&program);
        let mut fuel = Fuel::default();
        for (n, expected) in [(0, 1), (1, 1), (5, 120), (10, 3_628_800)] {
            check!(machine.call("factorial", &[n], &mut fuel) == Ok(expected));
        }
    }

    #[test]
    fn mutual_recursion_and_booleans() {
        let program = lower(
            "fn even(n: Int) -> Bool = if n == 0 then true else odd(n - 1)
             fn odd(n: Int) -> Bool = if n == 0 then false else even(n - 1)",
        );
        let machine = Machine::new(&program);
        let mut fuel = Fuel::default();
        check!(machine.call("even", &[10], &mut fuel) == Ok(1));
        check!(machine.call("odd", &[10], &mut fuel) == Ok(0));
        check!(machine.call("odd", &[7], &mut fuel) == Ok(1));
    }

    #[test]
    fn let_and_shadowing() {
        let program = lower("fn f(x: Int) -> Int = (let x = x * 10 in let y = x + 1 in y) + x");
        check!(Machine::new(&program).call("f", &[3], &mut Fuel::default()) == Ok(34));
    }

    #[test]
    fn arithmetic_traps() {
        let program = lower(
            "fn div(a: Int, b: Int) -> Int = a / b
             fn grow(n: Int) -> Int = grow(n * 2)",
        );
        let machine = Machine::new(&program);
        let mut fuel = Fuel::default();
        check!(machine.call("div", &[-7, 2], &mut fuel) == Ok(-3));
        check!(
            machine.call("div", &[1, 0], &mut fuel)
                == Err(RuntimeError::DivisionByZero { function: "div".into() })
        );
        check!(
            machine.call("div", &[i64::MIN, -1], &mut fuel)
                == Err(RuntimeError::Overflow { function: "div".into() })
        );
        check!(
            machine.call("grow", &[1], &mut fuel)
                == Err(RuntimeError::Overflow { function: "grow".into() })
        );
    }

    #[test]
    fn runaway_recursion_is_bounded() {
        let program = lower("fn spin(n: Int) -> Int = spin(n + 1)");
        let machine = Machine::new(&program);

        let mut fuel = Fuel::with(500);
        check!(machine.call("spin", &[0], &mut fuel) == Err(RuntimeError::OutOfFuel));
        check!(fuel.remaining() == 0);

        let machine = machine.with_max_depth(16);
        check!(
            machine.call("spin", &[0], &mut Fuel::default())
                == Err(RuntimeError::CallDepthExceeded { limit: 16 })
        );
    }

    #[test]
    fn bad_calls() {
        let program = lower(FACTORIAL);
        let machine = Machine::new(&program);
        let mut fuel = Fuel::default();
        check!(
            machine.call("nope", &[], &mut fuel)
                == Err(RuntimeError::UnknownFunction { name: "nope".into() })
        );
        check!(
            machine.call("factorial", &[1, 2], &mut fuel)
                == Err(RuntimeError::ArityMismatch {
                    name: "factorial".into(),
                    expected: 1,
                    found: 2
                })
        );
    }

    #[test]
    fn malformed_code() {
        let missing = Label { kind: LabelKind::Then, index: 9 };
        let program = ImpProgram {
            functions: vec![
                ImpFunction {
                    name: "unset".into(),
                    params: vec![],
                    instructions: vec![Instruction::Return(Temp(3).into())],
                },
                ImpFunction {
                    name: "lost".into(),
                    params: vec![],
                    instructions: vec![Instruction::Jump(missing)],
                },
                ImpFunction {
                    name: "open".into(),
                    params: vec![],
                    instructions: vec![Instruction::Move { dest: Temp(0), src: Operand::Int(1) }],
                },
            ],
        };
        let machine = Machine::new(&program);
        let mut fuel = Fuel::default();
        check!(
            machine.call("unset", &[], &mut fuel)
                == Err(RuntimeError::UnboundStorage {
                    function: "unset".into(),
                    storage: "t3".into()
                })
        );
        check!(
            machine.call("lost", &[], &mut fuel)
                == Err(RuntimeError::UnknownLabel {
                    function: "lost".into(),
                    label: missing
                })
        );
        check!(
            machine.call("open", &[], &mut fuel)
                == Err(RuntimeError::MissingReturn { function: "open".into() })
        );
    }
}
