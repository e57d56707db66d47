use std::collections::HashMap;

use crate::{
    ast::{FunctionDef, Program},
    lexer::Span,
};

use super::{
    ir::{Operand, Temp},
    transform::LowerError,
};

/// Where the value of an in-scope name lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Parameters are addressed by their own name
    Param(Box<str>),
    /// `let` bindings live in the temporary their value was lowered into
    Local(Temp),
}

impl Storage {
    pub fn operand(&self) -> Operand {
        match self {
            Storage::Param(name) => Operand::Var(name.clone()),
            Storage::Local(temp) => Operand::Temp(*temp),
        }
    }
}

/// Environments map in-scope names to their storage, with up to 1 reference to a
/// parent environment.
///
/// Extending never touches the parent: a child lives on the stack of the recursive call
/// that created it and disappears with it, so sibling subtrees never see each other's
/// bindings.
#[derive(Debug, Clone, Default)]
pub struct Environment<'a> {
    parent: Option<&'a Environment<'a>>,
    bindings: HashMap<Box<str>, Storage>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The top-level environment of a function: every parameter bound to itself.
    /// A repeated parameter name shadows the earlier one.
    pub fn for_params<'n>(names: impl IntoIterator<Item = &'n str>) -> Self {
        Self {
            parent: None,
            bindings: names
                .into_iter()
                .map(|name| (Box::from(name), Storage::Param(Box::from(name))))
                .collect(),
        }
    }

    pub fn for_function(function: &FunctionDef) -> Self {
        Self::for_params(function.param_names())
    }

    /// A child scope holding one more binding, shadowing any outer one of the same name
    pub fn extend(&self, name: impl AsRef<str>, storage: Storage) -> Environment<'_> {
        Environment {
            parent: Some(self),
            bindings: HashMap::from([(Box::from(name.as_ref()), storage)]),
        }
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<&Storage> {
        if let Some(storage) = self.bindings.get(name.as_ref()) {
            Some(storage)
        } else if let Some(parent) = self.parent {
            parent.get(name)
        } else {
            None
        }
    }
}

/// Name and arity of every function a call site may target.
///
/// Call lowering only needs these, never a callee's body, which is why definitions may
/// appear in any order.
#[derive(Debug, Clone, Default)]
pub struct Signatures {
    arities: HashMap<Box<str>, usize>,
}

impl Signatures {
    /// Collects the first definition of each name; later duplicates are left to the
    /// caller to report.
    pub fn from_program(program: &Program) -> Self {
        let mut signatures = Self::default();
        for function in &program.functions {
            signatures
                .arities
                .entry(function.name.clone())
                .or_insert(function.arity());
        }
        signatures
    }

    pub fn arity(&self, name: impl AsRef<str>) -> Option<usize> {
        self.arities.get(name.as_ref()).copied()
    }

    /// Validates a call of `name` with `found` arguments
    pub fn check_call(
        &self,
        name: &str,
        found: usize,
        span: Option<&Span>,
    ) -> Result<(), LowerError> {
        match self.arity(name) {
            None => Err(LowerError::UnknownFunction {
                name: Box::from(name),
                span: span.cloned(),
            }),
            Some(expected) if expected != found => Err(LowerError::ArityMismatch {
                name: Box::from(name),
                expected,
                found,
                span: span.cloned(),
            }),
            Some(_) => Ok(()),
        }
    }
}
