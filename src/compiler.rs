//! Lower functional Squawk into imperative three-address code.
//!
//! Every expression node becomes a short run of instructions that leaves its value in
//! a temporary, and conditionals become labels and jumps.
//!
//! For example:
//!
//! ```text
//! fn factorial(n: Int) -> Int = if n <= 1 then 1 else n * factorial(n - 1)
//! ```
//!
//! lowers to
//!
//! ```text
//! function factorial(n):
//!     mov t2, n
//!     mov t3, 1
//!     leq t1, t2, t3
//!     jmpif t1, then0
//!     jmp else1
//! then0:
//!     mov t0, 1
//!     jmp end_if2
//! else1:
//!     mov t4, n
//!     mov t7, n
//!     mov t8, 1
//!     sub t6, t7, t8
//!     call t5 = factorial(t6)
//!     mul t0, t4, t5
//! end_if2:
//!     ret t0
//! ```
//!
//! Temporaries and labels are numbered per function, both counting from 0.

pub mod environment;
pub mod ir;
pub mod names;
pub mod transform;

pub use environment::{Environment, Signatures, Storage};
pub use names::NameGen;
pub use transform::{lower_program, LowerError, Lowered, LoweredProgram, StateTransformer};
