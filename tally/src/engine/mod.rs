//! Expression engine: the evaluation capability behind the sheet
//!
//! The sheet core only ever talks to the engine through the [`Engine`]
//! trait: parse a line, compile the parse, evaluate the compiled form
//! against an environment, and fold values into scope accumulators. Any
//! conforming arithmetic interpreter can stand in; [`MathEngine`] is the
//! bundled default.

mod env;
mod eval;
mod funcs;
mod value;

pub use env::{Environment, LAST};
pub use eval::{Executable, MathEngine};
pub use value::Value;

use crate::error::Result;

/// Expression evaluation capability
pub trait Engine {
    /// Parsed representation of one line
    type Ast;
    /// Compiled, evaluatable representation
    type Exec;

    /// Parse one line of text. Fails with a syntax error on malformed input.
    fn parse(&self, text: &str) -> Result<Self::Ast>;

    /// Compile a parse into an evaluatable form.
    fn compile(&self, ast: &Self::Ast) -> Result<Self::Exec>;

    /// Evaluate a compiled form. Assignments write into the environment.
    fn evaluate(&self, exec: &Self::Exec, env: &mut Environment) -> Result<Value>;

    /// Fold a line result into a scope accumulator. Fails with an
    /// aggregation error on incompatible operand kinds.
    fn add(&self, left: &Value, right: &Value) -> Result<Value>;

    /// Display hint: true when echoing the result adds nothing over the
    /// source text (a bare literal and the like). Renderers mute these.
    fn is_trivial(&self, _exec: &Self::Exec) -> bool {
        false
    }
}
