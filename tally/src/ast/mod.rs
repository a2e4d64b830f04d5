//! Expression AST

mod expr;
mod span;

pub use expr::{BinOp, Expr, UnOp};
pub use span::{Span, Spanned};
