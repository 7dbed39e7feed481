pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Expr, Stmt};
pub use parser::{ParseError, Parser};

/// A parsed rill script.
#[derive(Debug, Clone)]
pub struct Script {
    /// Top-level statements in source order.
    pub statements: Vec<Stmt>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
