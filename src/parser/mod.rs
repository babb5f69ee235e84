//! SQL parsing: AST, pest grammar and tree traversal.

pub mod ast;
mod grammar;
pub mod walk;

pub use grammar::parse_query;
