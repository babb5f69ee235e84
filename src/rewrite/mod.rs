//! Rewrite steps run by the analyzer between its two passes.

mod expand_star;

pub use expand_star::expand_star;

use crate::error::Result;
use crate::parser::ast::SelectStatement;
use crate::semantics::SemTable;

/// Rewrite step that leaves the statement untouched.
///
/// # Errors
///
/// Never fails.
pub fn no_rewrite(_stmt: &mut SelectStatement, _semtable: &SemTable) -> Result<()> {
    Ok(())
}
