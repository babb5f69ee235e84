//! SQL type system.

mod sql_type;

pub use sql_type::{arithmetic_result, division_result, integer_division_result, SqlType};
