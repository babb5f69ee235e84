//! Contract tests for the semantic analysis phases.

mod analyzer_contract;
mod scoping_contract;
