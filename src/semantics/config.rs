//! Analyzer configuration.

/// How column equalities found in predicates are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EqualityClosure {
    /// `a = b` records `b` for `a` and `a` for `b`, nothing more.
    #[default]
    Pairwise,
    /// Every column of a chain `a = b and b = c` records all other members.
    Transitive,
}

/// Configuration for [`crate::semantics::analyze_with_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Closure applied to column equalities.
    pub equality_closure: EqualityClosure,
    /// Whether an ambiguous column directly in a projection list is deferred
    /// to the artifact instead of failing the analysis.
    pub defer_projection_ambiguity: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            equality_closure: EqualityClosure::Pairwise,
            defer_projection_ambiguity: true,
        }
    }
}

impl AnalyzerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the equality closure.
    #[must_use]
    pub fn with_equality_closure(mut self, closure: EqualityClosure) -> Self {
        self.equality_closure = closure;
        self
    }

    /// Enables or disables deferral of projection ambiguity.
    #[must_use]
    pub fn with_projection_ambiguity_deferral(mut self, defer: bool) -> Self {
        self.defer_projection_ambiguity = defer;
        self
    }
}
