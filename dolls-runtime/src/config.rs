/// Limits applied to a [`crate::Runtime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of nested function calls, native calls included.
    /// Exceeding it is a `Stack overflow` runtime error.
    pub max_call_depth: usize,
    /// Maximum nesting of statements and expressions inside one call frame.
    /// Exceeding it is a `Nesting too deep` runtime error.
    pub max_nesting_depth: usize,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;
    pub const DEFAULT_MAX_NESTING_DEPTH: usize = 1000;
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            max_nesting_depth: Self::DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}
