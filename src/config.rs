pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Knobs for the load pipeline, built from command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Resolve step `run` references (bundle siblings and external files).
    pub resolve: bool,
    /// Maximum number of documents on the external-reference stack.
    pub max_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self { resolve: true, max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl Settings {
    pub fn without_resolution(mut self) -> Self {
        self.resolve = false;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
