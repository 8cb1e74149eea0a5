//! Options shared by the template and bundle resolvers.

use std::path::PathBuf;

/// Default number of modules materialized concurrently per bundle.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Options for resolving templates and bundles.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Project root, used to shorten locations in error messages.
    pub project_root: PathBuf,
    /// Maximum number of modules materialized at once. Always at least 1.
    pub concurrency: usize,
}

impl ResolveOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_options_builder() {
        let opts = ResolveOptions::new("/project");
        assert_eq!(opts.project_root, PathBuf::from("/project"));
        assert_eq!(opts.concurrency, DEFAULT_CONCURRENCY);

        let opts = opts.with_concurrency(0);
        assert_eq!(opts.concurrency, 1);
    }
}
