//! Exclude patterns for directory scans.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Glob-based exclusion of scanned files.
///
/// A file is excluded when a pattern matches its path relative to the scan
/// root, its file name, or any of its parent directories.
#[derive(Debug, Clone)]
pub(crate) struct FileFilter {
    excludes: Option<GlobSet>,
}

impl FileFilter {
    /// Compiles the given patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for a pattern globset rejects.
    pub(crate) fn new(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::allow_all());
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::invalid_pattern(pattern, e.kind().to_string()))?;
            builder.add(glob);
        }

        let set = builder
            .build()
            .map_err(|e| Error::invalid_pattern(patterns.join(", "), e.to_string()))?;

        Ok(Self {
            excludes: Some(set),
        })
    }

    /// A filter that excludes nothing.
    pub(crate) const fn allow_all() -> Self {
        Self { excludes: None }
    }

    /// Returns true if `relative` should be processed.
    pub(crate) fn should_process(&self, relative: &Path) -> bool {
        let Some(ref excludes) = self.excludes else {
            return true;
        };

        if excludes.is_match(relative) {
            return false;
        }

        if relative
            .file_name()
            .is_some_and(|name| excludes.is_match(Path::new(name)))
        {
            return false;
        }

        !relative
            .ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .any(|ancestor| excludes.is_match(ancestor))
    }
}
