//! Output file naming.
//!
//! Maps an input file name to the name its processed output is written under.
//! Two independent rules apply, in order:
//!
//! 1. `insert_before_ext` is spliced between the stem and the extension
//!    (`file.js` + `.test` → `file.test.js`).
//! 2. `output_ext` is appended unless the name already ends with it
//!    (`file.log` + `json` → `file.log.json`). An existing extension is never
//!    replaced.

use std::path::Path;

/// Rules for deriving an output file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingOptions {
    /// Text inserted between the stem and the extension
    pub insert_before_ext: Option<String>,

    /// Extension appended to the name (leading dot optional)
    pub output_ext: Option<String>,
}

impl NamingOptions {
    /// Creates options that keep names unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text inserted before the extension.
    #[must_use]
    pub fn insert_before_ext(mut self, text: impl Into<String>) -> Self {
        self.insert_before_ext = Some(text.into());
        self
    }

    /// Sets the extension appended to output names.
    #[must_use]
    pub fn output_ext(mut self, ext: impl Into<String>) -> Self {
        self.output_ext = Some(ext.into());
        self
    }

    /// Returns true if no rule changes the name.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.insert_before_ext.as_deref().is_none_or(str::is_empty)
            && self.output_ext.as_deref().is_none_or(|ext| normalize_ext(ext).is_none())
    }

    /// Applies the rules to `original`. See [`transform`].
    #[must_use]
    pub fn apply(&self, original: &str) -> String {
        transform(original, self)
    }
}

/// Derives the output name for `original`.
///
/// Only the final path component of `original` is used. The function is pure
/// and applying it twice with the same `output_ext` appends the extension only
/// once.
///
/// # Examples
///
/// ```
/// use llm_batch::{transform, NamingOptions};
///
/// let opts = NamingOptions::new().insert_before_ext(".test");
/// assert_eq!(transform("file.js", &opts), "file.test.js");
///
/// let opts = NamingOptions::new().output_ext("json");
/// assert_eq!(transform("file.log", &opts), "file.log.json");
/// ```
#[must_use]
pub fn transform(original: &str, options: &NamingOptions) -> String {
    let mut name = base_name(original).to_string();

    if let Some(insert) = options.insert_before_ext.as_deref().filter(|s| !s.is_empty()) {
        let (stem, ext) = split_extension(&name);
        name = format!("{stem}{insert}{ext}");
    }

    if let Some(ext) = options.output_ext.as_deref().and_then(normalize_ext) {
        if !name.ends_with(&ext) {
            name.push_str(&ext);
        }
    }

    name
}

/// Returns the last path component, or the input itself if it has none.
fn base_name(original: &str) -> &str {
    Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(original)
}

/// Splits `name` into stem and extension (extension keeps its dot).
///
/// Dot-files such as `.env` have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// Ensures a leading dot. Blank input yields `None`.
fn normalize_ext(ext: &str) -> Option<String> {
    let trimmed = ext.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    if trimmed.starts_with('.') {
        Some(trimmed.to_string())
    } else {
        Some(format!(".{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_options_keeps_name() {
        assert_eq!(transform("file.js", &NamingOptions::new()), "file.js");
        assert!(NamingOptions::new().is_identity());
    }

    #[test]
    fn test_insert_before_ext() {
        let opts = NamingOptions::new().insert_before_ext(".test");
        assert_eq!(transform("file.js", &opts), "file.test.js");
        assert_eq!(transform("archive.tar.gz", &opts), "archive.tar.test.gz");
    }

    #[test]
    fn test_insert_without_extension() {
        let opts = NamingOptions::new().insert_before_ext("_out");
        assert_eq!(transform("Makefile", &opts), "Makefile_out");
        assert_eq!(transform(".env", &opts), ".env_out");
    }

    #[test]
    fn test_output_ext_appends() {
        let opts = NamingOptions::new().output_ext("json");
        assert_eq!(transform("file.log", &opts), "file.log.json");

        let dotted = NamingOptions::new().output_ext(".json");
        assert_eq!(transform("file.log", &dotted), "file.log.json");
    }

    #[test]
    fn test_output_ext_already_present() {
        let opts = NamingOptions::new().output_ext("md");
        assert_eq!(transform("notes.md", &opts), "notes.md");
    }

    #[test]
    fn test_output_ext_idempotent() {
        let opts = NamingOptions::new().insert_before_ext(".spec").output_ext("ts");
        let once = transform("user.js", &opts);
        assert_eq!(once, "user.spec.js.ts");

        let ext_only = NamingOptions::new().output_ext("ts");
        let first = transform("user.js", &ext_only);
        assert_eq!(transform(&first, &ext_only), first);
    }

    #[test]
    fn test_combined_rules() {
        let opts = NamingOptions::new().insert_before_ext(".test").output_ext("js");
        assert_eq!(transform("calculatorUtils.js", &opts), "calculatorUtils.test.js");
    }

    #[test]
    fn test_uses_base_name_only() {
        let opts = NamingOptions::new().insert_before_ext(".test");
        assert_eq!(transform("src/lib/file.js", &opts), "file.test.js");
    }

    #[test]
    fn test_blank_rules_are_ignored() {
        let opts = NamingOptions::new().insert_before_ext("").output_ext("  ");
        assert!(opts.is_identity());
        assert_eq!(transform("file.js", &opts), "file.js");
    }

    #[test]
    fn test_deterministic() {
        let opts = NamingOptions::new().insert_before_ext("-v2").output_ext("txt");
        let names = ["a.rs", "b", ".hidden", "dir/c.tar.gz"];
        for name in names {
            assert_eq!(transform(name, &opts), transform(name, &opts));
        }
    }
}
