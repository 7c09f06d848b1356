use crate::error::{Error, Result};
use std::path::Path;

/// One unit of work: a file's display name and content.
///
/// Read once when the batch is assembled and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputItem {
    /// Name used in logs, prompts and failure reports
    pub name: String,

    /// Raw text content
    pub content: String,
}

impl InputItem {
    /// Creates an item from already-loaded content.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Reads an item from disk. Content must be valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not UTF-8.
    pub async fn load(path: &Path, name: impl Into<String>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))?;

        Ok(Self::new(name, content))
    }
}
