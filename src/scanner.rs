use crate::{
    error::{Error, Result},
    file::InputItem,
    filter::FileFilter,
    outcome::FailureRecord,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Files found under an input directory.
#[derive(Debug, Default)]
pub(crate) struct ScanResult {
    /// Loaded items, sorted by path
    pub(crate) items: Vec<InputItem>,

    /// Files that were found but could not be read as text
    pub(crate) unreadable: Vec<FailureRecord>,
}

impl ScanResult {
    /// Total number of files found, readable or not.
    #[must_use]
    pub(crate) fn files_found(&self) -> usize {
        self.items.len() + self.unreadable.len()
    }
}

/// Enumerates and loads the files of an input directory.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    filter: FileFilter,
}

impl Scanner {
    /// Creates a scanner for `root_dir` with the given exclusions.
    pub(crate) const fn new(root_dir: PathBuf, filter: FileFilter) -> Self {
        Self { root_dir, filter }
    }

    /// Lists every regular file under the root, recursively.
    ///
    /// Hidden entries are skipped. Paths are sorted for deterministic
    /// ordering.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if nothing is found.
    pub(crate) fn list(&self) -> Result<Vec<PathBuf>> {
        debug!("Scanning {}", self.root_dir.display());

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if !self.filter.should_process(&self.relative_name_path(entry.path())) {
                trace!("Excluded {}", entry.path().display());
                continue;
            }

            files.push(entry.into_path());
        }

        if files.is_empty() {
            return Err(Error::no_files(&self.root_dir));
        }

        files.sort();
        debug!("Found {} files", files.len());
        Ok(files)
    }

    /// Lists and loads every file under the root.
    ///
    /// Unreadable files are reported in [`ScanResult::unreadable`] instead of
    /// failing the scan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if nothing is found.
    pub(crate) async fn scan(&self) -> Result<ScanResult> {
        let mut result = ScanResult::default();

        for path in self.list()? {
            let name = self.relative_name(&path);
            match InputItem::load(&path, name.clone()).await {
                Ok(item) => result.items.push(item),
                Err(e) => {
                    warn!("Skipping {}: {}", name, e);
                    result.unreadable.push(FailureRecord {
                        input_name: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    /// Path relative to the root.
    fn relative_name_path(&self, path: &Path) -> PathBuf {
        pathdiff::diff_paths(path, &self.root_dir).unwrap_or_else(|| path.to_path_buf())
    }

    /// Display name relative to the root, with `/` separators.
    fn relative_name(&self, path: &Path) -> String {
        self.relative_name_path(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn scanner(root: &Path) -> Scanner {
        Scanner::new(root.to_path_buf(), FileFilter::allow_all())
    }

    #[test]
    fn test_scanner_finds_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.js").write_str("b").unwrap();
        temp.child("a.js").write_str("a").unwrap();

        let files = scanner(temp.path()).list().unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.js"));
        assert!(files[1].ends_with("b.js"));
    }

    #[test]
    fn test_scanner_nested_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child("src/lib.rs").write_str("pub fn test() {}").unwrap();
        temp.child("tests/test.rs").write_str("#[test]\nfn test() {}").unwrap();
        temp.child("empty_dir").create_dir_all().unwrap();

        let files = scanner(temp.path()).list().unwrap();

        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_scanner_skips_hidden() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".env").write_str("SECRET=1").unwrap();
        temp.child(".git/config").write_str("[core]").unwrap();
        temp.child("visible.txt").write_str("hi").unwrap();

        let files = scanner(temp.path()).list().unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("visible.txt"));
    }

    #[test]
    fn test_scanner_respects_excludes() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("keep.js").write_str("k").unwrap();
        temp.child("node_modules/dep/index.js").write_str("d").unwrap();

        let filter = FileFilter::new(&["node_modules".to_string()]).unwrap();
        let files = Scanner::new(temp.path().to_path_buf(), filter).list().unwrap();

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_scanner_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("sub").create_dir_all().unwrap();

        let result = scanner(temp.path()).list();

        assert!(matches!(result, Err(Error::NoFiles { .. })));
    }

    #[tokio::test]
    async fn test_scan_loads_items_and_reports_unreadable() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("docs/readme.md").write_str("# Title").unwrap();
        temp.child("image.bin").write_binary(&[0xff, 0xfe, 0xfd]).unwrap();

        let result = scanner(temp.path()).scan().await.unwrap();

        assert_eq!(result.files_found(), 2);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].name, "docs/readme.md");
        assert_eq!(result.items[0].content, "# Title");
        assert_eq!(result.unreadable.len(), 1);
        assert_eq!(result.unreadable[0].input_name, "image.bin");
    }
}
