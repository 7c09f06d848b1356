use crate::error::{Error, Result};
use crate::filter::FileFilter;
use crate::naming::NamingOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BATCH_SIZE: usize = 1;
const DEFAULT_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Endpoint used when no API URL is configured.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Environment variable holding the service credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable holding the model identifier.
pub const MODEL_VAR: &str = "OPENAI_MODEL";
/// Environment variable holding the service URL.
pub const API_URL_VAR: &str = "OPENAI_API_URL";

/// Connection settings for the completion service.
///
/// Built once at the program boundary and handed to the client; nothing below
/// that boundary reads the environment.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ServiceConfig {
    /// Bearer credential
    pub api_key: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Chat completions endpoint
    pub api_url: String,
}

impl ServiceConfig {
    /// Creates service settings, rejecting absent or blank required values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] if the key or model is missing.
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        api_url: Option<String>,
    ) -> Result<Self> {
        let api_key = non_blank(api_key).ok_or(Error::missing_credential(API_KEY_VAR))?;
        let model = non_blank(model).ok_or(Error::missing_credential(MODEL_VAR))?;
        let api_url = non_blank(api_url).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            api_key,
            model,
            api_url,
        })
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// What a run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A single file
    File(PathBuf),
    /// Every file under a directory, recursively
    Directory(PathBuf),
}

/// Configuration for a batch run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// File holding the rule document
    pub prompt_file: PathBuf,

    /// File or directory to process
    pub input: InputSource,

    /// Explicit output directory; a timestamped one is generated when absent
    pub output_dir: Option<PathBuf>,

    /// Output file naming rules
    pub naming: NamingOptions,

    /// Name of the merged artifact, if merging is requested
    pub merge: Option<String>,

    /// Compose requests without sending or writing anything
    pub dry_run: bool,

    /// Number of items processed concurrently per group
    pub batch_size: usize,

    /// Pause between consecutive groups
    pub delay: Duration,

    /// Upper bound on a single service call
    pub request_timeout: Duration,

    /// Glob patterns excluded from directory scans
    pub exclude: Vec<String>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_batch::Config;
    ///
    /// let config = Config::builder()
    ///     .prompt_file("./prompt.md")
    ///     .directory("./src")
    ///     .batch_size(4)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The prompt file or input path doesn't exist
    /// - The batch size is zero
    /// - The request timeout is zero
    /// - The merge name is not a plain file name
    /// - An exclude pattern is not a valid glob
    pub fn validate(&self) -> Result<()> {
        if !self.prompt_file.is_file() {
            return Err(Error::config(format!(
                "Prompt file does not exist: {}",
                self.prompt_file.display()
            )));
        }

        match &self.input {
            InputSource::File(path) if !path.is_file() => {
                return Err(Error::config(format!(
                    "Input file does not exist: {}",
                    path.display()
                )));
            }
            InputSource::Directory(path) if !path.is_dir() => {
                return Err(Error::config(format!(
                    "Input directory does not exist: {}",
                    path.display()
                )));
            }
            _ => {}
        }

        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be greater than 0"));
        }

        if let Some(ref merge) = self.merge {
            let is_plain = Path::new(merge)
                .file_name()
                .is_some_and(|name| name == merge.as_str());
            if !is_plain {
                return Err(Error::config(format!(
                    "Merge target must be a plain file name, got '{merge}'"
                )));
            }
        }

        if !self.exclude.is_empty() {
            if matches!(self.input, InputSource::File(_)) {
                tracing::warn!("exclude patterns only apply to directory input and are ignored");
            }
            FileFilter::new(&self.exclude)?;
        }

        Ok(())
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    prompt_file: Option<PathBuf>,
    file: Option<PathBuf>,
    directory: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    naming: NamingOptions,
    merge: Option<String>,
    dry_run: bool,
    batch_size: Option<usize>,
    delay: Option<Duration>,
    request_timeout: Option<Duration>,
    exclude: Vec<String>,
}

impl ConfigBuilder {
    /// Sets the file holding the rule document.
    #[must_use]
    pub fn prompt_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompt_file = Some(path.into());
        self
    }

    /// Processes a single file.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Processes every file under a directory.
    #[must_use]
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directory = Some(path.into());
        self
    }

    /// Sets an explicit output directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the text inserted before output file extensions.
    #[must_use]
    pub fn insert_before_ext(mut self, text: impl Into<String>) -> Self {
        self.naming.insert_before_ext = Some(text.into());
        self
    }

    /// Sets the extension appended to output file names.
    #[must_use]
    pub fn output_ext(mut self, ext: impl Into<String>) -> Self {
        self.naming.output_ext = Some(ext.into());
        self
    }

    /// Requests a merged artifact with the given file name.
    #[must_use]
    pub fn merge(mut self, name: impl Into<String>) -> Self {
        self.merge = Some(name.into());
        self
    }

    /// Enables dry run mode (no service calls, no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Sets how many items run concurrently per group.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the pause between groups.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the timeout for a single service call.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets glob patterns excluded from directory scans.
    #[must_use]
    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt file is missing, if not exactly one of
    /// file or directory input was given, or if validation fails.
    pub fn build(self) -> Result<Config> {
        let prompt_file = self
            .prompt_file
            .ok_or_else(|| Error::config("A prompt file is required"))?;

        let input = match (self.file, self.directory) {
            (Some(file), None) => InputSource::File(file),
            (None, Some(dir)) => InputSource::Directory(dir),
            (Some(_), Some(_)) => {
                return Err(Error::config(
                    "Cannot use both --file and --directory options at the same time",
                ));
            }
            (None, None) => {
                return Err(Error::config(
                    "Either --file or --directory option is required",
                ));
            }
        };

        let config = Config {
            prompt_file,
            input,
            output_dir: self.output_dir,
            naming: self.naming,
            merge: self.merge,
            dry_run: self.dry_run,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            delay: self.delay.unwrap_or(DEFAULT_DELAY),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            exclude: self.exclude,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn fixture() -> assert_fs::TempDir {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("prompt.md").write_str("Uppercase everything").unwrap();
        temp.child("input/a.txt").write_str("a").unwrap();
        temp
    }

    #[test]
    fn test_default_config() {
        let temp = fixture();
        let config = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .directory(temp.child("input").path())
            .build()
            .unwrap();

        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.delay, DEFAULT_DELAY);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(config.input, InputSource::Directory(_)));
        assert!(!config.dry_run);
        assert!(config.naming.is_identity());
    }

    #[test]
    fn test_requires_exactly_one_input() {
        let temp = fixture();

        let neither = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .build();
        assert!(neither.unwrap_err().is_config());

        let both = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .file(temp.child("input/a.txt").path())
            .directory(temp.child("input").path())
            .build();
        assert!(both.unwrap_err().to_string().contains("both"));
    }

    #[test]
    fn test_missing_prompt_file() {
        let temp = fixture();
        let result = Config::builder()
            .prompt_file(temp.child("nope.md").path())
            .file(temp.child("input/a.txt").path())
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_input_kind_must_match() {
        let temp = fixture();
        let result = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .file(temp.child("input").path())
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_batch_size() {
        let temp = fixture();
        let result = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .directory(temp.child("input").path())
            .batch_size(0)
            .build();

        assert!(result.unwrap_err().to_string().contains("batch_size"));
    }

    #[test]
    fn test_merge_must_be_plain_name() {
        let temp = fixture();
        let result = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .directory(temp.child("input").path())
            .merge("../escape.md")
            .build();

        assert!(result.is_err());

        let ok = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .directory(temp.child("input").path())
            .merge("all.md")
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let temp = fixture();
        let result = Config::builder()
            .prompt_file(temp.child("prompt.md").path())
            .directory(temp.child("input").path())
            .exclude(vec!["a[".to_string()])
            .build();

        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_service_config_requires_key_and_model() {
        let missing_key = ServiceConfig::new(None, Some("m".to_string()), None);
        assert!(matches!(
            missing_key,
            Err(Error::MissingCredential { name: API_KEY_VAR })
        ));

        let blank_model = ServiceConfig::new(Some("k".to_string()), Some("  ".to_string()), None);
        assert!(matches!(
            blank_model,
            Err(Error::MissingCredential { name: MODEL_VAR })
        ));
    }

    #[test]
    fn test_service_config_defaults_url() {
        let service = ServiceConfig::new(Some("k".to_string()), Some("m".to_string()), None).unwrap();
        assert_eq!(service.api_url, DEFAULT_API_URL);
        assert!(!format!("{service:?}").contains("\"k\""));
    }
}
