use crate::{
    batch::{BatchReport, BatchScheduler},
    client::CompletionClient,
    config::{Config, InputSource},
    error::{Error, Result},
    file::InputItem,
    filter::FileFilter,
    merge::write_merged,
    outcome::{FailureRecord, ProcessMode, ProcessingOutcome, SuccessRecord},
    processor::ItemProcessor,
    scanner::Scanner,
    template::PromptTemplates,
    validator::PromptValidator,
    writer::OutputWriter,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Which input shape a run processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunKind {
    /// One file
    SingleFile,
    /// Every file under a directory
    Directory,
}

/// Stages a run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    InputsValidated,
    RulesLoaded,
    OutputLocationResolved,
    ItemsEnumerated,
    PromptValidated,
    Processing,
    Merged,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InputsValidated => "inputs validated",
            Self::RulesLoaded => "rules loaded",
            Self::OutputLocationResolved => "output location resolved",
            Self::ItemsEnumerated => "items enumerated",
            Self::PromptValidated => "prompt validated",
            Self::Processing => "processing",
            Self::Merged => "merged",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Statistics collected during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// Input shape
    pub kind: RunKind,

    /// Whether the run was a dry run
    pub dry_run: bool,

    /// Files found (directory mode counts unreadable files too)
    pub files_found: usize,

    /// Output file names written, in output order
    pub outputs: Vec<String>,

    /// Per-item failures
    pub failures: Vec<FailureRecord>,

    /// Items only previewed
    pub previewed: usize,

    /// Number of processing groups
    pub groups: usize,

    /// Composed request of a single-file dry run
    pub preview: Option<String>,

    /// Output directory, absent in dry-run mode
    pub output_directory: Option<String>,

    /// Merged artifact, if one was written
    pub merged_file: Option<String>,

    /// Total execution time
    pub duration: Duration,
}

impl RunStats {
    fn new(kind: RunKind, dry_run: bool) -> Self {
        Self {
            kind,
            dry_run,
            files_found: 0,
            outputs: Vec::new(),
            failures: Vec::new(),
            previewed: 0,
            groups: 0,
            preview: None,
            output_directory: None,
            merged_file: None,
            duration: Duration::ZERO,
        }
    }

    /// Number of items written.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    /// Number of items that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        let kind = match self.kind {
            RunKind::SingleFile => "single file",
            RunKind::Directory => "directory",
        };

        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Batch Processing Summary                 ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Input:                {kind:>12}                    ║");
        println!(
            "║ Files Found:          {:>8}                        ║",
            self.files_found
        );
        if self.dry_run {
            println!(
                "║ Previewed:            {:>8}                        ║",
                self.previewed
            );
        } else {
            println!(
                "║ Succeeded:            {:>8}                        ║",
                self.succeeded()
            );
            println!(
                "║ Failed:               {:>8}                        ║",
                self.failed()
            );
        }
        if self.kind == RunKind::Directory {
            println!(
                "║ Batches:              {:>8}                        ║",
                self.groups
            );
        }
        println!("║                                                       ║");
        match self.output_directory {
            Some(ref dir) => {
                println!("║ Output Directory:                                     ║");
                println!("║   {dir}");
            }
            None => println!("║ ⚠ No files were written (dry run mode)               ║"),
        }
        if let Some(ref merged) = self.merged_file {
            println!("║ Merged File:                                          ║");
            println!("║   {merged}");
        }
        println!("║                                                       ║");
        println!(
            "║ Total Time:           {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");

        for failure in &self.failures {
            println!("  ✗ {failure}");
        }
    }
}

/// Coordinates one batch run from rule loading to the final merge.
pub struct Pipeline<C> {
    config: Config,
    client: Arc<C>,
    templates: Arc<PromptTemplates>,
}

impl<C: CompletionClient + 'static> Pipeline<C> {
    /// Creates a new pipeline with the given configuration and client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The prompt templates fail to compile
    pub fn new(config: Config, client: Arc<C>) -> Result<Self> {
        config.validate()?;
        debug!(phase = %RunPhase::InputsValidated);

        Ok(Self {
            config,
            client,
            templates: Arc::new(PromptTemplates::new()?),
        })
    }

    /// Executes the run and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Load**: Reads the rule document
    /// 2. **Resolve**: Creates the output directory (skipped in dry run)
    /// 3. **Process**: Handles the single file, or scans the directory,
    ///    validates the prompt and runs the batch scheduler
    /// 4. **Merge**: Writes the merged artifact when requested
    ///
    /// # Errors
    ///
    /// Returns an error if the rule document cannot be read, the output
    /// directory cannot be created, a directory holds no files, the prompt is
    /// rejected, or a single-file run fails. Per-item failures in directory
    /// mode are reported in the statistics instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_batch::{Config, HttpCompletionClient, Pipeline, ServiceConfig};
    /// use std::sync::Arc;
    ///
    /// # async fn demo() -> anyhow::Result<()> {
    /// let service = ServiceConfig::new(
    ///     std::env::var("OPENAI_API_KEY").ok(),
    ///     std::env::var("OPENAI_MODEL").ok(),
    ///     None,
    /// )?;
    /// let config = Config::builder()
    ///     .prompt_file("./prompt.md")
    ///     .directory("./src")
    ///     .build()?;
    ///
    /// let client = HttpCompletionClient::new(&service, config.request_timeout)?;
    /// let stats = Pipeline::new(config, Arc::new(client))?.run().await?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(prompt_file = %self.config.prompt_file.display()))]
    pub async fn run(self) -> Result<RunStats> {
        let start_time = Instant::now();
        let mode = ProcessMode::from_dry_run(self.config.dry_run);

        let rules: Arc<str> = tokio::fs::read_to_string(&self.config.prompt_file)
            .await
            .map_err(|e| Error::io(&self.config.prompt_file, e))?
            .into();
        info!("Prompt file loaded successfully");
        debug!(phase = %RunPhase::RulesLoaded);

        let writer = if mode.is_dry_run() {
            None
        } else {
            let writer = OutputWriter::create(self.config.output_dir.as_deref()).await?;
            info!("Output directory: {}", writer.output_dir().display());
            Some(writer)
        };
        debug!(phase = %RunPhase::OutputLocationResolved);

        let mut stats = match self.config.input {
            InputSource::File(ref path) => {
                self.run_single(path, &rules, writer.as_ref(), mode).await?
            }
            InputSource::Directory(ref dir) => {
                self.run_directory(dir, &rules, writer.as_ref(), mode).await?
            }
        };

        stats.output_directory = writer
            .as_ref()
            .map(|w| w.output_dir().display().to_string());
        stats.duration = start_time.elapsed();
        debug!(phase = %RunPhase::Done);

        if mode.is_dry_run() {
            info!("Dry run completed. No files were processed.");
        } else {
            info!(
                "✓ Run completed in {:.2}s: {} succeeded, {} failed",
                stats.duration.as_secs_f64(),
                stats.succeeded(),
                stats.failed()
            );
        }

        Ok(stats)
    }

    /// Processes exactly one file. Any failure is fatal.
    async fn run_single(
        &self,
        path: &Path,
        rules: &str,
        writer: Option<&OutputWriter>,
        mode: ProcessMode,
    ) -> Result<RunStats> {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let item = InputItem::load(path, name).await?;

        let mut stats = RunStats::new(RunKind::SingleFile, mode.is_dry_run());
        stats.files_found = 1;
        debug!(phase = %RunPhase::ItemsEnumerated);
        debug!(phase = %RunPhase::Processing);

        match self
            .processor()
            .process(rules, &item.content, &item.name, mode)
            .await
        {
            ProcessingOutcome::DryRunPreview {
                composed_request_text,
                ..
            } => {
                println!("Dry run - combined prompt:");
                println!("{composed_request_text}");
                stats.previewed = 1;
                stats.preview = Some(composed_request_text);
            }
            ProcessingOutcome::Failure(failure) => {
                return Err(Error::ItemFailed {
                    input: failure.input_name,
                    reason: failure.reason,
                });
            }
            ProcessingOutcome::Success(record) => {
                let writer = writer.ok_or_else(|| {
                    Error::config("an output location is required outside dry-run mode")
                })?;
                let written = writer.write(&record.output_file_name, &record.content).await?;
                info!("✓ File processed and saved to {}", written.display());

                stats.merged_file = self.merge(writer, std::slice::from_ref(&record)).await?;
                stats.outputs.push(record.output_file_name);
            }
        }

        Ok(stats)
    }

    /// Processes every file under `dir` in throttled groups.
    async fn run_directory(
        &self,
        dir: &Path,
        rules: &Arc<str>,
        writer: Option<&OutputWriter>,
        mode: ProcessMode,
    ) -> Result<RunStats> {
        let filter = FileFilter::new(&self.config.exclude)?;
        let scan = Scanner::new(dir.to_path_buf(), filter).scan().await?;
        info!("Found {} files to process", scan.files_found());
        debug!(phase = %RunPhase::ItemsEnumerated);

        if scan.files_found() > 1 && !mode.is_dry_run() {
            info!("Validating prompt...");
            PromptValidator::new(Arc::clone(&self.client), Arc::clone(&self.templates))
                .check(rules)
                .await?;
            debug!(phase = %RunPhase::PromptValidated);
        }

        let mut stats = RunStats::new(RunKind::Directory, mode.is_dry_run());
        stats.files_found = scan.files_found();
        stats.failures = scan.unreadable;

        debug!(phase = %RunPhase::Processing);
        let scheduler = BatchScheduler::new(
            self.processor(),
            writer.cloned(),
            self.config.batch_size,
            self.config.delay,
            mode,
        )?;
        let BatchReport {
            successes,
            failures,
            previewed,
            groups,
        } = scheduler.run(Arc::clone(rules), scan.items).await?;

        stats.failures.extend(failures);
        stats.previewed = previewed;
        stats.groups = groups;

        if let Some(writer) = writer {
            stats.merged_file = self.merge(writer, &successes).await?;
        }
        stats.outputs = successes.into_iter().map(|r| r.output_file_name).collect();

        Ok(stats)
    }

    /// Writes the merged artifact if one was requested.
    async fn merge(
        &self,
        writer: &OutputWriter,
        outputs: &[SuccessRecord],
    ) -> Result<Option<String>> {
        let Some(ref destination) = self.config.merge else {
            return Ok(None);
        };

        let merged: Option<PathBuf> = write_merged(writer, outputs, destination).await?;
        if merged.is_some() {
            debug!(phase = %RunPhase::Merged);
        }
        Ok(merged.map(|p| p.display().to_string()))
    }

    fn processor(&self) -> ItemProcessor<C> {
        ItemProcessor::new(
            Arc::clone(&self.client),
            Arc::clone(&self.templates),
            self.config.naming.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockCompletionClient;
    use assert_fs::prelude::*;

    const ACCEPT: &str = r#"{"isValid": true, "reason": "ok", "promptType": "test"}"#;

    fn reply(text: &str) -> Result<String> {
        Ok(format!(r#"{{"processedContents": "{text}"}}"#))
    }

    #[tokio::test]
    async fn test_single_file_success() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("prompt.md").write_str("Summarize").unwrap();
        temp.child("notes.txt").write_str("long notes").unwrap();

        let config = Config::builder()
            .prompt_file(temp.path().join("prompt.md"))
            .file(temp.path().join("notes.txt"))
            .output_dir(temp.path().join("out"))
            .output_ext("md")
            .build()
            .unwrap();

        let mock = MockCompletionClient::new().with_default(reply("short"));
        let stats = Pipeline::new(config, Arc::new(mock.clone()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(stats.kind, RunKind::SingleFile);
        assert_eq!(stats.outputs, vec!["notes.txt.md".to_string()]);
        assert_eq!(mock.call_count(), 1);
        temp.child("out/notes.txt.md").assert("short");
    }

    #[tokio::test]
    async fn test_single_file_failure_is_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("prompt.md").write_str("Summarize").unwrap();
        temp.child("notes.txt").write_str("long notes").unwrap();

        let config = Config::builder()
            .prompt_file(temp.path().join("prompt.md"))
            .file(temp.path().join("notes.txt"))
            .output_dir(temp.path().join("out"))
            .build()
            .unwrap();

        let mock = MockCompletionClient::new().with_default(Ok(r#"{"other": 1}"#.to_string()));
        let err = Pipeline::new(config, Arc::new(mock))
            .unwrap()
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ItemFailed { .. }));
        assert!(!temp.child("out/notes.txt").exists());
    }

    #[tokio::test]
    async fn test_single_item_directory_skips_validation() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("prompt.md").write_str("Translate").unwrap();
        temp.child("in/only.txt").write_str("hola").unwrap();

        let config = Config::builder()
            .prompt_file(temp.path().join("prompt.md"))
            .directory(temp.path().join("in"))
            .output_dir(temp.path().join("out"))
            .build()
            .unwrap();

        let mock = MockCompletionClient::new().with_default(reply("hello"));
        let stats = Pipeline::new(config, Arc::new(mock.clone()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(mock.call_count(), 1);
        assert_eq!(stats.succeeded(), 1);
        assert_eq!(stats.groups, 1);
    }

    #[tokio::test]
    async fn test_unreadable_files_are_reported() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("prompt.md").write_str("Translate").unwrap();
        temp.child("in/a.txt").write_str("hola").unwrap();
        temp.child("in/blob.bin")
            .write_binary(&[0xff, 0xfe, 0x00, 0x9f])
            .unwrap();

        let config = Config::builder()
            .prompt_file(temp.path().join("prompt.md"))
            .directory(temp.path().join("in"))
            .output_dir(temp.path().join("out"))
            .delay(Duration::ZERO)
            .build()
            .unwrap();

        let mock = MockCompletionClient::new()
            .respond_when("# Prompt to evaluate", Ok(ACCEPT.to_string()))
            .with_default(reply("hello"));
        let stats = Pipeline::new(config, Arc::new(mock))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(stats.files_found, 2);
        assert_eq!(stats.outputs, vec!["a.txt".to_string()]);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.failures[0].input_name, "blob.bin");
    }

    #[tokio::test]
    async fn test_merge_without_successes_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("prompt.md").write_str("Translate").unwrap();
        temp.child("in/a.txt").write_str("hola").unwrap();

        let config = Config::builder()
            .prompt_file(temp.path().join("prompt.md"))
            .directory(temp.path().join("in"))
            .output_dir(temp.path().join("out"))
            .merge("all.md")
            .build()
            .unwrap();

        let mock = MockCompletionClient::new().with_default(Ok("not json".to_string()));
        let stats = Pipeline::new(config, Arc::new(mock))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(stats.failed(), 1);
        assert!(stats.merged_file.is_none());
        assert!(!temp.child("out/all.md").exists());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::OutputLocationResolved.to_string(), "output location resolved");
    }
}
