//! Grouped, throttled fan-out of items to the completion service.
//!
//! Inputs are split into consecutive groups of `batch_size`. All items of a
//! group run concurrently and the group is joined before the next one starts;
//! a configurable pause separates groups to stay under service rate limits.
//! Failures are reported where they happen and never stop the run.

use crate::{
    client::CompletionClient,
    error::{Error, Result},
    file::InputItem,
    outcome::{FailureRecord, ProcessMode, ProcessingOutcome, SuccessRecord},
    processor::ItemProcessor,
    writer::OutputWriter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Splits `items` into consecutive groups of at most `batch_size`.
///
/// Order is preserved across and within groups; only the last group may be
/// shorter.
///
/// # Errors
///
/// Returns a configuration error if `batch_size` is zero.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> Result<Vec<Vec<T>>> {
    if batch_size == 0 {
        return Err(Error::config("batch_size must be at least 1"));
    }

    let mut groups = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        groups.push(iter.by_ref().take(batch_size).collect());
    }
    Ok(groups)
}

/// What a batch run produced.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Written outputs in group order, input order within a group
    pub successes: Vec<SuccessRecord>,

    /// Items that failed, in the order they were reported
    pub failures: Vec<FailureRecord>,

    /// Items only previewed (dry run)
    pub previewed: usize,

    /// Number of groups processed
    pub groups: usize,
}

/// Settled result of one item inside a group.
enum ItemResult {
    Written(SuccessRecord),
    Failed(FailureRecord),
    Previewed,
}

/// Runs items through an [`ItemProcessor`] in throttled concurrent groups.
pub struct BatchScheduler<C> {
    processor: ItemProcessor<C>,
    writer: Option<OutputWriter>,
    batch_size: usize,
    delay: Duration,
    mode: ProcessMode,
}

impl<C: CompletionClient + 'static> BatchScheduler<C> {
    /// Creates a scheduler.
    ///
    /// Successful outputs are written through `writer`, which is required
    /// unless `mode` is [`ProcessMode::DryRun`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `batch_size` is zero or a live run
    /// has no writer.
    pub fn new(
        processor: ItemProcessor<C>,
        writer: Option<OutputWriter>,
        batch_size: usize,
        delay: Duration,
        mode: ProcessMode,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if writer.is_none() && !mode.is_dry_run() {
            return Err(Error::config("an output location is required outside dry-run mode"));
        }

        Ok(Self {
            processor,
            writer,
            batch_size,
            delay,
            mode,
        })
    }

    /// Processes every item and returns the collected report.
    ///
    /// Groups run one after another; items within a group run concurrently.
    /// The delay is applied between groups, never after the last one and
    /// never in dry-run mode.
    ///
    /// # Errors
    ///
    /// Returns an error only if the items cannot be partitioned.
    pub async fn run(&self, rules: Arc<str>, items: Vec<InputItem>) -> Result<BatchReport> {
        let groups = partition(items, self.batch_size)?;
        let total_groups = groups.len();
        let mut report = BatchReport {
            groups: total_groups,
            ..BatchReport::default()
        };

        for (index, group) in groups.into_iter().enumerate() {
            info!(
                "Processing batch {}/{} ({} files)",
                index + 1,
                total_groups,
                group.len()
            );

            self.run_group(&rules, group, &mut report).await;

            if index + 1 < total_groups && !self.mode.is_dry_run() && !self.delay.is_zero() {
                info!("Waiting {}ms before next batch...", self.delay.as_millis());
                tokio::time::sleep(self.delay).await;
            }
        }

        Ok(report)
    }

    /// Spawns one task per item and waits for all of them.
    async fn run_group(&self, rules: &Arc<str>, group: Vec<InputItem>, report: &mut BatchReport) {
        let mut handles: Vec<(String, JoinHandle<ItemResult>)> = Vec::with_capacity(group.len());

        for item in group {
            let name = item.name.clone();
            let task = process_item(
                self.processor.clone(),
                self.writer.clone(),
                Arc::clone(rules),
                item,
                self.mode,
            );
            handles.push((name, tokio::spawn(task)));
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(ItemResult::Written(record)) => report.successes.push(record),
                Ok(ItemResult::Failed(failure)) => report.failures.push(failure),
                Ok(ItemResult::Previewed) => report.previewed += 1,
                Err(e) => {
                    error!("✗ Task for {} did not complete: {}", name, e);
                    report.failures.push(FailureRecord {
                        input_name: name,
                        reason: format!("task did not complete: {e}"),
                    });
                }
            }
        }
    }
}

/// Processes one item and writes its output; logs the result once.
async fn process_item<C: CompletionClient>(
    processor: ItemProcessor<C>,
    writer: Option<OutputWriter>,
    rules: Arc<str>,
    item: InputItem,
    mode: ProcessMode,
) -> ItemResult {
    debug!("Processing {}...", item.name);

    let outcome = processor
        .process(&rules, &item.content, &item.name, mode)
        .await;

    match outcome {
        ProcessingOutcome::DryRunPreview { input_name, .. } => {
            info!("Dry run for {} complete", input_name);
            ItemResult::Previewed
        }
        ProcessingOutcome::Failure(failure) => {
            error!("✗ Failed to process {}: {}", failure.input_name, failure.reason);
            ItemResult::Failed(failure)
        }
        ProcessingOutcome::Success(record) => {
            let Some(writer) = writer else {
                let failure = FailureRecord {
                    input_name: item.name,
                    reason: "no output location".to_string(),
                };
                error!("✗ Failed to process {}: {}", failure.input_name, failure.reason);
                return ItemResult::Failed(failure);
            };

            match writer.write(&record.output_file_name, &record.content).await {
                Ok(path) => {
                    info!("✓ Processed {} → {}", item.name, path.display());
                    ItemResult::Written(record)
                }
                Err(e) => {
                    let failure = FailureRecord {
                        input_name: item.name,
                        reason: e.to_string(),
                    };
                    error!("✗ Error processing {}: {}", failure.input_name, failure.reason);
                    ItemResult::Failed(failure)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockCompletionClient;
    use crate::naming::NamingOptions;
    use crate::template::PromptTemplates;
    use assert_fs::prelude::*;
    use std::time::Instant;

    fn item(name: &str) -> InputItem {
        InputItem::new(name, format!("content of {name}"))
    }

    fn processor(mock: &MockCompletionClient) -> ItemProcessor<MockCompletionClient> {
        ItemProcessor::new(
            Arc::new(mock.clone()),
            Arc::new(PromptTemplates::new().unwrap()),
            NamingOptions::new(),
        )
    }

    fn ok_reply(text: &str) -> Result<String> {
        Ok(format!(r#"{{"processedContents": "{text}"}}"#))
    }

    #[test]
    fn test_partition_sizes() {
        for batch_size in 1..=5 {
            for n in 0usize..=12 {
                let groups = partition((0..n).collect::<Vec<_>>(), batch_size).unwrap();
                assert_eq!(groups.len(), n.div_ceil(batch_size));
                if let Some((last, rest)) = groups.split_last() {
                    assert!(rest.iter().all(|g| g.len() == batch_size));
                    assert!(!last.is_empty() && last.len() <= batch_size);
                }
                let flat: Vec<_> = groups.into_iter().flatten().collect();
                assert_eq!(flat, (0..n).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_partition_rejects_zero() {
        assert!(partition(vec![1, 2, 3], 0).unwrap_err().is_config());
    }

    #[test]
    fn test_scheduler_requires_writer_when_live() {
        let mock = MockCompletionClient::new();
        let result = BatchScheduler::new(
            processor(&mock),
            None,
            2,
            Duration::ZERO,
            ProcessMode::Live,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_group_failure_is_isolated() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = OutputWriter::create(Some(temp.path())).await.unwrap();
        let mock = MockCompletionClient::new()
            .respond_when("\"b.txt\"", Err(Error::http("connection reset")))
            .with_default(ok_reply("done"));

        let scheduler = BatchScheduler::new(
            processor(&mock),
            Some(writer),
            3,
            Duration::ZERO,
            ProcessMode::Live,
        )
        .unwrap();

        let report = scheduler
            .run(Arc::from("rules"), vec![item("a.txt"), item("b.txt"), item("c.txt")])
            .await
            .unwrap();

        let names: Vec<_> = report.successes.iter().map(|s| s.output_file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].input_name, "b.txt");
        assert_eq!(report.groups, 1);
        temp.child("a.txt").assert("done");
        assert!(!temp.child("b.txt").exists());
    }

    #[tokio::test]
    async fn test_items_in_group_run_concurrently() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = OutputWriter::create(Some(temp.path())).await.unwrap();
        let mock = MockCompletionClient::new()
            .with_default(ok_reply("x"))
            .with_latency(Duration::from_millis(200));

        let scheduler = BatchScheduler::new(
            processor(&mock),
            Some(writer),
            4,
            Duration::ZERO,
            ProcessMode::Live,
        )
        .unwrap();

        let start = Instant::now();
        let items = (0..4).map(|i| item(&format!("f{i}.txt"))).collect();
        let report = scheduler.run(Arc::from("rules"), items).await.unwrap();

        assert_eq!(report.successes.len(), 4);
        assert!(start.elapsed() < Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_delay_between_groups_only() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = OutputWriter::create(Some(temp.path())).await.unwrap();
        let mock = MockCompletionClient::new().with_default(ok_reply("x"));

        let scheduler = BatchScheduler::new(
            processor(&mock),
            Some(writer),
            1,
            Duration::from_millis(60),
            ProcessMode::Live,
        )
        .unwrap();

        let start = Instant::now();
        let report = scheduler
            .run(Arc::from("rules"), vec![item("a.txt"), item("b.txt"), item("c.txt")])
            .await
            .unwrap();

        assert_eq!(report.groups, 3);
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_dry_run_skips_calls_writes_and_delay() {
        let mock = MockCompletionClient::new();
        let scheduler = BatchScheduler::new(
            processor(&mock),
            None,
            1,
            Duration::from_secs(5),
            ProcessMode::DryRun,
        )
        .unwrap();

        let start = Instant::now();
        let report = scheduler
            .run(Arc::from("rules"), vec![item("a.txt"), item("b.txt")])
            .await
            .unwrap();

        assert_eq!(report.previewed, 2);
        assert!(report.successes.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(mock.call_count(), 0);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_write_failure_counts_as_item_failure() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = OutputWriter::create(Some(temp.path())).await.unwrap();
        temp.child("a.txt").create_dir_all().unwrap();
        let mock = MockCompletionClient::new().with_default(ok_reply("x"));

        let scheduler = BatchScheduler::new(
            processor(&mock),
            Some(writer),
            2,
            Duration::ZERO,
            ProcessMode::Live,
        )
        .unwrap();

        let report = scheduler
            .run(Arc::from("rules"), vec![item("a.txt"), item("b.txt")])
            .await
            .unwrap();

        assert_eq!(report.successes.len(), 1);
        assert_eq!(report.successes[0].output_file_name, "b.txt");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].input_name, "a.txt");
    }

    #[tokio::test]
    async fn test_same_output_name_in_one_group() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = OutputWriter::create(Some(temp.path())).await.unwrap();
        let mock = MockCompletionClient::new()
            .with_default(ok_reply("same"))
            .with_latency(Duration::from_millis(20));

        let scheduler = BatchScheduler::new(
            processor(&mock),
            Some(writer),
            4,
            Duration::ZERO,
            ProcessMode::Live,
        )
        .unwrap();

        let report = scheduler
            .run(
                Arc::from("rules"),
                vec![item("x/a.txt"), item("y/a.txt"), item("z/a.txt")],
            )
            .await
            .unwrap();

        assert_eq!(report.successes.len(), 3);
        assert!(report.failures.is_empty());
        temp.child("a.txt").assert("same");
    }
}
