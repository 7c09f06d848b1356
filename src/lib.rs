//! # llm-batch
//!
//! Runs every file of a directory (or a single file) through an LLM chat
//! completion service with one shared instruction prompt, and writes each
//! transformed result to an output directory.
//!
//! ## Features
//!
//! - Concurrent processing in throttled groups with a pause between groups
//! - Pre-flight validation of the instruction prompt for multi-file runs
//! - Output naming rules (inserted suffix, replacement extension)
//! - Optional merge of all outputs into one artifact
//! - Dry-run mode that previews composed requests without calling the service
//! - Atomic output writes
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_batch::{Config, ServiceConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let service = ServiceConfig::new(
//!     std::env::var("OPENAI_API_KEY").ok(),
//!     std::env::var("OPENAI_MODEL").ok(),
//!     None,
//! )?;
//!
//! let config = Config::builder()
//!     .prompt_file("./generate-tests.md")
//!     .directory("./src")
//!     .insert_before_ext(".test")
//!     .batch_size(4)
//!     .delay(Duration::from_millis(500))
//!     .build()?;
//!
//! llm_batch::run(config, &service).await?.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A run follows a fixed pipeline:
//! 1. **Scanner**: Enumerates input files, skipping hidden and excluded ones
//! 2. **Validator**: Asks the service whether the prompt is usable
//! 3. **Batch scheduler**: Fans items out in concurrent, throttled groups
//! 4. **Processor**: Composes one request per item and decodes the reply
//! 5. **Writer**: Persists outputs and the optional merged artifact

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod batch;
mod client;
mod config;
mod error;
mod file;
mod filter;
mod merge;
mod naming;
mod outcome;
mod pipeline;
mod processor;
mod scanner;
mod template;
mod validator;
mod writer;

pub use batch::{partition, BatchReport, BatchScheduler};
pub use client::{ChatMessage, CompletionClient, HttpCompletionClient, MockCompletionClient, Role};
pub use config::{
    Config, ConfigBuilder, InputSource, ServiceConfig, API_KEY_VAR, API_URL_VAR, DEFAULT_API_URL,
    MODEL_VAR,
};
pub use error::{Error, Result};
pub use file::InputItem;
pub use merge::{merge_contents, write_merged};
pub use naming::{transform, NamingOptions};
pub use outcome::{FailureRecord, ProcessMode, ProcessingOutcome, SuccessRecord};
pub use pipeline::{Pipeline, RunKind, RunStats};
pub use processor::ItemProcessor;
pub use template::{PromptTemplates, ITEM_SYSTEM_PROMPT, VALIDATION_SYSTEM_PROMPT};
pub use validator::{PromptValidator, PromptVerdict};
pub use writer::{timestamped_output_dir, OutputWriter};

use std::sync::Arc;

/// Runs a complete batch against the configured completion service.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The HTTP client cannot be built
/// - The prompt file cannot be read or the prompt is rejected
/// - The input directory holds no files
/// - A single-file run fails
pub async fn run(config: Config, service: &ServiceConfig) -> Result<RunStats> {
    let client = HttpCompletionClient::new(service, config.request_timeout)?;
    Pipeline::new(config, Arc::new(client))?.run().await
}
