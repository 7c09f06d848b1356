use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use llm_batch::{Config, HttpCompletionClient, Pipeline, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "llm-batch",
    version,
    author,
    about = "Process files through an LLM using a shared instruction prompt",
    long_about = "Process one file, or every file of a directory, through an OpenAI-compatible \
    chat completion service using the rules of a prompt file.\n\n\
    Directory runs validate the prompt first, then process files in concurrent batches \
    with a pause between batches. Each result is written to the output directory.\n\n\
    USAGE EXAMPLES:\n  \
      # Generate tests for every source file\n  \
      llm-batch -p generate-tests.md -d ./src --insert-before-ext .test\n\n  \
      # Convert one file to Markdown\n  \
      llm-batch -p to-markdown.md -f notes.txt --output-ext md\n\n  \
      # Preview the request without calling the service\n  \
      llm-batch -p review.md -f main.rs --dry-run\n\n  \
      # Four files at a time, one second apart, merged into one document\n  \
      llm-batch -p summarize.md -d ./docs --batch-size 4 --delay 1000 --merge summary.md"
)]
struct Cli {
    /// File holding the rules applied to every input
    #[arg(short, long, value_name = "FILE")]
    prompt_file: PathBuf,

    /// Single file to process
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Directory whose files are processed recursively
    #[arg(short, long, value_name = "PATH")]
    directory: Option<PathBuf>,

    /// Output directory [default: ./processed-<timestamp>]
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Text inserted before the extension of each output name
    ///
    /// Example: --insert-before-ext .test turns a.js into a.test.js
    #[arg(long, value_name = "TEXT", allow_hyphen_values = true)]
    insert_before_ext: Option<String>,

    /// Extension appended to each output name unless already present
    #[arg(long, value_name = "EXT")]
    output_ext: Option<String>,

    /// Merge all outputs into this file inside the output directory
    #[arg(short, long, value_name = "NAME")]
    merge: Option<String>,

    /// Print composed requests without calling the service or writing files
    #[arg(long)]
    dry_run: bool,

    /// Number of files processed concurrently
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: u64,

    /// Pause between batches in milliseconds
    #[arg(long, default_value_t = 500, value_name = "MS")]
    delay: u64,

    /// Timeout for a single service call in seconds
    #[arg(long, default_value_t = 120, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Glob pattern excluded from directory scans (can be used multiple times)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// API key for the completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model identifier
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Chat completions endpoint
    #[arg(long, env = "OPENAI_API_URL", value_name = "URL")]
    api_url: Option<String>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Usage errors are fatal configuration errors like any other
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            e.exit()
        }
        Err(e) => {
            e.print()?;
            anyhow::bail!("Invalid command line arguments");
        }
    };

    setup_tracing(cli.verbose)?;

    // Credentials are checked before any input is touched
    let service = ServiceConfig::new(cli.api_key, cli.model, cli.api_url)
        .context("Missing service settings")?;

    let batch_size = usize::try_from(cli.batch_size).context("--batch-size is too large")?;

    let mut builder = Config::builder()
        .prompt_file(cli.prompt_file)
        .dry_run(cli.dry_run)
        .batch_size(batch_size)
        .delay(Duration::from_millis(cli.delay))
        .request_timeout(Duration::from_secs(cli.timeout))
        .exclude(cli.exclude);

    if let Some(file) = cli.file {
        builder = builder.file(file);
    }

    if let Some(directory) = cli.directory {
        builder = builder.directory(directory);
    }

    if let Some(output) = cli.output {
        builder = builder.output_dir(output);
    }

    if let Some(text) = cli.insert_before_ext {
        builder = builder.insert_before_ext(text);
    }

    if let Some(ext) = cli.output_ext {
        builder = builder.output_ext(ext);
    }

    if let Some(name) = cli.merge {
        builder = builder.merge(name);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let client = HttpCompletionClient::new(&service, config.request_timeout)
        .context("Failed to create HTTP client")?;

    let stats = Pipeline::new(config, Arc::new(client))
        .context("Failed to create pipeline")?
        .run()
        .await
        .context("Batch run failed")?;

    stats.print_summary();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("llm_batch=info"),
        1 => EnvFilter::new("llm_batch=debug"),
        _ => EnvFilter::new("llm_batch=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
