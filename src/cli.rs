use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{
    events::{ChannelEmitter, Event, EventEmitter},
    input::collect_inputs,
    log_file,
    run::{BatchSummary, DispatchConfig, Dispatcher, executable_dir},
    task::Batch,
    worker::WorkerLocator,
};

pub mod render;
pub mod workers;

use render::{EventRenderer, JsonRenderer, TerminalRenderer};
use workers::Workers;

/// Batch EPUB processing through the `epub_tool_backend` worker.
///
/// Every input file is handed to its own worker process, a few at a time.
/// The worker is the packaged sidecar next to this executable when present,
/// otherwise `python3 python_core/cli.py`.
#[derive(Parser, Debug)]
#[clap(styles = cli_styles::CLAP_STYLES, verbatim_doc_comment)]
pub enum Cli {
    Run(Run),
    Log(Log),
}

/// Run a worker command on a list of EPUB files
#[derive(Parser, Debug)]
pub struct Run {
    /// Worker command, for example `encrypt`, `s2t` or `font_subset`
    command: String,

    /// EPUB files, or directories containing them
    #[clap(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory, the worker decides when omitted
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Extra parameters for the worker, passed through untouched
    #[clap(long, default_value = "{}")]
    extra: String,

    #[clap(flatten)]
    options: CliRunOptions,

    #[clap(flatten)]
    worker: WorkerOptions,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CliRunOptions {
    /// Parallel workers, `auto` or a number up to 4
    #[clap(short = 'j', long, default_value = "auto")]
    pub workers: Workers,

    /// Only print one line per file
    #[clap(short, long)]
    pub compact: bool,

    /// Output format
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct WorkerOptions {
    /// Directory to look for the worker in, instead of the executable's one
    #[clap(long)]
    pub exe_dir: Option<PathBuf>,

    /// Sidecar base name
    #[clap(long)]
    pub sidecar: Option<String>,

    /// Interpreter for the fallback script
    #[clap(long)]
    pub interpreter: Option<String>,
}

impl WorkerOptions {
    fn locator(&self) -> WorkerLocator {
        let mut locator = WorkerLocator::default();
        if let Some(sidecar) = &self.sidecar {
            locator.sidecar_name = sidecar.clone();
        }
        if let Some(interpreter) = &self.interpreter {
            locator.interpreter = interpreter.clone();
        }
        locator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Show the log of the current session
#[derive(Parser, Debug)]
pub struct Log {
    /// Open the log file with the system viewer instead of printing it
    #[clap(long)]
    open: bool,
}

pub async fn main(args: Cli) -> anyhow::Result<()> {
    match args {
        Cli::Run(args) => run(args).await,
        Cli::Log(args) => show_log(args),
    }
}

async fn run(args: Run) -> anyhow::Result<()> {
    let files = collect_inputs(&args.inputs)?;

    let config = DispatchConfig {
        parallelism: args.options.workers.parallelism(),
        exe_dir: args.worker.exe_dir.clone(),
        locator: args.worker.locator(),
    };

    let (emitter, mut events) = ChannelEmitter::new();
    log::info!("File drop received: {} files", files.len());
    for file in &files {
        log::info!("  - {}", file.display());
    }
    emitter.emit(Event::FileDrop(
        files.iter().map(|f| f.to_string_lossy().into_owned()).collect(),
    ));

    let batch = Batch::new(files, args.command)
        .output_dir(args.output.unwrap_or_default())
        .extra(args.extra);
    let handle = Dispatcher::new(config, emitter).run_batch(batch);

    let mut renderer: Box<dyn EventRenderer> = match args.options.format {
        OutputFormat::Text => Box::new(TerminalRenderer::new(args.options.compact)?),
        OutputFormat::Json => Box::new(JsonRenderer),
    };

    // the channel closes once the batch task is gone
    while let Some(event) = events.recv().await {
        renderer.render(&event)?;
    }

    let summary = handle.wait().await?;
    renderer.finish(&summary);
    check_summary(&summary)
}

/// Fails the command when any file of the batch failed
fn check_summary(summary: &BatchSummary) -> anyhow::Result<()> {
    anyhow::ensure!(
        summary.failed == 0,
        "{} of {} files failed",
        summary.failed,
        summary.total
    );
    Ok(())
}

fn show_log(args: Log) -> anyhow::Result<()> {
    let path = log_file::log_path(&executable_dir()?);
    if args.open {
        log_file::open(&path)?;
        println!("{}", path.display());
    } else {
        print!("{}", log_file::read(&path)?);
    }
    Ok(())
}
