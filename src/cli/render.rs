use std::path::{Path, PathBuf};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pathdiff::diff_paths;

use crate::{
    events::Event,
    run::BatchSummary,
    task::{TaskResult, TaskStatus},
};

/// Presents batch events to the user
pub trait EventRenderer {
    fn render(&mut self, event: &Event) -> anyhow::Result<()>;
    fn finish(&mut self, summary: &BatchSummary);
}

/// One JSON object per line: `{"event": <name>, "payload": <payload>}`
#[derive(Debug, Default)]
pub struct JsonRenderer;

impl EventRenderer for JsonRenderer {
    fn render(&mut self, event: &Event) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(&event.to_json())?);
        Ok(())
    }

    fn finish(&mut self, _summary: &BatchSummary) {}
}

/// Progress bar with one line per finished file
pub struct TerminalRenderer {
    bar: ProgressBar,
    compact: bool,
    cwd: PathBuf,
}

impl TerminalRenderer {
    pub fn new(compact: bool) -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.green/white}] {pos:>7}/{len:7} {msg}")?
            .progress_chars("=>-"));
        Ok(Self {
            bar,
            compact,
            cwd: std::env::current_dir()?,
        })
    }
}

impl EventRenderer for TerminalRenderer {
    fn render(&mut self, event: &Event) -> anyhow::Result<()> {
        match event {
            Event::FileDrop(files) => {
                self.bar.set_length(files.len() as u64);
                self.bar.set_message(format!("{} files", files.len()));
            }
            Event::TaskLog(line) => {
                if !self.compact {
                    self.bar.suspend(|| {
                        for line in line.lines() {
                            println!("    {}", line.dimmed());
                        }
                    });
                }
            }
            Event::TaskResult(result) => {
                let line = result_line(result, &self.cwd, self.compact);
                self.bar.suspend(|| println!("{line}"));
            }
            Event::TaskProgress(progress) => {
                self.bar.set_length(progress.total as u64);
                self.bar.set_position(progress.completed as u64);
            }
            Event::TaskComplete => {
                self.bar.finish_with_message("All tasks completed");
            }
        }
        Ok(())
    }

    fn finish(&mut self, summary: &BatchSummary) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
        let failed = format!("{} failed", summary.failed);
        let other = match summary.other {
            0 => String::new(),
            n => format!(", {n} other"),
        };
        println!(
            "{} succeeded, {}, {} skipped{other} in {:.1?}",
            summary.succeeded.to_string().green().bold(),
            if summary.failed > 0 { failed.red().bold() } else { failed.normal() },
            summary.skipped,
            summary.elapsed,
        );
    }
}

fn display_path(file: &str, cwd: &Path) -> String {
    let path = Path::new(file);
    if path.is_absolute() {
        if let Some(rel) = diff_paths(path, cwd) {
            if !rel.starts_with("..") {
                return rel.display().to_string();
            }
        }
    }
    file.to_string()
}

fn result_line(result: &TaskResult, cwd: &Path, compact: bool) -> String {
    let file = display_path(&result.file, cwd);
    let mut line = match &result.status {
        TaskStatus::Success => format!("    {}\t{}", file.bold().green(), "done".green()),
        TaskStatus::Skip => format!("    {}\t{}", file.bold().cyan(), "skipped".cyan()),
        TaskStatus::Error => format!("    {}\t{}", file.bold().red(), "FAILED".red()),
        TaskStatus::Other(status) => format!("    {}\t{status}", file.bold()),
    };
    if let Some(output) = &result.output_path {
        line.push_str(&format!(" -> {output}"));
    }
    let detail = result.message.trim();
    if !compact && !detail.is_empty() && result.status != TaskStatus::Success {
        for l in detail.lines() {
            line.push_str(&format!("\n      {}", l.bright_black()));
        }
    }
    line
}
