use clap::Parser;
use epub_dispatch::{cli::Cli, log_file, run::executable_dir};
use log::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // `log` reads the file of the session, it must not truncate it
    if matches!(args, Cli::Run(_)) {
        let logged = executable_dir()
            .map_err(anyhow::Error::from)
            .and_then(|dir| Ok(log_file::init(&dir, LevelFilter::Info)?));
        if let Err(e) = logged {
            eprintln!("Error creating log file: {e}");
            let _ = log_file::init_stderr(LevelFilter::Warn);
        }
    }

    let result = epub_dispatch::cli::main(args).await;
    log::info!("=== epub_tool shutdown ===");
    result
}
