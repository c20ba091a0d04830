use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Local;
use log::LevelFilter;

pub const LOG_FILE_NAME: &str = "log.txt";

#[derive(Debug, thiserror::Error)]
pub enum LogFileError {
    #[error("Unable to create log file {0}: {1}")]
    Create(PathBuf, std::io::Error),
    #[error("Unable to read log file - {0}")]
    Read(std::io::Error),
    #[error("Log file does not exist: {0}")]
    Missing(PathBuf),
    #[error("Unable to open log file - {0}")]
    Open(std::io::Error),
    #[error("Logger already initialized: {0}")]
    Logger(#[from] log::SetLoggerError),
}

pub fn log_path(exe_dir: &Path) -> PathBuf {
    exe_dir.join(LOG_FILE_NAME)
}

/// Installs the global logger, writing to a fresh `log.txt` in `exe_dir`.
///
/// Lines look like `[15:04:05] message`. `RUST_LOG` overrides `level`.
pub fn init(exe_dir: &Path, level: LevelFilter) -> Result<PathBuf, LogFileError> {
    let path = log_path(exe_dir);
    // truncates any previous run
    let file = File::create(&path).map_err(|e| LogFileError::Create(path.clone(), e))?;

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| writeln!(buf, "[{}] {}", Local::now().format("%H:%M:%S"), record.args()))
        .try_init()?;

    log::info!("=== epub_tool started at {} ===", Local::now().format("%Y-%m-%d %H:%M:%S"));
    log::info!("Log file: {}", path.display());
    Ok(path)
}

/// Logger used when the log file cannot be created
pub fn init_stderr(level: LevelFilter) -> Result<(), LogFileError> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()?;
    Ok(())
}

pub fn read(path: &Path) -> Result<String, LogFileError> {
    std::fs::read_to_string(path).map_err(LogFileError::Read)
}

/// Opens the log file with the default viewer of the platform
pub fn open(path: &Path) -> Result<(), LogFileError> {
    if !path.exists() {
        return Err(LogFileError::Missing(path.to_path_buf()));
    }

    std::process::Command::new(opener())
        .arg(path)
        .spawn()
        .map_err(LogFileError::Open)?;

    log::info!("Opened log file: {}", path.display());
    Ok(())
}

fn opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "notepad"
    } else {
        "xdg-open"
    }
}
