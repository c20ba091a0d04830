use std::path::{Path, PathBuf};

use crate::worker::WorkerStrategy;

pub const SIDECAR_NAME: &str = "epub_tool_backend";
pub const SCRIPT_PATH: &str = "python_core/cli.py";
pub const INTERPRETER: &str = "python3";

/// Names used to find the worker relative to the running executable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerLocator {
    /// Sidecar base name, the platform executable suffix is appended
    pub sidecar_name: String,
    /// Fallback script, relative to each search root
    pub script: PathBuf,
    pub interpreter: String,
}

impl Default for WorkerLocator {
    fn default() -> Self {
        Self {
            sidecar_name: SIDECAR_NAME.to_string(),
            script: PathBuf::from(SCRIPT_PATH),
            interpreter: INTERPRETER.to_string(),
        }
    }
}

impl WorkerLocator {
    pub fn sidecar_path(&self, exe_dir: &Path) -> PathBuf {
        exe_dir.join(format!("{}{}", self.sidecar_name, std::env::consts::EXE_SUFFIX))
    }

    /// Fallback script locations, in search order:
    /// next to the executable, inside a macOS bundle `Resources` folder,
    /// the development tree above `.app/Contents/MacOS`, and finally the
    /// bare relative path.
    pub fn script_candidates(&self, exe_dir: &Path) -> Vec<PathBuf> {
        vec![
            exe_dir.join(&self.script),
            exe_dir.join("..").join("Resources").join(&self.script),
            exe_dir.join("..").join("..").join("..").join(&self.script),
            self.script.clone(),
        ]
    }

    /// Picks the first existing candidate, or the last one when none exists.
    /// A missing script is not an error here, the invocation will fail later.
    pub fn find_script(&self, exe_dir: &Path) -> PathBuf {
        let mut candidates = self.script_candidates(exe_dir);
        match candidates.iter().position(|p| p.exists()) {
            Some(idx) => candidates.swap_remove(idx),
            None => candidates.pop().unwrap_or_else(|| self.script.clone()),
        }
    }

    pub fn resolve(&self, exe_dir: &Path) -> WorkerStrategy {
        let sidecar = self.sidecar_path(exe_dir);
        if sidecar.exists() {
            log::info!("Using sidecar: {}", sidecar.display());
            return WorkerStrategy::Sidecar { path: sidecar };
        }

        log::info!("Sidecar not found, using {} fallback", self.interpreter);
        let script = self.find_script(exe_dir);
        log::info!("Worker script path: {}", script.display());
        WorkerStrategy::Fallback {
            interpreter: self.interpreter.clone(),
            script,
        }
    }
}
