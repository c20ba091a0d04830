use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read directory {0}: {1}")]
    ReadDir(PathBuf, std::io::Error),
}

pub fn is_epub(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

/// Turns the paths given by the user into the list of files of a batch.
///
/// Files are kept as given, whatever their extension. Directories are
/// replaced by the EPUB files they directly contain, sorted by name.
pub fn collect_inputs(
    paths: impl IntoIterator<Item = impl AsRef<Path>>,
) -> Result<Vec<PathBuf>, InputError> {
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_file() {
            files.push(path.to_path_buf());
        } else if path.is_dir() {
            files.extend(epubs_in(path)?);
        } else {
            return Err(InputError::NotFound(path.to_path_buf()));
        }
    }
    Ok(files)
}

fn epubs_in(dir: &Path) -> Result<Vec<PathBuf>, InputError> {
    let read_err = |e| InputError::ReadDir(dir.to_path_buf(), e);
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && is_epub(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
