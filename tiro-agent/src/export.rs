//! Transcript export to a kept plain-text file

use std::io::Write;
use std::path::{Path, PathBuf};
use tiro_llm::{Error, Result};

/// Write `text` to a new `tiro-*.txt` file in `dir` (or the system temp
/// dir) and return its path. The file is not removed afterwards.
pub fn export_transcript(text: &str, dir: Option<&Path>) -> Result<PathBuf> {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    let mut file = tempfile::Builder::new()
        .prefix("tiro-")
        .suffix(".txt")
        .tempfile_in(&dir)
        .map_err(|e| io_error(e, &dir))?;

    file.write_all(text.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| io_error(e, &dir))?;

    let (_, path) = file.keep().map_err(|e| io_error(e.error, &dir))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "transcript exported");
    Ok(path)
}

fn io_error(err: std::io::Error, dir: &Path) -> Error {
    Error::from(err)
        .with_operation("export::transcript")
        .with_context("dir", dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiro_llm::ErrorKind;

    #[test]
    fn test_export_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_transcript("## Report\nbody", Some(dir.path())).unwrap();

        assert_eq!(path.parent().unwrap(), dir.path());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("tiro-") && name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "## Report\nbody");
    }

    #[test]
    fn test_export_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = export_transcript("text", Some(&missing)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.operation(), "export::transcript");
        assert_eq!(err.context_value("dir"), Some(missing.display().to_string().as_str()));
    }
}
