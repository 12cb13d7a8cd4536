//! System prompt resources
//!
//! Each agent reads one UTF-8 file when it is built and keeps the text for
//! its whole lifetime. A missing file makes the agent unbuildable.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable system instruction, cheap to clone
#[derive(Clone, PartialEq, Eq)]
pub struct SystemPrompt(Arc<str>);

impl SystemPrompt {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref().trim()))
    }

    /// Read a prompt file; surrounding whitespace is trimmed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::new(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::prompt_not_found(path.display().to_string())
                    .with_operation("prompt::load")
                    .set_source(e))
            }
            Err(e) => Err(Error::from(e)
                .with_operation("prompt::load")
                .with_context("path", path.display().to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SystemPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemPrompt({} chars)", self.0.chars().count())
    }
}

impl fmt::Display for SystemPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory of `<agent>_prompt.txt` files
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, agent_name: &str) -> PathBuf {
        self.dir.join(format!("{}_prompt.txt", agent_name))
    }

    pub fn load(&self, agent_name: &str) -> Result<SystemPrompt> {
        SystemPrompt::load(self.path_for(agent_name))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new("prompts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_load_trims_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("writing_prompt.txt"), "\n  You are Tiro.  \n").unwrap();

        let library = PromptLibrary::new(dir.path());
        let prompt = library.load("writing").unwrap();
        assert_eq!(prompt.as_str(), "You are Tiro.");
    }

    #[test]
    fn test_missing_prompt_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = PromptLibrary::new(dir.path()).load("reflection").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PromptNotFound);
        assert!(err
            .context_value("path")
            .unwrap()
            .ends_with("reflection_prompt.txt"));
    }

    #[test]
    fn test_debug_hides_text() {
        let prompt = SystemPrompt::new("secret instructions");
        assert_eq!(format!("{:?}", prompt), "SystemPrompt(19 chars)");
        assert_eq!(prompt.to_string(), "secret instructions");
    }
}
