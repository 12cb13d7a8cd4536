//! # tiro-error
//!
//! One error type for every tiro crate.
//!
//! - **ErrorKind**: what went wrong (e.g. `PromptNotFound`, `RateLimited`)
//! - **ErrorStatus**: whether a caller may try again
//! - **Context**: key/value pairs and the failing operation, for logs
//! - **Source**: the wrapped lower-level error, never leaked as a raw type
//!
//! ```rust
//! use tiro_error::{Error, ErrorKind};
//!
//! fn load() -> tiro_error::Result<()> {
//!     Err(Error::new(ErrorKind::PromptNotFound, "prompt file missing")
//!         .with_operation("prompt::load")
//!         .with_context("path", "prompts/writing_prompt.txt"))
//! }
//!
//! assert_eq!(load().unwrap_err().kind(), ErrorKind::PromptNotFound);
//! ```
//!
//! Soft failures (a learner asking to chat before generating words, an empty
//! topic) are not errors. Those are plain replies owned by the agent crate.

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the tiro Error
pub type Result<T> = std::result::Result<T, Error>;
