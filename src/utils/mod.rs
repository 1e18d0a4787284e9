//! Shared helpers
//!
//! - [`fs`] - directory creation and atomic writes for pipeline artifacts

pub mod fs;

pub use fs::{atomic_write, ensure_dir, safe_write};
