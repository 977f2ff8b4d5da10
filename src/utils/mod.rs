//! Cross-cutting utilities: atomic file output, path helpers and progress bars.

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, normalize_path, write_if_changed};
pub use progress::ProgressBar;
