pub mod file_tailer;
pub mod log_file;

pub use file_tailer::AsyncFileTailer;
pub use log_file::read_lines;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by input sources.
///
/// A missing input file is a configuration error and is rejected before
/// any classification runs; malformed content is never an error here.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Cannot find file '{0}'")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
