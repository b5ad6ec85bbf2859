//! Batch reading of an access-log file.

use super::InputError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read every line of a log file into memory, preserving file order.
///
/// The file's existence is checked up front so a bad path fails before
/// any classification starts rather than partway through a batch.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>, InputError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_lines_preserves_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first line").unwrap();
        writeln!(file, "second line").unwrap();
        writeln!(file, "third line").unwrap();

        let lines = read_lines(file.path()).unwrap();
        assert_eq!(lines, vec!["first line", "second line", "third line"]);
    }

    #[test]
    fn test_read_lines_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(read_lines(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = read_lines("/nonexistent/access.log");
        match result {
            Err(InputError::NotFound(path)) => {
                assert_eq!(path, std::path::PathBuf::from("/nonexistent/access.log"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
