//! Character dictionary loading.
//!
//! A character dictionary lists one symbol per line, in index order. Symbols
//! may be multi-character escapes such as `\'o` or `\~a`, and a line holding a
//! single space defines the space character.

use crate::core::OCRError;
use crate::domain::SymbolIndexer;
use std::path::Path;

/// Reads a character dictionary file and returns one entry per line.
///
/// Line endings (`\n` or `\r\n`) are stripped; everything else on the line,
/// including spaces, is kept. Empty lines are preserved.
///
/// # Errors
///
/// Returns an `OCRError::InvalidInput` if the file cannot be read.
///
/// # Example
///
/// ```rust,no_run
/// use oar_hocr::utils::read_character_dict;
/// use std::path::Path;
///
/// let dict = read_character_dict(Path::new("path/to/chars.txt"))?;
/// # Ok::<(), oar_hocr::core::OCRError>(())
/// ```
pub fn read_character_dict(path: &Path) -> Result<Vec<String>, OCRError> {
    let content = std::fs::read_to_string(path).map_err(|e| OCRError::InvalidInput {
        message: format!(
            "Failed to read character dictionary from '{}': {}",
            path.display(),
            e
        ),
    })?;
    Ok(content
        .lines()
        .map(|s| s.strip_suffix('\r').unwrap_or(s).to_string())
        .collect())
}

/// Builds a locked indexer from a character dictionary file.
///
/// Empty lines are skipped and repeated symbols keep their first index.
///
/// # Errors
///
/// Returns an `OCRError::InvalidInput` if the file cannot be read or lists no symbols.
pub fn indexer_from_dict(path: &Path) -> Result<SymbolIndexer, OCRError> {
    let symbols = read_character_dict(path)?;
    let mut indexer = SymbolIndexer::from_symbols(symbols.into_iter().filter(|s| !s.is_empty()));
    if indexer.is_empty() {
        return Err(OCRError::invalid_input(format!(
            "character dictionary '{}' lists no symbols",
            path.display()
        )));
    }
    indexer.lock();
    tracing::debug!(
        "Loaded {} symbols from '{}'",
        indexer.len(),
        path.display()
    );
    Ok(indexer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_character_dict() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a").unwrap();
        writeln!(file, " ").unwrap();
        write!(file, "\\'o\r\n").unwrap();

        let dict = read_character_dict(file.path()).unwrap();
        assert_eq!(dict, vec!["a", " ", "\\'o"]);
    }

    #[test]
    fn test_read_nonexistent_file() {
        let result = read_character_dict(Path::new("/nonexistent/path/chars.txt"));
        assert!(matches!(result, Err(OCRError::InvalidInput { .. })));
    }

    #[test]
    fn test_indexer_from_dict() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a\n\n-\n \na\n|\n").unwrap();

        let indexer = indexer_from_dict(file.path()).unwrap();
        assert!(indexer.is_locked());
        assert_eq!(indexer.len(), 4);
        assert_eq!(indexer.get_index("a"), Some(0));
        assert_eq!(indexer.get_index(" "), Some(2));
        assert_eq!(indexer.get_object(3), Some("|"));
    }

    #[test]
    fn test_empty_dict_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\n\n").unwrap();
        assert!(indexer_from_dict(file.path()).is_err());
    }
}
