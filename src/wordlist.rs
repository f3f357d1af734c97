use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WordlistError {
    #[error("wordlist file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read wordlist {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Parse wordlist content into an ordered, deduplicated list of words.
///
/// - each line is trimmed, blank lines are ignored
/// - the first occurrence of a word wins, later duplicates are dropped
/// - file order is preserved
pub fn parse_words_str(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    for line in s.lines() {
        let word = line.trim();
        if word.is_empty() {
            continue;
        }
        if seen.insert(word) {
            out.push(word.to_string());
        }
    }

    out
}

/// Parse raw bytes, dropping anything that is not valid UTF-8.
pub fn parse_words_bytes(bytes: &[u8]) -> Vec<String> {
    let lossy = String::from_utf8_lossy(bytes);
    let cleaned: String = lossy
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    parse_words_str(&cleaned)
}

/// Load a wordlist from a file path.
pub fn load_words_from_path(path: impl AsRef<Path>) -> Result<Vec<String>, WordlistError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => WordlistError::NotFound {
            path: path.to_path_buf(),
        },
        _ => WordlistError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let words = parse_words_bytes(&bytes);
    debug!(path = %path.display(), words = words.len(), "loaded wordlist");
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_skips_blank_lines() {
        let input = "admin\n  login  \n\n\t\nbackup\r\n";
        assert_eq!(parse_words_str(input), vec!["admin", "login", "backup"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let input = "b\na\nb\nc\na\n";
        assert_eq!(parse_words_str(input), vec!["b", "a", "c"]);
    }

    #[test]
    fn invalid_bytes_are_dropped() {
        let input = b"adm\xffin\nlogin\n\xfe\n";
        assert_eq!(parse_words_bytes(input), vec!["admin", "login"]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_words_from_path("/definitely/not/here/words.txt").unwrap_err();
        assert!(matches!(err, WordlistError::NotFound { .. }));
    }
}
