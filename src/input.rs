//! Input acquisition: the single-read stdin cache and run-input resolution.
//!
//! Standard input cannot be re-read, but one invocation may need the same
//! bytes more than once (a listing pass followed by a run pass). The cache is
//! a single-assignment cell filled at most once per process.

use crate::error::CliError;
use std::fs;
use std::io::{self, Read};
use std::sync::OnceLock;

/// Argument sentinel meaning "read from standard input".
pub const STDIN_SENTINEL: &str = "-";

/// Exactly-once buffer of standard-input bytes.
///
/// The cell is written at most once and read many times; concurrent acquirers
/// would race only on the first fill, which `OnceLock` serializes.
#[derive(Debug, Default)]
pub struct StdinCache {
    cell: OnceLock<Vec<u8>>,
}

impl StdinCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of standard input, reading the stream on first use only.
    pub fn get_or_read(&self) -> Result<&[u8], CliError> {
        self.fill_from(|| {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    /// Seed the cache directly, standing in for the process stream in tests.
    #[cfg(test)]
    pub(crate) fn prime(&self, bytes: Vec<u8>) {
        let _ = self.cell.set(bytes);
    }

    fn fill_from(
        &self,
        read_all: impl FnOnce() -> io::Result<Vec<u8>>,
    ) -> Result<&[u8], CliError> {
        if let Some(bytes) = self.cell.get() {
            return Ok(bytes);
        }
        let bytes = read_all().map_err(|source| CliError::Io {
            context: "reading standard input".to_string(),
            source,
        })?;
        // A concurrent first fill may have won; either way the cell now holds
        // the stream contents.
        Ok(self.cell.get_or_init(|| bytes))
    }
}

/// Resolve the run input text.
///
/// `--input` names a file (or `-` for standard input) and wins over trailing
/// arguments; otherwise the arguments after the program reference, joined by
/// single spaces, are the input.
pub fn from_cli(
    input_flag: Option<&str>,
    args: &[String],
    stdin: &StdinCache,
) -> Result<String, CliError> {
    match input_flag {
        Some(STDIN_SENTINEL) => {
            let bytes = stdin.get_or_read()?;
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        Some(path) if !path.is_empty() => {
            fs::read_to_string(path).map_err(|source| CliError::Io {
                context: format!("reading input file {path}"),
                source,
            })
        }
        _ => Ok(args.iter().skip(1).cloned().collect::<Vec<_>>().join(" ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn stream_is_read_at_most_once() {
        let cache = StdinCache::new();
        let reads = AtomicUsize::new(0);
        let read_all = || {
            reads.fetch_add(1, Ordering::SeqCst);
            Ok(b"{\"url\":\"x\"}".to_vec())
        };

        let first = cache.fill_from(read_all).expect("first read");
        assert_eq!(first, b"{\"url\":\"x\"}");
        // Second acquisition must reuse the cache, not re-read the stream.
        let second = cache
            .fill_from(|| panic!("stream re-read"))
            .expect("cached read");
        assert_eq!(second, b"{\"url\":\"x\"}");
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn read_failure_is_io_error_and_leaves_cache_empty() {
        let cache = StdinCache::new();
        let err = cache
            .fill_from(|| Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")))
            .unwrap_err();
        assert!(
            err.to_string().starts_with("reading standard input:"),
            "got: {err}"
        );
        // A later successful read still fills the cell.
        let bytes = cache.fill_from(|| Ok(b"ok".to_vec())).expect("retry fill");
        assert_eq!(bytes, b"ok");
    }

    #[test]
    fn input_joins_trailing_args() {
        let cache = StdinCache::new();
        let args: Vec<String> = ["prog.tls", "summarize", "this"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let input = from_cli(None, &args, &cache).expect("input");
        assert_eq!(input, "summarize this");
    }

    #[test]
    fn input_flag_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "input from file").expect("write");
        let cache = StdinCache::new();
        let input = from_cli(
            Some(file.path().to_str().expect("utf-8 path")),
            &["prog.tls".to_string(), "ignored".to_string()],
            &cache,
        )
        .expect("input");
        assert_eq!(input, "input from file");
    }

    #[test]
    fn missing_input_file_is_fatal() {
        let cache = StdinCache::new();
        let err = from_cli(Some("/nonexistent/input.txt"), &[], &cache).unwrap_err();
        assert!(
            err.to_string().contains("/nonexistent/input.txt"),
            "got: {err}"
        );
    }

    #[test]
    fn empty_args_mean_empty_input() {
        let cache = StdinCache::new();
        let input = from_cli(None, &["prog.tls".to_string()], &cache).expect("input");
        assert_eq!(input, "");
    }
}
