//! One-time process setup applied before any mode-specific logic.
//!
//! Global mutable state (working directory, the binary-location marker) is
//! changed here exactly once; everything downstream receives the resolved
//! environment as explicit parameters.

use std::env;
use std::io;

/// Environment variable carrying this binary's location, propagated to
/// subprocesses so nested invocations find the same executable.
pub const BIN_ENV_VAR: &str = "TOOLSCRIPT_BIN";

/// Apply the startup configuration step.
pub fn apply(chdir: Option<&str>) -> io::Result<()> {
    if let Some(dir) = chdir {
        env::set_current_dir(dir)?;
    }
    env::set_var(BIN_ENV_VAR, bin());
    Ok(())
}

/// Best-known path to the running binary.
pub fn bin() -> String {
    if let Ok(marker) = env::var(BIN_ENV_VAR) {
        if !marker.is_empty() {
            return marker;
        }
    }
    env::current_exe()
        .ok()
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| "toolscript".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_is_never_empty() {
        assert!(!bin().is_empty());
    }

    #[test]
    fn apply_rejects_missing_directory() {
        let err = apply(Some("/nonexistent-chdir-target")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
