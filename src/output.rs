//! Output printer: the final result to a file or the standard streams.

use crate::error::CliError;
use std::fs::OpenOptions;
use std::io::{self, Write};

/// Write the run result to its destination.
///
/// A non-empty `target` other than `-` names a file, written with fixed
/// permission bits and no partial-write recovery. Otherwise the result goes
/// to stdout; unless quiet, the input (when non-empty) and a labeled
/// boundary are echoed to stderr first.
pub fn print_output(
    input: &str,
    result: &str,
    target: &str,
    quiet: bool,
) -> Result<(), CliError> {
    if !target.is_empty() && target != "-" {
        return write_file(target, result);
    }
    let stdout = io::stdout();
    let stderr = io::stderr();
    print_to(input, result, quiet, &mut stderr.lock(), &mut stdout.lock())
}

fn write_file(target: &str, result: &str) -> Result<(), CliError> {
    let map_err = |source: io::Error| CliError::Io {
        context: format!("writing output file {target}"),
        source,
    };
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let mut file = options.open(target).map_err(map_err)?;
    file.write_all(result.as_bytes()).map_err(map_err)
}

fn print_to(
    input: &str,
    result: &str,
    quiet: bool,
    err: &mut impl Write,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let map_err = |source: io::Error| CliError::Io {
        context: "writing output".to_string(),
        source,
    };

    if !quiet {
        if !input.is_empty() {
            write!(err, "\nINPUT:\n\n{input}\n").map_err(map_err)?;
        }
        write!(err, "\nOUTPUT:\n\n").map_err(map_err)?;
    }
    // The result always reaches stdout regardless of quiet mode.
    write!(out, "{result}").map_err(map_err)?;
    if !result.ends_with('\n') {
        writeln!(out).map_err(map_err)?;
    }
    out.flush().map_err(map_err)?;
    Ok(())
}
