//! Assemble collaborator: serialize a loaded program into one portable
//! artifact.

use crate::error::CliError;
use crate::program::Program;
use serde::Serialize;
use std::io::{self, Write};

/// Artifact format marker.
const ARTIFACT_FORMAT: &str = "toolscript-artifact";
/// On-disk artifact schema version.
const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct Artifact<'a> {
    format: &'a str,
    version: u32,
    program: &'a Program,
}

/// Write the program as a single self-contained JSON artifact.
///
/// No model invocation occurs; the artifact can later be loaded in place of
/// the original multi-file source.
pub fn assemble(program: &Program, out: &mut impl Write) -> Result<(), CliError> {
    let map_err = |source: io::Error| CliError::Io {
        context: "writing assembled artifact".to_string(),
        source,
    };
    let artifact = Artifact {
        format: ARTIFACT_FORMAT,
        version: ARTIFACT_VERSION,
        program,
    };
    let json = serde_json::to_vec_pretty(&artifact)
        .map_err(|e| map_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    out.write_all(&json).map_err(map_err)?;
    out.write_all(b"\n").map_err(map_err)?;
    out.flush().map_err(map_err)
}
