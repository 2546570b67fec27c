//! Program loader: tool-script sources → [`Program`].
//!
//! A tool script is a sequence of tool sections separated by `---` lines.
//! Each section starts with `Key: value` header lines (name, description,
//! model, tools, chat) and the remainder of the section is the tool's
//! instructions. The first declared tool is the entry point unless a
//! sub-tool is requested.

use crate::config::CacheOptions;
use crate::error::LoadError;
use crate::program::{Program, Tool};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Options threaded into the loader from the resolved runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    pub cache: CacheOptions,
}

/// Name used for programs read from standard input.
pub const STDIN_SOURCE_NAME: &str = "<stdin>";

/// Load a program from a path or remote identifier.
pub async fn load(
    reference: &str,
    sub_tool: &str,
    opts: &LoaderOptions,
) -> Result<Program, LoadError> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        let text = fetch_remote(reference, opts).await?;
        return from_source(reference, &text, sub_tool);
    }

    let path = Path::new(reference);
    let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
        source_name: reference.to_string(),
        source,
    })?;
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(reference);
    from_source(name, &text, sub_tool)
}

/// Parse a program from in-memory source text.
pub fn from_source(source_name: &str, text: &str, sub_tool: &str) -> Result<Program, LoadError> {
    let mut tools = Vec::new();
    for section in text.split("\n---\n") {
        let section = section.trim_matches('\n');
        if section.trim().is_empty() {
            continue;
        }
        tools.push(parse_tool(source_name, section)?);
    }
    if tools.is_empty() {
        return Err(LoadError::Parse {
            source_name: source_name.to_string(),
            message: "source declares no tools".to_string(),
        });
    }

    let entry = if sub_tool.is_empty() {
        0
    } else {
        tools
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(sub_tool))
            .ok_or_else(|| LoadError::UnknownSubTool {
                source_name: source_name.to_string(),
                sub_tool: sub_tool.to_string(),
            })?
    };

    tracing::debug!(source = source_name, tools = tools.len(), "loaded program");
    Ok(Program {
        name: source_name.to_string(),
        entry,
        tools,
        blocking: false,
    })
}

fn parse_tool(source_name: &str, section: &str) -> Result<Tool, LoadError> {
    let mut tool = Tool::default();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_body = false;

    for line in section.lines() {
        if !in_body {
            if let Some((key, value)) = header_line(line) {
                match key.as_str() {
                    "name" => tool.name = value.to_string(),
                    "description" => tool.description = value.to_string(),
                    "model" => tool.model = Some(value.to_string()),
                    "tools" => {
                        tool.tools = value
                            .split(',')
                            .map(|t| t.trim().to_string())
                            .filter(|t| !t.is_empty())
                            .collect();
                    }
                    "chat" => {
                        tool.chat = value.parse().map_err(|_| LoadError::Parse {
                            source_name: source_name.to_string(),
                            message: format!("chat must be true or false, got {value}"),
                        })?;
                    }
                    // Unknown headers become part of the instructions body.
                    _ => {
                        in_body = true;
                        body_lines.push(line);
                    }
                }
                continue;
            }
            if line.trim().is_empty() {
                in_body = true;
                continue;
            }
            in_body = true;
        }
        body_lines.push(line);
    }

    tool.instructions = body_lines.join("\n").trim().to_string();
    Ok(tool)
}

fn header_line(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    // Header keys are single bare words; anything else starts the body.
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_ascii_lowercase(), value.trim()))
}

async fn fetch_remote(url: &str, opts: &LoaderOptions) -> Result<String, LoadError> {
    let cache_path = opts.cache.dir.join(format!("{}.tls", content_key(url)));
    if !opts.cache.disabled {
        if let Ok(cached) = fs::read_to_string(&cache_path) {
            tracing::debug!(url, "using cached remote source");
            return Ok(cached);
        }
    }

    let fetch_err = |message: String| LoadError::Fetch {
        source_name: url.to_string(),
        message,
    };
    let response = reqwest::get(url).await.map_err(|e| fetch_err(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fetch_err(format!("status {}", response.status().as_u16())));
    }
    let text = response.text().await.map_err(|e| fetch_err(e.to_string()))?;

    if !opts.cache.disabled {
        // Cache misses are best-effort; a read-only cache dir is not fatal.
        if fs::create_dir_all(&opts.cache.dir).is_ok() {
            let _ = fs::write(&cache_path, &text);
        }
    }
    Ok(text)
}

fn content_key(url: &str) -> String {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TOOLS: &str = "\
name: entry
description: Entry tool
tools: helper
chat: true

Answer using the helper tool.
---
name: helper
description: Helper tool

Look things up.";

    #[test]
    fn parses_headers_and_instructions() {
        let prg = from_source("demo", TWO_TOOLS, "").expect("parse");
        assert_eq!(prg.tools.len(), 2);
        let entry = prg.entry_tool().expect("entry tool");
        assert_eq!(entry.name, "entry");
        assert_eq!(entry.tools, vec!["helper".to_string()]);
        assert!(entry.chat);
        assert_eq!(entry.instructions, "Answer using the helper tool.");
        assert!(prg.is_chat());
    }

    #[test]
    fn sub_tool_selects_entry_case_insensitively() {
        let prg = from_source("demo", TWO_TOOLS, "Helper").expect("parse");
        assert_eq!(prg.entry_tool().expect("entry tool").name, "helper");
        assert!(!prg.is_chat());
    }

    #[test]
    fn unknown_sub_tool_is_load_error() {
        let err = from_source("demo", TWO_TOOLS, "missing").unwrap_err();
        assert_eq!(err.to_string(), "demo: no tool named missing");
    }

    #[test]
    fn headerless_source_is_all_instructions() {
        let prg = from_source("demo", "Just answer the question.", "").expect("parse");
        let entry = prg.entry_tool().expect("entry tool");
        assert_eq!(entry.name, "");
        assert_eq!(entry.instructions, "Just answer the question.");
    }

    #[test]
    fn command_body_keeps_shebang() {
        let prg = from_source("demo", "name: now\n\n#!date -u", "").expect("parse");
        let entry = prg.entry_tool().expect("entry tool");
        assert!(entry.is_command());
        assert_eq!(entry.command_line(), Some("date -u"));
    }

    #[test]
    fn empty_source_is_parse_error() {
        let err = from_source("demo", "  \n\n", "").unwrap_err();
        assert!(
            err.to_string().contains("declares no tools"),
            "got: {err}"
        );
    }

    #[test]
    fn bad_chat_value_is_parse_error() {
        let err = from_source("demo", "chat: maybe\n\nbody", "").unwrap_err();
        assert!(err.to_string().contains("chat must be"), "got: {err}");
    }

    #[test]
    fn prose_with_colon_is_not_a_header() {
        let prg = from_source("demo", "Remember: always be polite.", "").expect("parse");
        let entry = prg.entry_tool().expect("entry tool");
        assert_eq!(entry.instructions, "Remember: always be polite.");
    }

    #[tokio::test]
    async fn load_missing_path_is_read_error() {
        let err = load("/nonexistent/prog.tls", "", &LoaderOptions::default())
            .await
            .unwrap_err();
        assert!(
            err.to_string().starts_with("reading /nonexistent/prog.tls:"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn load_path_uses_file_stem_as_program_name() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("greeter.tls");
        fs::write(&path, "name: greet\n\nSay hello.").expect("write script");
        let prg = load(
            path.to_str().expect("utf-8 path"),
            "",
            &LoaderOptions::default(),
        )
        .await
        .expect("load");
        assert_eq!(prg.name, "greeter");
    }

    #[tokio::test]
    async fn remote_cache_hit_skips_network() {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = "https://example.invalid/prog.tls";
        let opts = LoaderOptions {
            cache: CacheOptions {
                disabled: false,
                dir: dir.path().to_path_buf(),
            },
        };
        let cache_path = dir.path().join(format!("{}.tls", content_key(url)));
        fs::write(&cache_path, "name: cached\n\nFrom cache.").expect("seed cache");

        // example.invalid never resolves, so success proves the cache served it.
        let prg = load(url, "", &opts).await.expect("load from cache");
        assert_eq!(prg.entry_tool().expect("entry tool").name, "cached");
    }
}
