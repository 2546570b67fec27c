//! Loaded tool-script model: the program graph handed to the engine.

use serde::{Deserialize, Serialize};

/// One declared tool inside a program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    /// Declared name; empty for the anonymous first tool of a script.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Model override for this tool, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Names of other tools this tool may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Marks a tool that holds a multi-turn conversation.
    #[serde(default)]
    pub chat: bool,
    /// Prompt body, or a `#!` command line for command tools.
    #[serde(default)]
    pub instructions: String,
}

impl Tool {
    /// True when the instructions describe a subprocess command rather than
    /// a model prompt.
    pub fn is_command(&self) -> bool {
        self.instructions.starts_with("#!")
    }

    /// Command line behind the `#!` marker, if this is a command tool.
    pub fn command_line(&self) -> Option<&str> {
        self.instructions.strip_prefix("#!").map(str::trim)
    }

    /// Listing text for this tool. Instructions are never included.
    fn describe(&self, fallback_name: &str) -> String {
        let name = if self.name.is_empty() {
            fallback_name
        } else {
            &self.name
        };
        let mut lines = vec![format!("Name: {name}")];
        if !self.description.is_empty() {
            lines.push(format!("Description: {}", self.description));
        }
        if let Some(model) = &self.model {
            lines.push(format!("Model: {model}"));
        }
        if !self.tools.is_empty() {
            lines.push(format!("Tools: {}", self.tools.join(", ")));
        }
        if self.chat {
            lines.push("Chat: true".to_string());
        }
        lines.join("\n")
    }
}

/// A structurally resolved tool script.
///
/// The loader owns construction; the dispatcher holds a read reference and
/// derives a blocking variant for daemon mode without mutating the original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Display name of the source (file stem, URL, or `<stdin>`).
    #[serde(default)]
    pub name: String,
    /// Index of the entry tool in `tools`.
    #[serde(default)]
    pub entry: usize,
    /// Declared tools in declaration order.
    #[serde(default)]
    pub tools: Vec<Tool>,
    /// A blocking program keeps the hosting process alive after producing
    /// output, until externally canceled.
    #[serde(default)]
    pub blocking: bool,
}

impl Program {
    /// The empty-Program sentinel returned for an empty argument list.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Entry tool, if the program has any tools.
    pub fn entry_tool(&self) -> Option<&Tool> {
        self.tools.get(self.entry)
    }

    /// True when the entry tool declares chat capability.
    pub fn is_chat(&self) -> bool {
        self.entry_tool().is_some_and(|t| t.chat)
    }

    /// Derive a blocking variant, leaving `self` untouched.
    pub fn with_blocking(&self) -> Program {
        Program {
            blocking: true,
            ..self.clone()
        }
    }

    /// Render the tool listing: sorted by name ascending, declaration order
    /// breaking ties, with the program name substituted for unnamed tools.
    pub fn listing(&self) -> String {
        let mut ordered: Vec<&Tool> = self.tools.iter().collect();
        // Stable sort keeps declaration order for equal names.
        ordered.sort_by(|a, b| a.name.cmp(&b.name));
        ordered
            .iter()
            .map(|tool| tool.describe(&self.name))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, instructions: &str) -> Tool {
        Tool {
            name: name.to_string(),
            instructions: instructions.to_string(),
            ..Tool::default()
        }
    }

    #[test]
    fn empty_program_is_sentinel_not_error() {
        let prg = Program::default();
        assert!(prg.is_empty());
        assert!(prg.entry_tool().is_none());
        assert!(!prg.is_chat());
    }

    #[test]
    fn with_blocking_does_not_mutate_original() {
        let prg = Program {
            name: "demo".into(),
            tools: vec![tool("", "answer questions")],
            ..Program::default()
        };
        let blocking = prg.with_blocking();
        assert!(blocking.blocking);
        assert!(!prg.blocking);
        assert_eq!(blocking.tools, prg.tools);
    }

    #[test]
    fn listing_sorts_by_name_and_substitutes_program_name() {
        let prg = Program {
            name: "demo".into(),
            tools: vec![tool("zeta", "z"), tool("", "entry"), tool("alpha", "a")],
            ..Program::default()
        };
        let listing = prg.listing();
        let names: Vec<&str> = listing
            .lines()
            .filter_map(|l| l.strip_prefix("Name: "))
            .collect();
        // Unnamed tool renders as the program name and sorts as "".
        assert_eq!(names, vec!["demo", "alpha", "zeta"]);
    }

    #[test]
    fn listing_omits_instructions() {
        let prg = Program {
            name: "demo".into(),
            tools: vec![Tool {
                name: "greet".into(),
                description: "Say hello".into(),
                instructions: "SECRET PROMPT".into(),
                ..Tool::default()
            }],
            ..Program::default()
        };
        let listing = prg.listing();
        assert!(listing.contains("Description: Say hello"));
        assert!(!listing.contains("SECRET PROMPT"));
    }

    #[test]
    fn listing_breaks_name_ties_by_declaration_order() {
        let prg = Program {
            name: "demo".into(),
            tools: vec![
                Tool {
                    name: "dup".into(),
                    description: "first".into(),
                    ..Tool::default()
                },
                Tool {
                    name: "dup".into(),
                    description: "second".into(),
                    ..Tool::default()
                },
            ],
            ..Program::default()
        };
        let listing = prg.listing();
        let first = listing.find("first").expect("first tool listed");
        let second = listing.find("second").expect("second tool listed");
        assert!(first < second);
    }

    #[test]
    fn command_tool_detection() {
        let t = tool("fetch", "#!curl -s https://example.com");
        assert!(t.is_command());
        assert_eq!(t.command_line(), Some("curl -s https://example.com"));
        assert!(!tool("ask", "Answer the question.").is_command());
    }
}
