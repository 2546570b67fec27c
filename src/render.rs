//! Terminal output renderer for status lines and chat messages.

use crossterm::style::Stylize;
use termimad::MadSkin;

/// Styled writer for the interactive surfaces.
///
/// Status chrome goes to stderr so stdout stays clean for program results.
/// Assistant messages render as markdown unless plain output is forced.
pub struct Renderer {
    color: bool,
    markdown: bool,
    skin: MadSkin,
}

impl Renderer {
    pub fn new(color: bool, markdown: bool) -> Self {
        Self {
            color,
            markdown,
            skin: MadSkin::default(),
        }
    }

    /// Plain renderer for quiet/debug surfaces.
    pub fn plain() -> Self {
        Self::new(false, false)
    }

    pub fn error(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", "error:".red().bold());
        } else {
            eprintln!("error: {msg}");
        }
    }

    pub fn warn(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", "warning:".yellow());
        } else {
            eprintln!("warning: {msg}");
        }
    }

    pub fn section(&self, title: &str) {
        if self.color {
            eprintln!("{}", title.bold());
        } else {
            eprintln!("{title}");
        }
    }

    pub fn field(&self, key: &str, value: &str) {
        if self.color {
            eprintln!("  {} {value}", format!("{key}:").dark_grey());
        } else {
            eprintln!("  {key}: {value}");
        }
    }

    /// Prompt chrome for one interactive chat turn.
    pub fn prompt(&self) {
        use std::io::Write;
        let mut err = std::io::stderr();
        if self.color {
            let _ = write!(err, "{} ", ">".cyan().bold());
        } else {
            let _ = write!(err, "> ");
        }
        let _ = err.flush();
    }

    /// One assistant message, rendered to stdout.
    pub fn assistant_message(&self, content: &str) {
        if self.markdown {
            println!("{}", self.skin.term_text(content));
        } else {
            println!("{content}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_renderer_disables_styling() {
        let renderer = Renderer::plain();
        assert!(!renderer.color);
        assert!(!renderer.markdown);
    }

    #[test]
    fn renderer_flags_are_independent() {
        let renderer = Renderer::new(true, false);
        assert!(renderer.color);
        assert!(!renderer.markdown);
    }
}
