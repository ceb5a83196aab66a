//! Terminal implementation of the user prompt surface.

use std::io::{self, BufRead, StdinLock, Write};

use colored::Colorize;

use crate::domain::{PickItem, UserPrompt};

/// Prompts on stdin/stdout; messages go to stdout and warnings to stderr.
pub struct TerminalPrompt<R> {
    input: R,
    interactive: bool,
}

impl TerminalPrompt<StdinLock<'static>> {
    /// Prompt reading from the process's stdin.
    #[must_use]
    pub fn stdin(interactive: bool) -> Self {
        Self::new(io::stdin().lock(), interactive)
    }
}

impl<R: BufRead> TerminalPrompt<R> {
    /// When `interactive` is false, questions are answered with their
    /// defaults and picks are cancelled without reading input.
    #[must_use]
    pub const fn new(input: R, interactive: bool) -> Self {
        Self { input, interactive }
    }

    /// Read one line; `None` on end of input or read failure.
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read from terminal");
                None
            }
        }
    }
}

fn flush() {
    let _ = io::stdout().flush();
}

impl<R: BufRead> UserPrompt for TerminalPrompt<R> {
    fn prompt_for_path(&mut self, default: &str) -> Option<String> {
        if !self.interactive {
            return Some(default.to_string());
        }

        println!("Enter the full path to where you want code-sync to sync to");
        print!("[{}]: ", default.dimmed());
        flush();

        let line = self.read_line()?;
        Some(if line.is_empty() {
            default.to_string()
        } else {
            line
        })
    }

    fn notify(&mut self, message: &str) {
        println!("{} {message}", "ℹ".blue().bold());
    }

    fn warn(&mut self, message: &str) {
        eprintln!("{} {message}", "⚠".yellow().bold());
    }

    fn pick_one(&mut self, title: &str, items: &[PickItem]) -> Option<usize> {
        if !self.interactive || items.is_empty() {
            return None;
        }

        println!("{}", title.bold());
        for (i, item) in items.iter().enumerate() {
            match item.description.as_deref().filter(|d| !d.is_empty()) {
                Some(description) => {
                    println!("  {:2}. {} {}", i + 1, item.label, description.dimmed());
                }
                None => println!("  {:2}. {}", i + 1, item.label),
            }
        }
        print!("Select [1-{}]: ", items.len());
        flush();

        let line = self.read_line()?;
        if let Ok(n) = line.parse::<usize>() {
            return (1..=items.len()).contains(&n).then(|| n - 1);
        }

        // Also accept the label itself
        items.iter().position(|item| item.label == line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn items() -> Vec<PickItem> {
        vec![
            PickItem::new("pub.a", Some("First".into())),
            PickItem::new("pub.b", None),
        ]
    }

    #[test]
    fn test_prompt_for_path() {
        let mut prompt = TerminalPrompt::new(Cursor::new("\n/custom/dir\n"), true);
        assert_eq!(prompt.prompt_for_path("/default").as_deref(), Some("/default"));
        assert_eq!(prompt.prompt_for_path("/default").as_deref(), Some("/custom/dir"));
        // End of input cancels
        assert_eq!(prompt.prompt_for_path("/default"), None);
    }

    #[test]
    fn test_non_interactive_uses_defaults() {
        let mut prompt = TerminalPrompt::new(Cursor::new(""), false);
        assert_eq!(prompt.prompt_for_path("/default").as_deref(), Some("/default"));
        assert_eq!(prompt.pick_one("Pick", &items()), None);
    }

    #[test]
    fn test_pick_one() {
        let mut prompt = TerminalPrompt::new(Cursor::new("2\npub.a\n9\n\n"), true);
        assert_eq!(prompt.pick_one("Pick", &items()), Some(1));
        assert_eq!(prompt.pick_one("Pick", &items()), Some(0));
        assert_eq!(prompt.pick_one("Pick", &items()), None);
        assert_eq!(prompt.pick_one("Pick", &items()), None);
        assert_eq!(prompt.pick_one("Pick", &[]), None);
    }
}
