//! Crate-wide error type.
//!
//! Every fallible operation in this crate funnels through [`MistError`],
//! matching the engine's error taxonomy: resource exhaustion is left to the
//! platform (allocation failure aborts rather than returning a `Result` in
//! Rust — see DESIGN.md), input-syntax errors carry a line number, semantic
//! errors name the offending template, and boundary errors wrap the
//! underlying I/O or configuration failure.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MistError {
    #[error(
        "{message} at line {line}{}",
        excerpt.as_deref().map(|e| format!(": `{e}`")).unwrap_or_default()
    )]
    Syntax {
        message: String,
        line: usize,
        excerpt: Option<String>,
    },

    #[error("invalid template name '{name}'")]
    InvalidName { name: String },

    #[error("main template '{name}' not found in group")]
    MissingMainTemplate { name: String },

    #[error("placeholder refers to unresolved template '{name}'")]
    UnresolvedReference { name: String },

    #[error("expected a single value, got {count}")]
    MainMultiValued { count: usize },

    #[error("no template files found in {}", dir.display())]
    NoTemplateFiles { dir: PathBuf },

    #[error("duplicate parameter '{name}' at line {line}")]
    DuplicateParam { name: String, line: usize },

    #[error("missing required parameter '{name}'")]
    MissingParam { name: String },

    #[error("{message} at line {line}")]
    ConfigSyntax { message: String, line: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

impl MistError {
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        MistError::Syntax {
            message: message.into(),
            line,
            excerpt: None,
        }
    }

    pub fn syntax_with_excerpt(
        message: impl Into<String>,
        line: usize,
        excerpt: impl Into<String>,
    ) -> Self {
        MistError::Syntax {
            message: message.into(),
            line,
            excerpt: Some(excerpt.into()),
        }
    }

    /// Shorten `text` to at most `max_chars` characters for use as a syntax
    /// error's excerpt, appending `...` when truncated and escaping newlines
    /// so the excerpt (and the single-line error message it's embedded in,
    /// spec §6) can never span more than one line. Operates on `char`s so
    /// multi-byte UTF-8 text is never split mid-character.
    pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
        let mut chars = text.chars();
        let head: String = chars
            .by_ref()
            .take(max_chars)
            .map(|c| match c {
                '\n' => "\\n".to_string(),
                '\r' => "\\r".to_string(),
                other => other.to_string(),
            })
            .collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }

    /// Line number carried by this error, if any — used by the CLI to print `:<line>`.
    pub fn line(&self) -> Option<usize> {
        match self {
            MistError::Syntax { line, .. } => Some(*line),
            MistError::DuplicateParam { line, .. } => Some(*line),
            MistError::ConfigSyntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type MistResult<T> = Result<T, MistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_without_excerpt_has_no_trailing_colon() {
        let err = MistError::syntax("invalid placeholder", 3);
        assert_eq!(format!("{err}"), "invalid placeholder at line 3");
    }

    #[test]
    fn syntax_with_excerpt_appends_it() {
        let err = MistError::syntax_with_excerpt("invalid placeholder", 3, "<$  $>");
        assert_eq!(
            format!("{err}"),
            "invalid placeholder at line 3: `<$  $>`"
        );
    }

    #[test]
    fn truncate_excerpt_leaves_short_text_untouched() {
        assert_eq!(MistError::truncate_excerpt("abc", 20), "abc");
    }

    #[test]
    fn truncate_excerpt_adds_ellipsis_when_too_long() {
        assert_eq!(MistError::truncate_excerpt("abcdef", 3), "abc...");
    }

    #[test]
    fn truncate_excerpt_escapes_newlines() {
        assert_eq!(MistError::truncate_excerpt("a\nb", 10), "a\\nb");
    }
}
