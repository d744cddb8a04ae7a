//! Splits a template source string into literal chunks and placeholder bodies.
//!
//! The lexer knows nothing about placeholder *semantics* (plain/join/if);
//! it only finds marker pairs and classifies the body enough for the parser
//! to dispatch on. Token stream invariant: always starts and ends with a
//! `Literal`, strictly alternating `Literal, Placeholder, Literal, ...`.

use crate::error::MistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Plain(String),
    If(String),
    Else,
    Endif,
}

/// A token plus the source line it starts on, used for parser diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

fn line_at(src: &str, byte_pos: usize) -> usize {
    src.as_bytes()[..byte_pos.min(src.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Tokenize `src` using `begin`/`end` as the placeholder markers.
pub fn tokenize(src: &str, begin: &str, end: &str) -> Result<Vec<Spanned>, MistError> {
    assert!(!begin.is_empty() && !end.is_empty());

    let mut tokens = Vec::new();
    let mut pos = 0usize;

    loop {
        match src[pos..].find(begin) {
            Some(rel_start) => {
                let marker_start = pos + rel_start;

                // A stray end marker inside the literal region means there was
                // no opening marker for it.
                if let Some(rel_end) = src[pos..marker_start].find(end) {
                    let at = pos + rel_end;
                    return Err(MistError::syntax_with_excerpt(
                        "no matching begin marker",
                        line_at(src, at),
                        MistError::truncate_excerpt(&src[at..], 20),
                    ));
                }

                tokens.push(Spanned {
                    token: Token::Literal(src[pos..marker_start].to_string()),
                    line: line_at(src, pos),
                });

                let body_start = marker_start + begin.len();
                let body_end = match src[body_start..].find(end) {
                    Some(rel) => body_start + rel,
                    None => {
                        return Err(MistError::syntax_with_excerpt(
                            "no matching end marker",
                            line_at(src, marker_start),
                            MistError::truncate_excerpt(&src[marker_start..], 20),
                        ))
                    }
                };

                let body = &src[body_start..body_end];
                if body.contains(begin) {
                    return Err(MistError::syntax_with_excerpt(
                        "nested begin marker inside placeholder",
                        line_at(src, marker_start),
                        MistError::truncate_excerpt(body, 20),
                    ));
                }
                if body.trim().is_empty() {
                    return Err(MistError::syntax_with_excerpt(
                        "invalid placeholder",
                        line_at(src, marker_start),
                        MistError::truncate_excerpt(&src[marker_start..body_end + end.len()], 20),
                    ));
                }

                tokens.push(Spanned {
                    token: classify(body),
                    line: line_at(src, marker_start),
                });
                pos = body_end + end.len();
            }
            None => {
                if let Some(rel_end) = src[pos..].find(end) {
                    let at = pos + rel_end;
                    return Err(MistError::syntax_with_excerpt(
                        "no matching begin marker",
                        line_at(src, at),
                        MistError::truncate_excerpt(&src[at..], 20),
                    ));
                }
                tokens.push(Spanned {
                    token: Token::Literal(src[pos..].to_string()),
                    line: line_at(src, pos),
                });
                break;
            }
        }
    }

    Ok(tokens)
}

fn classify(body: &str) -> Token {
    let trimmed = body.trim();
    if let Some(rest) = trimmed.strip_prefix("if") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Token::If(rest.trim().to_string());
        }
    }
    if trimmed == "else" {
        return Token::Else;
    }
    if trimmed == "endif" {
        return Token::Endif;
    }
    Token::Plain(body.to_string())
}
