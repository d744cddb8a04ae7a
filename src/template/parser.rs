//! Recursive-descent parser: token stream -> tree of literal chunks and
//! placeholder nodes.
//!
//! Grammar (see spec):
//! ```text
//! template    := LITERAL ( ph_expr LITERAL )*     // ends at ELSE/ENDIF or EOF
//! ph_expr     := conditional | placeholder
//! placeholder := PLAIN( expr )                    // plain or join
//! conditional := IF( expr ) template (ELSE template)? ENDIF
//! ```

use crate::error::MistError;
use crate::template::lexer::{tokenize, Spanned, Token};

/// An unlinked template tree: chunks interleaved with placeholder nodes.
/// `chunks.len() == placeholders.len() + 1`.
#[derive(Debug, Clone)]
pub struct RawTemplate {
    pub chunks: Vec<String>,
    pub placeholders: Vec<RawPlaceholder>,
}

#[derive(Debug, Clone)]
pub enum RawPlaceholder {
    Plain { name: String },
    Join { name: String, sep: String },
    Conditional {
        cond_name: String,
        is_concat: bool,
        then_branch: RawTemplate,
        else_branch: RawTemplate,
    },
}

/// Validate a template/attribute name per the data model's character rules.
pub fn validate_name(name: &str, line: usize) -> Result<(), MistError> {
    if name.is_empty() {
        return Err(MistError::syntax("invalid placeholder", line));
    }
    let first = name.chars().next().unwrap();
    if first == '.' || first.is_whitespace() {
        return Err(MistError::syntax_with_excerpt(
            format!("invalid name '{name}': must not start with '.' or space"),
            line,
            MistError::truncate_excerpt(name, 20),
        ));
    }
    // ASCII-only, matching the original engine's `ch_allowed` table, which
    // explicitly rejects any byte >= 0x7F.
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '.' || c == '_')
    {
        return Err(MistError::syntax_with_excerpt(
            format!("invalid name '{name}'"),
            line,
            MistError::truncate_excerpt(name, 20),
        ));
    }
    Ok(())
}

fn unescape_separator(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('t') => {
                    out.push('\t');
                    chars.next();
                }
                Some('n') => {
                    out.push('\n');
                    chars.next();
                }
                Some('r') => {
                    out.push('\r');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse the body of a plain/join token: `name` or `name: join(sep)`.
fn parse_plain_expr(body: &str, line: usize) -> Result<RawPlaceholder, MistError> {
    let trimmed = body.trim();
    if let Some(colon) = trimmed.find(':') {
        let name = trimmed[..colon].trim();
        let rest = trimmed[colon + 1..].trim();
        let rest = rest.strip_prefix("join").ok_or_else(|| {
            MistError::syntax_with_excerpt(
                format!("invalid placeholder expression '{body}'"),
                line,
                MistError::truncate_excerpt(body, 20),
            )
        })?;
        let rest = rest.trim_start();
        let rest = rest.strip_prefix('(').ok_or_else(|| {
            MistError::syntax_with_excerpt(
                "expected '(' after join",
                line,
                MistError::truncate_excerpt(body, 20),
            )
        })?;
        let close = rest.rfind(')').ok_or_else(|| {
            MistError::syntax_with_excerpt(
                "expected ')' to close join(...)",
                line,
                MistError::truncate_excerpt(body, 20),
            )
        })?;
        let sep_raw = &rest[..close];
        validate_name(name, line)?;
        Ok(RawPlaceholder::Join {
            name: name.to_string(),
            sep: unescape_separator(sep_raw),
        })
    } else {
        validate_name(trimmed, line)?;
        Ok(RawPlaceholder::Plain {
            name: trimmed.to_string(),
        })
    }
}

/// Parse the body of an `if` token: bare name or `concat(name)`.
fn parse_cond_expr(body: &str, line: usize) -> Result<(String, bool), MistError> {
    let trimmed = body.trim();
    if let Some(rest) = trimmed.strip_prefix("concat") {
        let rest = rest.trim_start();
        let rest = rest.strip_prefix('(').ok_or_else(|| {
            MistError::syntax_with_excerpt(
                "expected '(' after concat",
                line,
                MistError::truncate_excerpt(body, 20),
            )
        })?;
        let rest = rest.strip_suffix(')').ok_or_else(|| {
            MistError::syntax_with_excerpt(
                "expected ')' to close concat(...)",
                line,
                MistError::truncate_excerpt(body, 20),
            )
        })?;
        let name = rest.trim();
        validate_name(name, line)?;
        Ok((name.to_string(), true))
    } else {
        validate_name(trimmed, line)?;
        Ok((trimmed.to_string(), false))
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    /// Parse a `template` production, stopping before a top-level ELSE/ENDIF
    /// or at end of input.
    fn parse_template(&mut self) -> Result<RawTemplate, MistError> {
        let mut chunks = Vec::new();
        let mut placeholders = Vec::new();

        let first = self.next().ok_or_else(|| {
            MistError::syntax("unexpected end of template", 0)
        })?;
        let mut last_literal = match first.token {
            Token::Literal(text) => text,
            other => {
                return Err(MistError::syntax_with_excerpt(
                    format!("expected literal chunk, found {other:?}"),
                    first.line,
                    MistError::truncate_excerpt(&format!("{other:?}"), 20),
                ))
            }
        };

        loop {
            match self.peek() {
                None => {
                    chunks.push(last_literal);
                    break;
                }
                Some(spanned) => match &spanned.token {
                    Token::Else | Token::Endif => {
                        chunks.push(last_literal);
                        break;
                    }
                    _ => {
                        chunks.push(std::mem::take(&mut last_literal));
                        let ph = self.parse_ph_expr()?;
                        placeholders.push(ph);

                        let lit = self.next().ok_or_else(|| {
                            MistError::syntax("unexpected end of template", 0)
                        })?;
                        last_literal = match lit.token {
                            Token::Literal(text) => text,
                            other => {
                                return Err(MistError::syntax_with_excerpt(
                                    format!("expected literal chunk, found {other:?}"),
                                    lit.line,
                                    MistError::truncate_excerpt(&format!("{other:?}"), 20),
                                ))
                            }
                        };
                    }
                },
            }
        }

        Ok(RawTemplate {
            chunks,
            placeholders,
        })
    }

    fn parse_ph_expr(&mut self) -> Result<RawPlaceholder, MistError> {
        let spanned = self.next().expect("caller checked peek");
        match spanned.token {
            Token::Plain(body) => parse_plain_expr(&body, spanned.line),
            Token::If(body) => self.parse_conditional(&body, spanned.line),
            Token::Else => Err(MistError::syntax_with_excerpt(
                "else without if",
                spanned.line,
                "else",
            )),
            Token::Endif => Err(MistError::syntax_with_excerpt(
                "endif without if",
                spanned.line,
                "endif",
            )),
            Token::Literal(_) => unreachable!("caller only dispatches on non-literal tokens"),
        }
    }

    fn parse_conditional(&mut self, body: &str, if_line: usize) -> Result<RawPlaceholder, MistError> {
        let (cond_name, is_concat) = parse_cond_expr(body, if_line)?;

        let then_branch = self.parse_template()?;

        let else_branch = match self.peek().map(|s| &s.token) {
            Some(Token::Else) => {
                self.next();
                let branch = self.parse_template()?;
                match self.peek().map(|s| &s.token) {
                    Some(Token::Endif) => {
                        self.next();
                        branch
                    }
                    _ => {
                        return Err(MistError::syntax_with_excerpt(
                            "else without endif",
                            if_line,
                            format!("if {}", MistError::truncate_excerpt(body, 20)),
                        ))
                    }
                }
            }
            Some(Token::Endif) => {
                self.next();
                RawTemplate {
                    chunks: vec![String::new()],
                    placeholders: vec![],
                }
            }
            _ => {
                return Err(MistError::syntax_with_excerpt(
                    "if without endif",
                    if_line,
                    format!("if {}", MistError::truncate_excerpt(body, 20)),
                ))
            }
        };

        Ok(RawPlaceholder::Conditional {
            cond_name,
            is_concat,
            then_branch,
            else_branch,
        })
    }
}

/// Parse a full template source string into a [`RawTemplate`].
pub fn parse(src: &str, begin: &str, end: &str) -> Result<RawTemplate, MistError> {
    let tokens = tokenize(src, begin, end)?;
    let mut parser = Parser { tokens, pos: 0 };
    let tpl = parser.parse_template()?;
    if let Some(spanned) = parser.peek() {
        let (message, excerpt) = match &spanned.token {
            Token::Else => ("else without if".to_string(), "else".to_string()),
            Token::Endif => ("endif without if".to_string(), "endif".to_string()),
            other => (
                format!("unexpected {other:?} at top level"),
                MistError::truncate_excerpt(&format!("{other:?}"), 20),
            ),
        };
        return Err(MistError::syntax_with_excerpt(message, spanned.line, excerpt));
    }
    Ok(tpl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_placeholder() {
        let tpl = parse("ab<$P1$>cd", "<$", "$>").unwrap();
        assert_eq!(tpl.chunks, vec!["ab", "cd"]);
        assert_eq!(tpl.placeholders.len(), 1);
        assert!(matches!(
            &tpl.placeholders[0],
            RawPlaceholder::Plain { name } if name == "P1"
        ));
    }

    #[test]
    fn parses_join_with_escaped_separator() {
        let tpl = parse(r"<$M: join(\n)$>", "<$", "$>").unwrap();
        match &tpl.placeholders[0] {
            RawPlaceholder::Join { name, sep } => {
                assert_eq!(name, "M");
                assert_eq!(sep, "\n");
            }
            _ => panic!("expected join"),
        }
    }

    #[test]
    fn parses_empty_join_separator() {
        let tpl = parse("<$M: join()$>", "<$", "$>").unwrap();
        match &tpl.placeholders[0] {
            RawPlaceholder::Join { sep, .. } => assert_eq!(sep, ""),
            _ => panic!("expected join"),
        }
    }

    #[test]
    fn parses_conditional_with_else() {
        let tpl = parse("<$if C$>yes<$else$>no<$endif$>", "<$", "$>").unwrap();
        match &tpl.placeholders[0] {
            RawPlaceholder::Conditional {
                cond_name,
                is_concat,
                then_branch,
                else_branch,
            } => {
                assert_eq!(cond_name, "C");
                assert!(!is_concat);
                assert_eq!(then_branch.chunks, vec!["yes"]);
                assert_eq!(else_branch.chunks, vec!["no"]);
            }
            _ => panic!("expected conditional"),
        }
    }

    #[test]
    fn synthesizes_missing_else() {
        let tpl = parse("<$if C$>yes<$endif$>", "<$", "$>").unwrap();
        match &tpl.placeholders[0] {
            RawPlaceholder::Conditional { else_branch, .. } => {
                assert_eq!(else_branch.chunks, vec![""]);
                assert!(else_branch.placeholders.is_empty());
            }
            _ => panic!("expected conditional"),
        }
    }

    #[test]
    fn parses_concat_conditional() {
        let tpl = parse("<$if concat(C)$>Y<$else$>N<$endif$>", "<$", "$>").unwrap();
        match &tpl.placeholders[0] {
            RawPlaceholder::Conditional {
                cond_name,
                is_concat,
                ..
            } => {
                assert_eq!(cond_name, "C");
                assert!(is_concat);
            }
            _ => panic!("expected conditional"),
        }
    }

    #[test]
    fn if_without_endif_is_an_error() {
        let err = parse("<$if C$>yes", "<$", "$>").unwrap_err();
        assert!(format!("{err}").contains("if without endif"));
    }

    #[test]
    fn else_without_endif_is_an_error() {
        // Stray ELSE at top level with no enclosing IF.
        let err = parse("ab<$else$>cd", "<$", "$>").unwrap_err();
        assert!(format!("{err}").contains("else without if"));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let err = parse("<$.bad$>", "<$", "$>").unwrap_err();
        assert!(format!("{err}").contains("invalid name"));
    }

    #[test]
    fn syntax_errors_carry_an_excerpt() {
        let err = parse("<$.bad$>", "<$", "$>").unwrap_err();
        assert!(matches!(err, MistError::Syntax { excerpt: Some(_), .. }));
        assert!(format!("{err}").contains("`.bad`"));
    }

    #[test]
    fn non_ascii_name_is_rejected() {
        // The original engine's name-validation table is ASCII-only.
        let err = parse("<$caf\u{e9}$>", "<$", "$>").unwrap_err();
        assert!(format!("{err}").contains("invalid name"));
    }

    #[test]
    fn join_rejected_inside_if() {
        // Grammar disallows join() in an IF-token; "join" simply doesn't
        // parse as a bare name or concat(...), so it's a syntax error.
        let err = parse("<$if M: join(,)$>x<$endif$>", "<$", "$>").unwrap_err();
        assert!(matches!(err, MistError::Syntax { .. }));
    }
}
