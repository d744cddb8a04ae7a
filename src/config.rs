//! Config-file loader (§6): the collaborator that turns a values file into
//! a [`ParamDict`] the driver can feed to `set_attributes`.
//!
//! Grammar:
//! - blank and `#`-prefixed lines are ignored
//! - `NAME = VALUE`, both sides trimmed; a trailing `\` continues the value
//!   onto the next raw line, joined by a single space
//! - `NAME =>>` ... `<<` multiline entries, body taken verbatim minus the
//!   leading/trailing newline
//! - duplicate keys accumulate as multi-values, in the order encountered

use crate::dict::ParamDict;
use crate::error::MistError;

pub fn parse_config(source: &str) -> Result<ParamDict, MistError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut dict = ParamDict::new();
    let mut i = 0usize;

    while i < lines.len() {
        let line_no = i + 1;
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }

        let eq = trimmed.find('=').ok_or_else(|| {
            MistError::ConfigSyntax {
                message: format!("expected 'NAME = VALUE', found '{trimmed}'"),
                line: line_no,
            }
        })?;

        let name = trimmed[..eq].trim().to_string();
        if name.is_empty() {
            return Err(MistError::ConfigSyntax {
                message: "empty parameter name".to_string(),
                line: line_no,
            });
        }
        let rhs = trimmed[eq + 1..].trim_start();
        i += 1;

        if rhs.trim_end() == ">>" {
            let (value, next) = read_multiline_body(&lines, i, line_no)?;
            dict.insert(name, value);
            i = next;
        } else {
            let (value, next) = read_continued_value(&lines, rhs, i, line_no)?;
            dict.insert(name, value);
            i = next;
        }
    }

    Ok(dict)
}

fn read_continued_value(
    lines: &[&str],
    first_rhs: &str,
    mut i: usize,
    start_line: usize,
) -> Result<(String, usize), MistError> {
    let mut value = first_rhs.trim_end().to_string();
    loop {
        match value.strip_suffix('\\') {
            Some(stripped) => {
                if i >= lines.len() {
                    return Err(MistError::ConfigSyntax {
                        message: "continuation '\\' with no following line".to_string(),
                        line: start_line,
                    });
                }
                let cont = lines[i].trim();
                value = format!("{} {}", stripped.trim_end(), cont);
                i += 1;
            }
            None => break,
        }
    }
    Ok((value.trim().to_string(), i))
}

fn read_multiline_body(
    lines: &[&str],
    mut i: usize,
    start_line: usize,
) -> Result<(String, usize), MistError> {
    let mut body_lines = Vec::new();
    loop {
        if i >= lines.len() {
            return Err(MistError::ConfigSyntax {
                message: "multiline entry never closed with '<<'".to_string(),
                line: start_line,
            });
        }
        if lines[i].trim() == "<<" {
            i += 1;
            break;
        }
        body_lines.push(lines[i]);
        i += 1;
    }
    Ok((body_lines.join("\n"), i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_blank_and_comment_lines() {
        let dict = parse_config("\n# comment\nA = 1\n").unwrap();
        assert_eq!(dict.values_of("A").collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn trims_both_sides() {
        let dict = parse_config("  NAME   =   value with spaces  \n").unwrap();
        assert_eq!(dict.values_of("NAME").collect::<Vec<_>>(), vec!["value with spaces"]);
    }

    #[test]
    fn joins_continuation_lines_with_a_single_space() {
        let dict = parse_config("A = one \\\ntwo \\\nthree\n").unwrap();
        assert_eq!(dict.values_of("A").collect::<Vec<_>>(), vec!["one two three"]);
    }

    #[test]
    fn parses_multiline_entry_verbatim() {
        let dict = parse_config("BODY =>>\n  line1\n  line2\n<<\n").unwrap();
        assert_eq!(
            dict.values_of("BODY").collect::<Vec<_>>(),
            vec!["  line1\n  line2"]
        );
    }

    #[test]
    fn duplicate_keys_accumulate_in_order() {
        let dict = parse_config("P = a\nP = b\n").unwrap();
        assert_eq!(dict.values_of("P").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn unclosed_multiline_is_an_error() {
        let err = parse_config("BODY =>>\nline1\n").unwrap_err();
        assert!(matches!(err, MistError::ConfigSyntax { .. }));
    }
}
