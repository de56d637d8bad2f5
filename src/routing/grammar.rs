//! Route grammar and parser.
//!
//! # Responsibilities
//! - Parse one line of route syntax into a structured `Route`
//! - Decide the destination variant at parse time (never at dispatch)
//! - Batch-validate candidate route files for the management CLI
//!
//! # Design Decisions
//! - Hand-written tokenizing parser, no grammar engine
//! - Parsing is pure and total: no I/O, no side effects
//! - `SyntaxError` carries the offending line and token position
//!
//! Grammar:
//!
//! ```text
//! route        := source WS operator WS destination [WS munge_clause]
//! operator     := "->" | ">>" | "--"
//! source       := token                      ; no operator chars
//! pub_dest     := token                      ; operator "->"
//! kv_dest      := token ["." token]          ; operator ">>"
//! cmd_dest     := ["&"] token (WS token)*    ; operator "--"; "&" = nonblocking
//! munge_clause := "munge" WS rest-of-line    ; "->" and ">>" only
//! ```

use std::fmt;

use thiserror::Error;

/// The three route operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `->` publish the rendered text to a channel.
    Publish,
    /// `>>` write the rendered text to a key or hash field.
    SetValue,
    /// `--` invoke an external command.
    ShellCall,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Publish => "->",
            Operator::SetValue => ">>",
            Operator::ShellCall => "--",
        };
        f.write_str(symbol)
    }
}

/// Where a matched message goes. The variant is fixed by the parser;
/// dispatch code matches on this enum and never inspects strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Publish to a pub/sub channel.
    Channel(String),
    /// Write a key, or one field of a hash when `field` is set.
    Key { key: String, field: Option<String> },
    /// Invoke an external command. `blocking` is decided by the
    /// presence of the `&` prefix at parse time.
    Command {
        blocking: bool,
        program: String,
        args: Vec<String>,
    },
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Channel(channel) => f.write_str(channel),
            Destination::Key { key, field: None } => f.write_str(key),
            Destination::Key {
                key,
                field: Some(field),
            } => write!(f, "{key}.{field}"),
            Destination::Command {
                blocking,
                program,
                args,
            } => {
                if !*blocking {
                    f.write_str("&")?;
                }
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

/// One parsed route.
///
/// Invariant: `destination` is structurally consistent with
/// `operator` (`ShellCall` always carries a `Command`, and so on),
/// and `template` is only ever set for `Publish`/`SetValue` routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Channel pattern, matched verbatim against the inbound channel.
    pub source: String,
    pub operator: Operator,
    pub destination: Destination,
    /// Literal rewrite template from a `munge` clause.
    pub template: Option<String>,
}

impl fmt::Display for Route {
    /// Canonical rendering; re-parsing it yields an equal `Route`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source, self.operator, self.destination)?;
        if let Some(template) = &self.template {
            write!(f, " munge {template}")?;
        }
        Ok(())
    }
}

/// Malformed route text. Non-fatal everywhere: the router records it
/// per route and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error in {line:?} at token {position}: {message}")]
pub struct SyntaxError {
    /// The offending line, as given.
    pub line: String,
    /// Zero-based token position the parser stopped at.
    pub position: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(line: &str, position: usize, message: impl Into<String>) -> Self {
        Self {
            line: line.to_string(),
            position,
            message: message.into(),
        }
    }
}

const OPERATOR_TOKENS: [&str; 3] = ["->", ">>", "--"];

/// Parse one line of route syntax.
///
/// Pure and idempotent: the same text always yields a structurally
/// equal `Route` or the same `SyntaxError`.
pub fn parse(text: &str) -> Result<Route, SyntaxError> {
    let line = text.trim();
    if line.is_empty() {
        return Err(SyntaxError::new(text, 0, "empty route"));
    }

    // Tokens with byte offsets into `line`, so a munge clause can
    // recover the rest of the line verbatim.
    let tokens: Vec<(usize, &str)> = split_tokens(line);

    let (_, source) = tokens[0];
    if OPERATOR_TOKENS.iter().any(|op| source.contains(op)) {
        return Err(SyntaxError::new(line, 0, "source must not contain an operator"));
    }

    let Some(&(_, operator_token)) = tokens.get(1) else {
        return Err(SyntaxError::new(line, 1, "expected an operator after the source"));
    };
    let operator = match operator_token {
        "->" => Operator::Publish,
        ">>" => Operator::SetValue,
        "--" => Operator::ShellCall,
        other => {
            return Err(SyntaxError::new(
                line,
                1,
                format!("expected '->', '>>' or '--', found {other:?}"),
            ));
        }
    };

    if tokens.len() < 3 {
        return Err(SyntaxError::new(line, 2, "missing destination"));
    }

    match operator {
        Operator::Publish => {
            let channel = destination_token(line, &tokens, 2)?;
            let template = munge_template(line, &tokens, 3)?;
            Ok(Route {
                source: source.to_string(),
                operator,
                destination: Destination::Channel(channel.to_string()),
                template,
            })
        }
        Operator::SetValue => {
            let target = destination_token(line, &tokens, 2)?;
            let destination = match target.split_once('.') {
                None => Destination::Key {
                    key: target.to_string(),
                    field: None,
                },
                Some((key, field)) => {
                    if key.is_empty() || field.is_empty() {
                        return Err(SyntaxError::new(
                            line,
                            2,
                            format!("expected 'key' or 'key.field', found {target:?}"),
                        ));
                    }
                    Destination::Key {
                        key: key.to_string(),
                        field: Some(field.to_string()),
                    }
                }
            };
            let template = munge_template(line, &tokens, 3)?;
            Ok(Route {
                source: source.to_string(),
                operator,
                destination,
                template,
            })
        }
        Operator::ShellCall => {
            let mut rest = tokens[2..].iter().map(|&(_, t)| t);
            let first = rest.next().unwrap_or_default();
            let (blocking, program) = if let Some(stripped) = first.strip_prefix('&') {
                (false, stripped)
            } else {
                (true, first)
            };
            if program.is_empty() {
                return Err(SyntaxError::new(line, 2, "missing program name"));
            }
            if OPERATOR_TOKENS.contains(&program) {
                return Err(SyntaxError::new(line, 2, "program name must not be an operator"));
            }
            Ok(Route {
                source: source.to_string(),
                operator,
                destination: Destination::Command {
                    blocking,
                    program: program.to_string(),
                    args: rest.map(str::to_string).collect(),
                },
                template: None,
            })
        }
    }
}

fn split_tokens(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    for token in line.split_whitespace() {
        // split_whitespace walks left to right, so searching from the
        // running offset always finds this occurrence.
        let at = line[offset..].find(token).unwrap_or(0) + offset;
        tokens.push((at, token));
        offset = at + token.len();
    }
    tokens
}

fn destination_token<'a>(
    line: &str,
    tokens: &[(usize, &'a str)],
    index: usize,
) -> Result<&'a str, SyntaxError> {
    let (_, token) = tokens[index];
    if OPERATOR_TOKENS.contains(&token) {
        return Err(SyntaxError::new(line, index, "destination must not be an operator"));
    }
    Ok(token)
}

/// Parse the optional trailing `munge <rest-of-line>` clause starting
/// at `index`. Anything else trailing is an error.
fn munge_template(
    line: &str,
    tokens: &[(usize, &str)],
    index: usize,
) -> Result<Option<String>, SyntaxError> {
    let Some(&(at, keyword)) = tokens.get(index) else {
        return Ok(None);
    };
    if keyword != "munge" {
        return Err(SyntaxError::new(
            line,
            index,
            format!("unexpected trailing token {keyword:?}"),
        ));
    }
    let template = line[at + keyword.len()..].trim_start();
    if template.is_empty() {
        return Err(SyntaxError::new(line, index, "munge clause requires a template"));
    }
    Ok(Some(template.to_string()))
}

/// Result of validating a batch of candidate route lines.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub passed: usize,
    pub failed: usize,
    /// The lines that failed, with their parse errors.
    pub failures: Vec<(String, SyntaxError)>,
}

/// Run the parser over a batch of candidate lines, reporting counts
/// without raising. Blank lines and `#` comments are skipped.
pub fn validate_lines<'a, I>(lines: I) -> ValidationReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = ValidationReport::default();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse(line) {
            Ok(_) => report.passed += 1,
            Err(err) => {
                report.failed += 1;
                report.failures.push((line.to_string(), err));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_publish() {
        let route = parse("a/b -> c/d").unwrap();
        assert_eq!(route.source, "a/b");
        assert_eq!(route.operator, Operator::Publish);
        assert_eq!(route.destination, Destination::Channel("c/d".to_string()));
        assert_eq!(route.template, None);
    }

    #[test]
    fn test_parse_set_value_bare_key() {
        let route = parse("sensors/temp >> last_reading").unwrap();
        assert_eq!(
            route.destination,
            Destination::Key {
                key: "last_reading".to_string(),
                field: None,
            }
        );
    }

    #[test]
    fn test_parse_set_value_key_field() {
        let route = parse("a/b >> mykey.field1").unwrap();
        assert_eq!(
            route.destination,
            Destination::Key {
                key: "mykey".to_string(),
                field: Some("field1".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_blocking_command() {
        let route = parse("doorbell -- aplay /srv/chime.wav").unwrap();
        assert_eq!(
            route.destination,
            Destination::Command {
                blocking: true,
                program: "aplay".to_string(),
                args: vec!["/srv/chime.wav".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_nonblocking_command() {
        let route = parse("doorbell -- &aplay /srv/chime.wav").unwrap();
        match route.destination {
            Destination::Command { blocking, .. } => assert!(!blocking),
            other => panic!("unexpected destination: {other:?}"),
        }
    }

    #[test]
    fn test_parse_munge_clause() {
        let route = parse("a/b -> c/d munge got: $message from $channel").unwrap();
        assert_eq!(
            route.template.as_deref(),
            Some("got: $message from $channel")
        );
    }

    #[test]
    fn test_munge_preserves_inner_whitespace() {
        let route = parse("a/b >> k munge {\"v\":  \"$message\"}").unwrap();
        assert_eq!(route.template.as_deref(), Some("{\"v\":  \"$message\"}"));
    }

    #[test]
    fn test_malformed_lines() {
        for line in [
            "",
            "   ",
            "foo ~~ bar",
            "a/b ->",
            "a/b",
            "a/b -> c d",
            "a/b >> .field",
            "a/b >> key.",
            "a/b -- & ",
            "a->b -> c",
            "a/b -> >>",
            "a/b -> c munge",
        ] {
            assert!(parse(line).is_err(), "expected parse failure for {line:?}");
        }
    }

    #[test]
    fn test_parse_is_idempotent() {
        for line in [
            "a/b -> c/d",
            "a/b >> mykey.field1",
            "x -- rm -rf /",
            "a/b -> c/d munge $message!",
        ] {
            assert_eq!(parse(line).unwrap(), parse(line).unwrap());
        }
    }

    #[test]
    fn test_canonical_rendering_reparses_equal() {
        for line in [
            "a/b -> c/d",
            "a/b  >>   mykey.field1",
            "doorbell -- &aplay /srv/chime.wav loud",
            "a/b -> c/d munge v: $message",
        ] {
            let route = parse(line).unwrap();
            assert_eq!(parse(&route.to_string()).unwrap(), route);
        }
    }

    #[test]
    fn test_error_reports_position() {
        let err = parse("foo ~~ bar").unwrap_err();
        assert_eq!(err.position, 1);
        assert_eq!(err.line, "foo ~~ bar");
    }

    #[test]
    fn test_validate_lines_counts() {
        let report = validate_lines(vec![
            "# comment",
            "",
            "a/b -> c/d",
            "broken ~~ line",
            "x >> key.field",
        ]);
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].0, "broken ~~ line");
    }
}
