// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Scalar parsing and classification.

use crate::error::{ErrorKind, ParseError};
use crate::span::Span;
use crate::value::{Node, Scalar, Value};

use super::Parser;

impl Parser {
    /// Parse a scalar. In flow context the scalar additionally stops at
    /// `,`, `[`, `]`, `{` and `}`.
    pub(crate) fn parse_scalar(&mut self, in_flow: bool) -> Result<Node, ParseError> {
        let pres = self.take_next_pres();
        let start = self.position();

        if self.peek_byte() == Some(b'"') {
            let content = self.parse_quoted_string()?;
            let mut node = Node {
                span: Span::new(start, self.position()),
                presentation: pres,
                value: Value::Scalar(Scalar::String(content)),
                ..Node::default()
            };
            self.finish_node(&mut node);
            if let Value::Scalar(Scalar::String(s)) = &node.value {
                let literal = s.clone();
                self.register_variables(&literal, true);
            }
            return Ok(node);
        }

        let line = self.take_scalar_text(in_flow);
        if line.is_empty() {
            return Err(self.err_here(ErrorKind::MissingData, "unexpected character"));
        }

        let scalar = classify_scalar(&line);
        let is_string = matches!(scalar, Scalar::String(_));
        let mut node = Node {
            span: Span::new(start, self.position()),
            presentation: pres,
            value: Value::Scalar(scalar),
            ..Node::default()
        };
        self.finish_node(&mut node);
        if is_string {
            self.register_variables(&line, false);
        }
        Ok(node)
    }

    /// Consume unquoted scalar text up to the next delimiter, trimming
    /// trailing spaces. The cursor is left at the trimmed end so the trim
    /// routine accounts for what follows.
    fn take_scalar_text(&mut self, in_flow: bool) -> String {
        let (text, consumed) = {
            let rest = self.rest();
            let mut end = 0;
            while end < rest.len() {
                let c = rest[end];
                let stop = match c {
                    b'\n' | b'#' => true,
                    b',' | b'[' | b']' | b'{' | b'}' => in_flow,
                    _ => false,
                };
                if stop {
                    break;
                }
                end += 1;
            }
            let raw = &self.text()[self.pos..self.pos + end];
            let trimmed = raw.trim_end();
            (trimmed.to_owned(), trimmed.len())
        };
        self.pos += consumed;
        text
    }

    /// Parse a double-quoted string. The cursor sits on the opening quote.
    fn parse_quoted_string(&mut self) -> Result<String, ParseError> {
        self.advance_byte(); // '"'
        let err_pos = self.position();

        let mut buf = String::new();
        loop {
            match self.peek_byte() {
                None => {
                    return Err(self.err_at(
                        &Span::char_at(err_pos),
                        ErrorKind::ExpectedString,
                        "missing closing '\"'",
                    ));
                }
                Some(b'"') => {
                    self.advance_byte();
                    break;
                }
                Some(b'\n') => {
                    buf.push('\n');
                    self.advance_line();
                }
                Some(b'\\') => {
                    self.advance_byte();
                    let c = match self.peek_byte() {
                        Some(b'"') => '"',
                        Some(b'\\') => '\\',
                        Some(b'a') => '\x07',
                        Some(b'b') => '\x08',
                        Some(b'e') => '\x1b',
                        Some(b'f') => '\x0c',
                        Some(b'n') => '\n',
                        Some(b'r') => '\r',
                        Some(b't') => '\t',
                        Some(b'v') => '\x0b',
                        Some(b'u') => {
                            self.advance_byte();
                            let c = self.parse_unicode_escape(err_pos)?;
                            buf.push(c);
                            continue;
                        }
                        _ => {
                            return Err(self.err_at(
                                &Span::char_at(err_pos),
                                ErrorKind::ExpectedString,
                                "invalid backslash",
                            ));
                        }
                    };
                    buf.push(c);
                    self.advance_byte();
                }
                Some(c) if c < 0x80 => {
                    buf.push(c as char);
                    self.advance_byte();
                }
                Some(_) => {
                    // Multi-byte UTF-8 sequence; input was validated on
                    // attachment.
                    if let Some(ch) = self.text()[self.pos..].chars().next() {
                        buf.push(ch);
                        self.pos += ch.len_utf8();
                    }
                }
            }
        }

        Ok(buf)
    }

    fn parse_unicode_escape(&mut self, err_pos: crate::span::Position) -> Result<char, ParseError> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let digit = self
                .peek_byte()
                .and_then(|c| (c as char).to_digit(16));
            match digit {
                Some(d) => {
                    value = value * 16 + d;
                    self.advance_byte();
                }
                None => {
                    return Err(self.err_at(
                        &Span::char_at(err_pos),
                        ErrorKind::ExpectedString,
                        "invalid backslash",
                    ));
                }
            }
        }
        char::from_u32(value).ok_or_else(|| {
            self.err_at(
                &Span::char_at(err_pos),
                ErrorKind::ExpectedString,
                "invalid backslash",
            )
        })
    }
}

/// Classify trimmed scalar text.
///
/// Order matters: special spellings first, then signed integers (negative
/// only; `-0` reclassifies to unsigned), unsigned integers, doubles, and
/// finally strings.
pub(crate) fn classify_scalar(line: &str) -> Scalar {
    if let Some(scalar) = parse_special_scalar(line) {
        return scalar;
    }
    if let Some(scalar) = parse_numeric_scalar(line) {
        return scalar;
    }
    Scalar::String(line.to_owned())
}

fn parse_special_scalar(line: &str) -> Option<Scalar> {
    if line == "~" || line.eq_ignore_ascii_case("null") {
        return Some(Scalar::Null);
    }
    if line.eq_ignore_ascii_case("true") {
        return Some(Scalar::Bool(true));
    }
    if line.eq_ignore_ascii_case("false") {
        return Some(Scalar::Bool(false));
    }
    if line.eq_ignore_ascii_case("-.inf") {
        return Some(Scalar::Double(f64::NEG_INFINITY));
    }
    if line.eq_ignore_ascii_case(".inf") {
        return Some(Scalar::Double(f64::INFINITY));
    }
    if line.eq_ignore_ascii_case(".nan") {
        return Some(Scalar::Double(f64::NAN));
    }
    None
}

fn parse_numeric_scalar(line: &str) -> Option<Scalar> {
    if line.starts_with('-') {
        if let Ok(i) = line.parse::<i64>() {
            // `-0` parses to a non-negative value; keep Int for < 0 only.
            return Some(if i >= 0 {
                Scalar::UInt(i as u64)
            } else {
                Scalar::Int(i)
            });
        }
    } else if let Ok(u) = line.parse::<u64>() {
        return Some(Scalar::UInt(u));
    }

    line.parse::<f64>().ok().map(Scalar::Double)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_special() {
        assert_eq!(classify_scalar("~"), Scalar::Null);
        assert_eq!(classify_scalar("NULL"), Scalar::Null);
        assert_eq!(classify_scalar("true"), Scalar::Bool(true));
        assert_eq!(classify_scalar("FALSE"), Scalar::Bool(false));
        assert_eq!(classify_scalar(".inf"), Scalar::Double(f64::INFINITY));
        assert_eq!(classify_scalar("-.INF"), Scalar::Double(f64::NEG_INFINITY));
        assert!(matches!(classify_scalar(".nan"), Scalar::Double(d) if d.is_nan()));
    }

    #[test]
    fn test_classify_numeric() {
        assert_eq!(classify_scalar("42"), Scalar::UInt(42));
        assert_eq!(classify_scalar("-42"), Scalar::Int(-42));
        assert_eq!(classify_scalar("-0"), Scalar::UInt(0));
        assert_eq!(classify_scalar("3.14"), Scalar::Double(3.14));
        assert_eq!(classify_scalar("-1e3"), Scalar::Double(-1000.0));
        assert_eq!(
            classify_scalar("18446744073709551615"),
            Scalar::UInt(u64::MAX)
        );
    }

    #[test]
    fn test_classify_string() {
        assert_eq!(
            classify_scalar("hello"),
            Scalar::String("hello".to_owned())
        );
        assert_eq!(
            classify_scalar("-abc"),
            Scalar::String("-abc".to_owned())
        );
        assert_eq!(classify_scalar("1.2.3"), Scalar::String("1.2.3".to_owned()));
    }
}
