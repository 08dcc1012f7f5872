//! Line-oriented wire format for candidate pair records.
//!
//! One record per line, a nested bracketed tuple:
//!
//! ```text
//! [[docA docB] [[gram total tfA tfB] [gram total tfA tfB] ...]]
//! ```
//!
//! The gram is a double-quoted string (`\"` and `\\` escapes). The enumerator
//! emits grams as `""`; the key text is recoverable from the index when a
//! downstream consumer needs it.

use crate::PairError;

/// One feature shared by a candidate pair: the gram text, its corpus document
/// frequency, and the per-document term frequencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub gram: String,
    pub total: u32,
    pub tf1: u32,
    pub tf2: u32,
}

/// A candidate pair and the features connecting it.
///
/// Invariant: `docs.0 < docs.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRecord {
    pub docs: (u32, u32),
    pub features: Vec<Feature>,
}

impl PairRecord {
    /// Render to the single-line wire form.
    pub fn to_line(&self) -> String {
        let mut out = String::with_capacity(32 + self.features.len() * 16);
        out.push_str(&format!("[[{} {}] [", self.docs.0, self.docs.1));
        for (i, f) in self.features.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push('[');
            push_quoted(&mut out, &f.gram);
            out.push_str(&format!(" {} {} {}]", f.total, f.tf1, f.tf2));
        }
        out.push_str("]]");
        out
    }

    /// Parse one wire line. `line_no` is for error reporting only.
    pub fn parse(line: &str, line_no: usize) -> Result<Self, PairError> {
        let mut p = Cursor::new(line, line_no);
        p.expect('[')?;
        p.expect('[')?;
        let a = p.int()?;
        p.space()?;
        let b = p.int()?;
        p.expect(']')?;
        p.space()?;
        p.expect('[')?;
        let mut features = Vec::new();
        loop {
            p.skip_spaces();
            if p.peek() == Some(']') {
                p.advance();
                break;
            }
            p.expect('[')?;
            let gram = p.quoted()?;
            p.space()?;
            let total = p.int()?;
            p.space()?;
            let tf1 = p.int()?;
            p.space()?;
            let tf2 = p.int()?;
            p.expect(']')?;
            features.push(Feature {
                gram,
                total,
                tf1,
                tf2,
            });
        }
        p.expect(']')?;
        p.end()?;
        Ok(PairRecord {
            docs: (a, b),
            features,
        })
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

struct Cursor<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(rest: &'a str, line: usize) -> Self {
        Cursor { rest, line }
    }

    fn err(&self, reason: impl Into<String>) -> PairError {
        PairError::Record {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.rest = &self.rest[ch.len_utf8()..];
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), PairError> {
        if self.peek() == Some(ch) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '{ch}'")))
        }
    }

    fn space(&mut self) -> Result<(), PairError> {
        if self.peek() == Some(' ') {
            self.skip_spaces();
            Ok(())
        } else {
            Err(self.err("expected space"))
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.advance();
        }
    }

    fn int(&mut self) -> Result<u32, PairError> {
        let digits: usize = self.rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(self.err("expected integer"));
        }
        let (num, rest) = self.rest.split_at(digits);
        let value = num.parse().map_err(|_| self.err("integer out of range"))?;
        self.rest = rest;
        Ok(value)
    }

    fn quoted(&mut self) -> Result<String, PairError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated string")),
                Some('"') => {
                    self.advance();
                    return Ok(out);
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some(c @ ('"' | '\\')) => {
                            out.push(c);
                            self.advance();
                        }
                        _ => return Err(self.err("bad escape")),
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn end(&mut self) -> Result<(), PairError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(self.err("trailing garbage"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(a: u32, b: u32, features: Vec<Feature>) -> PairRecord {
        PairRecord {
            docs: (a, b),
            features,
        }
    }

    fn feat(gram: &str, total: u32, tf1: u32, tf2: u32) -> Feature {
        Feature {
            gram: gram.into(),
            total,
            tf1,
            tf2,
        }
    }

    #[test]
    fn render_matches_wire_shape() {
        let r = rec(3, 17, vec![feat("", 2, 1, 1)]);
        assert_eq!(r.to_line(), r#"[[3 17] [["" 2 1 1]]]"#);
    }

    #[test]
    fn round_trip_multiple_features() {
        let r = rec(
            0,
            9,
            vec![feat("", 2, 1, 1), feat("the~quick~brown", 4, 2, 1)],
        );
        let parsed = PairRecord::parse(&r.to_line(), 1).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn round_trip_escaped_gram() {
        let r = rec(1, 2, vec![feat(r#"say~"no"~\again"#, 3, 1, 1)]);
        let parsed = PairRecord::parse(&r.to_line(), 1).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn rejects_unsorted_garbage() {
        for bad in [
            "",
            "[[1 2]]",
            "[[1 2] []",
            "[[1 2] [[\" 2 1 1]]]",
            "[[1 2] [[\"\" 2 1 1]]] tail",
            "[[a 2] [[\"\" 2 1 1]]]",
        ] {
            assert!(PairRecord::parse(bad, 7).is_err(), "accepted: {bad:?}");
        }
    }

    #[test]
    fn empty_feature_list_parses() {
        let parsed = PairRecord::parse("[[1 2] []]", 1).unwrap();
        assert!(parsed.features.is_empty());
    }

    #[test]
    fn error_carries_line_number() {
        match PairRecord::parse("nope", 41) {
            Err(PairError::Record { line, .. }) => assert_eq!(line, 41),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
