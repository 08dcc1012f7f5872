//! Whitespace tokenization with byte offsets.
//!
//! Offsets are byte positions into the source text, half-open, so a token can
//! always be sliced back out of the document with `&text[start..end]`.

use serde::{Deserialize, Serialize};

/// A token and its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    /// Byte offset (inclusive) of the first byte of the token.
    pub start: usize,
    /// Byte offset (exclusive) one past the last byte of the token.
    pub end: usize,
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        self.text.as_str()
    }
}

/// Split `text` on Unicode whitespace, keeping byte offsets.
///
/// Deterministic and allocation-light; runs of whitespace produce no empty
/// tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(token_start) = start.take() {
                tokens.push(Token {
                    text: text[token_start..idx].to_string(),
                    start: token_start,
                    end: idx,
                });
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }

    if let Some(token_start) = start {
        tokens.push(Token {
            text: text[token_start..].to_string(),
            start: token_start,
            end: text.len(),
        });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  \t\n ").is_empty());
    }

    #[test]
    fn offsets_slice_back_to_tokens() {
        let text = "The  quick\nbrown fox.";
        let tokens = tokenize(text);
        assert_eq!(tokens.len(), 4);
        for t in &tokens {
            assert_eq!(&text[t.start..t.end], t.text);
        }
        assert_eq!(tokens[3].text, "fox.");
    }

    #[test]
    fn multibyte_offsets_are_bytes() {
        let tokens = tokenize("café naïve");
        assert_eq!(tokens[0].text, "café");
        assert_eq!(tokens[0].end, 5);
        assert_eq!(tokens[1].start, 6);
    }

    #[test]
    fn trailing_token_without_whitespace() {
        let tokens = tokenize("one two");
        assert_eq!(tokens[1].text, "two");
        assert_eq!(tokens[1].end, 7);
    }
}
