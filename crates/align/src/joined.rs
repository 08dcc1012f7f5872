//! Offset conversion between space-joined token strings and token indices.
//!
//! The aligner works over characters; the pipeline works over tokens. When
//! tokens are joined with single spaces, a char position maps back to a token
//! index by counting the spaces before it.

/// Token index of the character position where an aligned region begins. A
/// position sitting on a separator space belongs to the following token.
pub fn token_start(joined: &str, char_start: usize) -> usize {
    let spaces = joined
        .chars()
        .take(char_start)
        .filter(|&c| c == ' ')
        .count();
    match joined.chars().nth(char_start) {
        Some(' ') => spaces + 1,
        _ => spaces,
    }
}

/// One past the token containing the last non-space character of the aligned
/// region `[char_start, char_end)`. Falls back to [`token_start`] when the
/// region is all separators.
pub fn token_end(joined: &str, char_start: usize, char_end: usize) -> usize {
    let mut last_nonspace = None;
    for (idx, ch) in joined
        .chars()
        .enumerate()
        .take(char_end)
        .skip(char_start)
    {
        if ch != ' ' {
            last_nonspace = Some(idx);
        }
    }
    match last_nonspace {
        Some(idx) => joined.chars().take(idx).filter(|&c| c == ' ').count() + 1,
        None => token_start(joined, char_start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_token_bounds() {
        let joined = "ab cd ef";
        assert_eq!(token_start(joined, 3), 1);
        assert_eq!(token_end(joined, 3, 5), 2);
    }

    #[test]
    fn start_on_separator_belongs_to_next_token() {
        let joined = "ab cd ef";
        assert_eq!(token_start(joined, 2), 1);
    }

    #[test]
    fn trailing_separator_does_not_extend_end() {
        let joined = "ab cd ef";
        // Region "ab " touches only token 0.
        assert_eq!(token_end(joined, 0, 3), 1);
        // Region covering "cd ef" ends past token 2.
        assert_eq!(token_end(joined, 3, 8), 3);
    }

    #[test]
    fn multibyte_tokens_count_by_chars() {
        let joined = "café naïve fin";
        assert_eq!(token_start(joined, 5), 1);
        assert_eq!(token_end(joined, 5, 10), 2);
    }
}
