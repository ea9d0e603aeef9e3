//! Text normalisation shared by every matching path.

/// Characters stripped by [`trim`] and used as separators by [`tokenize`]:
/// space, tab, newline, carriage return, form feed, vertical tab.
pub const WHITESPACE: [char; 6] = [' ', '\t', '\n', '\r', '\x0c', '\x0b'];

fn is_blank(c: char) -> bool {
    WHITESPACE.contains(&c)
}

/// Removes leading and trailing [`WHITESPACE`].
pub fn trim(s: &str) -> &str {
    s.trim_matches(is_blank)
}

/// Splits on runs of [`WHITESPACE`] and lowercases every token.
/// Punctuation is kept as part of the token.
pub fn tokenize(s: &str) -> Vec<String> {
    s.split(is_blank)
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
