//! Query matcher for the global search and free-text filters.

use regex::{Regex, RegexBuilder};

/// One compiled query token.
struct Token {
    /// `None` only if the escaped-literal fallback itself failed to compile;
    /// such a token matches everything.
    re: Option<Regex>,
    negate: bool,
}

impl Token {
    fn accepts(&self, text: &str) -> bool {
        let hit = self.re.as_ref().map(|re| re.is_match(text)).unwrap_or(true);
        hit != self.negate
    }
}

/// A compiled search query.
///
/// The query splits on whitespace into tokens and a candidate matches only
/// if every token accepts it. A token prefixed with `!` inverts the rest of
/// the token. A token written as `/pattern/` or `/pattern/f` is compiled as
/// an explicit regular expression; any other token, and any pattern that
/// fails to compile, matches as a case-insensitive literal substring.
pub struct Matcher {
    tokens: Vec<Token>,
}

impl Matcher {
    pub fn new(query: &str) -> Self {
        let tokens = query
            .split_whitespace()
            .map(|raw| match raw.strip_prefix('!') {
                Some(rest) if !rest.is_empty() => Token {
                    re: compile(rest),
                    negate: true,
                },
                _ => Token {
                    re: compile(raw),
                    negate: false,
                },
            })
            .collect();
        Self { tokens }
    }

    /// True when every token accepts `text`. An empty query accepts anything.
    pub fn matches(&self, text: &str) -> bool {
        self.tokens.iter().all(|t| t.accepts(text))
    }
}

/// Compiles one token, falling back to a case-insensitive literal-substring
/// pattern. The fallback escapes the whole original token, slashes included.
fn compile(token: &str) -> Option<Regex> {
    if let Some(re) = explicit_regex(token) {
        return Some(re);
    }
    RegexBuilder::new(&regex::escape(token))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Recognizes `/pattern/` and `/pattern/f` tokens.
fn explicit_regex(token: &str) -> Option<Regex> {
    if !token.starts_with('/') || token.len() <= 2 {
        return None;
    }
    let (pattern, flag) = if token.ends_with('/') {
        (&token[1..token.len() - 1], None)
    } else if token.as_bytes()[token.len() - 2] == b'/' {
        (&token[1..token.len() - 2], token.chars().last())
    } else {
        return None;
    };

    let mut builder = RegexBuilder::new(pattern);
    match flag {
        None => {}
        Some('i') => {
            builder.case_insensitive(true);
        }
        Some('m') => {
            builder.multi_line(true);
        }
        Some('s') => {
            builder.dot_matches_new_line(true);
        }
        // Browser-style flags with no effect on a single match test.
        Some('g') | Some('u') | Some('y') => {}
        Some(_) => return None,
    }
    builder.build().ok()
}
