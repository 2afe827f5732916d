//! Text comparisons with the engine's semantics, for filters evaluated outside the engine.

use std::cmp::Ordering;

/// Binary collation: byte-wise order of the UTF-8 encodings.
pub fn compare_text(first: &str, second: &str) -> Ordering {
    first.as_bytes().cmp(second.as_bytes())
}

/// `value LIKE pattern`. `%` matches any run of characters, `_` exactly one; ASCII letters
/// compare case-insensitively.
pub fn like_matches(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut v, mut p) = (0, 0);
    // position after the last `%` seen and the value position it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some('%') => {
                p += 1;
                backtrack = Some((p, v));
            }
            Some('_') => {
                p += 1;
                v += 1;
            }
            Some(c) if c.eq_ignore_ascii_case(&value[v]) => {
                p += 1;
                v += 1;
            }
            _ => match backtrack {
                Some((after, tried)) => {
                    p = after;
                    v = tried + 1;
                    backtrack = Some((after, tried + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}
