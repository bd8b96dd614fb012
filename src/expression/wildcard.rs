//! Wildcard matching with `*` and `?`.
//!
//! `*` matches any run of characters, `?` exactly one character. A backslash
//! makes the next character literal.

use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Char(char),
    Any,
    One,
}

fn tokens(pattern: &str) -> Option<Vec<Token>> {
    let mut out = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        out.push(match c {
            '\\' => Token::Char(chars.next()?),
            '*' => Token::Any,
            '?' => Token::One,
            c => Token::Char(c),
        });
    }

    Some(out)
}

/// Match the string against the wildcard pattern.
pub fn wildcard_match(pattern: &str, s: &str) -> Result<bool> {
    let p = tokens(pattern).ok_or_else(|| {
        Error::new(ErrorKind::InvalidWildcardPattern {
            pattern: pattern.to_string(),
        })
    })?;
    let s: Vec<char> = s.chars().collect();

    // Position after the last `*` and the string position it was tried at.
    let mut star: Option<(usize, usize)> = None;
    let (mut i, mut j) = (0, 0);
    while j < s.len() {
        match p.get(i) {
            Some(Token::One) => {
                i += 1;
                j += 1;
            }
            Some(Token::Char(c)) if *c == s[j] => {
                i += 1;
                j += 1;
            }
            Some(Token::Any) => {
                i += 1;
                star = Some((i, j));
            }
            _ => match star {
                Some((si, sj)) => {
                    i = si;
                    j = sj + 1;
                    star = Some((si, j));
                }
                None => return Ok(false),
            },
        }
    }

    Ok(p[i..].iter().all(|t| *t == Token::Any))
}
