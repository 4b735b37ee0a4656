// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared text utilities for tokenization and diagnostics.

/// Check if a byte is a valid identifier start character (letter or underscore).
#[inline]
pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

/// Check if a byte is a valid identifier continuation character.
///
/// Dots are accepted so addressing hints (`LDA.W`) and local-label paths
/// (`main.loop`) stay inside one identifier.
#[inline]
pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

/// Check if a byte is whitespace (space, tab or carriage return).
#[inline]
pub fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\r'
}

/// Normalize a symbol name for table lookups.
#[inline]
pub fn normalize_name(s: &str) -> String {
    s.to_ascii_uppercase()
}

/// Strip a trailing `;` comment that is not inside a quoted string.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    for (idx, &c) in bytes.iter().enumerate() {
        match c {
            _ if escape => escape = false,
            b'\\' if in_single || in_double => escape = true,
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b';' if !in_single && !in_double => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Levenshtein distance over ASCII-case-folded characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().map(|c| c.to_ascii_uppercase()).collect();
    let b: Vec<char> = b.chars().map(|c| c.to_ascii_uppercase()).collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Find the candidate closest to `name` within `max_distance` edits.
///
/// Ties resolve to the lexicographically smallest candidate so suggestions
/// are stable across runs.
pub fn closest_match<'a, I>(name: &str, candidates: I, max_distance: usize) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        if candidate.eq_ignore_ascii_case(name) {
            continue;
        }
        let distance = edit_distance(name, candidate);
        if distance > max_distance {
            continue;
        }
        best = match best {
            Some((d, c)) if d < distance || (d == distance && c <= candidate) => Some((d, c)),
            _ => Some((distance, candidate)),
        };
    }
    best.map(|(_, c)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_counts_single_edits() {
        assert_eq!(edit_distance("COUNTER", "COUNTER"), 0);
        assert_eq!(edit_distance("COUNTR", "COUNTER"), 1);
        assert_eq!(edit_distance("loop", "LOOP"), 0);
        assert_eq!(edit_distance("abc", "xyz"), 3);
    }

    #[test]
    fn closest_match_respects_distance_limit() {
        let names = ["COUNTER", "START", "STOP"];
        assert_eq!(
            closest_match("COUNTR", names.iter().copied(), 2),
            Some("COUNTER".to_string())
        );
        assert_eq!(closest_match("ZZZZZZ", names.iter().copied(), 2), None);
    }

    #[test]
    fn strip_comment_ignores_quoted_semicolons() {
        assert_eq!(strip_comment("0A 0B ; bytes"), "0A 0B ");
        assert_eq!(strip_comment("\"a;b\" ; c"), "\"a;b\" ");
    }
}
