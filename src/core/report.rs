// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Source-line rendering helpers for diagnostics.

/// Render `line` with the character at 1-based `column` highlighted in red.
pub fn highlight_line(line: &str, column: Option<usize>, use_color: bool) -> String {
    let line = line.trim_end_matches(['\r', '\n']);
    match column {
        Some(col) if col > 0 && use_color => {
            let idx = col - 1;
            if idx >= line.len() || !line.is_char_boundary(idx) {
                return format!("{line}\x1b[31m^\x1b[0m");
            }
            let (head, tail) = line.split_at(idx);
            let ch = tail.chars().next().unwrap_or(' ');
            let rest = &tail[ch.len_utf8()..];
            format!("{head}\x1b[31m{ch}\x1b[0m{rest}")
        }
        _ => line.to_string(),
    }
}

/// Caret marker under columns `column..col_end` (exclusive end). Tabs in
/// the prefix are kept so the carets line up with the source.
pub fn caret_line(line: &str, column: usize, col_end: Option<usize>) -> String {
    let start = column.max(1) - 1;
    let width = col_end
        .filter(|end| *end > column)
        .map_or(1, |end| end - column);
    let prefix: String = line
        .chars()
        .take(start)
        .map(|ch| if ch == '\t' { '\t' } else { ' ' })
        .collect();
    let pad = start.saturating_sub(prefix.chars().count());
    format!("{prefix}{}{}", " ".repeat(pad), "^".repeat(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_column_only_with_color() {
        assert_eq!(highlight_line("lda #1", Some(5), false), "lda #1");
        assert_eq!(
            highlight_line("lda #1", Some(5), true),
            "lda \x1b[31m#\x1b[0m1"
        );
        assert_eq!(highlight_line("nop", Some(9), true), "nop\x1b[31m^\x1b[0m");
    }

    #[test]
    fn carets_follow_tabs_and_width() {
        assert_eq!(caret_line("\tlda foo", 6, Some(9)), "\t    ^^^");
        assert_eq!(caret_line("x", 1, None), "^");
        assert_eq!(caret_line("ab", 5, Some(5)), "    ^");
    }
}
