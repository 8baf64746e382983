/*!
format.rs

Formatting helpers for human-readable output (progress lines, summary
tables). JSON output paths do not use these.

  - StyleOptions::detect() -> StyleOptions   (NO_COLOR, COLUMNS)
  - color(role, text, &StyleOptions) -> String
  - table(headers, rows, &StyleOptions) -> String
  - truncate_ellipsis(s, max_chars) -> String

This module never prints; it only returns strings.
*/

use std::borrow::Cow;

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            term_width: width,
        }
    }

    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            term_width: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Accent => "38;5;213",
        Role::Success => "38;5;82",
        Role::Warning => "38;5;214",
        Role::Error => "38;5;196",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

/// Left-aligned table with a dashed header separator. Columns wider than the
/// terminal allows are shrunk (widest first) and their cells truncated.
pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> String {
    if headers.is_empty() {
        return String::new();
    }
    const MIN_COL: usize = 3;
    let col_count = headers.len();

    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let total: usize = widths.iter().sum::<usize>() + (col_count - 1) * 2;
    if total > style.term_width {
        let mut overflow = total - style.term_width;
        let mut order: Vec<usize> = (0..col_count).collect();
        order.sort_by(|a, b| widths[*b].cmp(&widths[*a]));
        for idx in order {
            if overflow == 0 {
                break;
            }
            if widths[idx] > MIN_COL {
                let shrink = (widths[idx] - MIN_COL).min(overflow);
                widths[idx] -= shrink;
                overflow -= shrink;
            }
        }
    }

    let mut out = String::new();
    let header_line = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad_or_truncate(h, widths[i]))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(&color(Role::Accent, header_line, style));
    out.push('\n');

    let sep = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(&color(Role::Dim, sep, style));

    for row in rows {
        out.push('\n');
        let line = (0..col_count)
            .map(|c| pad_or_truncate(row.get(c).map(String::as_str).unwrap_or(""), widths[c]))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
    }
    out
}

fn pad_or_truncate(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len <= width {
        return format!("{s}{}", " ".repeat(width - len));
    }
    truncate_ellipsis(&strip_ansi(s), width)
}

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    // Minimal CSI scanner: ESC '[' ... final letter
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for n in chars.by_ref() {
                if n.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(c);
    }
    Cow::Owned(buf)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}
