/*!
format.rs

Formatting utilities for `invokerfm` human output paths.

Goals:
  - Consistent colorful / boxed primitives for the banner and status lines.
  - Centralize style decision logic (NO_COLOR env, terminal width).
  - Degrade gracefully when ANSI disabled (NO_COLOR set).

Public API Summary:
  - StyleOptions::detect()
  - color(role, text, &StyleOptions) -> String
  - banner(&StyleOptions) -> String
  - box_header(title, subtitle_opt, &StyleOptions) -> String
  - pad_right(s, width) -> String
  - render_value(&serde_json::Value) -> String

NOTE:
  - This module never prints directly (returns formatted strings).
  - JSON output paths do not use these helpers, to keep machine output clean.
*/

use std::borrow::Cow;

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub term_width: usize,
    pub box_style: BoxStyle,
    pub padding: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum BoxStyle {
    Light,   // ─ │ ┌ ┐ └ ┘ (NO_COLOR)
    Rounded, // ╭ ╮ ╰ ╯
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let use_color = std::env::var_os("NO_COLOR").is_none();

        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        StyleOptions {
            use_color,
            term_width: width,
            box_style: if use_color {
                BoxStyle::Rounded
            } else {
                BoxStyle::Light
            },
            padding: 1,
        }
    }

    /// No ANSI, fixed width.
    #[cfg(test)]
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            term_width: 100,
            box_style: BoxStyle::Light,
            padding: 1,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color                                                                      */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
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
        Role::Primary => "96",         // bright cyan
        Role::Secondary => "38;5;250", // gray
        Role::Success => "92",
        Role::Warning => "93",
        Role::Error => "91",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

/* -------------------------------------------------------------------------- */
/* Banner                                                                     */
/* -------------------------------------------------------------------------- */

const BANNER_ART: &str = r"
    ██╗███╗   ██╗██╗   ██╗ ██████╗ ██╗  ██╗███████╗██████╗ ███████╗███╗   ███╗
    ██║████╗  ██║██║   ██║██╔═══██╗██║ ██╔╝██╔════╝██╔══██╗██╔════╝████╗ ████║
    ██║██╔██╗ ██║██║   ██║██║   ██║█████╔╝ █████╗  ██████╔╝█████╗  ██╔████╔██║
    ██║██║╚██╗██║╚██╗ ██╔╝██║   ██║██╔═██╗ ██╔══╝  ██╔══██╗██╔══╝  ██║╚██╔╝██║
    ██║██║ ╚████║ ╚████╔╝ ╚██████╔╝██║  ██╗███████╗██║  ██║██║     ██║ ╚═╝ ██║
    ╚═╝╚═╝  ╚═══╝  ╚═══╝   ╚═════╝ ╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝╚═╝     ╚═╝     ╚═╝";

pub fn banner(style: &StyleOptions) -> String {
    let art = color(Role::Primary, BANNER_ART, style);
    let header = box_header(
        "SAP Remote Function Module Executor",
        Some(format!("v{}", env!("CARGO_PKG_VERSION"))),
        style,
    );
    format!("{art}\n{header}\n")
}

/* -------------------------------------------------------------------------- */
/* Box Header                                                                 */
/* -------------------------------------------------------------------------- */

pub fn box_header(
    title: impl AsRef<str>,
    subtitle: Option<impl AsRef<str>>,
    style: &StyleOptions,
) -> String {
    let title = title.as_ref();
    let sub = subtitle.as_ref().map(|s| s.as_ref());

    let (h, v, tl, tr, bl, br) = match style.box_style {
        BoxStyle::Light => ('─', '│', '┌', '┐', '└', '┘'),
        BoxStyle::Rounded => ('─', '│', '╭', '╮', '╰', '╯'),
    };

    let content_width = style.term_width.clamp(20, 200);
    let padding = style.padding;

    let title_styled = color(Role::Primary, title, style);
    let inner_title = match sub {
        Some(s) => format!("{title_styled}  {}", color(Role::Secondary, s, style)),
        None => title_styled,
    };

    let inner_len = display_width(&inner_title);
    let total_inner = (inner_len + padding * 2).min(content_width - 2);
    let total_width = total_inner + 2;
    let wrap_width = total_width - 2 - padding * 2;

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("{tl}{}{tr}", h.to_string().repeat(total_width - 2)));

    for w in wrap_text(&inner_title, wrap_width) {
        let raw_len = display_width(&w);
        let space_pad = (total_width - 2 - padding * 2).saturating_sub(raw_len);
        let pad_str = " ".repeat(padding);
        lines.push(format!(
            "{v}{pad_str}{w}{spaces}{pad_str}{v}",
            spaces = " ".repeat(space_pad),
        ));
    }

    lines.push(format!("{bl}{}{br}", h.to_string().repeat(total_width - 2)));
    lines.join("\n")
}

/* -------------------------------------------------------------------------- */
/* Text Helpers                                                               */
/* -------------------------------------------------------------------------- */

pub fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in s.split_whitespace() {
        if display_width(&current) + display_width(word) + 1 > max_width && !current.is_empty() {
            lines.push(current);
            current = String::new();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Left-justify to `width` columns. Longer text is kept whole.
pub fn pad_right(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - len))
}

/// Display form of a result value: containers as 2-space pretty JSON,
/// strings bare, other scalars in JSON notation.
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}

/* -------------------------------------------------------------------------- */
/* ANSI / Width Utilities                                                     */
/* -------------------------------------------------------------------------- */

fn strip_ansi(s: &str) -> Cow<'_, str> {
    // scans for ESC '[' ... final letter
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

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */
