//! Post-processing of LLM transcriptions.
//!
//! Even well-prompted models sometimes wrap their answer in code fences, emit
//! `\r\n` endings or sprinkle zero-width characters into the text. These
//! rules undo that without touching the recognised content. Text coming from
//! Cloud Vision is already plain and is never passed through here.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw answer; trailing whitespace is trimmed last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model transcription.
///
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse runs of 3+ blank lines to one blank line
/// 6. Trim leading and trailing blank lines
pub fn clean_transcription(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```text\nhello\n```"), "hello");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        assert_eq!(strip_code_fences("```\nhello\nworld\n```\n"), "hello\nworld");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences("plain ``` inline"), "plain ``` inline");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("in\u{200B}voice\u{FEFF}"), "invoice");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("a  \nb\t\n c"), "a\nb\n c");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_transcription_full_pipeline() {
        let raw = "```\r\n  Title  \r\n\r\n\r\n\r\nBody\u{200B} text\r\n```";
        assert_eq!(clean_transcription(raw), "Title\n\nBody text");
    }

    #[test]
    fn test_indentation_is_preserved() {
        assert_eq!(clean_transcription("Total:\n    42"), "Total:\n    42");
    }
}
