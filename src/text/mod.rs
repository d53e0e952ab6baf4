//! Plain-text cleanup shared by every extraction path.

use std::sync::LazyLock;

use regex::Regex;

pub mod corrections;

/// Default number of meaningful characters a PDF text layer needs before we
/// trust it over OCR.
pub const DEFAULT_MIN_MEANINGFUL_LENGTH: usize = 200;

/// Runs of two or more spaces or tabs.
static HORIZONTAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("failed to compile regex"));

/// Three or more newlines in a row.
static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("failed to compile regex"));

/// Anything that is neither a word character nor whitespace.
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("failed to compile regex"));

/// Canonicalize line endings and whitespace.
///
/// Line endings become `\n`, runs of spaces and tabs collapse to a single
/// space, more than one blank line collapses to a paragraph break, and the
/// result is trimmed. Applying this twice gives the same result as applying it
/// once.
pub fn normalize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_RUN.replace_all(&text, " ");
    let text = EXTRA_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_owned()
}

/// Does `text` contain enough real words that we can skip OCR?
///
/// Symbols and punctuation don't count. A PDF whose text layer holds only
/// stamps, signatures or decorative glyphs still needs OCR.
pub fn is_text_sufficient(text: &str, min_meaningful_length: usize) -> bool {
    let meaningful = NON_WORD.replace_all(text, "");
    meaningful.trim().chars().count() >= min_meaningful_length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_canonicalizes_line_endings_and_spacing() {
        let text = "  Name:\t\tNguyen  Van A\r\nEmail: a@b.com\r\r\n\n\n\nSkills  ";
        assert_eq!(
            normalize_text(text),
            "Name: Nguyen Van A\nEmail: a@b.com\n\nSkills"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "a\r\r\nb",
            "x\n  \n\n\ny",
            "a \t\n\n\n\t b\r\n\r\n\r\nc  ",
            "Kỹ   sư\u{3000}phần mềm\n\n\n\n",
            "\t\tleading\n\n\n\ntrailing\t\t",
        ];
        for sample in samples {
            let once = normalize_text(sample);
            assert_eq!(normalize_text(&once), once, "sample: {:?}", sample);
        }
    }

    #[test]
    fn sufficiency_boundary_is_inclusive() {
        let exactly = "a".repeat(200);
        let short = "a".repeat(199);
        assert!(is_text_sufficient(&exactly, DEFAULT_MIN_MEANINGFUL_LENGTH));
        assert!(!is_text_sufficient(&short, DEFAULT_MIN_MEANINGFUL_LENGTH));
    }

    #[test]
    fn sufficiency_ignores_symbols() {
        let decorated = format!("{}{}", "a".repeat(199), "!@#$%^&*()〈〉".repeat(50));
        assert!(!is_text_sufficient(&decorated, DEFAULT_MIN_MEANINGFUL_LENGTH));
        assert!(!is_text_sufficient(
            "〈stamp〉〈signature〉",
            DEFAULT_MIN_MEANINGFUL_LENGTH
        ));
    }

    #[test]
    fn sufficiency_counts_vietnamese_letters() {
        let text = "Kỹ sư phần mềm ".repeat(15);
        assert!(is_text_sufficient(&text, DEFAULT_MIN_MEANINGFUL_LENGTH));
    }
}
