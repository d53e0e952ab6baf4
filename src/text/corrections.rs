//! Heuristic OCR error correction.
//!
//! OCR engines make predictable mistakes: digits inside words, one glyph read
//! as two, mangled job titles, and inconsistent punctuation spacing. We fix the
//! common ones with an ordered table of regex substitutions. The table is data,
//! not code, so new corrections can be added without touching anything here.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;

use crate::{async_utils::io::read_json_or_toml, prelude::*};

/// Our built-in correction table.
const DEFAULT_CORRECTIONS: &str = include_str!("default_corrections.toml");

/// Runs of spaces and tabs, collapsed after all rules have run.
static HORIZONTAL_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("failed to compile regex"));

/// The corrector built from [`DEFAULT_CORRECTIONS`].
static BUILTIN: LazyLock<OcrCorrector> = LazyLock::new(|| {
    let table = toml::from_str::<CorrectionTable>(DEFAULT_CORRECTIONS)
        .expect("failed to parse built-in correction table");
    OcrCorrector::from_table(&table).expect("failed to compile built-in correction table")
});

/// Which group of rules a correction belongs to.
///
/// Tiers must appear in this order within a table. Later tiers assume the
/// earlier ones have already run.
#[derive(
    Clone, Copy, Debug, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionTier {
    /// Single look-alike characters inside words (`0` for `o`, etc.).
    Confusion,
    /// Two glyphs misread as one, or one as two.
    Structural,
    /// Job-title and role vocabulary.
    Vocabulary,
    /// Dash, comma and colon spacing.
    Punctuation,
}

/// A single substitution rule.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorrectionRule {
    /// The tier this rule belongs to.
    pub tier: CorrectionTier,

    /// A regular expression, in Rust `regex` syntax.
    pub pattern: String,

    /// The replacement. Capture groups may be referenced as `${1}`.
    pub replacement: String,
}

/// An ordered table of correction rules, as stored in TOML or JSON.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorrectionTable {
    /// Rules, applied in order.
    pub rules: Vec<CorrectionRule>,
}

/// A compiled [`CorrectionRule`].
#[derive(Clone, Debug)]
struct CompiledRule {
    regex: Regex,
    replacement: String,
}

/// Applies a [`CorrectionTable`] to text.
#[derive(Clone, Debug)]
pub struct OcrCorrector {
    rules: Vec<CompiledRule>,
}

impl OcrCorrector {
    /// The built-in corrector.
    pub fn builtin() -> &'static OcrCorrector {
        &BUILTIN
    }

    /// Compile a correction table.
    pub fn from_table(table: &CorrectionTable) -> Result<Self> {
        let mut rules = Vec::with_capacity(table.rules.len());
        let mut previous_tier = None;
        for (idx, rule) in table.rules.iter().enumerate() {
            if let Some(previous) = previous_tier
                && rule.tier < previous
            {
                return Err(anyhow!(
                    "correction rule {} ({:?}) appears after a {:?} rule",
                    idx,
                    rule.tier,
                    previous
                ));
            }
            previous_tier = Some(rule.tier);

            let regex = Regex::new(&rule.pattern).with_context(|| {
                format!("invalid pattern in correction rule {}: {}", idx, rule.pattern)
            })?;
            rules.push(CompiledRule {
                regex,
                replacement: rule.replacement.clone(),
            });
        }
        Ok(Self { rules })
    }

    /// Load a correction table from a TOML or JSON file.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn from_path(path: &Path) -> Result<Self> {
        let table = read_json_or_toml::<CorrectionTable>(path).await?;
        debug!(rule_count = table.rules.len(), "Loaded correction table");
        Self::from_table(&table)
            .with_context(|| format!("bad correction table in {:?}", path.display()))
    }

    /// Correct common OCR errors in `text`.
    ///
    /// After all rules run, runs of spaces and tabs collapse to one space and
    /// each line is trimmed. Line breaks are kept.
    pub fn correct(&self, text: &str) -> String {
        let mut corrected = text.to_owned();
        for rule in &self.rules {
            corrected = rule
                .regex
                .replace_all(&corrected, rule.replacement.as_str())
                .into_owned();
        }

        let collapsed = HORIZONTAL_WHITESPACE.replace_all(&corrected, " ");
        collapsed
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_owned()
    }
}

/// Correct `text` with the built-in table.
pub fn correct_ocr_errors(text: &str) -> String {
    OcrCorrector::builtin().correct(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_compiles() {
        assert!(!OcrCorrector::builtin().rules.is_empty());
    }

    #[test]
    fn fixes_digits_inside_words() {
        assert!(correct_ocr_errors("Senior Devel0per").contains("Developer"));
        assert_eq!(correct_ocr_errors("he1lo w0rld"), "hello world");
        assert_eq!(correct_ocr_errors("Ja5on"), "Jason");
    }

    #[test]
    fn leaves_real_numbers_alone() {
        assert_eq!(correct_ocr_errors("Room 101, 2020"), "Room 101, 2020");
        assert_eq!(correct_ocr_errors("Salary 1,500 USD"), "Salary 1,500 USD");
    }

    #[test]
    fn fixes_structural_merges() {
        assert_eq!(correct_ocr_errors("arne"), "ame");
        assert_eq!(correct_ocr_errors("aiie"), "aue");
    }

    #[test]
    fn canonicalizes_job_titles() {
        assert_eq!(correct_ocr_errors("MANAG3R"), "Manager");
        assert_eq!(correct_ocr_errors("s3ni0r engin33r"), "Senior Engineer");
        assert_eq!(correct_ocr_errors("team l3ad"), "team Lead");
        assert_eq!(correct_ocr_errors("juni0r"), "Junior");
    }

    #[test]
    fn canonicalizes_vietnamese_roles() {
        assert_eq!(correct_ocr_errors("Kỹ   sư"), "Kỹ sư");
        assert_eq!(correct_ocr_errors("Kỹsư phần mềm"), "Kỹ sư phần mềm");
        assert_eq!(correct_ocr_errors("quản  lý dự án"), "Quản lý dự án");
        assert_eq!(correct_ocr_errors("Trưởng\tphòng"), "Trưởng phòng");
        assert_eq!(correct_ocr_errors("chuyên viên"), "Chuyên viên");
    }

    #[test]
    fn normalizes_punctuation_spacing() {
        assert_eq!(correct_ocr_errors("2019—2021"), "2019 - 2021");
        assert_eq!(correct_ocr_errors("Java ,Python;Go"), "Java, Python, Go");
        assert_eq!(correct_ocr_errors("Email:a@b.com"), "Email: a@b.com");
        assert_eq!(correct_ocr_errors("Phone : 0912345678"), "Phone: 0912345678");
    }

    #[test]
    fn leaves_urls_times_and_hyphenated_words_alone() {
        assert_eq!(
            correct_ocr_errors("https://example.com at 10:30"),
            "https://example.com at 10:30"
        );
        assert_eq!(correct_ocr_errors("full-stack"), "full-stack");
        assert_eq!(correct_ocr_errors("an.nguyen@mail-box.vn"), "an.nguyen@mail-box.vn");
    }

    #[test]
    fn keeps_line_breaks() {
        let text = "Email: a@b.com   \nsome   text\n\nPhone: 0912345678";
        assert_eq!(
            correct_ocr_errors(text),
            "Email: a@b.com\nsome text\n\nPhone: 0912345678"
        );
    }

    #[test]
    fn rejects_out_of_order_tiers() {
        let table = CorrectionTable {
            rules: vec![
                CorrectionRule {
                    tier: CorrectionTier::Punctuation,
                    pattern: ",".to_owned(),
                    replacement: ", ".to_owned(),
                },
                CorrectionRule {
                    tier: CorrectionTier::Confusion,
                    pattern: "0".to_owned(),
                    replacement: "o".to_owned(),
                },
            ],
        };
        assert!(OcrCorrector::from_table(&table).is_err());
    }

    #[test]
    fn custom_table_applies_in_order() -> Result<()> {
        let table = toml::from_str::<CorrectionTable>(
            r#"
            [[rules]]
            tier = "confusion"
            pattern = "vv"
            replacement = "w"

            [[rules]]
            tier = "vocabulary"
            pattern = "(?i)\\bwork\\b"
            replacement = "Work"
            "#,
        )?;
        let corrector = OcrCorrector::from_table(&table)?;
        assert_eq!(corrector.correct("vvork history"), "Work history");
        Ok(())
    }
}
