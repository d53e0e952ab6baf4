//! Structured fields from extracted text.
//!
//! Text is split into sections by header lines (see [`sections`]), and each
//! field is read from the first section whose name mentions one of the field's
//! keywords. Values are validated or normalized, and tagged with how much we
//! trust them.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;

use crate::{
    ocr::DocumentKind,
    prelude::*,
    text::{corrections::OcrCorrector, normalize_text},
};

pub mod job_title;
pub mod sections;

pub use self::{
    job_title::extract_job_position,
    sections::{SectionMap, SectionRules, detect_sections},
};

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\s@]+@[^\s@]+\.[^\s@]+").expect("failed to compile regex"));

/// Vietnamese mobile numbers, with or without the country code.
static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+84|84|0)[35789][0-9]{8}\b").expect("failed to compile regex")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("failed to compile regex"));

/// Canonical spellings of places and qualifications, and their variants.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("Hà Nội", &["Ha Noi", "Hanoi", "HN"]),
    ("Hồ Chí Minh", &["Ho Chi Minh", "HCM", "Sài Gòn", "Saigon"]),
    ("Cử nhân", &["BSc", "Bachelor", "Cử nhân Đại học"]),
    ("Thạc sĩ", &["MSc", "Master", "Thạc sĩ"]),
    ("Tiến sĩ", &["PhD", "Doctor", "Tiến sĩ"]),
    ("Kỹ sư", &["Engineer", "Kỹ sư"]),
    ("Quản lý", &["Manager", "Quản lý"]),
];

/// [`SYNONYMS`], compiled to whole-word, case-insensitive patterns.
static SYNONYM_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    SYNONYMS
        .iter()
        .map(|&(canonical, variants)| {
            let patterns = variants
                .iter()
                .map(|v| {
                    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(v)))
                        .expect("failed to compile regex")
                })
                .collect();
            (canonical, patterns)
        })
        .collect()
});

/// How much we trust a field's value.
#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A field value, with confidence and any validation problems.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
pub struct ParsedField {
    pub value: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl ParsedField {
    fn new(value: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            value: value.into(),
            confidence,
            validation_errors: vec![],
        }
    }

    fn invalid(value: impl Into<String>, error: &str) -> Self {
        Self {
            value: value.into(),
            confidence: Confidence::Low,
            validation_errors: vec![error.to_owned()],
        }
    }
}

/// The fields we know how to extract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldName {
    Name,
    Email,
    Phone,
    Location,
    Experience,
    Education,
    Skills,
}

impl FieldName {
    /// Every field, in output order.
    pub const ALL: [FieldName; 7] = [
        FieldName::Name,
        FieldName::Email,
        FieldName::Phone,
        FieldName::Location,
        FieldName::Experience,
        FieldName::Education,
        FieldName::Skills,
    ];

    /// Section names mentioning any of these identify this field, tried in
    /// order.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            FieldName::Name => &["name", "full name", "họ tên", "tên"],
            FieldName::Email => &["email", "e-mail", "mail"],
            FieldName::Phone => &["phone", "tel", "mobile", "điện thoại", "sđt"],
            FieldName::Location => &["location", "address", "địa chỉ", "địa điểm"],
            FieldName::Experience => &["experience", "kinh nghiệm", "làm việc"],
            FieldName::Education => &["education", "học vấn", "bằng cấp"],
            FieldName::Skills => &["skills", "kỹ năng", "chuyên môn"],
        }
    }

    /// Validate and normalize a raw section value.
    fn process(self, value: &str) -> ParsedField {
        match self {
            FieldName::Name => {
                ParsedField::new(WHITESPACE_RUN.replace_all(value, " "), Confidence::High)
            }
            FieldName::Email => match EMAIL_REGEX.find(value) {
                Some(m) => ParsedField::new(m.as_str(), Confidence::High),
                None => ParsedField::invalid(value, "Invalid email format"),
            },
            FieldName::Phone => match PHONE_REGEX.find(value) {
                Some(m) => ParsedField::new(m.as_str(), Confidence::High),
                None => ParsedField::invalid(value, "Invalid phone format"),
            },
            FieldName::Location => {
                ParsedField::new(normalize_location(value), Confidence::Medium)
            }
            FieldName::Education => {
                ParsedField::new(normalize_education(value), Confidence::Medium)
            }
            FieldName::Experience | FieldName::Skills => {
                ParsedField::new(value, Confidence::Medium)
            }
        }
    }
}

/// Extract one field from detected sections.
///
/// For each keyword in turn, we look for the first section whose name contains
/// it and whose content isn't blank. No such section means no field.
pub fn extract_field(sections: &SectionMap, field: FieldName) -> Option<ParsedField> {
    field.keywords().iter().find_map(|keyword| {
        sections
            .iter()
            .filter(|(name, _)| name.to_lowercase().contains(keyword))
            .map(|(_, content)| content.trim())
            .find(|content| !content.is_empty())
            .map(|content| field.process(content))
    })
}

/// Replace the first variant found for each place with its canonical name.
fn normalize_location(location: &str) -> String {
    let mut normalized = location.trim().to_owned();
    for (canonical, patterns) in SYNONYM_PATTERNS.iter() {
        if let Some(pattern) = patterns.iter().find(|p| p.is_match(&normalized)) {
            normalized = pattern.replace_all(&normalized, *canonical).into_owned();
        }
    }
    normalized
}

/// Replace every known variant with its canonical name.
fn normalize_education(education: &str) -> String {
    let mut normalized = education.trim().to_owned();
    for (canonical, patterns) in SYNONYM_PATTERNS.iter() {
        for pattern in patterns {
            normalized = pattern.replace_all(&normalized, *canonical).into_owned();
        }
    }
    normalized
}

/// All the fields we could find.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
pub struct ParsedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ParsedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<ParsedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<ParsedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ParsedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<ParsedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<ParsedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<ParsedField>,
}

impl ParsedFields {
    fn slot(&mut self, field: FieldName) -> &mut Option<ParsedField> {
        match field {
            FieldName::Name => &mut self.name,
            FieldName::Email => &mut self.email,
            FieldName::Phone => &mut self.phone,
            FieldName::Location => &mut self.location,
            FieldName::Experience => &mut self.experience,
            FieldName::Education => &mut self.education,
            FieldName::Skills => &mut self.skills,
        }
    }
}

/// Normalize `text`, split it into field sections, and extract every field.
pub fn parse_fields(text: &str) -> ParsedFields {
    let normalized = normalize_text(text);
    let sections = detect_sections(&normalized, SectionRules::generic());
    trace!(sections = ?sections.names().collect::<Vec<_>>(), "Detected field sections");
    let mut fields = ParsedFields::default();
    for field in FieldName::ALL {
        *fields.slot(field) = extract_field(&sections, field);
    }
    fields
}

/// Everything we learned from a document's text.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct ParsedDocument {
    #[serde(flatten)]
    pub fields: ParsedFields,

    /// The normalized, corrected text the fields were read from.
    pub raw_text: String,

    /// Major CV sections, for CVs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_sections: Option<SectionMap>,

    /// The advertised position, for job descriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
}

/// Parse a document's text, correcting OCR errors with `corrector` first.
#[instrument(level = "debug", skip_all, fields(kind = ?kind))]
pub fn parse_document(
    text: &str,
    kind: DocumentKind,
    corrector: &OcrCorrector,
) -> ParsedDocument {
    let text = normalize_text(&corrector.correct(&normalize_text(text)));
    let fields = parse_fields(&text);
    let (cv_sections, job_title) = match kind {
        DocumentKind::Cv => (Some(detect_sections(&text, SectionRules::cv())), None),
        DocumentKind::Jd => (None, extract_job_position(&text)),
    };
    ParsedDocument {
        fields,
        raw_text: text,
        cv_sections,
        job_title,
    }
}
