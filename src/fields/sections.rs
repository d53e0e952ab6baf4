//! Splitting text into named sections by their header lines.

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use schemars::{JsonSchema, r#gen::SchemaGenerator, schema::Schema};
use serde::{Serializer, ser::SerializeMap as _};

use crate::prelude::*;

/// Section holding any lines that appear before the first header.
pub const PERSONAL_SECTION: &str = "personal";

/// Headers for the individual fields of a CV or contact block.
const GENERIC_HEADERS: &[(&str, &[&str])] = &[
    ("name", &["name", "full name", "họ tên", "họ và tên", "tên"]),
    ("email", &["email", "e-mail", "mail"]),
    (
        "phone",
        &["phone", "telephone", "tel", "mobile", "điện thoại", "số điện thoại", "sđt"],
    ),
    ("location", &["location", "address", "địa chỉ", "địa điểm"]),
    ("experience", &["experience", "kinh nghiệm", "làm việc"]),
    ("education", &["education", "học vấn", "bằng cấp"]),
    ("skills", &["skills", "kỹ năng", "chuyên môn"]),
];

/// Headers for the larger blocks of a CV.
const CV_HEADERS: &[(&str, &[&str])] = &[
    (
        PERSONAL_SECTION,
        &["thông tin cá nhân", "personal info", "liên hệ", "contact", "hồ sơ", "profile"],
    ),
    ("education", &["học vấn", "education", "bằng cấp", "qualifications"]),
    ("experience", &["kinh nghiệm", "experience", "công việc", "work", "career"]),
    ("skills", &["kỹ năng", "skills", "chuyên môn", "expertise", "năng lực"]),
    ("projects", &["dự án", "projects", "portfolio"]),
    ("certifications", &["chứng chỉ", "certificates", "certifications"]),
    ("languages", &["ngoại ngữ", "languages", "ngôn ngữ"]),
    ("objectives", &["mục tiêu", "objective", "goals", "career objective"]),
];

static GENERIC_RULES: LazyLock<SectionRules> =
    LazyLock::new(|| SectionRules::new(GENERIC_HEADERS));

static CV_RULES: LazyLock<SectionRules> = LazyLock::new(|| SectionRules::new(CV_HEADERS));

/// Characters allowed between a header keyword and the rest of its line.
fn is_header_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '-' | '|' | '–' | '—')
}

/// A set of section names and the header keywords that open them.
#[derive(Debug)]
pub struct SectionRules {
    rules: Vec<SectionRule>,
}

#[derive(Debug)]
struct SectionRule {
    name: &'static str,
    /// Matches any keyword at the start of a line, as a whole word.
    header: Regex,
}

impl SectionRules {
    /// Build rules from `(section name, header keywords)` pairs.
    ///
    /// Panics if a keyword produces an invalid regex, which can only happen
    /// with our own static tables.
    fn new(table: &[(&'static str, &[&'static str])]) -> Self {
        let rules = table
            .iter()
            .map(|&(name, keywords)| {
                let mut keywords = keywords.to_vec();
                // Longest first, so "career objective" beats "career".
                keywords.sort_by_key(|kw| std::cmp::Reverse(kw.chars().count()));
                let alternatives = keywords
                    .iter()
                    .map(|kw| regex::escape(kw))
                    .collect::<Vec<_>>()
                    .join("|");
                let header = Regex::new(&format!(r"(?i)^(?:{})\b", alternatives))
                    .expect("failed to compile regex");
                SectionRule { name, header }
            })
            .collect();
        Self { rules }
    }

    /// Headers for name, email, phone, location, experience, education and
    /// skills.
    pub fn generic() -> &'static SectionRules {
        &GENERIC_RULES
    }

    /// Headers for the major sections of a CV.
    pub fn cv() -> &'static SectionRules {
        &CV_RULES
    }

    /// If `line` is a header, return its section name and the rest of the
    /// line. When several sections match, the longest keyword wins, then the
    /// earliest rule.
    fn match_header<'a>(&self, line: &'a str) -> Option<(&'static str, &'a str)> {
        let mut best: Option<(&'static str, usize)> = None;
        for rule in &self.rules {
            if let Some(m) = rule.header.find(line)
                && best.is_none_or(|(_, end)| m.end() > end)
            {
                best = Some((rule.name, m.end()));
            }
        }
        best.map(|(name, end)| (name, line[end..].trim_start_matches(is_header_separator)))
    }
}

/// Named sections of a document, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionMap {
    entries: Vec<(String, String)>,
}

impl SectionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a section's text. A repeated section keeps its original position
    /// but takes the new text.
    pub fn insert(&mut self, name: &str, text: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = text;
        } else {
            self.entries.push((name.to_owned(), text));
        }
    }

    /// Look up a section by exact name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.as_str())
    }

    /// Iterate over `(name, text)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    /// Section names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, text) in &self.entries {
            map.serialize_entry(name, text)?;
        }
        map.end()
    }
}

impl JsonSchema for SectionMap {
    fn schema_name() -> String {
        "SectionMap".to_owned()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        <HashMap<String, String>>::json_schema(generator)
    }
}

/// Split `text` into sections.
///
/// Lines are trimmed. A line starting with a header keyword opens a section,
/// and anything after the keyword and its separator becomes the section's
/// first line. Lines before the first header go into [`PERSONAL_SECTION`].
/// Sections with no content are left out.
pub fn detect_sections(text: &str, rules: &SectionRules) -> SectionMap {
    let mut sections = SectionMap::new();
    let mut current = PERSONAL_SECTION;
    let mut content = Vec::<&str>::new();

    let mut flush = |name: &str, content: &mut Vec<&str>| {
        let text = content.join("\n").trim().to_owned();
        content.clear();
        if !text.is_empty() {
            sections.insert(name, text);
        }
    };

    for line in text.lines().map(str::trim) {
        if let Some((name, rest)) = rules.match_header(line) {
            flush(current, &mut content);
            current = name;
            if !rest.is_empty() {
                content.push(rest);
            }
        } else {
            content.push(line);
        }
    }
    flush(current, &mut content);
    sections
}
