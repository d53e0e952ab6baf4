//! Finding the advertised position in a job description.

use std::sync::LazyLock;

use regex::Regex;

/// Labels that usually introduce a job title, most specific first.
static LABELLED_TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:vị trí|position|chức danh|job title|role)[:\s]*([^\n\r]{5,50})",
        r"(?i)\b(?:tuyển dụng|hiring|tìm kiếm)[:\s]*([^\n\r]{5,50})",
        r"(?i)\b(?:cần tuyển|we need|looking for)[:\s]*([^\n\r]{5,50})",
        r"(?i)\b(?:mô tả công việc|job description)[:\s]*([^\n\r]{5,50})",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("failed to compile regex"))
    .collect()
});

/// Characters we strip from a labelled title.
static TITLE_JUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("failed to compile regex"));

/// Words that suggest a line is a job title.
const JOB_KEYWORDS: &[&str] = &[
    "developer",
    "engineer",
    "manager",
    "analyst",
    "designer",
    "specialist",
    "coordinator",
    "assistant",
    "senior",
    "junior",
    "lead",
    "kỹ sư",
    "chuyên viên",
    "quản lý",
    "trưởng",
    "phó",
];

/// Only look for unlabelled titles this close to the top.
const FALLBACK_LINES: usize = 10;

/// Length limits, in characters.
const MIN_TITLE_LEN: usize = 5;
const MAX_LABELLED_TITLE_LEN: usize = 50;
const MAX_FALLBACK_TITLE_LEN: usize = 60;

/// Find the job position advertised in `text`.
///
/// We first look for a labelled title ("Position: ...", "Vị trí: ..."). If
/// there isn't one, we take the first short line near the top that contains a
/// job keyword.
pub fn extract_job_position(text: &str) -> Option<String> {
    labelled_title(text).or_else(|| keyword_line(text))
}

fn labelled_title(text: &str) -> Option<String> {
    LABELLED_TITLE_PATTERNS.iter().find_map(|pattern| {
        let captured = pattern.captures(text)?.get(1)?.as_str();
        let title = TITLE_JUNK.replace_all(captured.trim(), "");
        let title = title.trim();
        let len = title.chars().count();
        (MIN_TITLE_LEN..=MAX_LABELLED_TITLE_LEN)
            .contains(&len)
            .then(|| title.to_owned())
    })
}

fn keyword_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(FALLBACK_LINES)
        .find(|line| {
            let lower = line.to_lowercase();
            let len = line.chars().count();
            (MIN_TITLE_LEN..=MAX_FALLBACK_TITLE_LEN).contains(&len)
                && JOB_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_labelled_titles() {
        assert_eq!(
            extract_job_position("ACME Corp\nPosition: Backend Developer (Rust)!\nSalary: 2000 USD")
                .as_deref(),
            Some("Backend Developer Rust")
        );
        assert_eq!(
            extract_job_position("Công ty ABC\nVị trí: Kỹ sư phần mềm\n").as_deref(),
            Some("Kỹ sư phần mềm")
        );
    }

    #[test]
    fn job_description_label_may_be_on_its_own_line() {
        assert_eq!(
            extract_job_position("JOB DESCRIPTION\n\nData Analyst - Hanoi\nDetails").as_deref(),
            Some("Data Analyst - Hanoi")
        );
    }

    #[test]
    fn falls_back_to_keyword_lines() {
        let text = "ACME Corp\n\nSenior QA Engineer\nWe build things.";
        assert_eq!(
            extract_job_position(text).as_deref(),
            Some("Senior QA Engineer")
        );
    }

    #[test]
    fn ignores_keywords_far_down_or_in_long_lines() {
        let mut text = (1..=10).map(|n| format!("Line {}\n", n)).collect::<String>();
        text.push_str("Engineer\n");
        assert_eq!(extract_job_position(&text), None);

        let long = format!("Engineer {}", "x".repeat(60));
        assert_eq!(extract_job_position(&long), None);
    }

    #[test]
    fn nothing_found_in_plain_text() {
        assert_eq!(extract_job_position("Hello\nWorld"), None);
        assert_eq!(extract_job_position(""), None);
    }
}
