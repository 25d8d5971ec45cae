use crate::regex::Regex;
use std::sync::LazyLock;

static ISSN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{3}[\dXx]$").unwrap());

/// Normalizes text for comparison: removes braces, collapses whitespace and lowercases.
///
/// BibTeX values often carry protective braces (`{IEEE}`) or line-wrapped
/// whitespace, neither of which changes what the value means.
///
/// # Arguments
///
/// * `text` - The text to normalize
pub(crate) fn normalize_text(text: &str) -> String {
    text.replace(['{', '}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns true if two field values are equal after normalization.
pub(crate) fn values_match(a: &str, b: &str) -> bool {
    normalize_text(a) == normalize_text(b)
}

/// Extracts the numeric value of a year string, ignoring any non-digit characters.
///
/// Returns `None` when the string carries no digits at all.
pub(crate) fn year_value(year: &str) -> Option<u32> {
    let digits: String = year.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Cleans a single-line field value: joins wrapped lines and trims.
pub(crate) fn clean_value(value: &str) -> String {
    value
        .replace(['\r', '\n'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits text into lowercase alphanumeric tokens.
///
/// `"2025 IEEE/CVF Conference (CVPR)"` yields `["2025", "ieee", "cvf", "conference", "cvpr"]`.
pub(crate) fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Checks whether a string looks like an ISSN (`1234-567X`).
pub(crate) fn is_issn(value: &str) -> bool {
    ISSN_REGEX.is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("IEEE Access", "ieee access")]
    #[case("{IEEE} Access", "ieee access")]
    #[case("  Neural\n   Networks ", "neural networks")]
    #[case("", "")]
    #[case("{{Proceedings}} of {AAAI}", "proceedings of aaai")]
    fn test_normalize_text(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_text(input), expected);
    }

    #[test]
    fn test_values_match() {
        assert!(values_match("June", " june"));
        assert!(values_match("{IEEE}", "IEEE"));
        assert!(!values_match("May", "June"));
    }

    #[rstest]
    #[case("2024", Some(2024))]
    #[case(" 2023 ", Some(2023))]
    #[case("{2022}", Some(2022))]
    #[case("n.d.", None)]
    #[case("", None)]
    fn test_year_value(#[case] input: &str, #[case] expected: Option<u32>) {
        assert_eq!(year_value(input), expected);
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("New York,\n  NY, USA"), "New York, NY, USA");
        assert_eq!(clean_value("  IEEE  "), "IEEE");
    }

    #[test]
    fn test_tokens() {
        assert_eq!(
            tokens("2025 IEEE/CVF Conference (CVPR)"),
            vec!["2025", "ieee", "cvf", "conference", "cvpr"]
        );
        assert_eq!(tokens("IJCAI-25"), vec!["ijcai", "25"]);
        assert!(tokens("--").is_empty());
    }

    #[rstest]
    #[case("1939-3539", true)]
    #[case("1556-472X", true)]
    #[case("1556-472x", true)]
    #[case("15564729", false)]
    #[case("979-8-3315-4364-8", false)]
    fn test_is_issn(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_issn(input), expected);
    }
}
