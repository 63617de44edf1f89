//! Text helpers shared by the completion strategies.

/// Leading-space marker understood by the editor's rich-text renderer.
pub const NBSP: &str = "&nbsp;";

/// Editor content encodes spaces it must keep as `&nbsp;`; the models see plain spaces.
pub fn normalize_input(text: &str) -> String {
    text.replace(NBSP, " ").replace('\u{a0}', " ")
}

/// Strips `prefix` from `haystack` comparing characters case-insensitively.
pub fn strip_prefix_ignore_case<'a>(haystack: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = haystack;
    for expected in prefix.chars() {
        let mut chars = rest.chars();
        let actual = chars.next()?;
        if actual != expected && !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        rest = chars.as_str();
    }
    Some(rest)
}

/// The word being typed at the end of `text`: empty for empty text, a single
/// space when the text ends in whitespace.
pub fn last_word(text: &str) -> &str {
    if text.is_empty() {
        ""
    } else if text.ends_with(char::is_whitespace) {
        " "
    } else {
        text.split_whitespace().last().unwrap_or("")
    }
}

/// Text before the last whitespace character, or nothing when there is none.
pub fn without_last_word(text: &str) -> &str {
    match text.rfind(char::is_whitespace) {
        Some(i) => &text[..i],
        None => "",
    }
}

/// Cuts `continuation` after its last period; keeps it whole when it has none.
pub fn truncate_at_last_period(continuation: &str) -> &str {
    match continuation.rfind('.') {
        Some(i) => &continuation[..=i],
        None => continuation,
    }
}

pub fn format_fragment(fragment: &str) -> String {
    match fragment.strip_prefix(' ') {
        Some(rest) => format!("{NBSP}{}", rest.trim_start()),
        None => fragment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prefix_ignore_case() {
        assert_eq!(strip_prefix_ignore_case("How are you", "how ARE "), Some("you"));
        assert_eq!(strip_prefix_ignore_case("How are you", ""), Some("How are you"));
        assert_eq!(strip_prefix_ignore_case("you", "How are y"), None);
        assert_eq!(strip_prefix_ignore_case("Ärger", "är"), Some("ger"));
        assert_eq!(strip_prefix_ignore_case("How", "How are"), None);
    }

    #[test]
    fn test_last_word() {
        assert_eq!(last_word(""), "");
        assert_eq!(last_word("How are "), " ");
        assert_eq!(last_word("How are y"), "y");
        assert_eq!(last_word("How are\n"), " ");
    }

    #[test]
    fn test_without_last_word() {
        assert_eq!(without_last_word("How are y"), "How are");
        assert_eq!(without_last_word("How are "), "How are");
        assert_eq!(without_last_word("How"), "");
        assert_eq!(without_last_word(""), "");
    }

    #[test]
    fn test_normalize_input() {
        assert_eq!(normalize_input("How are&nbsp;"), "How are ");
        assert_eq!(normalize_input("a\u{a0}b"), "a b");
    }

    #[test]
    fn test_truncate_at_last_period() {
        assert_eq!(truncate_at_last_period(" sat on the mat. It was happy"), " sat on the mat.");
        assert_eq!(truncate_at_last_period(" sat. It ran. And"), " sat. It ran.");
        assert_eq!(truncate_at_last_period(" sat on the mat"), " sat on the mat");
    }

    #[test]
    fn test_format_fragment() {
        assert_eq!(format_fragment(" you"), "&nbsp;you");
        assert_eq!(format_fragment("  you"), "&nbsp;you");
        assert_eq!(format_fragment("you"), "you");
        assert_eq!(format_fragment(""), "");
        assert_eq!(format_fragment("\tyou"), "\tyou");
    }
}
