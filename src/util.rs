//! Small shared helpers.

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Resolve a month given as a number or a full month name. Anything else is
/// treated as a season and carried through verbatim by the caller.
pub(crate) fn normalize_month(month: &str) -> Option<u32> {
    let trimmed = month.trim();
    if let Ok(num) = trimmed.parse::<u32>() {
        return (1..=12).contains(&num).then_some(num);
    }
    MONTH_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(trimmed))
        .map(|i| i as u32 + 1)
}

/// Capitalize the first letter of each word.
pub(crate) fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The numeric tail of a source id, used as an affiliation label fallback
/// ("aff1" -> "1").
pub(crate) fn numeric_tail(id: &str) -> String {
    let start = id.find(|c: char| c.is_ascii_digit()).unwrap_or(id.len());
    id[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_month() {
        assert_eq!(normalize_month("3"), Some(3));
        assert_eq!(normalize_month("03"), Some(3));
        assert_eq!(normalize_month("November"), Some(11));
        assert_eq!(normalize_month("november"), Some(11));
        assert_eq!(normalize_month("Autumn"), None);
        assert_eq!(normalize_month("13"), None);
    }

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize_words("acknowledgements"), "Acknowledgements");
        assert_eq!(capitalize_words("major datasets"), "Major Datasets");
    }

    #[test]
    fn test_numeric_tail() {
        assert_eq!(numeric_tail("aff12"), "12");
        assert_eq!(numeric_tail("A1"), "1");
        assert_eq!(numeric_tail("aff"), "");
    }
}
