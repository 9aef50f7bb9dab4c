//! Small shared helpers: wall-clock readings and string truncation.

pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn now_rfc3339() -> String {
    let now = std::time::SystemTime::now();
    let datetime: chrono::DateTime<chrono::Utc> = now.into();
    datetime.to_rfc3339()
}

/// Truncate `text` to at most `limit` characters, appending a marker with the
/// number of characters dropped. Returns `None` when the text already fits.
pub fn truncate_chars(text: &str, limit: usize) -> Option<String> {
    let total = text.chars().count();
    if total <= limit {
        return None;
    }
    let kept: String = text.chars().take(limit).collect();
    Some(format!(
        "{kept}\n[result truncated: {} characters omitted]",
        total - limit
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_not_truncated() {
        assert!(truncate_chars("hello", 10).is_none());
        assert!(truncate_chars("hello", 5).is_none());
    }

    #[test]
    fn long_text_is_truncated_with_marker() {
        let truncated = truncate_chars("abcdefghij", 4).expect("truncated");
        assert!(truncated.starts_with("abcd"));
        assert!(truncated.contains("6 characters omitted"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let truncated = truncate_chars("ééééé", 3).expect("truncated");
        assert!(truncated.starts_with("ééé"));
        assert!(truncated.contains("2 characters omitted"));
    }
}
