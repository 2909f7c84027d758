/// Normalizes a free-text note: CRLF line endings become LF, and a note
/// that is empty or only whitespace is absent.
#[must_use]
pub fn normalize_note(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    Some(text.replace("\r\n", "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(normalize_note("a\r\nb\r\n").as_deref(), Some("a\nb\n"));
    }

    #[test]
    fn blank_notes_are_absent() {
        assert_eq!(normalize_note(""), None);
        assert_eq!(normalize_note(" \r\n\t"), None);
    }

    #[test]
    fn lone_carriage_returns_are_kept() {
        assert_eq!(normalize_note("a\rb").as_deref(), Some("a\rb"));
    }
}
