//! Diagnostic text collection.
//!
//! Toolchain logs put the relevant error near the end, so the bounded
//! diagnostics keep the tail.

/// Merge a process's stdout and stderr into one lossily decoded log.
pub fn combine_streams(stdout: &[u8], stderr: &[u8]) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(stdout),
        String::from_utf8_lossy(stderr)
    )
}

/// The last at most `limit` bytes of `text`, cut on a character boundary.
pub fn tail(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(tail("abc", 5), "abc");
        assert_eq!(tail("", 0), "");
    }

    #[test]
    fn test_keeps_tail() {
        let log = format!("{}! Undefined control sequence.", "x".repeat(100));
        let kept = tail(&log, 30);
        assert_eq!(kept.len(), 30);
        assert!(kept.ends_with("! Undefined control sequence."));
    }

    #[test]
    fn test_never_splits_a_character() {
        // 'é' is two bytes; a cut in the middle must move forward.
        let text = "aéééé";
        for limit in 0..text.len() {
            let kept = tail(text, limit);
            assert!(kept.len() <= limit);
            assert!(text.ends_with(kept));
        }
    }

    #[test]
    fn test_combine_streams() {
        assert_eq!(combine_streams(b"out", b"err"), "out\nerr");
        assert_eq!(combine_streams(&[0xff], b""), "\u{fffd}\n");
    }
}
