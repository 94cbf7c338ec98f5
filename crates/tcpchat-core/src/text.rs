//! Text filtering for untrusted client input.
//!
//! Clients are usually `nc` or `telnet`, so lines arrive with whatever the
//! terminal produced: carriage returns, backspaces, arrow-key escapes.
//! Only printable ASCII survives into names and chat lines.

/// Escape sequences emitted by arrow keys in a raw terminal.
const ARROW_KEYS: [&str; 4] = [
    "\x1b[A", // up
    "\x1b[B", // down
    "\x1b[C", // right
    "\x1b[D", // left
];

/// Keeps only printable ASCII characters (32..=126).
pub fn filter_printable(input: &str) -> String {
    input.chars().filter(|c| (' '..='~').contains(c)).collect()
}

/// Filters non-printable characters, then trims surrounding whitespace.
pub fn sanitize(input: &str) -> String {
    filter_printable(input).trim().to_string()
}

/// Returns true if the input contains any arrow-key escape sequence.
pub fn contains_arrow_key(input: &str) -> bool {
    ARROW_KEYS.iter().any(|key| input.contains(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_printable_ascii() {
        assert_eq!(filter_printable("hello world ~!"), "hello world ~!");
    }

    #[test]
    fn test_filter_strips_control_and_non_ascii() {
        assert_eq!(filter_printable("a\tb\x07c\r"), "abc");
        assert_eq!(filter_printable("caf\u{e9}"), "caf");
        assert_eq!(filter_printable("\x1b[Aup"), "[Aup");
    }

    #[test]
    fn test_sanitize_trims_after_filtering() {
        assert_eq!(sanitize("  \x07 hi \r"), "hi");
        assert_eq!(sanitize("\x00\x01"), "");
    }

    #[test]
    fn test_arrow_key_detection() {
        assert!(contains_arrow_key("\x1b[A"));
        assert!(contains_arrow_key("name\x1b[D"));
        assert!(!contains_arrow_key("[A"));
        assert!(!contains_arrow_key("plain"));
    }
}
