//! Chat lines as they are broadcast and written to the transcript.

use std::fmt;

use chrono::{DateTime, Local};

use crate::session::DisplayName;
use crate::text::sanitize;

/// Timestamp layout used in chat lines, e.g. `2024-03-01 14:05:09`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One chat message from a named session.
///
/// Renders as `[<timestamp>][<name>]: <text>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    timestamp: DateTime<Local>,
    name: DisplayName,
    text: String,
}

impl ChatLine {
    /// Builds a chat line stamped with the current local time.
    ///
    /// Returns `None` if nothing printable remains of `raw_text`.
    pub fn new(name: DisplayName, raw_text: &str) -> Option<Self> {
        Self::at(Local::now(), name, raw_text)
    }

    /// Builds a chat line with an explicit timestamp.
    pub fn at(timestamp: DateTime<Local>, name: DisplayName, raw_text: &str) -> Option<Self> {
        let text = sanitize(raw_text);
        if text.is_empty() {
            return None;
        }
        Some(Self {
            timestamp,
            name,
            text,
        })
    }

    /// Returns the sender's name.
    pub fn name(&self) -> &DisplayName {
        &self.name
    }

    /// Returns the filtered message text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}]: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.name,
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn name(s: &str) -> DisplayName {
        DisplayName::parse(s).unwrap()
    }

    #[test]
    fn test_chat_line_format() {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
        let line = ChatLine::at(ts, name("alice"), "hello").unwrap();
        assert_eq!(line.to_string(), "[2024-03-01 14:05:09][alice]: hello");
    }

    #[test]
    fn test_chat_line_filters_text() {
        let line = ChatLine::new(name("bob"), "  hi\x07 there\r ").unwrap();
        assert_eq!(line.text(), "hi there");
        assert_eq!(line.name(), &name("bob"));
    }

    #[test]
    fn test_chat_line_rejects_unprintable_only() {
        assert!(ChatLine::new(name("bob"), "\x01\x02\x03").is_none());
        assert!(ChatLine::new(name("bob"), "   ").is_none());
    }
}
