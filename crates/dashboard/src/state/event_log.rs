use std::time::SystemTime;

use humantime::format_rfc3339_seconds;

/// Append-only operator log bounded to `max_chars` characters.
///
/// Overflow drops the oldest text first; the cut lands on a char boundary so
/// the retained tail is always valid UTF-8 and never longer than the cap.
pub(crate) struct EventLog {
    text: String,
    chars: usize,
    max_chars: usize,
}

impl EventLog {
    pub(crate) fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            max_chars,
        }
    }

    /// Appends a timestamped line and returns it as written.
    pub(crate) fn append(&mut self, message: &str) -> String {
        let line = format!("[{}] {}", format_rfc3339_seconds(SystemTime::now()), message);
        self.push_line(&line);
        line
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.chars += line.chars().count() + 1;
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        if self.chars <= self.max_chars {
            return;
        }
        let excess = self.chars - self.max_chars;
        let cut = self
            .text
            .char_indices()
            .nth(excess)
            .map(|(index, _)| index)
            .unwrap_or(self.text.len());
        self.text.drain(..cut);
        self.chars -= excess;
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_timestamped_lines() {
        let mut log = EventLog::new(9_000);
        let line = log.append("Workspace selected");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] Workspace selected"));
        assert_eq!(log.as_str(), format!("{line}\n"));
    }

    #[test]
    fn never_exceeds_cap_and_drops_oldest_first() {
        let mut log = EventLog::new(9_000);
        for index in 0..2_000 {
            log.push_line(&format!("entry {index:05}"));
            assert!(log.as_str().chars().count() <= 9_000);
        }
        assert!(log.as_str().ends_with("entry 01999\n"));
        assert!(!log.as_str().contains("entry 00000"));
        assert_eq!(log.as_str().chars().count(), 9_000);
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        let mut log = EventLog::new(10);
        log.push_line("ééééé");
        log.push_line("ñññ");
        assert!(log.as_str().chars().count() <= 10);
        assert!(log.as_str().ends_with("ñññ\n"));
    }

    #[test]
    fn single_line_longer_than_cap_keeps_its_tail() {
        let mut log = EventLog::new(4);
        log.push_line("abcdefgh");
        assert_eq!(log.as_str(), "fgh\n");
    }
}
