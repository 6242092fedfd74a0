//! Virtual text display for the kiosk screen.
//!
//! The kiosk renders every screen into a fixed grid of character lines. The
//! terminal front end prints the grid; tests read it back line by line.
//!
//! # Display Specifications
//!
//! - **Size**: 4 lines x 64 columns by default
//! - **Wrapping**: [`show_message`](VirtualDisplay::show_message) word-wraps
//!   long text over the available lines
//! - **Truncation**: single lines longer than the width are cut
//! - **Sanitization**: control characters are removed
//!
//! # Examples
//!
//! ```
//! use toolgate_kiosk::{KioskState, VirtualDisplay};
//!
//! let mut display = VirtualDisplay::builder().with_size(2, 40).build();
//! display.update_from_state(&KioskState::Authenticating);
//! assert_eq!(display.get_line(0).unwrap().trim(), "Checking access...");
//! ```

use toolgate_core::constants::{MSG_ACCESS_DENIED, MSG_CHECKING, MSG_PROMPT, MSG_THANK_YOU};
use toolgate_core::{Error, Result, SessionDuration, UserName};

use crate::KioskState;

const DEFAULT_LINES: usize = 4;

const DEFAULT_COLUMNS: usize = 64;

/// Text alignment options for display lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// Character-grid screen of the kiosk.
#[derive(Debug, Clone)]
pub struct VirtualDisplay {
    lines: usize,
    columns: usize,
    buffer: Vec<String>,
    default_message: String,
}

impl VirtualDisplay {
    /// Create a display showing `default_message`.
    pub fn new(lines: usize, columns: usize, default_message: String) -> Self {
        let mut display = Self {
            lines: lines.max(1),
            columns: columns.max(1),
            buffer: Vec::new(),
            default_message,
        };
        display.reset_to_default();
        display
    }

    pub fn builder() -> VirtualDisplayBuilder {
        VirtualDisplayBuilder::default()
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Set text on one line, left aligned.
    ///
    /// # Errors
    /// Returns `Error::InvalidLine` if `line` is out of range.
    pub fn set_line(&mut self, line: usize, text: &str) -> Result<()> {
        self.set_line_aligned(line, text, Alignment::Left)
    }

    /// Set text on one line with the given alignment.
    ///
    /// # Errors
    /// Returns `Error::InvalidLine` if `line` is out of range.
    pub fn set_line_aligned(&mut self, line: usize, text: &str, align: Alignment) -> Result<()> {
        if line >= self.lines {
            return Err(Error::InvalidLine {
                line,
                max: self.lines - 1,
            });
        }

        let sanitized = sanitize_text(text);
        self.buffer[line] = align_text(&sanitized, self.columns, align);
        Ok(())
    }

    /// Replace the whole screen with centered, word-wrapped text.
    ///
    /// Text that does not fit is cut after the last line.
    pub fn show_message(&mut self, text: &str) {
        self.clear();
        let wrapped = wrap_text(&sanitize_text(text), self.columns);
        for (i, row) in wrapped.iter().take(self.lines).enumerate() {
            self.buffer[i] = align_text(row, self.columns, Alignment::Center);
        }
    }

    /// Show a headline with a centered detail on the last line.
    pub fn show_with_detail(&mut self, headline: &str, detail: &str) {
        self.show_message(headline);
        let last = self.lines - 1;
        self.buffer[last] = align_text(&sanitize_text(detail), self.columns, Alignment::Center);
    }

    pub fn clear(&mut self) {
        self.buffer = vec![" ".repeat(self.columns); self.lines];
    }

    pub fn reset_to_default(&mut self) {
        let message = self.default_message.clone();
        self.show_message(&message);
    }

    /// Render the generic screen for a workflow state.
    pub fn update_from_state(&mut self, state: &KioskState) {
        match state {
            KioskState::AwaitingCredential => self.reset_to_default(),
            KioskState::Authenticating => self.show_message(MSG_CHECKING),
            KioskState::AccessGranted => self.show_message("Access granted."),
            KioskState::AccessDenied => self.show_message(MSG_ACCESS_DENIED),
            KioskState::TimerRunning => self.show_with_detail("Session in progress", "00:00:00"),
            KioskState::UsageInput => self.show_message("Enter the amount used."),
            KioskState::Settlement => self.show_message("Session complete."),
            KioskState::Terminal => self.show_message(MSG_THANK_YOU),
        }
    }

    /// Welcome screen after a grant.
    pub fn show_welcome(&mut self, user: &UserName) {
        self.show_message(&format!("Welcome, {user}. Access granted."));
    }

    /// Refresh the running clock on the last line.
    pub fn show_elapsed(&mut self, elapsed: SessionDuration) {
        self.show_with_detail("Session in progress", &elapsed.clock_face());
    }

    /// Get the text of a specific line, padded to the display width.
    ///
    /// # Errors
    /// Returns `Error::InvalidLine` if `line` is out of range.
    pub fn get_line(&self, line: usize) -> Result<&str> {
        if line >= self.lines {
            return Err(Error::InvalidLine {
                line,
                max: self.lines - 1,
            });
        }
        Ok(&self.buffer[line])
    }

    pub fn get_all_lines(&self) -> Vec<&str> {
        self.buffer.iter().map(|s| s.as_str()).collect()
    }

    /// Non-blank lines, trimmed, joined with spaces.
    pub fn text(&self) -> String {
        self.buffer
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the default prompt is showing.
    pub fn is_default(&self) -> bool {
        let mut expected = self.clone();
        expected.reset_to_default();
        expected.buffer == self.buffer
    }

    /// Frame the screen for printing to a terminal.
    pub fn render(&self) -> String {
        let border = format!("+{}+", "-".repeat(self.columns));
        let mut out = String::with_capacity((self.columns + 3) * (self.lines + 2));
        out.push_str(&border);
        out.push('\n');
        for line in &self.buffer {
            out.push('|');
            out.push_str(line);
            out.push_str("|\n");
        }
        out.push_str(&border);
        out
    }
}

impl Default for VirtualDisplay {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for constructing `VirtualDisplay` instances with custom configuration.
#[derive(Debug)]
pub struct VirtualDisplayBuilder {
    lines: usize,
    columns: usize,
    default_message: String,
}

impl VirtualDisplayBuilder {
    pub fn with_size(mut self, lines: usize, columns: usize) -> Self {
        self.lines = lines;
        self.columns = columns;
        self
    }

    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }

    pub fn build(self) -> VirtualDisplay {
        VirtualDisplay::new(self.lines, self.columns, self.default_message)
    }
}

impl Default for VirtualDisplayBuilder {
    fn default() -> Self {
        Self {
            lines: DEFAULT_LINES,
            columns: DEFAULT_COLUMNS,
            default_message: MSG_PROMPT.to_string(),
        }
    }
}

/// Truncate text to at most `max_chars` characters.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Pad or truncate text to exactly `width` characters.
pub fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let char_count = text.chars().count();

    if char_count >= width {
        return truncate_text(text, width);
    }

    let padding = width - char_count;

    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: String = word.to_string();
        while word.chars().count() > width {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            rows.push(truncate_text(&word, width));
            word = word.chars().skip(width).collect();
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_display_shows_prompt() {
        let display = VirtualDisplay::default();
        assert_eq!(display.get_all_lines().len(), 4);
        assert!(display.text().starts_with("Please scan your RFID tag"));
        assert!(display.is_default());
    }

    #[test]
    fn test_set_line_basic() {
        let mut display = VirtualDisplay::builder().with_size(2, 10).build();
        display.set_line(1, "hello").unwrap();
        assert_eq!(display.get_line(1).unwrap(), "hello     ");
        assert!(!display.is_default());
    }

    #[test]
    fn test_set_line_invalid_index() {
        let mut display = VirtualDisplay::builder().with_size(2, 10).build();
        let result = display.set_line(2, "x");
        assert!(matches!(result, Err(Error::InvalidLine { line: 2, max: 1 })));
    }

    #[rstest]
    #[case("abc", 7, Alignment::Left, "abc    ")]
    #[case("abc", 7, Alignment::Center, "  abc  ")]
    #[case("abc", 8, Alignment::Center, "  abc   ")]
    #[case("abc", 7, Alignment::Right, "    abc")]
    #[case("abcdefgh", 4, Alignment::Left, "abcd")]
    #[case("", 3, Alignment::Center, "   ")]
    fn test_align_text(
        #[case] text: &str,
        #[case] width: usize,
        #[case] align: Alignment,
        #[case] expected: &str,
    ) {
        assert_eq!(align_text(text, width, align), expected);
    }

    #[rstest]
    #[case("Access Denied. Please try again.", 16, vec!["Access Denied.", "Please try", "again."])]
    #[case("short", 16, vec!["short"])]
    #[case("abcdefghij klm", 4, vec!["abcd", "efgh", "ij", "klm"])]
    #[case("   ", 8, vec![])]
    fn test_wrap_text(#[case] text: &str, #[case] width: usize, #[case] expected: Vec<&str>) {
        assert_eq!(wrap_text(text, width), expected);
    }

    #[test]
    fn test_show_message_wraps_and_centers() {
        let mut display = VirtualDisplay::builder().with_size(3, 20).build();
        display.show_message("Access Denied. Please try again.");
        assert_eq!(display.get_line(0).unwrap(), "   Access Denied.   ");
        assert_eq!(display.get_line(1).unwrap().trim(), "Please try again.");
        assert_eq!(display.get_line(2).unwrap().trim(), "");
    }

    #[test]
    fn test_overflow_is_cut() {
        let mut display = VirtualDisplay::builder().with_size(1, 10).build();
        display.show_message("one two three four");
        assert_eq!(display.text(), "one two");
    }

    #[rstest]
    #[case(KioskState::Authenticating, "Checking access...")]
    #[case(KioskState::AccessDenied, "Access Denied. Please try again.")]
    #[case(KioskState::Terminal, "Thank you for using the workstation.")]
    #[case(KioskState::TimerRunning, "Session in progress 00:00:00")]
    fn test_update_from_state(#[case] state: KioskState, #[case] expected: &str) {
        let mut display = VirtualDisplay::default();
        display.update_from_state(&state);
        assert_eq!(display.text(), expected);
    }

    #[test]
    fn test_awaiting_credential_restores_default() {
        let mut display = VirtualDisplay::default();
        display.update_from_state(&KioskState::AccessDenied);
        assert!(!display.is_default());
        display.update_from_state(&KioskState::AwaitingCredential);
        assert!(display.is_default());
    }

    #[test]
    fn test_show_elapsed() {
        let mut display = VirtualDisplay::default();
        display.show_elapsed(SessionDuration::from_secs(3725));
        assert_eq!(display.get_line(3).unwrap().trim(), "01:02:05");
    }

    #[test]
    fn test_welcome_names_user() {
        let mut display = VirtualDisplay::default();
        display.show_welcome(&UserName::new(Some("Jane"), Some("Doe")));
        assert_eq!(display.text(), "Welcome, Jane Doe. Access granted.");
    }

    #[test]
    fn test_control_characters_removed() {
        let mut display = VirtualDisplay::builder().with_size(1, 12).build();
        display.set_line(0, "ab\x07c\td").unwrap();
        assert_eq!(display.get_line(0).unwrap().trim(), "abcd");
    }

    #[test]
    fn test_render_frames_grid() {
        let display = VirtualDisplay::builder()
            .with_size(2, 4)
            .with_default_message("hi")
            .build();
        assert_eq!(display.render(), "+----+\n| hi |\n|    |\n+----+");
    }
}
