//! Console output seam
//!
//! `print` writes through [`Console`] so programs can run against stdout in
//! the CLI and against a capturing console in tests.

use std::io::Write;

use parking_lot::Mutex;

/// Where program output goes. Shared with spawned threads.
pub trait Console: Send + Sync {
    fn println(&self, text: &str);
}

/// Real console writing to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn println(&self, text: &str) {
        // One locked write per line keeps lines from different threads whole.
        let _ = writeln!(std::io::stdout().lock(), "{}", text);
    }
}

/// Mock console for testing
#[derive(Debug, Default)]
pub struct MockConsole {
    output: Mutex<Vec<String>>,
}

impl MockConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured output split into lines
    pub fn lines(&self) -> Vec<String> {
        self.output
            .lock()
            .concat()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Console for MockConsole {
    fn println(&self, text: &str) {
        self.output.lock().push(format!("{}\n", text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_console_captures_lines() {
        let console = MockConsole::new();
        console.println("a");
        console.println("b c");
        assert_eq!(console.lines(), vec!["a", "b c"]);
    }
}
