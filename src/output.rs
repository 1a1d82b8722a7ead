//! Output sinks for built-in commands.
//!
//! The engine imposes no contract on a writer beyond accepting text; hosts
//! swap in their own sink through `Engine::set_output_writer`.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Settable text sink used by built-in commands.
pub trait OutputWriter {
    fn write_line(&mut self, line: &str);
}

/// Writes each line to the process standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutWriter;

impl OutputWriter for StdoutWriter {
    fn write_line(&mut self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
    }
}

/// Memory-backed writer for capturing output.
pub struct CapturedOutput {
    lines: Rc<RefCell<Vec<String>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        CapturedOutput {
            lines: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Convenience: create a writer and return it together with the shared
    /// handle the collected lines can be read through afterwards.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<String>>>) {
        let writer = CapturedOutput::new();
        let handle = writer.lines.clone();
        (writer, handle)
    }
}

impl Default for CapturedOutput {
    fn default() -> Self {
        CapturedOutput::new()
    }
}

impl OutputWriter for CapturedOutput {
    fn write_line(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_output_collects_lines_in_order() {
        let (mut writer, handle) = CapturedOutput::with_handle();

        writer.write_line("first");
        writer.write_line("second");

        assert_eq!(*handle.borrow(), vec!["first", "second"]);
    }
}
