use std::io::{self, BufRead as _, Write as _};

/// Destination for everything the standard library prints.
///
/// The runtime holds exactly one writer; swapping it is how embedders capture
/// or silence program output. Write failures are swallowed - a broken host
/// stdout must not take the interpreter down.
pub trait PrintWriter: Send {
    /// Writes `text` verbatim, without adding a newline.
    fn write(&mut self, text: &str);

    /// Writes the line terminator.
    fn push_newline(&mut self) {
        self.write("\n");
    }

    /// Hands back everything captured so far, if this writer captures.
    ///
    /// `StdPrint` and `NoPrint` return `None`; `CollectStringPrint` drains
    /// its buffer.
    fn take_output(&mut self) -> Option<String> {
        None
    }
}

/// Default writer: pass through to the process stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write(&mut self, text: &str) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(text.as_bytes());
        let _ = lock.flush();
    }
}

/// Writer that collects all output into a string, for capture and tests.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn write(&mut self, text: &str) {
        self.0.push_str(text);
    }

    fn take_output(&mut self) -> Option<String> {
        Some(std::mem::take(&mut self.0))
    }
}

/// Writer that drops everything.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write(&mut self, _text: &str) {}
}

/// Source for `GIMME` and friends.
pub trait InputReader: Send {
    /// Reads one line without its terminator; `None` at end of input.
    fn read_line(&mut self) -> Option<String>;
}

/// Default reader: one line from process stdin.
#[derive(Debug, Default)]
pub struct StdInput;

impl InputReader for StdInput {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line).ok()?;
        if read == 0 {
            return None;
        }
        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        Some(line)
    }
}

/// Reader that is always at end of input.
#[derive(Debug, Default)]
pub struct NoInput;

impl InputReader for NoInput {
    fn read_line(&mut self) -> Option<String> {
        None
    }
}
