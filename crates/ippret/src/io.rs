use std::{
    borrow::Cow,
    io::{self, BufRead, Write as _},
};

/// Trait for handling the interpreted program's two output streams.
///
/// Implement this to capture or redirect `WRITE` output and the `DPRINT`/
/// `BREAK` diagnostics. The default implementation [`StdOutput`] writes to
/// the process stdout/stderr.
pub trait ProgramOutput {
    /// Called for each `WRITE`; the text carries no added separators or
    /// newlines.
    fn write_stdout(&mut self, text: Cow<'_, str>) -> io::Result<()>;

    /// Called for diagnostic output (`DPRINT`, `BREAK`).
    fn write_stderr(&mut self, text: Cow<'_, str>) -> io::Result<()>;
}

/// Default `ProgramOutput` writing to the process streams.
///
/// Stdout is buffered and flushed when the writer is dropped; stderr is
/// written immediately. Buffering stdout keeps diagnostics readable when both
/// streams go to a terminal: stderr lines appear before the buffered program
/// output, and the program bytes themselves are unaffected.
#[derive(Debug, Default)]
pub struct StdOutput {
    buffer: String,
}

impl StdOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgramOutput for StdOutput {
    fn write_stdout(&mut self, text: Cow<'_, str>) -> io::Result<()> {
        self.buffer.push_str(&text);
        Ok(())
    }

    fn write_stderr(&mut self, text: Cow<'_, str>) -> io::Result<()> {
        io::stderr().write_all(text.as_bytes())
    }
}

impl Drop for StdOutput {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let _ = io::stdout().write_all(self.buffer.as_bytes());
        let _ = io::stdout().flush();
        self.buffer.clear();
    }
}

/// A `ProgramOutput` that collects both streams into strings.
///
/// Useful for testing or capturing program output programmatically.
#[derive(Debug, Default)]
pub struct CollectOutput {
    stdout: String,
    stderr: String,
}

impl CollectOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected `WRITE` output.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// The collected diagnostic output.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Consumes the writer and returns the collected `WRITE` output.
    #[must_use]
    pub fn into_stdout(self) -> String {
        self.stdout
    }
}

impl ProgramOutput for CollectOutput {
    fn write_stdout(&mut self, text: Cow<'_, str>) -> io::Result<()> {
        self.stdout.push_str(&text);
        Ok(())
    }

    fn write_stderr(&mut self, text: Cow<'_, str>) -> io::Result<()> {
        self.stderr.push_str(&text);
        Ok(())
    }
}

/// A `ProgramOutput` that discards everything.
#[derive(Debug, Default)]
pub struct NoOutput;

impl ProgramOutput for NoOutput {
    fn write_stdout(&mut self, _text: Cow<'_, str>) -> io::Result<()> {
        Ok(())
    }

    fn write_stderr(&mut self, _text: Cow<'_, str>) -> io::Result<()> {
        Ok(())
    }
}

/// Linewise reader for the interpreted program's input stream.
///
/// `READ` consumes one line per call; EOF is sticky and reported as `None`.
#[derive(Debug)]
pub(crate) struct ProgramInput<R> {
    reader: R,
    eof: bool,
}

impl<R: BufRead> ProgramInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, eof: false }
    }

    /// Reads the next line including its terminator; `None` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            self.eof = true;
            return Ok(None);
        }
        Ok(Some(line))
    }
}
