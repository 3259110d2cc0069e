use std::fmt;

use crate::{frame::FrameKind, instruction::Opcode};

/// Result type alias for operations that can fail with an interpreter error.
pub type RunResult<T> = Result<T, InterpretError>;

/// Closed set of failure kinds, each carrying a process exit code.
///
/// The kinds mirror the IPPcode21 error taxonomy: 10–11 for CLI and stream
/// selection problems, 31–32 for source document problems, 52–58 for runtime
/// errors, and 99 as the internal catch-all. Runtime kinds (52–58) get a
/// context dump attached before the error leaves [`Runner::run`](crate::Runner::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum ErrorKind {
    /// Missing or duplicated command-line arguments.
    CliUsage,
    /// A source or input file could not be opened.
    InputOpen,
    /// The source document is not well-formed XML.
    XmlMalformed,
    /// The source document is well-formed but violates the program structure.
    ProgramFormat,
    /// An `instruction` element names an unknown opcode.
    InvalidOpcode,
    /// A literal or identifier does not lex as its declared type.
    Lexical,
    /// `DEFVAR` names a variable that already exists in the addressed frame.
    RedefinedVariable,
    /// `LABEL` re-registers a known label at a different program counter.
    RedefinedLabel,
    /// A jump target was not found by the end of the program.
    UndefinedLabel,
    /// An operand's type violates the instruction's argument descriptor.
    Operand,
    /// A variable reference names a variable that was never defined.
    UndefinedVariable,
    /// A variable reference addresses an absent `LF` or `TF`.
    UndefinedFrame,
    /// A defined but never-assigned variable was read.
    MissingValue,
    /// A pop from the empty operand stack.
    EmptyStack,
    /// `RETURN` with an empty call stack.
    EmptyCallStack,
    /// Division by zero, out-of-range `EXIT` code, or overflowing arithmetic.
    InvalidValue,
    /// String indexing out of bounds or an invalid ordinal value.
    StringOperation,
    /// Unexpected failure; the last-resort exit code.
    Internal,
}

impl ErrorKind {
    /// The process exit code associated with this kind.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::CliUsage => 10,
            Self::InputOpen => 11,
            Self::XmlMalformed => 31,
            Self::ProgramFormat | Self::InvalidOpcode | Self::Lexical => 32,
            Self::RedefinedVariable | Self::RedefinedLabel | Self::UndefinedLabel => 52,
            Self::Operand => 53,
            Self::UndefinedVariable => 54,
            Self::UndefinedFrame => 55,
            Self::MissingValue | Self::EmptyStack | Self::EmptyCallStack => 56,
            Self::InvalidValue => 57,
            Self::StringOperation => 58,
            Self::Internal => 99,
        }
    }

    /// True for kinds raised by a running program (exit codes 52–58).
    ///
    /// Only these errors carry a context dump; load-time and CLI errors
    /// happen before any interpreter state exists.
    #[must_use]
    pub fn is_runtime(self) -> bool {
        (52..=58).contains(&self.exit_code())
    }
}

/// Location of the instruction an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Opcode of the offending instruction.
    pub opcode: Opcode,
    /// Index of the instruction in the sorted program.
    pub pc: usize,
}

/// An interpreter error: a kind, a human-readable message, and optional
/// attribution to the instruction that raised it.
///
/// Errors are never caught and retried; any error aborts the run. For runtime
/// kinds the driver captures a full context dump (frames, stacks, PC, label
/// cache) into the error so callers can print it after the error line.
#[derive(Debug, Clone)]
pub struct InterpretError {
    kind: ErrorKind,
    message: String,
    location: Option<Location>,
    context_dump: Option<String>,
}

impl InterpretError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            context_dump: None,
        }
    }

    /// Missing or duplicated command-line arguments (exit 10).
    pub fn cli_usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CliUsage, message)
    }

    /// A file could not be opened (exit 11).
    pub fn input_open(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputOpen, message)
    }

    pub(crate) fn xml_malformed(detail: impl fmt::Display, position: u64) -> Self {
        Self::new(
            ErrorKind::XmlMalformed,
            format!("source XML is malformed at byte {position}: {detail}"),
        )
    }

    pub(crate) fn program_format(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorKind::ProgramFormat, format!("unexpected XML structure: {message}"))
    }

    pub(crate) fn invalid_opcode(opcode: &str, order: u32) -> Self {
        Self::new(
            ErrorKind::InvalidOpcode,
            format!("unknown instruction code '{opcode}' (order {order})"),
        )
    }

    pub(crate) fn lexical(literal: &str, expected: &str) -> Self {
        Self::new(ErrorKind::Lexical, format!("invalid {expected} literal: '{literal}'"))
    }

    pub(crate) fn redefined_variable(kind: FrameKind, name: &str) -> Self {
        Self::new(
            ErrorKind::RedefinedVariable,
            format!("variable '{kind}@{name}' is already defined"),
        )
    }

    pub(crate) fn redefined_label(label: &str) -> Self {
        Self::new(ErrorKind::RedefinedLabel, format!("label '{label}' is already defined"))
    }

    pub(crate) fn undefined_label(label: &str) -> Self {
        Self::new(ErrorKind::UndefinedLabel, format!("label '{label}' is not defined"))
    }

    pub(crate) fn operand(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Operand, message)
    }

    pub(crate) fn undefined_variable(kind: FrameKind, name: &str) -> Self {
        Self::new(
            ErrorKind::UndefinedVariable,
            format!("variable '{kind}@{name}' is not defined"),
        )
    }

    pub(crate) fn undefined_frame(kind: FrameKind) -> Self {
        Self::new(ErrorKind::UndefinedFrame, format!("frame {kind} is not defined"))
    }

    pub(crate) fn missing_value(var_name: Option<&str>) -> Self {
        let message = match var_name {
            Some(name) => format!("variable '{name}' has no value"),
            None => "variable has no value".to_owned(),
        };
        Self::new(ErrorKind::MissingValue, message)
    }

    pub(crate) fn empty_stack() -> Self {
        Self::new(ErrorKind::EmptyStack, "not enough values on the operand stack")
    }

    pub(crate) fn empty_call_stack() -> Self {
        Self::new(ErrorKind::EmptyCallStack, "the call stack is empty, invalid RETURN")
    }

    pub(crate) fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidValue, message)
    }

    pub(crate) fn string_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StringOperation, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub(crate) fn io(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Internal, format!("i/o failure: {error}"))
    }

    /// Attributes the error to an instruction, keeping an earlier attribution.
    pub(crate) fn with_location(mut self, opcode: Opcode, pc: usize) -> Self {
        if self.location.is_none() {
            self.location = Some(Location { opcode, pc });
        }
        self
    }

    /// Appends load-time attribution (instruction opcode and `order`) to the message.
    pub(crate) fn with_order(mut self, opcode: Opcode, order: u32) -> Self {
        self.message = format!("{} (instruction '{opcode}', order {order})", self.message);
        self
    }

    pub(crate) fn set_context_dump(&mut self, dump: String) {
        self.context_dump = Some(dump);
    }

    /// The error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }

    /// The instruction this error is attributed to, if known.
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// The captured context dump, present on runtime errors returned by `run`.
    #[must_use]
    pub fn context_dump(&self) -> Option<&str> {
        self.context_dump.as_deref()
    }
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(location) = self.location {
            write!(f, " (instruction {}, PC {})", location.opcode, location.pc)?;
        }
        Ok(())
    }
}

impl std::error::Error for InterpretError {}
