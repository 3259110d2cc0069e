use std::{
    fmt::Write as _,
    io::{self, BufRead},
};

use indexmap::IndexMap;

use crate::{
    error::{InterpretError, RunResult},
    frame::{Frame, FrameKind},
    io::ProgramInput,
    value::{DataType, Value},
};

type LabelCache = IndexMap<String, usize, ahash::RandomState>;

/// The complete state of a program run.
///
/// Owns the three named frames (with `LF` as the top of the frame stack), the
/// operand stack, the call stack, the lazily-populated label cache, the
/// program counter, and the forward-label lookup state machine described in
/// the driver.
#[derive(Debug)]
pub(crate) struct InterpreterContext<R> {
    global_frame: Frame,
    temp_frame: Option<Frame>,
    frame_stack: Vec<Frame>,
    operand_stack: Vec<Value>,
    call_stack: Vec<usize>,
    labels: LabelCache,
    input: ProgramInput<R>,
    /// Index of the next instruction in the sorted program.
    pub pc: usize,
    /// Exit code set by `EXIT`; execution stops once it is set.
    pub exit_code: Option<u8>,
    /// PC of the jump-like instruction that started the current label lookup.
    pub jump_start_pc: usize,
    /// While set, the dispatch loop is scanning forward for this label.
    pub jump_target: Option<String>,
    /// True when the scan was started by an untaken conditional; the PC
    /// returns to `jump_start_pc` once the label is found.
    pub performing_lookup_jump: bool,
}

impl<R: BufRead> InterpreterContext<R> {
    pub fn new(input: ProgramInput<R>) -> Self {
        Self {
            global_frame: Frame::new(),
            temp_frame: None,
            frame_stack: Vec::new(),
            operand_stack: Vec::new(),
            call_stack: Vec::new(),
            labels: LabelCache::default(),
            input,
            pc: 0,
            exit_code: None,
            jump_start_pc: 0,
            jump_target: None,
            performing_lookup_jump: false,
        }
    }

    fn frame(&self, kind: FrameKind) -> Option<&Frame> {
        match kind {
            FrameKind::Global => Some(&self.global_frame),
            FrameKind::Local => self.frame_stack.last(),
            FrameKind::Temporary => self.temp_frame.as_ref(),
        }
    }

    fn frame_mut(&mut self, kind: FrameKind) -> Option<&mut Frame> {
        match kind {
            FrameKind::Global => Some(&mut self.global_frame),
            FrameKind::Local => self.frame_stack.last_mut(),
            FrameKind::Temporary => self.temp_frame.as_mut(),
        }
    }

    /// Resets `TF` to a fresh empty frame, discarding any previous contents.
    pub fn make_temp_frame(&mut self) {
        self.temp_frame = Some(Frame::new());
    }

    /// Moves `TF` onto the frame stack, where it becomes the new `LF`.
    pub fn push_frame(&mut self) -> RunResult<()> {
        let frame = self
            .temp_frame
            .take()
            .ok_or_else(|| InterpretError::undefined_frame(FrameKind::Temporary))?;
        self.frame_stack.push(frame);
        Ok(())
    }

    /// Moves the top of the frame stack back into `TF`.
    pub fn pop_frame(&mut self) -> RunResult<()> {
        let frame = self
            .frame_stack
            .pop()
            .ok_or_else(|| InterpretError::undefined_frame(FrameKind::Local))?;
        self.temp_frame = Some(frame);
        Ok(())
    }

    /// Creates an `Undefined` entry for `name` in the addressed frame.
    pub fn define_var(&mut self, kind: FrameKind, name: &str) -> RunResult<()> {
        let frame = self
            .frame_mut(kind)
            .ok_or_else(|| InterpretError::undefined_frame(kind))?;
        if frame.define(name) {
            Ok(())
        } else {
            Err(InterpretError::redefined_variable(kind, name))
        }
    }

    /// Reads the current value of a variable.
    pub fn get_var(&self, kind: FrameKind, name: &str) -> RunResult<Value> {
        let frame = self.frame(kind).ok_or_else(|| InterpretError::undefined_frame(kind))?;
        frame
            .get(name)
            .cloned()
            .ok_or_else(|| InterpretError::undefined_variable(kind, name))
    }

    /// Overwrites the value of an existing variable.
    pub fn set_var(&mut self, kind: FrameKind, name: &str, value: Value) -> RunResult<()> {
        let frame = self
            .frame_mut(kind)
            .ok_or_else(|| InterpretError::undefined_frame(kind))?;
        let slot = frame
            .get_mut(name)
            .ok_or_else(|| InterpretError::undefined_variable(kind, name))?;
        *slot = value;
        Ok(())
    }

    /// Pushes a value onto the operand stack; values without a payload are
    /// rejected as missing.
    pub fn push_operand(&mut self, value: Value, var_name: Option<&str>) -> RunResult<()> {
        if matches!(
            value.data_type(),
            DataType::Undefined | DataType::Label | DataType::Type
        ) {
            return Err(InterpretError::missing_value(var_name));
        }
        self.operand_stack.push(value);
        Ok(())
    }

    pub fn pop_operand(&mut self) -> RunResult<Value> {
        self.operand_stack.pop().ok_or_else(InterpretError::empty_stack)
    }

    pub fn operand_depth(&self) -> usize {
        self.operand_stack.len()
    }

    pub fn clear_operands(&mut self) {
        self.operand_stack.clear();
    }

    /// Saves the PC of the current `CALL` for a later `RETURN`.
    pub fn push_call(&mut self) {
        self.call_stack.push(self.pc);
    }

    /// Restores the PC saved by the matching `CALL`; the driver's increment
    /// then resumes at the following instruction.
    pub fn pop_return(&mut self) -> RunResult<()> {
        let pc = self.call_stack.pop().ok_or_else(InterpretError::empty_call_stack)?;
        self.pc = pc;
        Ok(())
    }

    /// Registers `label` at the current PC.
    ///
    /// Re-registration at the same PC is a no-op (the scan passes over labels
    /// repeatedly); the same label at a different PC is an error. Finding the
    /// current jump target ends scan mode.
    pub fn add_label(&mut self, label: &str) -> RunResult<()> {
        if let Some(&existing) = self.labels.get(label) {
            if existing != self.pc {
                return Err(InterpretError::redefined_label(label));
            }
        } else {
            self.labels.insert(label.to_owned(), self.pc);
        }
        if self.jump_target.as_deref() == Some(label) {
            self.jump_target = None;
        }
        Ok(())
    }

    /// Transfers control to `label`: directly on a cache hit, otherwise by
    /// entering scan mode from the current PC.
    pub fn jump(&mut self, label: &str) {
        if let Some(&pc) = self.labels.get(label) {
            self.pc = pc;
        } else {
            self.jump_start_pc = self.pc;
            self.jump_target = Some(label.to_owned());
        }
    }

    /// Warms the label cache for an untaken conditional jump.
    ///
    /// On a cache miss this enters scan mode with `performing_lookup_jump`
    /// set, so the driver returns to this instruction once the label is found
    /// and control falls through.
    pub fn lookup_label(&mut self, label: &str) {
        if self.labels.contains_key(label) {
            return;
        }
        self.jump_start_pc = self.pc;
        self.jump_target = Some(label.to_owned());
        self.performing_lookup_jump = true;
    }

    /// Ends the run with the given exit code; valid codes are 0–49.
    pub fn terminate(&mut self, code: i64) -> RunResult<()> {
        match u8::try_from(code) {
            Ok(code) if code <= 49 => {
                self.exit_code = Some(code);
                Ok(())
            }
            _ => Err(InterpretError::invalid_value("invalid exit code value")),
        }
    }

    pub fn read_input_line(&mut self) -> io::Result<Option<String>> {
        self.input.read_line()
    }

    /// Renders the whole context: frames, stacks, PC, lookup state, and the
    /// label cache. Used by `BREAK` and by the post-error diagnostics.
    pub fn dump_string(&self) -> String {
        let mut out = String::new();
        out.push_str("-- Global frame GF --\n");
        self.global_frame.dump_into(&mut out);
        out.push_str("\n-- Frame stack --\n");
        for (index, frame) in self.frame_stack.iter().enumerate() {
            if index + 1 == self.frame_stack.len() {
                let _ = writeln!(out, "-- #{index} (current LF)");
            } else {
                let _ = writeln!(out, "-- #{index}");
            }
            frame.dump_into(&mut out);
        }
        out.push_str("\n-- Temporary frame TF --\n");
        match &self.temp_frame {
            Some(frame) => frame.dump_into(&mut out),
            None => out.push_str("The frame is undefined.\n"),
        }
        let _ = writeln!(out, "\nProgram counter: {}", self.pc);
        if let Some(target) = &self.jump_target {
            let _ = writeln!(out, "Current jump started at PC value: {}", self.jump_start_pc);
            let _ = writeln!(out, "Current jump target: {target}");
        }
        out.push_str("Call stack:\n-- Bottom --\n");
        for pc in &self.call_stack {
            let _ = writeln!(out, "{pc}");
        }
        out.push_str("-- Top --\n");
        out.push_str("\nOperand stack:\n-- Bottom --\n");
        for value in &self.operand_stack {
            let _ = writeln!(out, "{:?}: '{}'", value.data_type(), value.diagnostic_text());
        }
        out.push_str("-- Top --\n");
        out.push_str("\nDefined labels:\n");
        for (label, pc) in &self.labels {
            let _ = writeln!(out, "{label} at PC {pc}");
        }
        out
    }
}
