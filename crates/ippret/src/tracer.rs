//! Execution tracing hooks for the dispatch loop.
//!
//! The driver is parameterized over an [`ExecTracer`], so with [`NoopTracer`]
//! every hook compiles away via monomorphization. [`StderrTracer`] logs each
//! dispatch to stderr for debugging interpreted programs.

use crate::instruction::Opcode;

/// Trait for observing execution.
///
/// All methods default to no-ops; implementations only override the hooks
/// they care about.
pub trait ExecTracer {
    /// Called before each dispatch. `scanning` is true while the driver is
    /// skipping instructions in label-lookup scan mode.
    #[inline]
    fn on_instruction(&mut self, _pc: usize, _opcode: Opcode, _scanning: bool) {}

    /// Called when a label is registered in the label cache.
    #[inline]
    fn on_label(&mut self, _label: &str, _pc: usize) {}
}

/// Zero-cost no-op tracer; the production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl ExecTracer for NoopTracer {}

/// Human-readable execution log to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer {
    dispatched: u64,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dispatches observed so far, scan-mode skips included.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl ExecTracer for StderrTracer {
    fn on_instruction(&mut self, pc: usize, opcode: Opcode, scanning: bool) {
        self.dispatched += 1;
        let mode = if scanning { " (scan)" } else { "" };
        eprintln!("[{pc:>4}] {opcode}{mode}");
    }

    fn on_label(&mut self, label: &str, pc: usize) {
        eprintln!("       label '{label}' registered at PC {pc}");
    }
}
