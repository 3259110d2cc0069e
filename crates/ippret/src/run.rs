//! Public interface for loading and running IPPcode21 programs.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    context::InterpreterContext,
    error::{InterpretError, RunResult},
    instruction::{self, Arg, Instruction, Opcode, Operand},
    io::{ProgramInput, ProgramOutput},
    loader,
    tracer::{ExecTracer, NoopTracer},
    value::Value,
};

/// A loaded, validated program: instructions in ascending source order.
///
/// The program counter indexes this sequence directly; the original `order`
/// attributes are discarded after sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// Primary interface for running IPPcode21 programs.
///
/// A `Runner` owns a loaded and statically validated program. Each call to
/// [`run`](Self::run) executes it from scratch against a fresh context, so a
/// single `Runner` can execute the same program repeatedly.
///
/// # Example
/// ```
/// use ippret::{CollectOutput, Runner};
///
/// let source = r#"<?xml version="1.0"?>
/// <program language="IPPcode21">
///   <instruction order="1" opcode="WRITE"><arg1 type="string">hi</arg1></instruction>
/// </program>"#;
/// let runner = Runner::new(source).unwrap();
/// let mut output = CollectOutput::new();
/// let exit_code = runner.run(std::io::empty(), &mut output).unwrap();
/// assert_eq!(exit_code, 0);
/// assert_eq!(output.stdout(), "hi");
/// ```
#[derive(Debug, Clone)]
pub struct Runner {
    program: Program,
}

impl Runner {
    /// Parses and statically validates an XML program source.
    ///
    /// # Errors
    /// Returns an error with exit code 31 when the document is not
    /// well-formed XML, or 32 when the program structure, an opcode, or a
    /// literal is invalid.
    pub fn new(source: &str) -> Result<Self, InterpretError> {
        loader::load(source).map(|program| Self { program })
    }

    /// Serializes the loaded program to a binary format.
    ///
    /// The serialized data can be stored and later restored with
    /// [`load`](Self::load), avoiding a re-parse of the XML source.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(&self.program)
    }

    /// Deserializes a program previously produced by [`dump`](Self::dump).
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes).map(|program| Self { program })
    }

    /// Executes the program to completion.
    ///
    /// `input` is the program-input stream consumed linewise by `READ`;
    /// `output` receives `WRITE` text and `DPRINT`/`BREAK` diagnostics.
    /// Returns the interpreted program's exit code: the value set by `EXIT`,
    /// or 0 when the program counter runs past the end.
    ///
    /// # Errors
    /// Any runtime error aborts the run; errors with exit codes 52–58 carry
    /// a full context dump (see [`InterpretError::context_dump`]).
    pub fn run(&self, input: impl BufRead, output: &mut impl ProgramOutput) -> Result<u8, InterpretError> {
        self.run_traced(input, output, &mut NoopTracer)
    }

    /// Executes the program with an [`ExecTracer`] observing each dispatch.
    pub fn run_traced(
        &self,
        input: impl BufRead,
        output: &mut impl ProgramOutput,
        tracer: &mut impl ExecTracer,
    ) -> Result<u8, InterpretError> {
        let mut ctx = InterpreterContext::new(ProgramInput::new(input));
        match self.drive(&mut ctx, output, tracer) {
            Ok(exit_code) => Ok(exit_code),
            Err(mut error) => {
                if error.kind().is_runtime() {
                    error.set_context_dump(ctx.dump_string());
                }
                Err(error)
            }
        }
    }

    /// The dispatch loop: pulls the next instruction until the exit code is
    /// set or the PC runs past the end.
    ///
    /// Running past the end with a pending jump target means a forward-label
    /// scan failed; the error is attributed to the jump that started it.
    fn drive<R: BufRead>(
        &self,
        ctx: &mut InterpreterContext<R>,
        output: &mut impl ProgramOutput,
        tracer: &mut impl ExecTracer,
    ) -> RunResult<u8> {
        let instructions = self.program.instructions();
        loop {
            if let Some(exit_code) = ctx.exit_code {
                return Ok(exit_code);
            }
            if ctx.pc >= instructions.len() {
                return match &ctx.jump_target {
                    None => Ok(0),
                    Some(target) => {
                        let start = &instructions[ctx.jump_start_pc];
                        Err(InterpretError::undefined_label(target).with_location(start.opcode, ctx.jump_start_pc))
                    }
                };
            }
            let instruction = &instructions[ctx.pc];
            let pc = ctx.pc;
            step(ctx, instruction, output, tracer).map_err(|error| error.with_location(instruction.opcode, pc))?;
        }
    }
}

/// Executes a single tick of the dispatch loop.
fn step<R: BufRead>(
    ctx: &mut InterpreterContext<R>,
    instruction: &Instruction,
    output: &mut impl ProgramOutput,
    tracer: &mut impl ExecTracer,
) -> RunResult<()> {
    let scanning = ctx.jump_target.is_some();
    tracer.on_instruction(ctx.pc, instruction.opcode, scanning);

    // DEFVAR is resolved here rather than in the dispatcher: its variable
    // does not exist yet, so the regular argument resolution cannot apply.
    // Scan mode suppresses the definition side effect entirely.
    if instruction.opcode == Opcode::DefVar {
        if !scanning {
            define_variable(ctx, &instruction.args[0])?;
        }
        ctx.pc += 1;
        return Ok(());
    }

    // In scan mode everything except LABEL is skipped without resolving
    // arguments.
    if scanning && instruction.opcode != Opcode::Label {
        ctx.pc += 1;
        return Ok(());
    }

    let operands = resolve_operands(ctx, instruction)?;
    instruction::execute(instruction.opcode, ctx, &operands, output)?;

    if instruction.opcode == Opcode::Label {
        if let Some(Arg::Const(Value::Label(name))) = instruction.args.first() {
            tracer.on_label(name, ctx.pc);
        }
    }

    // A completed lookup for an untaken conditional returns the PC to the
    // jump site; the warmed conditional re-executes as a no-op and falls
    // through. Everything else advances normally (a taken jump has already
    // repositioned the PC onto the LABEL).
    if ctx.performing_lookup_jump && ctx.jump_target.is_none() {
        ctx.pc = ctx.jump_start_pc;
        ctx.performing_lookup_jump = false;
    } else {
        ctx.pc += 1;
    }
    Ok(())
}

fn define_variable<R: BufRead>(ctx: &mut InterpreterContext<R>, arg: &Arg) -> RunResult<()> {
    match arg {
        Arg::Var { frame, name } => ctx.define_var(*frame, name),
        Arg::Const(_) => Err(InterpretError::operand("DEFVAR requires a variable argument")),
    }
}

/// Resolves each argument against the current frames and validates it
/// against the opcode's descriptors.
fn resolve_operands<R: BufRead>(
    ctx: &InterpreterContext<R>,
    instruction: &Instruction,
) -> RunResult<SmallVec<[Operand; 3]>> {
    let specs = instruction.opcode.arg_specs();
    let mut operands = SmallVec::new();
    for (position, (arg, spec)) in instruction.args.iter().zip(specs).enumerate() {
        let operand = match arg {
            Arg::Var { frame, name } => {
                let value = ctx.get_var(*frame, name)?;
                Operand::Var {
                    frame: *frame,
                    name: name.clone(),
                    value,
                }
            }
            Arg::Const(value) => Operand::Const(value.clone()),
        };
        operand.check(spec, position + 1)?;
        operands.push(operand);
    }
    Ok(operands)
}
