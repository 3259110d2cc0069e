#![doc = include_str!("../../../README.md")]
#![expect(clippy::float_cmp, reason = "IPPcode21 equality and comparison are exact float operations")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are range-checked")]
#![expect(clippy::cast_possible_wrap, reason = "wrapping casts stay within range")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]

mod context;
mod error;
mod frame;
mod instruction;
mod io;
mod loader;
mod run;
mod tracer;
mod value;

pub use crate::{
    error::{ErrorKind, InterpretError, Location, RunResult},
    frame::FrameKind,
    instruction::Opcode,
    io::{CollectOutput, NoOutput, ProgramOutput, StdOutput},
    run::Runner,
    tracer::{ExecTracer, NoopTracer, StderrTracer},
    value::{DataType, Value},
};
