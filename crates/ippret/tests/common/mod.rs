//! Shared helpers for building and running small IPPcode21 programs.
#![allow(dead_code)] // each test binary uses a different subset

use ippret::{CollectOutput, InterpretError, Runner};

/// Wraps instruction elements in a minimal program document.
pub fn program(body: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><program language="IPPcode21">{body}</program>"#)
}

/// Renders one instruction element with positional `(type, text)` arguments.
pub fn instr(order: u32, opcode: &str, args: &[(&str, &str)]) -> String {
    use std::fmt::Write as _;
    let mut out = format!(r#"<instruction order="{order}" opcode="{opcode}">"#);
    for (position, (arg_type, text)) in args.iter().enumerate() {
        let _ = write!(out, r#"<arg{0} type="{arg_type}">{text}</arg{0}>"#, position + 1);
    }
    out.push_str("</instruction>");
    out
}

/// Builds a program from `(opcode, args)` tuples, numbering orders from 1.
pub fn build(instructions: &[(&str, &[(&str, &str)])]) -> String {
    let body: String = instructions
        .iter()
        .enumerate()
        .map(|(index, (opcode, args))| instr(u32::try_from(index).unwrap() + 1, opcode, args))
        .collect();
    program(&body)
}

/// Runs a program, returning the result and the captured stdout/stderr.
pub fn run(source: &str, input: &str) -> (Result<u8, InterpretError>, String, String) {
    let runner = Runner::new(source).expect("program should load");
    let mut output = CollectOutput::new();
    let result = runner.run(input.as_bytes(), &mut output);
    (result, output.stdout().to_owned(), output.stderr().to_owned())
}

/// Runs a program that is expected to succeed; returns `(exit_code, stdout)`.
pub fn run_ok(source: &str, input: &str) -> (u8, String) {
    let (result, stdout, _) = run(source, input);
    (result.expect("program should run to completion"), stdout)
}

/// Runs a program that is expected to fail at runtime.
pub fn run_err(source: &str, input: &str) -> InterpretError {
    let (result, _, _) = run(source, input);
    result.expect_err("program should fail")
}

/// Loads a program that is expected to be rejected by the loader.
pub fn load_err(source: &str) -> InterpretError {
    Runner::new(source).expect_err("program should be rejected")
}
