//! End-to-end programs exercising the documented behavior of the
//! interpreter: output forms, frames, control flow, and determinism.

mod common;

use common::{build, run, run_ok};
use ippret::Runner;
use pretty_assertions::assert_eq;

/// Hello world: define, assign, write, exit 0.
#[test]
fn hello_world() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@a")]),
        ("MOVE", &[("var", "GF@a"), ("string", r"Hello\032World")]),
        ("WRITE", &[("var", "GF@a")]),
        ("EXIT", &[("int", "0")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "Hello World");
}

/// A forward jump skips the instruction between the jump and the label.
#[test]
fn forward_jump_with_lookup() {
    let source = build(&[
        ("JUMP", &[("label", "L")]),
        ("WRITE", &[("string", "SKIPPED")]),
        ("LABEL", &[("label", "L")]),
        ("WRITE", &[("string", "OK")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "OK");
}

/// A false conditional warms the label cache and falls through.
#[test]
fn conditional_false_falls_through() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@x")]),
        ("MOVE", &[("var", "GF@x"), ("int", "1")]),
        ("JUMPIFEQ", &[("label", "END"), ("var", "GF@x"), ("int", "2")]),
        ("WRITE", &[("string", "ran")]),
        ("LABEL", &[("label", "END")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "ran");
}

/// A taken backward conditional drives a countdown loop.
#[test]
fn backward_jump_loop() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@i")]),
        ("MOVE", &[("var", "GF@i"), ("int", "3")]),
        ("LABEL", &[("label", "loop")]),
        ("WRITE", &[("var", "GF@i")]),
        ("SUB", &[("var", "GF@i"), ("var", "GF@i"), ("int", "1")]),
        ("JUMPIFNEQ", &[("label", "loop"), ("var", "GF@i"), ("int", "0")]),
        ("WRITE", &[("string", "done")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "321done");
}

/// CALL jumps to a forward label and RETURN resumes after the call site.
#[test]
fn call_and_return() {
    let source = build(&[
        ("CALL", &[("label", "sub")]),
        ("WRITE", &[("string", "main")]),
        ("EXIT", &[("int", "0")]),
        ("LABEL", &[("label", "sub")]),
        ("WRITE", &[("string", "sub")]),
        ("RETURN", &[]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "submain");
}

/// TF variables survive the round trip through the frame stack as LF.
#[test]
fn frame_stack_round_trip() {
    let source = build(&[
        ("CREATEFRAME", &[]),
        ("DEFVAR", &[("var", "TF@x")]),
        ("MOVE", &[("var", "TF@x"), ("int", "5")]),
        ("PUSHFRAME", &[]),
        ("WRITE", &[("var", "LF@x")]),
        ("POPFRAME", &[]),
        ("WRITE", &[("var", "TF@x")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "55");
}

/// WRITE prints booleans as true/false, nil as nothing, floats in
/// hexadecimal form and ints in decimal. No newlines are added.
#[test]
fn write_output_forms() {
    let source = build(&[
        ("WRITE", &[("bool", "true")]),
        ("WRITE", &[("bool", "false")]),
        ("WRITE", &[("nil", "nil")]),
        ("WRITE", &[("int", "-42")]),
        ("WRITE", &[("float", "0x1.8p+1")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "truefalse-420x1.8000000000000p+1");
}

/// String escapes decode to UTF-8, including multi-byte runs.
#[test]
fn write_decoded_string_escapes() {
    let source = build(&[("WRITE", &[("string", r"a\010b\195\161c")])]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "a\nbác");
}

/// EXIT stops execution immediately with the given code.
#[test]
fn exit_stops_execution() {
    let source = build(&[
        ("WRITE", &[("string", "before")]),
        ("EXIT", &[("int", "7")]),
        ("WRITE", &[("string", "after")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 7);
    assert_eq!(stdout, "before");
}

/// TYPE writes the operand's type name; the empty string for an unassigned
/// variable.
#[test]
fn type_instruction() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@t")]),
        ("DEFVAR", &[("var", "GF@u")]),
        ("TYPE", &[("var", "GF@t"), ("int", "7")]),
        ("WRITE", &[("var", "GF@t")]),
        ("WRITE", &[("string", "|")]),
        ("TYPE", &[("var", "GF@t"), ("var", "GF@u")]),
        ("WRITE", &[("var", "GF@t")]),
        ("WRITE", &[("string", "|")]),
        ("TYPE", &[("var", "GF@t"), ("nil", "nil")]),
        ("WRITE", &[("var", "GF@t")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "int||nil");
}

/// Instructions execute in ascending `order`, not document order.
#[test]
fn instructions_sorted_by_order() {
    let source = common::program(&format!(
        "{}{}{}",
        common::instr(30, "WRITE", &[("string", "c")]),
        common::instr(10, "WRITE", &[("string", "a")]),
        common::instr(20, "WRITE", &[("string", "b")]),
    ));
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "abc");
}

/// argN elements may appear in any document order; position is positional.
#[test]
fn arg_elements_in_any_document_order() {
    let source = common::program(
        r#"<instruction order="1" opcode="DEFVAR"><arg1 type="var">GF@r</arg1></instruction>
<instruction order="2" opcode="ADD"><arg3 type="int">2</arg3><arg1 type="var">GF@r</arg1><arg2 type="int">1</arg2></instruction>
<instruction order="3" opcode="WRITE"><arg1 type="var">GF@r</arg1></instruction>"#,
    );
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "3");
}

/// String instructions index by code point, not by byte.
#[test]
fn string_ops_are_code_point_indexed() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@n")]),
        ("DEFVAR", &[("var", "GF@c")]),
        ("STRLEN", &[("var", "GF@n"), ("string", r"p\197\153\195\173li\197\161")]),
        ("WRITE", &[("var", "GF@n")]),
        ("GETCHAR", &[("var", "GF@c"), ("string", r"p\197\153\195\173li\197\161"), ("int", "1")]),
        ("WRITE", &[("var", "GF@c")]),
    ]);
    // the literal decodes to "příliš": 6 characters
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "6ř");
}

/// SETCHAR replaces one character with the first character of the source.
#[test]
fn setchar_replaces_single_character() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@s")]),
        ("MOVE", &[("var", "GF@s"), ("string", "hello")]),
        ("SETCHAR", &[("var", "GF@s"), ("int", "1"), ("string", "abc")]),
        ("WRITE", &[("var", "GF@s")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "hallo");
}

/// CONCAT, INT2CHAR and STRI2INT round trips.
#[test]
fn string_conversions() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@s")]),
        ("CONCAT", &[("var", "GF@s"), ("string", "ab"), ("string", "cd")]),
        ("WRITE", &[("var", "GF@s")]),
        ("DEFVAR", &[("var", "GF@c")]),
        ("INT2CHAR", &[("var", "GF@c"), ("int", "382")]),
        ("WRITE", &[("var", "GF@c")]),
        ("DEFVAR", &[("var", "GF@k")]),
        ("STRI2INT", &[("var", "GF@k"), ("var", "GF@c"), ("int", "0")]),
        ("WRITE", &[("var", "GF@k")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "abcdž382");
}

/// Type-preserving arithmetic: int stays int, float stays float; IDIV and
/// int DIV truncate toward zero.
#[test]
fn arithmetic_families() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("ADD", &[("var", "GF@r"), ("int", "2"), ("int", "3")]),
        ("WRITE", &[("var", "GF@r")]),
        ("DIV", &[("var", "GF@r"), ("int", "7"), ("int", "2")]),
        ("WRITE", &[("var", "GF@r")]),
        ("IDIV", &[("var", "GF@r"), ("int", "-7"), ("int", "2")]),
        ("WRITE", &[("var", "GF@r")]),
        ("MUL", &[("var", "GF@r"), ("int", "-4"), ("int", "6")]),
        ("WRITE", &[("var", "GF@r")]),
        ("ADD", &[("var", "GF@r"), ("float", "0x1p+0"), ("float", "0x1.8p+0")]),
        ("WRITE", &[("var", "GF@r")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "53-3-240x1.4000000000000p+1");
}

/// Comparisons over each permitted type, and EQ's nil tolerance.
#[test]
fn comparison_families() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("LT", &[("var", "GF@r"), ("int", "1"), ("int", "2")]),
        ("WRITE", &[("var", "GF@r")]),
        ("GT", &[("var", "GF@r"), ("string", "b"), ("string", "a")]),
        ("WRITE", &[("var", "GF@r")]),
        ("LT", &[("var", "GF@r"), ("bool", "false"), ("bool", "true")]),
        ("WRITE", &[("var", "GF@r")]),
        ("EQ", &[("var", "GF@r"), ("nil", "nil"), ("nil", "nil")]),
        ("WRITE", &[("var", "GF@r")]),
        ("EQ", &[("var", "GF@r"), ("nil", "nil"), ("int", "0")]),
        ("WRITE", &[("var", "GF@r")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "truetruetruetruefalse");
}

/// Boolean instructions.
#[test]
fn boolean_family() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("AND", &[("var", "GF@r"), ("bool", "true"), ("bool", "false")]),
        ("WRITE", &[("var", "GF@r")]),
        ("OR", &[("var", "GF@r"), ("bool", "true"), ("bool", "false")]),
        ("WRITE", &[("var", "GF@r")]),
        ("NOT", &[("var", "GF@r"), ("bool", "false")]),
        ("WRITE", &[("var", "GF@r")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "falsetruetrue");
}

/// INT2FLOAT and FLOAT2INT conversions.
#[test]
fn numeric_conversions() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@f")]),
        ("INT2FLOAT", &[("var", "GF@f"), ("int", "3")]),
        ("WRITE", &[("var", "GF@f")]),
        ("DEFVAR", &[("var", "GF@i")]),
        ("FLOAT2INT", &[("var", "GF@i"), ("float", "0x1.8p+1")]),
        ("WRITE", &[("var", "GF@i")]),
        ("FLOAT2INT", &[("var", "GF@i"), ("float", "-0x1.8p+1")]),
        ("WRITE", &[("var", "GF@i")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "0x1.8000000000000p+13-3");
}

/// DPRINT writes the diagnostic rendering plus a newline to stderr; WRITE
/// output is unaffected.
#[test]
fn dprint_goes_to_stderr() {
    let source = build(&[
        ("DPRINT", &[("int", "5")]),
        ("WRITE", &[("string", "out")]),
    ]);
    let (result, stdout, stderr) = run(&source, "");
    assert_eq!(result.unwrap(), 0);
    assert_eq!(stdout, "out");
    assert_eq!(stderr, "5\n");
}

/// BREAK dumps the execution context to stderr.
#[test]
fn break_dumps_context() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@x")]),
        ("MOVE", &[("var", "GF@x"), ("int", "1")]),
        ("BREAK", &[]),
    ]);
    let (result, stdout, stderr) = run(&source, "");
    assert_eq!(result.unwrap(), 0);
    assert_eq!(stdout, "");
    assert!(stderr.contains("-- Global frame GF --"), "dump header: {stderr}");
    assert!(stderr.contains("Variable 'x', type Int: '1'"), "variable line: {stderr}");
    assert!(stderr.contains("Program counter: 2"), "PC line: {stderr}");
}

/// An empty program runs to completion with exit code 0.
#[test]
fn empty_program() {
    let (exit_code, stdout) = run_ok(&common::program(""), "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "");
}

/// The same runner can execute its program repeatedly against fresh state.
#[test]
fn runner_is_reusable_and_deterministic() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@a")]),
        ("MOVE", &[("var", "GF@a"), ("int", "1")]),
        ("WRITE", &[("var", "GF@a")]),
    ]);
    let (first_code, first_out) = run_ok(&source, "");
    let (second_code, second_out) = run_ok(&source, "");
    assert_eq!(first_code, second_code);
    assert_eq!(first_out, second_out);
}

/// dump/load round-trips the parsed program without behavior changes.
#[test]
fn dump_load_round_trip() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@a")]),
        ("MOVE", &[("var", "GF@a"), ("string", "snapshot")]),
        ("WRITE", &[("var", "GF@a")]),
    ]);
    let runner = Runner::new(&source).unwrap();
    let bytes = runner.dump().unwrap();
    let restored = Runner::load(&bytes).unwrap();

    let mut output = ippret::CollectOutput::new();
    let exit_code = restored.run(std::io::empty(), &mut output).unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(output.stdout(), "snapshot");
}

/// Every well-typed value round-trips through PUSHS/POPS unchanged.
#[test]
fn push_pop_round_trip() {
    for (arg_type, literal, expected) in [
        ("int", "42", "42"),
        ("bool", "true", "true"),
        ("string", "hi", "hi"),
        ("float", "0x1.8p+1", "0x1.8000000000000p+1"),
        ("nil", "nil", ""),
    ] {
        let source = build(&[
            ("DEFVAR", &[("var", "GF@x")]),
            ("PUSHS", &[(arg_type, literal)]),
            ("POPS", &[("var", "GF@x")]),
            ("WRITE", &[("var", "GF@x")]),
        ]);
        let (_, stdout) = run_ok(&source, "");
        assert_eq!(stdout, expected, "round-trip of {arg_type}@{literal}");
    }
}
