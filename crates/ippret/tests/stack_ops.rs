//! The `…S` stack-form instructions: operand order, validation, CLEARS, and
//! the JUMPIF…S consume/restore discipline.

mod common;

use common::{build, run_err, run_ok};
use pretty_assertions::assert_eq;

/// Stack arithmetic: PUSHS 3; PUSHS 4; ADDS; POPS → 7.
#[test]
fn stack_addition() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("PUSHS", &[("int", "3")]),
        ("PUSHS", &[("int", "4")]),
        ("ADDS", &[]),
        ("POPS", &[("var", "GF@r")]),
        ("WRITE", &[("var", "GF@r")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "7");
}

/// The rightmost operand is topmost: 10 - 3, not 3 - 10.
#[test]
fn stack_operand_order() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("PUSHS", &[("int", "10")]),
        ("PUSHS", &[("int", "3")]),
        ("SUBS", &[]),
        ("POPS", &[("var", "GF@r")]),
        ("WRITE", &[("var", "GF@r")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "7");
}

/// Each binary family has a working stack form.
#[test]
fn stack_forms_of_each_family() {
    let cases: &[(&str, &[(&str, &str)], &str)] = &[
        ("MULS", &[("int", "6"), ("int", "7")], "42"),
        ("DIVS", &[("int", "7"), ("int", "2")], "3"),
        ("IDIVS", &[("int", "-7"), ("int", "2")], "-3"),
        ("LTS", &[("int", "1"), ("int", "2")], "true"),
        ("GTS", &[("string", "a"), ("string", "b")], "false"),
        ("EQS", &[("nil", "nil"), ("nil", "nil")], "true"),
        ("ANDS", &[("bool", "true"), ("bool", "true")], "true"),
        ("ORS", &[("bool", "false"), ("bool", "false")], "false"),
        ("STRI2INTS", &[("string", "abc"), ("int", "1")], "98"),
    ];
    for &(opcode, operands, expected) in cases {
        let source = build(&[
            ("DEFVAR", &[("var", "GF@r")]),
            ("PUSHS", &operands[..1]),
            ("PUSHS", &operands[1..]),
            (opcode, &[]),
            ("POPS", &[("var", "GF@r")]),
            ("WRITE", &[("var", "GF@r")]),
        ]);
        let (_, stdout) = run_ok(&source, "");
        assert_eq!(stdout, expected, "{opcode}");
    }
}

/// Unary stack forms pop one operand.
#[test]
fn unary_stack_forms() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("PUSHS", &[("bool", "false")]),
        ("NOTS", &[]),
        ("POPS", &[("var", "GF@r")]),
        ("WRITE", &[("var", "GF@r")]),
        ("PUSHS", &[("int", "65")]),
        ("INT2CHARS", &[]),
        ("POPS", &[("var", "GF@r")]),
        ("WRITE", &[("var", "GF@r")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "trueA");
}

/// Type validation of popped operands mirrors the scalar instructions.
#[test]
fn stack_type_mismatch() {
    let source = build(&[
        ("PUSHS", &[("int", "1")]),
        ("PUSHS", &[("string", "a")]),
        ("ADDS", &[]),
    ]);
    assert_eq!(run_err(&source, "").exit_code(), 53);
}

#[test]
fn stack_division_by_zero() {
    let source = build(&[
        ("PUSHS", &[("int", "1")]),
        ("PUSHS", &[("int", "0")]),
        ("DIVS", &[]),
    ]);
    assert_eq!(run_err(&source, "").exit_code(), 57);
}

/// Underflow is a missing-value error, raised before any operand is popped.
#[test]
fn stack_underflow() {
    let source = build(&[
        ("PUSHS", &[("int", "1")]),
        ("ADDS", &[]),
    ]);
    assert_eq!(run_err(&source, "").exit_code(), 56);
}

/// CLEARS empties the operand stack.
#[test]
fn clears_empties_the_stack() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("PUSHS", &[("int", "1")]),
        ("PUSHS", &[("int", "2")]),
        ("CLEARS", &[]),
        ("POPS", &[("var", "GF@r")]),
    ]);
    assert_eq!(run_err(&source, "").exit_code(), 56);
}

/// A taken JUMPIFEQS consumes its operands.
#[test]
fn stack_jump_taken_consumes_operands() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("PUSHS", &[("int", "1")]),
        ("PUSHS", &[("int", "1")]),
        ("JUMPIFEQS", &[("label", "L")]),
        ("WRITE", &[("string", "skipped")]),
        ("LABEL", &[("label", "L")]),
        ("POPS", &[("var", "GF@r")]),
    ]);
    // the stack must be empty after the jump
    assert_eq!(run_err(&source, "").exit_code(), 56);
}

/// An untaken JUMPIFEQS with a forward label restores its operands for the
/// post-scan re-execution and consumes them exactly once overall.
#[test]
fn stack_jump_untaken_restores_for_lookup() {
    let source = build(&[
        ("DEFVAR", &[("var", "GF@r")]),
        ("PUSHS", &[("int", "1")]),
        ("PUSHS", &[("int", "2")]),
        ("JUMPIFEQS", &[("label", "END")]),
        ("WRITE", &[("string", "fell")]),
        ("LABEL", &[("label", "END")]),
        ("PUSHS", &[("int", "9")]),
        ("POPS", &[("var", "GF@r")]),
        ("WRITE", &[("var", "GF@r")]),
    ]);
    let (exit_code, stdout) = run_ok(&source, "");
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "fell9");
}

/// JUMPIFNEQS jumps on inequality.
#[test]
fn stack_jump_neq_taken() {
    let source = build(&[
        ("PUSHS", &[("int", "1")]),
        ("PUSHS", &[("int", "2")]),
        ("JUMPIFNEQS", &[("label", "L")]),
        ("WRITE", &[("string", "skipped")]),
        ("LABEL", &[("label", "L")]),
        ("WRITE", &[("string", "ok")]),
    ]);
    let (_, stdout) = run_ok(&source, "");
    assert_eq!(stdout, "ok");
}

/// JUMPIF…S underflow raises before any jump state changes.
#[test]
fn stack_jump_underflow() {
    let source = build(&[
        ("PUSHS", &[("int", "1")]),
        ("JUMPIFEQS", &[("label", "L")]),
        ("LABEL", &[("label", "L")]),
    ]);
    assert_eq!(run_err(&source, "").exit_code(), 56);
}
