use std::{borrow::Cow, io::BufRead};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    context::InterpreterContext,
    error::{InterpretError, RunResult},
    frame::FrameKind,
    io::ProgramOutput,
    value::{self, DataType, Value},
};

/// Every IPPcode21 opcode, including the `…S` stack forms.
///
/// Parsing is case-insensitive; the display form is the canonical uppercase
/// spelling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum Opcode {
    Move,
    CreateFrame,
    PushFrame,
    PopFrame,
    DefVar,
    Call,
    Return,
    Pushs,
    Pops,
    Clears,
    Add,
    Sub,
    Mul,
    Div,
    Idiv,
    Lt,
    Gt,
    Eq,
    And,
    Or,
    Not,
    Int2Char,
    Stri2Int,
    Int2Float,
    Float2Int,
    Read,
    Write,
    Concat,
    Strlen,
    Getchar,
    Setchar,
    Type,
    Label,
    Jump,
    JumpIfEq,
    JumpIfNeq,
    Exit,
    Dprint,
    Break,
    Adds,
    Subs,
    Muls,
    Divs,
    Idivs,
    Lts,
    Gts,
    Eqs,
    Ands,
    Ors,
    Nots,
    Int2Chars,
    Stri2Ints,
    JumpIfEqs,
    JumpIfNeqs,
}

/// Static type constraint of one argument position.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TypeConstraint {
    /// Any runtime value type — `{int, string, bool, float, nil}` — plus
    /// `undefined` variables. Never admits `label` or `type`.
    Any,
    One(DataType),
    Set(&'static [DataType]),
}

/// Static specification of a single instruction argument.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArgSpec {
    types: TypeConstraint,
    const_only: bool,
    var_only: bool,
}

impl ArgSpec {
    /// A symbol: either a literal or a variable.
    const fn sym(types: TypeConstraint) -> Self {
        Self {
            types,
            const_only: false,
            var_only: false,
        }
    }

    /// A destination or otherwise variable-only argument.
    const fn var(types: TypeConstraint) -> Self {
        Self {
            types,
            const_only: false,
            var_only: true,
        }
    }

    /// A literal-only argument.
    const fn lit(types: TypeConstraint) -> Self {
        Self {
            types,
            const_only: true,
            var_only: false,
        }
    }

    fn admits(&self, data_type: DataType) -> bool {
        match self.types {
            TypeConstraint::Any => !matches!(data_type, DataType::Label | DataType::Type),
            TypeConstraint::One(one) => data_type == one,
            TypeConstraint::Set(set) => set.contains(&data_type),
        }
    }

    /// Validates a resolved value against this descriptor.
    ///
    /// An argument whose current type is `undefined` raises a missing-value
    /// error (exit 56); any other violation is an operand error (exit 53).
    pub(crate) fn check_value(
        &self,
        value: &Value,
        is_const: bool,
        var_name: Option<&str>,
        position: usize,
    ) -> RunResult<()> {
        let data_type = value.data_type();
        let ok = (!self.const_only || is_const) && (!self.var_only || !is_const) && self.admits(data_type);
        if ok {
            Ok(())
        } else if data_type == DataType::Undefined {
            Err(InterpretError::missing_value(var_name))
        } else {
            Err(InterpretError::operand(format!(
                "invalid operand for argument #{position}"
            )))
        }
    }
}

const SYM_ANY: ArgSpec = ArgSpec::sym(TypeConstraint::Any);
const VAR_ANY: ArgSpec = ArgSpec::var(TypeConstraint::Any);
const VAR_STR: ArgSpec = ArgSpec::var(TypeConstraint::One(DataType::Str));
const SYM_INT: ArgSpec = ArgSpec::sym(TypeConstraint::One(DataType::Int));
const SYM_STR: ArgSpec = ArgSpec::sym(TypeConstraint::One(DataType::Str));
const SYM_BOOL: ArgSpec = ArgSpec::sym(TypeConstraint::One(DataType::Bool));
const SYM_FLOAT: ArgSpec = ArgSpec::sym(TypeConstraint::One(DataType::Float));
const SYM_NUMERIC: ArgSpec = ArgSpec::sym(TypeConstraint::Set(&[DataType::Int, DataType::Float]));
const SYM_ORDERED: ArgSpec = ArgSpec::sym(TypeConstraint::Set(&[
    DataType::Int,
    DataType::Float,
    DataType::Bool,
    DataType::Str,
]));
const SYM_EQUATABLE: ArgSpec = ArgSpec::sym(TypeConstraint::Set(&[
    DataType::Int,
    DataType::Float,
    DataType::Bool,
    DataType::Str,
    DataType::Nil,
]));
const LABEL_LIT: ArgSpec = ArgSpec::lit(TypeConstraint::One(DataType::Label));
const TYPE_LIT: ArgSpec = ArgSpec::lit(TypeConstraint::One(DataType::Type));

impl Opcode {
    /// The argument descriptors of this opcode, one per position.
    pub(crate) fn arg_specs(self) -> &'static [ArgSpec] {
        match self {
            Self::Move | Self::Type => &[VAR_ANY, SYM_ANY],
            Self::CreateFrame
            | Self::PushFrame
            | Self::PopFrame
            | Self::Return
            | Self::Clears
            | Self::Break
            | Self::Adds
            | Self::Subs
            | Self::Muls
            | Self::Divs
            | Self::Idivs
            | Self::Lts
            | Self::Gts
            | Self::Eqs
            | Self::Ands
            | Self::Ors
            | Self::Nots
            | Self::Int2Chars
            | Self::Stri2Ints => &[],
            Self::DefVar | Self::Pops => &[VAR_ANY],
            Self::Call | Self::Label | Self::Jump | Self::JumpIfEqs | Self::JumpIfNeqs => &[LABEL_LIT],
            Self::Pushs | Self::Write | Self::Dprint => &[SYM_ANY],
            Self::Add | Self::Sub | Self::Mul | Self::Div => &[VAR_ANY, SYM_NUMERIC, SYM_NUMERIC],
            Self::Idiv => &[VAR_ANY, SYM_INT, SYM_INT],
            Self::Lt | Self::Gt => &[VAR_ANY, SYM_ORDERED, SYM_ORDERED],
            Self::Eq => &[VAR_ANY, SYM_EQUATABLE, SYM_EQUATABLE],
            Self::And | Self::Or => &[VAR_ANY, SYM_BOOL, SYM_BOOL],
            Self::Not => &[VAR_ANY, SYM_BOOL],
            Self::Int2Char | Self::Int2Float => &[VAR_ANY, SYM_INT],
            Self::Float2Int => &[VAR_ANY, SYM_FLOAT],
            Self::Stri2Int | Self::Getchar => &[VAR_ANY, SYM_STR, SYM_INT],
            Self::Read => &[VAR_ANY, TYPE_LIT],
            Self::Concat => &[VAR_ANY, SYM_STR, SYM_STR],
            Self::Strlen => &[VAR_ANY, SYM_STR],
            Self::Setchar => &[VAR_STR, SYM_INT, SYM_STR],
            Self::JumpIfEq | Self::JumpIfNeq => &[LABEL_LIT, SYM_ANY, SYM_ANY],
            Self::Exit => &[SYM_INT],
        }
    }

    /// Number of `argN` elements this opcode requires.
    pub(crate) fn arity(self) -> usize {
        self.arg_specs().len()
    }
}

/// A pre-parsed instruction argument as loaded from the source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Arg {
    Var { frame: FrameKind, name: String },
    Const(Value),
}

/// A loaded instruction. The PC indexes the program's sorted instruction
/// sequence; original `order` attributes are discarded after sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Instruction {
    pub opcode: Opcode,
    pub args: SmallVec<[Arg; 3]>,
}

/// An argument resolved against the current frames: either a snapshot of a
/// program variable's value or a literal constant.
#[derive(Debug)]
pub(crate) enum Operand {
    Var {
        frame: FrameKind,
        name: String,
        value: Value,
    },
    Const(Value),
}

impl Operand {
    pub fn value(&self) -> &Value {
        match self {
            Self::Var { value, .. } | Self::Const(value) => value,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Self::Const(_))
    }

    pub fn var_name(&self) -> Option<&str> {
        match self {
            Self::Var { name, .. } => Some(name),
            Self::Const(_) => None,
        }
    }

    pub fn check(&self, spec: &ArgSpec, position: usize) -> RunResult<()> {
        spec.check_value(self.value(), self.is_const(), self.var_name(), position)
    }
}

/// Executes one instruction against the context.
///
/// Operands have already been resolved and validated against the argument
/// descriptors; family-specific checks (same-type rules, explicit
/// missing-value checks) happen here, exactly where the contract demands a
/// different exit code than the descriptors provide.
pub(crate) fn execute<R: BufRead, O: ProgramOutput>(
    opcode: Opcode,
    ctx: &mut InterpreterContext<R>,
    args: &[Operand],
    output: &mut O,
) -> RunResult<()> {
    match opcode {
        Opcode::Move => {
            require_defined(&args[1])?;
            let value = args[1].value().clone();
            store(ctx, &args[0], value)
        }
        Opcode::CreateFrame => {
            ctx.make_temp_frame();
            Ok(())
        }
        Opcode::PushFrame => ctx.push_frame(),
        Opcode::PopFrame => ctx.pop_frame(),
        // DEFVAR never reaches the dispatcher; the driver resolves it before
        // argument resolution because its variable does not exist yet.
        Opcode::DefVar => Err(InterpretError::internal("DEFVAR must be handled by the driver")),
        Opcode::Call => {
            ctx.push_call();
            ctx.jump(label_of(&args[0])?);
            Ok(())
        }
        Opcode::Return => ctx.pop_return(),
        Opcode::Pushs => {
            let value = args[0].value().clone();
            ctx.push_operand(value, args[0].var_name())
        }
        Opcode::Pops => {
            let value = ctx.pop_operand()?;
            store(ctx, &args[0], value)
        }
        Opcode::Clears => {
            ctx.clear_operands();
            Ok(())
        }
        Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Div
        | Opcode::Idiv
        | Opcode::Lt
        | Opcode::Gt
        | Opcode::Eq
        | Opcode::And
        | Opcode::Or
        | Opcode::Stri2Int => {
            let result = scalar_binary(opcode, args[1].value(), args[2].value())?;
            store(ctx, &args[0], result)
        }
        Opcode::Not | Opcode::Int2Char | Opcode::Int2Float | Opcode::Float2Int => {
            let result = scalar_unary(opcode, args[1].value())?;
            store(ctx, &args[0], result)
        }
        Opcode::Read => read_input(ctx, args),
        Opcode::Write => {
            require_defined(&args[0])?;
            output
                .write_stdout(args[0].value().output_text())
                .map_err(InterpretError::io)
        }
        Opcode::Concat => {
            let result = concat(args[1].value(), args[2].value())?;
            store(ctx, &args[0], result)
        }
        Opcode::Strlen => {
            let length = str_payload(args[1].value())?.chars().count();
            let length = i64::try_from(length).map_err(|_| InterpretError::invalid_value("string too long"))?;
            store(ctx, &args[0], Value::Int(length))
        }
        Opcode::Getchar => {
            let ch = char_at(str_payload(args[1].value())?, int_payload(args[2].value())?)?;
            store(ctx, &args[0], Value::Str(ch.to_string()))
        }
        Opcode::Setchar => {
            let dest = args[0].value().clone();
            let result = set_char(
                str_payload(&dest)?,
                int_payload(args[1].value())?,
                str_payload(args[2].value())?,
            )?;
            store(ctx, &args[0], Value::Str(result))
        }
        Opcode::Type => {
            let name = args[1].value().data_type().as_str().to_owned();
            store(ctx, &args[0], Value::Str(name))
        }
        Opcode::Label => ctx.add_label(label_of(&args[0])?),
        Opcode::Jump => {
            ctx.jump(label_of(&args[0])?);
            Ok(())
        }
        Opcode::JumpIfEq => jump_if(false, ctx, args),
        Opcode::JumpIfNeq => jump_if(true, ctx, args),
        Opcode::Exit => ctx.terminate(int_payload(args[0].value())?),
        Opcode::Dprint => {
            let text = format!("{}\n", args[0].value().diagnostic_text());
            output.write_stderr(Cow::Owned(text)).map_err(InterpretError::io)
        }
        Opcode::Break => output
            .write_stderr(Cow::Owned(ctx.dump_string()))
            .map_err(InterpretError::io),
        Opcode::Adds => stack_binary(ctx, Opcode::Add),
        Opcode::Subs => stack_binary(ctx, Opcode::Sub),
        Opcode::Muls => stack_binary(ctx, Opcode::Mul),
        Opcode::Divs => stack_binary(ctx, Opcode::Div),
        Opcode::Idivs => stack_binary(ctx, Opcode::Idiv),
        Opcode::Lts => stack_binary(ctx, Opcode::Lt),
        Opcode::Gts => stack_binary(ctx, Opcode::Gt),
        Opcode::Eqs => stack_binary(ctx, Opcode::Eq),
        Opcode::Ands => stack_binary(ctx, Opcode::And),
        Opcode::Ors => stack_binary(ctx, Opcode::Or),
        Opcode::Nots => stack_unary(ctx, Opcode::Not),
        Opcode::Int2Chars => stack_unary(ctx, Opcode::Int2Char),
        Opcode::Stri2Ints => stack_binary(ctx, Opcode::Stri2Int),
        Opcode::JumpIfEqs => stack_jump_if(false, ctx, args),
        Opcode::JumpIfNeqs => stack_jump_if(true, ctx, args),
    }
}

/// Writes a value into the variable the destination operand refers to.
fn store<R: BufRead>(ctx: &mut InterpreterContext<R>, dest: &Operand, value: Value) -> RunResult<()> {
    match dest {
        Operand::Var { frame, name, .. } => ctx.set_var(*frame, name, value),
        Operand::Const(_) => Err(InterpretError::internal("destination operand must be a variable")),
    }
}

/// Raises a missing-value error when the operand is an unassigned variable.
fn require_defined(operand: &Operand) -> RunResult<()> {
    if operand.value().data_type() == DataType::Undefined {
        Err(InterpretError::missing_value(operand.var_name()))
    } else {
        Ok(())
    }
}

fn label_of(operand: &Operand) -> RunResult<&str> {
    match operand.value() {
        Value::Label(label) => Ok(label),
        _ => Err(InterpretError::internal("operand contract violated: expected a label")),
    }
}

fn int_payload(value: &Value) -> RunResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        _ => Err(InterpretError::internal("operand contract violated: expected an int")),
    }
}

fn str_payload(value: &Value) -> RunResult<&str> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(InterpretError::internal("operand contract violated: expected a string")),
    }
}

fn bool_payload(value: &Value) -> RunResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(InterpretError::internal("operand contract violated: expected a bool")),
    }
}

fn float_payload(value: &Value) -> RunResult<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        _ => Err(InterpretError::internal("operand contract violated: expected a float")),
    }
}

/// The scalar semantics shared by the binary instructions and their stack
/// forms.
fn scalar_binary(parent: Opcode, a: &Value, b: &Value) -> RunResult<Value> {
    match parent {
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => arith(parent, a, b),
        Opcode::Idiv => int_div(int_payload(a)?, int_payload(b)?).map(Value::Int),
        Opcode::Lt => compare(false, a, b),
        Opcode::Gt => compare(true, a, b),
        Opcode::Eq => equal(a, b),
        Opcode::And => Ok(Value::Bool(bool_payload(a)? && bool_payload(b)?)),
        Opcode::Or => Ok(Value::Bool(bool_payload(a)? || bool_payload(b)?)),
        Opcode::Stri2Int => char_at(str_payload(a)?, int_payload(b)?).map(|c| Value::Int(i64::from(u32::from(c)))),
        _ => Err(InterpretError::internal("not a binary instruction")),
    }
}

/// The scalar semantics shared by the unary instructions and their stack
/// forms.
fn scalar_unary(parent: Opcode, a: &Value) -> RunResult<Value> {
    match parent {
        Opcode::Not => Ok(Value::Bool(!bool_payload(a)?)),
        Opcode::Int2Char => {
            let code = int_payload(a)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| InterpretError::string_operation("invalid ordinal value"))
        }
        Opcode::Int2Float => Ok(Value::Float(int_payload(a)? as f64)),
        Opcode::Float2Int => float_to_int(float_payload(a)?).map(Value::Int),
        _ => Err(InterpretError::internal("not a unary instruction")),
    }
}

/// Both operands must carry the same type; the descriptors have already
/// narrowed the permitted set.
fn require_same_types(a: &Value, b: &Value) -> RunResult<()> {
    if a.data_type() == b.data_type() {
        Ok(())
    } else {
        Err(InterpretError::operand("invalid argument types combination"))
    }
}

/// `ADD`/`SUB`/`MUL`/`DIV` — type-preserving arithmetic over ints and floats.
fn arith(opcode: Opcode, a: &Value, b: &Value) -> RunResult<Value> {
    require_same_types(a, b)?;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            let result = match opcode {
                Opcode::Add => x.checked_add(*y),
                Opcode::Sub => x.checked_sub(*y),
                Opcode::Mul => x.checked_mul(*y),
                Opcode::Div => return int_div(*x, *y).map(Value::Int),
                _ => return Err(InterpretError::internal("not an arithmetic instruction")),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| InterpretError::invalid_value("integer overflow"))
        }
        (Value::Float(x), Value::Float(y)) => {
            let result = match opcode {
                Opcode::Add => x + y,
                Opcode::Sub => x - y,
                Opcode::Mul => x * y,
                Opcode::Div => {
                    if *y == 0.0 {
                        return Err(InterpretError::invalid_value("division by zero"));
                    }
                    x / y
                }
                _ => return Err(InterpretError::internal("not an arithmetic instruction")),
            };
            Ok(Value::Float(result))
        }
        _ => Err(InterpretError::internal("operand contract violated: expected numbers")),
    }
}

/// Truncated-toward-zero integer division, shared by `DIV` on ints and `IDIV`.
fn int_div(a: i64, b: i64) -> RunResult<i64> {
    if b == 0 {
        return Err(InterpretError::invalid_value("division by zero"));
    }
    a.checked_div(b)
        .ok_or_else(|| InterpretError::invalid_value("integer overflow"))
}

/// `LT`/`GT` over same-typed ints, floats, bools and strings.
///
/// Float comparisons involving NaN are false in both directions.
fn compare(greater: bool, a: &Value, b: &Value) -> RunResult<Value> {
    require_same_types(a, b)?;
    let result = match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            if greater {
                x > y
            } else {
                x < y
            }
        }
        (Value::Bool(x), Value::Bool(y)) => {
            if greater {
                x > y
            } else {
                x < y
            }
        }
        (Value::Str(x), Value::Str(y)) => {
            if greater {
                x > y
            } else {
                x < y
            }
        }
        (Value::Float(x), Value::Float(y)) => {
            if greater {
                x > y
            } else {
                x < y
            }
        }
        _ => return Err(InterpretError::internal("operand contract violated: not comparable")),
    };
    Ok(Value::Bool(result))
}

/// `EQ` — like the comparisons but nil is allowed on either side; nil equals
/// only nil.
fn equal(a: &Value, b: &Value) -> RunResult<Value> {
    if a.data_type() != b.data_type() && a.data_type() != DataType::Nil && b.data_type() != DataType::Nil {
        return Err(InterpretError::operand("invalid argument types combination"));
    }
    Ok(Value::Bool(a.program_eq(b)))
}

fn concat(a: &Value, b: &Value) -> RunResult<Value> {
    require_same_types(a, b)?;
    let mut result = str_payload(a)?.to_owned();
    result.push_str(str_payload(b)?);
    Ok(Value::Str(result))
}

/// Code-point indexing shared by `GETCHAR` and `STRI2INT`.
fn char_at(s: &str, index: i64) -> RunResult<char> {
    usize::try_from(index)
        .ok()
        .and_then(|index| s.chars().nth(index))
        .ok_or_else(|| InterpretError::string_operation("index out of bounds"))
}

/// `SETCHAR` — replaces the addressed character with the first character of
/// the source string, producing a new string.
fn set_char(dest: &str, index: i64, src: &str) -> RunResult<String> {
    let index = usize::try_from(index)
        .ok()
        .filter(|&index| index < dest.chars().count())
        .ok_or_else(|| InterpretError::string_operation("index out of bounds"))?;
    let replacement = src
        .chars()
        .next()
        .ok_or_else(|| InterpretError::string_operation("empty source string"))?;
    Ok(dest
        .chars()
        .enumerate()
        .map(|(i, c)| if i == index { replacement } else { c })
        .collect())
}

/// `FLOAT2INT` — truncation toward zero; non-finite or out-of-range inputs
/// are invalid values.
fn float_to_int(value: f64) -> RunResult<i64> {
    let truncated = value.trunc();
    if truncated.is_finite() && truncated >= -9_223_372_036_854_775_808.0 && truncated < 9_223_372_036_854_775_808.0 {
        Ok(truncated as i64)
    } else {
        Err(InterpretError::invalid_value("float value out of integer range"))
    }
}

/// `READ` — reads one line and parses it as the requested type; EOF and
/// parse failures yield nil.
fn read_input<R: BufRead>(ctx: &mut InterpreterContext<R>, args: &[Operand]) -> RunResult<()> {
    let Value::Type(target) = args[1].value() else {
        return Err(InterpretError::internal("operand contract violated: expected a type"));
    };
    let target = *target;
    let line = ctx.read_input_line().map_err(InterpretError::io)?;
    let value = match line {
        None => Value::Nil,
        Some(line) => match target {
            DataType::Int => line.trim().parse().map_or(Value::Nil, Value::Int),
            DataType::Float => value::parse_float(line.trim()).map_or(Value::Nil, Value::Float),
            DataType::Str => Value::Str(line.trim_end_matches(['\r', '\n']).to_owned()),
            DataType::Bool => Value::Bool(line.trim().eq_ignore_ascii_case("true")),
            _ => {
                return Err(InterpretError::operand(
                    "READ type must be one of 'int', 'string', 'bool' or 'float'",
                ));
            }
        },
    };
    store(ctx, &args[0], value)
}

/// `JUMPIFEQ`/`JUMPIFNEQ` — jumps on (in)equality, or starts a cache-warming
/// label lookup when the condition is false.
fn jump_if<R: BufRead>(negate: bool, ctx: &mut InterpreterContext<R>, args: &[Operand]) -> RunResult<()> {
    require_defined(&args[1])?;
    require_defined(&args[2])?;
    let (a, b) = (args[1].value(), args[2].value());
    if a.data_type() != b.data_type() && a.data_type() != DataType::Nil && b.data_type() != DataType::Nil {
        return Err(InterpretError::operand("types of compared symbols do not match"));
    }
    let condition = a.program_eq(b) != negate;
    let label = label_of(&args[0])?;
    if condition {
        ctx.jump(label);
    } else {
        ctx.lookup_label(label);
    }
    Ok(())
}

/// Stack form of a binary instruction: pops the operands (rightmost on top),
/// validates them against the parent's descriptors, and pushes the result.
fn stack_binary<R: BufRead>(ctx: &mut InterpreterContext<R>, parent: Opcode) -> RunResult<()> {
    if ctx.operand_depth() < 2 {
        return Err(InterpretError::empty_stack());
    }
    let b = ctx.pop_operand()?;
    let a = ctx.pop_operand()?;
    let specs = parent.arg_specs();
    specs[1].check_value(&a, true, None, 2)?;
    specs[2].check_value(&b, true, None, 3)?;
    let result = scalar_binary(parent, &a, &b)?;
    ctx.push_operand(result, None)
}

/// Stack form of a unary instruction.
fn stack_unary<R: BufRead>(ctx: &mut InterpreterContext<R>, parent: Opcode) -> RunResult<()> {
    let a = ctx.pop_operand()?;
    parent.arg_specs()[1].check_value(&a, true, None, 2)?;
    let result = scalar_unary(parent, &a)?;
    ctx.push_operand(result, None)
}

/// `JUMPIFEQS`/`JUMPIFNEQS` — pops both operands; when an untaken jump
/// starts a label lookup the operands are pushed back, because the warmed
/// conditional re-executes after the scan and pops them again.
fn stack_jump_if<R: BufRead>(negate: bool, ctx: &mut InterpreterContext<R>, args: &[Operand]) -> RunResult<()> {
    if ctx.operand_depth() < 2 {
        return Err(InterpretError::empty_stack());
    }
    let b = ctx.pop_operand()?;
    let a = ctx.pop_operand()?;
    if a.data_type() != b.data_type() && a.data_type() != DataType::Nil && b.data_type() != DataType::Nil {
        return Err(InterpretError::operand("types of compared symbols do not match"));
    }
    let condition = a.program_eq(&b) != negate;
    let label = label_of(&args[0])?;
    if condition {
        ctx.jump(label);
    } else {
        ctx.lookup_label(label);
    }
    if ctx.performing_lookup_jump {
        ctx.push_operand(a, None)?;
        ctx.push_operand(b, None)?;
    }
    Ok(())
}
