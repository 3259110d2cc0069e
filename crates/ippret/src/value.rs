use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::InterpretError;

/// The type tag a runtime value can carry.
///
/// `Undefined` marks a defined but never-assigned variable. `Label` and
/// `Type` are only produced by literal arguments; a running variable never
/// holds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum DataType {
    #[strum(serialize = "")]
    Undefined,
    #[strum(serialize = "nil")]
    Nil,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "string")]
    Str,
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "label")]
    Label,
    #[strum(serialize = "type")]
    Type,
}

impl DataType {
    /// Resolves a type name from the source document; trimmed, case-sensitive.
    ///
    /// Unknown names resolve to `Undefined`, which every caller rejects.
    pub(crate) fn from_name(name: &str) -> Self {
        name.trim().parse().unwrap_or(Self::Undefined)
    }

    /// The canonical lowercase name; the empty string for `Undefined`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A single runtime value: a type tag with its payload.
///
/// Values are owned by exactly one location (a frame slot, an operand-stack
/// slot, or a literal argument). Assignments copy by value; strings are
/// logically immutable and `SETCHAR` rebinds a freshly built string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Undefined,
    Nil,
    Int(i64),
    Bool(bool),
    Float(f64),
    Str(String),
    /// A label name; produced only by `label` literal arguments.
    Label(String),
    /// A data-type tag; produced only by `type` literal arguments.
    Type(DataType),
}

impl Value {
    /// The type tag of this value.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Undefined => DataType::Undefined,
            Self::Nil => DataType::Nil,
            Self::Int(_) => DataType::Int,
            Self::Bool(_) => DataType::Bool,
            Self::Float(_) => DataType::Float,
            Self::Str(_) => DataType::Str,
            Self::Label(_) => DataType::Label,
            Self::Type(_) => DataType::Type,
        }
    }

    /// Equality as observed by `EQ` and the conditional jumps.
    ///
    /// Callers have already established that the operand types match or that
    /// one side is nil; nil equals only nil.
    pub(crate) fn program_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Nil, _) | (_, Self::Nil) => false,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => false,
        }
    }

    /// The exact text `WRITE` emits for this value.
    ///
    /// Booleans print `true`/`false`, nil prints nothing, floats print in
    /// hexadecimal form, ints and strings in their natural form. `Undefined`,
    /// `Label` and `Type` are rejected by the argument descriptor before
    /// dispatch and render empty here.
    pub(crate) fn output_text(&self) -> Cow<'_, str> {
        match self {
            Self::Str(s) => Cow::Borrowed(s.as_str()),
            Self::Int(i) => Cow::Owned(i.to_string()),
            Self::Bool(true) => Cow::Borrowed("true"),
            Self::Bool(false) => Cow::Borrowed("false"),
            Self::Float(f) => Cow::Owned(float_hex(*f)),
            Self::Nil | Self::Undefined | Self::Label(_) | Self::Type(_) => Cow::Borrowed(""),
        }
    }

    /// Human-readable rendering used by `DPRINT` and context dumps.
    pub(crate) fn diagnostic_text(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_owned(),
            Self::Nil => "nil".to_owned(),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::Str(s) => s.clone(),
            Self::Label(l) => l.clone(),
            Self::Type(t) => t.as_str().to_owned(),
        }
    }
}

/// Parses a `(type-name, textual-literal)` pair from the source document.
///
/// Failures are lexical errors (exit 32). An unknown type name is reported
/// as an invalid variable type; `var` arguments never reach this function.
pub(crate) fn parse_literal(type_name: &str, text: &str) -> Result<Value, InterpretError> {
    match DataType::from_name(type_name) {
        DataType::Undefined => Err(InterpretError::lexical(type_name, "variable type")),
        DataType::Label => Ok(Value::Label(text.to_owned())),
        DataType::Nil => {
            if text == "nil" {
                Ok(Value::Nil)
            } else {
                Err(InterpretError::lexical(text, "nil"))
            }
        }
        DataType::Int => parse_int(text).map(Value::Int),
        DataType::Str => decode_string(text).map(Value::Str),
        DataType::Bool => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(InterpretError::lexical(text, "bool")),
        },
        DataType::Float => parse_float(text).map(Value::Float),
        DataType::Type => parse_type(text).map(Value::Type),
    }
}

/// Parses an integer literal: decimal, optional sign, surrounding whitespace
/// tolerated.
pub(crate) fn parse_int(text: &str) -> Result<i64, InterpretError> {
    text.trim().parse().map_err(|_| InterpretError::lexical(text, "int"))
}

/// Parses a `type` literal; only the four value types are valid here.
pub(crate) fn parse_type(text: &str) -> Result<DataType, InterpretError> {
    match DataType::from_name(text) {
        DataType::Undefined | DataType::Nil | DataType::Label | DataType::Type => {
            Err(InterpretError::lexical(text, "type"))
        }
        data_type => Ok(data_type),
    }
}

/// Decodes a string literal.
///
/// The escape sequence `\ddd` (exactly three decimal digits) contributes one
/// UTF-8 byte; consecutive escapes form one byte sequence and are decoded
/// together, so multi-byte characters can be spelled as `\195\161`. Any other
/// character, including a backslash not followed by three digits, passes
/// through unchanged.
pub(crate) fn decode_string(text: &str) -> Result<String, InterpretError> {
    if !text.contains('\\') {
        return Ok(text.to_owned());
    }
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut pending: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(u8::is_ascii_digit)
        {
            let code = (u32::from(bytes[i + 1] - b'0') * 100)
                + (u32::from(bytes[i + 2] - b'0') * 10)
                + u32::from(bytes[i + 3] - b'0');
            let byte = u8::try_from(code).map_err(|_| InterpretError::lexical(text, "string"))?;
            pending.push(byte);
            i += 4;
        } else {
            flush_escape_run(text, &mut pending, &mut out)?;
            out.push(bytes[i]);
            i += 1;
        }
    }
    flush_escape_run(text, &mut pending, &mut out)?;
    String::from_utf8(out).map_err(|_| InterpretError::lexical(text, "string"))
}

/// Validates and appends an accumulated `\ddd` byte run; the run must itself
/// be valid UTF-8.
fn flush_escape_run(text: &str, pending: &mut Vec<u8>, out: &mut Vec<u8>) -> Result<(), InterpretError> {
    if pending.is_empty() {
        return Ok(());
    }
    std::str::from_utf8(pending).map_err(|_| InterpretError::lexical(text, "string"))?;
    out.append(pending);
    Ok(())
}

/// Parses a float literal: hexadecimal form first (`0x1.8p+1`), decimal form
/// as a fallback.
pub(crate) fn parse_float(text: &str) -> Result<f64, InterpretError> {
    let trimmed = text.trim();
    if let Some(value) = parse_hex_float(trimmed) {
        return Ok(value);
    }
    trimmed.parse().map_err(|_| InterpretError::lexical(text, "float"))
}

/// Parses the hexadecimal float form: optional sign, optional `0x`, hex
/// digits with an optional fraction, optional `p`-exponent, plus the
/// `inf`/`infinity`/`nan` names. Returns `None` when the text does not match
/// the grammar or the value overflows f64.
fn parse_hex_float(text: &str) -> Option<f64> {
    let mut s = text;
    let negative = match s.bytes().next()? {
        b'+' => {
            s = &s[1..];
            false
        }
        b'-' => {
            s = &s[1..];
            true
        }
        _ => false,
    };
    let lower = s.to_ascii_lowercase();
    match lower.as_str() {
        "inf" | "infinity" => {
            return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
        }
        "nan" => return Some(f64::NAN),
        _ => {}
    }
    let rest = lower.strip_prefix("0x").unwrap_or(&lower);
    let (mantissa, exponent) = match rest.split_once('p') {
        Some((mantissa, exponent)) if !exponent.is_empty() => {
            // saturate absurd exponents; the magnitude checks below handle them
            (mantissa, exponent.parse::<i64>().ok()?.clamp(-100_000, 100_000))
        }
        Some(_) => return None,
        None => (rest, 0),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_hexdigit()) || !frac_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    // Accumulate the digits into a 128-bit significand; beyond its capacity
    // only the binary exponent and a sticky bit are tracked.
    let mut mant: u128 = 0;
    let mut bexp = exponent;
    let mut sticky = false;
    let digits = int_part
        .bytes()
        .map(|b| (b, false))
        .chain(frac_part.bytes().map(|b| (b, true)));
    for (digit, in_fraction) in digits {
        let digit = u128::from((digit as char).to_digit(16)?);
        if mant >> 120 == 0 {
            mant = (mant << 4) | digit;
            if in_fraction {
                bexp -= 4;
            }
        } else {
            sticky |= digit != 0;
            if !in_fraction {
                bexp += 4;
            }
        }
    }
    if mant == 0 {
        return Some(if negative { -0.0 } else { 0.0 });
    }
    round_to_f64(mant, bexp, sticky, negative)
}

/// Rounds `±mant * 2^bexp` (with a sticky bit for discarded low bits) to the
/// nearest f64, ties to even. Returns `None` on overflow.
fn round_to_f64(mut mant: u128, mut bexp: i64, sticky: bool, negative: bool) -> Option<f64> {
    let msb = i64::from(127 - mant.leading_zeros() as i32);
    let value_exp = msb + bexp;
    // target precision: 53 bits for normal results, fewer at the subnormal floor
    let target_lsb = (value_exp - 52).max(-1074);
    let shift = target_lsb - bexp;
    if shift > 0 {
        if shift >= 128 {
            // far below the subnormal range; only exactly-half-or-more of the
            // smallest subnormal rounds away from zero
            let half = 1u128 << 127;
            let rounds_up = shift == 128 && (mant > half || (mant == half && sticky));
            mant = u128::from(rounds_up);
        } else {
            let drop = u32::try_from(shift).ok()?;
            let half = 1u128 << (drop - 1);
            let dropped = mant & ((1u128 << drop) - 1);
            mant >>= drop;
            if dropped > half || (dropped == half && (sticky || mant & 1 == 1)) {
                mant += 1;
            }
        }
        bexp = target_lsb;
    } else if shift < 0 {
        mant <<= u32::try_from(-shift).ok()?;
        bexp = target_lsb;
    }
    if mant == 0 {
        return Some(if negative { -0.0 } else { 0.0 });
    }
    let msb = i64::from(127 - mant.leading_zeros() as i32);
    if msb + bexp > 1023 {
        return None;
    }
    let value = (mant as f64) * pow2(bexp);
    Some(if negative { -value } else { value })
}

/// Exactly representable power of two for exponents in `[-1074, 1023]`.
fn pow2(exponent: i64) -> f64 {
    if exponent >= -1022 {
        f64::from_bits(((exponent + 1023) as u64) << 52)
    } else {
        f64::from_bits(1u64 << (exponent + 1074))
    }
}

/// Formats a float in the hexadecimal form `WRITE` emits.
///
/// The output matches CPython's `float.hex()` bit for bit: a `0x1.` (or
/// `0x0.` for subnormals and zero) prefix, thirteen hex fraction digits, and
/// a signed decimal binary exponent.
pub(crate) fn float_hex(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let bits = value.to_bits();
    let sign = if bits >> 63 == 1 { "-" } else { "" };
    let raw_exp = i64::try_from((bits >> 52) & 0x7ff).unwrap_or(0);
    let frac = bits & ((1u64 << 52) - 1);
    if raw_exp == 0 && frac == 0 {
        return format!("{sign}0x0.0p+0");
    }
    let (lead, exp) = if raw_exp == 0 {
        ('0', -1022)
    } else {
        ('1', raw_exp - 1023)
    };
    format!("{sign}0x{lead}.{frac:013x}p{exp:+}")
}
