// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Builtin operators.
//!
//! Every operator instruction carries a [`Kind`], so evaluation never inspects the runtime
//! representation to decide between integer and floating-point semantics. Integer results wrap
//! to the width of the kind.

use std::cmp::Ordering;
use std::fmt;

use crate::context::Trap;
use crate::types::{Kind, TypeError};
use crate::value::Value;

/// A builtin operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// `a + b` (numbers, string concatenation).
    Add = 0,
    /// `a - b`.
    Sub = 1,
    /// `a * b`.
    Mul = 2,
    /// `a / b`.
    Quo = 3,
    /// `a % b`.
    Mod = 4,
    /// `a & b`.
    And = 5,
    /// `a | b`.
    Or = 6,
    /// `a ^ b`.
    Xor = 7,
    /// `a &^ b`.
    AndNot = 8,
    /// `a << b`.
    Lsh = 9,
    /// `a >> b`.
    Rsh = 10,
    /// `a && b`.
    LAnd = 11,
    /// `a || b`.
    LOr = 12,
    /// `a == b`.
    Eq = 13,
    /// `a != b`.
    Ne = 14,
    /// `a < b`.
    Lt = 15,
    /// `a <= b`.
    Le = 16,
    /// `a > b`.
    Gt = 17,
    /// `a >= b`.
    Ge = 18,
    /// `-a`.
    Neg = 19,
    /// `!a`.
    Not = 20,
    /// `^a`.
    BitNot = 21,
}

impl Op {
    const ALL: [Self; 22] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Quo,
        Self::Mod,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::AndNot,
        Self::Lsh,
        Self::Rsh,
        Self::LAnd,
        Self::LOr,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Neg,
        Self::Not,
        Self::BitNot,
    ];

    /// Parses an operator from its discriminant.
    #[must_use]
    pub fn from_u8(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b)).copied()
    }

    /// Number of operands consumed.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Neg | Self::Not | Self::BitNot => 1,
            _ => 2,
        }
    }

    /// Source-level spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Quo => "/",
            Self::Mod => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::AndNot => "&^",
            Self::Lsh => "<<",
            Self::Rsh => ">>",
            Self::LAnd => "&&",
            Self::LOr => "||",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Neg => "neg",
            Self::Not => "!",
            Self::BitNot => "^x",
        }
    }

    const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Returns `Ok` if `self` is defined on operands of `kind`.
    pub fn check(self, kind: Kind) -> Result<(), TypeError> {
        let ok = match self {
            Self::Eq | Self::Ne => true,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                kind.is_integer() || kind.is_float() || kind == Kind::String
            }
            Self::Add => kind.is_integer() || kind.is_float() || kind == Kind::String,
            Self::Sub | Self::Mul | Self::Quo | Self::Neg => kind.is_integer() || kind.is_float(),
            Self::Mod
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::AndNot
            | Self::Lsh
            | Self::Rsh
            | Self::BitNot => kind.is_integer(),
            Self::LAnd | Self::LOr | Self::Not => kind == Kind::Bool,
        };
        if ok {
            Ok(())
        } else {
            Err(TypeError::UnsupportedOp {
                kind,
                op: self.symbol(),
            })
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn mismatch(kind: Kind, v: &Value) -> Trap {
    Trap::Type(TypeError::OperandMismatch {
        expected: kind.ty(),
        found: v.type_name(),
    })
}

fn wrap_signed(kind: Kind, v: i64) -> i64 {
    let shift = 64 - kind.bits();
    (v << shift) >> shift
}

fn wrap_unsigned(kind: Kind, v: u64) -> u64 {
    match kind.bits() {
        64 => v,
        bits => v & ((1_u64 << bits) - 1),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "float32 arithmetic rounds through f32"
)]
fn round_float(kind: Kind, v: f64) -> f64 {
    if kind == Kind::Float32 {
        return f64::from(v as f32);
    }
    v
}

fn shift_count(kind: Kind, b: &Value) -> Result<u32, Trap> {
    match b {
        Value::Int(n) if *n < 0 => Err(Trap::NegativeShift),
        Value::Int(n) => Ok(u32::try_from(*n).unwrap_or(u32::MAX)),
        Value::Uint(n) => Ok(u32::try_from(*n).unwrap_or(u32::MAX)),
        other => Err(mismatch(kind, other)),
    }
}

fn ordering_result(op: Op, ord: Option<Ordering>) -> Value {
    let r = match (op, ord) {
        (Op::Eq, Some(o)) => o == Ordering::Equal,
        (Op::Ne, o) => o != Some(Ordering::Equal),
        (Op::Lt, Some(o)) => o == Ordering::Less,
        (Op::Le, Some(o)) => o != Ordering::Greater,
        (Op::Gt, Some(o)) => o == Ordering::Greater,
        (Op::Ge, Some(o)) => o != Ordering::Less,
        _ => false,
    };
    Value::Bool(r)
}

/// Evaluates a unary operator.
pub(crate) fn eval_unary(kind: Kind, op: Op, a: &Value) -> Result<Value, Trap> {
    op.check(kind).map_err(Trap::Type)?;
    match (op, a) {
        (Op::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (Op::Neg, Value::Int(i)) if kind.is_signed() => {
            Ok(Value::Int(wrap_signed(kind, i.wrapping_neg())))
        }
        (Op::Neg, Value::Uint(u)) if kind.is_unsigned() => {
            Ok(Value::Uint(wrap_unsigned(kind, u.wrapping_neg())))
        }
        (Op::Neg, Value::Float(x)) if kind.is_float() => Ok(Value::Float(-x)),
        (Op::BitNot, Value::Int(i)) if kind.is_signed() => Ok(Value::Int(wrap_signed(kind, !i))),
        (Op::BitNot, Value::Uint(u)) if kind.is_unsigned() => {
            Ok(Value::Uint(wrap_unsigned(kind, !u)))
        }
        _ => Err(mismatch(kind, a)),
    }
}

/// Evaluates a binary operator.
pub(crate) fn eval_binary(kind: Kind, op: Op, a: &Value, b: &Value) -> Result<Value, Trap> {
    op.check(kind).map_err(Trap::Type)?;
    if kind == Kind::Any {
        // Only equality is defined on `any`.
        return Ok(Value::Bool((a == b) == (op == Op::Eq)));
    }
    if kind.is_signed() {
        let (Value::Int(x), rhs) = (a, b) else {
            return Err(mismatch(kind, a));
        };
        if matches!(op, Op::Lsh | Op::Rsh) {
            let n = shift_count(kind, rhs)?;
            let r = match op {
                Op::Lsh => x.checked_shl(n).unwrap_or(0),
                _ => x.checked_shr(n).unwrap_or(if *x < 0 { -1 } else { 0 }),
            };
            return Ok(Value::Int(wrap_signed(kind, r)));
        }
        let Value::Int(y) = rhs else {
            return Err(mismatch(kind, rhs));
        };
        if op.is_comparison() {
            return Ok(ordering_result(op, Some(x.cmp(y))));
        }
        let r = match op {
            Op::Add => x.wrapping_add(*y),
            Op::Sub => x.wrapping_sub(*y),
            Op::Mul => x.wrapping_mul(*y),
            Op::Quo | Op::Mod if *y == 0 => return Err(Trap::DivideByZero),
            Op::Quo => x.wrapping_div(*y),
            Op::Mod => x.wrapping_rem(*y),
            Op::And => x & y,
            Op::Or => x | y,
            Op::Xor => x ^ y,
            Op::AndNot => x & !y,
            _ => return Err(mismatch(kind, a)),
        };
        return Ok(Value::Int(wrap_signed(kind, r)));
    }
    if kind.is_unsigned() {
        let (Value::Uint(x), rhs) = (a, b) else {
            return Err(mismatch(kind, a));
        };
        if matches!(op, Op::Lsh | Op::Rsh) {
            let n = shift_count(kind, rhs)?;
            let r = match op {
                Op::Lsh => x.checked_shl(n).unwrap_or(0),
                _ => x.checked_shr(n).unwrap_or(0),
            };
            return Ok(Value::Uint(wrap_unsigned(kind, r)));
        }
        let Value::Uint(y) = rhs else {
            return Err(mismatch(kind, rhs));
        };
        if op.is_comparison() {
            return Ok(ordering_result(op, Some(x.cmp(y))));
        }
        let r = match op {
            Op::Add => x.wrapping_add(*y),
            Op::Sub => x.wrapping_sub(*y),
            Op::Mul => x.wrapping_mul(*y),
            Op::Quo | Op::Mod if *y == 0 => return Err(Trap::DivideByZero),
            Op::Quo => x / y,
            Op::Mod => x % y,
            Op::And => x & y,
            Op::Or => x | y,
            Op::Xor => x ^ y,
            Op::AndNot => x & !y,
            _ => return Err(mismatch(kind, a)),
        };
        return Ok(Value::Uint(wrap_unsigned(kind, r)));
    }
    match (a, b) {
        (Value::Float(x), Value::Float(y)) if kind.is_float() => {
            if op.is_comparison() {
                return Ok(ordering_result(op, x.partial_cmp(y)));
            }
            let r = match op {
                Op::Add => x + y,
                Op::Sub => x - y,
                Op::Mul => x * y,
                Op::Quo => x / y,
                _ => return Err(mismatch(kind, a)),
            };
            Ok(Value::Float(round_float(kind, r)))
        }
        (Value::Str(x), Value::Str(y)) if kind == Kind::String => {
            if op.is_comparison() {
                return Ok(ordering_result(op, Some(x.cmp(y))));
            }
            let mut s = String::with_capacity(x.len() + y.len());
            s.push_str(x);
            s.push_str(y);
            Ok(Value::from(s))
        }
        (Value::Bool(x), Value::Bool(y)) if kind == Kind::Bool => Ok(Value::Bool(match op {
            Op::LAnd => *x && *y,
            Op::LOr => *x || *y,
            Op::Eq => x == y,
            _ => x != y,
        })),
        _ => {
            let culprit = if kind.ty().admits(a) { b } else { a };
            Err(mismatch(kind, culprit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(kind: Kind, op: Op, a: impl Into<Value>, b: impl Into<Value>) -> Result<Value, Trap> {
        eval_binary(kind, op, &a.into(), &b.into())
    }

    #[test]
    fn int_arithmetic_and_comparison() {
        assert_eq!(bin(Kind::Int, Op::Mul, 7_i64, 7_i64), Ok(Value::Int(49)));
        assert_eq!(bin(Kind::Int, Op::Gt, 5_i64, 3_i64), Ok(Value::Bool(true)));
        assert_eq!(bin(Kind::Int, Op::Le, 3_i64, 2_i64), Ok(Value::Bool(false)));
        assert_eq!(bin(Kind::Int, Op::AndNot, 0b1110_i64, 0b0110_i64), Ok(Value::Int(0b1000)));
    }

    #[test]
    fn narrow_kinds_wrap() {
        assert_eq!(bin(Kind::Int8, Op::Add, 127_i64, 1_i64), Ok(Value::Int(-128)));
        assert_eq!(bin(Kind::Uint8, Op::Add, 255_u64, 1_u64), Ok(Value::Uint(0)));
        assert_eq!(bin(Kind::Int32, Op::Lsh, 1_i64, 31_i64), Ok(Value::Int(i64::from(i32::MIN))));
        assert_eq!(
            eval_unary(Kind::Uint16, Op::BitNot, &Value::Uint(0)),
            Ok(Value::Uint(0xFFFF))
        );
    }

    #[test]
    fn division_by_zero_traps() {
        assert_eq!(bin(Kind::Int, Op::Quo, 1_i64, 0_i64), Err(Trap::DivideByZero));
        assert_eq!(bin(Kind::Uint, Op::Mod, 1_u64, 0_u64), Err(Trap::DivideByZero));
        assert_eq!(
            bin(Kind::Float64, Op::Quo, 1.0, 0.0),
            Ok(Value::Float(f64::INFINITY))
        );
    }

    #[test]
    fn shifts_reject_negative_counts() {
        assert_eq!(bin(Kind::Int, Op::Lsh, 1_i64, -1_i64), Err(Trap::NegativeShift));
        assert_eq!(bin(Kind::Int, Op::Rsh, -8_i64, 100_i64), Ok(Value::Int(-1)));
    }

    #[test]
    fn float_and_string_ops() {
        assert_eq!(bin(Kind::Float64, Op::Add, 0.0, 3.2), Ok(Value::Float(3.2)));
        assert_eq!(bin(Kind::String, Op::Add, "x", "sw"), Ok(Value::from("xsw")));
        assert_eq!(bin(Kind::String, Op::Lt, "a", "b"), Ok(Value::Bool(true)));
        assert_eq!(bin(Kind::Bool, Op::LAnd, true, false), Ok(Value::Bool(false)));
        assert_eq!(bin(Kind::Float32, Op::Add, 1.0, 1e-10), Ok(Value::Float(1.0)));
    }

    #[test]
    fn operand_mismatch_is_a_type_trap() {
        let err = bin(Kind::Float64, Op::Add, 1_i64, 2.0).unwrap_err();
        assert!(matches!(err, Trap::Type(TypeError::OperandMismatch { found: "int", .. })));
        let err = bin(Kind::Int, Op::Add, 1_i64, 2.0).unwrap_err();
        assert!(matches!(err, Trap::Type(TypeError::OperandMismatch { found: "float", .. })));
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        assert!(Op::Mod.check(Kind::Float64).is_err());
        assert!(Op::LAnd.check(Kind::Int).is_err());
        assert!(Op::Lt.check(Kind::Bool).is_err());
        assert!(Op::Eq.check(Kind::Any).is_ok());
        assert_eq!(Op::from_u8(Op::BitNot as u8), Some(Op::BitNot));
    }
}
