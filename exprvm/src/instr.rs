// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instruction words and their typed form.
//!
//! Every instruction is one `u32`: a 6-bit [`Opcode`] followed by 26 operand bits. Arity-bearing
//! instructions split their operand into a 16-bit table index and a [`ARITY_BITS`]-wide count.
//! Counts above [`MAX_INLINE_ARITY`] are carried by a [`Instr::Wide`] prefix holding the high
//! bits; see [`ArityOperand`].

use thiserror::Error;

use crate::opcode::{OPCODE_BITS, Opcode};
use crate::ops::Op;
use crate::types::Kind;

/// Operand bits available below the opcode.
pub const OPERAND_BITS: u32 = 32 - OPCODE_BITS;
/// Width of an inline arity field.
pub const ARITY_BITS: u32 = 10;
/// Width of the table index paired with an inline arity.
pub const INDEX_BITS: u32 = OPERAND_BITS - ARITY_BITS;
/// Largest count encodable without a [`Instr::Wide`] prefix.
pub const MAX_INLINE_ARITY: usize = (1 << ARITY_BITS) - 1;

const OPERAND_MASK: u32 = (1 << OPERAND_BITS) - 1;
const ARITY_MASK: u32 = (1 << ARITY_BITS) - 1;
const FLAG_BIT: u32 = 1 << (OPERAND_BITS - 1);
const TARGET_BITS: u32 = OPERAND_BITS - 1;

/// An instruction could not be encoded.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// An operand does not fit its field.
    #[error("{opcode:?} operand {value} does not fit in {bits} bits")]
    OperandOverflow {
        /// Instruction being encoded.
        opcode: Opcode,
        /// Offending operand.
        value: i64,
        /// Field width.
        bits: u32,
    },
}

/// An instruction word could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The opcode field does not name an instruction.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    /// A builtin-op word names an unknown kind or operator.
    #[error("unknown operator encoding (kind {kind}, op {op})")]
    BadOperator {
        /// Raw kind field.
        kind: u8,
        /// Raw operator field.
        op: u8,
    },
    /// A wide prefix is not followed by an arity-bearing instruction.
    #[error("wide prefix at {ip} has no arity-bearing successor")]
    DanglingWide {
        /// Address of the prefix.
        ip: usize,
    },
}

/// A count operand as emitted by the builder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArityOperand {
    /// The count fits the inline field.
    Inline(u16),
    /// The count needs a wide prefix: `count = (aux << ARITY_BITS) | primary`.
    Overflow {
        /// Low bits, stored in the arity-bearing instruction.
        primary: u16,
        /// High bits, stored in the preceding [`Instr::Wide`].
        aux: u32,
    },
}

impl ArityOperand {
    /// Splits `count` into inline or overflow form.
    pub fn split(count: usize) -> Result<Self, EncodeError> {
        if count <= MAX_INLINE_ARITY {
            return Ok(Self::Inline(narrow_u16(count)));
        }
        let aux = count >> ARITY_BITS;
        let Ok(aux) = u32::try_from(aux) else {
            return Err(overflow(Opcode::Wide, count, OPERAND_BITS));
        };
        if aux > OPERAND_MASK {
            return Err(overflow(Opcode::Wide, count, OPERAND_BITS));
        }
        Ok(Self::Overflow {
            primary: narrow_u16(count & MAX_INLINE_ARITY),
            aux,
        })
    }

    /// Reassembles the count.
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            Self::Inline(n) => usize::from(n),
            Self::Overflow { primary, aux } => join_arity(aux, primary),
        }
    }

    /// Bits stored in the arity-bearing instruction itself.
    #[must_use]
    pub fn primary(self) -> u16 {
        match self {
            Self::Inline(n) | Self::Overflow { primary: n, .. } => n,
        }
    }
}

/// Reassembles a count split across a wide prefix and its primary instruction.
#[must_use]
pub fn join_arity(aux: u32, primary: u16) -> usize {
    ((aux as usize) << ARITY_BITS) | usize::from(primary)
}

fn narrow_u16(v: usize) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

fn overflow(opcode: Opcode, value: impl TryInto<i64>, bits: u32) -> EncodeError {
    EncodeError::OperandOverflow {
        opcode,
        value: value.try_into().unwrap_or(i64::MAX),
        bits,
    }
}

/// A decoded instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    /// Push `literals[lit]`.
    PushLit {
        /// Literal-pool index.
        lit: u32,
    },
    /// Push a small signed integer.
    PushInt {
        /// Immediate, sign-extended from 26 bits.
        imm: i32,
    },
    /// Push `nil`.
    PushNil,
    /// Push `types[ty].zero()`.
    Zero {
        /// Type-table index.
        ty: u32,
    },
    /// Call `funcs[func]` with its declared arity.
    CallFunc {
        /// Function-table index.
        func: u32,
    },
    /// Call `funcvs[func]` with `arity` arguments (low bits if wide-prefixed).
    CallFuncv {
        /// Variadic-function-table index.
        func: u16,
        /// Inline arity bits.
        arity: u16,
    },
    /// Pop `arity` values into a sequence of `types[ty]`.
    MakeArray {
        /// Type-table index.
        ty: u16,
        /// Inline arity bits.
        arity: u16,
    },
    /// Pop one sequence; it must carry exactly `types[ty]`; push it back.
    MakeArrayFrom {
        /// Type-table index.
        ty: u32,
    },
    /// Pop `arity` key/value pairs into a map of `types[ty]`.
    MakeMap {
        /// Type-table index.
        ty: u16,
        /// Inline arity bits.
        arity: u16,
    },
    /// High arity bits for the next instruction.
    Wide {
        /// High bits.
        aux: u32,
    },
    /// `slots[slot] = pop()`.
    StoreVar {
        /// Slot index.
        slot: u32,
    },
    /// `push(slots[slot])`.
    LoadVar {
        /// Slot index.
        slot: u32,
    },
    /// `push(*host_vars[var])`.
    LoadHostVar {
        /// Host-variable-table index.
        var: u32,
    },
    /// `*host_vars[var] = pop()`.
    StoreHostVar {
        /// Host-variable-table index.
        var: u32,
    },
    /// Apply `op` to operands of `kind`.
    BuiltinOp {
        /// Operand kind.
        kind: Kind,
        /// Operator.
        op: Op,
    },
    /// `ip = target`.
    Jmp {
        /// Absolute instruction index.
        target: u32,
    },
    /// `if pop() == cond { ip = target }`.
    JmpIf {
        /// Condition that takes the jump.
        cond: bool,
        /// Absolute instruction index.
        target: u32,
    },
    /// Open an empty accumulator of `types[ty]`.
    MakeEmpty {
        /// Type-table index.
        ty: u32,
    },
    /// Pop a container and open an iteration over it.
    IterInit,
    /// Push the next `(key, value)` (or `value`), or close the iteration and jump to `exit`.
    IterNext {
        /// Whether the key is pushed before the value.
        with_key: bool,
        /// Absolute instruction index taken when the iteration is exhausted.
        exit: u32,
    },
    /// Pop a value into the innermost list accumulator.
    Append,
    /// Pop a value, then a key, into the innermost map accumulator.
    Insert,
    /// Close the innermost accumulator and push the result.
    Collect,
    /// Discard `n` values.
    Pop {
        /// Count.
        n: u32,
    },
}

impl Instr {
    /// The instruction's opcode.
    #[must_use]
    pub const fn opcode(self) -> Opcode {
        match self {
            Self::PushLit { .. } => Opcode::PushLit,
            Self::PushInt { .. } => Opcode::PushInt,
            Self::PushNil => Opcode::PushNil,
            Self::Zero { .. } => Opcode::Zero,
            Self::CallFunc { .. } => Opcode::CallFunc,
            Self::CallFuncv { .. } => Opcode::CallFuncv,
            Self::MakeArray { .. } => Opcode::MakeArray,
            Self::MakeArrayFrom { .. } => Opcode::MakeArrayFrom,
            Self::MakeMap { .. } => Opcode::MakeMap,
            Self::Wide { .. } => Opcode::Wide,
            Self::StoreVar { .. } => Opcode::StoreVar,
            Self::LoadVar { .. } => Opcode::LoadVar,
            Self::LoadHostVar { .. } => Opcode::LoadHostVar,
            Self::StoreHostVar { .. } => Opcode::StoreHostVar,
            Self::BuiltinOp { .. } => Opcode::BuiltinOp,
            Self::Jmp { .. } => Opcode::Jmp,
            Self::JmpIf { cond: true, .. } => Opcode::JmpIfTrue,
            Self::JmpIf { cond: false, .. } => Opcode::JmpIfFalse,
            Self::MakeEmpty { .. } => Opcode::MakeEmpty,
            Self::IterInit => Opcode::IterInit,
            Self::IterNext { .. } => Opcode::IterNext,
            Self::Append => Opcode::Append,
            Self::Insert => Opcode::Insert,
            Self::Collect => Opcode::Collect,
            Self::Pop { .. } => Opcode::Pop,
        }
    }

    /// Branch target, for instructions that transfer control.
    #[must_use]
    pub const fn target(self) -> Option<u32> {
        match self {
            Self::Jmp { target } | Self::JmpIf { target, .. } => Some(target),
            Self::IterNext { exit, .. } => Some(exit),
            _ => None,
        }
    }

    /// Returns `self` with its branch target replaced; other instructions are unchanged.
    #[must_use]
    pub const fn with_target(self, to: u32) -> Self {
        match self {
            Self::Jmp { .. } => Self::Jmp { target: to },
            Self::JmpIf { cond, .. } => Self::JmpIf { cond, target: to },
            Self::IterNext { with_key, .. } => Self::IterNext { with_key, exit: to },
            other => other,
        }
    }

    /// The arity-bearing instruction for `opcode` with inline bits `arity`.
    pub(crate) fn with_arity(opcode: Opcode, index: u32, arity: u16) -> Result<Self, EncodeError> {
        let Ok(index) = u16::try_from(index) else {
            return Err(overflow(opcode, index, INDEX_BITS));
        };
        Ok(match opcode {
            Opcode::CallFuncv => Self::CallFuncv { func: index, arity },
            Opcode::MakeMap => Self::MakeMap { ty: index, arity },
            _ => Self::MakeArray { ty: index, arity },
        })
    }

    /// Encodes into one instruction word.
    pub fn encode(self) -> Result<u32, EncodeError> {
        let opcode = self.opcode();
        let operand = match self {
            Self::PushLit { lit: v }
            | Self::Zero { ty: v }
            | Self::CallFunc { func: v }
            | Self::MakeArrayFrom { ty: v }
            | Self::Wide { aux: v }
            | Self::StoreVar { slot: v }
            | Self::LoadVar { slot: v }
            | Self::LoadHostVar { var: v }
            | Self::StoreHostVar { var: v }
            | Self::Jmp { target: v }
            | Self::JmpIf { target: v, .. }
            | Self::MakeEmpty { ty: v }
            | Self::Pop { n: v } => unsigned_field(opcode, v, OPERAND_BITS)?,
            Self::PushInt { imm } => {
                let lo = -(1_i32 << (OPERAND_BITS - 1));
                let hi = (1_i32 << (OPERAND_BITS - 1)) - 1;
                if !(lo..=hi).contains(&imm) {
                    return Err(overflow(opcode, imm, OPERAND_BITS));
                }
                imm.cast_unsigned() & OPERAND_MASK
            }
            Self::CallFuncv { func: i, arity }
            | Self::MakeArray { ty: i, arity }
            | Self::MakeMap { ty: i, arity } => {
                let arity = unsigned_field(opcode, u32::from(arity), ARITY_BITS)?;
                (u32::from(i) << ARITY_BITS) | arity
            }
            Self::BuiltinOp { kind, op } => (u32::from(kind as u8) << 8) | u32::from(op as u8),
            Self::IterNext { with_key, exit } => {
                let exit = unsigned_field(opcode, exit, TARGET_BITS)?;
                if with_key { exit | FLAG_BIT } else { exit }
            }
            Self::PushNil | Self::IterInit | Self::Append | Self::Insert | Self::Collect => 0,
        };
        Ok((u32::from(opcode.byte()) << OPERAND_BITS) | operand)
    }

    /// Decodes one instruction word.
    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        let raw = u8::try_from(word >> OPERAND_BITS).unwrap_or(u8::MAX);
        let opcode = Opcode::from_byte(raw).ok_or(DecodeError::UnknownOpcode(raw))?;
        let v = word & OPERAND_MASK;
        let index = u16::try_from(v >> ARITY_BITS).unwrap_or(u16::MAX);
        let arity = u16::try_from(v & ARITY_MASK).unwrap_or(u16::MAX);
        Ok(match opcode {
            Opcode::PushLit => Self::PushLit { lit: v },
            Opcode::PushInt => Self::PushInt {
                imm: (v << OPCODE_BITS).cast_signed() >> OPCODE_BITS,
            },
            Opcode::PushNil => Self::PushNil,
            Opcode::Zero => Self::Zero { ty: v },
            Opcode::CallFunc => Self::CallFunc { func: v },
            Opcode::CallFuncv => Self::CallFuncv { func: index, arity },
            Opcode::MakeArray => Self::MakeArray { ty: index, arity },
            Opcode::MakeArrayFrom => Self::MakeArrayFrom { ty: v },
            Opcode::MakeMap => Self::MakeMap { ty: index, arity },
            Opcode::Wide => Self::Wide { aux: v },
            Opcode::StoreVar => Self::StoreVar { slot: v },
            Opcode::LoadVar => Self::LoadVar { slot: v },
            Opcode::LoadHostVar => Self::LoadHostVar { var: v },
            Opcode::StoreHostVar => Self::StoreHostVar { var: v },
            Opcode::BuiltinOp => {
                let k = u8::try_from((v >> 8) & 0xFF).unwrap_or(u8::MAX);
                let o = u8::try_from(v & 0xFF).unwrap_or(u8::MAX);
                match (Kind::from_u8(k), Op::from_u8(o)) {
                    (Some(kind), Some(op)) => Self::BuiltinOp { kind, op },
                    _ => return Err(DecodeError::BadOperator { kind: k, op: o }),
                }
            }
            Opcode::Jmp => Self::Jmp { target: v },
            Opcode::JmpIfTrue => Self::JmpIf {
                cond: true,
                target: v,
            },
            Opcode::JmpIfFalse => Self::JmpIf {
                cond: false,
                target: v,
            },
            Opcode::MakeEmpty => Self::MakeEmpty { ty: v },
            Opcode::IterInit => Self::IterInit,
            Opcode::IterNext => Self::IterNext {
                with_key: v & FLAG_BIT != 0,
                exit: v & !FLAG_BIT,
            },
            Opcode::Append => Self::Append,
            Opcode::Insert => Self::Insert,
            Opcode::Collect => Self::Collect,
            Opcode::Pop => Self::Pop { n: v },
        })
    }
}

fn unsigned_field(opcode: Opcode, v: u32, bits: u32) -> Result<u32, EncodeError> {
    if v >> bits != 0 {
        return Err(overflow(opcode, v, bits));
    }
    Ok(v)
}
