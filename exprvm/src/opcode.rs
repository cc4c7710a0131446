// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opcode values for the instruction set.
//!
//! An opcode occupies the top [`OPCODE_BITS`] bits of an instruction word.

/// Width of the opcode field.
pub const OPCODE_BITS: u32 = 6;

/// Instruction opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Push a literal-pool entry.
    PushLit = 0x00,
    /// Push a small signed integer immediate.
    PushInt = 0x01,
    /// Push `nil`.
    PushNil = 0x02,
    /// Push the zero value of a descriptor.
    Zero = 0x03,
    /// Call a fixed-arity host function.
    CallFunc = 0x04,
    /// Call a variadic host function.
    CallFuncv = 0x05,
    /// Build a slice or array from stack values.
    MakeArray = 0x06,
    /// Accept an already-built sequence of exactly the given descriptor.
    MakeArrayFrom = 0x07,
    /// Build a map from stack key/value pairs.
    MakeMap = 0x08,
    /// High arity bits for the following arity-bearing instruction.
    Wide = 0x09,
    /// Pop into a variable slot.
    StoreVar = 0x0A,
    /// Push a variable slot.
    LoadVar = 0x0B,
    /// Push a host variable.
    LoadHostVar = 0x0C,
    /// Pop into a host variable.
    StoreHostVar = 0x0D,
    /// Apply a builtin operator.
    BuiltinOp = 0x0E,
    /// Unconditional jump.
    Jmp = 0x0F,
    /// Pop a bool and jump when it is `true`.
    JmpIfTrue = 0x10,
    /// Pop a bool and jump when it is `false`.
    JmpIfFalse = 0x11,
    /// Open an empty comprehension accumulator.
    MakeEmpty = 0x12,
    /// Pop a container and open an iteration over it.
    IterInit = 0x13,
    /// Advance the innermost iteration or exit the loop.
    IterNext = 0x14,
    /// Pop one value into the innermost list accumulator.
    Append = 0x15,
    /// Pop a value then a key into the innermost map accumulator.
    Insert = 0x16,
    /// Close the innermost accumulator and push its value.
    Collect = 0x17,
    /// Discard stack values.
    Pop = 0x18,
}

impl Opcode {
    const ALL: [Self; 25] = [
        Self::PushLit,
        Self::PushInt,
        Self::PushNil,
        Self::Zero,
        Self::CallFunc,
        Self::CallFuncv,
        Self::MakeArray,
        Self::MakeArrayFrom,
        Self::MakeMap,
        Self::Wide,
        Self::StoreVar,
        Self::LoadVar,
        Self::LoadHostVar,
        Self::StoreHostVar,
        Self::BuiltinOp,
        Self::Jmp,
        Self::JmpIfTrue,
        Self::JmpIfFalse,
        Self::MakeEmpty,
        Self::IterInit,
        Self::IterNext,
        Self::Append,
        Self::Insert,
        Self::Collect,
        Self::Pop,
    ];

    /// Returns the opcode byte value.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Parses an opcode from its byte value.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b)).copied()
    }

    /// Mnemonic used by the disassembler.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::PushLit => "push_lit",
            Self::PushInt => "push_int",
            Self::PushNil => "push_nil",
            Self::Zero => "zero",
            Self::CallFunc => "call",
            Self::CallFuncv => "callv",
            Self::MakeArray => "make_array",
            Self::MakeArrayFrom => "make_array_from",
            Self::MakeMap => "make_map",
            Self::Wide => "wide",
            Self::StoreVar => "store_var",
            Self::LoadVar => "load_var",
            Self::LoadHostVar => "load_host_var",
            Self::StoreHostVar => "store_host_var",
            Self::BuiltinOp => "op",
            Self::Jmp => "jmp",
            Self::JmpIfTrue => "jmp_if_true",
            Self::JmpIfFalse => "jmp_if_false",
            Self::MakeEmpty => "make_empty",
            Self::IterInit => "iter_init",
            Self::IterNext => "iter_next",
            Self::Append => "append",
            Self::Insert => "insert",
            Self::Collect => "collect",
            Self::Pop => "pop",
        }
    }

    /// Returns `true` for instructions that may follow a [`Opcode::Wide`] prefix.
    #[must_use]
    pub const fn has_arity(self) -> bool {
        matches!(self, Self::CallFuncv | Self::MakeArray | Self::MakeMap)
    }

    /// Returns `true` for instructions that may transfer control.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Self::Jmp | Self::JmpIfTrue | Self::JmpIfFalse | Self::IterNext
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{OPCODE_BITS, Opcode};

    #[test]
    fn opcode_values_are_stable() {
        assert_eq!(Opcode::PushLit as u8, 0x00);
        assert_eq!(Opcode::CallFuncv as u8, 0x05);
        assert_eq!(Opcode::Wide as u8, 0x09);
        assert_eq!(Opcode::IterNext as u8, 0x14);
        assert_eq!(Opcode::Pop as u8, 0x18);
    }

    #[test]
    fn opcodes_round_trip_and_fit_their_field() {
        for b in 0..=u8::MAX {
            if let Some(op) = Opcode::from_byte(b) {
                assert_eq!(op.byte(), b);
                assert!(u32::from(b) < (1 << OPCODE_BITS));
            }
        }
        assert_eq!(Opcode::from_byte(0x19), None);
    }

    #[test]
    fn opcode_classification() {
        assert!(Opcode::CallFuncv.has_arity());
        assert!(!Opcode::CallFunc.has_arity());
        assert!(Opcode::IterNext.is_branch());
        assert!(!Opcode::Append.is_branch());
    }
}
