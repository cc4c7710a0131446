// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compiled code objects.
//!
//! A [`Code`] is produced by [`Builder::resolve`] and never changes afterwards. It holds the
//! instruction words plus the side tables their operands index into: literals, type
//! descriptors, resolved host functions and host variables, and the declared variable slots.
//! A `Code` is `Send + Sync` and may back any number of [`Context`]s at once.
//!
//! [`Builder::resolve`]: crate::builder::Builder::resolve
//! [`Context`]: crate::context::Context

use crate::instr::{DecodeError, Instr};
use crate::registry::{FuncRef, FuncvRef, HostVarRef};
use crate::types::Type;
use crate::value::Value;

/// A declared variable slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotInfo {
    /// Source name of the variable.
    pub name: Box<str>,
    /// Declared descriptor; stores are checked against it.
    pub ty: Type,
}

/// Immutable compiled code.
#[derive(Clone, Debug)]
pub struct Code {
    pub(crate) words: Box<[u32]>,
    pub(crate) literals: Box<[Value]>,
    pub(crate) types: Box<[Type]>,
    pub(crate) funcs: Box<[FuncRef]>,
    pub(crate) funcvs: Box<[FuncvRef]>,
    pub(crate) host_vars: Box<[HostVarRef]>,
    pub(crate) slots: Box<[SlotInfo]>,
}

impl Code {
    /// Number of instruction words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Raw instruction words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Decodes the word at `ip`, or `None` past the end.
    pub fn instr(&self, ip: usize) -> Option<Result<Instr, DecodeError>> {
        self.words.get(ip).map(|&w| Instr::decode(w))
    }

    /// Number of variable slots a [`Context`](crate::context::Context) allocates.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Declared variable slots, by slot index.
    #[must_use]
    pub fn slots(&self) -> &[SlotInfo] {
        &self.slots
    }

    /// Literal pool.
    #[must_use]
    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    /// Type table.
    #[must_use]
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    /// Fixed-arity functions referenced by `call` instructions.
    #[must_use]
    pub fn funcs(&self) -> &[FuncRef] {
        &self.funcs
    }

    /// Variadic functions referenced by `callv` instructions.
    #[must_use]
    pub fn funcvs(&self) -> &[FuncvRef] {
        &self.funcvs
    }

    /// Host variables referenced by `load_host_var`/`store_host_var`.
    #[must_use]
    pub fn host_vars(&self) -> &[HostVarRef] {
        &self.host_vars
    }
}
