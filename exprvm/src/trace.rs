// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing hooks for `exprvm`.
//!
//! The interpreter only emits events requested by a [`TraceMask`]. Pass a mask and a
//! [`TraceSink`] to [`Context::exec_traced`]; [`Context::exec`] runs with [`TraceMask::NONE`].
//!
//! These hooks are separate from the `tracing` log records the crate emits: a sink sees every
//! instruction with no formatting cost when its mask bit is clear.
//!
//! [`Context::exec`]: crate::context::Context::exec
//! [`Context::exec_traced`]: crate::context::Context::exec_traced

use crate::code::Code;
use crate::context::TrapInfo;
use crate::instr::Instr;

/// A set of trace events requested by a [`TraceSink`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceMask(u32);

impl core::ops::BitOr for TraceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for TraceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl TraceMask {
    /// No tracing.
    pub const NONE: Self = Self(0);
    /// Trace `exec` boundaries.
    ///
    /// Enables:
    /// - [`TraceSink::exec_start`]
    /// - [`TraceSink::exec_end`]
    pub const RUN: Self = Self(1 << 0);
    /// Trace each executed instruction.
    ///
    /// Enables:
    /// - [`TraceSink::instr`]
    pub const INSTR: Self = Self(1 << 1);
    /// Trace host calls.
    ///
    /// Enables:
    /// - [`TraceSink::host_enter`]
    /// - [`TraceSink::host_exit`]
    pub const HOST: Self = Self(1 << 2);

    /// Returns `true` if this mask includes all bits in `other`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// The host function at a call boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HostCall<'a> {
    /// Function name.
    pub name: &'a str,
    /// Actual argument count.
    pub arity: usize,
    /// Whether the callee is variadic.
    pub variadic: bool,
}

/// Outcome of an `exec` call.
#[derive(Clone, Debug)]
pub enum TraceOutcome<'a> {
    /// Reached the end bound.
    Ok,
    /// Trapped.
    Trap(&'a TrapInfo),
}

/// A trace sink that can receive interpreter events.
pub trait TraceSink {
    /// Called when `exec` starts.
    ///
    /// Called only if the mask includes [`TraceMask::RUN`].
    fn exec_start(&mut self, _code: &Code, _from: usize, _to: usize) {}

    /// Called before each instruction is dispatched.
    ///
    /// Called only if the mask includes [`TraceMask::INSTR`].
    ///
    /// - `ip`: instruction index (of the prefix, for wide instructions)
    /// - `instr`: decoded instruction
    /// - `stack_len`: value-stack depth before dispatch
    fn instr(&mut self, _code: &Code, _ip: usize, _instr: Instr, _stack_len: usize) {}

    /// Called before a host thunk runs.
    ///
    /// Called only if the mask includes [`TraceMask::HOST`].
    fn host_enter(&mut self, _code: &Code, _ip: usize, _call: HostCall<'_>) {}

    /// Called after a host thunk returned successfully.
    ///
    /// Called only if the mask includes [`TraceMask::HOST`].
    fn host_exit(&mut self, _code: &Code, _ip: usize, _call: HostCall<'_>) {}

    /// Called when `exec` ends.
    ///
    /// Called only if the mask includes [`TraceMask::RUN`].
    fn exec_end(&mut self, _code: &Code, _outcome: TraceOutcome<'_>) {}
}
