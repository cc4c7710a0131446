// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interpreter for `exprvm` code.
//!
//! A [`Context`] owns a value stack and the variable slots of one [`Code`] object and runs a
//! range of its instructions with [`Context::exec`]. Execution is bounded by explicit
//! [`Limits`] (fuel, stack depth, host calls).
//!
//! Host functions run inside the dispatch loop. A thunk reads its arguments in place with
//! [`Context::args`] and replaces them with its results via [`Context::ret`]; the interpreter
//! then checks that exactly the declared number of results was left behind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::code::Code;
use crate::host::{HostError, Thunk};
use crate::instr::{DecodeError, Instr, join_arity};
use crate::opcode::Opcode;
use crate::ops::{eval_binary, eval_unary};
use crate::trace::{HostCall, TraceMask, TraceOutcome, TraceSink};
use crate::types::{Kind, Shape, Type, TypeError};
use crate::value::{ArrayValue, Key, Value, conform, conform_key};

/// Execution limits for one [`Context::exec`] call.
#[derive(Clone, Debug)]
pub struct Limits {
    /// Instruction budget. Each dispatched instruction costs 1.
    pub fuel: u64,
    /// Maximum value-stack depth.
    pub max_stack: usize,
    /// Maximum host calls.
    pub max_host_calls: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            fuel: u64::MAX,
            max_stack: 1 << 20,
            max_host_calls: u64::MAX,
        }
    }
}

/// A runtime trap.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Trap {
    /// An operand did not have the expected type.
    #[error("type error: {0}")]
    Type(#[from] TypeError),
    /// A host function reported failure.
    #[error("host function {func} failed: {source}")]
    Host {
        /// Function name.
        func: Box<str>,
        /// What the thunk reported.
        source: HostError,
    },
    /// A host function left the wrong number of values on the stack.
    #[error("host function {func} left {found} results, expected {expected}")]
    HostContract {
        /// Function name.
        func: Box<str>,
        /// Declared result count.
        expected: usize,
        /// Observed result count (negative if arguments were over-consumed).
        found: isize,
    },
    /// An instruction needed more values than the stack holds.
    #[error("stack underflow")]
    StackUnderflow,
    /// The stack grew past [`Limits::max_stack`].
    #[error("stack overflow")]
    StackOverflow,
    /// Fuel limit exceeded.
    #[error("fuel limit exceeded")]
    FuelExceeded,
    /// Host call count limit exceeded.
    #[error("host call limit exceeded")]
    HostCallLimitExceeded,
    /// Integer division or remainder by zero.
    #[error("integer divide by zero")]
    DivideByZero,
    /// Shift by a negative count.
    #[error("negative shift amount")]
    NegativeShift,
    /// An instruction word could not be decoded.
    #[error("malformed code: {0}")]
    Malformed(#[from] DecodeError),
    /// The instruction pointer left the code without reaching the end bound.
    #[error("instruction pointer out of range")]
    BadIp,
    /// An operand indexed past the end of a side table.
    #[error("{what} index {index} out of range")]
    BadOperand {
        /// Table name.
        what: &'static str,
        /// Offending index.
        index: u32,
    },
    /// An accumulator or iteration instruction ran with no matching frame open.
    #[error("no open {0}")]
    NoFrame(&'static str),
}

/// A trap annotated with its location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrapInfo {
    /// Instruction index (of the prefix, for wide instructions).
    pub ip: usize,
    /// Opcode being executed, if the word decoded.
    pub opcode: Option<Opcode>,
    /// Trap kind.
    pub trap: Trap,
}

impl fmt::Display for TrapInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Some(op) => write!(f, "trap at ip={} ({}): {}", self.ip, op.mnemonic(), self.trap),
            None => write!(f, "trap at ip={}: {}", self.ip, self.trap),
        }
    }
}

impl std::error::Error for TrapInfo {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.trap)
    }
}

#[derive(Debug)]
enum Iteration {
    Seq { items: Arc<ArrayValue>, next: usize },
    Pairs(std::vec::IntoIter<(Value, Value)>),
    Str { s: Arc<str>, at: usize },
    Empty,
}

impl Iteration {
    fn open(source: Value) -> Result<Self, TypeError> {
        Ok(match source {
            Value::Nil => Self::Empty,
            Value::Array(items) => Self::Seq { items, next: 0 },
            Value::Map(m) => Self::Pairs(
                m.iter()
                    .map(|(k, v)| (k.to_value(), v.clone()))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Value::Str(s) => Self::Str { s, at: 0 },
            other => {
                return Err(TypeError::NotIterable(
                    other.ty().unwrap_or_else(|| Kind::Any.ty()),
                ));
            }
        })
    }

    fn advance(&mut self) -> Option<(Value, Value)> {
        match self {
            Self::Seq { items, next } => {
                let v = items.elems().get(*next)?.clone();
                let k = index_value(*next);
                *next += 1;
                Some((k, v))
            }
            Self::Pairs(it) => it.next(),
            Self::Str { s, at } => {
                let c = s.get(*at..)?.chars().next()?;
                let k = index_value(*at);
                *at += c.len_utf8();
                Some((k, Value::Int(i64::from(u32::from(c)))))
            }
            Self::Empty => None,
        }
    }
}

fn index_value(i: usize) -> Value {
    Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
}

#[derive(Debug)]
enum Accumulator {
    List {
        ty: Type,
        elem: Type,
        items: Vec<Value>,
    },
    Map {
        ty: Type,
        key: Type,
        elem: Type,
        entries: BTreeMap<Key, Value>,
    },
}

impl Accumulator {
    fn open(ty: Type) -> Result<Self, TypeError> {
        match *ty.shape() {
            Shape::Slice(elem) => Ok(Self::List {
                ty,
                elem,
                items: Vec::new(),
            }),
            Shape::Map(key, elem) => Ok(Self::Map {
                ty,
                key,
                elem,
                entries: BTreeMap::new(),
            }),
            _ => Err(TypeError::NotAContainer(ty)),
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::List { ty, items, .. } => Value::array(ty, items),
            Self::Map { ty, entries, .. } => Value::map(ty, entries),
        }
    }
}

/// Per-execution state over one [`Code`] object.
///
/// A context is not shared between threads; create one per concurrent evaluation. After a trap
/// its stack and slots are unspecified until [`Context::reset`].
#[derive(Debug)]
pub struct Context<'c> {
    code: &'c Code,
    limits: Limits,
    stack: Vec<Value>,
    slots: Vec<Value>,
    iters: Vec<Iteration>,
    accs: Vec<Accumulator>,
    fuel: u64,
    host_calls: u64,
}

impl<'c> Context<'c> {
    /// Creates a context with default limits.
    #[must_use]
    pub fn new(code: &'c Code) -> Self {
        Self::with_limits(code, Limits::default())
    }

    /// Creates a context with explicit limits.
    #[must_use]
    pub fn with_limits(code: &'c Code, limits: Limits) -> Self {
        Self {
            code,
            stack: Vec::new(),
            slots: code.slots.iter().map(|s| s.ty.zero()).collect(),
            iters: Vec::new(),
            accs: Vec::new(),
            fuel: limits.fuel,
            host_calls: 0,
            limits,
        }
    }

    /// The code this context runs.
    #[must_use]
    pub fn code(&self) -> &'c Code {
        self.code
    }

    /// Clears the stack and open frames and sets every slot back to its zero value.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.iters.clear();
        self.accs.clear();
        for (v, s) in self.slots.iter_mut().zip(self.code.slots.iter()) {
            *v = s.ty.zero();
        }
    }

    /// Runs instructions starting at `from` until the instruction pointer reaches `to`.
    ///
    /// The stack is not cleared between calls, so successive ranges of one code object may be
    /// executed in turn.
    pub fn exec(&mut self, from: usize, to: usize) -> Result<(), TrapInfo> {
        self.exec_traced(from, to, TraceMask::NONE, None)
    }

    /// Like [`Context::exec`], reporting the events selected by `mask` to `trace`.
    pub fn exec_traced(
        &mut self,
        from: usize,
        to: usize,
        mask: TraceMask,
        mut trace: Option<&mut dyn TraceSink>,
    ) -> Result<(), TrapInfo> {
        let code = self.code;
        tracing::debug!(from, to, stack = self.stack.len(), "exec");
        if mask.contains(TraceMask::RUN)
            && let Some(t) = trace.as_mut()
        {
            t.exec_start(code, from, to);
        }

        let result = self.run(from, to, mask, &mut trace);

        match &result {
            Ok(()) => tracing::debug!(stack = self.stack.len(), "exec done"),
            Err(info) => tracing::debug!(%info, "exec trapped"),
        }
        if mask.contains(TraceMask::RUN)
            && let Some(t) = trace.as_mut()
        {
            let outcome = match &result {
                Ok(()) => TraceOutcome::Ok,
                Err(e) => TraceOutcome::Trap(e),
            };
            t.exec_end(code, outcome);
        }
        result
    }

    fn run(
        &mut self,
        from: usize,
        to: usize,
        mask: TraceMask,
        trace: &mut Option<&mut dyn TraceSink>,
    ) -> Result<(), TrapInfo> {
        let code = self.code;
        self.fuel = self.limits.fuel;
        self.host_calls = 0;

        let mut ip = from;
        while ip != to {
            let at = ip;
            let locate = |opcode: Option<Opcode>| move |trap: Trap| TrapInfo { ip: at, opcode, trap };
            if self.fuel == 0 {
                return Err(locate(None)(Trap::FuelExceeded));
            }
            self.fuel -= 1;

            let (instr, aux, width) = self.fetch(at).map_err(locate(None))?;
            if mask.contains(TraceMask::INSTR)
                && let Some(t) = trace.as_mut()
            {
                t.instr(code, at, instr, self.stack.len());
            }
            ip = self
                .step(instr, aux, at, at + width, mask, trace)
                .map_err(locate(Some(instr.opcode())))?;
        }
        Ok(())
    }

    /// Decodes the instruction at `ip`, folding a wide prefix into its successor.
    fn fetch(&self, ip: usize) -> Result<(Instr, u32, usize), Trap> {
        let instr = self.code.instr(ip).ok_or(Trap::BadIp)??;
        let Instr::Wide { aux } = instr else {
            return Ok((instr, 0, 1));
        };
        match self.code.instr(ip + 1) {
            Some(Ok(next)) if next.opcode().has_arity() => Ok((next, aux, 2)),
            Some(Err(e)) => Err(e.into()),
            _ => Err(DecodeError::DanglingWide { ip }.into()),
        }
    }

    /// Executes one instruction and returns the next instruction pointer.
    fn step(
        &mut self,
        instr: Instr,
        aux: u32,
        ip: usize,
        next: usize,
        mask: TraceMask,
        trace: &mut Option<&mut dyn TraceSink>,
    ) -> Result<usize, Trap> {
        let code = self.code;
        match instr {
            Instr::PushLit { lit } => {
                let v = table(&code.literals, lit, "literal")?.clone();
                self.push_checked(v)?;
            }
            Instr::PushInt { imm } => self.push_checked(Value::Int(i64::from(imm)))?,
            Instr::PushNil => self.push_checked(Value::Nil)?,
            Instr::Zero { ty } => {
                let ty = *table(&code.types, ty, "type")?;
                self.push_checked(ty.zero())?;
            }
            Instr::CallFunc { func } => {
                let f = table(&code.funcs, func, "func")?;
                let call = HostCall {
                    name: f.name(),
                    arity: f.arity(),
                    variadic: false,
                };
                self.call_host(ip, call, f.thunk(), f.sig().result_count(), mask, trace)?;
            }
            Instr::CallFuncv { func, arity } => {
                let f = table(&code.funcvs, u32::from(func), "variadic func")?;
                let call = HostCall {
                    name: f.name(),
                    arity: join_arity(aux, arity),
                    variadic: true,
                };
                self.call_host(ip, call, f.thunk(), f.sig().result_count(), mask, trace)?;
            }
            Instr::MakeArray { ty, arity } => {
                let ty = *table(&code.types, u32::from(ty), "type")?;
                let elems = self.pop_n(join_arity(aux, arity))?;
                self.push_checked(build_array(ty, elems)?)?;
            }
            Instr::MakeArrayFrom { ty } => {
                let ty = *table(&code.types, ty, "type")?;
                if !ty.is_sequence() {
                    return Err(TypeError::NotAContainer(ty).into());
                }
                let v = self.pop_value()?;
                conform(ty, &v)?;
                self.push_checked(v)?;
            }
            Instr::MakeMap { ty, arity } => {
                let ty = *table(&code.types, u32::from(ty), "type")?;
                let n = join_arity(aux, arity)
                    .checked_mul(2)
                    .ok_or(Trap::StackUnderflow)?;
                let mut flat = self.pop_n(n)?.into_iter();
                let pairs = core::iter::from_fn(|| Some((flat.next()?, flat.next()?)));
                self.push_checked(Value::checked_map(ty, pairs)?)?;
            }
            Instr::Wide { .. } => return Err(DecodeError::DanglingWide { ip }.into()),
            Instr::StoreVar { slot } => {
                let ty = table(&code.slots, slot, "slot")?.ty;
                let v = self.pop_value()?;
                conform(ty, &v)?;
                self.slots[slot as usize] = v;
            }
            Instr::LoadVar { slot } => {
                let v = table(&self.slots, slot, "slot")?.clone();
                self.push_checked(v)?;
            }
            Instr::LoadHostVar { var } => {
                let v = table(&code.host_vars, var, "host var")?.load();
                self.push_checked(v)?;
            }
            Instr::StoreHostVar { var } => {
                let hv = table(&code.host_vars, var, "host var")?;
                let v = self.pop_value()?;
                hv.store(v)?;
            }
            Instr::BuiltinOp { kind, op } => {
                let v = if op.arity() == 1 {
                    let a = self.pop_value()?;
                    eval_unary(kind, op, &a)?
                } else {
                    let b = self.pop_value()?;
                    let a = self.pop_value()?;
                    eval_binary(kind, op, &a, &b)?
                };
                self.push_checked(v)?;
            }
            Instr::Jmp { target } => return Ok(target as usize),
            Instr::JmpIf { cond, target } => {
                let v = self.pop_value()?;
                let Some(b) = v.as_bool() else {
                    return Err(TypeError::OperandMismatch {
                        expected: Kind::Bool.ty(),
                        found: v.type_name(),
                    }
                    .into());
                };
                if b == cond {
                    return Ok(target as usize);
                }
            }
            Instr::MakeEmpty { ty } => {
                let ty = *table(&code.types, ty, "type")?;
                self.accs.push(Accumulator::open(ty)?);
            }
            Instr::IterInit => {
                let source = self.pop_value()?;
                self.iters.push(Iteration::open(source)?);
            }
            Instr::IterNext { with_key, exit } => {
                let it = self.iters.last_mut().ok_or(Trap::NoFrame("iteration"))?;
                match it.advance() {
                    Some((k, v)) => {
                        if with_key {
                            self.push_checked(k)?;
                        }
                        self.push_checked(v)?;
                    }
                    None => {
                        self.iters.pop();
                        return Ok(exit as usize);
                    }
                }
            }
            Instr::Append => {
                let v = self.pop_value()?;
                match self.accs.last_mut() {
                    Some(Accumulator::List { elem, items, .. }) => {
                        conform(*elem, &v)?;
                        items.push(v);
                    }
                    _ => return Err(Trap::NoFrame("list accumulator")),
                }
            }
            Instr::Insert => {
                let v = self.pop_value()?;
                let k = self.pop_value()?;
                match self.accs.last_mut() {
                    Some(Accumulator::Map {
                        key, elem, entries, ..
                    }) => {
                        let k = conform_key(*key, &k)?;
                        conform(*elem, &v)?;
                        entries.insert(k, v);
                    }
                    _ => return Err(Trap::NoFrame("map accumulator")),
                }
            }
            Instr::Collect => {
                let acc = self.accs.pop().ok_or(Trap::NoFrame("accumulator"))?;
                self.push_checked(acc.finish())?;
            }
            Instr::Pop { n } => {
                let n = n as usize;
                let len = self.stack.len();
                if n > len {
                    return Err(Trap::StackUnderflow);
                }
                self.stack.truncate(len - n);
            }
        }
        Ok(next)
    }

    fn call_host(
        &mut self,
        ip: usize,
        call: HostCall<'_>,
        thunk: Thunk,
        results: usize,
        mask: TraceMask,
        trace: &mut Option<&mut dyn TraceSink>,
    ) -> Result<(), Trap> {
        let code = self.code;
        self.host_calls += 1;
        if self.host_calls > self.limits.max_host_calls {
            return Err(Trap::HostCallLimitExceeded);
        }
        let before = self.stack.len();
        if before < call.arity {
            return Err(Trap::StackUnderflow);
        }
        if mask.contains(TraceMask::HOST)
            && let Some(t) = trace.as_mut()
        {
            t.host_enter(code, ip, call);
        }

        thunk(call.arity, self).map_err(|source| {
            tracing::warn!(func = call.name, arity = call.arity, error = %source, "host call failed");
            Trap::Host {
                func: call.name.into(),
                source,
            }
        })?;

        let base = before - call.arity;
        let after = self.stack.len();
        if after != base + results {
            let found = isize::try_from(after).unwrap_or(isize::MAX)
                - isize::try_from(base).unwrap_or(isize::MAX);
            return Err(Trap::HostContract {
                func: call.name.into(),
                expected: results,
                found,
            });
        }
        if after > self.limits.max_stack {
            return Err(Trap::StackOverflow);
        }

        if mask.contains(TraceMask::HOST)
            && let Some(t) = trace.as_mut()
        {
            t.host_exit(code, ip, call);
        }
        Ok(())
    }

    fn push_checked(&mut self, v: Value) -> Result<(), Trap> {
        if self.stack.len() >= self.limits.max_stack {
            return Err(Trap::StackOverflow);
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop_value(&mut self) -> Result<Value, Trap> {
        self.stack.pop().ok_or(Trap::StackUnderflow)
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Trap> {
        let len = self.stack.len();
        if n > len {
            return Err(Trap::StackUnderflow);
        }
        Ok(self.stack.split_off(len - n))
    }

    /// The top `n` stack values, bottom first. These are a host call's arguments in call order.
    ///
    /// Returns the whole stack if it holds fewer than `n` values.
    #[must_use]
    pub fn args(&self, n: usize) -> &[Value] {
        let start = self.stack.len().saturating_sub(n);
        &self.stack[start..]
    }

    /// Replaces the top `n` stack values with `v`.
    pub fn ret(&mut self, n: usize, v: Value) {
        let keep = self.stack.len().saturating_sub(n);
        self.stack.truncate(keep);
        self.stack.push(v);
    }

    /// Replaces the top `n` stack values with `vs`, in order.
    pub fn ret_many(&mut self, n: usize, vs: impl IntoIterator<Item = Value>) {
        let keep = self.stack.len().saturating_sub(n);
        self.stack.truncate(keep);
        self.stack.extend(vs);
    }

    /// Pushes a value.
    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    /// Pops the top value.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// The top value.
    #[must_use]
    pub fn top(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Current stack depth.
    #[must_use]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// The whole value stack, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// The current value of variable slot `slot`.
    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&Value> {
        self.slots.get(slot)
    }
}

fn table<'a, T>(items: &'a [T], index: u32, what: &'static str) -> Result<&'a T, Trap> {
    items
        .get(index as usize)
        .ok_or(Trap::BadOperand { what, index })
}

fn build_array(ty: Type, mut elems: Vec<Value>) -> Result<Value, TypeError> {
    match *ty.shape() {
        Shape::Slice(_) => Value::checked_array(ty, elems),
        Shape::Array(elem, len) => {
            if elems.len() > len {
                return Err(TypeError::LengthOverflow {
                    ty,
                    count: elems.len(),
                });
            }
            elems.resize_with(len, || elem.zero());
            Value::checked_array(ty, elems)
        }
        _ => Err(TypeError::NotAContainer(ty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::SlotInfo;
    use crate::host::Signature;
    use crate::ops::Op;
    use crate::registry::{FuncSpec, FuncvSpec, Package};

    fn code_of(words: &[Instr]) -> Code {
        Code {
            words: words.iter().map(|i| i.encode().unwrap()).collect(),
            literals: Box::new([]),
            types: Box::new([]),
            funcs: Box::new([]),
            funcvs: Box::new([]),
            host_vars: Box::new([]),
            slots: Box::new([]),
        }
    }

    fn exec_sum(arity: usize, ctx: &mut Context<'_>) -> Result<(), HostError> {
        let mut total = 0;
        for (index, a) in ctx.args(arity).iter().enumerate() {
            total += a.as_int().ok_or(HostError::BadArgument {
                index,
                expected: Kind::Int.ty(),
            })?;
        }
        ctx.ret(arity, Value::Int(total));
        Ok(())
    }

    fn exec_leaky(arity: usize, ctx: &mut Context<'_>) -> Result<(), HostError> {
        ctx.ret_many(arity, [Value::Int(1), Value::Int(2)]);
        Ok(())
    }

    #[test]
    fn arithmetic_and_halting_at_bound() {
        let code = code_of(&[
            Instr::PushInt { imm: 40 },
            Instr::PushInt { imm: 2 },
            Instr::BuiltinOp {
                kind: Kind::Int,
                op: Op::Add,
            },
        ]);
        let mut ctx = Context::new(&code);
        ctx.exec(0, 2).unwrap();
        assert_eq!(ctx.stack_len(), 2);
        ctx.exec(2, 3).unwrap();
        assert_eq!(ctx.pop(), Some(Value::Int(42)));
    }

    #[test]
    fn conditional_jumps_pop_their_condition() {
        let code = code_of(&[
            Instr::PushInt { imm: 1 },
            Instr::PushInt { imm: 2 },
            Instr::BuiltinOp {
                kind: Kind::Int,
                op: Op::Lt,
            },
            Instr::JmpIf {
                cond: true,
                target: 6,
            },
            Instr::PushInt { imm: 0 },
            Instr::Jmp { target: 7 },
            Instr::PushInt { imm: 9 },
        ]);
        let mut ctx = Context::new(&code);
        ctx.exec(0, 7).unwrap();
        assert_eq!(ctx.stack(), &[Value::Int(9)]);
    }

    #[test]
    fn traps_carry_location() {
        let code = code_of(&[
            Instr::PushInt { imm: 1 },
            Instr::PushInt { imm: 0 },
            Instr::BuiltinOp {
                kind: Kind::Int,
                op: Op::Quo,
            },
        ]);
        let err = Context::new(&code).exec(0, 3).unwrap_err();
        assert_eq!(err.ip, 2);
        assert_eq!(err.opcode, Some(Opcode::BuiltinOp));
        assert_eq!(err.trap, Trap::DivideByZero);
        assert!(err.to_string().starts_with("trap at ip=2 (op)"));

        let err = Context::new(&code).exec(0, 5).unwrap_err();
        assert_eq!(err.trap, Trap::DivideByZero);
        let err = Context::new(&code).exec(4, 5).unwrap_err();
        assert_eq!(err.trap, Trap::BadIp);

        let err = Context::new(&code_of(&[Instr::Pop { n: 1 }]))
            .exec(0, 1)
            .unwrap_err();
        assert_eq!(err.trap, Trap::StackUnderflow);
    }

    #[test]
    fn table_operands_are_bounds_checked() {
        let mut code = code_of(&[Instr::PushLit { lit: 1 }, Instr::PushLit { lit: 5 }]);
        code.literals = Box::new([Value::Int(7), Value::Str("s".into())]);
        let mut ctx = Context::new(&code);
        let err = ctx.exec(0, 2).unwrap_err();
        assert_eq!(err.ip, 1);
        assert_eq!(
            err.trap,
            Trap::BadOperand {
                what: "literal",
                index: 5
            }
        );
        assert_eq!(ctx.stack(), &[Value::Str("s".into())]);
    }

    #[test]
    fn limits_are_enforced() {
        let code = code_of(&[Instr::Jmp { target: 0 }]);
        let limits = Limits {
            fuel: 100,
            ..Limits::default()
        };
        let err = Context::with_limits(&code, limits).exec(0, 1).unwrap_err();
        assert_eq!(err.trap, Trap::FuelExceeded);

        let code = code_of(&[Instr::PushNil, Instr::PushNil, Instr::PushNil]);
        let limits = Limits {
            max_stack: 2,
            ..Limits::default()
        };
        let err = Context::with_limits(&code, limits).exec(0, 3).unwrap_err();
        assert_eq!(err.ip, 2);
        assert_eq!(err.trap, Trap::StackOverflow);
    }

    #[test]
    fn wide_prefix_reassembles_variadic_arity() {
        let mut pkg = Package::new("");
        let sum = pkg
            .register_funcv(FuncvSpec::new(
                "sum",
                exec_sum,
                Signature::variadic(Vec::new(), Kind::Int.ty(), [Kind::Int.ty()]),
            ))
            .unwrap();
        let n = 1500_usize;
        let mut instrs = vec![Instr::PushInt { imm: 1 }; n];
        instrs.push(Instr::Wide { aux: 1 });
        instrs.push(Instr::CallFuncv {
            func: 0,
            arity: u16::try_from(n - 1024).unwrap(),
        });
        let mut code = code_of(&instrs);
        code.funcvs = Box::new([sum]);
        let mut ctx = Context::new(&code);
        ctx.exec(0, code.len()).unwrap();
        assert_eq!(ctx.stack(), &[Value::Int(1500)]);
    }

    #[test]
    fn dangling_wide_prefix_is_malformed() {
        let code = code_of(&[Instr::Wide { aux: 1 }, Instr::PushNil]);
        let err = Context::new(&code).exec(0, 2).unwrap_err();
        assert_eq!(err.trap, Trap::Malformed(DecodeError::DanglingWide { ip: 0 }));
    }

    #[test]
    fn host_results_are_checked() {
        let mut pkg = Package::new("");
        let leaky = pkg
            .register_func(FuncSpec::new(
                "leaky",
                exec_leaky,
                Signature::new([Kind::Int.ty()], [Kind::Int.ty()]),
            ))
            .unwrap();
        let sum = pkg
            .register_func(FuncSpec::new(
                "sum2",
                exec_sum,
                Signature::new([Kind::Int.ty(), Kind::Int.ty()], [Kind::Int.ty()]),
            ))
            .unwrap();
        let mut code = code_of(&[
            Instr::PushInt { imm: 1 },
            Instr::CallFunc { func: 0 },
            Instr::PushLit { lit: 0 },
            Instr::PushInt { imm: 1 },
            Instr::CallFunc { func: 1 },
        ]);
        code.funcs = Box::new([leaky, sum]);
        code.literals = Box::new([Value::from("x")]);

        let err = Context::new(&code).exec(0, 2).unwrap_err();
        assert!(matches!(
            err.trap,
            Trap::HostContract {
                expected: 1,
                found: 2,
                ..
            }
        ));

        let err = Context::new(&code).exec(2, 5).unwrap_err();
        assert_eq!(
            err.trap,
            Trap::Host {
                func: "sum2".into(),
                source: HostError::BadArgument {
                    index: 0,
                    expected: Kind::Int.ty(),
                },
            }
        );
    }

    #[test]
    fn host_call_limit() {
        let mut pkg = Package::new("");
        let sum = pkg
            .register_funcv(FuncvSpec::new(
                "sum",
                exec_sum,
                Signature::variadic(Vec::new(), Kind::Int.ty(), [Kind::Int.ty()]),
            ))
            .unwrap();
        let mut code = code_of(&[
            Instr::CallFuncv { func: 0, arity: 0 },
            Instr::CallFuncv { func: 0, arity: 0 },
        ]);
        code.funcvs = Box::new([sum]);
        let limits = Limits {
            max_host_calls: 1,
            ..Limits::default()
        };
        let err = Context::with_limits(&code, limits).exec(0, 2).unwrap_err();
        assert_eq!((err.ip, err.trap), (1, Trap::HostCallLimitExceeded));
    }

    #[test]
    fn fixed_arrays_pad_with_zero_values() {
        let arr = Type::array_of(Kind::Int.ty(), 3);
        let mut code = code_of(&[
            Instr::PushInt { imm: 7 },
            Instr::MakeArray { ty: 0, arity: 1 },
        ]);
        code.types = Box::new([arr]);
        let mut ctx = Context::new(&code);
        ctx.exec(0, 2).unwrap();
        let v = ctx.pop().unwrap();
        assert_eq!(
            v.as_array().unwrap().elems(),
            &[Value::Int(7), Value::Int(0), Value::Int(0)]
        );
    }

    #[test]
    fn string_iteration_yields_byte_offsets_and_runes() {
        let list = Type::slice_of(Kind::Int.ty());
        let mut code = code_of(&[
            Instr::MakeEmpty { ty: 0 },
            Instr::PushLit { lit: 0 },
            Instr::IterInit,
            Instr::IterNext {
                with_key: true,
                exit: 7,
            },
            Instr::Append,
            Instr::Append,
            Instr::Jmp { target: 3 },
            Instr::Collect,
        ]);
        code.types = Box::new([list]);
        code.literals = Box::new([Value::from("aé")]);
        let mut ctx = Context::new(&code);
        ctx.exec(0, code.len()).unwrap();
        let v = ctx.pop().unwrap();
        // Each step appends the rune and then the byte offset.
        assert_eq!(
            v.as_array().unwrap().elems(),
            &[Value::Int(97), Value::Int(0), Value::Int(0xE9), Value::Int(1)]
        );
    }

    #[test]
    fn stores_check_declared_slot_types() {
        let mut code = code_of(&[Instr::PushLit { lit: 0 }, Instr::StoreVar { slot: 0 }]);
        code.literals = Box::new([Value::from("s")]);
        code.slots = Box::new([SlotInfo {
            name: "x".into(),
            ty: Kind::Int.ty(),
        }]);
        let mut ctx = Context::new(&code);
        assert_eq!(ctx.slot(0), Some(&Value::Int(0)));
        let err = ctx.exec(0, 2).unwrap_err();
        assert!(matches!(
            err.trap,
            Trap::Type(TypeError::OperandMismatch {
                found: "string",
                ..
            })
        ));
        ctx.reset();
        assert_eq!(ctx.stack_len(), 0);
    }

    #[test]
    fn nil_sources_iterate_zero_times() {
        let list = Type::slice_of(Kind::Int.ty());
        let mut code = code_of(&[
            Instr::MakeEmpty { ty: 0 },
            Instr::PushNil,
            Instr::IterInit,
            Instr::IterNext {
                with_key: false,
                exit: 6,
            },
            Instr::Append,
            Instr::Jmp { target: 3 },
            Instr::Collect,
        ]);
        code.types = Box::new([list]);
        let mut ctx = Context::new(&code);
        ctx.exec(0, code.len()).unwrap();
        assert!(ctx.pop().unwrap().as_array().unwrap().is_empty());
    }
}
