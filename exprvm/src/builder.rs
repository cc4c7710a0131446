// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Code builder ("assembler") for `exprvm`.
//!
//! A [`Builder`] turns a sequence of emit calls into a [`Code`] object. It tracks the stack
//! depth the emitted code will have at run time, so arity and balance errors surface at the
//! offending call instead of as traps. Every emit method returns `Result<&mut Self, BuildError>`
//! and can be chained with `?`:
//!
//! ```
//! use exprvm::builder::Builder;
//! use exprvm::context::Context;
//! use exprvm::ops::Op;
//! use exprvm::types::Kind;
//! use exprvm::value::Value;
//!
//! let mut b = Builder::new();
//! b.push_zero(Kind::Float64.ty())?
//!     .push(3.2)?
//!     .builtin_op(Kind::Float64, Op::Add)?;
//! let code = b.resolve()?;
//!
//! let mut ctx = Context::new(&code);
//! ctx.exec(0, code.len()).unwrap();
//! assert_eq!(ctx.pop(), Some(Value::Float(3.2)));
//! # Ok::<(), exprvm::builder::BuildError>(())
//! ```
//!
//! Comprehension emission lives in [`crate::comprehension`].

use hashbrown::{HashMap, HashSet};
use thiserror::Error;

use crate::code::{Code, SlotInfo};
use crate::comprehension::{Frame, Var};
use crate::instr::{ArityOperand, EncodeError, INDEX_BITS, Instr, OPERAND_BITS};
use crate::opcode::Opcode;
use crate::ops::Op;
use crate::registry::{ConstRef, FuncRef, FuncvRef, HostVarRef, Registry, Symbol};
use crate::types::{Kind, Shape, Type, TypeError};
use crate::value::Value;

/// A label for control-flow targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// A builder error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    /// An emit method was called after [`Builder::resolve`].
    #[error("builder already resolved")]
    BuilderClosed,
    /// A variable was loaded or stored outside its scope.
    #[error("variable {name} is not bound")]
    UnboundVariable {
        /// Variable name.
        name: String,
    },
    /// A call site supplies the wrong number of arguments.
    #[error("{func} takes {expected} arguments, got {found}")]
    ArityMismatch {
        /// Function name.
        func: String,
        /// Declared (or minimum) arity.
        expected: usize,
        /// Arity available at the call site.
        found: usize,
    },
    /// A descriptor was misused.
    #[error(transparent)]
    Type(#[from] TypeError),
    /// A symbolic reference did not resolve.
    #[error("unknown symbol {package}.{name}")]
    UnknownSymbol {
        /// Package name.
        package: String,
        /// Symbol name.
        name: String,
    },
    /// An instruction would consume more values than the stack will hold.
    #[error("{needed} stack values needed, {depth} available")]
    StackUnderflow {
        /// Values the instruction consumes.
        needed: usize,
        /// Tracked depth at the emit point.
        depth: usize,
    },
    /// A comprehension or loop body left the stack at the wrong depth.
    #[error("stack depth {found} where {expected} was required")]
    UnbalancedStack {
        /// Required depth.
        expected: usize,
        /// Tracked depth.
        found: usize,
    },
    /// Comprehension markers are not well nested.
    #[error("comprehension markers are not well nested: {0}")]
    Nesting(&'static str),
    /// A label was referenced but never placed.
    #[error("label referenced but never placed")]
    UnresolvedLabel,
    /// An index or count does not fit its instruction field.
    #[error(transparent)]
    OperandOverflow(#[from] EncodeError),
}

#[derive(Copy, Clone, Debug, Default)]
struct LabelState {
    at: Option<u32>,
    depth: Option<usize>,
}

/// Assembler producing a [`Code`] object.
///
/// A builder optionally borrows a [`Registry`] for symbolic emission
/// ([`Builder::call_named`], [`Builder::load_named`]).
#[derive(Debug, Default)]
pub struct Builder<'r> {
    registry: Option<&'r Registry>,
    pub(crate) instrs: Vec<Instr>,
    literals: Vec<Value>,
    types: Vec<Type>,
    funcs: Vec<FuncRef>,
    funcvs: Vec<FuncvRef>,
    host_vars: Vec<HostVarRef>,
    slots: Vec<SlotInfo>,
    slot_of: HashMap<u64, u32>,
    bound: HashSet<u64>,
    pub(crate) scope_log: Vec<u64>,
    labels: Vec<LabelState>,
    fixups: Vec<(usize, Label)>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) depth: usize,
    closed: bool,
}

impl Builder<'static> {
    /// Creates a builder with no registry attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'r> Builder<'r> {
    /// Creates a builder that resolves symbolic references against `registry`.
    #[must_use]
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            registry: Some(registry),
            ..Builder::default()
        }
    }

    /// Number of instructions emitted so far, counting wide prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Returns `true` if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Stack depth the emitted code will have at this point.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn ensure_open(&self) -> Result<(), BuildError> {
        if self.closed {
            return Err(BuildError::BuilderClosed);
        }
        Ok(())
    }

    pub(crate) fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub(crate) fn here(&self) -> Result<u32, BuildError> {
        field(Opcode::Jmp, self.instrs.len())
    }

    /// Pops `n` values from the tracked depth.
    pub(crate) fn consume(&mut self, n: usize) -> Result<(), BuildError> {
        if n > self.depth {
            return Err(BuildError::StackUnderflow {
                needed: n,
                depth: self.depth,
            });
        }
        self.depth -= n;
        Ok(())
    }

    pub(crate) fn intern_type(&mut self, ty: Type) -> usize {
        intern(&mut self.types, ty, |a, b| a == b)
    }

    /// Emits an arity-bearing instruction, with a wide prefix when `count` does not fit inline.
    fn emit_counted(&mut self, opcode: Opcode, index: usize, count: usize) -> Result<(), BuildError> {
        let index = u32::try_from(index)
            .ok()
            .filter(|i| i >> INDEX_BITS == 0)
            .ok_or(EncodeError::OperandOverflow {
                opcode,
                value: i64::try_from(index).unwrap_or(i64::MAX),
                bits: INDEX_BITS,
            })?;
        match ArityOperand::split(count)? {
            ArityOperand::Inline(n) => self.emit(Instr::with_arity(opcode, index, n)?),
            ArityOperand::Overflow { primary, aux } => {
                self.emit(Instr::Wide { aux });
                self.emit(Instr::with_arity(opcode, index, primary)?);
            }
        }
        Ok(())
    }

    /// Pushes a literal. Small integers are encoded inline; other values go to the literal pool.
    pub fn push(&mut self, v: impl Into<Value>) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let v = v.into();
        match v {
            Value::Nil => self.emit(Instr::PushNil),
            Value::Int(i) if fits_inline(i) => self.emit(Instr::PushInt {
                imm: i32::try_from(i).unwrap_or_default(),
            }),
            v => {
                let lit = intern(&mut self.literals, v, same_literal);
                self.emit(Instr::PushLit {
                    lit: field(Opcode::PushLit, lit)?,
                });
            }
        }
        self.depth += 1;
        Ok(self)
    }

    /// Pushes the zero value of `ty`.
    pub fn push_zero(&mut self, ty: Type) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let ix = self.intern_type(ty);
        self.emit(Instr::Zero {
            ty: field(Opcode::Zero, ix)?,
        });
        self.depth += 1;
        Ok(self)
    }

    /// Pushes the value of a registered constant.
    pub fn push_const(&mut self, c: &ConstRef) -> Result<&mut Self, BuildError> {
        self.push(c.value().clone())
    }

    /// Calls a fixed-arity function on the top `f.arity()` values.
    ///
    /// The stack may be deeper than the arity; values below the arguments belong to enclosing
    /// expressions and are left in place.
    pub fn call_func(&mut self, f: &FuncRef) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        if self.depth < f.arity() {
            return Err(BuildError::ArityMismatch {
                func: f.name().into(),
                expected: f.arity(),
                found: self.depth,
            });
        }
        let ix = intern(&mut self.funcs, f.clone(), |a, b| a == b);
        self.emit(Instr::CallFunc {
            func: field(Opcode::CallFunc, ix)?,
        });
        self.depth = self.depth - f.arity() + f.sig().result_count();
        Ok(self)
    }

    /// Calls a variadic function on the top `arity` values.
    pub fn call_funcv(&mut self, f: &FuncvRef, arity: usize) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        if arity < f.min_arity() {
            return Err(BuildError::ArityMismatch {
                func: f.name().into(),
                expected: f.min_arity(),
                found: arity,
            });
        }
        self.consume(arity)?;
        let ix = intern(&mut self.funcvs, f.clone(), |a, b| a == b);
        self.emit_counted(Opcode::CallFuncv, ix, arity)?;
        self.depth += f.sig().result_count();
        Ok(self)
    }

    /// Builds a slice or array of `ty` from the top `arity` values, in push order.
    ///
    /// A negative `arity` accepts one already-built sequence that must carry exactly `ty`.
    pub fn make_array(&mut self, ty: Type, arity: isize) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let Ok(n) = usize::try_from(arity) else {
            if !ty.is_sequence() {
                return Err(TypeError::NotAContainer(ty).into());
            }
            self.consume(1)?;
            let ix = self.intern_type(ty);
            self.emit(Instr::MakeArrayFrom {
                ty: field(Opcode::MakeArrayFrom, ix)?,
            });
            self.depth += 1;
            return Ok(self);
        };
        match *ty.shape() {
            Shape::Slice(_) => {}
            Shape::Array(_, len) if n <= len => {}
            Shape::Array(..) => return Err(TypeError::LengthOverflow { ty, count: n }.into()),
            _ => return Err(TypeError::NotAContainer(ty).into()),
        }
        self.consume(n)?;
        let ix = self.intern_type(ty);
        self.emit_counted(Opcode::MakeArray, ix, n)?;
        self.depth += 1;
        Ok(self)
    }

    /// Builds a map of `ty` from the top `pairs` key/value pairs, in push order.
    pub fn make_map(&mut self, ty: Type, pairs: usize) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        ty.key()?;
        let n = pairs.checked_mul(2).ok_or(BuildError::StackUnderflow {
            needed: usize::MAX,
            depth: self.depth,
        })?;
        self.consume(n)?;
        let ix = self.intern_type(ty);
        self.emit_counted(Opcode::MakeMap, ix, pairs)?;
        self.depth += 1;
        Ok(self)
    }

    fn slot(&mut self, var: &Var) -> Result<u32, BuildError> {
        if let Some(&slot) = self.slot_of.get(&var.id()) {
            return Ok(slot);
        }
        let slot = field(Opcode::StoreVar, self.slots.len())?;
        self.slots.push(SlotInfo {
            name: var.name().into(),
            ty: var.ty(),
        });
        self.slot_of.insert(var.id(), slot);
        Ok(slot)
    }

    fn bound_slot(&self, var: &Var) -> Result<u32, BuildError> {
        self.slot_of
            .get(&var.id())
            .copied()
            .filter(|_| self.bound.contains(&var.id()))
            .ok_or_else(|| BuildError::UnboundVariable {
                name: var.name().into(),
            })
    }

    /// Binds `vars` to the top `vars.len()` values; the first var receives the deepest value.
    pub fn define_var(&mut self, vars: &[&Var]) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        self.consume(vars.len())?;
        for var in vars.iter().rev() {
            let slot = self.slot(var)?;
            self.emit(Instr::StoreVar { slot });
        }
        for var in vars {
            if self.bound.insert(var.id()) {
                self.scope_log.push(var.id());
            }
        }
        Ok(self)
    }

    /// Pushes the value of a bound variable.
    pub fn load_var(&mut self, var: &Var) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let slot = self.bound_slot(var)?;
        self.emit(Instr::LoadVar { slot });
        self.depth += 1;
        Ok(self)
    }

    /// Pops the top value into a bound variable.
    pub fn store_var(&mut self, var: &Var) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let slot = self.bound_slot(var)?;
        self.consume(1)?;
        self.emit(Instr::StoreVar { slot });
        Ok(self)
    }

    /// Unbinds every variable defined after scope mark `mark`.
    pub(crate) fn unscope(&mut self, mark: usize) {
        for id in self.scope_log.drain(mark..) {
            self.bound.remove(&id);
        }
    }

    /// Pushes the current value of a host variable.
    pub fn load_host_var(&mut self, var: &HostVarRef) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let ix = intern(&mut self.host_vars, var.clone(), |a, b| a == b);
        self.emit(Instr::LoadHostVar {
            var: field(Opcode::LoadHostVar, ix)?,
        });
        self.depth += 1;
        Ok(self)
    }

    /// Pops the top value into a host variable.
    pub fn store_host_var(&mut self, var: &HostVarRef) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        self.consume(1)?;
        let ix = intern(&mut self.host_vars, var.clone(), |a, b| a == b);
        self.emit(Instr::StoreHostVar {
            var: field(Opcode::StoreHostVar, ix)?,
        });
        Ok(self)
    }

    /// Applies a builtin operator to operands of `kind`.
    pub fn builtin_op(&mut self, kind: Kind, op: Op) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        op.check(kind)?;
        self.consume(op.arity())?;
        self.emit(Instr::BuiltinOp { kind, op });
        self.depth += 1;
        Ok(self)
    }

    /// Discards the top `n` values.
    pub fn pop(&mut self, n: usize) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        self.consume(n)?;
        self.emit(Instr::Pop {
            n: field(Opcode::Pop, n)?,
        });
        Ok(self)
    }

    /// Allocates a new label.
    pub fn new_label(&mut self) -> Label {
        let id = u32::try_from(self.labels.len()).unwrap_or(u32::MAX);
        self.labels.push(LabelState::default());
        Label(id)
    }

    /// Places `label` at the current position.
    ///
    /// If a jump to `label` was emitted earlier, the tracked depth is reset to the depth at that
    /// jump, so both arms of a conditional are accounted once.
    pub fn place_label(&mut self, label: Label) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let at = self.here()?;
        let state = self
            .labels
            .get_mut(label.0 as usize)
            .ok_or(BuildError::UnresolvedLabel)?;
        state.at = Some(at);
        match state.depth {
            Some(d) => self.depth = d,
            None => state.depth = Some(self.depth),
        }
        Ok(self)
    }

    fn jump_to(&mut self, label: Label, instr: Instr) -> Result<(), BuildError> {
        let depth = self.depth;
        let state = self
            .labels
            .get_mut(label.0 as usize)
            .ok_or(BuildError::UnresolvedLabel)?;
        state.depth.get_or_insert(depth);
        self.fixups.push((self.instrs.len(), label));
        self.emit(instr);
        Ok(())
    }

    /// Jumps to `label`.
    pub fn jmp(&mut self, label: Label) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        self.jump_to(label, Instr::Jmp { target: 0 })?;
        Ok(self)
    }

    /// Pops a bool and jumps to `label` when it equals `cond`.
    pub fn jmp_if(&mut self, cond: bool, label: Label) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        self.consume(1)?;
        self.jump_to(label, Instr::JmpIf { cond, target: 0 })?;
        Ok(self)
    }

    fn lookup(&self, package: &str, name: &str) -> Result<Symbol, BuildError> {
        self.registry
            .and_then(|r| r.find(package, name))
            .ok_or_else(|| BuildError::UnknownSymbol {
                package: package.into(),
                name: name.into(),
            })
    }

    /// Calls the function `package.name` from the attached registry with `arity` arguments.
    pub fn call_named(
        &mut self,
        package: &str,
        name: &str,
        arity: usize,
    ) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        match self.lookup(package, name)? {
            Symbol::Func(f) if f.arity() == arity => self.call_func(&f),
            Symbol::Func(f) => Err(BuildError::ArityMismatch {
                func: f.name().into(),
                expected: f.arity(),
                found: arity,
            }),
            Symbol::Funcv(f) => self.call_funcv(&f, arity),
            _ => Err(BuildError::UnknownSymbol {
                package: package.into(),
                name: name.into(),
            }),
        }
    }

    /// Pushes the host variable or constant `package.name` from the attached registry.
    pub fn load_named(&mut self, package: &str, name: &str) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        match self.lookup(package, name)? {
            Symbol::Var(v) => self.load_host_var(&v),
            Symbol::Const(c) => self.push_const(&c),
            _ => Err(BuildError::UnknownSymbol {
                package: package.into(),
                name: name.into(),
            }),
        }
    }

    /// Finishes the code. The builder rejects every later call with
    /// [`BuildError::BuilderClosed`].
    pub fn resolve(&mut self) -> Result<Code, BuildError> {
        self.ensure_open()?;
        if !self.frames.is_empty() {
            return Err(BuildError::Nesting("unclosed comprehension or for phrase"));
        }
        for &(at, label) in &self.fixups {
            let target = self
                .labels
                .get(label.0 as usize)
                .and_then(|s| s.at)
                .ok_or(BuildError::UnresolvedLabel)?;
            if let Some(instr) = self.instrs.get_mut(at) {
                *instr = instr.with_target(target);
            }
        }
        let words = self
            .instrs
            .iter()
            .map(|&i| i.encode())
            .collect::<Result<Box<[u32]>, _>>()?;
        self.closed = true;

        let code = Code {
            words,
            literals: core::mem::take(&mut self.literals).into(),
            types: core::mem::take(&mut self.types).into(),
            funcs: core::mem::take(&mut self.funcs).into(),
            funcvs: core::mem::take(&mut self.funcvs).into(),
            host_vars: core::mem::take(&mut self.host_vars).into(),
            slots: core::mem::take(&mut self.slots).into(),
        };
        tracing::debug!(
            instrs = code.len(),
            literals = code.literals.len(),
            types = code.types.len(),
            slots = code.slot_count(),
            depth = self.depth,
            "code resolved"
        );
        Ok(code)
    }
}

fn intern<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T, &T) -> bool) -> usize {
    if let Some(ix) = items.iter().position(|x| same(x, &item)) {
        return ix;
    }
    items.push(item);
    items.len() - 1
}

fn same_literal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

fn fits_inline(i: i64) -> bool {
    let half = 1_i64 << (OPERAND_BITS - 1);
    (-half..half).contains(&i)
}

/// Converts a table index or count to an operand, failing if it cannot fit any field.
pub(crate) fn field(opcode: Opcode, v: usize) -> Result<u32, BuildError> {
    u32::try_from(v)
        .ok()
        .filter(|v| v >> OPERAND_BITS == 0)
        .ok_or_else(|| {
            EncodeError::OperandOverflow {
                opcode,
                value: i64::try_from(v).unwrap_or(i64::MAX),
                bits: OPERAND_BITS,
            }
            .into()
        })
}
