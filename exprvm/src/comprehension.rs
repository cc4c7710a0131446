// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! List and map comprehensions.
//!
//! A comprehension compiles to a flat loop nest on the shared value stack. The emit protocol is:
//!
//! 1. [`Builder::begin_comprehension`] opens an empty accumulator.
//! 2. Per level, outer to inner: push the source container, then [`Builder::for_phrase`].
//! 3. [`Builder::define_var`] binds the key (if any) and the value for the level.
//! 4. Optionally push a `bool` and call [`Builder::filter_for_phrase`] to skip the iteration.
//! 5. In the innermost level, push the element (list) or the key then the value (map).
//! 6. [`Builder::end_for_phrase`] per level, inner to outer.
//! 7. [`Builder::end_comprehension`] leaves the finished container on the stack.
//!
//! ```
//! use exprvm::builder::Builder;
//! use exprvm::comprehension::{Comprehension, ForPhrase, Var};
//! use exprvm::context::Context;
//! use exprvm::ops::Op;
//! use exprvm::types::{Kind, Type};
//!
//! let ints = Type::slice_of(Kind::Int.ty());
//! let x = Var::new(Kind::Int.ty(), "x");
//! let f = ForPhrase::new(None, &x, ints);
//! let c = Comprehension::new(ints);
//!
//! let mut b = Builder::new();
//! b.begin_comprehension(&c)?;
//! b.push(1)?.push(2)?.push(3)?.make_array(ints, 3)?;
//! b.for_phrase(&f)?.define_var(&[&x])?;
//! b.load_var(&x)?.load_var(&x)?.builtin_op(Kind::Int, Op::Mul)?;
//! b.end_for_phrase(&f)?.end_comprehension(&c)?;
//! let code = b.resolve()?;
//!
//! let mut ctx = Context::new(&code);
//! ctx.exec(0, code.len()).unwrap();
//! assert_eq!(ctx.pop().unwrap().to_string(), "[1 4 9]");
//! # Ok::<(), exprvm::builder::BuildError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::builder::{BuildError, Builder, field};
use crate::instr::Instr;
use crate::opcode::Opcode;
use crate::types::{Kind, Shape, Type, TypeError};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A compile-time variable binding.
///
/// Clones refer to the same variable.
#[derive(Clone, Debug)]
pub struct Var {
    id: u64,
    ty: Type,
    name: Arc<str>,
}

impl Var {
    /// Declares a variable of `ty`. The builder assigns its slot on first definition.
    #[must_use]
    pub fn new(ty: Type, name: &str) -> Self {
        Self {
            id: next_id(),
            ty,
            name: name.into(),
        }
    }

    /// Declared descriptor.
    #[must_use]
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

/// One iteration level of a comprehension.
#[derive(Clone, Debug)]
pub struct ForPhrase {
    id: u64,
    key: Option<Var>,
    value: Var,
    source: Type,
}

impl ForPhrase {
    /// Iterates `source`, exposing the key (index for sequences and strings) when `key` is given.
    #[must_use]
    pub fn new(key: Option<&Var>, value: &Var, source: Type) -> Self {
        Self {
            id: next_id(),
            key: key.cloned(),
            value: value.clone(),
            source,
        }
    }

    /// Key variable, if bound.
    #[must_use]
    pub fn key(&self) -> Option<&Var> {
        self.key.as_ref()
    }

    /// Value variable.
    #[must_use]
    pub fn value(&self) -> &Var {
        &self.value
    }

    /// Source descriptor.
    #[must_use]
    pub fn source(&self) -> Type {
        self.source
    }
}

/// A list or map comprehension.
#[derive(Clone, Debug)]
pub struct Comprehension {
    id: u64,
    target: Type,
}

impl Comprehension {
    /// A comprehension producing a value of `target`, a slice or map descriptor.
    #[must_use]
    pub fn new(target: Type) -> Self {
        Self {
            id: next_id(),
            target,
        }
    }

    /// Result descriptor.
    #[must_use]
    pub fn target(&self) -> Type {
        self.target
    }
}

/// Open comprehension state in a [`Builder`].
#[derive(Debug)]
pub(crate) enum Frame {
    Comprehension {
        id: u64,
        target: Type,
        depth: usize,
        yielded: bool,
    },
    Phrase {
        id: u64,
        next_at: usize,
        entry_depth: usize,
        scope_mark: usize,
    },
}

impl Builder<'_> {
    /// Opens a comprehension and its empty accumulator.
    pub fn begin_comprehension(&mut self, c: &Comprehension) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        if !matches!(c.target.shape(), Shape::Slice(_) | Shape::Map(..)) {
            return Err(TypeError::NotAContainer(c.target).into());
        }
        let ix = self.intern_type(c.target);
        self.emit(Instr::MakeEmpty {
            ty: field(Opcode::MakeEmpty, ix)?,
        });
        tracing::trace!(target_ty = %c.target, depth = self.depth, "comprehension opened");
        self.frames.push(Frame::Comprehension {
            id: c.id,
            target: c.target,
            depth: self.depth,
            yielded: false,
        });
        Ok(self)
    }

    /// Opens an iteration over the container on top of the stack.
    pub fn for_phrase(&mut self, f: &ForPhrase) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        match self.enclosing_comprehension() {
            Some(Frame::Comprehension { yielded: false, .. }) => {}
            Some(_) => return Err(BuildError::Nesting("for phrase after the yield")),
            None => return Err(BuildError::Nesting("for phrase outside a comprehension")),
        }
        match f.source.shape() {
            Shape::Slice(_) | Shape::Array(..) | Shape::Map(..) => {}
            Shape::Primitive(Kind::String) => {}
            _ => return Err(TypeError::NotIterable(f.source).into()),
        }
        self.consume(1)?;
        self.emit(Instr::IterInit);
        let next_at = self.instrs.len();
        self.emit(Instr::IterNext {
            with_key: f.key.is_some(),
            exit: 0,
        });
        tracing::trace!(source = %f.source, with_key = f.key.is_some(), at = next_at, "for phrase opened");
        self.frames.push(Frame::Phrase {
            id: f.id,
            next_at,
            entry_depth: self.depth,
            scope_mark: self.scope_log.len(),
        });
        self.depth += 1 + usize::from(f.key.is_some());
        Ok(self)
    }

    /// Pops a `bool`; when it is `false` the innermost open phrase skips to its next iteration.
    pub fn filter_for_phrase(&mut self, f: &ForPhrase) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let (next_at, entry_depth) = self.innermost_phrase(f)?;
        self.consume(1)?;
        if self.depth != entry_depth {
            return Err(BuildError::UnbalancedStack {
                expected: entry_depth,
                found: self.depth,
            });
        }
        self.emit(Instr::JmpIf {
            cond: false,
            target: field(Opcode::JmpIfFalse, next_at)?,
        });
        Ok(self)
    }

    /// Closes the innermost open phrase.
    ///
    /// The first phrase closed in a comprehension is the innermost one; closing it also
    /// accumulates the yielded element (or key and value).
    pub fn end_for_phrase(&mut self, f: &ForPhrase) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let (next_at, entry_depth) = self.innermost_phrase(f)?;
        let Some(Frame::Phrase { scope_mark, .. }) = self.frames.pop() else {
            return Err(BuildError::Nesting("end of an unopened for phrase"));
        };

        let enclosing = self
            .frames
            .iter_mut()
            .rev()
            .find(|fr| matches!(fr, Frame::Comprehension { .. }));
        let yield_target = match enclosing {
            Some(Frame::Comprehension {
                target, yielded, ..
            }) => {
                let first = !*yielded;
                *yielded = true;
                first.then_some(*target)
            }
            _ => return Err(BuildError::Nesting("for phrase outside a comprehension")),
        };
        if let Some(target) = yield_target {
            let (width, instr) = if target.is_map() {
                (2, Instr::Insert)
            } else {
                (1, Instr::Append)
            };
            if self.depth != entry_depth + width {
                return Err(BuildError::UnbalancedStack {
                    expected: entry_depth + width,
                    found: self.depth,
                });
            }
            self.emit(instr);
            self.depth = entry_depth;
        } else if self.depth != entry_depth {
            return Err(BuildError::UnbalancedStack {
                expected: entry_depth,
                found: self.depth,
            });
        }

        self.emit(Instr::Jmp {
            target: field(Opcode::Jmp, next_at)?,
        });
        let exit = self.here()?;
        if let Some(instr) = self.instrs.get_mut(next_at) {
            *instr = instr.with_target(exit);
        }
        self.unscope(scope_mark);
        tracing::trace!(at = next_at, exit, "for phrase closed");
        Ok(self)
    }

    /// Closes the comprehension, leaving its result on the stack.
    pub fn end_comprehension(&mut self, c: &Comprehension) -> Result<&mut Self, BuildError> {
        self.ensure_open()?;
        let depth = match self.frames.last() {
            Some(Frame::Comprehension { id, depth, .. }) if *id == c.id => *depth,
            Some(Frame::Comprehension { .. }) => {
                return Err(BuildError::Nesting("end of a different comprehension"));
            }
            Some(Frame::Phrase { .. }) => {
                return Err(BuildError::Nesting("comprehension ended with an open for phrase"));
            }
            None => return Err(BuildError::Nesting("end of an unopened comprehension")),
        };
        if self.depth != depth {
            return Err(BuildError::UnbalancedStack {
                expected: depth,
                found: self.depth,
            });
        }
        self.frames.pop();
        self.emit(Instr::Collect);
        self.depth += 1;
        tracing::trace!(target_ty = %c.target, "comprehension closed");
        Ok(self)
    }

    fn enclosing_comprehension(&self) -> Option<&Frame> {
        self.frames
            .iter()
            .rev()
            .find(|fr| matches!(fr, Frame::Comprehension { .. }))
    }

    fn innermost_phrase(&self, f: &ForPhrase) -> Result<(usize, usize), BuildError> {
        match self.frames.last() {
            Some(Frame::Phrase {
                id,
                next_at,
                entry_depth,
                ..
            }) if *id == f.id => Ok((*next_at, *entry_depth)),
            Some(Frame::Phrase { .. }) => Err(BuildError::Nesting("for phrase is not innermost")),
            _ => Err(BuildError::Nesting("for phrase is not open")),
        }
    }
}
