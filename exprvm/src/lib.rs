// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `exprvm`: an embeddable stack VM for a small dynamic expression language.
//!
//! Host programs expose functions, variables, constants and types through a
//! [`registry::Registry`]. A [`builder::Builder`] emits compact 32-bit instruction words against
//! those bindings and resolves them into an immutable [`code::Code`]; a [`context::Context`]
//! executes any range of that code on its own value stack.
//!
//! Host functions read their arguments off the top of the stack and replace them with their
//! results ([`context::Context::args`] then [`context::Context::ret`]).
//!
//! ## Example
//!
//! ```
//! use exprvm::builder::Builder;
//! use exprvm::context::Context;
//! use exprvm::host::{HostError, Signature};
//! use exprvm::registry::{FuncvSpec, Package, Registry};
//! use exprvm::types::Kind;
//! use exprvm::value::Value;
//!
//! fn concat(arity: usize, ctx: &mut Context<'_>) -> Result<(), HostError> {
//!     let mut out = String::new();
//!     for a in ctx.args(arity) {
//!         out.push_str(&a.to_string());
//!     }
//!     ctx.ret(arity, Value::from(out));
//!     Ok(())
//! }
//!
//! let mut strings = Package::new("strings");
//! strings.register_funcv(FuncvSpec::new(
//!     "Concat",
//!     concat,
//!     Signature::variadic(Vec::new(), Kind::Any.ty(), [Kind::String.ty()]),
//! ))?;
//! let mut registry = Registry::new();
//! registry.add_package(strings)?;
//!
//! let mut b = Builder::with_registry(&registry);
//! b.push(5)?.push("32")?.call_named("strings", "Concat", 2)?;
//! let code = b.resolve()?;
//!
//! let mut ctx = Context::new(&code);
//! ctx.exec(0, code.len())?;
//! assert_eq!(ctx.pop(), Some(Value::from("532")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod code;
pub mod comprehension;
pub mod context;
pub mod disasm;
pub mod host;
pub mod instr;
pub mod opcode;
pub mod ops;
pub mod registry;
pub mod trace;
pub mod types;
pub mod value;
