// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disassembler for compiled [`Code`].
//!
//! [`disassemble`] produces a structured view ([`Disassembly`], [`InstrView`]) for tooling and
//! tests, and a human-readable listing via [`core::fmt::Display`]: one instruction per line,
//! branch targets resolved to `@L<n>` labels, and table operands annotated with the names and
//! descriptors they refer to. Wide prefixes are folded into the instruction they extend.

#![allow(clippy::module_name_repetitions, reason = "public API module")]

use core::fmt;

use thiserror::Error;

use crate::code::Code;
use crate::instr::{DecodeError, Instr, join_arity};
use crate::value::Value;

/// A word that could not be disassembled.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("at {ip}: {error}")]
pub struct DisasmError {
    /// Instruction index of the bad word.
    pub ip: usize,
    /// Underlying decode failure.
    pub error: DecodeError,
}

/// One decoded instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstrView {
    ip: usize,
    width: usize,
    instr: Instr,
    count: Option<usize>,
}

impl InstrView {
    /// Instruction index (of the prefix, for wide instructions).
    #[must_use]
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Number of words, 2 when a wide prefix was folded in.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// The primary instruction.
    #[must_use]
    pub fn instr(&self) -> Instr {
        self.instr
    }

    /// Full count of an arity-bearing instruction, including wide high bits.
    #[must_use]
    pub fn count(&self) -> Option<usize> {
        self.count
    }
}

/// Sorted branch targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labels {
    ips: Vec<u32>,
}

impl Labels {
    /// Returns the sorted labeled instruction indices.
    #[must_use]
    pub fn ips(&self) -> &[u32] {
        &self.ips
    }

    /// Returns the label index for `ip` if it is a branch target.
    #[must_use]
    pub fn label_index(&self, ip: u32) -> Option<usize> {
        self.ips.binary_search(&ip).ok()
    }
}

/// A disassembled code object.
#[derive(Clone, Debug)]
pub struct Disassembly<'a> {
    code: &'a Code,
    instrs: Vec<InstrView>,
    labels: Labels,
    error: Option<DisasmError>,
}

/// Disassembles `code`.
///
/// This is best-effort: decoding stops at the first bad word, which is recorded in
/// [`Disassembly::error`]; everything before it is still listed.
#[must_use]
pub fn disassemble(code: &Code) -> Disassembly<'_> {
    let mut instrs = Vec::new();
    let mut error = None;
    let mut ip = 0;
    while ip < code.len() {
        match decode_at(code, ip) {
            Ok(view) => {
                ip += view.width;
                instrs.push(view);
            }
            Err(e) => {
                error = Some(DisasmError { ip, error: e });
                break;
            }
        }
    }

    let mut ips: Vec<u32> = instrs.iter().filter_map(|v| v.instr.target()).collect();
    ips.sort_unstable();
    ips.dedup();

    Disassembly {
        code,
        instrs,
        labels: Labels { ips },
        error,
    }
}

fn decode_at(code: &Code, ip: usize) -> Result<InstrView, DecodeError> {
    let Some(first) = code.instr(ip) else {
        return Err(DecodeError::DanglingWide { ip });
    };
    let (instr, aux, width) = match first? {
        Instr::Wide { aux } => match code.instr(ip + 1) {
            Some(Ok(next)) if next.opcode().has_arity() => (next, aux, 2),
            Some(Err(e)) => return Err(e),
            _ => return Err(DecodeError::DanglingWide { ip }),
        },
        instr => (instr, 0, 1),
    };
    let count = match instr {
        Instr::CallFuncv { arity, .. }
        | Instr::MakeArray { arity, .. }
        | Instr::MakeMap { arity, .. } => Some(join_arity(aux, arity)),
        _ => None,
    };
    Ok(InstrView {
        ip,
        width,
        instr,
        count,
    })
}

impl<'a> Disassembly<'a> {
    /// The disassembled code.
    #[must_use]
    pub fn code(&self) -> &'a Code {
        self.code
    }

    /// Decoded instructions, in order.
    #[must_use]
    pub fn instrs(&self) -> &[InstrView] {
        &self.instrs
    }

    /// Branch targets.
    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// The word decoding stopped at, if any.
    #[must_use]
    pub fn error(&self) -> Option<&DisasmError> {
        self.error.as_ref()
    }

    fn fmt_label_ref(&self, f: &mut fmt::Formatter<'_>, ip: u32) -> fmt::Result {
        match self.labels.label_index(ip) {
            Some(ix) => write!(f, "@L{ix}"),
            None => write!(f, "@{ip:06}"),
        }
    }

    fn fmt_type(&self, f: &mut fmt::Formatter<'_>, ty: u32) -> fmt::Result {
        match self.code.types().get(ty as usize) {
            Some(t) => write!(f, " ; {t}"),
            None => f.write_str(" ; <bad type>"),
        }
    }

    fn fmt_instr(&self, f: &mut fmt::Formatter<'_>, view: &InstrView) -> fmt::Result {
        let code = self.code;
        write!(f, "  {:06}: {}", view.ip, view.instr.opcode().mnemonic())?;
        let count = view.count.unwrap_or(0);
        match view.instr {
            Instr::PushLit { lit } => {
                write!(f, " {lit}")?;
                match code.literals().get(lit as usize) {
                    Some(Value::Str(s)) => write!(f, " ; {:?}", &**s),
                    Some(v) => write!(f, " ; {v}"),
                    None => f.write_str(" ; <bad literal>"),
                }
            }
            Instr::PushInt { imm } => write!(f, " {imm}"),
            Instr::Zero { ty } | Instr::MakeArrayFrom { ty } | Instr::MakeEmpty { ty } => {
                write!(f, " {ty}")?;
                self.fmt_type(f, ty)
            }
            Instr::CallFunc { func } => {
                write!(f, " {func}")?;
                match code.funcs().get(func as usize) {
                    Some(r) => write!(f, " ; host=\"{}\"", qualified(r.package(), r.name())),
                    None => f.write_str(" ; <bad func>"),
                }
            }
            Instr::CallFuncv { func, .. } => {
                write!(f, " {func}, {count}")?;
                match code.funcvs().get(usize::from(func)) {
                    Some(r) => write!(f, " ; host=\"{}\"", qualified(r.package(), r.name())),
                    None => f.write_str(" ; <bad func>"),
                }
            }
            Instr::MakeArray { ty, .. } | Instr::MakeMap { ty, .. } => {
                write!(f, " {ty}, {count}")?;
                self.fmt_type(f, u32::from(ty))
            }
            Instr::StoreVar { slot } | Instr::LoadVar { slot } => {
                write!(f, " {slot}")?;
                if let Some(s) = code.slots().get(slot as usize) {
                    write!(f, " ; {} {}", s.name, s.ty)?;
                }
                Ok(())
            }
            Instr::LoadHostVar { var } | Instr::StoreHostVar { var } => {
                write!(f, " {var}")?;
                if let Some(v) = code.host_vars().get(var as usize) {
                    let info = v.info();
                    write!(f, " ; host_var=\"{}\" {}", info.name, info.ty)?;
                }
                Ok(())
            }
            Instr::BuiltinOp { kind, op } => write!(f, " {kind} {op}"),
            Instr::Jmp { target } | Instr::JmpIf { target, .. } => {
                f.write_str(" ")?;
                self.fmt_label_ref(f, target)
            }
            Instr::IterNext { with_key, exit } => {
                f.write_str(if with_key { " key, " } else { " " })?;
                self.fmt_label_ref(f, exit)
            }
            Instr::Pop { n } => write!(f, " {n}"),
            Instr::Wide { aux } => write!(f, " {aux}"),
            Instr::PushNil | Instr::IterInit | Instr::Append | Instr::Insert | Instr::Collect => {
                Ok(())
            }
        }
    }
}

fn qualified(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.into()
    } else {
        format!("{package}.{name}")
    }
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code;
        writeln!(
            f,
            "; words={} slots={} literals={}",
            code.len(),
            code.slot_count(),
            code.literals().len()
        )?;
        let mut next_label = 0;
        let ips = self.labels.ips();
        for view in &self.instrs {
            while let Some(&at) = ips.get(next_label)
                && (at as usize) <= view.ip
            {
                writeln!(f, "@L{next_label}:")?;
                next_label += 1;
            }
            self.fmt_instr(f, view)?;
            writeln!(f)?;
        }
        if let Some(e) = &self.error {
            writeln!(f, "  <decode error {e}>")?;
        }
        while next_label < ips.len() {
            writeln!(f, "@L{next_label}:")?;
            next_label += 1;
        }
        Ok(())
    }
}
