// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host ABI for `exprvm`.
//!
//! Host functions are invoked through a [`Thunk`]. The interpreter leaves the arguments on top of
//! the value stack; the thunk reads them with [`Context::args`] and replaces them with its results
//! via [`Context::ret`]. No argument vector is allocated per call.

use std::fmt;

use thiserror::Error;

use crate::context::Context;
use crate::types::Type;

/// Compiled entry point of a host function.
///
/// The first argument is the actual argument count (the declared arity for fixed-arity
/// functions, the call-site arity for variadic ones).
pub type Thunk = fn(usize, &mut Context<'_>) -> Result<(), HostError>;

/// Errors a host thunk can report.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    /// An argument did not have the shape the function needs.
    #[error("argument {index}: expected {expected}")]
    BadArgument {
        /// Zero-based argument position.
        index: usize,
        /// What the function expected.
        expected: Type,
    },
    /// The host function failed.
    #[error("{0}")]
    Failed(String),
}

/// Declared parameter and result descriptors of a host function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Leading fixed parameters.
    pub params: Vec<Type>,
    /// Element type of the trailing variadic parameter, if any.
    pub variadic: Option<Type>,
    /// Result types.
    pub results: Vec<Type>,
}

impl Signature {
    /// A fixed-arity signature.
    pub fn new(params: impl Into<Vec<Type>>, results: impl Into<Vec<Type>>) -> Self {
        Self {
            params: params.into(),
            variadic: None,
            results: results.into(),
        }
    }

    /// A variadic signature: `params` followed by any number of `rest`.
    pub fn variadic(
        params: impl Into<Vec<Type>>,
        rest: Type,
        results: impl Into<Vec<Type>>,
    ) -> Self {
        Self {
            params: params.into(),
            variadic: Some(rest),
            results: results.into(),
        }
    }

    /// Number of fixed parameters (the minimum arity of a variadic function).
    #[must_use]
    pub fn min_arity(&self) -> usize {
        self.params.len()
    }

    /// Number of values the function leaves on the stack.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Renders `func name(params) results`.
    #[must_use]
    pub fn describe<'a>(&'a self, name: &'a str) -> SignatureInfo<'a> {
        SignatureInfo { name, sig: self }
    }
}

/// Printable signature of a named host function.
#[derive(Copy, Clone, Debug)]
pub struct SignatureInfo<'a> {
    name: &'a str,
    sig: &'a Signature,
}

impl fmt::Display for SignatureInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func {}(", self.name)?;
        let mut first = true;
        for p in &self.sig.params {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{p}")?;
        }
        if let Some(rest) = self.sig.variadic {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "...{rest}")?;
        }
        f.write_str(")")?;
        match self.sig.results.as_slice() {
            [] => Ok(()),
            [one] => write!(f, " {one}"),
            many => {
                f.write_str(" (")?;
                for (i, r) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{r}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Kind;

    #[test]
    fn fixed_signature_renders_like_source() {
        let s = Kind::String.ty();
        let sig = Signature::new([s, s], [s]);
        assert_eq!(sig.describe("strcat").to_string(), "func strcat(string, string) string");
        assert_eq!(sig.min_arity(), 2);
        assert_eq!(sig.result_count(), 1);
    }

    #[test]
    fn variadic_signature_renders_ellipsis() {
        let sig = Signature::variadic([Kind::String.ty()], Kind::Any.ty(), [Kind::String.ty()]);
        assert_eq!(
            sig.describe("Sprintf").to_string(),
            "func Sprintf(string, ...any) string"
        );
        let sig = Signature::variadic(Vec::new(), Kind::Any.ty(), [Kind::Int.ty(), Kind::Bool.ty()]);
        assert_eq!(sig.describe("f").to_string(), "func f(...any) (int, bool)");
    }
}
