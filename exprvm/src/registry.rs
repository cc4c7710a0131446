// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host binding registry.
//!
//! A [`Package`] is a namespace of host functions, variadic functions, variables, constants and
//! named types. A [`Registry`] owns the root package (empty name) plus any number of named
//! packages, and is handed to a [`Builder`] by reference. Names are resolved once, when code is
//! built; execution never performs a lookup.
//!
//! Registration requires `&mut`, lookups only `&`, so a registry that has been shared is
//! effectively frozen. [`install_default`] publishes one registry process-wide for embedders
//! that want ambient access.
//!
//! # Example
//! ```
//! use exprvm::context::Context;
//! use exprvm::host::{HostError, Signature};
//! use exprvm::registry::{FuncSpec, Registry, SymbolKind};
//! use exprvm::types::Kind;
//! use exprvm::value::Value;
//!
//! fn exec_len(_arity: usize, ctx: &mut Context<'_>) -> Result<(), HostError> {
//!     let n = ctx.args(1)[0].as_str().map_or(0, str::len);
//!     ctx.ret(1, Value::Int(i64::try_from(n).unwrap_or(i64::MAX)));
//!     Ok(())
//! }
//!
//! let mut reg = Registry::new();
//! reg.root_mut().register_func(FuncSpec::new(
//!     "len",
//!     exec_len,
//!     Signature::new([Kind::String.ty()], [Kind::Int.ty()]),
//! ))?;
//! let sym = reg.find("", "len").unwrap();
//! assert_eq!(sym.kind(), SymbolKind::Func);
//! # Ok::<(), exprvm::registry::RegistryError>(())
//! ```
//!
//! [`Builder`]: crate::builder::Builder

use std::fmt;
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::host::{Signature, SignatureInfo, Thunk};
use crate::types::{Kind, Type, TypeError};
use crate::value::{Value, conform};

/// Shared storage behind a host variable.
pub type HostCell = Arc<RwLock<Value>>;

/// Creates a host variable cell holding `v`.
#[must_use]
pub fn host_cell(v: Value) -> HostCell {
    Arc::new(RwLock::new(v))
}

/// Registry symbol categories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Fixed-arity function.
    Func,
    /// Variadic function.
    Funcv,
    /// Addressable variable.
    Var,
    /// Constant.
    Const,
    /// Named type.
    Type,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Func => "func",
            Self::Funcv => "variadic func",
            Self::Var => "var",
            Self::Const => "const",
            Self::Type => "type",
        })
    }
}

/// Errors when populating a registry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is already bound in that category of the package.
    #[error("{category} {name:?} already registered in package {package:?}")]
    DuplicateSymbol {
        /// Package name.
        package: String,
        /// Category of the clash.
        category: SymbolKind,
        /// Symbol name.
        name: String,
    },
    /// A package of that name already exists.
    #[error("package {0:?} already registered")]
    DuplicatePackage(String),
    /// [`install_default`] was called twice.
    #[error("the default registry is already installed")]
    DefaultAlreadyInstalled,
}

/// Discriminates how a constant is typed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstKind {
    /// An ordinary constant of a primitive kind.
    Typed(Kind),
    /// The untyped `nil`: a pointer bound to nothing.
    UnboundPtr,
}

/// A fixed-arity host function specification.
#[derive(Clone, Debug)]
pub struct FuncSpec {
    /// Symbol name.
    pub name: String,
    /// Compiled entry point.
    pub thunk: Thunk,
    /// Declared parameters and results. The arity is `sig.params.len()`.
    pub sig: Signature,
}

impl FuncSpec {
    /// Constructs a spec.
    pub fn new(name: impl Into<String>, thunk: Thunk, sig: Signature) -> Self {
        Self {
            name: name.into(),
            thunk,
            sig,
        }
    }
}

/// A variadic host function specification.
#[derive(Clone, Debug)]
pub struct FuncvSpec {
    /// Symbol name.
    pub name: String,
    /// Compiled entry point.
    pub thunk: Thunk,
    /// Declared parameters; the minimum arity is `sig.params.len()`.
    pub sig: Signature,
}

impl FuncvSpec {
    /// Constructs a spec.
    pub fn new(name: impl Into<String>, thunk: Thunk, sig: Signature) -> Self {
        Self {
            name: name.into(),
            thunk,
            sig,
        }
    }
}

/// A host variable specification.
#[derive(Clone, Debug)]
pub struct VarSpec {
    /// Symbol name.
    pub name: String,
    /// Declared descriptor.
    pub ty: Type,
    /// Backing storage, shared with the host.
    pub cell: HostCell,
}

impl VarSpec {
    /// Binds `name` to existing storage.
    pub fn new(name: impl Into<String>, ty: Type, cell: HostCell) -> Self {
        Self {
            name: name.into(),
            ty,
            cell,
        }
    }

    /// Binds `name` to fresh storage holding the zero value of `ty`.
    pub fn zeroed(name: impl Into<String>, ty: Type) -> Self {
        Self::new(name, ty, host_cell(ty.zero()))
    }
}

/// A constant specification.
#[derive(Clone, Debug)]
pub struct ConstSpec {
    /// Symbol name.
    pub name: String,
    /// Typing discriminator.
    pub kind: ConstKind,
    /// Value (`Nil` for [`ConstKind::UnboundPtr`]).
    pub value: Value,
}

impl ConstSpec {
    /// Constructs a spec.
    pub fn new(name: impl Into<String>, kind: ConstKind, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
        }
    }
}

#[derive(Debug)]
struct FuncEntry {
    package: Arc<str>,
    name: Box<str>,
    thunk: Thunk,
    sig: Signature,
}

/// A registered fixed-arity function.
#[derive(Clone, Debug)]
pub struct FuncRef(Arc<FuncEntry>);

impl FuncRef {
    /// Symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Owning package name.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.0.package
    }

    /// Declared arity.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.sig.params.len()
    }

    /// Declared signature.
    #[must_use]
    pub fn sig(&self) -> &Signature {
        &self.0.sig
    }

    /// Printable signature, e.g. `func strcat(string, string) string`.
    #[must_use]
    pub fn info(&self) -> SignatureInfo<'_> {
        self.0.sig.describe(&self.0.name)
    }

    pub(crate) fn thunk(&self) -> Thunk {
        self.0.thunk
    }
}

impl PartialEq for FuncRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A registered variadic function.
#[derive(Clone, Debug)]
pub struct FuncvRef(Arc<FuncEntry>);

impl FuncvRef {
    /// Symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Owning package name.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.0.package
    }

    /// Minimum number of arguments.
    #[must_use]
    pub fn min_arity(&self) -> usize {
        self.0.sig.min_arity()
    }

    /// Declared signature.
    #[must_use]
    pub fn sig(&self) -> &Signature {
        &self.0.sig
    }

    /// Printable signature, e.g. `func Sprintf(string, ...any) string`.
    #[must_use]
    pub fn info(&self) -> SignatureInfo<'_> {
        self.0.sig.describe(&self.0.name)
    }

    pub(crate) fn thunk(&self) -> Thunk {
        self.0.thunk
    }
}

impl PartialEq for FuncvRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug)]
struct VarEntry {
    name: Box<str>,
    ty: Type,
    cell: HostCell,
}

/// Name and descriptor of a host variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VarInfo<'a> {
    /// Symbol name.
    pub name: &'a str,
    /// Declared descriptor.
    pub ty: Type,
}

/// The address of a registered host variable.
#[derive(Clone, Debug)]
pub struct HostVarRef {
    addr: usize,
    entry: Arc<VarEntry>,
}

impl HostVarRef {
    /// Registration index within the owning package.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Declared name and descriptor.
    #[must_use]
    pub fn info(&self) -> VarInfo<'_> {
        VarInfo {
            name: &self.entry.name,
            ty: self.entry.ty,
        }
    }

    /// Current value.
    #[must_use]
    pub fn load(&self) -> Value {
        self.entry.cell.read().clone()
    }

    /// Replaces the value, checking it against the declared descriptor.
    pub fn store(&self, v: Value) -> Result<(), TypeError> {
        conform(self.entry.ty, &v)?;
        *self.entry.cell.write() = v;
        Ok(())
    }
}

impl PartialEq for HostVarRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

#[derive(Debug)]
struct ConstEntry {
    name: Box<str>,
    kind: ConstKind,
    value: Value,
}

/// A registered constant.
#[derive(Clone, Debug)]
pub struct ConstRef(Arc<ConstEntry>);

impl ConstRef {
    /// Symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Typing discriminator.
    #[must_use]
    pub fn kind(&self) -> ConstKind {
        self.0.kind
    }

    /// Constant value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0.value
    }
}

/// A resolved registry symbol.
#[derive(Clone, Debug)]
pub enum Symbol {
    /// Fixed-arity function.
    Func(FuncRef),
    /// Variadic function.
    Funcv(FuncvRef),
    /// Host variable.
    Var(HostVarRef),
    /// Constant.
    Const(ConstRef),
    /// Named type.
    Type(Type),
}

impl Symbol {
    /// Category of the symbol.
    #[must_use]
    pub fn kind(&self) -> SymbolKind {
        match self {
            Self::Func(_) => SymbolKind::Func,
            Self::Funcv(_) => SymbolKind::Funcv,
            Self::Var(_) => SymbolKind::Var,
            Self::Const(_) => SymbolKind::Const,
            Self::Type(_) => SymbolKind::Type,
        }
    }
}

/// A namespace of host bindings.
#[derive(Debug)]
pub struct Package {
    name: Arc<str>,
    funcs: HashMap<Box<str>, FuncRef>,
    funcvs: HashMap<Box<str>, FuncvRef>,
    vars: Vec<HostVarRef>,
    var_index: HashMap<Box<str>, usize>,
    consts: HashMap<Box<str>, ConstRef>,
    types: HashMap<Box<str>, Type>,
}

impl Package {
    /// Creates an empty package.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            funcs: HashMap::new(),
            funcvs: HashMap::new(),
            vars: Vec::new(),
            var_index: HashMap::new(),
            consts: HashMap::new(),
            types: HashMap::new(),
        }
    }

    /// Package name (empty for the root package).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn duplicate(&self, category: SymbolKind, name: &str) -> RegistryError {
        RegistryError::DuplicateSymbol {
            package: self.name.to_string(),
            category,
            name: name.into(),
        }
    }

    /// Registers a fixed-arity function.
    pub fn register_func(&mut self, spec: FuncSpec) -> Result<FuncRef, RegistryError> {
        if self.funcs.contains_key(spec.name.as_str()) {
            return Err(self.duplicate(SymbolKind::Func, &spec.name));
        }
        let f = FuncRef(Arc::new(FuncEntry {
            package: self.name.clone(),
            name: spec.name.into(),
            thunk: spec.thunk,
            sig: spec.sig,
        }));
        tracing::debug!(package = %self.name, func = %f.info(), "func registered");
        self.funcs.insert(f.0.name.clone(), f.clone());
        Ok(f)
    }

    /// Registers a variadic function.
    pub fn register_funcv(&mut self, spec: FuncvSpec) -> Result<FuncvRef, RegistryError> {
        if self.funcvs.contains_key(spec.name.as_str()) {
            return Err(self.duplicate(SymbolKind::Funcv, &spec.name));
        }
        let f = FuncvRef(Arc::new(FuncEntry {
            package: self.name.clone(),
            name: spec.name.into(),
            thunk: spec.thunk,
            sig: spec.sig,
        }));
        tracing::debug!(package = %self.name, func = %f.info(), "variadic func registered");
        self.funcvs.insert(f.0.name.clone(), f.clone());
        Ok(f)
    }

    /// Registers a host variable. Addresses are assigned in registration order.
    pub fn register_var(&mut self, spec: VarSpec) -> Result<HostVarRef, RegistryError> {
        if self.var_index.contains_key(spec.name.as_str()) {
            return Err(self.duplicate(SymbolKind::Var, &spec.name));
        }
        let v = HostVarRef {
            addr: self.vars.len(),
            entry: Arc::new(VarEntry {
                name: spec.name.into(),
                ty: spec.ty,
                cell: spec.cell,
            }),
        };
        tracing::debug!(package = %self.name, var = %v.entry.name, ty = %v.entry.ty, addr = v.addr, "var registered");
        self.var_index.insert(v.entry.name.clone(), v.addr);
        self.vars.push(v.clone());
        Ok(v)
    }

    /// Registers a constant.
    pub fn register_const(&mut self, spec: ConstSpec) -> Result<ConstRef, RegistryError> {
        if self.consts.contains_key(spec.name.as_str()) {
            return Err(self.duplicate(SymbolKind::Const, &spec.name));
        }
        let c = ConstRef(Arc::new(ConstEntry {
            name: spec.name.into(),
            kind: spec.kind,
            value: spec.value,
        }));
        tracing::debug!(package = %self.name, name = %c.0.name, kind = ?c.0.kind, "const registered");
        self.consts.insert(c.0.name.clone(), c.clone());
        Ok(c)
    }

    /// Registers a named type.
    pub fn register_type(&mut self, name: &str, ty: Type) -> Result<(), RegistryError> {
        if self.types.contains_key(name) {
            return Err(self.duplicate(SymbolKind::Type, name));
        }
        tracing::debug!(package = %self.name, name, %ty, "type registered");
        self.types.insert(name.into(), ty);
        Ok(())
    }

    /// Registers a named host type under its own name, as `path.name` where `path` is this
    /// package's name.
    pub fn register_host_type(&mut self, name: &str) -> Result<Type, RegistryError> {
        let ty = Type::named(&self.name, name);
        self.register_type(name, ty)?;
        Ok(ty)
    }

    /// Registers several fixed-arity functions, stopping at the first duplicate.
    pub fn register_funcs(
        &mut self,
        specs: impl IntoIterator<Item = FuncSpec>,
    ) -> Result<(), RegistryError> {
        specs
            .into_iter()
            .try_for_each(|s| self.register_func(s).map(drop))
    }

    /// Registers several variadic functions, stopping at the first duplicate.
    pub fn register_funcvs(
        &mut self,
        specs: impl IntoIterator<Item = FuncvSpec>,
    ) -> Result<(), RegistryError> {
        specs
            .into_iter()
            .try_for_each(|s| self.register_funcv(s).map(drop))
    }

    /// Registers several host variables, stopping at the first duplicate.
    pub fn register_vars(
        &mut self,
        specs: impl IntoIterator<Item = VarSpec>,
    ) -> Result<(), RegistryError> {
        specs
            .into_iter()
            .try_for_each(|s| self.register_var(s).map(drop))
    }

    /// Registers several constants, stopping at the first duplicate.
    pub fn register_consts(
        &mut self,
        specs: impl IntoIterator<Item = ConstSpec>,
    ) -> Result<(), RegistryError> {
        specs
            .into_iter()
            .try_for_each(|s| self.register_const(s).map(drop))
    }

    /// Registers several named types, stopping at the first duplicate.
    pub fn register_types<'a>(
        &mut self,
        types: impl IntoIterator<Item = (&'a str, Type)>,
    ) -> Result<(), RegistryError> {
        types
            .into_iter()
            .try_for_each(|(name, ty)| self.register_type(name, ty))
    }

    /// Looks up a fixed-arity function.
    #[must_use]
    pub fn find_func(&self, name: &str) -> Option<FuncRef> {
        self.funcs.get(name).cloned()
    }

    /// Looks up a variadic function.
    #[must_use]
    pub fn find_funcv(&self, name: &str) -> Option<FuncvRef> {
        self.funcvs.get(name).cloned()
    }

    /// Looks up a host variable.
    #[must_use]
    pub fn find_var(&self, name: &str) -> Option<HostVarRef> {
        let ix = *self.var_index.get(name)?;
        self.vars.get(ix).cloned()
    }

    /// Looks up a constant.
    #[must_use]
    pub fn find_const(&self, name: &str) -> Option<ConstRef> {
        self.consts.get(name).cloned()
    }

    /// Looks up a named type.
    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<Type> {
        self.types.get(name).copied()
    }

    /// Looks up `name` in every category: functions, variadic functions, variables, constants,
    /// then types.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Symbol> {
        self.find_func(name)
            .map(Symbol::Func)
            .or_else(|| self.find_funcv(name).map(Symbol::Funcv))
            .or_else(|| self.find_var(name).map(Symbol::Var))
            .or_else(|| self.find_const(name).map(Symbol::Const))
            .or_else(|| self.find_type(name).map(Symbol::Type))
    }
}

/// The set of packages visible to a builder.
#[derive(Debug)]
pub struct Registry {
    root: Package,
    packages: HashMap<Box<str>, Package>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry holding only an empty root package.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Package::new(""),
            packages: HashMap::new(),
        }
    }

    /// The root package.
    #[must_use]
    pub fn root(&self) -> &Package {
        &self.root
    }

    /// The root package, for registration.
    pub fn root_mut(&mut self) -> &mut Package {
        &mut self.root
    }

    /// Adds a named package.
    pub fn add_package(&mut self, package: Package) -> Result<(), RegistryError> {
        if package.name.is_empty() || self.packages.contains_key(&*package.name) {
            return Err(RegistryError::DuplicatePackage(package.name.to_string()));
        }
        tracing::debug!(package = %package.name, "package added");
        self.packages.insert(package.name.as_ref().into(), package);
        Ok(())
    }

    /// Looks up a package by name; `""` is the root package.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        if name.is_empty() {
            return Some(&self.root);
        }
        self.packages.get(name)
    }

    /// Looks up a package by name, for registration.
    pub fn package_mut(&mut self, name: &str) -> Option<&mut Package> {
        if name.is_empty() {
            return Some(&mut self.root);
        }
        self.packages.get_mut(name)
    }

    /// Looks up `name` in `package`.
    #[must_use]
    pub fn find(&self, package: &str, name: &str) -> Option<Symbol> {
        self.package(package)?.find(name)
    }
}

static DEFAULT: OnceLock<Registry> = OnceLock::new();

/// Publishes `registry` as the process-wide default. Succeeds once.
pub fn install_default(registry: Registry) -> Result<&'static Registry, RegistryError> {
    let mut pending = Some(registry);
    let installed = DEFAULT.get_or_init(|| pending.take().unwrap_or_default());
    if pending.is_some() {
        return Err(RegistryError::DefaultAlreadyInstalled);
    }
    tracing::debug!(packages = installed.packages.len(), "default registry installed");
    Ok(installed)
}

/// The process-wide default registry, if one was installed.
#[must_use]
pub fn default_registry() -> Option<&'static Registry> {
    DEFAULT.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::host::HostError;

    fn nop(_arity: usize, _ctx: &mut Context<'_>) -> Result<(), HostError> {
        Ok(())
    }

    fn string_sig() -> Signature {
        Signature::new([Kind::String.ty(), Kind::String.ty()], [Kind::String.ty()])
    }

    #[test]
    fn register_rejects_duplicates_per_category() {
        let mut p = Package::new("fmt");
        p.register_func(FuncSpec::new("f", nop, string_sig())).unwrap();
        let err = p
            .register_func(FuncSpec::new("f", nop, string_sig()))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateSymbol {
                package: "fmt".into(),
                category: SymbolKind::Func,
                name: "f".into(),
            }
        );
        // Other categories are independent namespaces.
        p.register_funcv(FuncvSpec::new(
            "f",
            nop,
            Signature::variadic(Vec::new(), Kind::Any.ty(), [Kind::String.ty()]),
        ))
        .unwrap();
        p.register_var(VarSpec::zeroed("f", Kind::Int.ty())).unwrap();
        assert!(p.register_var(VarSpec::zeroed("f", Kind::Int.ty())).is_err());
        p.register_type("f", Kind::Int32.ty()).unwrap();
        assert!(p.register_type("f", Kind::Int32.ty()).is_err());
    }

    #[test]
    fn find_prefers_functions_then_vars_then_consts_then_types() {
        let mut p = Package::new("");
        p.register_type("x", Kind::Int.ty()).unwrap();
        assert_eq!(p.find("x").unwrap().kind(), SymbolKind::Type);
        p.register_const(ConstSpec::new("x", ConstKind::Typed(Kind::Int), 1_i64))
            .unwrap();
        assert_eq!(p.find("x").unwrap().kind(), SymbolKind::Const);
        p.register_var(VarSpec::zeroed("x", Kind::Int.ty())).unwrap();
        assert_eq!(p.find("x").unwrap().kind(), SymbolKind::Var);
        p.register_funcv(FuncvSpec::new(
            "x",
            nop,
            Signature::variadic(Vec::new(), Kind::Any.ty(), Vec::new()),
        ))
        .unwrap();
        assert_eq!(p.find("x").unwrap().kind(), SymbolKind::Funcv);
        p.register_func(FuncSpec::new("x", nop, string_sig())).unwrap();
        assert_eq!(p.find("x").unwrap().kind(), SymbolKind::Func);
        assert!(p.find("y").is_none());
    }

    #[test]
    fn vars_are_addressed_in_registration_order() {
        let mut p = Package::new("");
        let cell = host_cell(Value::Int(0));
        p.register_vars([
            VarSpec::new("x", Kind::Int.ty(), cell.clone()),
            VarSpec::zeroed("y", Kind::String.ty()),
        ])
        .unwrap();
        let x = p.find_var("x").unwrap();
        assert_eq!(x.addr(), 0);
        assert_eq!(x.info().name, "x");
        assert_eq!(p.find_var("y").unwrap().addr(), 1);

        x.store(Value::Int(9)).unwrap();
        assert_eq!(*cell.read(), Value::Int(9));
        assert!(x.store(Value::from("nine")).is_err());
    }

    #[test]
    fn registry_packages_are_independent() {
        let mut reg = Registry::new();
        reg.root_mut()
            .register_const(ConstSpec::new("nil", ConstKind::UnboundPtr, Value::Nil))
            .unwrap();
        let mut strings = Package::new("strings");
        strings
            .register_func(FuncSpec::new("Join", nop, string_sig()))
            .unwrap();
        reg.add_package(strings).unwrap();

        assert!(reg.find("", "nil").is_some());
        assert!(reg.find("strings", "nil").is_none());
        assert!(reg.find("strings", "Join").is_some());
        assert!(reg.find("missing", "Join").is_none());
        assert_eq!(
            reg.add_package(Package::new("strings")),
            Err(RegistryError::DuplicatePackage("strings".into()))
        );
        assert!(reg.add_package(Package::new("")).is_err());
    }

    #[test]
    fn host_types_are_named_after_their_package() {
        let mut p = Package::new("exec");
        let ty = p.register_host_type("Context").unwrap();
        assert_eq!(ty, Type::named("exec", "Context"));
        assert_eq!(p.find_type("Context"), Some(ty));
    }
}
