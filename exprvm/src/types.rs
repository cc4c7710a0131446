// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interned type descriptors.
//!
//! A [`Type`] is a handle to a process-wide interned [`Shape`]. Structurally equal shapes intern
//! to the same handle, so equality and hashing are by identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use hashbrown::HashMap;
use parking_lot::Mutex;
use thiserror::Error;

use crate::value::Value;

/// Primitive value kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Kind {
    /// `bool`.
    Bool = 0,
    /// `int` (64-bit).
    Int = 1,
    /// `int8`.
    Int8 = 2,
    /// `int16`.
    Int16 = 3,
    /// `int32` (also `rune`).
    Int32 = 4,
    /// `int64`.
    Int64 = 5,
    /// `uint` (64-bit).
    Uint = 6,
    /// `uint8` (also `byte`).
    Uint8 = 7,
    /// `uint16`.
    Uint16 = 8,
    /// `uint32`.
    Uint32 = 9,
    /// `uint64`.
    Uint64 = 10,
    /// `float32`.
    Float32 = 11,
    /// `float64`.
    Float64 = 12,
    /// `string`.
    String = 13,
    /// `any`: admits every value.
    Any = 14,
}

impl Kind {
    /// All kinds, in discriminant order.
    pub const ALL: [Self; 15] = [
        Self::Bool,
        Self::Int,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Uint,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Float32,
        Self::Float64,
        Self::String,
        Self::Any,
    ];

    /// Parses a kind from its discriminant.
    #[must_use]
    pub fn from_u8(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b)).copied()
    }

    /// Source-level name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Any => "any",
        }
    }

    /// Returns `true` for the signed integer kinds.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    /// Returns `true` for the unsigned integer kinds.
    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::Uint | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64
        )
    }

    /// Returns `true` for any integer kind.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    /// Returns `true` for the floating-point kinds.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Storage width in bits for numeric kinds, `0` otherwise.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Int8 | Self::Uint8 => 8,
            Self::Int16 | Self::Uint16 => 16,
            Self::Int32 | Self::Uint32 | Self::Float32 => 32,
            Self::Int | Self::Int64 | Self::Uint | Self::Uint64 | Self::Float64 => 64,
            Self::Bool | Self::String | Self::Any => 0,
        }
    }

    /// Returns the interned descriptor for this kind.
    #[must_use]
    pub fn ty(self) -> Type {
        Type::of(self)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The structure behind a [`Type`] handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A primitive kind.
    Primitive(Kind),
    /// An opaque host type, identified by its package path and name.
    Named {
        /// Package path (empty for the root package).
        path: Box<str>,
        /// Type name.
        name: Box<str>,
    },
    /// A growable sequence.
    Slice(Type),
    /// A fixed-length sequence.
    Array(Type, usize),
    /// A keyed mapping.
    Map(Type, Type),
}

/// Descriptor misuse or operand mismatch.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeError {
    /// `elem` was requested on a descriptor without an element type.
    #[error("{0} has no element type")]
    NotComposite(Type),
    /// `key` was requested on a non-map descriptor.
    #[error("{0} is not a map type")]
    NotAMap(Type),
    /// A map key descriptor (or runtime key) is not hashable.
    #[error("{0} cannot be used as a map key")]
    UnhashableKey(Type),
    /// A container of this descriptor cannot be built or accumulated into.
    #[error("{0} is not a slice, array or map type")]
    NotAContainer(Type),
    /// A comprehension source of this descriptor cannot be iterated.
    #[error("cannot range over {0}")]
    NotIterable(Type),
    /// The operator is not defined for the kind.
    #[error("operator {op} not defined on {kind}")]
    UnsupportedOp {
        /// Operand kind.
        kind: Kind,
        /// Operator name.
        op: &'static str,
    },
    /// A runtime value did not fit the expected descriptor.
    #[error("expected {expected}, found {found}")]
    OperandMismatch {
        /// The descriptor the instruction required.
        expected: Type,
        /// A description of the value that was found.
        found: &'static str,
    },
    /// An aggregate carried a different descriptor than required.
    #[error("expected {expected}, found {found}")]
    DescriptorMismatch {
        /// The descriptor the instruction required.
        expected: Type,
        /// The descriptor the value carried.
        found: Type,
    },
    /// More elements were supplied than a fixed array holds.
    #[error("{count} elements do not fit {ty}")]
    LengthOverflow {
        /// Array descriptor.
        ty: Type,
        /// Supplied element count.
        count: usize,
    },
}

/// An interned type descriptor.
///
/// Handles are `Copy` and compare by identity.
#[derive(Copy, Clone)]
pub struct Type(&'static Shape);

static PRIMITIVES: [Shape; 15] = [
    Shape::Primitive(Kind::Bool),
    Shape::Primitive(Kind::Int),
    Shape::Primitive(Kind::Int8),
    Shape::Primitive(Kind::Int16),
    Shape::Primitive(Kind::Int32),
    Shape::Primitive(Kind::Int64),
    Shape::Primitive(Kind::Uint),
    Shape::Primitive(Kind::Uint8),
    Shape::Primitive(Kind::Uint16),
    Shape::Primitive(Kind::Uint32),
    Shape::Primitive(Kind::Uint64),
    Shape::Primitive(Kind::Float32),
    Shape::Primitive(Kind::Float64),
    Shape::Primitive(Kind::String),
    Shape::Primitive(Kind::Any),
];

static INTERNER: LazyLock<Mutex<HashMap<Shape, Type>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn intern(shape: Shape) -> Type {
    if let Shape::Primitive(k) = shape {
        return Type::of(k);
    }
    let mut table = INTERNER.lock();
    if let Some(t) = table.get(&shape) {
        return *t;
    }
    // Descriptors live for the rest of the process.
    let leaked: &'static Shape = Box::leak(Box::new(shape.clone()));
    let t = Type(leaked);
    table.insert(shape, t);
    t
}

impl Type {
    /// Returns the descriptor for a primitive kind.
    #[must_use]
    pub fn of(kind: Kind) -> Self {
        Self(&PRIMITIVES[kind as usize])
    }

    /// Returns the descriptor of a named host type.
    #[must_use]
    pub fn named(path: &str, name: &str) -> Self {
        intern(Shape::Named {
            path: path.into(),
            name: name.into(),
        })
    }

    /// Returns `[]elem`.
    #[must_use]
    pub fn slice_of(elem: Self) -> Self {
        intern(Shape::Slice(elem))
    }

    /// Returns `[len]elem`.
    #[must_use]
    pub fn array_of(elem: Self, len: usize) -> Self {
        intern(Shape::Array(elem, len))
    }

    /// Returns `map[key]elem`.
    ///
    /// Fails with [`TypeError::UnhashableKey`] when `key` is a composite descriptor.
    pub fn map_of(key: Self, elem: Self) -> Result<Self, TypeError> {
        if !key.is_hashable() {
            return Err(TypeError::UnhashableKey(key));
        }
        Ok(intern(Shape::Map(key, elem)))
    }

    /// The underlying shape.
    #[must_use]
    pub fn shape(self) -> &'static Shape {
        self.0
    }

    /// The primitive kind, if this is a primitive descriptor.
    #[must_use]
    pub fn kind(self) -> Option<Kind> {
        match self.0 {
            Shape::Primitive(k) => Some(*k),
            _ => None,
        }
    }

    /// Element type of a slice, array or map.
    pub fn elem(self) -> Result<Self, TypeError> {
        match self.0 {
            Shape::Slice(e) | Shape::Array(e, _) | Shape::Map(_, e) => Ok(*e),
            _ => Err(TypeError::NotComposite(self)),
        }
    }

    /// Key type of a map.
    pub fn key(self) -> Result<Self, TypeError> {
        match self.0 {
            Shape::Map(k, _) => Ok(*k),
            _ => Err(TypeError::NotAMap(self)),
        }
    }

    /// Length of a fixed array.
    #[must_use]
    pub fn array_len(self) -> Option<usize> {
        match self.0 {
            Shape::Array(_, n) => Some(*n),
            _ => None,
        }
    }

    /// Returns `true` for slice and array descriptors.
    #[must_use]
    pub fn is_sequence(self) -> bool {
        matches!(self.0, Shape::Slice(_) | Shape::Array(..))
    }

    /// Returns `true` for map descriptors.
    #[must_use]
    pub fn is_map(self) -> bool {
        matches!(self.0, Shape::Map(..))
    }

    /// Returns `true` if values of this descriptor can key a map.
    #[must_use]
    pub fn is_hashable(self) -> bool {
        matches!(self.0, Shape::Primitive(_))
    }

    /// Returns `true` if `value` may be stored where this descriptor is expected.
    ///
    /// Integer kinds admit any integer of the same signedness; width is not range-checked.
    #[must_use]
    pub fn admits(self, value: &Value) -> bool {
        match (self.0, value) {
            (Shape::Primitive(Kind::Any) | Shape::Named { .. }, _) => true,
            (Shape::Primitive(Kind::Bool), Value::Bool(_)) => true,
            (Shape::Primitive(Kind::String), Value::Str(_)) => true,
            (Shape::Primitive(k), Value::Int(_)) => k.is_signed(),
            (Shape::Primitive(k), Value::Uint(_)) => k.is_unsigned(),
            (Shape::Primitive(k), Value::Float(_)) => k.is_float(),
            (Shape::Slice(_) | Shape::Array(..), Value::Array(a)) => a.ty() == self,
            (Shape::Map(..), Value::Map(m)) => m.ty() == self,
            _ => false,
        }
    }

    /// The zero value of this descriptor.
    #[must_use]
    pub fn zero(self) -> Value {
        match self.0 {
            Shape::Primitive(Kind::Bool) => Value::Bool(false),
            Shape::Primitive(Kind::String) => Value::from(""),
            Shape::Primitive(Kind::Any) | Shape::Named { .. } => Value::Nil,
            Shape::Primitive(k) if k.is_float() => Value::Float(0.0),
            Shape::Primitive(k) if k.is_unsigned() => Value::Uint(0),
            Shape::Primitive(_) => Value::Int(0),
            Shape::Slice(_) => Value::array(self, Vec::new()),
            Shape::Array(elem, len) => {
                Value::array(self, (0..*len).map(|_| elem.zero()).collect())
            }
            Shape::Map(..) => Value::map(self, Default::default()),
        }
    }
}

/// `rune`, an alias for `int32`.
#[must_use]
pub fn rune() -> Type {
    Type::of(Kind::Int32)
}

/// `byte`, an alias for `uint8`.
#[must_use]
pub fn byte() -> Type {
    Type::of(Kind::Uint8)
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Shape::Primitive(k) => f.write_str(k.name()),
            Shape::Named { path, name } if path.is_empty() => f.write_str(name),
            Shape::Named { path, name } => write!(f, "{path}.{name}"),
            Shape::Slice(e) => write!(f, "[]{e}"),
            Shape::Array(e, n) => write!(f, "[{n}]{e}"),
            Shape::Map(k, e) => write!(f, "map[{k}]{e}"),
        }
    }
}
