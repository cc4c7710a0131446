// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamically typed stack cells.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{Kind, Type, TypeError};

/// A runtime value.
///
/// Aggregates are shared behind [`Arc`] and never mutated once visible on the stack.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// The untyped `nil`.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// Any signed integer kind.
    Int(i64),
    /// Any unsigned integer kind.
    Uint(u64),
    /// Any floating-point kind.
    Float(f64),
    /// UTF-8 string.
    Str(Arc<str>),
    /// A slice or fixed array.
    Array(Arc<ArrayValue>),
    /// A map.
    Map(Arc<MapValue>),
}

/// A typed sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayValue {
    ty: Type,
    elems: Vec<Value>,
}

impl ArrayValue {
    /// Descriptor of the sequence (`[]T` or `[N]T`).
    #[must_use]
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Elements in order.
    #[must_use]
    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

/// A typed map with deterministic (key-ordered) iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct MapValue {
    ty: Type,
    entries: BTreeMap<Key, Value>,
}

impl MapValue {
    /// Descriptor of the map.
    #[must_use]
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Looks up `key`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The hashable projection of a scalar [`Value`], used as a map key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    /// Boolean key.
    Bool(bool),
    /// Signed integer key.
    Int(i64),
    /// Unsigned integer key.
    Uint(u64),
    /// Float key; `-0.0` and `0.0` are one key, as are all NaNs.
    Float(FloatKey),
    /// String key.
    Str(Arc<str>),
}

/// A totally ordered `f64`.
///
/// Keys compare by [`f64::total_cmp`] after folding `-0.0` into `0.0` and every NaN into
/// [`f64::NAN`], so numerically equal floats collide and a NaN key is overwritten by the next.
#[derive(Copy, Clone, Debug)]
pub struct FloatKey(pub f64);

impl FloatKey {
    /// Wraps `f` in its canonical form.
    #[must_use]
    pub fn new(f: f64) -> Self {
        Self(canonical(f))
    }
}

fn canonical(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else if f.is_nan() {
        f64::NAN
    } else {
        f
    }
}

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical(self.0).total_cmp(&canonical(other.0))
    }
}

impl Key {
    /// Projects a scalar value; aggregates and `nil` have no key.
    #[must_use]
    pub fn from_value(v: &Value) -> Option<Self> {
        Some(match v {
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Uint(u) => Self::Uint(*u),
            Value::Float(f) => Self::Float(FloatKey::new(*f)),
            Value::Str(s) => Self::Str(s.clone()),
            Value::Nil | Value::Array(_) | Value::Map(_) => return None,
        })
    }

    /// The value this key was projected from.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Uint(u) => Value::Uint(*u),
            Self::Float(f) => Value::Float(f.0),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl Value {
    /// Builds a sequence value. Callers are responsible for element conformance.
    #[must_use]
    pub fn array(ty: Type, elems: Vec<Self>) -> Self {
        Self::Array(Arc::new(ArrayValue { ty, elems }))
    }

    /// Builds a map value. Callers are responsible for entry conformance.
    #[must_use]
    pub fn map(ty: Type, entries: BTreeMap<Key, Self>) -> Self {
        Self::Map(Arc::new(MapValue { ty, entries }))
    }

    /// Builds a sequence of descriptor `ty`, checking every element against its element type.
    pub fn checked_array(ty: Type, elems: Vec<Self>) -> Result<Self, TypeError> {
        if !ty.is_sequence() {
            return Err(TypeError::NotAContainer(ty));
        }
        check_all(ty.elem()?, &elems)?;
        Ok(Self::array(ty, elems))
    }

    /// Builds a map of descriptor `ty` from `(key, value)` pairs; later pairs win.
    pub fn checked_map(
        ty: Type,
        pairs: impl IntoIterator<Item = (Self, Self)>,
    ) -> Result<Self, TypeError> {
        let key_ty = ty.key()?;
        let elem_ty = ty.elem()?;
        let mut entries = BTreeMap::new();
        for (k, v) in pairs {
            let key = conform_key(key_ty, &k)?;
            conform(elem_ty, &v)?;
            entries.insert(key, v);
        }
        Ok(Self::map(ty, entries))
    }

    /// Descriptor inferred from the value, `None` for `nil`.
    ///
    /// Scalars report the widest kind of their representation (`int`, `uint`, `float64`).
    #[must_use]
    pub fn ty(&self) -> Option<Type> {
        match self {
            Self::Nil => None,
            Self::Bool(_) => Some(Kind::Bool.ty()),
            Self::Int(_) => Some(Kind::Int.ty()),
            Self::Uint(_) => Some(Kind::Uint.ty()),
            Self::Float(_) => Some(Kind::Float64.ty()),
            Self::Str(_) => Some(Kind::String.ty()),
            Self::Array(a) => Some(a.ty),
            Self::Map(m) => Some(m.ty),
        }
    }

    /// Short name of the representation, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Returns the boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the signed integer payload.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the unsigned integer payload.
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns the float payload.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the sequence payload.
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the map payload.
    #[must_use]
    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

pub(crate) fn conform(ty: Type, v: &Value) -> Result<(), TypeError> {
    if ty.admits(v) {
        return Ok(());
    }
    Err(match v {
        Value::Array(a) if a.ty() != ty => TypeError::DescriptorMismatch {
            expected: ty,
            found: a.ty(),
        },
        Value::Map(m) if m.ty() != ty => TypeError::DescriptorMismatch {
            expected: ty,
            found: m.ty(),
        },
        _ => TypeError::OperandMismatch {
            expected: ty,
            found: v.type_name(),
        },
    })
}

pub(crate) fn conform_key(ty: Type, v: &Value) -> Result<Key, TypeError> {
    conform(ty, v)?;
    Key::from_value(v).ok_or(TypeError::UnhashableKey(ty))
}

fn check_all(elem: Type, elems: &[Value]) -> Result<(), TypeError> {
    elems.iter().try_for_each(|v| conform(elem, v))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Self::Uint(u)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Self::Uint(u64::from(u))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Self::Str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("<nil>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Uint(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Array(a) => {
                f.write_str("[")?;
                for (i, e) in a.elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
            Self::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{v}", k.to_value())?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_map_last_write_wins() {
        let ty = Type::map_of(Kind::String.ty(), Kind::Int.ty()).unwrap();
        let m = Value::checked_map(
            ty,
            [
                (Value::from("a"), Value::Int(1)),
                (Value::from("b"), Value::Int(2)),
                (Value::from("a"), Value::Int(3)),
            ],
        )
        .unwrap();
        let m = m.as_map().unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&Key::Str("a".into())), Some(&Value::Int(3)));
    }

    #[test]
    fn checked_array_rejects_foreign_elements() {
        let ty = Type::slice_of(Kind::String.ty());
        let err = Value::checked_array(ty, vec![Value::from("x"), Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            TypeError::OperandMismatch {
                expected: Kind::String.ty(),
                found: "int",
            }
        );
        assert_eq!(
            Value::checked_array(Kind::Int.ty(), vec![]),
            Err(TypeError::NotAContainer(Kind::Int.ty()))
        );
    }

    #[test]
    fn float_keys_are_totally_ordered() {
        let a = Key::Float(FloatKey(f64::NAN));
        let b = Key::Float(FloatKey(-f64::NAN));
        assert_eq!(a, b);
        assert_eq!(Key::Float(FloatKey(-0.0)), Key::Float(FloatKey(0.0)));
        assert!(Key::Float(FloatKey(-1.0)) < Key::Float(FloatKey(-0.0)));
        assert!(Key::Float(FloatKey(f64::INFINITY)) < Key::Float(FloatKey(f64::NAN)));
    }

    #[test]
    fn signed_zero_and_nan_keys_collide() {
        let ty = Type::map_of(Kind::Float64.ty(), Kind::String.ty()).unwrap();
        let m = Value::checked_map(
            ty,
            vec![
                (Value::Float(0.0), Value::Str("first".into())),
                (Value::Float(-0.0), Value::Str("second".into())),
                (Value::Float(f64::NAN), Value::Str("third".into())),
                (Value::Float(-f64::NAN), Value::Str("fourth".into())),
            ],
        )
        .unwrap();
        let m = m.as_map().unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(
            m.get(&Key::Float(FloatKey(0.0))),
            Some(&Value::Str("second".into()))
        );
        assert_eq!(
            m.get(&Key::Float(FloatKey(f64::NAN))),
            Some(&Value::Str("fourth".into()))
        );
        assert_eq!(
            Key::from_value(&Value::Float(-0.0)).map(|k| k.to_value().to_string()),
            Some("0".to_owned())
        );
    }

    #[test]
    fn display_resembles_source_printing() {
        let ty = Type::slice_of(Kind::Int.ty());
        let v = Value::array(ty, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(v.to_string(), "[1 2]");
        assert_eq!(Value::Float(1.3).to_string(), "1.3");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Nil.to_string(), "<nil>");
    }
}
