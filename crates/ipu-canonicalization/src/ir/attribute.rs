//! Operator attribute values
//!
//! Attributes are read from host operators and authored on target operators. The set of value
//! kinds is closed: scalars and homogeneous lists of bool, i32, i64, f32, f64 and strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::error::{CanonicalizeError, Result};

/// The value of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
pub enum AttributeValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bools(Vec<bool>),
    Int32s(Vec<i32>),
    Int64s(Vec<i64>),
    Float32s(Vec<f32>),
    Float64s(Vec<f64>),
    Strings(Vec<String>),
}

pub type Attributes = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    /// Name of the value kind, as used in error messages.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Number of elements held by a list value; scalars count as one.
    pub fn len(&self) -> usize {
        match self {
            AttributeValue::Bools(v) => v.len(),
            AttributeValue::Int32s(v) => v.len(),
            AttributeValue::Int64s(v) => v.len(),
            AttributeValue::Float32s(v) => v.len(),
            AttributeValue::Float64s(v) => v.len(),
            AttributeValue::Strings(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Types that can be read out of an [`AttributeValue`] of exactly one kind.
pub trait FromAttribute: Sized {
    /// Kind name of the matching variant.
    const KIND: &'static str;

    fn from_attribute(value: &AttributeValue) -> Option<Self>;
}

macro_rules! attribute_kinds {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::$variant(value)
                }
            }

            impl FromAttribute for $ty {
                const KIND: &'static str = stringify!($variant);

                fn from_attribute(value: &AttributeValue) -> Option<Self> {
                    match value {
                        AttributeValue::$variant(elem) => Some(elem.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

attribute_kinds! {
    Bool => bool,
    Int32 => i32,
    Int64 => i64,
    Float32 => f32,
    Float64 => f64,
    String => String,
    Bools => Vec<bool>,
    Int32s => Vec<i32>,
    Int64s => Vec<i64>,
    Float32s => Vec<f32>,
    Float64s => Vec<f64>,
    Strings => Vec<String>,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

/// Read attribute `name` as `T`, failing when it is absent or holds another kind.
pub fn get_attr<T: FromAttribute>(attrs: &Attributes, name: &str) -> Result<T> {
    let value = attrs
        .get(name)
        .ok_or_else(|| CanonicalizeError::MalformedAttribute {
            name: name.to_string(),
            expected: T::KIND,
            found: "missing",
        })?;

    T::from_attribute(value).ok_or_else(|| CanonicalizeError::MalformedAttribute {
        name: name.to_string(),
        expected: T::KIND,
        found: value.kind(),
    })
}

/// Build an attribute map from `(name, value)` pairs.
pub fn attrs<I, K, V>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<AttributeValue>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}
