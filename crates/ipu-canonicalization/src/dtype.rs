//! Element type tags
//!
//! Host operators describe element types with [`VarType`] tags; the target representation uses
//! [`OnnxDataType`] tags and type strings. Both enumerations must match their producers
//! bit-for-bit since the tags travel through attributes as plain integers.

use strum::{Display, EnumString, FromRepr, IntoStaticStr};

use crate::error::{CanonicalizeError, Result};

/// Host framework element type tags.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, FromRepr)]
#[repr(i32)]
pub enum VarType {
    BOOL = 0,
    INT16 = 1,
    INT32 = 2,
    INT64 = 3,
    FP16 = 4,
    FP32 = 5,
    FP64 = 6,
    UINT8 = 20,
    INT8 = 21,
    BF16 = 22,
    COMPLEX64 = 23,
    COMPLEX128 = 24,
}

impl TryFrom<i32> for VarType {
    type Error = CanonicalizeError;

    fn try_from(tag: i32) -> Result<Self> {
        VarType::from_repr(tag)
            .ok_or_else(|| CanonicalizeError::unsupported(format!("unknown data type tag {tag}")))
    }
}

/// Target representation element type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, FromRepr, IntoStaticStr)]
#[repr(i32)]
pub enum OnnxDataType {
    UNDEFINED = 0,
    FLOAT = 1,
    UINT8 = 2,
    INT8 = 3,
    UINT16 = 4,
    INT16 = 5,
    INT32 = 6,
    INT64 = 7,
    STRING = 8,
    BOOL = 9,
    FLOAT16 = 10,
    DOUBLE = 11,
    UINT32 = 12,
    UINT64 = 13,
    COMPLEX64 = 14,
    COMPLEX128 = 15,
    BFLOAT16 = 16,
}

impl From<VarType> for OnnxDataType {
    fn from(ty: VarType) -> Self {
        match ty {
            VarType::BOOL => OnnxDataType::BOOL,
            VarType::INT16 => OnnxDataType::INT16,
            VarType::INT32 => OnnxDataType::INT32,
            VarType::INT64 => OnnxDataType::INT64,
            VarType::FP16 => OnnxDataType::FLOAT16,
            VarType::FP32 => OnnxDataType::FLOAT,
            VarType::FP64 => OnnxDataType::DOUBLE,
            VarType::UINT8 => OnnxDataType::UINT8,
            VarType::INT8 => OnnxDataType::INT8,
            VarType::BF16 => OnnxDataType::BFLOAT16,
            VarType::COMPLEX64 => OnnxDataType::COMPLEX64,
            VarType::COMPLEX128 => OnnxDataType::COMPLEX128,
        }
    }
}

impl OnnxDataType {
    /// Type string understood by the target builder, e.g. `FLOAT` or `FLOAT16`.
    pub fn as_pop_str(&self) -> &'static str {
        self.into()
    }
}

/// Convert a host element type tag to the target tag.
pub fn var_type_to_onnx_dtype(tag: i32) -> Result<i32> {
    let ty = VarType::try_from(tag)?;
    Ok(OnnxDataType::from(ty) as i32)
}

/// Convert a host element type tag to the target type string.
pub fn var_type_to_pop_str(tag: i32) -> Result<&'static str> {
    let ty = VarType::try_from(tag)?;
    Ok(OnnxDataType::from(ty).as_pop_str())
}
