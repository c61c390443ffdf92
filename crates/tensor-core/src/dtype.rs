// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor element data types as encoded in the graph document.
//!
//! Every element type carries a stable integer code (the `TensorProto`
//! data type enumeration). Codes outside this table are rejected rather
//! than passed through: a rewrite pass that cannot name a type cannot
//! guarantee anything about it.

use crate::TensorError;

/// Enumerates the element types a graph value or tensor payload can declare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    F32,
    U8,
    I8,
    U16,
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer. Not representable on the embedded runtime.
    I64,
    String,
    Bool,
    /// 16-bit IEEE 754 floating point.
    F16,
    F64,
    U32,
    U64,
    Complex64,
    Complex128,
    /// 16-bit brain floating point.
    BF16,
    F8E4M3FN,
    F8E4M3FNUZ,
    F8E5M2,
    F8E5M2FNUZ,
    U4,
    I4,
    F4E2M1,
}

impl DType {
    /// Code used by declarations that leave the element type unspecified.
    pub const UNDEFINED_CODE: i32 = 0;

    const ALL: [DType; 23] = [
        DType::F32,
        DType::U8,
        DType::I8,
        DType::U16,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::String,
        DType::Bool,
        DType::F16,
        DType::F64,
        DType::U32,
        DType::U64,
        DType::Complex64,
        DType::Complex128,
        DType::BF16,
        DType::F8E4M3FN,
        DType::F8E4M3FNUZ,
        DType::F8E5M2,
        DType::F8E5M2FNUZ,
        DType::U4,
        DType::I4,
        DType::F4E2M1,
    ];

    /// Returns the wire code for this element type.
    pub fn code(self) -> i32 {
        match self {
            DType::F32 => 1,
            DType::U8 => 2,
            DType::I8 => 3,
            DType::U16 => 4,
            DType::I16 => 5,
            DType::I32 => 6,
            DType::I64 => 7,
            DType::String => 8,
            DType::Bool => 9,
            DType::F16 => 10,
            DType::F64 => 11,
            DType::U32 => 12,
            DType::U64 => 13,
            DType::Complex64 => 14,
            DType::Complex128 => 15,
            DType::BF16 => 16,
            DType::F8E4M3FN => 17,
            DType::F8E4M3FNUZ => 18,
            DType::F8E5M2 => 19,
            DType::F8E5M2FNUZ => 20,
            DType::U4 => 21,
            DType::I4 => 22,
            DType::F4E2M1 => 23,
        }
    }

    /// Looks up an element type by wire code.
    ///
    /// Returns `None` for [`DType::UNDEFINED_CODE`] and for any code that
    /// is not part of the enumeration.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.code() == code)
    }

    /// Like [`DType::from_code`], but unknown codes become an error.
    pub fn try_from_code(code: i64) -> Result<Self, TensorError> {
        i32::try_from(code)
            .ok()
            .and_then(Self::from_code)
            .ok_or(TensorError::UnknownElementType { code })
    }

    /// Size of a single element in bytes, when the type is byte-addressable.
    ///
    /// Strings and the packed 4-bit types have no fixed per-element size.
    pub fn size_bytes(self) -> Option<usize> {
        match self {
            DType::U8 | DType::I8 | DType::Bool => Some(1),
            DType::F8E4M3FN | DType::F8E4M3FNUZ | DType::F8E5M2 | DType::F8E5M2FNUZ => Some(1),
            DType::U16 | DType::I16 | DType::F16 | DType::BF16 => Some(2),
            DType::F32 | DType::I32 | DType::U32 => Some(4),
            DType::F64 | DType::I64 | DType::U64 | DType::Complex64 => Some(8),
            DType::Complex128 => Some(16),
            DType::String | DType::U4 | DType::I4 | DType::F4E2M1 => None,
        }
    }

    /// Returns `true` for the binary floating-point families.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            DType::F32
                | DType::F16
                | DType::F64
                | DType::BF16
                | DType::F8E4M3FN
                | DType::F8E4M3FNUZ
                | DType::F8E5M2
                | DType::F8E5M2FNUZ
                | DType::F4E2M1
        )
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::U8 => "uint8",
            DType::I8 => "int8",
            DType::U16 => "uint16",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::String => "string",
            DType::Bool => "bool",
            DType::F16 => "float16",
            DType::F64 => "float64",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::BF16 => "bfloat16",
            DType::F8E4M3FN => "float8e4m3fn",
            DType::F8E4M3FNUZ => "float8e4m3fnuz",
            DType::F8E5M2 => "float8e5m2",
            DType::F8E5M2FNUZ => "float8e5m2fnuz",
            DType::U4 => "uint4",
            DType::I4 => "int4",
            DType::F4E2M1 => "float4e2m1",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats a raw wire code for display, falling back to the number itself.
pub fn describe_code(code: i32) -> String {
    match DType::from_code(code) {
        Some(dtype) => dtype.as_str().to_string(),
        None if code == DType::UNDEFINED_CODE => "undefined".to_string(),
        None => format!("unknown({code})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for dtype in DType::ALL {
            assert_eq!(DType::from_code(dtype.code()), Some(dtype));
        }
    }

    #[test]
    fn test_well_known_codes() {
        assert_eq!(DType::F32.code(), 1);
        assert_eq!(DType::I32.code(), 6);
        assert_eq!(DType::I64.code(), 7);
        assert_eq!(DType::F16.code(), 10);
    }

    #[test]
    fn test_undefined_and_unknown() {
        assert_eq!(DType::from_code(0), None);
        assert_eq!(DType::from_code(99), None);
        assert!(matches!(
            DType::try_from_code(99),
            Err(TensorError::UnknownElementType { code: 99 })
        ));
        assert!(DType::try_from_code(i64::MAX).is_err());
        assert_eq!(DType::try_from_code(7).unwrap(), DType::I64);
    }

    #[test]
    fn test_size_bytes() {
        assert_eq!(DType::I64.size_bytes(), Some(8));
        assert_eq!(DType::F16.size_bytes(), Some(2));
        assert_eq!(DType::String.size_bytes(), None);
    }

    #[test]
    fn test_describe_code() {
        assert_eq!(describe_code(1), "float32");
        assert_eq!(describe_code(0), "undefined");
        assert_eq!(describe_code(42), "unknown(42)");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DType::F16).unwrap();
        assert_eq!(json, "\"f16\"");
    }
}
