// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor payload decoding and element conversion.

use crate::DType;

/// Errors that can occur while decoding or re-encoding tensor payloads.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// An element type code is not part of the known enumeration.
    #[error("unknown element type code {code}")]
    UnknownElementType { code: i64 },

    /// The requested data type is not supported for this operation.
    #[error("unsupported dtype {dtype} for operation {op}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    /// The payload holds a different number of elements than its dimensions declare.
    #[error("payload length mismatch: expected {expected} elements, got {actual}")]
    PayloadLength { expected: usize, actual: usize },

    /// Raw bytes do not divide evenly into elements of the declared type.
    #[error("raw payload of {len} bytes is not a multiple of the {dtype} element size")]
    RawLength { dtype: DType, len: usize },

    /// A non-empty tensor carries neither raw bytes nor a typed list.
    #[error("tensor declares {expected} elements but carries no payload")]
    MissingPayload { expected: usize },

    /// The declared dimensions do not describe a finite element count.
    #[error("invalid tensor dimensions {dims:?}")]
    InvalidDims { dims: Vec<i64> },

    /// A 64-bit value does not fit the 32-bit target under the checked policy.
    #[error("value {value} at index {index} does not fit in int32")]
    OutOfRange { index: usize, value: i64 },
}
