// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reading and writing the payload of a [`TensorProto`].
//!
//! A tensor stores its elements either as contiguous little-endian bytes
//! (`raw_data`) or in the typed list that matches its element type
//! (`float_data`, `int32_data`, `int64_data`). Half-precision values live in
//! `int32_data`, one zero-extended bit pattern per element.
//!
//! [`write_payload`] replaces the payload and the type tag in a single call,
//! clearing every other numeric field, so a tensor can never be observed
//! with a tag that disagrees with its bytes.

use crate::protos::onnx::{tensor_proto::DataLocation, TensorProto};
use crate::ModelError;
use tensor_core::{f16_from_int32_bits, f16_to_int32_bits, DType, TensorData, TensorError};

/// Where a tensor keeps its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStorage {
    /// Contiguous little-endian bytes in `raw_data`.
    Raw,
    /// The typed list matching the element type.
    Typed,
    /// No elements stored at all.
    Empty,
}

/// Returns the tensor's name, or `""` when unnamed.
pub fn tensor_name(tensor: &TensorProto) -> &str {
    tensor.name.as_deref().unwrap_or("")
}

/// Returns the declared element type code.
pub fn tensor_dtype_code(tensor: &TensorProto) -> i32 {
    tensor.data_type.unwrap_or(DType::UNDEFINED_CODE)
}

/// Returns `true` if the tensor's declared element type is `dtype`.
pub fn has_dtype(tensor: &TensorProto, dtype: DType) -> bool {
    tensor_dtype_code(tensor) == dtype.code()
}

/// Number of elements described by the tensor's dimensions.
pub fn element_count(tensor: &TensorProto) -> Result<usize, ModelError> {
    tensor
        .dims
        .iter()
        .try_fold(1usize, |acc, &d| usize::try_from(d).ok().and_then(|d| acc.checked_mul(d)))
        .ok_or_else(|| malformed(tensor, TensorError::InvalidDims { dims: tensor.dims.clone() }))
}

/// Determines which storage form currently holds the payload.
pub fn payload_storage(tensor: &TensorProto) -> PayloadStorage {
    if tensor.raw_data.as_ref().is_some_and(|raw| !raw.is_empty()) {
        return PayloadStorage::Raw;
    }
    let typed = match DType::from_code(tensor_dtype_code(tensor)) {
        Some(DType::F32) => !tensor.float_data.is_empty(),
        Some(DType::I64) => !tensor.int64_data.is_empty(),
        Some(DType::F64) => !tensor.double_data.is_empty(),
        Some(DType::U32) | Some(DType::U64) => !tensor.uint64_data.is_empty(),
        Some(DType::String) => !tensor.string_data.is_empty(),
        _ => !tensor.int32_data.is_empty(),
    };
    if typed {
        PayloadStorage::Typed
    } else {
        PayloadStorage::Empty
    }
}

/// Returns `true` if the tensor keeps its data in an external file.
pub fn is_external(tensor: &TensorProto) -> bool {
    tensor.data_location() == DataLocation::External
}

/// Decodes the tensor payload under its declared element type.
///
/// Supports `float32`, `float16`, `int32` and `int64` in both storage forms.
/// A tensor with a non-zero element count and no payload is malformed.
pub fn read_payload(tensor: &TensorProto) -> Result<TensorData, ModelError> {
    if is_external(tensor) {
        return Err(ModelError::ExternalData {
            name: tensor_name(tensor).to_string(),
        });
    }
    let code = tensor_dtype_code(tensor);
    let dtype = DType::try_from_code(i64::from(code)).map_err(|e| malformed(tensor, e))?;
    let expected = element_count(tensor)?;

    let data = match payload_storage(tensor) {
        PayloadStorage::Raw => {
            let raw = tensor.raw_data.as_deref().unwrap_or_default();
            TensorData::from_le_bytes(dtype, raw).map_err(|e| malformed(tensor, e))?
        }
        PayloadStorage::Typed => match dtype {
            DType::F32 => TensorData::F32(tensor.float_data.clone()),
            DType::F16 => TensorData::F16(f16_from_int32_bits(&tensor.int32_data)),
            DType::I32 => TensorData::I32(tensor.int32_data.clone()),
            DType::I64 => TensorData::I64(tensor.int64_data.clone()),
            other => {
                return Err(malformed(
                    tensor,
                    TensorError::UnsupportedDType {
                        op: "read_payload",
                        dtype: other,
                    },
                ))
            }
        },
        PayloadStorage::Empty if expected == 0 => empty_data(dtype)
            .ok_or_else(|| {
                malformed(
                    tensor,
                    TensorError::UnsupportedDType {
                        op: "read_payload",
                        dtype,
                    },
                )
            })?,
        PayloadStorage::Empty => {
            return Err(malformed(tensor, TensorError::MissingPayload { expected }));
        }
    };

    if data.len() != expected {
        return Err(malformed(
            tensor,
            TensorError::PayloadLength {
                expected,
                actual: data.len(),
            },
        ));
    }
    Ok(data)
}

/// Replaces the payload and type tag together.
///
/// `storage` selects the form to write; [`PayloadStorage::Empty`] is only
/// meaningful for zero-element payloads and writes no data.
pub fn write_payload(tensor: &mut TensorProto, data: &TensorData, storage: PayloadStorage) {
    tensor.raw_data = None;
    tensor.float_data.clear();
    tensor.int32_data.clear();
    tensor.int64_data.clear();

    match storage {
        PayloadStorage::Raw => tensor.raw_data = Some(data.to_le_bytes()),
        PayloadStorage::Typed => match data {
            TensorData::F32(v) => tensor.float_data = v.clone(),
            TensorData::F16(v) => tensor.int32_data = f16_to_int32_bits(v),
            TensorData::I32(v) => tensor.int32_data = v.clone(),
            TensorData::I64(v) => tensor.int64_data = v.clone(),
        },
        PayloadStorage::Empty => {}
    }
    tensor.data_type = Some(data.dtype().code());
}

/// Builds a named tensor holding `data` in the given storage form.
pub fn make_tensor(name: &str, dims: &[i64], data: &TensorData, storage: PayloadStorage) -> TensorProto {
    let mut tensor = TensorProto {
        name: Some(name.to_string()),
        dims: dims.to_vec(),
        ..Default::default()
    };
    write_payload(&mut tensor, data, storage);
    tensor
}

fn empty_data(dtype: DType) -> Option<TensorData> {
    match dtype {
        DType::F32 => Some(TensorData::F32(Vec::new())),
        DType::F16 => Some(TensorData::F16(Vec::new())),
        DType::I32 => Some(TensorData::I32(Vec::new())),
        DType::I64 => Some(TensorData::I64(Vec::new())),
        _ => None,
    }
}

fn malformed(tensor: &TensorProto, source: TensorError) -> ModelError {
    ModelError::MalformedTensor {
        name: tensor_name(tensor).to_string(),
        source,
    }
}
