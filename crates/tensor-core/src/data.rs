// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Typed tensor payloads and the element conversions applied to them.
//!
//! [`TensorData`] is the decoded form of a payload for the element types the
//! rewrite passes touch. Decoding and encoding are always little-endian,
//! matching the raw-bytes storage of the graph document.
//!
//! Two narrowing conversions are provided:
//! - [`TensorData::narrow_int64`]: `i64 → i32`, truncating by default.
//! - [`TensorData::narrow_float32`]: `f32 → f16`, optionally clamping
//!   magnitudes into a configurable finite range first.

use crate::{DType, TensorError};
use half::f16;

/// A decoded tensor payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F16(Vec<f16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

/// How out-of-range values are handled when narrowing integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    /// Keep the low 32 bits, like an `as` cast.
    #[default]
    Truncate,
    /// Reject any value outside the `i32` range.
    Checked,
}

/// Magnitude limits applied to `f32` values before they are rounded to `f16`.
///
/// Positive values strictly between zero and `min_positive` are raised to
/// `min_positive`; values strictly beyond `max_finite` are lowered to it.
/// The same applies symmetrically to negative values. Zero, infinities and
/// NaN pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fp16Clamp {
    pub min_positive: f32,
    pub max_finite: f32,
}

impl Default for Fp16Clamp {
    fn default() -> Self {
        Self {
            min_positive: 1e-7,
            max_finite: 1e4,
        }
    }
}

impl Fp16Clamp {
    /// Applies the clamp to a single value, returning the new value and
    /// whether it changed.
    pub fn apply(&self, x: f32) -> (f32, bool) {
        let min = self.min_positive;
        let max = self.max_finite;
        if 0.0 < x && x < min {
            (min, true)
        } else if -min < x && x < 0.0 {
            (-min, true)
        } else if max < x && x < f32::INFINITY {
            (max, true)
        } else if f32::NEG_INFINITY < x && x < -max {
            (-max, true)
        } else {
            (x, false)
        }
    }
}

impl TensorData {
    /// Returns the element type of this payload.
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F16(_) => DType::F16,
            TensorData::I32(_) => DType::I32,
            TensorData::I64(_) => DType::I64,
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F16(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes little-endian raw bytes as elements of `dtype`.
    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Result<Self, TensorError> {
        let size = dtype
            .size_bytes()
            .ok_or(TensorError::UnsupportedDType {
                op: "decode",
                dtype,
            })?;
        if bytes.len() % size != 0 {
            return Err(TensorError::RawLength {
                dtype,
                len: bytes.len(),
            });
        }
        let data = match dtype {
            DType::F32 => TensorData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::F16 => TensorData::F16(
                bytes
                    .chunks_exact(2)
                    .map(|c| f16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            DType::I32 => TensorData::I32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::I64 => TensorData::I64(
                bytes
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            other => {
                return Err(TensorError::UnsupportedDType {
                    op: "decode",
                    dtype: other,
                })
            }
        };
        Ok(data)
    }

    /// Encodes the payload as little-endian raw bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TensorData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::F16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// Narrows an `I64` payload to `I32`.
    pub fn narrow_int64(&self, policy: RangePolicy) -> Result<TensorData, TensorError> {
        let TensorData::I64(values) = self else {
            return Err(TensorError::UnsupportedDType {
                op: "narrow_int64",
                dtype: self.dtype(),
            });
        };
        let mut out = Vec::with_capacity(values.len());
        for (index, &value) in values.iter().enumerate() {
            match policy {
                RangePolicy::Truncate => out.push(value as i32),
                RangePolicy::Checked => out.push(
                    i32::try_from(value).map_err(|_| TensorError::OutOfRange { index, value })?,
                ),
            }
        }
        Ok(TensorData::I32(out))
    }

    /// Narrows an `F32` payload to `F16`, returning the new payload and the
    /// number of elements the clamp changed.
    pub fn narrow_float32(&self, clamp: Option<Fp16Clamp>) -> Result<(TensorData, usize), TensorError> {
        let TensorData::F32(values) = self else {
            return Err(TensorError::UnsupportedDType {
                op: "narrow_float32",
                dtype: self.dtype(),
            });
        };
        let mut clamped = 0usize;
        let out = values
            .iter()
            .map(|&x| {
                let x = match clamp {
                    Some(c) => {
                        let (v, changed) = c.apply(x);
                        clamped += usize::from(changed);
                        v
                    }
                    None => x,
                };
                f16::from_f32(x)
            })
            .collect();
        Ok((TensorData::F16(out), clamped))
    }
}

/// Packs `f16` values into the zero-extended 32-bit list used by typed storage.
pub fn f16_to_int32_bits(values: &[f16]) -> Vec<i32> {
    values.iter().map(|v| i32::from(v.to_bits())).collect()
}

/// Inverse of [`f16_to_int32_bits`]; the upper 16 bits are ignored.
pub fn f16_from_int32_bits(bits: &[i32]) -> Vec<f16> {
    bits.iter().map(|&b| f16::from_bits(b as u16)).collect()
}
