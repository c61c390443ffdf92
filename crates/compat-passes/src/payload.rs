// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! In-place payload narrowing shared by the passes.
//!
//! Both helpers keep the tensor's storage form (raw bytes stay raw, typed
//! lists stay typed) and replace payload and type tag together.

use crate::PassError;
use model_ir::protos::onnx::TensorProto;
use model_ir::tensor::{payload_storage, read_payload, tensor_name, write_payload};
use tensor_core::{Fp16Clamp, RangePolicy};

/// Re-encodes an `int64` tensor as `int32`.
pub(crate) fn narrow_int64_tensor(
    tensor: &mut TensorProto,
    policy: RangePolicy,
) -> Result<(), PassError> {
    let storage = payload_storage(tensor);
    let data = read_payload(tensor)?;
    let narrowed = data.narrow_int64(policy).map_err(|source| PassError::Conversion {
        value: tensor_name(tensor).to_string(),
        source,
    })?;
    write_payload(tensor, &narrowed, storage);
    Ok(())
}

/// Re-encodes a `float32` tensor as `float16`, returning the number of
/// clamped elements.
pub(crate) fn narrow_float32_tensor(
    tensor: &mut TensorProto,
    clamp: Option<Fp16Clamp>,
) -> Result<usize, PassError> {
    let storage = payload_storage(tensor);
    let data = read_payload(tensor)?;
    let (narrowed, clamped) =
        data.narrow_float32(clamp)
            .map_err(|source| PassError::Conversion {
                value: tensor_name(tensor).to_string(),
                source,
            })?;
    write_payload(tensor, &narrowed, storage);
    if clamped > 0 {
        tracing::warn!(
            "tensor '{}': {} value(s) clamped into the float16 range",
            tensor_name(tensor),
            clamped
        );
    }
    Ok(clamped)
}
