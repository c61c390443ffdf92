// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Element types, declared shapes and typed tensor payloads for rewriting
//! serialized computation graphs.
//!
//! This crate provides:
//! - [`DType`] — the fixed element type enumeration with its wire codes.
//! - [`Shape`] / [`Dim`] — declared shapes mixing fixed, symbolic and unknown extents.
//! - [`TensorData`] — decoded payloads with the `i64 → i32` and `f32 → f16`
//!   narrowing conversions (see [`RangePolicy`] and [`Fp16Clamp`]).
//!
//! # Design Goals
//! - A payload and its type tag always change together.
//! - Unknown element type codes are errors, never pass-through.
//! - Clean error types via `thiserror`.

mod data;
mod dtype;
mod error;
mod shape;

pub use data::{f16_from_int32_bits, f16_to_int32_bits, Fp16Clamp, RangePolicy, TensorData};
pub use dtype::{describe_code, DType};
pub use error::TensorError;
pub use shape::{Dim, Shape};

pub use half::f16;
