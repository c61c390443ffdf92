// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rank normalization: scalar graph inputs become `[1]`.
//!
//! Only top-level graph inputs whose shape is declared with zero dimensions
//! are promoted. An input without a declared shape has unknown rank and is
//! left alone, as are outputs and intermediate values. When an initializer
//! provides the default value of a promoted input, its dimensions are
//! promoted with it so declaration and payload stay consistent.

use crate::{GraphPass, PassError, PassStats};
use model_ir::helpers::{tensor_shape_mut, value_name};
use model_ir::protos::onnx::tensor_shape_proto::{dimension, Dimension};
use model_ir::protos::onnx::GraphProto;

/// Promotes rank-0 graph inputs to rank 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankNormalizer;

impl RankNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl GraphPass for RankNormalizer {
    fn name(&self) -> &str {
        "rank"
    }

    fn run(&self, graph: &mut GraphProto) -> Result<PassStats, PassError> {
        let mut promoted = Vec::new();
        for input in graph.input.iter_mut() {
            let name = value_name(input).to_string();
            let Some(shape) = tensor_shape_mut(input) else {
                continue;
            };
            if !shape.dim.is_empty() {
                continue;
            }
            shape.dim.push(Dimension {
                denotation: None,
                value: Some(dimension::Value::DimValue(1)),
            });
            tracing::info!("input '{name}': [] -> [1]");
            promoted.push(name);
        }

        for tensor in graph.initializer.iter_mut() {
            let backs_promoted = tensor
                .name
                .as_ref()
                .is_some_and(|n| promoted.contains(n));
            if backs_promoted && tensor.dims.is_empty() {
                tensor.dims.push(1);
                tracing::debug!("initializer '{}': [] -> [1]", tensor.name.as_deref().unwrap_or(""));
            }
        }

        tracing::info!("rank: {} scalar input(s) promoted", promoted.len());
        Ok(PassStats {
            rewrites: promoted.len(),
            ..PassStats::default()
        })
    }
}
