// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Precision narrowing: `float32` → `float16` with a fixed output contract.
//!
//! ```text
//! convert (validated) ──Converted──────────────┐
//!        │                                     ▼
//!        └─ValidationFailed─▶ convert_relaxed ─▶ reconcile_outputs
//! ```
//!
//! The relaxed retry is reserved for the one recoverable outcome, a graph
//! that is already partly `float16`; any [`PassError`] aborts the pass.

mod boundary;
mod converter;

pub use boundary::reconcile_outputs;
pub use converter::{ConversionOutcome, Float16Converter, DEFAULT_OP_BLOCK_LIST};

use crate::{GraphPass, PassError, PassStats};
use model_ir::protos::onnx::GraphProto;
use serde::{Deserialize, Serialize};
use std::fmt;
use tensor_core::DType;

/// Element type every float graph output must carry after narrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputDType {
    #[default]
    Float32,
    Float16,
}

impl OutputDType {
    pub fn dtype(self) -> DType {
        match self {
            OutputDType::Float32 => DType::F32,
            OutputDType::Float16 => DType::F16,
        }
    }
}

impl fmt::Display for OutputDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dtype().as_str())
    }
}

impl std::str::FromStr for OutputDType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float32" | "fp32" => Ok(OutputDType::Float32),
            "float16" | "fp16" => Ok(OutputDType::Float16),
            other => Err(format!("unknown output dtype '{other}' (expected float32 or float16)")),
        }
    }
}

/// Narrows a graph to `float16` and reconciles its output types.
#[derive(Debug, Clone, Default)]
pub struct PrecisionNarrower {
    converter: Float16Converter,
    target: OutputDType,
}

impl PrecisionNarrower {
    pub fn new(converter: Float16Converter, target: OutputDType) -> Self {
        Self { converter, target }
    }

    pub fn target(&self) -> OutputDType {
        self.target
    }
}

impl GraphPass for PrecisionNarrower {
    fn name(&self) -> &str {
        "precision"
    }

    fn run(&self, graph: &mut GraphProto) -> Result<PassStats, PassError> {
        let mut stats = match self.converter.convert(graph)? {
            ConversionOutcome::Converted(stats) => stats,
            ConversionOutcome::ValidationFailed { values } => {
                tracing::warn!(
                    "graph already holds {} float16 value(s) (first: '{}'); retrying with validation relaxed",
                    values.len(),
                    values.first().map(String::as_str).unwrap_or("")
                );
                let mut stats = self.converter.convert_relaxed(graph)?;
                stats.relaxed_retry = true;
                stats
            }
        };

        let casts = reconcile_outputs(graph, self.target)?;
        stats.casts_inserted += casts;
        stats.rewrites += casts;
        Ok(stats)
    }
}
