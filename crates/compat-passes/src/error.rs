// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the compatibility passes.

use model_ir::ModelError;
use tensor_core::TensorError;

/// Errors that abort a pass.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// The graph is malformed or a payload cannot be decoded.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A payload could not be converted to the target element type.
    #[error("cannot convert tensor '{value}': {source}")]
    Conversion {
        value: String,
        #[source]
        source: TensorError,
    },

    /// A dtype-bearing attribute names an element type outside the known set.
    #[error("node '{node}' ({op_type}): attribute '{attribute}' names unknown element type {code}")]
    UnsupportedAttributeType {
        node: String,
        op_type: String,
        attribute: String,
        code: i64,
    },

    /// A graph output is the same value as a graph input and cannot be re-typed alone.
    #[error("graph output '{output}' is also a graph input; cannot insert a boundary cast")]
    OutputAliasesInput { output: String },
}
