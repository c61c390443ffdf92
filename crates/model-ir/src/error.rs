// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for loading, inspecting and saving graph documents.

use std::path::PathBuf;

/// Errors that can occur when working with graph documents.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The document could not be read or written.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not a valid protobuf-encoded model.
    #[error("failed to decode model: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The document is missing a required collection or is otherwise malformed.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// A tensor payload cannot be decoded under its declared type tag.
    #[error("malformed tensor '{name}': {source}")]
    MalformedTensor {
        name: String,
        #[source]
        source: tensor_core::TensorError,
    },

    /// A tensor stores its payload outside the document.
    #[error("tensor '{name}' stores its data externally; external data is not supported")]
    ExternalData { name: String },

    /// A node reads a value that nothing defines.
    #[error("node '{node}' reads undefined value '{value}'")]
    DanglingReference { node: String, value: String },

    /// Two definitions produce the same value name.
    #[error("value '{value}' is defined more than once")]
    DuplicateDefinition { value: String },
}

impl ModelError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::Io {
            path: path.into(),
            source,
        }
    }
}
