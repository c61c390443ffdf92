// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the compatibility pipeline.

/// Errors that abort a pipeline run.
///
/// Every variant is raised before the output document is written.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Loading, decoding or saving the document failed.
    #[error("model error: {0}")]
    Model(#[from] model_ir::ModelError),

    /// A stage rejected the graph.
    #[error("pass error: {0}")]
    Pass(#[from] compat_passes::PassError),

    /// The rewritten graph has a dangling or duplicate reference.
    #[error("graph failed structural verification: {0}")]
    Structure(#[source] model_ir::ModelError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
