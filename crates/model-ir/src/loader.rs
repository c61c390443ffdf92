// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Loading graph documents from disk.
//!
//! The file is memory-mapped and decoded straight from the mapping, so the
//! encoded bytes are never copied into a separate buffer before decoding.

use crate::document::{ModelDocument, Validated};
use crate::protos::onnx::ModelProto;
use crate::ModelError;
use prost::Message;
use std::path::Path;

/// Loads a document from disk into a validated [`ModelDocument`].
///
/// # Example
/// ```no_run
/// use model_ir::ModelLoader;
/// use std::path::Path;
///
/// let doc = ModelLoader::load(Path::new("./model.onnx")).unwrap();
/// println!("{}", doc.summary());
/// ```
pub struct ModelLoader;

impl ModelLoader {
    /// Reads, decodes and validates the document at `path`.
    pub fn load(path: &Path) -> Result<ModelDocument<Validated>, ModelError> {
        let file = std::fs::File::open(path).map_err(|e| ModelError::io(path, e))?;

        // An empty file cannot be mapped on every platform; it also cannot
        // hold a graph, so let validation report it.
        let len = file.metadata().map_err(|e| ModelError::io(path, e))?.len();
        if len == 0 {
            return Self::from_bytes(&[]);
        }

        // SAFETY: the mapping is read-only and dropped before this function
        // returns; the decoded document owns all of its data.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| ModelError::io(path, e))?;
        let doc = Self::from_bytes(&mmap)?;
        tracing::debug!(
            "loaded '{}' ({:.2} MB): {}",
            path.display(),
            len as f64 / (1024.0 * 1024.0),
            doc.summary()
        );
        Ok(doc)
    }

    /// Decodes and validates a document held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<ModelDocument<Validated>, ModelError> {
        let model = ModelProto::decode(bytes)?;
        ModelDocument::new(model).validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{make_node, tensor_value_info};
    use crate::protos::onnx::GraphProto;
    use tensor_core::{DType, Shape};

    #[test]
    fn test_load_from_file() {
        let model = ModelProto {
            ir_version: Some(8),
            graph: Some(GraphProto {
                input: vec![tensor_value_info("x", DType::F32, &Shape::fixed(&[1]))],
                output: vec![tensor_value_info("y", DType::F32, &Shape::fixed(&[1]))],
                node: vec![make_node("Relu", "r", &["x"], &["y"], vec![])],
                ..Default::default()
            }),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.onnx");
        std::fs::write(&path, model.encode_to_vec()).unwrap();

        let doc = ModelLoader::load(&path).unwrap();
        assert_eq!(doc.model(), &model);
    }

    #[test]
    fn test_missing_file() {
        let err = ModelLoader::load(Path::new("/nonexistent/model.onnx")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.onnx");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            ModelLoader::load(&path),
            Err(ModelError::MalformedGraph(_))
        ));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            ModelLoader::from_bytes(&[0xff, 0xff, 0xff]),
            Err(ModelError::Decode(_))
        ));
    }
}
