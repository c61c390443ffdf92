// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Atomic saving of graph documents.
//!
//! The document is encoded fully in memory, written to a temporary file in
//! the destination directory and renamed over the destination. A failure at
//! any step leaves an existing destination file untouched and no partial
//! file behind.

use crate::document::{ModelDocument, Validated};
use crate::ModelError;
use std::io::Write;
use std::path::Path;

/// Writes documents to disk.
pub struct ModelWriter;

impl ModelWriter {
    /// Encodes and atomically saves `doc` to `path`, returning the size in bytes.
    pub fn save(doc: &ModelDocument<Validated>, path: &Path) -> Result<u64, ModelError> {
        let bytes = doc.encode_to_vec();
        Self::save_bytes(&bytes, path)?;
        Ok(bytes.len() as u64)
    }

    /// Atomically writes already-encoded bytes to `path`.
    pub fn save_bytes(bytes: &[u8], path: &Path) -> Result<(), ModelError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ModelError::io(dir, e))?;
        tmp.write_all(bytes).map_err(|e| ModelError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| ModelError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| ModelError::io(path, e.error))?;

        tracing::info!(
            "saved '{}' ({:.2} MB)",
            path.display(),
            bytes.len() as f64 / (1024.0 * 1024.0)
        );
        Ok(())
    }
}
