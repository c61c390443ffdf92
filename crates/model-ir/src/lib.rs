// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! The serialized computation-graph document and the editing primitives the
//! compatibility passes are built on.
//!
//! - [`protos`] — wire-compatible messages for the ONNX document, so a
//!   load → save round trip preserves every field.
//! - [`ModelDocument`] — the decoded document with a **type-state pattern**
//!   (`Loaded` → `Validated`).
//! - [`sites`] — one visitor over every place that declares an element type.
//! - [`RenameIndex`] / [`NameAllocator`] — indexed rename + redirect and
//!   collision-free naming for inserted nodes.
//! - [`verify_references`] — the "every input resolves" structural check.
//! - [`ModelLoader`] / [`ModelWriter`] — memory-mapped loading, atomic saving.
//!
//! # Example
//! ```no_run
//! use model_ir::{ModelLoader, ModelWriter};
//! use std::path::Path;
//!
//! let doc = ModelLoader::load(Path::new("./model.onnx")).unwrap();
//! println!("{}", doc.summary());
//! for input in doc.inputs() {
//!     println!("  {input}");
//! }
//! ModelWriter::save(&doc, Path::new("./copy.onnx")).unwrap();
//! ```

mod check;
pub mod document;
mod error;
pub mod helpers;
mod loader;
pub mod protos;
mod rename;
pub mod sites;
pub mod tensor;
mod writer;

pub use check::verify_references;
pub use document::{ModelDocument, ValueDescription};
pub use error::ModelError;
pub use loader::ModelLoader;
pub use rename::{NameAllocator, RenameIndex, RenameScope};
pub use sites::{NodeRef, ValueSite, ValueSiteMut};
pub use writer::ModelWriter;
