// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # compat-passes
//!
//! Rewrites that make an exported graph runnable on an embedded runtime
//! supporting only a narrow set of element types and no rank-0 tensors.
//!
//! # Passes
//!
//! | Pass | Rewrites | Inserts nodes |
//! |---|---|---|
//! | [`IntWidthNormalizer`] | every `int64` declaration, payload and cast target → `int32` | no |
//! | [`RankNormalizer`] | rank-0 graph inputs → shape `[1]` | no |
//! | [`PrecisionNarrower`] | `float32` payloads and annotations → `float16` | boundary and block-list casts |
//!
//! # Trait-Based Composition
//!
//! All passes implement [`GraphPass`] and mutate the graph in place, so a
//! caller can run any subset in order:
//!
//! ```ignore
//! struct MyPass;
//! impl GraphPass for MyPass {
//!     fn name(&self) -> &str { "my-pass" }
//!     fn run(&self, graph: &mut GraphProto) -> Result<PassStats, PassError> { /* ... */ }
//! }
//! ```

mod error;
pub mod int_width;
mod payload;
pub mod precision;
pub mod rank;

pub use error::PassError;
pub use int_width::IntWidthNormalizer;
pub use precision::{
    reconcile_outputs, ConversionOutcome, Float16Converter, OutputDType, PrecisionNarrower,
    DEFAULT_OP_BLOCK_LIST,
};
pub use rank::RankNormalizer;

use model_ir::protos::onnx::GraphProto;
use serde::Serialize;

/// What a pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Number of rewritten occurrences (declarations, payloads, attributes).
    pub rewrites: usize,
    /// Number of payload elements changed by the fp16 clamp.
    pub clamped: usize,
    /// Number of `Cast` nodes inserted.
    pub casts_inserted: usize,
    /// Whether the precision conversion had to run with validation relaxed.
    pub relaxed_retry: bool,
}

impl PassStats {
    /// Returns `true` if the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.rewrites == 0 && self.casts_inserted == 0
    }
}

/// A rewrite applied in place to a graph.
///
/// Passes are purely structural — no I/O — and leave the graph in a state
/// the next pass can consume. On error the graph must be discarded.
pub trait GraphPass: Send + Sync {
    /// Human-readable name of this pass.
    fn name(&self) -> &str;

    /// Rewrites `graph` in place.
    fn run(&self, graph: &mut GraphProto) -> Result<PassStats, PassError>;
}
