// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # pipeline
//!
//! Composes the compatibility passes into one run over a graph document.
//!
//! The pipeline takes:
//! - A validated `ModelDocument` from `model-ir`.
//! - A [`CompatConfig`] selecting stages and their options.
//!
//! And applies, in order, integer-width normalization, rank normalization
//! and precision narrowing, then verifies and atomically writes the result.
//! A failing stage aborts the run before anything is written.
//!
//! # Type-State Pipeline
//! ```text
//! CompatPipeline<Parsed> → <IntWidthNormalized> → <RankNormalized> → <PrecisionNarrowed>
//! ```
//! Transitions are compile-time checked; a disabled stage is recorded as
//! skipped but still occupies its place in the sequence.
//!
//! [`RuntimeCapabilities`] describes what a downstream runtime accepts and
//! checks a document against it.

mod capabilities;
mod config;
mod engine;
mod error;
mod report;

pub use capabilities::{RuntimeCapabilities, Violation};
pub use config::CompatConfig;
pub use engine::{
    run_document, run_file, CompatPipeline, IntWidthNormalized, Parsed, PipelineState,
    PrecisionNarrowed, RankNormalized,
};
pub use error::PipelineError;
pub use report::{PipelineReport, StageReport, StageStatus};
