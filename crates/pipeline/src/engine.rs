// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compatibility pipeline with type-state–enforced stage ordering.
//!
//! ```text
//! CompatPipeline<Parsed>
//!     │  .normalize_int_width()
//!     ▼
//! CompatPipeline<IntWidthNormalized>
//!     │  .normalize_rank()
//!     ▼
//! CompatPipeline<RankNormalized>
//!     │  .narrow_precision()
//!     ▼
//! CompatPipeline<PrecisionNarrowed>
//!     │  .serialize(path)  /  .finish()
//!     ▼
//!   PipelineReport
//! ```
//!
//! Each transition consumes the old value. A stage disabled by
//! configuration still performs its transition, recording itself as
//! skipped, so the order of the remaining stages cannot change.

use crate::{CompatConfig, PipelineError, PipelineReport};
use compat_passes::{GraphPass, RankNormalizer};
use model_ir::document::Validated;
use model_ir::{verify_references, ModelDocument, ModelLoader, ModelWriter};
use std::marker::PhantomData;
use std::path::Path;
use std::time::{Duration, Instant};

// ── Type-state markers ─────────────────────────────────────────

/// The document has been decoded and validated.
#[derive(Debug)]
pub struct Parsed;

/// No value declares `int64` (unless the stage was skipped).
#[derive(Debug)]
pub struct IntWidthNormalized;

/// No graph input is rank 0 (unless the stage was skipped).
#[derive(Debug)]
pub struct RankNormalized;

/// The graph runs at `float16` internally (unless the stage was skipped).
#[derive(Debug)]
pub struct PrecisionNarrowed;

/// Sealed trait for pipeline states.
pub trait PipelineState: std::fmt::Debug {}
impl PipelineState for Parsed {}
impl PipelineState for IntWidthNormalized {}
impl PipelineState for RankNormalized {}
impl PipelineState for PrecisionNarrowed {}

// ── Pipeline ───────────────────────────────────────────────────

/// A single compatibility run over one document.
///
/// # Example
/// ```no_run
/// use model_ir::ModelLoader;
/// use pipeline::{CompatConfig, CompatPipeline};
/// use std::path::Path;
///
/// # fn example() -> Result<(), pipeline::PipelineError> {
/// let doc = ModelLoader::load(Path::new("model.onnx"))?;
/// let report = CompatPipeline::new(doc, CompatConfig::default())
///     .normalize_int_width()?
///     .normalize_rank()?
///     .narrow_precision()?
///     .serialize(Path::new("model_fp16.onnx"))?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CompatPipeline<S: PipelineState = Parsed> {
    config: CompatConfig,
    doc: ModelDocument<Validated>,
    report: PipelineReport,
    started: Instant,
    _state: PhantomData<S>,
}

impl<S: PipelineState> CompatPipeline<S> {
    /// The document in its current state.
    pub fn document(&self) -> &ModelDocument<Validated> {
        &self.doc
    }

    /// Stages recorded so far.
    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    pub fn config(&self) -> &CompatConfig {
        &self.config
    }

    /// Runs `pass` unless `skip` is set, then moves to state `T`.
    fn stage<P: GraphPass, T: PipelineState>(
        mut self,
        pass: &P,
        skip: bool,
    ) -> Result<CompatPipeline<T>, PipelineError> {
        if skip {
            tracing::info!("stage '{}' skipped", pass.name());
            self.report.record_skipped(pass.name());
        } else {
            let start = Instant::now();
            let stats = pass.run(self.doc.graph_mut())?;
            let elapsed = start.elapsed();
            tracing::info!(
                "stage '{}': {} rewrites, {} casts inserted ({:.2}ms)",
                pass.name(),
                stats.rewrites,
                stats.casts_inserted,
                elapsed.as_secs_f64() * 1000.0
            );
            self.report.record_applied(pass.name(), stats, elapsed);
        }

        Ok(CompatPipeline {
            config: self.config,
            doc: self.doc,
            report: self.report,
            started: self.started,
            _state: PhantomData,
        })
    }
}

// ── Parsed → IntWidthNormalized ────────────────────────────────

impl CompatPipeline<Parsed> {
    /// Starts a run over a validated document.
    pub fn new(doc: ModelDocument<Validated>, config: CompatConfig) -> Self {
        tracing::debug!("pipeline started: {}", doc.summary());
        Self {
            config,
            doc,
            report: PipelineReport::new(),
            started: Instant::now(),
            _state: PhantomData,
        }
    }

    /// Rewrites every `int64` site to `int32`.
    pub fn normalize_int_width(self) -> Result<CompatPipeline<IntWidthNormalized>, PipelineError> {
        let pass = self.config.int_width_normalizer();
        let skip = self.config.skip_int_normalization;
        self.stage(&pass, skip)
    }
}

// ── IntWidthNormalized → RankNormalized ────────────────────────

impl CompatPipeline<IntWidthNormalized> {
    /// Promotes scalar graph inputs to shape `[1]`.
    pub fn normalize_rank(self) -> Result<CompatPipeline<RankNormalized>, PipelineError> {
        let skip = self.config.skip_rank_normalization;
        self.stage(&RankNormalizer::new(), skip)
    }
}

// ── RankNormalized → PrecisionNarrowed ─────────────────────────

impl CompatPipeline<RankNormalized> {
    /// Narrows the graph to `float16` and reconciles its outputs.
    pub fn narrow_precision(self) -> Result<CompatPipeline<PrecisionNarrowed>, PipelineError> {
        let pass = self.config.precision_narrower();
        let skip = self.config.skip_precision_narrowing;
        self.stage(&pass, skip)
    }
}

// ── PrecisionNarrowed: finish / serialize ──────────────────────

impl CompatPipeline<PrecisionNarrowed> {
    /// Verifies the final graph and returns it with the report.
    pub fn finish(mut self) -> Result<(ModelDocument<Validated>, PipelineReport), PipelineError> {
        if self.config.verify_structure {
            verify_references(self.doc.graph()).map_err(PipelineError::Structure)?;
            self.report.structure_verified = true;
            tracing::debug!("structural verification passed");
        }
        self.report.total_duration = self.started.elapsed();
        Ok((self.doc, self.report))
    }

    /// Verifies the final graph and atomically writes it to `path`.
    ///
    /// Nothing is written unless every enabled stage and the verification
    /// succeeded.
    pub fn serialize(self, path: &Path) -> Result<PipelineReport, PipelineError> {
        let (doc, mut report) = self.finish()?;
        let start = Instant::now();
        let bytes = ModelWriter::save(&doc, path)?;
        report.output_bytes = Some(bytes);
        report.total_duration += start.elapsed();
        Ok(report)
    }
}

/// Runs every enabled stage over an in-memory document.
pub fn run_document(
    doc: ModelDocument<Validated>,
    config: &CompatConfig,
) -> Result<(ModelDocument<Validated>, PipelineReport), PipelineError> {
    config.validate()?;
    CompatPipeline::new(doc, config.clone())
        .normalize_int_width()?
        .normalize_rank()?
        .narrow_precision()?
        .finish()
}

/// Loads `input`, runs every enabled stage and writes the result to `output`.
pub fn run_file(
    config: &CompatConfig,
    input: &Path,
    output: &Path,
) -> Result<PipelineReport, PipelineError> {
    config.validate()?;
    let load_start = Instant::now();
    let doc = ModelLoader::load(input)?;
    tracing::info!("{}", doc.summary());
    let load_time: Duration = load_start.elapsed();

    let mut report = CompatPipeline::new(doc, config.clone())
        .normalize_int_width()?
        .normalize_rank()?
        .narrow_precision()?
        .serialize(output)?;
    report.total_duration += load_time;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StageStatus;
    use model_ir::helpers::{make_node, tensor_dtype, tensor_value_info};
    use model_ir::protos::onnx::{GraphProto, ModelProto};
    use tensor_core::{DType, Shape};

    fn doc() -> ModelDocument<Validated> {
        let graph = GraphProto {
            input: vec![
                tensor_value_info("x", DType::F32, &Shape::fixed(&[4])),
                tensor_value_info("t", DType::F32, &Shape::scalar()),
            ],
            output: vec![
                tensor_value_info("y", DType::F32, &Shape::fixed(&[4])),
                tensor_value_info("n", DType::I64, &Shape::fixed(&[1])),
            ],
            node: vec![
                make_node("Mul", "mul", &["x", "t"], &["y"], vec![]),
                make_node("Shape", "shape", &["y"], &["n"], vec![]),
            ],
            ..Default::default()
        };
        let model = ModelProto {
            ir_version: Some(8),
            graph: Some(graph),
            ..Default::default()
        };
        ModelDocument::new(model).validate().unwrap()
    }

    #[test]
    fn test_full_transition_chain() {
        let (out, report) = CompatPipeline::new(doc(), CompatConfig::default())
            .normalize_int_width()
            .unwrap()
            .normalize_rank()
            .unwrap()
            .narrow_precision()
            .unwrap()
            .finish()
            .unwrap();

        let names: Vec<_> = report.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(names, vec!["int-width", "rank", "precision"]);
        assert!(report.structure_verified);
        assert_eq!(tensor_dtype(&out.graph().output[1]), Some(DType::I32));
        assert_eq!(tensor_dtype(&out.graph().output[0]), Some(DType::F32));
    }

    #[test]
    fn test_skipped_stages_keep_order() {
        let config = CompatConfig {
            skip_int_normalization: true,
            skip_precision_narrowing: true,
            ..Default::default()
        };
        let (out, report) = run_document(doc(), &config).unwrap();
        let statuses: Vec<_> = report.stages.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StageStatus::Skipped, StageStatus::Applied, StageStatus::Skipped]
        );
        assert_eq!(tensor_dtype(&out.graph().output[1]), Some(DType::I64));
        assert_eq!(out.graph().node.len(), 2);
    }

    #[test]
    fn test_dangling_reference_blocks_finish() {
        let mut d = doc();
        d.graph_mut().node[1].input = vec!["missing".into()];
        let config = CompatConfig {
            skip_precision_narrowing: true,
            ..Default::default()
        };
        let result = run_document(d, &config);
        assert!(matches!(result, Err(PipelineError::Structure(_))));
    }

    #[test]
    fn test_verification_can_be_disabled() {
        let mut d = doc();
        d.graph_mut().node[1].input = vec!["missing".into()];
        let config = CompatConfig {
            verify_structure: false,
            skip_precision_narrowing: true,
            ..Default::default()
        };
        let (_, report) = run_document(d, &config).unwrap();
        assert!(!report.structure_verified);
    }
}
