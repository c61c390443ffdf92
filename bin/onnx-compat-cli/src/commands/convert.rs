// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `onnx-compat convert` command: run the compatibility pipeline on a file.
//!
//! Walks the type-state pipeline stage by stage so progress can be shown:
//! ```text
//! CompatPipeline<Parsed> → int-width → rank → precision → serialize
//! ```

use crate::ConvertFlags;
use anyhow::Context;
use pipeline::{CompatConfig, CompatPipeline, PipelineReport, StageStatus};
use std::path::{Path, PathBuf};

pub fn execute(
    config_path: Option<PathBuf>,
    input: PathBuf,
    output: PathBuf,
    flags: ConvertFlags,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            onnx-compat · Model Converter             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Configuration ──────────────────────────────────────────
    let mut config = match &config_path {
        Some(path) => CompatConfig::from_file(path)?,
        None => CompatConfig::default(),
    };
    apply_flags(&mut config, &flags);
    config.validate()?;
    tracing::debug!("effective config: {config:?}");

    println!("  Config:");
    println!("   Input:          {}", input.display());
    println!("   Output:         {}", output.display());
    println!("   int64 -> int32: {}", enabled(!config.skip_int_normalization));
    println!("   [] -> [1]:      {}", enabled(!config.skip_rank_normalization));
    println!("   float16:        {}", enabled(!config.skip_precision_narrowing));
    if !config.skip_precision_narrowing {
        println!("   Keep IO types:  {}", config.preserve_boundary_dtypes);
        println!("   Output dtype:   {}", config.target_output_dtype);
    }
    println!();

    // ── Load ───────────────────────────────────────────────────
    let doc = model_ir::ModelLoader::load(&input)
        .with_context(|| format!("failed to load model from '{}'", input.display()))?;
    let input_size = std::fs::metadata(&input).map(|m| m.len()).unwrap_or(0);
    println!("  {}", doc.summary());
    println!("  Input size: {}", super::megabytes(input_size));
    println!();

    // ── Type-State Pipeline ────────────────────────────────────
    println!("  [1/3] Integer width...");
    let stage = CompatPipeline::new(doc, config).normalize_int_width()?;
    print_stage(stage.report());

    println!("  [2/3] Scalar inputs...");
    let stage = stage.normalize_rank()?;
    print_stage(stage.report());

    println!("  [3/3] Precision...");
    let stage = stage.narrow_precision()?;
    print_stage(stage.report());

    let report = stage
        .serialize(&output)
        .with_context(|| format!("conversion to '{}' failed; nothing was written", output.display()))?;

    // ── Results ────────────────────────────────────────────────
    println!("  {}", report.summary());
    if let Some(bytes) = report.output_bytes {
        println!("  Saved: {} ({})", output.display(), super::megabytes(bytes));
    }
    println!();

    if let Some(path) = report_path {
        write_report(&report, &path)?;
        println!("  Report written to {}", path.display());
    }
    Ok(())
}

/// Overlays command-line toggles on a loaded configuration.
fn apply_flags(config: &mut CompatConfig, flags: &ConvertFlags) {
    config.skip_int_normalization |= flags.no_int32;
    config.skip_precision_narrowing |= flags.no_fp16;
    config.skip_rank_normalization |= flags.no_rank_fix;
    if flags.no_keep_io_types {
        config.preserve_boundary_dtypes = false;
    }
    if let Some(dtype) = flags.output_dtype {
        config.target_output_dtype = dtype;
    }
    config.check_int32_range |= flags.check_range;
}

fn print_stage(report: &PipelineReport) {
    let Some(stage) = report.stages.last() else {
        return;
    };
    match stage.status {
        StageStatus::Skipped => println!("        skipped"),
        StageStatus::Applied => {
            println!(
                "        Converted {} occurrence(s), {} cast(s) inserted ({:.2}ms)",
                stage.stats.rewrites,
                stage.stats.casts_inserted,
                stage.duration.as_secs_f64() * 1000.0
            );
            if stage.stats.clamped > 0 {
                println!("        {} value(s) clamped into the float16 range", stage.stats.clamped);
            }
            if stage.stats.relaxed_retry {
                println!("        (graph was partly float16 already; converted with validation relaxed)");
            }
        }
    }
    println!();
}

fn write_report(report: &PipelineReport, path: &Path) -> anyhow::Result<()> {
    let json = report.to_json().context("failed to serialise report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to '{}'", path.display()))
}

fn enabled(on: bool) -> &'static str {
    if on {
        "yes"
    } else {
        "skipped"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compat_passes::OutputDType;

    #[test]
    fn test_flags_override_config() {
        let mut config = CompatConfig::default();
        let flags = ConvertFlags {
            no_fp16: true,
            no_keep_io_types: true,
            output_dtype: Some(OutputDType::Float16),
            ..Default::default()
        };
        apply_flags(&mut config, &flags);
        assert!(config.skip_precision_narrowing);
        assert!(!config.preserve_boundary_dtypes);
        assert!(!config.skip_int_normalization);
        assert_eq!(config.target_output_dtype, OutputDType::Float16);
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let mut config = CompatConfig {
            skip_int_normalization: true,
            target_output_dtype: OutputDType::Float16,
            ..Default::default()
        };
        apply_flags(&mut config, &ConvertFlags::default());
        assert!(config.skip_int_normalization);
        assert_eq!(config.target_output_dtype, OutputDType::Float16);
        assert!(config.preserve_boundary_dtypes);
    }
}
