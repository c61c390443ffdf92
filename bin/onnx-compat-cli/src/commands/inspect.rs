// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `onnx-compat inspect` command: display a model's interface and element types.

use std::path::PathBuf;

pub fn execute(model: PathBuf) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            onnx-compat · Model Inspector             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let doc = model_ir::ModelLoader::load(&model).map_err(|e| {
        anyhow::anyhow!("failed to load model from '{}': {e}", model.display())
    })?;
    let size = std::fs::metadata(&model).map(|m| m.len()).unwrap_or(0);

    // ── Summary ────────────────────────────────────────────────
    let m = doc.model();
    println!("  {}", doc.summary());
    println!(
        "  Producer: {} {}",
        m.producer_name.as_deref().unwrap_or("unknown"),
        m.producer_version.as_deref().unwrap_or("")
    );
    println!("  Size: {}", super::megabytes(size));
    println!();

    // ── Interface ──────────────────────────────────────────────
    println!("  Inputs:");
    for input in doc.inputs() {
        println!("   {input}");
    }
    println!("  Outputs:");
    for output in doc.outputs() {
        println!("   {output}");
    }
    println!();

    // ── Element Types ──────────────────────────────────────────
    println!("  {:<16} {:>8}", "Element type", "Sites");
    println!("  {}", "-".repeat(25));
    for (dtype, count) in doc.dtype_histogram() {
        println!("  {dtype:<16} {count:>8}");
    }
    println!();

    // ── Operators ──────────────────────────────────────────────
    let mut ops: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for node in &doc.graph().node {
        *ops.entry(node.op_type.as_deref().unwrap_or("?")).or_insert(0) += 1;
    }
    println!("  {:<24} {:>8}", "Operator", "Count");
    println!("  {}", "-".repeat(33));
    for (op, count) in ops {
        println!("  {op:<24} {count:>8}");
    }
    println!();
    Ok(())
}
