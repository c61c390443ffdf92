// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `onnx-compat check` command: verify a model against the runtime's
//! capabilities. Exits non-zero when any violation is found.

use pipeline::RuntimeCapabilities;
use std::path::PathBuf;

pub fn execute(model: PathBuf) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║          onnx-compat · Capability Checker            ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let doc = model_ir::ModelLoader::load(&model).map_err(|e| {
        anyhow::anyhow!("failed to load model from '{}': {e}", model.display())
    })?;
    let caps = RuntimeCapabilities::sentis();

    let supported: Vec<&str> = caps.supported_dtypes.iter().map(|d| d.as_str()).collect();
    println!("  Model:   {}", model.display());
    println!("  Runtime: {} ({}; rank 0: {})", caps.name, supported.join(", "), caps.supports_rank0);
    println!();

    if let Err(e) = model_ir::verify_references(doc.graph()) {
        anyhow::bail!("graph is structurally invalid: {e}");
    }

    let violations = caps.check(&doc);
    if violations.is_empty() {
        println!("  OK: {} inputs, {} outputs, no violations", doc.inputs().len(), doc.outputs().len());
        println!();
        return Ok(());
    }

    println!("  {} violation(s):", violations.len());
    for v in &violations {
        println!("   - {v}");
    }
    println!();
    anyhow::bail!("model is not compatible with the '{}' runtime", caps.name)
}
