// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Output dtype reconciliation.
//!
//! After narrowing, every declared float graph output must carry exactly
//! the caller's target element type. For each output that does not, the
//! value is renamed to an internal alias (every producer, consumer,
//! annotation and initializer follows it) and a trailing `Cast` re-creates
//! the value under its original external name.

use super::OutputDType;
use crate::PassError;
use model_ir::helpers::{
    make_cast_node, retyped_value_info, set_tensor_elem_type, tensor_dtype, value_name,
};
use model_ir::protos::onnx::GraphProto;
use model_ir::{ModelError, NameAllocator, RenameIndex, RenameScope};
use std::collections::HashSet;
use tensor_core::DType;

/// Casts every float graph output to `target`, returning the number of
/// casts inserted.
pub fn reconcile_outputs(graph: &mut GraphProto, target: OutputDType) -> Result<usize, PassError> {
    let target_dtype = target.dtype();
    let input_names: HashSet<String> = graph.input.iter().map(|v| value_name(v).to_string()).collect();
    let mut index = RenameIndex::build(graph);
    let mut names = NameAllocator::for_graph(graph);
    let mut casts = Vec::new();
    let mut infos = Vec::new();

    for i in 0..graph.output.len() {
        let Some(current) = tensor_dtype(&graph.output[i]) else {
            continue;
        };
        if !matches!(current, DType::F16 | DType::F32) || current == target_dtype {
            continue;
        }
        let name = value_name(&graph.output[i]).to_string();
        if input_names.contains(&name) {
            return Err(PassError::OutputAliasesInput { output: name });
        }
        let from_initializer = graph
            .initializer
            .iter()
            .any(|t| t.name.as_deref() == Some(name.as_str()));
        if index.producer(&name).is_none() && !from_initializer {
            return Err(ModelError::DanglingReference {
                node: "<graph output>".to_string(),
                value: name,
            }
            .into());
        }

        let suffix = if current == DType::F16 { "fp16" } else { "fp32" };
        let alias = names.alloc(&format!("{name}_{suffix}"));
        index.rename(graph, &name, &alias, RenameScope::Everywhere, &HashSet::new());

        let cast_name = names.alloc(&format!("{name}_output_cast"));
        casts.push(make_cast_node(&cast_name, &alias, &name, target_dtype));
        if !graph.value_info.iter().any(|v| value_name(v) == alias) {
            infos.push(retyped_value_info(&graph.output[i], &alias, current));
        }
        set_tensor_elem_type(&mut graph.output[i], target_dtype);
        tracing::info!("output '{name}': {current} -> {target_dtype} via '{cast_name}'");
    }

    let inserted = casts.len();
    graph.node.extend(casts);
    graph.value_info.extend(infos);
    Ok(inserted)
}
