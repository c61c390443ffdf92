// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Structural reference checks.
//!
//! Every node input must resolve to a graph input, an initializer or the
//! output of another node, either in the same graph or in an enclosing
//! one. Every value must be produced at most once.

use crate::helpers::node_name;
use crate::protos::onnx::GraphProto;
use crate::ModelError;
use std::collections::HashSet;

/// Verifies that no reference in `graph` (or its subgraphs) dangles and
/// that no value is defined twice.
pub fn verify_references(graph: &GraphProto) -> Result<(), ModelError> {
    verify_scope(graph, &HashSet::new())
}

fn verify_scope(graph: &GraphProto, outer: &HashSet<String>) -> Result<(), ModelError> {
    let mut defined: HashSet<String> = HashSet::new();
    // Initializers may legitimately repeat an input name.
    for name in graph
        .input
        .iter()
        .filter_map(|v| v.name.clone())
        .chain(graph.initializer.iter().filter_map(|t| t.name.clone()))
        .chain(
            graph
                .sparse_initializer
                .iter()
                .filter_map(|s| s.values.as_ref().and_then(|v| v.name.clone())),
        )
    {
        defined.insert(name);
    }

    for node in &graph.node {
        for output in node.output.iter().filter(|o| !o.is_empty()) {
            if !defined.insert(output.clone()) {
                return Err(ModelError::DuplicateDefinition {
                    value: output.clone(),
                });
            }
        }
    }

    let resolves = |name: &str| defined.contains(name) || outer.contains(name);

    for node in &graph.node {
        for input in node.input.iter().filter(|i| !i.is_empty()) {
            if !resolves(input.as_str()) {
                return Err(ModelError::DanglingReference {
                    node: node_name(node).to_string(),
                    value: input.clone(),
                });
            }
        }
    }
    for output in &graph.output {
        let name = output.name.as_deref().unwrap_or("");
        if !resolves(name) {
            return Err(ModelError::DanglingReference {
                node: "<graph output>".to_string(),
                value: name.to_string(),
            });
        }
    }

    let mut visible = outer.clone();
    visible.extend(defined.iter().cloned());
    for node in &graph.node {
        for attr in &node.attribute {
            for body in attr.g.iter().chain(attr.graphs.iter()) {
                verify_scope(body, &visible)?;
            }
        }
    }
    Ok(())
}
