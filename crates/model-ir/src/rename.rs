// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Indexed value renaming and unique name allocation.
//!
//! [`RenameIndex`] records, for every value name of a graph, which node
//! output slots produce it and which node input slots read it. A rename
//! then rewrites exactly those slots instead of scanning for matching
//! strings, and follows the name into nested subgraphs that read it from
//! the enclosing scope.
//!
//! Graph input and output declarations are never renamed: they are the
//! external contract of the graph.

use crate::protos::onnx::GraphProto;
use crate::sites::walk_graphs;
use std::collections::{HashMap, HashSet};

/// Which references a rename rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameScope {
    /// Only node inputs reading the value (and subgraph references).
    ConsumersOnly,
    /// Producers, consumers, `value_info` entries and initializers.
    Everywhere,
}

/// Producer and consumer slots of every value in one graph.
#[derive(Debug, Default, Clone)]
pub struct RenameIndex {
    /// value → (node, output slot)
    producers: HashMap<String, Vec<(usize, usize)>>,
    /// value → (node, input slot)
    consumers: HashMap<String, Vec<(usize, usize)>>,
    /// value → nodes whose subgraphs read it from the enclosing scope
    captured_by: HashMap<String, Vec<usize>>,
}

impl RenameIndex {
    /// Indexes the nodes of `graph` (not of its subgraphs).
    pub fn build(graph: &GraphProto) -> Self {
        let mut index = Self::default();
        for (n, node) in graph.node.iter().enumerate() {
            for (slot, name) in node.output.iter().enumerate() {
                if !name.is_empty() {
                    index.producers.entry(name.clone()).or_default().push((n, slot));
                }
            }
            for (slot, name) in node.input.iter().enumerate() {
                if !name.is_empty() {
                    index.consumers.entry(name.clone()).or_default().push((n, slot));
                }
            }
            for attr in &node.attribute {
                for body in attr.g.iter().chain(attr.graphs.iter()) {
                    for name in outer_references(body) {
                        let nodes = index.captured_by.entry(name).or_default();
                        if nodes.last() != Some(&n) {
                            nodes.push(n);
                        }
                    }
                }
            }
        }
        index
    }

    /// Returns the node index producing `value`, if a node does.
    pub fn producer(&self, value: &str) -> Option<usize> {
        self.producers
            .get(value)
            .and_then(|slots| slots.first())
            .map(|&(node, _)| node)
    }

    /// Returns every `(node, input slot)` reading `value`.
    pub fn consumers(&self, value: &str) -> &[(usize, usize)] {
        self.consumers.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns `true` if any node reads `value`, directly or from a subgraph.
    pub fn is_consumed(&self, value: &str) -> bool {
        !self.consumers(value).is_empty() || self.is_captured(value)
    }

    /// Returns `true` if a nested subgraph reads `value` from this scope.
    pub fn is_captured(&self, value: &str) -> bool {
        self.captured_by.contains_key(value)
    }

    /// Renames `old` to `new` in `graph`, skipping nodes listed in `exclude`.
    ///
    /// Returns the number of references rewritten. The index is updated
    /// to reflect the new name.
    pub fn rename(
        &mut self,
        graph: &mut GraphProto,
        old: &str,
        new: &str,
        scope: RenameScope,
        exclude: &HashSet<usize>,
    ) -> usize {
        let mut rewritten = 0;

        let consumers = self.consumers.remove(old).unwrap_or_default();
        let (moved, kept): (Vec<_>, Vec<_>) = consumers
            .into_iter()
            .partition(|(node, _)| !exclude.contains(node));
        for &(node, slot) in &moved {
            graph.node[node].input[slot] = new.to_string();
            rewritten += 1;
        }
        if !kept.is_empty() {
            self.consumers.insert(old.to_string(), kept);
        }
        if !moved.is_empty() {
            self.consumers.entry(new.to_string()).or_default().extend(moved);
        }

        if let Some(nodes) = self.captured_by.remove(old) {
            let (moved, kept): (Vec<_>, Vec<_>) =
                nodes.into_iter().partition(|node| !exclude.contains(node));
            for &node in &moved {
                for attr in graph.node[node].attribute.iter_mut() {
                    if let Some(body) = attr.g.as_mut() {
                        rewritten += rename_captured(body, old, new);
                    }
                    for body in attr.graphs.iter_mut() {
                        rewritten += rename_captured(body, old, new);
                    }
                }
            }
            if !kept.is_empty() {
                self.captured_by.insert(old.to_string(), kept);
            }
            if !moved.is_empty() {
                self.captured_by.entry(new.to_string()).or_default().extend(moved);
            }
        }

        if scope == RenameScope::Everywhere {
            if let Some(slots) = self.producers.remove(old) {
                for &(node, slot) in &slots {
                    graph.node[node].output[slot] = new.to_string();
                    rewritten += 1;
                }
                self.producers.entry(new.to_string()).or_default().extend(slots);
            }
            for info in graph.value_info.iter_mut() {
                if info.name.as_deref() == Some(old) {
                    info.name = Some(new.to_string());
                    rewritten += 1;
                }
            }
            for tensor in graph.initializer.iter_mut() {
                if tensor.name.as_deref() == Some(old) {
                    tensor.name = Some(new.to_string());
                    rewritten += 1;
                }
            }
        }
        rewritten
    }
}

/// Names a subgraph reads without defining them itself.
fn outer_references(body: &GraphProto) -> HashSet<String> {
    let mut defined: HashSet<&str> = HashSet::new();
    defined.extend(body.input.iter().filter_map(|v| v.name.as_deref()));
    defined.extend(body.initializer.iter().filter_map(|t| t.name.as_deref()));
    for node in &body.node {
        defined.extend(node.output.iter().map(String::as_str));
    }

    let mut refs = HashSet::new();
    for node in &body.node {
        for name in &node.input {
            if !name.is_empty() && !defined.contains(name.as_str()) {
                refs.insert(name.clone());
            }
        }
        for attr in &node.attribute {
            for inner in attr.g.iter().chain(attr.graphs.iter()) {
                refs.extend(
                    outer_references(inner)
                        .into_iter()
                        .filter(|n| !defined.contains(n.as_str())),
                );
            }
        }
    }
    for info in &body.output {
        if let Some(name) = info.name.as_deref() {
            if !defined.contains(name) {
                refs.insert(name.to_string());
            }
        }
    }
    refs
}

/// Rewrites references to an enclosing-scope value inside a subgraph.
///
/// Stops descending where the subgraph defines its own value of that name.
fn rename_captured(body: &mut GraphProto, old: &str, new: &str) -> usize {
    let shadowed = body.input.iter().any(|v| v.name.as_deref() == Some(old))
        || body.initializer.iter().any(|t| t.name.as_deref() == Some(old))
        || body.node.iter().any(|n| n.output.iter().any(|o| o == old));
    if shadowed {
        return 0;
    }

    let mut rewritten = 0;
    for node in body.node.iter_mut() {
        for name in node.input.iter_mut() {
            if name == old {
                *name = new.to_string();
                rewritten += 1;
            }
        }
        for attr in node.attribute.iter_mut() {
            if let Some(inner) = attr.g.as_mut() {
                rewritten += rename_captured(inner, old, new);
            }
            for inner in attr.graphs.iter_mut() {
                rewritten += rename_captured(inner, old, new);
            }
        }
    }
    for info in body.output.iter_mut() {
        if info.name.as_deref() == Some(old) {
            info.name = Some(new.to_string());
            rewritten += 1;
        }
    }
    rewritten
}

/// Hands out names that do not collide with anything in a graph.
#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    /// Collects every value and node name in `graph` and its subgraphs.
    pub fn for_graph(graph: &GraphProto) -> Self {
        let mut taken = HashSet::new();
        walk_graphs(graph, &mut |g, _| {
            taken.extend(g.input.iter().filter_map(|v| v.name.clone()));
            taken.extend(g.output.iter().filter_map(|v| v.name.clone()));
            taken.extend(g.value_info.iter().filter_map(|v| v.name.clone()));
            taken.extend(g.initializer.iter().filter_map(|t| t.name.clone()));
            for node in &g.node {
                taken.extend(node.input.iter().cloned());
                taken.extend(node.output.iter().cloned());
                taken.extend(node.name.clone());
            }
        });
        taken.remove("");
        Self { taken }
    }

    /// Returns `base` if it is free, otherwise `base_1`, `base_2`, …
    pub fn alloc(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 0usize;
        while self.taken.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    /// Returns `true` if `name` is already in use.
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }
}
