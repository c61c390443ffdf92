// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The `float32` → `float16` graph converter.
//!
//! Conversion runs in four steps over the top-level graph:
//!
//! 1. **Boundary adapters** (keep-IO-types): each `float32` input is
//!    redirected through `Cast(to=FLOAT16)`, each `float32` output is
//!    produced by `Cast(to=FLOAT)` from a renamed internal value.
//! 2. **Site conversion**: `float32` payloads, annotations and cast
//!    targets become `float16` (subgraphs included). `Constant`
//!    `value_float(s)` become a `float16` `value` tensor.
//! 3. **Block-list adapters**: nodes that must stay at `float32` get an
//!    upcast on each half-precision input and a downcast on each float
//!    output.
//! 4. **Assembly**: input adapters first, block-list adapters around their
//!    node, output adapters last, so the node list stays topologically
//!    ordered.
//!
//! A graph that already contains `float16` values fails readiness
//! validation with [`ConversionOutcome::ValidationFailed`] before anything
//! is mutated.

use crate::payload::narrow_float32_tensor;
use crate::{PassError, PassStats};
use model_ir::helpers::{
    attribute_name, elem_types, elem_types_mut, find_attribute, is_default_domain,
    make_cast_node, node_name, op_type, retyped_value_info, tensor_attribute, tensor_dtype,
    value_name,
};
use model_ir::protos::onnx::{GraphProto, NodeProto, TypeProto, ValueInfoProto};
use model_ir::sites::{
    constant_attribute_dtype, constant_attribute_tensor, is_op, visit_sites, visit_sites_mut,
    ValueSite, ValueSiteMut,
};
use model_ir::tensor::{has_dtype, tensor_name};
use model_ir::{NameAllocator, RenameIndex, RenameScope};
use std::collections::HashSet;
use std::convert::Infallible;
use tensor_core::{DType, Fp16Clamp};

/// Operation kinds kept at `float32` unless configured otherwise.
pub const DEFAULT_OP_BLOCK_LIST: &[&str] = &[
    "ArrayFeatureExtractor",
    "Binarizer",
    "CastMap",
    "CategoryMapper",
    "DictVectorizer",
    "FeatureVectorizer",
    "Imputer",
    "LabelEncoder",
    "LinearClassifier",
    "LinearRegressor",
    "Normalizer",
    "OneHotEncoder",
    "RandomUniformLike",
    "SVMClassifier",
    "SVMRegressor",
    "Scaler",
    "TreeEnsembleClassifier",
    "TreeEnsembleRegressor",
    "ZipMap",
    "NonMaxSuppression",
    "TopK",
    "RoiAlign",
    "Resize",
    "Range",
    "CumSum",
    "Min",
    "Max",
    "Upsample",
];

/// Blocked kinds whose float outputs follow their first input's type
/// when no annotation says otherwise.
const FLOAT_PRESERVING_OPS: &[&str] = &["CumSum", "Max", "Min", "Resize", "RoiAlign", "TopK", "Upsample"];

/// Result of a validated conversion attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    /// The graph was converted.
    Converted(PassStats),
    /// The graph already holds `float16` values; nothing was changed.
    ValidationFailed { values: Vec<String> },
}

/// Converts `float32` graphs to `float16`.
#[derive(Debug, Clone)]
pub struct Float16Converter {
    keep_io_types: bool,
    clamp: Option<Fp16Clamp>,
    op_block_list: HashSet<String>,
    node_block_list: HashSet<String>,
}

impl Default for Float16Converter {
    fn default() -> Self {
        Self {
            keep_io_types: true,
            clamp: Some(Fp16Clamp::default()),
            op_block_list: DEFAULT_OP_BLOCK_LIST.iter().map(|s| s.to_string()).collect(),
            node_block_list: HashSet::new(),
        }
    }
}

impl Float16Converter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `float32` graph inputs and outputs by inserting boundary casts.
    pub fn keep_io_types(mut self, keep: bool) -> Self {
        self.keep_io_types = keep;
        self
    }

    /// Sets the clamp applied to payloads before rounding; `None` disables it.
    pub fn clamp(mut self, clamp: Option<Fp16Clamp>) -> Self {
        self.clamp = clamp;
        self
    }

    /// Replaces the operation kinds kept at `float32`.
    pub fn op_block_list<I, S>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.op_block_list = ops.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the node names kept at `float32`.
    pub fn node_block_list<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_block_list = nodes.into_iter().map(Into::into).collect();
        self
    }

    fn is_blocked(&self, node: &NodeProto) -> bool {
        self.op_block_list.contains(op_type(node)) || self.node_block_list.contains(node_name(node))
    }

    /// Lists every value that is already `float16`.
    pub fn readiness(&self, graph: &GraphProto) -> Vec<String> {
        let f16 = DType::F16.code();
        let mut values = Vec::new();
        let _ = visit_sites::<Infallible, _>(graph, &mut |site, _| {
            match site {
                ValueSite::GraphInput(info) | ValueSite::GraphOutput(info) | ValueSite::ValueInfo(info) => {
                    if info.r#type.as_ref().is_some_and(|t| elem_types(t).contains(&f16)) {
                        values.push(value_name(info).to_string());
                    }
                }
                ValueSite::Initializer(t) => {
                    if has_dtype(t, DType::F16) {
                        values.push(tensor_name(t).to_string());
                    }
                }
                ValueSite::AttributeTensor { node, tensor } => {
                    if has_dtype(tensor, DType::F16) {
                        values.push(format!("{}.{}", node.name, tensor_name(tensor)));
                    }
                }
                ValueSite::SparseInitializer(s) | ValueSite::AttributeSparseTensor { tensor: s, .. } => {
                    if let Some(v) = s.values.as_ref().filter(|v| has_dtype(v, DType::F16)) {
                        values.push(tensor_name(v).to_string());
                    }
                }
                ValueSite::DTypeAttribute { .. }
                | ValueSite::AttributeType { .. }
                | ValueSite::ConstantAttribute { .. } => {}
            }
            Ok(())
        });
        values
    }

    /// Validates readiness, then converts.
    pub fn convert(&self, graph: &mut GraphProto) -> Result<ConversionOutcome, PassError> {
        let values = self.readiness(graph);
        if !values.is_empty() {
            return Ok(ConversionOutcome::ValidationFailed { values });
        }
        self.convert_relaxed(graph).map(ConversionOutcome::Converted)
    }

    /// Converts without readiness validation. Existing `float16` values
    /// are left as they are.
    pub fn convert_relaxed(&self, graph: &mut GraphProto) -> Result<PassStats, PassError> {
        let mut stats = PassStats::default();
        let mut names = NameAllocator::for_graph(graph);
        let mut index = RenameIndex::build(graph);

        let float32_values = float_values(graph, DType::F32);
        let blocked: HashSet<usize> = graph
            .node
            .iter()
            .enumerate()
            .filter(|(_, n)| self.is_blocked(n))
            .map(|(i, _)| i)
            .collect();

        // Initializers that must keep their payload at float32.
        let mut keep_fp32: HashSet<String> = graph
            .initializer
            .iter()
            .filter_map(|t| t.name.clone())
            .filter(|name| {
                let consumers = index.consumers(name);
                !consumers.is_empty()
                    && consumers.iter().all(|(n, _)| blocked.contains(n))
                    && !index.is_captured(name)
            })
            .collect();

        let mut head = Vec::new();
        let mut tail = Vec::new();
        let mut new_infos = Vec::new();
        let mut pinned_casts = HashSet::new();

        // ── 1. Boundary adapters ───────────────────────────────────
        if self.keep_io_types {
            for i in 0..graph.input.len() {
                let input = graph.input[i].clone();
                let name = value_name(&input).to_string();
                keep_fp32.insert(name.clone());
                if tensor_dtype(&input) != Some(DType::F32) || !index.is_consumed(&name) {
                    continue;
                }
                if already_downcast(graph, &index, &name) {
                    tracing::debug!("input '{name}' already feeds float16 casts");
                    continue;
                }
                let value = names.alloc(&format!("graph_input_cast_{i}"));
                let node = names.alloc(&format!("graph_input_cast{i}"));
                index.rename(graph, &name, &value, RenameScope::ConsumersOnly, &HashSet::new());
                head.push(make_cast_node(&node, &name, &value, DType::F16));
                new_infos.push(retyped_value_info(&input, &value, DType::F16));
                stats.casts_inserted += 1;
                tracing::debug!("input '{name}': float32 kept, adapter '{node}' inserted");
            }

            let input_names: HashSet<String> =
                graph.input.iter().map(|v| value_name(v).to_string()).collect();
            for i in 0..graph.output.len() {
                let output = graph.output[i].clone();
                let name = value_name(&output).to_string();
                if tensor_dtype(&output) != Some(DType::F32) || input_names.contains(&name) {
                    continue;
                }
                match index.producer(&name) {
                    Some(p) if is_cast_to(&graph.node[p], DType::F32) => {
                        pinned_casts.insert(p);
                        tracing::debug!("output '{name}' already produced by a float32 cast");
                        continue;
                    }
                    Some(_) => {}
                    None => {
                        // Produced directly by an initializer. Its payload stays
                        // float32 only when no float16 node reads it.
                        let initializer = graph
                            .initializer
                            .iter()
                            .any(|t| t.name.as_deref() == Some(name.as_str()));
                        let internal = index.is_captured(&name)
                            || index.consumers(&name).iter().any(|(n, _)| !blocked.contains(n));
                        if !(initializer && internal) {
                            keep_fp32.insert(name);
                            continue;
                        }
                    }
                }
                let value = names.alloc(&format!("graph_output_cast_{i}"));
                let node = names.alloc(&format!("graph_output_cast{i}"));
                index.rename(graph, &name, &value, RenameScope::Everywhere, &HashSet::new());
                tail.push(make_cast_node(&node, &value, &name, DType::F32));
                if !graph.value_info.iter().any(|v| value_name(v) == value) {
                    new_infos.push(retyped_value_info(&output, &value, DType::F16));
                }
                stats.casts_inserted += 1;
                tracing::debug!("output '{name}': float32 kept, adapter '{node}' inserted");
            }
        }

        // ── 2. Site conversion ─────────────────────────────────────
        let keep_io_types = self.keep_io_types;
        let clamp = self.clamp;
        let mut rewrites = 0usize;
        let mut clamped = 0usize;
        visit_sites_mut(graph, &mut |site, depth| {
            let top = depth == 0;
            match site {
                ValueSiteMut::GraphInput(info) | ValueSiteMut::GraphOutput(info) => {
                    let kept = top && (keep_io_types || keep_fp32.contains(value_name(info)));
                    if !kept {
                        rewrites += narrow_declaration(info);
                    }
                }
                ValueSiteMut::ValueInfo(info) => {
                    // Declarations of initializers kept at float32 follow the payload.
                    if !(top && keep_fp32.contains(value_name(info))) {
                        rewrites += narrow_declaration(info);
                    }
                }
                ValueSiteMut::Initializer(tensor) => {
                    let kept = top && tensor.name.as_ref().is_some_and(|n| keep_fp32.contains(n));
                    if has_dtype(tensor, DType::F32) && !kept {
                        clamped += narrow_float32_tensor(tensor, clamp)?;
                        rewrites += 1;
                    }
                }
                ValueSiteMut::SparseInitializer(sparse) => {
                    if let Some(values) = sparse.values.as_mut() {
                        let kept = top && values.name.as_ref().is_some_and(|n| keep_fp32.contains(n));
                        if has_dtype(values, DType::F32) && !kept {
                            clamped += narrow_float32_tensor(values, clamp)?;
                            rewrites += 1;
                        }
                    }
                }
                ValueSiteMut::AttributeTensor { node, tensor } => {
                    if has_dtype(tensor, DType::F32) && !(top && blocked.contains(&node.index)) {
                        clamped += narrow_float32_tensor(tensor, clamp)?;
                        rewrites += 1;
                    }
                }
                ValueSiteMut::AttributeSparseTensor { node, tensor } => {
                    if let Some(values) = tensor.values.as_mut() {
                        if has_dtype(values, DType::F32) && !(top && blocked.contains(&node.index)) {
                            clamped += narrow_float32_tensor(values, clamp)?;
                            rewrites += 1;
                        }
                    }
                }
                ValueSiteMut::DTypeAttribute { node, attr } => {
                    let frozen = top && (blocked.contains(&node.index) || pinned_casts.contains(&node.index));
                    if attr.i == Some(i64::from(DType::F32.code())) && !frozen {
                        attr.i = Some(i64::from(DType::F16.code()));
                        rewrites += 1;
                    }
                }
                ValueSiteMut::AttributeType { node, tp } => {
                    if !(top && blocked.contains(&node.index)) {
                        rewrites += narrow_type(tp);
                    }
                }
                ValueSiteMut::ConstantAttribute { node, attr } => {
                    let frozen = top && blocked.contains(&node.index);
                    if constant_attribute_dtype(attr) != Some(DType::F32) || frozen {
                        return Ok(());
                    }
                    if let Some(mut tensor) = constant_attribute_tensor(attr) {
                        clamped += narrow_float32_tensor(&mut tensor, clamp)?;
                        tracing::debug!(
                            "node '{}': {} -> float16 value tensor",
                            node.name,
                            attribute_name(attr)
                        );
                        *attr = tensor_attribute("value", tensor);
                        rewrites += 1;
                    }
                }
            }
            Ok::<(), PassError>(())
        })?;
        stats.rewrites = rewrites;
        stats.clamped = clamped;

        // ── 3. Block-list adapters ─────────────────────────────────
        let mut fp16_values = float_values(graph, DType::F16);
        fp16_values.extend(
            new_infos
                .iter()
                .filter(|v| tensor_dtype(v) == Some(DType::F16))
                .map(|v| value_name(v).to_string()),
        );
        let mut before: Vec<Vec<NodeProto>> = vec![Vec::new(); graph.node.len()];
        let mut after: Vec<Vec<NodeProto>> = vec![Vec::new(); graph.node.len()];
        let mut blocked_sorted: Vec<usize> = blocked.into_iter().collect();
        blocked_sorted.sort_unstable();

        for b in blocked_sorted {
            let label = match node_name(&graph.node[b]) {
                "" => format!("{}_{b}", op_type(&graph.node[b])),
                name => name.to_string(),
            };
            let first_input_float = graph.node[b]
                .input
                .first()
                .is_some_and(|i| float32_values.contains(i) || fp16_values.contains(i));
            for k in 0..graph.node[b].input.len() {
                let source = graph.node[b].input[k].clone();
                if source.is_empty() || !fp16_values.contains(&source) {
                    continue;
                }
                let upcast = names.alloc(&format!("{source}_fp32"));
                let cast_name = names.alloc(&format!("{label}_input_cast{k}"));
                before[b].push(make_cast_node(&cast_name, &source, &upcast, DType::F32));
                if let Some(info) = find_declaration(graph, &new_infos, &source) {
                    new_infos.push(retyped_value_info(&info, &upcast, DType::F32));
                }
                graph.node[b].input[k] = upcast;
                stats.casts_inserted += 1;
            }

            let preserving = FLOAT_PRESERVING_OPS.contains(&op_type(&graph.node[b]));
            for k in 0..graph.node[b].output.len() {
                let produced = graph.node[b].output[k].clone();
                if produced.is_empty() {
                    continue;
                }
                let declared_float = float32_values.contains(&produced) || fp16_values.contains(&produced);
                let inferred_float = preserving
                    && first_input_float
                    && (op_type(&graph.node[b]) != "TopK" || k == 0);
                if !(declared_float || inferred_float) {
                    continue;
                }
                let wide = names.alloc(&format!("{produced}_fp32"));
                let cast_name = names.alloc(&format!("{label}_output_cast{k}"));
                after[b].push(make_cast_node(&cast_name, &wide, &produced, DType::F16));
                if let Some(info) = find_declaration(graph, &new_infos, &produced) {
                    new_infos.push(retyped_value_info(&info, &wide, DType::F32));
                }
                graph.node[b].output[k] = wide;
                stats.casts_inserted += 1;
            }
            tracing::debug!("node '{label}' kept at float32");
        }

        // ── 4. Assembly ────────────────────────────────────────────
        let original = std::mem::take(&mut graph.node);
        let mut nodes = Vec::with_capacity(original.len() + stats.casts_inserted);
        nodes.extend(head);
        for ((node, pre), post) in original.into_iter().zip(before).zip(after) {
            nodes.extend(pre);
            nodes.push(node);
            nodes.extend(post);
        }
        nodes.extend(tail);
        graph.node = nodes;
        graph.value_info.extend(new_infos);

        tracing::info!(
            "float16: {} site(s) narrowed, {} cast(s) inserted, {} value(s) clamped",
            stats.rewrites,
            stats.casts_inserted,
            stats.clamped
        );
        Ok(stats)
    }
}

/// Flips every `float32` element type in a declaration to `float16`.
fn narrow_declaration(info: &mut ValueInfoProto) -> usize {
    info.r#type.as_mut().map(narrow_type).unwrap_or(0)
}

fn narrow_type(tp: &mut TypeProto) -> usize {
    let mut rewritten = 0;
    for code in elem_types_mut(tp) {
        if *code == Some(DType::F32.code()) {
            *code = Some(DType::F16.code());
            rewritten += 1;
        }
    }
    rewritten
}

fn is_cast_to(node: &NodeProto, dtype: DType) -> bool {
    is_op(node, "Cast")
        && find_attribute(node, "to").and_then(|a| a.i) == Some(i64::from(dtype.code()))
}

/// Returns `true` if every reader of `input` is a cast to `float16`.
fn already_downcast(graph: &GraphProto, index: &RenameIndex, input: &str) -> bool {
    let consumers = index.consumers(input);
    !consumers.is_empty()
        && consumers
            .iter()
            .all(|&(n, _)| is_cast_to(&graph.node[n], DType::F16))
}

/// Top-level values known to carry `dtype`: declarations, initializers,
/// constant outputs (tensor or scalar/list form) and cast outputs.
fn float_values(graph: &GraphProto, dtype: DType) -> HashSet<String> {
    let mut values: HashSet<String> = graph
        .input
        .iter()
        .chain(&graph.output)
        .chain(&graph.value_info)
        .filter(|v| tensor_dtype(v) == Some(dtype))
        .map(|v| value_name(v).to_string())
        .collect();
    values.extend(
        graph
            .initializer
            .iter()
            .filter(|t| has_dtype(t, dtype))
            .filter_map(|t| t.name.clone()),
    );
    for node in &graph.node {
        let constant = is_default_domain(node) && op_type(node) == "Constant";
        let produces = is_cast_to(node, dtype)
            || (constant
                && node.attribute.iter().any(|a| {
                    a.t.as_ref().is_some_and(|t| has_dtype(t, dtype))
                        || constant_attribute_dtype(a) == Some(dtype)
                }));
        if produces {
            values.extend(node.output.iter().cloned());
        }
    }
    values
}

fn find_declaration(
    graph: &GraphProto,
    pending: &[ValueInfoProto],
    name: &str,
) -> Option<ValueInfoProto> {
    graph
        .value_info
        .iter()
        .chain(&graph.input)
        .chain(&graph.output)
        .chain(pending)
        .find(|v| value_name(v) == name)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::helpers::{make_node, tensor_value_info};
    use model_ir::protos::onnx::AttributeProto;
    use model_ir::tensor::{make_tensor, read_payload, PayloadStorage};
    use model_ir::verify_references;
    use tensor_core::{f16, Shape, TensorData};

    fn mlp() -> GraphProto {
        GraphProto {
            input: vec![tensor_value_info("x", DType::F32, &Shape::fixed(&[1, 2]))],
            output: vec![tensor_value_info("y", DType::F32, &Shape::fixed(&[1, 2]))],
            initializer: vec![make_tensor(
                "w",
                &[2, 2],
                &TensorData::F32(vec![1.0, 0.5, -0.25, 2.0]),
                PayloadStorage::Raw,
            )],
            value_info: vec![tensor_value_info("h", DType::F32, &Shape::fixed(&[1, 2]))],
            node: vec![
                make_node("MatMul", "mm", &["x", "w"], &["h"], vec![]),
                make_node("Relu", "relu", &["h"], &["y"], vec![]),
            ],
            ..Default::default()
        }
    }

    fn ops(g: &GraphProto) -> Vec<&str> {
        g.node.iter().map(op_type).collect()
    }

    #[test]
    fn test_keep_io_types_inserts_boundary_casts() {
        let mut g = mlp();
        let outcome = Float16Converter::new().convert(&mut g).unwrap();
        let ConversionOutcome::Converted(stats) = outcome else {
            panic!("expected conversion");
        };
        assert_eq!(stats.casts_inserted, 2);
        assert!(!stats.relaxed_retry);
        assert_eq!(ops(&g), vec!["Cast", "MatMul", "Relu", "Cast"]);
        assert_eq!(g.node[0].input, vec!["x"]);
        assert_eq!(g.node[0].output, vec!["graph_input_cast_0"]);
        assert_eq!(g.node[0].name.as_deref(), Some("graph_input_cast0"));
        assert_eq!(g.node[1].input, vec!["graph_input_cast_0", "w"]);
        assert_eq!(g.node[2].output, vec!["graph_output_cast_0"]);
        assert_eq!(g.node[3].input, vec!["graph_output_cast_0"]);
        assert_eq!(g.node[3].output, vec!["y"]);

        assert_eq!(tensor_dtype(&g.input[0]), Some(DType::F32));
        assert_eq!(tensor_dtype(&g.output[0]), Some(DType::F32));
        assert_eq!(tensor_dtype(&g.value_info[0]), Some(DType::F16));
        assert!(has_dtype(&g.initializer[0], DType::F16));
        assert!(verify_references(&g).is_ok());
    }

    #[test]
    fn test_without_keep_io_types() {
        let mut g = mlp();
        let stats = Float16Converter::new()
            .keep_io_types(false)
            .convert_relaxed(&mut g)
            .unwrap();
        assert_eq!(stats.casts_inserted, 0);
        assert_eq!(ops(&g), vec!["MatMul", "Relu"]);
        assert_eq!(tensor_dtype(&g.input[0]), Some(DType::F16));
        assert_eq!(tensor_dtype(&g.output[0]), Some(DType::F16));
    }

    #[test]
    fn test_validation_fails_without_mutation() {
        let mut g = mlp();
        g.value_info[0] = tensor_value_info("h", DType::F16, &Shape::fixed(&[1, 2]));
        let before = g.clone();
        let outcome = Float16Converter::new().convert(&mut g).unwrap();
        assert_eq!(
            outcome,
            ConversionOutcome::ValidationFailed {
                values: vec!["h".to_string()]
            }
        );
        assert_eq!(g, before);
    }

    #[test]
    fn test_relaxed_conversion_is_noop_when_rerun() {
        let mut g = mlp();
        let converter = Float16Converter::new();
        converter.convert_relaxed(&mut g).unwrap();
        let once = g.clone();
        let stats = converter.convert_relaxed(&mut g).unwrap();
        assert!(stats.is_noop());
        assert_eq!(g, once);
    }

    #[test]
    fn test_constant_and_cast_targets() {
        let mut g = mlp();
        g.node.insert(
            1,
            make_node(
                "Constant",
                "bias",
                &[],
                &["b"],
                vec![tensor_attribute(
                    "value",
                    make_tensor("", &[2], &TensorData::F32(vec![1e-9, 3.0]), PayloadStorage::Typed),
                )],
            ),
        );
        g.node.push(make_cast_node("to_float", "y", "z", DType::F32));
        g.output[0] = tensor_value_info("z", DType::F32, &Shape::fixed(&[1, 2]));

        let stats = Float16Converter::new().convert_relaxed(&mut g).unwrap();
        assert_eq!(stats.clamped, 1);
        let constant = g.node.iter().find(|n| op_type(n) == "Constant").unwrap();
        let payload = read_payload(constant.attribute[0].t.as_ref().unwrap()).unwrap();
        assert_eq!(
            payload,
            TensorData::F16(vec![f16::from_f32(1e-7), f16::from_f32(3.0)])
        );
        // The output-producing float32 cast is kept; no extra adapter.
        let last = g.node.last().unwrap();
        assert_eq!(last.name.as_deref(), Some("to_float"));
        assert_eq!(last.attribute[0].i, Some(1));
        assert!(verify_references(&g).is_ok());
    }

    #[test]
    fn test_inner_cast_target_narrowed() {
        let mut g = mlp();
        g.node[1] = make_cast_node("c", "h", "h32", DType::F32);
        g.node.push(make_node("Relu", "relu", &["h32"], &["y"], vec![]));
        Float16Converter::new().convert_relaxed(&mut g).unwrap();
        let cast = g.node.iter().find(|n| node_name(n) == "c").unwrap();
        assert_eq!(cast.attribute[0].i, Some(i64::from(DType::F16.code())));
    }

    #[test]
    fn test_blocked_node_gets_adapters() {
        let mut g = mlp();
        g.node[1] = make_node("Resize", "up", &["h"], &["y"], vec![]);
        let stats = Float16Converter::new()
            .keep_io_types(false)
            .convert_relaxed(&mut g)
            .unwrap();
        assert_eq!(stats.casts_inserted, 2);
        assert_eq!(ops(&g), vec!["MatMul", "Cast", "Resize", "Cast"]);
        assert_eq!(g.node[1].input, vec!["h"]);
        assert_eq!(g.node[1].attribute[0].i, Some(1));
        assert_eq!(g.node[2].input, vec!["h_fp32"]);
        assert_eq!(g.node[2].output, vec!["y_fp32"]);
        assert_eq!(g.node[3].output, vec!["y"]);
        assert_eq!(g.node[3].attribute[0].i, Some(10));
        assert!(verify_references(&g).is_ok());
    }

    #[test]
    fn test_initializer_used_only_by_blocked_node_stays_fp32() {
        let mut g = mlp();
        g.initializer.push(make_tensor("scales", &[2], &TensorData::F32(vec![1.0, 2.0]), PayloadStorage::Raw));
        g.node[1] = make_node("Resize", "up", &["h", "", "scales"], &["y"], vec![]);
        Float16Converter::new().convert_relaxed(&mut g).unwrap();
        assert!(has_dtype(&g.initializer[0], DType::F16));
        assert!(has_dtype(&g.initializer[1], DType::F32));
    }

    #[test]
    fn test_kept_initializer_declaration_follows_payload() {
        let mut g = mlp();
        g.initializer.push(make_tensor("scales", &[2], &TensorData::F32(vec![1.0, 2.0]), PayloadStorage::Raw));
        g.output.push(tensor_value_info("scales", DType::F32, &Shape::fixed(&[2])));
        g.value_info.push(tensor_value_info("scales", DType::F32, &Shape::fixed(&[2])));
        g.node[1] = make_node("Resize", "up", &["h", "", "scales"], &["y"], vec![]);
        Float16Converter::new()
            .keep_io_types(false)
            .convert_relaxed(&mut g)
            .unwrap();
        assert!(has_dtype(&g.initializer[1], DType::F32));
        assert_eq!(tensor_dtype(&g.output[1]), Some(DType::F32));
        assert_eq!(tensor_dtype(&g.value_info[1]), Some(DType::F32));
        // Only `h` is upcast; `scales` already is float32.
        assert_eq!(g.node[2].input, vec!["h_fp32", "", "scales"]);
    }

    fn floats_constant(name: &str, output: &str, values: &[f32]) -> NodeProto {
        let attr = AttributeProto {
            name: Some("value_floats".into()),
            floats: values.to_vec(),
            ..Default::default()
        };
        make_node("Constant", name, &[], &[output], vec![attr])
    }

    fn biased() -> GraphProto {
        GraphProto {
            input: vec![tensor_value_info("x", DType::F32, &Shape::fixed(&[2]))],
            output: vec![tensor_value_info("y", DType::F32, &Shape::fixed(&[2]))],
            node: vec![
                floats_constant("bias", "b", &[1.0, 2.0]),
                make_node("Add", "add", &["x", "b"], &["y"], vec![]),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_constant_float_list_narrowed() {
        let mut g = biased();
        let outcome = Float16Converter::new().keep_io_types(false).convert(&mut g).unwrap();
        let ConversionOutcome::Converted(stats) = outcome else {
            panic!("expected conversion");
        };
        // input, output, constant
        assert_eq!(stats.rewrites, 3);
        assert_eq!(tensor_dtype(&g.input[0]), Some(DType::F16));

        let attr = &g.node[0].attribute[0];
        assert_eq!(attribute_name(attr), "value");
        assert!(attr.floats.is_empty());
        let t = attr.t.as_ref().unwrap();
        assert_eq!(t.dims, vec![2]);
        assert_eq!(
            read_payload(t).unwrap(),
            TensorData::F16(vec![f16::from_f32(1.0), f16::from_f32(2.0)])
        );
    }

    #[test]
    fn test_blocked_constant_keeps_float_list() {
        let mut g = biased();
        Float16Converter::new()
            .keep_io_types(false)
            .node_block_list(["bias"])
            .convert_relaxed(&mut g)
            .unwrap();
        assert_eq!(ops(&g), vec!["Constant", "Cast", "Add"]);
        assert_eq!(attribute_name(&g.node[0].attribute[0]), "value_floats");
        assert_eq!(g.node[0].output, vec!["b_fp32"]);
        assert_eq!(g.node[1].output, vec!["b"]);
        assert_eq!(g.node[1].attribute[0].i, Some(10));
        assert!(verify_references(&g).is_ok());
    }

    fn weight_output(consumer: NodeProto) -> GraphProto {
        GraphProto {
            input: vec![tensor_value_info("x", DType::F32, &Shape::fixed(&[2]))],
            output: vec![
                tensor_value_info("y", DType::F32, &Shape::fixed(&[2])),
                tensor_value_info("w", DType::F32, &Shape::fixed(&[2])),
            ],
            initializer: vec![make_tensor("w", &[2], &TensorData::F32(vec![0.5, 1.5]), PayloadStorage::Raw)],
            node: vec![consumer],
            ..Default::default()
        }
    }

    #[test]
    fn test_initializer_output_with_internal_reader_is_narrowed() {
        let mut g = weight_output(make_node("Add", "add", &["x", "w"], &["y"], vec![]));
        Float16Converter::new().convert(&mut g).unwrap();

        assert_eq!(ops(&g), vec!["Cast", "Add", "Cast", "Cast"]);
        let add = &g.node[1];
        assert_eq!(add.input, vec!["graph_input_cast_0", "graph_output_cast_1"]);
        assert_eq!(g.initializer[0].name.as_deref(), Some("graph_output_cast_1"));
        assert!(has_dtype(&g.initializer[0], DType::F16));
        let alias = g.value_info.iter().find(|v| value_name(v) == "graph_input_cast_0").unwrap();
        assert_eq!(tensor_dtype(alias), Some(DType::F16));

        // The external output is recreated at float32.
        let last = g.node.last().unwrap();
        assert_eq!(last.input, vec!["graph_output_cast_1"]);
        assert_eq!(last.output, vec!["w"]);
        assert_eq!(last.attribute[0].i, Some(1));
        assert_eq!(tensor_dtype(&g.output[1]), Some(DType::F32));
        assert!(verify_references(&g).is_ok());
    }

    #[test]
    fn test_initializer_output_with_blocked_readers_stays_fp32() {
        let mut g = weight_output(make_node("Resize", "up", &["x", "", "w"], &["y"], vec![]));
        Float16Converter::new().convert(&mut g).unwrap();
        assert_eq!(g.initializer[0].name.as_deref(), Some("w"));
        assert!(has_dtype(&g.initializer[0], DType::F32));
        assert!(!g.node.iter().any(|n| n.output.iter().any(|o| o == "w")));
        assert!(verify_references(&g).is_ok());
    }

    #[test]
    fn test_node_block_list() {
        let mut g = mlp();
        let stats = Float16Converter::new()
            .keep_io_types(false)
            .op_block_list(Vec::<String>::new())
            .node_block_list(["relu"])
            .convert_relaxed(&mut g)
            .unwrap();
        assert_eq!(stats.casts_inserted, 2);
        assert_eq!(ops(&g), vec!["MatMul", "Cast", "Relu", "Cast"]);
    }

    #[test]
    fn test_default_block_list_contents() {
        assert!(DEFAULT_OP_BLOCK_LIST.contains(&"TopK"));
        assert!(DEFAULT_OP_BLOCK_LIST.contains(&"Upsample"));
        assert!(!DEFAULT_OP_BLOCK_LIST.contains(&"MatMul"));
        assert_eq!(DEFAULT_OP_BLOCK_LIST.len(), 28);
    }
}
