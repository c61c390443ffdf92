// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph document wrapper.
//!
//! # Type-State Pattern
//!
//! A document transitions through states enforced at compile time:
//!
//! ```text
//! ModelDocument<Loaded>     — decoded, not yet checked.
//!       │  .validate()
//!       ▼
//! ModelDocument<Validated>  — has a graph with named outputs; ready for rewriting.
//! ```
//!
//! Rewrite passes only ever receive the graph of a validated document.

use crate::helpers::{declared_shape, elem_types, tensor_elem_type, value_name};
use crate::protos::onnx::{GraphProto, ModelProto, ValueInfoProto};
use crate::sites::{constant_attribute_dtype, visit_sites, ValueSite};
use crate::tensor::tensor_dtype_code;
use crate::ModelError;
use prost::Message;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use tensor_core::{describe_code, DType, Shape};

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: document has been decoded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: document has been validated and can be rewritten.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for document states.
pub trait DocumentState: fmt::Debug + Clone {}
impl DocumentState for Loaded {}
impl DocumentState for Validated {}

static EMPTY_GRAPH: GraphProto = GraphProto {
    node: Vec::new(),
    name: None,
    initializer: Vec::new(),
    sparse_initializer: Vec::new(),
    doc_string: None,
    input: Vec::new(),
    output: Vec::new(),
    value_info: Vec::new(),
    quantization_annotation: Vec::new(),
    metadata_props: Vec::new(),
};

// ── ModelDocument ──────────────────────────────────────────────────

/// A decoded model document.
#[derive(Debug, Clone)]
pub struct ModelDocument<S: DocumentState = Loaded> {
    model: ModelProto,
    _state: std::marker::PhantomData<S>,
}

/// Name, element type and shape of one graph input or output.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDescription {
    pub name: String,
    /// Element type code; `None` for non-tensor or untyped values.
    pub elem_type: Option<i32>,
    /// Declared shape; `None` when the rank is unknown.
    pub shape: Option<Shape>,
}

impl ValueDescription {
    fn from_info(info: &ValueInfoProto) -> Self {
        Self {
            name: value_name(info).to_string(),
            elem_type: tensor_elem_type(info),
            shape: declared_shape(info),
        }
    }
}

impl fmt::Display for ValueDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dtype = self
            .elem_type
            .map(describe_code)
            .unwrap_or_else(|| "non-tensor".to_string());
        match &self.shape {
            Some(shape) => write!(f, "{}: {} {}", self.name, dtype, shape),
            None => write!(f, "{}: {} (unknown rank)", self.name, dtype),
        }
    }
}

impl<S: DocumentState> ModelDocument<S> {
    /// Returns the underlying model message.
    pub fn model(&self) -> &ModelProto {
        &self.model
    }

    /// Consumes the document and returns the model message.
    pub fn into_model(self) -> ModelProto {
        self.model
    }
}

// ── Loaded state ───────────────────────────────────────────────────

impl ModelDocument<Loaded> {
    /// Wraps a decoded model in the `Loaded` state.
    pub fn new(model: ModelProto) -> Self {
        Self {
            model,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the document and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The document contains a graph.
    /// - The graph declares at least one output.
    /// - Every graph input and output has a name.
    pub fn validate(self) -> Result<ModelDocument<Validated>, ModelError> {
        let Some(graph) = self.model.graph.as_ref() else {
            return Err(ModelError::MalformedGraph("document contains no graph".into()));
        };
        if graph.output.is_empty() {
            return Err(ModelError::MalformedGraph("graph declares no outputs".into()));
        }
        for (kind, infos) in [("input", &graph.input), ("output", &graph.output)] {
            if let Some(i) = infos.iter().position(|v| value_name(v).is_empty()) {
                return Err(ModelError::MalformedGraph(format!(
                    "graph {kind} #{i} has no name"
                )));
            }
        }

        Ok(ModelDocument {
            model: self.model,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Validated state ────────────────────────────────────────────────

impl ModelDocument<Validated> {
    /// Returns the main graph.
    pub fn graph(&self) -> &GraphProto {
        self.model.graph.as_ref().unwrap_or(&EMPTY_GRAPH)
    }

    /// Returns the main graph for in-place rewriting.
    pub fn graph_mut(&mut self) -> &mut GraphProto {
        self.model.graph.get_or_insert_with(GraphProto::default)
    }

    /// Describes the graph inputs in declaration order.
    pub fn inputs(&self) -> Vec<ValueDescription> {
        self.graph().input.iter().map(ValueDescription::from_info).collect()
    }

    /// Describes the graph outputs in declaration order.
    pub fn outputs(&self) -> Vec<ValueDescription> {
        self.graph().output.iter().map(ValueDescription::from_info).collect()
    }

    /// Returns the default-domain opset version, if declared.
    pub fn opset_version(&self) -> Option<i64> {
        self.model
            .opset_import
            .iter()
            .find(|o| matches!(o.domain.as_deref(), None | Some("") | Some("ai.onnx")))
            .and_then(|o| o.version)
    }

    /// Counts element types over every typed-value site, keyed by type name.
    pub fn dtype_histogram(&self) -> BTreeMap<String, usize> {
        let mut histogram = BTreeMap::new();
        let _ = visit_sites::<Infallible, _>(self.graph(), &mut |site, _| {
            let codes: Vec<i32> = match site {
                ValueSite::GraphInput(info)
                | ValueSite::GraphOutput(info)
                | ValueSite::ValueInfo(info) => info.r#type.as_ref().map(elem_types).unwrap_or_default(),
                ValueSite::Initializer(t) | ValueSite::AttributeTensor { tensor: t, .. } => {
                    vec![tensor_dtype_code(t)]
                }
                ValueSite::SparseInitializer(s) | ValueSite::AttributeSparseTensor { tensor: s, .. } => {
                    s.values.iter().map(tensor_dtype_code).collect()
                }
                ValueSite::DTypeAttribute { attr, .. } => {
                    attr.i.and_then(|i| i32::try_from(i).ok()).into_iter().collect()
                }
                ValueSite::AttributeType { tp, .. } => elem_types(tp),
                ValueSite::ConstantAttribute { attr, .. } => {
                    constant_attribute_dtype(attr).map(DType::code).into_iter().collect()
                }
            };
            for code in codes {
                *histogram.entry(describe_code(code)).or_insert(0) += 1;
            }
            Ok(())
        });
        histogram
    }

    /// Encodes the document into its wire form.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        self.model.encode_to_vec()
    }

    /// Returns a one-line summary of the document.
    pub fn summary(&self) -> String {
        let graph = self.graph();
        format!(
            "Graph '{}' (ir v{}, opset {}): {} nodes, {} initializers, {} inputs, {} outputs",
            graph.name.as_deref().unwrap_or("unnamed"),
            self.model.ir_version.unwrap_or(0),
            self.opset_version()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "?".into()),
            graph.node.len(),
            graph.initializer.len(),
            graph.input.len(),
            graph.output.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{make_node, tensor_value_info};
    use crate::protos::onnx::OperatorSetIdProto;
    use crate::tensor::{make_tensor, PayloadStorage};
    use tensor_core::{DType, Dim, TensorData};

    fn model() -> ModelProto {
        ModelProto {
            ir_version: Some(8),
            opset_import: vec![OperatorSetIdProto {
                domain: Some(String::new()),
                version: Some(17),
            }],
            graph: Some(GraphProto {
                name: Some("tiny".into()),
                input: vec![tensor_value_info(
                    "ids",
                    DType::I64,
                    &Shape::new(vec![Dim::Fixed(1), Dim::Symbolic("seq".into())]),
                )],
                output: vec![tensor_value_info("y", DType::F32, &Shape::fixed(&[1]))],
                initializer: vec![make_tensor(
                    "w",
                    &[1],
                    &TensorData::F32(vec![0.5]),
                    PayloadStorage::Raw,
                )],
                node: vec![make_node("Gather", "g", &["w", "ids"], &["y"], vec![])],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        let doc = ModelDocument::new(model()).validate().unwrap();
        assert_eq!(doc.opset_version(), Some(17));
        assert_eq!(doc.inputs()[0].to_string(), "ids: int64 [1, seq]");
        assert_eq!(doc.outputs()[0].elem_type, Some(DType::F32.code()));
        assert!(doc.summary().contains("1 nodes"));
    }

    #[test]
    fn test_validate_missing_graph() {
        let err = ModelDocument::new(ModelProto::default()).validate().unwrap_err();
        assert!(matches!(err, ModelError::MalformedGraph(_)));
    }

    #[test]
    fn test_validate_no_outputs() {
        let mut m = model();
        m.graph.as_mut().unwrap().output.clear();
        assert!(ModelDocument::new(m).validate().is_err());
    }

    #[test]
    fn test_validate_unnamed_input() {
        let mut m = model();
        m.graph.as_mut().unwrap().input[0].name = None;
        assert!(ModelDocument::new(m).validate().is_err());
    }

    #[test]
    fn test_dtype_histogram() {
        let doc = ModelDocument::new(model()).validate().unwrap();
        let histogram = doc.dtype_histogram();
        assert_eq!(histogram.get("int64"), Some(&1));
        assert_eq!(histogram.get("float32"), Some(&2));
    }

    #[test]
    fn test_encode_decode() {
        let doc = ModelDocument::new(model()).validate().unwrap();
        let bytes = doc.encode_to_vec();
        let decoded = ModelProto::decode(bytes.as_slice()).unwrap();
        assert_eq!(&decoded, doc.model());
    }
}
