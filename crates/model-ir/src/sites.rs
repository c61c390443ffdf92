// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Traversal over every typed-value site of a graph.
//!
//! A *site* is any place in the document that declares or carries an
//! element type:
//!
//! | Site | Carries |
//! |---|---|
//! | [`GraphInput`](ValueSiteMut::GraphInput) / [`GraphOutput`](ValueSiteMut::GraphOutput) | declared type |
//! | [`ValueInfo`](ValueSiteMut::ValueInfo) | intermediate type annotation |
//! | [`Initializer`](ValueSiteMut::Initializer) / [`SparseInitializer`](ValueSiteMut::SparseInitializer) | tag + payload |
//! | [`AttributeTensor`](ValueSiteMut::AttributeTensor) | tag + payload inside a node attribute |
//! | [`DTypeAttribute`](ValueSiteMut::DTypeAttribute) | an element type code (`Cast.to`, `dtype`) |
//! | [`AttributeType`](ValueSiteMut::AttributeType) | a type-valued attribute |
//! | [`ConstantAttribute`](ValueSiteMut::ConstantAttribute) | `Constant` `value_int(s)` / `value_float(s)` (implicitly `int64` / `float32`) |
//!
//! Subgraph attributes (`If`, `Loop`, `Scan` bodies) are entered
//! recursively; the callback receives the nesting depth, `0` being the
//! top-level graph. Passes written against this visitor see every site,
//! including ones added to the schema later, in one place.

use crate::helpers::{attribute_name, is_default_domain};
use crate::protos::onnx::{
    AttributeProto, GraphProto, NodeProto, SparseTensorProto, TensorProto, TypeProto,
    ValueInfoProto,
};
use crate::tensor::{make_tensor, PayloadStorage};
use tensor_core::{DType, TensorData};

/// Operation kinds whose `dtype` attribute names an element type.
const DTYPE_ATTRIBUTE_OPS: &[&str] = &[
    "EyeLike",
    "RandomNormal",
    "RandomNormalLike",
    "RandomUniform",
    "RandomUniformLike",
    "Multinomial",
    "Bernoulli",
];

/// Returns `true` if the attribute holds an element type code.
pub fn is_dtype_attribute(node: &NodeProto, attr: &AttributeProto) -> bool {
    is_dtype_attribute_of(
        node.domain.as_deref(),
        node.op_type.as_deref().unwrap_or(""),
        attribute_name(attr),
    )
}

fn is_dtype_attribute_of(domain: Option<&str>, op_type: &str, attr: &str) -> bool {
    if !matches!(domain, None | Some("") | Some("ai.onnx")) {
        return false;
    }
    (op_type == "Cast" && attr == "to") || (attr == "dtype" && DTYPE_ATTRIBUTE_OPS.contains(&op_type))
}

fn is_constant_value_of(domain: Option<&str>, op_type: &str, attr: &str) -> bool {
    matches!(domain, None | Some("") | Some("ai.onnx"))
        && op_type == "Constant"
        && matches!(attr, "value_int" | "value_ints" | "value_float" | "value_floats")
}

/// Element type a `Constant` scalar or list attribute produces, if `attr`
/// is one.
pub fn constant_attribute_dtype(attr: &AttributeProto) -> Option<DType> {
    match attribute_name(attr) {
        "value_int" | "value_ints" => Some(DType::I64),
        "value_float" | "value_floats" => Some(DType::F32),
        _ => None,
    }
}

/// Builds the `value` tensor equivalent to a `Constant` scalar or list
/// attribute: rank 0 for `value_int`/`value_float`, rank 1 for the lists.
pub fn constant_attribute_tensor(attr: &AttributeProto) -> Option<TensorProto> {
    let (dims, data) = match attribute_name(attr) {
        "value_int" => (vec![], TensorData::I64(vec![attr.i.unwrap_or_default()])),
        "value_ints" => (vec![attr.ints.len() as i64], TensorData::I64(attr.ints.clone())),
        "value_float" => (vec![], TensorData::F32(vec![attr.f.unwrap_or_default()])),
        "value_floats" => (vec![attr.floats.len() as i64], TensorData::F32(attr.floats.clone())),
        _ => return None,
    };
    Some(make_tensor("", &dims, &data, PayloadStorage::Typed))
}

/// The node that owns an attribute site.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    /// Position of the node within its graph.
    pub index: usize,
    pub name: &'a str,
    pub op_type: &'a str,
}

/// A mutable typed-value site.
#[derive(Debug)]
pub enum ValueSiteMut<'a> {
    GraphInput(&'a mut ValueInfoProto),
    GraphOutput(&'a mut ValueInfoProto),
    ValueInfo(&'a mut ValueInfoProto),
    Initializer(&'a mut TensorProto),
    SparseInitializer(&'a mut SparseTensorProto),
    AttributeTensor {
        node: NodeRef<'a>,
        tensor: &'a mut TensorProto,
    },
    AttributeSparseTensor {
        node: NodeRef<'a>,
        tensor: &'a mut SparseTensorProto,
    },
    DTypeAttribute {
        node: NodeRef<'a>,
        attr: &'a mut AttributeProto,
    },
    AttributeType {
        node: NodeRef<'a>,
        tp: &'a mut TypeProto,
    },
    ConstantAttribute {
        node: NodeRef<'a>,
        attr: &'a mut AttributeProto,
    },
}

/// A read-only typed-value site.
#[derive(Debug, Clone, Copy)]
pub enum ValueSite<'a> {
    GraphInput(&'a ValueInfoProto),
    GraphOutput(&'a ValueInfoProto),
    ValueInfo(&'a ValueInfoProto),
    Initializer(&'a TensorProto),
    SparseInitializer(&'a SparseTensorProto),
    AttributeTensor {
        node: NodeRef<'a>,
        tensor: &'a TensorProto,
    },
    AttributeSparseTensor {
        node: NodeRef<'a>,
        tensor: &'a SparseTensorProto,
    },
    DTypeAttribute {
        node: NodeRef<'a>,
        attr: &'a AttributeProto,
    },
    AttributeType {
        node: NodeRef<'a>,
        tp: &'a TypeProto,
    },
    ConstantAttribute {
        node: NodeRef<'a>,
        attr: &'a AttributeProto,
    },
}

/// Calls `f` on every site of `graph` and of its nested subgraphs.
///
/// Stops at the first error returned by `f`.
pub fn visit_sites_mut<E, F>(graph: &mut GraphProto, f: &mut F) -> Result<(), E>
where
    F: FnMut(ValueSiteMut<'_>, usize) -> Result<(), E>,
{
    visit_graph_mut(graph, 0, f)
}

fn visit_graph_mut<E, F>(graph: &mut GraphProto, depth: usize, f: &mut F) -> Result<(), E>
where
    F: FnMut(ValueSiteMut<'_>, usize) -> Result<(), E>,
{
    for info in graph.input.iter_mut() {
        f(ValueSiteMut::GraphInput(info), depth)?;
    }
    for info in graph.output.iter_mut() {
        f(ValueSiteMut::GraphOutput(info), depth)?;
    }
    for info in graph.value_info.iter_mut() {
        f(ValueSiteMut::ValueInfo(info), depth)?;
    }
    for tensor in graph.initializer.iter_mut() {
        f(ValueSiteMut::Initializer(tensor), depth)?;
    }
    for sparse in graph.sparse_initializer.iter_mut() {
        f(ValueSiteMut::SparseInitializer(sparse), depth)?;
    }

    for (index, node) in graph.node.iter_mut().enumerate() {
        let NodeProto {
            name,
            op_type,
            domain,
            attribute,
            ..
        } = node;
        let node_ref = NodeRef {
            index,
            name: name.as_deref().unwrap_or(""),
            op_type: op_type.as_deref().unwrap_or(""),
        };
        for attr in attribute.iter_mut() {
            if is_dtype_attribute_of(domain.as_deref(), node_ref.op_type, attribute_name(attr)) {
                f(ValueSiteMut::DTypeAttribute { node: node_ref, attr: &mut *attr }, depth)?;
                continue;
            }
            if is_constant_value_of(domain.as_deref(), node_ref.op_type, attribute_name(attr)) {
                f(ValueSiteMut::ConstantAttribute { node: node_ref, attr: &mut *attr }, depth)?;
                continue;
            }
            if let Some(tensor) = attr.t.as_mut() {
                f(ValueSiteMut::AttributeTensor { node: node_ref, tensor }, depth)?;
            }
            for tensor in attr.tensors.iter_mut() {
                f(ValueSiteMut::AttributeTensor { node: node_ref, tensor }, depth)?;
            }
            if let Some(tensor) = attr.sparse_tensor.as_mut() {
                f(ValueSiteMut::AttributeSparseTensor { node: node_ref, tensor }, depth)?;
            }
            for tensor in attr.sparse_tensors.iter_mut() {
                f(ValueSiteMut::AttributeSparseTensor { node: node_ref, tensor }, depth)?;
            }
            if let Some(tp) = attr.tp.as_mut() {
                f(ValueSiteMut::AttributeType { node: node_ref, tp }, depth)?;
            }
            for tp in attr.type_protos.iter_mut() {
                f(ValueSiteMut::AttributeType { node: node_ref, tp }, depth)?;
            }
            if let Some(body) = attr.g.as_mut() {
                visit_graph_mut(body, depth + 1, f)?;
            }
            for body in attr.graphs.iter_mut() {
                visit_graph_mut(body, depth + 1, f)?;
            }
        }
    }
    Ok(())
}

/// Read-only counterpart of [`visit_sites_mut`].
pub fn visit_sites<E, F>(graph: &GraphProto, f: &mut F) -> Result<(), E>
where
    F: FnMut(ValueSite<'_>, usize) -> Result<(), E>,
{
    visit_graph(graph, 0, f)
}

fn visit_graph<E, F>(graph: &GraphProto, depth: usize, f: &mut F) -> Result<(), E>
where
    F: FnMut(ValueSite<'_>, usize) -> Result<(), E>,
{
    for info in &graph.input {
        f(ValueSite::GraphInput(info), depth)?;
    }
    for info in &graph.output {
        f(ValueSite::GraphOutput(info), depth)?;
    }
    for info in &graph.value_info {
        f(ValueSite::ValueInfo(info), depth)?;
    }
    for tensor in &graph.initializer {
        f(ValueSite::Initializer(tensor), depth)?;
    }
    for sparse in &graph.sparse_initializer {
        f(ValueSite::SparseInitializer(sparse), depth)?;
    }

    for (index, node) in graph.node.iter().enumerate() {
        let node_ref = NodeRef {
            index,
            name: node.name.as_deref().unwrap_or(""),
            op_type: node.op_type.as_deref().unwrap_or(""),
        };
        for attr in &node.attribute {
            if is_dtype_attribute(node, attr) {
                f(ValueSite::DTypeAttribute { node: node_ref, attr }, depth)?;
                continue;
            }
            if is_constant_value_of(node.domain.as_deref(), node_ref.op_type, attribute_name(attr)) {
                f(ValueSite::ConstantAttribute { node: node_ref, attr }, depth)?;
                continue;
            }
            if let Some(tensor) = attr.t.as_ref() {
                f(ValueSite::AttributeTensor { node: node_ref, tensor }, depth)?;
            }
            for tensor in &attr.tensors {
                f(ValueSite::AttributeTensor { node: node_ref, tensor }, depth)?;
            }
            if let Some(tensor) = attr.sparse_tensor.as_ref() {
                f(ValueSite::AttributeSparseTensor { node: node_ref, tensor }, depth)?;
            }
            for tensor in &attr.sparse_tensors {
                f(ValueSite::AttributeSparseTensor { node: node_ref, tensor }, depth)?;
            }
            if let Some(tp) = attr.tp.as_ref() {
                f(ValueSite::AttributeType { node: node_ref, tp }, depth)?;
            }
            for tp in &attr.type_protos {
                f(ValueSite::AttributeType { node: node_ref, tp }, depth)?;
            }
            if let Some(body) = attr.g.as_ref() {
                visit_graph(body, depth + 1, f)?;
            }
            for body in &attr.graphs {
                visit_graph(body, depth + 1, f)?;
            }
        }
    }
    Ok(())
}

/// Calls `f` on `graph` and on every nested subgraph, outermost first.
pub fn walk_graphs<F>(graph: &GraphProto, f: &mut F)
where
    F: FnMut(&GraphProto, usize),
{
    walk(graph, 0, f);
}

fn walk<F>(graph: &GraphProto, depth: usize, f: &mut F)
where
    F: FnMut(&GraphProto, usize),
{
    f(graph, depth);
    for node in &graph.node {
        for attr in &node.attribute {
            if let Some(body) = attr.g.as_ref() {
                walk(body, depth + 1, f);
            }
            for body in &attr.graphs {
                walk(body, depth + 1, f);
            }
        }
    }
}

/// Returns `true` if the node has any subgraph-valued attribute.
pub fn has_subgraphs(node: &NodeProto) -> bool {
    node.attribute
        .iter()
        .any(|a| a.g.is_some() || !a.graphs.is_empty())
}

/// Returns `true` if the node is in the default domain and has the given kind.
pub fn is_op(node: &NodeProto, op_type: &str) -> bool {
    is_default_domain(node) && node.op_type.as_deref() == Some(op_type)
}
