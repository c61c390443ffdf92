// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Small accessors and constructors over the raw protobuf messages.

use crate::protos::onnx::{
    attribute_proto::AttributeType,
    tensor_shape_proto::{dimension, Dimension},
    type_proto, AttributeProto, GraphProto, NodeProto, TensorProto, TensorShapeProto, TypeProto,
    ValueInfoProto,
};
use tensor_core::{DType, Dim, Shape};

// ── Accessors ──────────────────────────────────────────────────────

/// Returns the name of a declared value, or `""`.
pub fn value_name(info: &ValueInfoProto) -> &str {
    info.name.as_deref().unwrap_or("")
}

/// Returns the node's name, or `""`.
pub fn node_name(node: &NodeProto) -> &str {
    node.name.as_deref().unwrap_or("")
}

/// Returns the node's operation kind, or `""`.
pub fn op_type(node: &NodeProto) -> &str {
    node.op_type.as_deref().unwrap_or("")
}

/// Returns `true` if the node belongs to the default operator domain.
pub fn is_default_domain(node: &NodeProto) -> bool {
    matches!(node.domain.as_deref(), None | Some("") | Some("ai.onnx"))
}

/// Returns the attribute's name, or `""`.
pub fn attribute_name(attr: &AttributeProto) -> &str {
    attr.name.as_deref().unwrap_or("")
}

/// Finds an attribute by name.
pub fn find_attribute<'a>(node: &'a NodeProto, name: &str) -> Option<&'a AttributeProto> {
    node.attribute.iter().find(|a| attribute_name(a) == name)
}

/// Returns the element type code of a plain tensor declaration.
///
/// `None` for non-tensor types and for declarations without a type.
pub fn tensor_elem_type(info: &ValueInfoProto) -> Option<i32> {
    match info.r#type.as_ref()?.value.as_ref()? {
        type_proto::Value::TensorType(t) => t.elem_type,
        _ => None,
    }
}

/// Decoded element type of a plain tensor declaration.
pub fn tensor_dtype(info: &ValueInfoProto) -> Option<DType> {
    tensor_elem_type(info).and_then(DType::from_code)
}

/// Sets the element type of a plain tensor declaration.
///
/// Returns `false` (and changes nothing) if the value is not a tensor.
pub fn set_tensor_elem_type(info: &mut ValueInfoProto, dtype: DType) -> bool {
    match info.r#type.as_mut().and_then(|t| t.value.as_mut()) {
        Some(type_proto::Value::TensorType(t)) => {
            t.elem_type = Some(dtype.code());
            true
        }
        _ => false,
    }
}

/// Mutable access to a tensor declaration's shape, if it declares one.
pub fn tensor_shape_mut(info: &mut ValueInfoProto) -> Option<&mut TensorShapeProto> {
    match info.r#type.as_mut()?.value.as_mut()? {
        type_proto::Value::TensorType(t) => t.shape.as_mut(),
        _ => None,
    }
}

/// Decodes a declared tensor shape. `None` when the rank is not declared.
pub fn declared_shape(info: &ValueInfoProto) -> Option<Shape> {
    match info.r#type.as_ref()?.value.as_ref()? {
        type_proto::Value::TensorType(t) => t.shape.as_ref().map(shape_from_proto),
        type_proto::Value::SparseTensorType(t) => t.shape.as_ref().map(shape_from_proto),
        _ => None,
    }
}

/// Converts a shape message into a [`Shape`].
pub fn shape_from_proto(shape: &TensorShapeProto) -> Shape {
    Shape::new(
        shape
            .dim
            .iter()
            .map(|d| match &d.value {
                Some(dimension::Value::DimValue(v)) => Dim::Fixed(*v),
                Some(dimension::Value::DimParam(p)) => Dim::Symbolic(p.clone()),
                None => Dim::Unknown,
            })
            .collect(),
    )
}

/// Converts a [`Shape`] into a shape message.
pub fn shape_to_proto(shape: &Shape) -> TensorShapeProto {
    TensorShapeProto {
        dim: shape
            .dims()
            .iter()
            .map(|d| Dimension {
                denotation: None,
                value: match d {
                    Dim::Fixed(v) => Some(dimension::Value::DimValue(*v)),
                    Dim::Symbolic(p) => Some(dimension::Value::DimParam(p.clone())),
                    Dim::Unknown => None,
                },
            })
            .collect(),
    }
}

/// Collects mutable references to every element type code inside a type,
/// following sequence, optional and map nesting.
pub fn elem_types_mut(tp: &mut TypeProto) -> Vec<&mut Option<i32>> {
    let mut out = Vec::new();
    collect_elem_types_mut(tp, &mut out);
    out
}

fn collect_elem_types_mut<'a>(tp: &'a mut TypeProto, out: &mut Vec<&'a mut Option<i32>>) {
    match tp.value.as_mut() {
        Some(type_proto::Value::TensorType(t)) => out.push(&mut t.elem_type),
        Some(type_proto::Value::SparseTensorType(t)) => out.push(&mut t.elem_type),
        Some(type_proto::Value::SequenceType(s)) => {
            if let Some(inner) = s.elem_type.as_deref_mut() {
                collect_elem_types_mut(inner, out);
            }
        }
        Some(type_proto::Value::OptionalType(o)) => {
            if let Some(inner) = o.elem_type.as_deref_mut() {
                collect_elem_types_mut(inner, out);
            }
        }
        Some(type_proto::Value::MapType(m)) => {
            let type_proto::Map {
                key_type,
                value_type,
            } = m;
            out.push(key_type);
            if let Some(inner) = value_type.as_deref_mut() {
                collect_elem_types_mut(inner, out);
            }
        }
        Some(type_proto::Value::OpaqueType(_)) | None => {}
    }
}

/// Collects every element type code inside a type.
pub fn elem_types(tp: &TypeProto) -> Vec<i32> {
    let mut out = Vec::new();
    collect_elem_types(tp, &mut out);
    out
}

fn collect_elem_types(tp: &TypeProto, out: &mut Vec<i32>) {
    match tp.value.as_ref() {
        Some(type_proto::Value::TensorType(t)) => out.extend(t.elem_type),
        Some(type_proto::Value::SparseTensorType(t)) => out.extend(t.elem_type),
        Some(type_proto::Value::SequenceType(s)) => {
            if let Some(inner) = s.elem_type.as_deref() {
                collect_elem_types(inner, out);
            }
        }
        Some(type_proto::Value::OptionalType(o)) => {
            if let Some(inner) = o.elem_type.as_deref() {
                collect_elem_types(inner, out);
            }
        }
        Some(type_proto::Value::MapType(m)) => {
            out.extend(m.key_type);
            if let Some(inner) = m.value_type.as_deref() {
                collect_elem_types(inner, out);
            }
        }
        Some(type_proto::Value::OpaqueType(_)) | None => {}
    }
}

// ── Constructors ───────────────────────────────────────────────────

/// Builds a tensor value declaration with the given element type and shape.
pub fn tensor_value_info(name: &str, dtype: DType, shape: &Shape) -> ValueInfoProto {
    ValueInfoProto {
        name: Some(name.to_string()),
        r#type: Some(TypeProto {
            denotation: None,
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: Some(dtype.code()),
                shape: Some(shape_to_proto(shape)),
            })),
        }),
        ..Default::default()
    }
}

/// Copies a declaration under a new name and element type.
///
/// Non-tensor declarations are copied with their type unchanged.
pub fn retyped_value_info(info: &ValueInfoProto, name: &str, dtype: DType) -> ValueInfoProto {
    let mut copy = info.clone();
    copy.name = Some(name.to_string());
    copy.doc_string = None;
    set_tensor_elem_type(&mut copy, dtype);
    copy
}

/// Builds a node in the default domain.
pub fn make_node(
    op_type: &str,
    name: &str,
    inputs: &[&str],
    outputs: &[&str],
    attributes: Vec<AttributeProto>,
) -> NodeProto {
    NodeProto {
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: outputs.iter().map(|s| s.to_string()).collect(),
        name: Some(name.to_string()),
        op_type: Some(op_type.to_string()),
        attribute: attributes,
        ..Default::default()
    }
}

/// Builds a `Cast` node converting `input` into `output` of type `to`.
pub fn make_cast_node(name: &str, input: &str, output: &str, to: DType) -> NodeProto {
    make_node(
        "Cast",
        name,
        &[input],
        &[output],
        vec![int_attribute("to", i64::from(to.code()))],
    )
}

/// Builds an integer attribute.
pub fn int_attribute(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: Some(name.to_string()),
        r#type: Some(AttributeType::Int as i32),
        i: Some(value),
        ..Default::default()
    }
}

/// Builds a tensor-valued attribute.
pub fn tensor_attribute(name: &str, tensor: TensorProto) -> AttributeProto {
    AttributeProto {
        name: Some(name.to_string()),
        r#type: Some(AttributeType::Tensor as i32),
        t: Some(tensor),
        ..Default::default()
    }
}

/// Builds a subgraph-valued attribute.
pub fn graph_attribute(name: &str, graph: GraphProto) -> AttributeProto {
    AttributeProto {
        name: Some(name.to_string()),
        r#type: Some(AttributeType::Graph as i32),
        g: Some(graph),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_value_info_roundtrip() {
        let shape = Shape::new(vec![Dim::Fixed(1), Dim::Symbolic("token_len".into())]);
        let info = tensor_value_info("input_ids", DType::I64, &shape);
        assert_eq!(value_name(&info), "input_ids");
        assert_eq!(tensor_dtype(&info), Some(DType::I64));
        assert_eq!(declared_shape(&info), Some(shape));
    }

    #[test]
    fn test_set_elem_type() {
        let mut info = tensor_value_info("x", DType::I64, &Shape::scalar());
        assert!(set_tensor_elem_type(&mut info, DType::I32));
        assert_eq!(tensor_dtype(&info), Some(DType::I32));

        let mut untyped = ValueInfoProto::default();
        assert!(!set_tensor_elem_type(&mut untyped, DType::I32));
    }

    #[test]
    fn test_nested_elem_types() {
        let inner = TypeProto {
            denotation: None,
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: Some(DType::I64.code()),
                shape: None,
            })),
        };
        let mut seq = TypeProto {
            denotation: None,
            value: Some(type_proto::Value::MapType(type_proto::Map {
                key_type: Some(DType::I64.code()),
                value_type: Some(Box::new(TypeProto {
                    denotation: None,
                    value: Some(type_proto::Value::SequenceType(type_proto::Sequence {
                        elem_type: Some(Box::new(inner)),
                    })),
                })),
            })),
        };
        assert_eq!(elem_types(&seq), vec![7, 7]);
        for code in elem_types_mut(&mut seq) {
            *code = Some(DType::I32.code());
        }
        assert_eq!(elem_types(&seq), vec![6, 6]);
    }

    #[test]
    fn test_cast_node() {
        let node = make_cast_node("c", "a", "b", DType::F32);
        assert_eq!(op_type(&node), "Cast");
        assert_eq!(find_attribute(&node, "to").and_then(|a| a.i), Some(1));
        assert!(is_default_domain(&node));
    }

    #[test]
    fn test_undeclared_shape_is_none() {
        let mut info = tensor_value_info("x", DType::F32, &Shape::scalar());
        if let Some(type_proto::Value::TensorType(t)) =
            info.r#type.as_mut().and_then(|t| t.value.as_mut())
        {
            t.shape = None;
        }
        assert_eq!(declared_shape(&info), None);
    }
}
