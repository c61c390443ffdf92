// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integer-width normalization: `int64` → `int32` everywhere.
//!
//! Every typed-value site is visited once (see [`model_ir::sites`]):
//!
//! - declarations (graph inputs, outputs, `value_info`, type attributes):
//!   the element type tag is flipped, including tensor types nested in
//!   sequence, optional and map types;
//! - payloads (initializers, attribute tensors, sparse values): decoded,
//!   narrowed element-wise and re-encoded in the same storage form;
//! - dtype attributes (`Cast.to`, `dtype`): `INT64` becomes `INT32`; any
//!   code outside the known enumeration aborts the pass;
//! - `Constant` `value_int` / `value_ints`: replaced by an `int32` `value`
//!   tensor of the same shape.
//!
//! Sparse *indices* stay `int64`: they are addressing data, not a value.
//!
//! Narrowing truncates by default. With [`IntWidthNormalizer::checked`] a
//! value outside the `i32` range aborts the pass instead.

use crate::payload::narrow_int64_tensor;
use crate::{GraphPass, PassError, PassStats};
use model_ir::helpers::{attribute_name, elem_types_mut, tensor_attribute};
use model_ir::protos::onnx::{GraphProto, TensorProto, TypeProto};
use model_ir::sites::{constant_attribute_dtype, constant_attribute_tensor, visit_sites_mut, ValueSiteMut};
use model_ir::tensor::has_dtype;
use tensor_core::{DType, RangePolicy};

/// Rewrites every `int64` occurrence to `int32`.
#[derive(Debug, Clone, Default)]
pub struct IntWidthNormalizer {
    policy: RangePolicy,
}

impl IntWidthNormalizer {
    /// Creates a truncating normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalizer that rejects values outside the `i32` range.
    pub fn checked() -> Self {
        Self {
            policy: RangePolicy::Checked,
        }
    }

    /// Creates a normalizer with an explicit range policy.
    pub fn with_policy(policy: RangePolicy) -> Self {
        Self { policy }
    }

    fn narrow_type(tp: &mut TypeProto) -> usize {
        let mut rewritten = 0;
        for code in elem_types_mut(tp) {
            if *code == Some(DType::I64.code()) {
                *code = Some(DType::I32.code());
                rewritten += 1;
            }
        }
        rewritten
    }

    fn narrow_tensor(&self, tensor: &mut TensorProto) -> Result<usize, PassError> {
        if !has_dtype(tensor, DType::I64) {
            return Ok(0);
        }
        narrow_int64_tensor(tensor, self.policy)?;
        Ok(1)
    }
}

impl GraphPass for IntWidthNormalizer {
    fn name(&self) -> &str {
        "int-width"
    }

    fn run(&self, graph: &mut GraphProto) -> Result<PassStats, PassError> {
        let mut rewrites = 0usize;

        visit_sites_mut(graph, &mut |site, depth| {
            rewrites += match site {
                ValueSiteMut::GraphInput(info)
                | ValueSiteMut::GraphOutput(info)
                | ValueSiteMut::ValueInfo(info) => {
                    info.r#type.as_mut().map(Self::narrow_type).unwrap_or(0)
                }
                ValueSiteMut::AttributeType { tp, .. } => Self::narrow_type(tp),
                ValueSiteMut::Initializer(tensor) => self.narrow_tensor(tensor)?,
                ValueSiteMut::AttributeTensor { node, tensor } => {
                    let n = self.narrow_tensor(tensor)?;
                    if n > 0 {
                        tracing::debug!("node '{}' ({}): attribute tensor int64 -> int32", node.name, node.op_type);
                    }
                    n
                }
                ValueSiteMut::ConstantAttribute { node, attr } => {
                    if constant_attribute_dtype(attr) != Some(DType::I64) {
                        return Ok(());
                    }
                    let Some(mut tensor) = constant_attribute_tensor(attr) else {
                        return Ok(());
                    };
                    narrow_int64_tensor(&mut tensor, self.policy)?;
                    tracing::debug!(
                        "node '{}' (Constant): {} -> int32 value tensor",
                        node.name,
                        attribute_name(attr)
                    );
                    *attr = tensor_attribute("value", tensor);
                    1
                }
                ValueSiteMut::SparseInitializer(sparse)
                | ValueSiteMut::AttributeSparseTensor { tensor: sparse, .. } => match sparse.values.as_mut() {
                    Some(values) => self.narrow_tensor(values)?,
                    None => 0,
                },
                ValueSiteMut::DTypeAttribute { node, attr } => {
                    let Some(code) = attr.i else {
                        return Ok(());
                    };
                    let dtype = DType::try_from_code(code).map_err(|_| {
                        PassError::UnsupportedAttributeType {
                            node: node.name.to_string(),
                            op_type: node.op_type.to_string(),
                            attribute: attribute_name(attr).to_string(),
                            code,
                        }
                    })?;
                    if dtype == DType::I64 {
                        attr.i = Some(i64::from(DType::I32.code()));
                        tracing::debug!(
                            "node '{}' ({}) at depth {}: {} = int64 -> int32",
                            node.name,
                            node.op_type,
                            depth,
                            attribute_name(attr)
                        );
                        1
                    } else {
                        0
                    }
                }
            };
            Ok::<(), PassError>(())
        })?;

        tracing::info!("int-width: {rewrites} int64 occurrence(s) rewritten to int32");
        Ok(PassStats {
            rewrites,
            ..PassStats::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::helpers::{
        graph_attribute, int_attribute, make_cast_node, make_node, tensor_attribute,
        tensor_dtype, tensor_value_info,
    };
    use model_ir::protos::onnx::SparseTensorProto;
    use model_ir::tensor::{make_tensor, read_payload, PayloadStorage};
    use tensor_core::{Shape, TensorData};

    fn graph() -> GraphProto {
        GraphProto {
            input: vec![tensor_value_info("ids", DType::I64, &Shape::fixed(&[1, 4]))],
            output: vec![tensor_value_info("y", DType::I64, &Shape::fixed(&[4]))],
            value_info: vec![tensor_value_info("s", DType::I64, &Shape::fixed(&[1]))],
            initializer: vec![make_tensor(
                "range",
                &[4],
                &TensorData::I64(vec![0, 1, 2, 3]),
                PayloadStorage::Typed,
            )],
            node: vec![
                make_node(
                    "Constant",
                    "shape_const",
                    &[],
                    &["s"],
                    vec![tensor_attribute(
                        "value",
                        make_tensor("", &[1], &TensorData::I64(vec![4]), PayloadStorage::Raw),
                    )],
                ),
                make_node("Reshape", "reshape", &["ids", "s"], &["flat"], vec![]),
                make_cast_node("cast", "flat", "y", DType::I64),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_rewrites_every_site() {
        let mut g = graph();
        let stats = IntWidthNormalizer::new().run(&mut g).unwrap();
        // input, output, value_info, initializer, constant, cast
        assert_eq!(stats.rewrites, 6);
        assert_eq!(tensor_dtype(&g.input[0]), Some(DType::I32));
        assert_eq!(tensor_dtype(&g.output[0]), Some(DType::I32));
        assert_eq!(tensor_dtype(&g.value_info[0]), Some(DType::I32));
        assert_eq!(read_payload(&g.initializer[0]).unwrap(), TensorData::I32(vec![0, 1, 2, 3]));
        let constant = g.node[0].attribute[0].t.as_ref().unwrap();
        assert_eq!(read_payload(constant).unwrap(), TensorData::I32(vec![4]));
        assert_eq!(g.node[2].attribute[0].i, Some(6));
    }

    #[test]
    fn test_constant_list_and_scalar_attributes() {
        use model_ir::protos::onnx::AttributeProto;

        let mut g = GraphProto {
            input: vec![tensor_value_info("x", DType::I64, &Shape::fixed(&[2]))],
            output: vec![tensor_value_info("y", DType::I64, &Shape::fixed(&[2]))],
            node: vec![
                make_node(
                    "Constant",
                    "offsets",
                    &[],
                    &["c"],
                    vec![AttributeProto {
                        name: Some("value_ints".into()),
                        ints: vec![0, 1],
                        ..Default::default()
                    }],
                ),
                make_node(
                    "Constant",
                    "step",
                    &[],
                    &["s"],
                    vec![AttributeProto {
                        name: Some("value_int".into()),
                        i: Some(3),
                        ..Default::default()
                    }],
                ),
                make_node("Add", "add", &["x", "c"], &["xc"], vec![]),
                make_node("Add", "add_step", &["xc", "s"], &["y"], vec![]),
            ],
            ..Default::default()
        };
        let pass = IntWidthNormalizer::new();
        let stats = pass.run(&mut g).unwrap();
        // input, output, two constants
        assert_eq!(stats.rewrites, 4);

        let offsets = &g.node[0].attribute[0];
        assert_eq!(offsets.name.as_deref(), Some("value"));
        assert!(offsets.ints.is_empty());
        let t = offsets.t.as_ref().unwrap();
        assert_eq!(t.dims, vec![2]);
        assert_eq!(read_payload(t).unwrap(), TensorData::I32(vec![0, 1]));

        let step = g.node[1].attribute[0].t.as_ref().unwrap();
        assert!(step.dims.is_empty());
        assert_eq!(read_payload(step).unwrap(), TensorData::I32(vec![3]));

        let once = g.clone();
        assert!(pass.run(&mut g).unwrap().is_noop());
        assert_eq!(g, once);
    }

    #[test]
    fn test_idempotent() {
        let mut g = graph();
        let pass = IntWidthNormalizer::new();
        pass.run(&mut g).unwrap();
        let once = g.clone();
        let stats = pass.run(&mut g).unwrap();
        assert_eq!(stats.rewrites, 0);
        assert_eq!(g, once);
    }

    #[test]
    fn test_other_types_untouched() {
        let mut g = GraphProto {
            input: vec![tensor_value_info("x", DType::F32, &Shape::fixed(&[2]))],
            output: vec![tensor_value_info("y", DType::I32, &Shape::fixed(&[2]))],
            node: vec![make_cast_node("c", "x", "y", DType::I32)],
            ..Default::default()
        };
        let before = g.clone();
        let stats = IntWidthNormalizer::new().run(&mut g).unwrap();
        assert!(stats.is_noop());
        assert_eq!(g, before);
    }

    #[test]
    fn test_unknown_cast_target_is_error() {
        let mut g = graph();
        g.node[2].attribute[0].i = Some(99);
        let err = IntWidthNormalizer::new().run(&mut g).unwrap_err();
        assert!(matches!(
            err,
            PassError::UnsupportedAttributeType { code: 99, ref op_type, .. } if op_type == "Cast"
        ));
    }

    #[test]
    fn test_dtype_attribute_ops() {
        let mut g = graph();
        g.node.push(make_node(
            "RandomUniformLike",
            "noise",
            &["flat"],
            &["r"],
            vec![int_attribute("dtype", 7), int_attribute("seed", 7)],
        ));
        IntWidthNormalizer::new().run(&mut g).unwrap();
        assert_eq!(g.node[3].attribute[0].i, Some(6));
        // Not a dtype attribute.
        assert_eq!(g.node[3].attribute[1].i, Some(7));
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let mut g = graph();
        g.initializer[0].int64_data.clear();
        let err = IntWidthNormalizer::new().run(&mut g).unwrap_err();
        assert!(matches!(err, PassError::Model(model_ir::ModelError::MalformedTensor { .. })));
    }

    #[test]
    fn test_checked_policy() {
        let mut g = graph();
        g.initializer[0] = make_tensor(
            "range",
            &[2],
            &TensorData::I64(vec![0, i64::from(i32::MAX) + 1]),
            PayloadStorage::Raw,
        );
        assert!(IntWidthNormalizer::checked().run(&mut g.clone()).is_err());

        IntWidthNormalizer::new().run(&mut g).unwrap();
        assert_eq!(
            read_payload(&g.initializer[0]).unwrap(),
            TensorData::I32(vec![0, i32::MIN])
        );
    }

    #[test]
    fn test_subgraph_and_sparse_sites() {
        let body = GraphProto {
            output: vec![tensor_value_info("inner", DType::I64, &Shape::fixed(&[1]))],
            node: vec![make_cast_node("inner_cast", "s", "inner", DType::I64)],
            ..Default::default()
        };
        let mut g = graph();
        g.node.push(make_node(
            "If",
            "branch",
            &["cond"],
            &["z"],
            vec![graph_attribute("then_branch", body)],
        ));
        g.sparse_initializer.push(SparseTensorProto {
            values: Some(make_tensor("sp", &[2], &TensorData::I64(vec![5, 6]), PayloadStorage::Typed)),
            indices: Some(make_tensor("sp_idx", &[2], &TensorData::I64(vec![0, 3]), PayloadStorage::Typed)),
            dims: vec![4],
        });

        let stats = IntWidthNormalizer::new().run(&mut g).unwrap();
        assert_eq!(stats.rewrites, 6 + 2 + 1);

        let body = g.node[3].attribute[0].g.as_ref().unwrap();
        assert_eq!(tensor_dtype(&body.output[0]), Some(DType::I32));
        assert_eq!(body.node[0].attribute[0].i, Some(6));

        let sparse = &g.sparse_initializer[0];
        assert_eq!(read_payload(sparse.values.as_ref().unwrap()).unwrap(), TensorData::I32(vec![5, 6]));
        assert!(has_dtype(sparse.indices.as_ref().unwrap(), DType::I64));
    }
}
