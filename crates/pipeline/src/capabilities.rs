// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Capability constraints of a downstream runtime.
//!
//! A [`RuntimeCapabilities`] value declares which element types the
//! consumer can execute and whether it accepts rank-0 inputs. [`check`]
//! lists every place in a document that violates those constraints, so a
//! converted model can be accepted or rejected before it is shipped.
//!
//! [`check`]: RuntimeCapabilities::check

use model_ir::document::Validated;
use model_ir::helpers::{declared_shape, elem_types, value_name};
use model_ir::protos::onnx::ValueInfoProto;
use model_ir::sites::{constant_attribute_dtype, visit_sites, ValueSite};
use model_ir::tensor::{tensor_dtype_code, tensor_name};
use model_ir::ModelDocument;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use tensor_core::{describe_code, DType};

/// What a downstream runtime can execute.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeCapabilities {
    pub name: String,
    pub supported_dtypes: BTreeSet<DType>,
    pub supports_rank0: bool,
}

/// One place where a document exceeds the runtime's capabilities.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A site declares an element type the runtime lacks.
    UnsupportedDType { site: String, dtype: String },
    /// A graph input is declared with no dimensions.
    ScalarInput { input: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnsupportedDType { site, dtype } => {
                write!(f, "{site}: unsupported element type {dtype}")
            }
            Violation::ScalarInput { input } => {
                write!(f, "input '{input}': rank-0 tensors are not supported")
            }
        }
    }
}

impl RuntimeCapabilities {
    /// The Unity Sentis preset: 32-bit integers, half and single precision
    /// floats and booleans, no scalars.
    pub fn sentis() -> Self {
        Self {
            name: "sentis".to_string(),
            supported_dtypes: [DType::I32, DType::F16, DType::F32, DType::Bool]
                .into_iter()
                .collect(),
            supports_rank0: false,
        }
    }

    /// Returns `true` if `dtype` can be executed.
    pub fn supports(&self, dtype: DType) -> bool {
        self.supported_dtypes.contains(&dtype)
    }

    /// Lists every violation in `doc`, including nested subgraphs.
    ///
    /// Undefined element types (`0`) are ignored; they occur on values whose
    /// type the exporter left open.
    pub fn check(&self, doc: &ModelDocument<Validated>) -> Vec<Violation> {
        let mut violations = Vec::new();
        let _ = visit_sites::<Infallible, _>(doc.graph(), &mut |site, depth| {
            let (label, codes) = describe_site(&site, depth);
            for code in codes {
                if code == DType::UNDEFINED_CODE {
                    continue;
                }
                let supported = DType::from_code(code).is_some_and(|d| self.supports(d));
                if !supported {
                    violations.push(Violation::UnsupportedDType {
                        site: label.clone(),
                        dtype: describe_code(code),
                    });
                }
            }
            Ok(())
        });

        if !self.supports_rank0 {
            for input in &doc.graph().input {
                if declared_shape(input).is_some_and(|s| s.is_scalar()) {
                    violations.push(Violation::ScalarInput {
                        input: value_name(input).to_string(),
                    });
                }
            }
        }
        violations
    }
}

/// Labels a site and collects the element type codes it carries.
fn describe_site(site: &ValueSite<'_>, depth: usize) -> (String, Vec<i32>) {
    let scope = if depth == 0 {
        String::new()
    } else {
        format!("subgraph[{depth}] ")
    };
    match site {
        ValueSite::GraphInput(info) => (
            format!("{scope}input '{}'", value_name(info)),
            info_codes(info),
        ),
        ValueSite::GraphOutput(info) => (
            format!("{scope}output '{}'", value_name(info)),
            info_codes(info),
        ),
        ValueSite::ValueInfo(info) => (
            format!("{scope}value '{}'", value_name(info)),
            info_codes(info),
        ),
        ValueSite::Initializer(t) => (
            format!("{scope}initializer '{}'", tensor_name(t)),
            vec![tensor_dtype_code(t)],
        ),
        ValueSite::SparseInitializer(s) => (
            format!(
                "{scope}sparse initializer '{}'",
                s.values.as_ref().map(tensor_name).unwrap_or("")
            ),
            s.values.iter().map(tensor_dtype_code).collect(),
        ),
        ValueSite::AttributeTensor { node, tensor } => (
            format!("{scope}node '{}' ({}) tensor attribute", node.name, node.op_type),
            vec![tensor_dtype_code(tensor)],
        ),
        ValueSite::AttributeSparseTensor { node, tensor } => (
            format!("{scope}node '{}' ({}) sparse attribute", node.name, node.op_type),
            tensor.values.iter().map(tensor_dtype_code).collect(),
        ),
        ValueSite::DTypeAttribute { node, attr } => (
            format!(
                "{scope}node '{}' ({}) attribute '{}'",
                node.name,
                node.op_type,
                attr.name.as_deref().unwrap_or("")
            ),
            attr.i.and_then(|i| i32::try_from(i).ok()).into_iter().collect(),
        ),
        ValueSite::AttributeType { node, tp } => (
            format!("{scope}node '{}' ({}) type attribute", node.name, node.op_type),
            elem_types(tp),
        ),
        ValueSite::ConstantAttribute { node, attr } => (
            format!(
                "{scope}node '{}' ({}) attribute '{}'",
                node.name,
                node.op_type,
                attr.name.as_deref().unwrap_or("")
            ),
            constant_attribute_dtype(attr).map(DType::code).into_iter().collect(),
        ),
    }
}

fn info_codes(info: &ValueInfoProto) -> Vec<i32> {
    info.r#type.as_ref().map(elem_types).unwrap_or_default()
}
