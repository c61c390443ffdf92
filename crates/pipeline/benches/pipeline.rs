// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the compatibility stages over a synthetic transformer-like graph.

use compat_passes::{GraphPass, IntWidthNormalizer, PrecisionNarrower};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use model_ir::helpers::{make_node, tensor_value_info};
use model_ir::protos::onnx::{GraphProto, ModelProto};
use model_ir::tensor::{make_tensor, PayloadStorage};
use model_ir::{ModelDocument, ModelLoader};
use pipeline::{run_document, CompatConfig};
use tensor_core::{DType, Dim, Shape, TensorData};

/// Builds `blocks` attention-free transformer blocks of width `hidden`.
fn synthetic_graph(blocks: usize, hidden: usize) -> GraphProto {
    let seq = Shape::new(vec![Dim::Fixed(1), Dim::Symbolic("seq".into())]);
    let act = Shape::new(vec![
        Dim::Fixed(1),
        Dim::Symbolic("seq".into()),
        Dim::Fixed(hidden as i64),
    ]);
    let mut g = GraphProto {
        name: Some(format!("synthetic-{blocks}x{hidden}")),
        input: vec![
            tensor_value_info("ids", DType::I64, &seq),
            tensor_value_info("scale", DType::F32, &Shape::scalar()),
        ],
        ..Default::default()
    };
    let weights = |n: usize| TensorData::F32((0..n).map(|i| (i % 97) as f32 * 1e-3).collect());

    g.initializer.push(make_tensor("wte", &[256, hidden as i64], &weights(256 * hidden), PayloadStorage::Raw));
    g.node.push(make_node("Gather", "embed", &["wte", "ids"], &["h0"], vec![]));

    for b in 0..blocks {
        let x = format!("h{b}");
        let w = format!("block{b}.w");
        let bias = format!("block{b}.b");
        let steps = format!("block{b}.steps");
        g.initializer.push(make_tensor(&w, &[hidden as i64, hidden as i64], &weights(hidden * hidden), PayloadStorage::Raw));
        g.initializer.push(make_tensor(&bias, &[hidden as i64], &weights(hidden), PayloadStorage::Typed));
        g.initializer.push(make_tensor(&steps, &[2], &TensorData::I64(vec![1, -1]), PayloadStorage::Raw));
        g.value_info.push(tensor_value_info(&x, DType::F32, &act));

        let mm = format!("{x}.mm");
        let add = format!("{x}.add");
        let act_out = format!("{x}.gelu");
        let scaled = format!("{x}.scaled");
        let next = format!("h{}", b + 1);
        g.node.push(make_node("MatMul", &format!("block{b}.matmul"), &[x.as_str(), w.as_str()], &[mm.as_str()], vec![]));
        g.node.push(make_node("Add", &format!("block{b}.add"), &[mm.as_str(), bias.as_str()], &[add.as_str()], vec![]));
        g.node.push(make_node("Gelu", &format!("block{b}.gelu"), &[add.as_str()], &[act_out.as_str()], vec![]));
        g.node.push(make_node("Mul", &format!("block{b}.scale"), &[act_out.as_str(), "scale"], &[scaled.as_str()], vec![]));
        g.node.push(make_node("Add", &format!("block{b}.residual"), &[scaled.as_str(), x.as_str()], &[next.as_str()], vec![]));
    }

    let last = format!("h{blocks}");
    g.node.push(make_node("Identity", "head", &[last.as_str()], &["logits"], vec![]));
    g.output.push(tensor_value_info("logits", DType::F32, &act));
    g
}

fn document(blocks: usize, hidden: usize) -> ModelDocument<model_ir::document::Validated> {
    ModelDocument::new(ModelProto {
        ir_version: Some(8),
        graph: Some(synthetic_graph(blocks, hidden)),
        ..Default::default()
    })
    .validate()
    .unwrap_or_else(|e| panic!("synthetic graph invalid: {e}"))
}

fn bench_int_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("int_width");
    for blocks in [4, 12] {
        let graph = synthetic_graph(blocks, 64);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &graph, |b, graph| {
            b.iter(|| {
                let mut g = graph.clone();
                IntWidthNormalizer::new().run(black_box(&mut g)).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_precision(c: &mut Criterion) {
    let mut group = c.benchmark_group("precision");
    for blocks in [4, 12] {
        let graph = synthetic_graph(blocks, 64);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &graph, |b, graph| {
            b.iter(|| {
                let mut g = graph.clone();
                PrecisionNarrower::default().run(black_box(&mut g)).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let config = CompatConfig::default();
    let doc = document(12, 128);
    c.bench_function("pipeline_12x128", |b| {
        b.iter(|| run_document(black_box(doc.clone()), &config).unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let bytes = document(12, 128).encode_to_vec();
    c.bench_function("decode_12x128", |b| {
        b.iter(|| ModelLoader::from_bytes(black_box(&bytes)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_int_width,
    bench_precision,
    bench_full_pipeline,
    bench_decode
);
criterion_main!(benches);
