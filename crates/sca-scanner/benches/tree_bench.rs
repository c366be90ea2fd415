//! 의존성 트리 벤치마크
//!
//! 트리 구성과 영향 경로 계산 성능을 측정합니다.

use std::collections::{HashMap, HashSet};

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use vigil_sca_scanner::{DependencyEntry, build_dependency_tree, impact_paths};

/// 층마다 `width`개 노드가 있고 각 노드가 다음 층 전체에 의존하는 맵
///
/// 공유 하위 트리가 많아 구체화된 트리가 급격히 커집니다.
fn layered_map(layers: usize, width: usize) -> HashMap<String, DependencyEntry> {
    let id = |layer: usize, i: usize| format!("cargo://l{layer}n{i}:1.0.0");
    let mut nodes = HashMap::new();
    nodes.insert(
        "root".to_owned(),
        DependencyEntry::new((0..width).map(|i| id(0, i))),
    );
    for layer in 0..layers {
        for i in 0..width {
            let children: Vec<String> = if layer + 1 < layers {
                (0..width).map(|j| id(layer + 1, j)).collect()
            } else {
                Vec::new()
            };
            nodes.insert(id(layer, i), DependencyEntry { children });
        }
    }
    nodes
}

/// 깊이 `depth`의 단일 체인
fn chain_map(depth: usize) -> HashMap<String, DependencyEntry> {
    (0..depth)
        .map(|i| {
            let children = if i + 1 < depth {
                vec![format!("n{}", i + 1)]
            } else {
                Vec::new()
            };
            (format!("n{i}"), DependencyEntry { children })
        })
        .collect()
}

fn bench_tree_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_dependency_tree");

    let chain = chain_map(1_000);
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("chain_1000", |b| {
        b.iter(|| build_dependency_tree(black_box(&chain), "n0"));
    });

    let layered = layered_map(4, 6);
    group.bench_function("layered_4x6", |b| {
        b.iter(|| build_dependency_tree(black_box(&layered), "root"));
    });

    group.finish();
}

fn bench_impact_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("impact_paths");

    let (tree, unique) = build_dependency_tree(&layered_map(4, 6), "root");
    let leaves: HashSet<String> = unique
        .into_iter()
        .filter(|id| id.contains("l3"))
        .collect();
    group.throughput(Throughput::Elements(tree.size() as u64));
    group.bench_function("layered_4x6_leaves", |b| {
        b.iter(|| impact_paths(black_box(&tree), black_box(&leaves)));
    });

    group.finish();
}

criterion_group!(benches, bench_tree_building, bench_impact_paths);
criterion_main!(benches);
