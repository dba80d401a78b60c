use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use plotweave::classify::{ComponentClassifier, LogicClassifier};
use plotweave::labels::NoNames;
use plotweave::model::{GraphEdge, GraphNode, GraphSnapshot, NodeType};
use plotweave::render::render_svg;
use plotweave::scene::Scene;
use plotweave::store::MemoryStore;
use plotweave::{Config, MergeMode, Session, compute_layout, reconcile};
use std::hint::black_box;

/// `nodes` nodes split into chains of `chain_len`, each a fan-out tree with
/// a few cross links. Every seventh node sits in one of `events` events.
fn story_graph(nodes: usize, chain_len: usize, events: usize) -> GraphSnapshot {
    let chain_len = chain_len.max(1);
    let mut snapshot = GraphSnapshot::default();
    for i in 0..nodes {
        let node_type = NodeType::ALL[i % NodeType::ALL.len()];
        let mut node = GraphNode::new(format!("n{i}"), node_type, format!("ref{}", i / 2));
        if events > 0 && i % 7 == 3 {
            node = node.in_event(format!("ev{}", i % events));
        }
        snapshot.nodes.push(node);
    }
    let mut edge = 0usize;
    for start in (0..nodes).step_by(chain_len) {
        let end = (start + chain_len).min(nodes);
        for i in start + 1..end {
            let parent = start + (i - start - 1) / 2;
            snapshot
                .edges
                .push(GraphEdge::new(format!("e{edge}"), format!("n{parent}"), format!("n{i}")));
            edge += 1;
        }
        if end - start > 3 {
            snapshot
                .edges
                .push(GraphEdge::new(format!("e{edge}"), format!("n{}", end - 1), format!("n{start}")));
            edge += 1;
        }
    }
    snapshot
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = Config::default();
    for (nodes, chain_len, events) in [(20usize, 5usize, 2usize), (200, 12, 8), (1000, 25, 20)] {
        let snapshot = story_graph(nodes, chain_len, events);
        let assignment = ComponentClassifier::new()
            .compute_logics(&snapshot)
            .expect("classification failed");
        let name = format!("story_{nodes}_{chain_len}_{events}");
        group.bench_with_input(BenchmarkId::from_parameter(name), &snapshot, |b, snapshot| {
            b.iter(|| {
                let layout = compute_layout(black_box(snapshot), &assignment, &NoNames, &config.layout);
                black_box(layout.nodes.len());
            });
        });
    }
    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    let config = Config::default();
    for nodes in [200usize, 1000] {
        let snapshot = story_graph(nodes, 12, 8);
        let assignment = ComponentClassifier::new()
            .compute_logics(&snapshot)
            .expect("classification failed");
        let layout = compute_layout(&snapshot, &assignment, &NoNames, &config.layout);
        let (previous, _) = reconcile(None, &layout, MergeMode::Reconcile);
        for mode in [MergeMode::Append, MergeMode::Reconcile] {
            group.bench_with_input(BenchmarkId::new(format!("{mode:?}"), nodes), &layout, |b, layout| {
                b.iter(|| {
                    let (state, report) = reconcile(Some(black_box(&previous)), layout, mode);
                    black_box((state.len(), report.deferred.len()));
                });
            });
        }
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let config = Config::default();
    for nodes in [20usize, 200] {
        let snapshot = story_graph(nodes, 10, 4);
        let assignment = ComponentClassifier::new()
            .compute_logics(&snapshot)
            .expect("classification failed");
        let layout = compute_layout(&snapshot, &assignment, &NoNames, &config.layout);
        let (state, _) = reconcile(None, &layout, MergeMode::Reconcile);
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &layout, |b, layout| {
            b.iter(|| {
                let scene = Scene::build(black_box(layout), Some(&state), &assignment, &config);
                let svg = render_svg(&scene, &config);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

fn bench_session_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_cycle");
    for nodes in [50usize, 500] {
        let snapshot = story_graph(nodes, 10, 6);
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &snapshot, |b, snapshot| {
            b.iter(|| {
                let store = MemoryStore::with_graph(snapshot.nodes.clone(), snapshot.edges.clone());
                let mut session = Session::new(
                    Box::new(store),
                    Box::new(ComponentClassifier::new()),
                    Box::new(NoNames),
                    Config::default(),
                );
                session.load().expect("load failed");
                session.refresh().expect("refresh failed");
                black_box(session.state().map(|state| state.len()));
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_layout, bench_reconcile, bench_render, bench_session_cycle
);
criterion_main!(benches);
