use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;
use transit_graph::{expand_k_hops, DeepContext, Edge, Node, Pathfinder, TransitGraph};

/// Grid of lines: `lines` parallel railways of `stations` each, with transfers at every column.
fn create_grid_graph(lines: usize, stations: usize) -> TransitGraph {
    let mut graph = TransitGraph::new();
    for l in 0..lines {
        let line_id = format!("Line{}", l);
        for s in 0..stations {
            let id = format!("L{}.S{}", l, s);
            graph.add_node(
                Node::new(&id)
                    .with_names(format!("駅{}", s), format!("Station{}", s))
                    .with_railway(&line_id)
                    .with_coords(35.6 + l as f64 * 0.01, 139.6 + s as f64 * 0.01),
            );
            if s > 0 {
                let prev = format!("L{}.S{}", l, s - 1);
                graph.add_edge(Edge::train(&prev, &id, &line_id, 120.0));
                graph.add_edge(Edge::train(&id, &prev, &line_id, 120.0));
            }
        }
    }
    for s in 0..stations {
        for a in 0..lines {
            for b in 0..lines {
                if a != b {
                    graph.add_edge(Edge::transfer(
                        format!("L{}.S{}", a, s),
                        format!("L{}.S{}", b, s),
                        300.0,
                    ));
                }
            }
        }
    }
    graph
}

fn bench_find_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_path");
    group.measurement_time(Duration::from_secs(5));

    for size in [20, 50, 100].iter() {
        let graph = Arc::new(create_grid_graph(5, *size));
        let pf = Pathfinder::new(graph);
        let goal = format!("L4.S{}", size - 1);

        group.bench_with_input(BenchmarkId::new("dry", size), size, |b, _| {
            b.iter(|| black_box(pf.find_path("L0.S0", &goal, &DeepContext::default())))
        });

        let rainy = DeepContext::default()
            .with_rain(true)
            .with_disabled_lines(["Line2"]);
        group.bench_with_input(BenchmarkId::new("rain_disabled_line", size), size, |b, _| {
            b.iter(|| black_box(pf.find_path("L0.S0", &goal, &rainy)))
        });
    }
    group.finish();
}

fn bench_k_hop_expansion(c: &mut Criterion) {
    let graph = create_grid_graph(5, 100);
    let seeds = vec!["L2.S50".to_string()];

    let mut group = c.benchmark_group("expand_k_hops");
    for hops in [1, 2, 3].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(hops), hops, |b, &hops| {
            b.iter(|| black_box(expand_k_hops(&graph, &seeds, hops, 64)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_path, bench_k_hop_expansion);
criterion_main!(benches);
