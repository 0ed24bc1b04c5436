//! Benchmarks des requêtes point-dans-polygone
//!
//! Grille synthétique de polygones : parcours linéaire vs R-tree.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geo::{polygon, Geometry};
use serde_json::{Map, Value};
use zonestore::{IndexedLayer, Layer, LoadStats, QueryPoint, ZoneRecord};

fn grid_layer(side: usize) -> Layer {
    let step = 0.1 / side as f64;
    let mut records = Vec::with_capacity(side * side);

    for i in 0..side {
        for j in 0..side {
            let x = 153.0 + i as f64 * step;
            let y = -27.5 + j as f64 * step;
            let mut properties = Map::new();
            properties.insert("ZONE_CODE".into(), Value::String(format!("Z{}", (i + j) % 12)));
            records.push(ZoneRecord {
                id: records.len(),
                geometry: Geometry::Polygon(polygon![
                    (x: x, y: y),
                    (x: x + step, y: y),
                    (x: x + step, y: y + step),
                    (x: x, y: y + step),
                ]),
                properties,
            });
        }
    }

    Layer {
        name: "grid".into(),
        source_epsg: 4326,
        columns: vec!["ZONE_CODE".into()],
        stats: LoadStats {
            total: records.len(),
            kept: records.len(),
            ..Default::default()
        },
        records,
    }
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let point = QueryPoint::new(153.0251, -27.4698).unwrap();

    for side in [10usize, 50, 100] {
        let layer = grid_layer(side);
        let count = side * side;

        group.bench_with_input(BenchmarkId::new("linear", count), &layer, |b, layer| {
            b.iter(|| zonestore::query(black_box(point), layer))
        });

        let index = IndexedLayer::build(layer);
        group.bench_with_input(BenchmarkId::new("rtree", count), &index, |b, index| {
            b.iter(|| index.query(black_box(point)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
