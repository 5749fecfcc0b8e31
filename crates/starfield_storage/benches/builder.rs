use starfield_core::prelude::*;
use starfield_storage::prelude::*;
use utilities::data_sets::random_star_catalog;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn build_random_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_random_catalog");
    for num_stars in [10_000, 100_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_stars),
            num_stars,
            |b, &num_stars| {
                b.iter_with_setup(
                    || random_star_catalog(num_stars, 1000.0),
                    |catalog| {
                        OctreeBuilder::new(BuildParams {
                            max_points_per_node: 1000,
                            ..Default::default()
                        })
                        .build(catalog, &BrightnessOrder)
                    },
                );
            },
        );
    }
    group.finish();
}

fn visit_built_octree(c: &mut Criterion) {
    let mut group = c.benchmark_group("visit_built_octree");
    for num_stars in [10_000, 100_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_stars),
            num_stars,
            |b, &num_stars| {
                let built = OctreeBuilder::new(BuildParams {
                    max_points_per_node: 100,
                    ..Default::default()
                })
                .build(random_star_catalog(num_stars, 1000.0), &BrightnessOrder)
                .unwrap();

                b.iter(|| {
                    built
                        .octree
                        .visit_preorder(&mut |_: NodeIndex, node: &OctreeNode| {
                            black_box(node);

                            VisitStatus::Continue
                        })
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, build_random_catalog, visit_built_octree);
criterion_main!(benches);
