//! Comparison matrix benchmarks using Criterion.
//!
//! Run with: cargo bench

use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use viper_pe_rs::distances::FRAMESPAN;
use viper_pe_rs::{
    AttrMeasure, Attribute, AttributeValue, BBox, Category, CompMatrix, Descriptor, Equivalencies, FileInformation,
    FilterKind, FrameSpan, Level, MetricDefaults, Region, ScopeRules, ValueType,
};

fn scope() -> Arc<ScopeRules> {
    let defaults = MetricDefaults::new();
    let mut measures = BTreeMap::new();
    measures.insert(
        FRAMESPAN.to_string(),
        AttrMeasure::parse(ValueType::FrameSpan, "[dice .8]", &defaults).expect("valid measure"),
    );
    measures.insert(
        "box".to_string(),
        AttrMeasure::parse(ValueType::Region, "[dice .8]", &defaults).expect("valid measure"),
    );
    let mut scope = ScopeRules::new(Equivalencies::new());
    scope.add_descriptor(Category::Object, "PERSON", measures);
    Arc::new(scope)
}

/// Staggered tracks, `n` of them, each overlapping its neighbours.
fn create_descriptors(n: u32, id_base: u32, shift: u32) -> Vec<Descriptor> {
    (0..n)
        .map(|i| {
            let begin = i * 5 + shift;
            let area = Region::from_bbox(BBox::new((i * 8) as i64, 0, 10, 10));
            Descriptor::new(Category::Object, "PERSON", id_base + i, FrameSpan::new(begin, begin + 12))
                .with_attribute("box", Attribute::Static(Some(AttributeValue::Region(area))))
        })
        .collect()
}

fn create_matrix(n: u32) -> CompMatrix {
    CompMatrix::new(
        create_descriptors(n, 0, 0),
        create_descriptors(n, 10_000, 1),
        scope(),
        FileInformation::new("bench"),
    )
}

fn benchmark_initialize(c: &mut Criterion) {
    for n in [10, 50] {
        c.bench_function(&format!("matrix_localize_{}_objects", n), |b| {
            b.iter(|| {
                let mut m = create_matrix(black_box(n));
                m.bring_to_level(Level::Localized)
            })
        });
    }
}

fn benchmark_filter(c: &mut Criterion, kind: FilterKind, label: &str) {
    let mut base = create_matrix(50);
    base.bring_to_level(Level::Localized);

    c.bench_function(&format!("filter_{}_50_objects", label), |b| {
        b.iter(|| {
            let mut m = base.clone();
            m.remove_duplicates(black_box(kind))
        })
    });
}

fn benchmark_filters(c: &mut Criterion) {
    benchmark_filter(c, FilterKind::SingleGreedy, "greedy");
    benchmark_filter(c, FilterKind::SingleOptimum, "optimum");
    benchmark_filter(c, FilterKind::Multiple, "multiple");
}

criterion_group!(benches, benchmark_initialize, benchmark_filters);
criterion_main!(benches);
