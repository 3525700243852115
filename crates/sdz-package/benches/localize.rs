use criterion::{Criterion, criterion_group, criterion_main};
use sdz_core::MemoryResolver;
use sdz_core::config::LayoutPolicy;
use sdz_layer::format::encode;
use sdz_layer::{AttrValue, LayerData, LayerFormat, LayerRegistry, Prim};
use sdz_package::localize::localize;
use sdz_package::{PackageRequest, Packager};
use std::hint::black_box;

/// A root layer with `count` props, each pulling a texture whose base name
/// repeats every 10 props to force collisions.
fn build_scene(count: usize) -> MemoryResolver {
    let mut scene = LayerData::default();
    let mut resolver = MemoryResolver::new();
    for i in 0..count {
        let tex = format!("set_{}/tex_{}.png", i / 10, i % 10);
        scene = scene.with_prim(
            Prim::new(format!("Prop_{}", i)).with_attribute("diffuse", AttrValue::Asset(tex.clone())),
        );
        resolver.insert_file(&format!("/s/{}", tex), vec![0u8; 256]);
    }
    resolver.insert_file("/s/scene.sda", encode(&scene, LayerFormat::Text).unwrap());
    resolver
}

fn bench_localize_1000(c: &mut Criterion) {
    let resolver = build_scene(1000);
    let session = LayerRegistry::new();
    let discovery = Packager::new(&resolver, &session)
        .discover("/s/scene.sda", None)
        .unwrap();

    c.bench_function("localize_flat_1000_assets", |b| {
        b.iter(|| localize(black_box(&discovery.graph), None, LayoutPolicy::Flat).unwrap())
    });
}

fn bench_plan_500(c: &mut Criterion) {
    let resolver = build_scene(500);
    let session = LayerRegistry::new();
    let packager = Packager::new(&resolver, &session);
    let request = PackageRequest::new("/s/scene.sda", "bench.sdz");

    c.bench_function("plan_500_assets", |b| {
        b.iter(|| packager.plan(black_box(&request)).unwrap())
    });
}

criterion_group!(benches, bench_localize_1000, bench_plan_500);
criterion_main!(benches);
