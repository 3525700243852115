use criterion::{Criterion, criterion_group, criterion_main};
use sdz_layer::format::{decode, encode};
use sdz_layer::{AttrValue, LayerData, LayerFormat, Prim};
use std::hint::black_box;

fn build_layer(prim_count: usize) -> LayerData {
    let mut data = LayerData::default().with_sublayer("base.sda");
    for i in 0..prim_count {
        let prim = Prim::new(format!("Prop_{}", i))
            .with_type("Mesh")
            .with_reference(format!("props/prop_{}.sda", i % 10))
            .with_attribute("diffuse", AttrValue::Asset(format!("tex/prop_{}.png", i)))
            .with_attribute("size", AttrValue::Float(i as f64))
            .with_child(Prim::new("Material").with_payload("mat.sdc"));
        data = data.with_prim(prim);
    }
    data
}

fn bench_encode_text_500(c: &mut Criterion) {
    let data = build_layer(500);
    c.bench_function("encode_text_500_prims", |b| {
        b.iter(|| encode(black_box(&data), LayerFormat::Text).unwrap())
    });
}

fn bench_encode_binary_500(c: &mut Criterion) {
    let data = build_layer(500);
    c.bench_function("encode_binary_500_prims", |b| {
        b.iter(|| encode(black_box(&data), LayerFormat::Binary).unwrap())
    });
}

fn bench_decode_binary_500(c: &mut Criterion) {
    let bytes = encode(&build_layer(500), LayerFormat::Binary).unwrap();
    c.bench_function("decode_binary_500_prims", |b| {
        b.iter(|| decode(black_box(&bytes), None).unwrap())
    });
}

fn bench_enumerate_references(c: &mut Criterion) {
    let data = build_layer(500);
    c.bench_function("enumerate_references_500_prims", |b| {
        b.iter(|| black_box(&data).references())
    });
}

criterion_group!(
    benches,
    bench_encode_text_500,
    bench_encode_binary_500,
    bench_decode_binary_500,
    bench_enumerate_references,
);
criterion_main!(benches);
