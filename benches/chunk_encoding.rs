use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{Array, ArrayD, IxDyn};
use std::hint::black_box;
use zarrpublish::{
    CodecConfig, Dataset, DatasetAccess, EncodingOverrides, NdArraySource, Variable,
    VariableEncoding,
};

fn register(encoding: VariableEncoding) -> DatasetAccess {
    let data: ArrayD<f32> = Array::from_shape_fn(IxDyn(&[256, 256, 16]), |ix| {
        (ix[0] as f32).sin() + (ix[1] as f32).cos() + ix[2] as f32
    });
    let source = NdArraySource::new(data, vec!["y", "x", "z"]).expect("source");
    let dataset = Dataset::new().with_variable(
        "field",
        Variable::new(source).with_encoding(encoding.with_chunks(vec![64, 64, 16])),
    );
    DatasetAccess::register(dataset, &EncodingOverrides::new()).expect("register")
}

fn bench_chunks(c: &mut Criterion) {
    let raw = register(VariableEncoding::default());
    c.bench_function("chunk_raw", |b| {
        b.iter(|| raw.get_chunk(black_box("field"), black_box("1.2.0")))
    });

    let zlib = register(
        VariableEncoding::default()
            .with_filter(CodecConfig::new("shuffle").with("elementsize", 4))
            .with_compressor(CodecConfig::new("zlib").with("level", 1)),
    );
    c.bench_function("chunk_shuffle_zlib", |b| {
        b.iter(|| zlib.get_chunk(black_box("field"), black_box("1.2.0")))
    });

    let zstd = register(VariableEncoding::default().with_compressor(CodecConfig::new("zstd")));
    c.bench_function("chunk_zstd", |b| {
        b.iter(|| zstd.get_chunk(black_box("field"), black_box("1.2.0")))
    });
}

criterion_group!(benches, bench_chunks);
criterion_main!(benches);
