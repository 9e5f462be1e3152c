use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use encoder::{Encoder, EncoderConfig};

fn bench_encoder(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 8usize;
    let input_dim = 64usize;
    let hidden = 75usize;
    let seq_lens = &[32usize, 128];
    let tags = &["lstm", "bilstm", "bigru", "birnn"];

    for &tag in tags {
        let mut group = c.benchmark_group(format!("encoder/{tag}"));
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = EncoderConfig::from_tag(tag, hidden)
            .expect("config")
            .with_layers(2);
        let encoder = Encoder::new(config, input_dim, vb).expect("encoder init");

        for &seq in seq_lens {
            let inputs =
                Tensor::randn(0f32, 1.0, (batch, seq, input_dim), &device).expect("inputs");
            let lengths: Vec<u32> = (0..batch).map(|b| (seq - b * seq / (2 * batch)) as u32).collect();
            let lengths = Tensor::from_vec(lengths, batch, &device).expect("lengths");
            group.throughput(Throughput::Elements((batch * seq) as u64));
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("seq{seq}")),
                &(inputs, lengths),
                |b, (inputs, lengths)| {
                    b.iter(|| {
                        let out = encoder
                            .forward(black_box(inputs), black_box(lengths))
                            .expect("forward");
                        black_box(out);
                    });
                },
            );
        }
        group.finish();
    }
}

criterion_group!(benches, bench_encoder);
criterion_main!(benches);
