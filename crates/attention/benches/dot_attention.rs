use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use layers::mask_from_lengths;

fn bench_dot_attention(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 8usize;
    let hidden = 150usize;
    let weight_dim = 75usize;
    let shapes = &[(128usize, 32usize), (400, 40)];
    let dtypes = &[DType::F32, DType::BF16];

    for &dtype in dtypes {
        let mut group = c.benchmark_group(format!("dot_attention/{dtype:?}"));
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, dtype, &device);

        for &(plen, qlen) in shapes {
            let value = Tensor::randn(0f32, 1.0, (batch, plen, hidden), &device)
                .expect("value")
                .to_dtype(dtype)
                .expect("cast value");
            let memory = Tensor::randn(0f32, 1.0, (batch, qlen, hidden), &device)
                .expect("memory")
                .to_dtype(dtype)
                .expect("cast memory");
            let lengths: Vec<u32> = (0..batch).map(|b| (qlen - b) as u32).collect();
            let lengths = Tensor::from_vec(lengths, batch, &device).expect("lengths");
            let mask = mask_from_lengths(&lengths, qlen, &device).expect("mask");

            let elements = (batch * plen * qlen * weight_dim) as u64;
            group.throughput(Throughput::Elements(elements));
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{plen}x{qlen}")),
                &(value, memory, mask),
                |b, (value, memory, mask)| {
                    b.iter(|| {
                        let out = attention::dot_attention(
                            black_box(value),
                            black_box(memory),
                            mask,
                            weight_dim,
                            1.0,
                            vb.pp("attention"),
                        )
                        .expect("forward");
                        black_box(out);
                    });
                },
            );
        }
        group.finish();
    }
}

criterion_group!(benches, bench_dot_attention);
criterion_main!(benches);
