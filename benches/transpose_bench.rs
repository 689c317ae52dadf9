use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tensor_copy::{copy, copy_transpose_blocked, DType, Tensor};

fn bench_transpose_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose_copy");
    for size in [100usize, 500, 1000] {
        let elements = size * size;
        group.throughput(Throughput::Elements(elements as u64));

        let src: Vec<f64> = (0..elements).map(|x| x as f64).collect();

        // naive: strided column walk, one element at a time.
        group.bench_with_input(BenchmarkId::new("naive", size), &size, |b, &n| {
            b.iter(|| {
                let mut dest = vec![0.0f64; n * n];
                for i in 0..n {
                    for j in 0..n {
                        dest[i * n + j] = src[i + j * n];
                    }
                }
                dest
            })
        });

        group.bench_with_input(BenchmarkId::new("blocked", size), &size, |b, &n| {
            b.iter(|| {
                let mut dest = vec![0.0f64; n * n];
                if let Err(err) = copy_transpose_blocked(&mut dest, &src, n, n) {
                    panic!("copy_transpose_blocked failed: {err}");
                }
                dest
            })
        });
    }
    group.finish();
}

fn bench_dispatcher(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_dispatch");
    for size in [100usize, 500, 1000] {
        let elements = size * size;
        group.throughput(Throughput::Elements(elements as u64));

        let matrix = Tensor::from_fn_row_major::<f64>(&[size, size], |idx| {
            (idx[0] * size + idx[1]) as f64
        });
        let transposed = matrix.t().unwrap();
        let dest = Tensor::zeros(&[size, size], DType::F64);

        // Contiguous pair: memcpy path through the elementwise backend.
        group.bench_with_input(BenchmarkId::new("contiguous", size), &size, |b, _| {
            b.iter(|| copy(&dest, &matrix, false).unwrap())
        });

        // Transposed source: blocked fast path for these sizes.
        group.bench_with_input(BenchmarkId::new("transposed", size), &size, |b, _| {
            b.iter(|| copy(&dest, &transposed, false).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transpose_copy, bench_dispatcher);
criterion_main!(benches);
