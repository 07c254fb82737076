use bref4::bits::packed_array::{read_packed_array, write_packed_array, IndexArray};
use bref4::bits::restricted_int::{read_restricted_int, write_restricted_int};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn restricted_ints(n: usize) -> Vec<i64> {
    (0..n as i64).map(|i| (i * 997) % 5_000_000).collect()
}

fn benchmark_restricted_int_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("restricted_int::write");
    for n in [1_000usize, 100_000] {
        let values = restricted_ints(n);
        group.bench_with_input(BenchmarkId::new("n", n), &values, |b, values| {
            b.iter(|| {
                let mut buf = Vec::new();
                for &v in values {
                    write_restricted_int(black_box(v), &mut buf).unwrap();
                }
                buf
            })
        });
    }
}

fn benchmark_restricted_int_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("restricted_int::read");
    for n in [1_000usize, 100_000] {
        let values = restricted_ints(n);
        let mut buf = Vec::new();
        for &v in &values {
            write_restricted_int(v, &mut buf).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("n", n), &buf, |b, buf| {
            b.iter(|| {
                let mut input: &[u8] = buf;
                let mut total = 0i64;
                while !input.is_empty() {
                    let (rest, v) = read_restricted_int(input).unwrap();
                    total = total.wrapping_add(v);
                    input = rest;
                }
                black_box(total)
            })
        });
    }
}

fn benchmark_packed_array_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("packed_array::roundtrip");
    for (length, value_size) in [(1_000usize, 16u32), (100_000, 256), (100_000, 4)] {
        let values: Vec<u32> = (0..length as u32).map(|i| i % value_size).collect();
        let arr = IndexArray::new(values, value_size);
        group.bench_with_input(
            BenchmarkId::new(format!("value_size={value_size}"), length),
            &arr,
            |b, arr| {
                b.iter(|| {
                    let mut buf = Vec::new();
                    write_packed_array(black_box(arr), &mut buf).unwrap();
                    let (_, decoded) = read_packed_array(arr.len(), &buf).unwrap();
                    decoded
                })
            },
        );
    }
}

criterion_group!(
    benches,
    benchmark_restricted_int_write,
    benchmark_restricted_int_read,
    benchmark_packed_array_roundtrip
);
criterion_main!(benches);
