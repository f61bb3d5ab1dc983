use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lmdbview::layout::{Metrics, RowFormatter};
use lmdbview::scanner::{count_matching, fetch_page, Row};
use lmdbview::store::{KvStore, LmdbStore, MemoryStore};
use tempfile::TempDir;

/// Keys spread over `groups` prefixes, `per_group` keys each.
///
/// Keys look like `group_007:key_000123`, values are ~120 bytes of JSON.
fn benchmark_entries(groups: usize, per_group: usize) -> Vec<(String, String)> {
    let mut entries = Vec::with_capacity(groups * per_group);
    for g in 0..groups {
        for k in 0..per_group {
            entries.push((
                format!("group_{:03}:key_{:06}", g, k),
                format!(
                    r#"{{"group":{},"key":{},"payload":"{}"}}"#,
                    g,
                    k,
                    "x".repeat(80)
                ),
            ));
        }
    }
    entries
}

fn create_benchmark_lmdb(dir: &TempDir, groups: usize, per_group: usize) -> LmdbStore {
    let store = LmdbStore::open(dir.path(), 1 << 30).unwrap();
    for (key, value) in benchmark_entries(groups, per_group) {
        store.put(key.as_bytes(), value.as_bytes()).unwrap();
    }
    store
}

/// Benchmark page fetches at increasing depth into the prefix run
fn bench_fetch_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_page");

    let dir = TempDir::new().unwrap();
    let lmdb = create_benchmark_lmdb(&dir, 10, 1_000);
    let memory = MemoryStore::from_entries(benchmark_entries(10, 1_000));

    let stores: [(&str, &dyn KvStore); 2] = [("lmdb", &lmdb), ("memory", &memory)];
    for (name, store) in stores {
        for page in [1, 10, 40] {
            group.bench_with_input(BenchmarkId::new(name, page), &page, |b, &page| {
                b.iter(|| {
                    let mut rows = Vec::new();
                    store
                        .read(&mut |view| {
                            rows = fetch_page(view, black_box(b"group_005:"), page, 20)?;
                            Ok(())
                        })
                        .unwrap();
                    rows
                })
            });
        }
    }

    group.finish();
}

/// Benchmark counting a prefix run against counting the whole store
fn bench_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_matching");

    let dir = TempDir::new().unwrap();
    let lmdb = create_benchmark_lmdb(&dir, 10, 1_000);

    for prefix in ["", "group_005:", "group_005:key_0004"] {
        group.bench_with_input(BenchmarkId::new("lmdb", prefix), &prefix, |b, prefix| {
            b.iter(|| {
                let mut total = 0;
                lmdb.read(&mut |view| {
                    total = count_matching(view, black_box(prefix.as_bytes()))?;
                    Ok(())
                })
                .unwrap();
                total
            })
        });
    }

    group.finish();
}

/// Benchmark width fitting for pages of long values
fn bench_fit_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_rows");
    let formatter = RowFormatter::new(Metrics::TERMINAL).unwrap();

    for page_size in [20, 100] {
        let rows: Vec<Row> = (0..page_size)
            .map(|i| Row {
                key: format!("key_{:06}", i),
                value: "lorem ipsum dolor sit amet ".repeat(7),
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("page", page_size), &rows, |b, rows| {
            b.iter(|| {
                let mut page = rows.clone();
                formatter.fit(&mut page, black_box(90.0), false);
                page
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fetch_page, bench_count, bench_fit_rows);
criterion_main!(benches);
