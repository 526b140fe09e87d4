use cpai::core::ScanControl;
use cpai::utils::tokens::Tokenizer;
use cpai::{SelectionPolicy, bundle, scan, scan_concurrent};
use criterion::{Criterion, criterion_group, criterion_main};
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

fn create_test_repo(file_count: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    std::fs::create_dir_all(root.join("src")).unwrap();

    for i in 0..file_count {
        let content = format!(
            r#"
/// File {} documentation
fn function_{}() -> i32 {{
    let x = {};
    println!("Computing...");
    x * 2
}}

struct Data{} {{
    id: u32,
    name: String,
}}
"#,
            i, i, i, i
        );

        let path = if i % 3 == 0 {
            root.join("src").join(format!("mod_{}.rs", i))
        } else {
            root.join(format!("file_{}.rs", i))
        };

        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    temp_dir
}

fn policy_for(temp: &TempDir) -> SelectionPolicy {
    SelectionPolicy {
        root: temp.path().to_path_buf(),
        ..Default::default()
    }
}

fn full_scan_benchmark(c: &mut Criterion) {
    let tokenizer = Tokenizer::acquire("o200k_base").unwrap();
    let mut group = c.benchmark_group("full_scan");
    group.sample_size(20);

    for count in [10, 100, 500] {
        let temp = create_test_repo(count);
        let policy = policy_for(&temp);

        group.bench_function(format!("{}_files_sequential", count), |b| {
            b.iter(|| scan(&policy, &tokenizer).unwrap())
        });

        let control = ScanControl {
            concurrency: 16,
            ..Default::default()
        };
        group.bench_function(format!("{}_files_concurrent", count), |b| {
            b.iter(|| scan_concurrent(&policy, &tokenizer, &control).unwrap())
        });
    }

    group.finish();
}

fn strict_pack_benchmark(c: &mut Criterion) {
    let tokenizer = Tokenizer::acquire("o200k_base").unwrap();
    let temp = create_test_repo(100);
    let policy = SelectionPolicy {
        max_tokens: Some(4_000),
        ..policy_for(&temp)
    };
    let eligible = scan(&policy, &tokenizer).unwrap().eligible();

    let mut group = c.benchmark_group("pack");
    group.sample_size(20);
    group.bench_function("strict_100_files_4k_budget", |b| {
        b.iter(|| bundle(&eligible, &policy, &tokenizer).unwrap())
    });
    group.finish();
}

criterion_group!(benches, full_scan_benchmark, strict_pack_benchmark);
criterion_main!(benches);
