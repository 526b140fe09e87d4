use cpai::core::{ScanControl, SkipReason, scan_with};
use cpai::fs::ToolIgnoreMode;
use cpai::format::render_json;
use cpai::utils::tokens::{TokenCounter, Tokenizer};
use cpai::{FileEntry, OutputFormat, PackOrder, SelectionPolicy, bundle, pack, render_bundle, scan, scan_concurrent};
use proptest::prelude::*;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Counts occurrences of `tok`, so wrapper markers and paths are free.
struct TokWords;

impl TokenCounter for TokWords {
    fn count(&self, text: &str) -> usize {
        text.matches("tok").count()
    }
}

/// Temp dir with a predictable project directory inside it.
fn project() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("proj");
    fs::create_dir(&root).unwrap();
    (temp, root)
}

fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn policy(root: &Path) -> SelectionPolicy {
    SelectionPolicy {
        root: root.to_path_buf(),
        ..Default::default()
    }
}

fn paths(files: &[FileEntry]) -> Vec<&str> {
    files.iter().map(|f| f.rel_path.as_str()).collect()
}

#[test]
fn test_end_to_end_scan_and_bundle() -> anyhow::Result<()> {
    let (_temp, root) = project();
    write(&root, "main.rs", "fn main() {}");
    write(&root, "Cargo.toml", "[package]\nname = \"test\"");
    write(&root, "src/lib.rs", "pub fn test() {}");
    write(&root, "secret.env", "SECRET=123");
    write(&root, "node_modules/dep/index.js", "module.exports = 1;");
    write(&root, ".gitignore", "ignored.txt\n");
    write(&root, "ignored.txt", "nope");

    let policy = SelectionPolicy {
        exclude: vec!["**/*.env".into(), "**/node_modules/**".into()],
        ..policy(&root)
    };
    let tokenizer = Tokenizer::acquire("o200k_base")?;
    let result = scan(&policy, &tokenizer)?;

    assert_eq!(paths(&result.files), vec!["Cargo.toml", "main.rs", "src/lib.rs"]);
    assert!(result.total_tokens > 0);
    assert_eq!(result.by_directory["src"].files, 1);

    let out = bundle(&result.eligible(), &policy, &tokenizer)?;
    assert_eq!(out.selected.len(), 3);
    assert!(out.text.starts_with("<TREE>\nproj/\n├─ src/\n│  └─ lib.rs\n├─ Cargo.toml\n└─ main.rs\n</TREE>"));
    assert!(out.text.contains("<FILE_2 path=\"main.rs\">\nfn main() {}\n</FILE_2>"));
    assert!(!out.text.contains("secret.env"));
    assert!(!out.text.contains("ignored.txt"));
    Ok(())
}

#[test]
fn test_binary_extension_is_skipped_without_stat() {
    let (_temp, root) = project();
    write(&root, "photo.png", vec![0x89u8; 4096]);
    write(&root, "notes.txt", "hello");

    let policy = SelectionPolicy {
        exclude: vec![],
        ..policy(&root)
    };
    let result = scan(&policy, &TokWords).unwrap();
    let photo = result.files.iter().find(|f| f.rel_path == "photo.png").unwrap();
    assert!(photo.is_skipped());
    assert_eq!(photo.skip_reason(), Some(&SkipReason::BinaryExt));
    assert_eq!((photo.bytes, photo.lines, photo.tokens), (0, 0, 0));
    assert_eq!(paths(&result.eligible()), vec!["notes.txt"]);
}

#[test]
fn test_oversized_text_file_keeps_real_size() {
    let (_temp, root) = project();
    write(&root, "big.txt", "a".repeat(600_000));

    let result = scan(&policy(&root), &TokWords).unwrap();
    let big = &result.files[0];
    assert_eq!(big.skip_reason(), Some(&SkipReason::TooLarge));
    assert_eq!(big.bytes, 600_000);
    assert_eq!(result.total_bytes, 0);
}

#[test]
fn test_concurrent_scan_matches_sequential() {
    let (_temp, root) = project();
    for i in 0..30 {
        write(&root, &format!("d{}/f{}.txt", i % 4, i), "tok ".repeat(i));
    }
    write(&root, "d0/huge.txt", "x".repeat(2_000));
    let policy = SelectionPolicy {
        max_bytes_per_file: 1_000,
        ..policy(&root)
    };

    let sequential = scan(&policy, &TokWords).unwrap();
    for concurrency in [1, 3, 16, 64] {
        let control = ScanControl {
            concurrency,
            ..Default::default()
        };
        let concurrent = scan_concurrent(&policy, &TokWords, &control).unwrap();
        assert_eq!(concurrent.files, sequential.files, "concurrency {concurrency}");
    }
}

#[test]
fn test_tool_ignore_hides_files_in_one_shot_scans() {
    let (_temp, root) = project();
    write(&root, "keep.rs", "tok");
    write(&root, "fixtures/big.json", "tok tok");
    write(&root, ".cpaiignore", "# fixtures are noise\nfixtures/**\n");

    let result = scan(&policy(&root), &TokWords).unwrap();
    assert_eq!(paths(&result.files), vec!["keep.rs"]);

    let unfiltered = SelectionPolicy {
        use_tool_ignore: false,
        ..policy(&root)
    };
    assert_eq!(scan(&unfiltered, &TokWords).unwrap().files.len(), 2);
}

#[test]
fn test_directory_name_patterns_cover_whole_subtree() {
    let (_temp, root) = project();
    write(&root, "keep.rs", "tok");
    write(&root, "fixtures/big.json", "tok tok");
    write(&root, "fixtures/deep/more.json", "tok");
    write(&root, ".cpaiignore", "fixtures\n");

    let result = scan(&policy(&root), &TokWords).unwrap();
    assert_eq!(paths(&result.files), vec!["keep.rs"]);

    let session = scan_with(&policy(&root), &TokWords, ToolIgnoreMode::AutoDeselect, &ScanControl::default()).unwrap();
    assert_eq!(session.files.len(), 3);
    assert_eq!(
        session.auto_deselected.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["fixtures/big.json", "fixtures/deep/more.json"]
    );

    let excluded = SelectionPolicy {
        exclude: vec!["**/fixtures".into()],
        use_tool_ignore: false,
        ..policy(&root)
    };
    assert_eq!(paths(&scan(&excluded, &TokWords).unwrap().files), vec!["keep.rs"]);
}

#[test]
fn test_budget_exact_fit_small_first() {
    let (_temp, root) = project();
    write(&root, "a.txt", "tok ".repeat(100));
    write(&root, "b.txt", "tok ".repeat(150));
    write(&root, "c.txt", "tok ".repeat(250));

    let policy = SelectionPolicy {
        max_tokens: Some(250),
        ..policy(&root)
    };
    let eligible = scan(&policy, &TokWords).unwrap().eligible();
    let outcome = pack(&eligible, &policy, &TokWords).unwrap();
    assert_eq!(paths(&outcome.selected), vec!["a.txt", "b.txt"]);
    assert_eq!(outcome.tokens, Some(250));
    assert_eq!(TokWords.count(outcome.rendered.as_deref().unwrap()), 250);
}

#[test]
fn test_json_metadata_of_eligible_files() {
    let (_temp, root) = project();
    write(&root, "a.txt", "tok tok");
    let policy = SelectionPolicy {
        format: OutputFormat::Json,
        ..policy(&root)
    };
    let eligible = scan(&policy, &TokWords).unwrap().eligible();
    let json = render_json(&eligible, false).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(rows[0]["path"], "a.txt");
    assert_eq!(rows[0]["tokens"], 2);
    assert_eq!(rows[0]["skipped"], false);
    assert!(rows[0].get("content").is_none());
}

#[test]
fn test_render_is_idempotent() {
    let (_temp, root) = project();
    write(&root, "a.rs", "fn a() {}\n");
    write(&root, "b/c.md", "# title\n");
    for (xml_wrap, tags_wrap, format) in [
        (true, false, OutputFormat::Markdown),
        (false, true, OutputFormat::Markdown),
        (false, false, OutputFormat::Markdown),
        (false, false, OutputFormat::Plain),
    ] {
        let policy = SelectionPolicy {
            xml_wrap,
            tags_wrap,
            format,
            header: Some("context".into()),
            prompt: Some("explain".into()),
            ..policy(&root)
        };
        let files = scan(&policy, &TokWords).unwrap().eligible();
        let first = render_bundle(&files, &policy).unwrap();
        let second = render_bundle(&files, &policy).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("<INSTRUCTIONS>\nexplain\n</INSTRUCTIONS>\n\n"));
        assert!(first.ends_with("\n\n<INSTRUCTIONS>\nexplain\n</INSTRUCTIONS>"));
    }
}

#[test]
fn test_render_fails_when_selected_file_vanishes() {
    let (_temp, root) = project();
    write(&root, "gone.txt", "tok");
    let policy = policy(&root);
    let files = scan(&policy, &TokWords).unwrap().eligible();
    fs::remove_file(root.join("gone.txt")).unwrap();
    assert!(render_bundle(&files, &policy).is_err());
}

/// Concatenated CDATA text of every `<file>` element.
fn file_bodies(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut bodies = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"file" => current = Some(String::new()),
            Event::End(e) if e.name().as_ref() == b"file" => bodies.extend(current.take()),
            Event::CData(c) => {
                if let Some(body) = current.as_mut() {
                    body.push_str(std::str::from_utf8(&c.into_inner()).unwrap());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    bodies
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_cdata_round_trip(content in "[a-z\\]>< \n&]{0,60}") {
        let (_temp, root) = project();
        write(&root, "a.txt", &content);
        let policy = SelectionPolicy { xml_wrap: true, ..policy(&root) };
        let files = scan(&policy, &TokWords).unwrap().eligible();
        let xml = render_bundle(&files, &policy).unwrap();
        prop_assert_eq!(file_bodies(&xml), vec![content]);
    }

    #[test]
    fn prop_small_first_is_monotonic(
        sizes in proptest::collection::vec(0usize..40, 1..8),
        budget in 0usize..200,
        extra in 1usize..50,
    ) {
        let files: Vec<FileEntry> = sizes
            .iter()
            .enumerate()
            .map(|(i, &t)| FileEntry::measured(PathBuf::from(format!("/x/f{i}")), format!("f{i}"), 1, 1, t))
            .collect();
        let base = SelectionPolicy { strict: false, pack_order: PackOrder::SmallFirst, ..Default::default() };
        let smaller = SelectionPolicy { max_tokens: Some(budget), ..base.clone() };
        let larger = SelectionPolicy { max_tokens: Some(budget + extra), ..base };
        let a = pack(&files, &smaller, &TokWords).unwrap().selected.len();
        let b = pack(&files, &larger, &TokWords).unwrap().selected.len();
        prop_assert!(a <= b);
    }

    #[test]
    fn prop_strict_bundle_never_exceeds_budget(budget in 0usize..120) {
        let (_temp, root) = project();
        for (i, n) in [3usize, 9, 14, 27, 40].iter().enumerate() {
            write(&root, &format!("f{i}.txt"), "tok ".repeat(*n));
        }
        let policy = SelectionPolicy {
            max_tokens: Some(budget),
            header: Some("tok tok".into()),
            prompt: Some("tok".into()),
            ..policy(&root)
        };
        let eligible = scan(&policy, &TokWords).unwrap().eligible();
        let out = bundle(&eligible, &policy, &TokWords).unwrap();
        prop_assert!(out.exact);
        prop_assert_eq!(out.tokens, TokWords.count(&out.text));
        prop_assert!(out.tokens <= budget || out.selected.is_empty());
    }
}
