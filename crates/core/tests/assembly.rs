mod common;

use std::fs;

use common::{class_bytes, jar_dirs, jar_files, read_jar, write_jar};
use tempfile::tempdir;
use uberize_core::filter::SimpleFilter;
use uberize_core::matcher::PathMatcher;
use uberize_core::staging::{JAR_MAPPING_FILE, PROCESS_MAPPING_FILE};
use uberize_core::transform::notice::{NOTICE_PATH, NoticeSettings};
use uberize_core::transform::{NoticeAggregator, PathSelector, Pick, PickResource};
use uberize_core::{UberizeError, UberizePhase, Uberizer};

#[test]
fn test_first_source_wins_in_extraction_order() {
    let dir = tempdir().unwrap();
    let a = write_jar(&dir.path().join("a.jar"), &[("p.txt", b"from a")]);
    let b = write_jar(&dir.path().join("b.jar"), &[("p.txt", b"from b")]);
    let c = write_jar(&dir.path().join("c.jar"), &[("p.txt", b"from c")]);
    let uberizer = Uberizer::new(dir.path().join("work"));

    let forward = dir.path().join("forward.jar");
    let report = uberizer
        .uberize(&[a.clone(), b.clone(), c.clone()], &forward)
        .unwrap();
    assert_eq!(jar_files(&forward)["p.txt"], b"from a");
    assert_eq!(report.collisions.len(), 1);
    let warning = &report.collisions[0];
    assert_eq!(warning.path, "p.txt");
    assert_eq!(warning.used.origin.as_deref(), Some(a.to_str().unwrap()));
    assert_eq!(warning.ignored.len(), 2);

    let reversed = dir.path().join("reversed.jar");
    uberizer.uberize(&[c, b, a], &reversed).unwrap();
    assert_eq!(jar_files(&reversed)["p.txt"], b"from c");
}

#[test]
fn test_identical_classes_are_deduplicated_silently() {
    let dir = tempdir().unwrap();
    let foo = class_bytes("Foo", &[], &[]);
    let a = write_jar(&dir.path().join("a.jar"), &[("Foo.class", &foo)]);
    let b = write_jar(&dir.path().join("b.jar"), &[("Foo.class", &foo)]);

    let output = dir.path().join("out.jar");
    let report = Uberizer::new(dir.path().join("work"))
        .uberize(&[a, b], &output)
        .unwrap();

    assert!(report.collisions.is_empty());
    assert_eq!(jar_files(&output)["Foo.class"], foo);
}

#[test]
fn test_identical_text_still_warns() {
    let dir = tempdir().unwrap();
    let a = write_jar(&dir.path().join("a.jar"), &[("same.txt", b"x")]);
    let b = write_jar(&dir.path().join("b.jar"), &[("same.txt", b"x")]);

    let report = Uberizer::new(dir.path().join("work"))
        .uberize(&[a, b], &dir.path().join("out.jar"))
        .unwrap();
    assert_eq!(report.collisions.len(), 1);
    assert_eq!(report.collisions[0].used.digest, report.collisions[0].ignored[0].digest);
}

#[test]
fn test_directory_entries_are_written_once() {
    let dir = tempdir().unwrap();
    let x = write_jar(
        &dir.path().join("x.jar"),
        &[("a/", b""), ("a/b/", b""), ("a/b/c.txt", b"c")],
    );
    let y = write_jar(&dir.path().join("y.jar"), &[("a/b/d.txt", b"d")]);

    let output = dir.path().join("out.jar");
    let report = Uberizer::new(dir.path().join("work"))
        .uberize(&[y, x], &output)
        .unwrap();

    assert_eq!(jar_dirs(&output), vec!["a/", "a/b/"]);
    assert_eq!(report.directories_written, 2);
    assert_eq!(report.files_written, 2);
    let names: Vec<String> = read_jar(&output).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["a/", "a/b/", "a/b/c.txt", "a/b/d.txt"]);
}

#[test]
fn test_single_source_entries_pass_through_unchanged() {
    let dir = tempdir().unwrap();
    let class = class_bytes("com/acme/Tool", &["com/acme/Helper"], &[]);
    let entries: [(&str, &[u8]); 3] = [
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n\r\n"),
        ("com/acme/Tool.class", &class),
        ("config/app.properties", b"key=value\n"),
    ];
    let a = write_jar(&dir.path().join("a.jar"), &entries);
    let b = write_jar(&dir.path().join("b.jar"), &[("README", b"readme")]);

    let plain = dir.path().join("plain.jar");
    Uberizer::new(dir.path().join("work"))
        .uberize(&[a.clone(), b.clone()], &plain)
        .unwrap();

    let picked = dir.path().join("picked.jar");
    let everything = PathSelector::matching(PathMatcher::everything());
    Uberizer::new(dir.path().join("work"))
        .with_transformer(Box::new(PickResource::stage(everything, Pick::Last)))
        .uberize(&[a, b], &picked)
        .unwrap();

    let files = jar_files(&plain);
    assert_eq!(files.len(), 4);
    for (path, contents) in &entries {
        assert_eq!(files[*path], *contents);
    }
    assert_eq!(fs::read(&plain).unwrap(), fs::read(&picked).unwrap());
}

#[test]
fn test_notice_aggregation_scenario() {
    let dir = tempdir().unwrap();
    let foo_x = class_bytes("Foo", &[], &["x"]);
    let foo_y = class_bytes("Foo", &[], &["y"]);
    let x = write_jar(
        &dir.path().join("X.jar"),
        &[("Foo.class", &foo_x), ("META-INF/NOTICE", b"Lib X\n")],
    );
    let y = write_jar(
        &dir.path().join("Y.jar"),
        &[("Foo.class", &foo_y), ("META-INF/NOTICE", b"Lib Y\n")],
    );

    let aggregator = NoticeAggregator::new(NoticeSettings {
        project_name: "Uber".to_string(),
        notices: Some(vec!["Uber\n".to_string()]),
        ..NoticeSettings::default()
    });
    let output = dir.path().join("out.jar");
    let report = Uberizer::new(dir.path().join("work"))
        .with_transformer(Box::new(aggregator))
        .uberize(&[x.clone(), y], &output)
        .unwrap();

    let files = jar_files(&output);
    assert_eq!(files["Foo.class"], foo_x);
    assert_eq!(
        String::from_utf8_lossy(&files[NOTICE_PATH]),
        "Uber\n\nLib X\n\nLib Y\n\n"
    );

    assert_eq!(report.collisions.len(), 1);
    assert_eq!(report.collisions[0].path, "Foo.class");
    assert_eq!(report.collisions[0].used.origin.as_deref(), Some(x.to_str().unwrap()));
}

#[test]
fn test_filters_apply_per_archive() {
    let dir = tempdir().unwrap();
    let signed = write_jar(
        &dir.path().join("signed-lib.jar"),
        &[("META-INF/LIB.SF", b"sig"), ("lib/A.txt", b"a")],
    );
    let other = write_jar(&dir.path().join("other.jar"), &[("META-INF/OTHER.SF", b"sig")]);

    let filter = SimpleFilter::new(
        Some("signed-*.jar"),
        PathMatcher::new(&[] as &[&str], &["META-INF/*.SF"], false).unwrap(),
    )
    .unwrap();
    let output = dir.path().join("out.jar");
    let report = Uberizer::new(dir.path().join("work"))
        .with_filter(Box::new(filter))
        .uberize(&[signed, other], &output)
        .unwrap();

    let files = jar_files(&output);
    assert!(!files.contains_key("META-INF/LIB.SF"));
    assert!(files.contains_key("META-INF/OTHER.SF"));
    assert!(files.contains_key("lib/A.txt"));
    assert_eq!(report.entries_filtered, 1);
    assert_eq!(report.entries_extracted, 2);
}

#[test]
fn test_staging_records_origins() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("one")).unwrap();
    fs::create_dir_all(dir.path().join("two")).unwrap();
    let first = write_jar(&dir.path().join("one/lib.jar"), &[("a.txt", b"1")]);
    let second = write_jar(&dir.path().join("two/lib.jar"), &[("a.txt", b"2")]);

    let work = dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    fs::write(work.join("stale.txt"), "left over").unwrap();

    let notice = NoticeAggregator::new(NoticeSettings {
        project_name: "Uber".to_string(),
        ..NoticeSettings::default()
    });
    Uberizer::new(&work)
        .with_transformer(Box::new(notice))
        .uberize(&[first.clone(), second.clone()], &dir.path().join("out.jar"))
        .unwrap();

    assert!(!work.join("stale.txt").exists());
    let jars = fs::read_to_string(work.join(JAR_MAPPING_FILE)).unwrap();
    assert_eq!(
        jars,
        format!("lib.jar={}\nlib.jar.1={}\n", first.display(), second.display())
    );
    let processes = fs::read_to_string(work.join(PROCESS_MAPPING_FILE)).unwrap();
    assert_eq!(processes, "process-0=aggregate notices (META-INF/NOTICE)\n");
    assert!(work.join("process-0/META-INF/NOTICE").is_file());
}

#[test]
fn test_fatal_errors_name_their_phase() {
    let dir = tempdir().unwrap();
    let broken = dir.path().join("broken.jar");
    fs::write(&broken, "not a zip").unwrap();

    let err = Uberizer::new(dir.path().join("work"))
        .uberize(&[broken], &dir.path().join("out.jar"))
        .unwrap_err();
    match err {
        UberizeError::AssemblyFailed { phase, source } => {
            assert_eq!(phase, UberizePhase::Extracting);
            assert!(matches!(*source, UberizeError::Archive { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_escaping_entry_is_rejected() {
    let dir = tempdir().unwrap();
    let evil = write_jar(&dir.path().join("evil.jar"), &[("../../escape.txt", b"x")]);

    let err = Uberizer::new(dir.path().join("work"))
        .uberize(&[evil], &dir.path().join("out.jar"))
        .unwrap_err();
    let UberizeError::AssemblyFailed { source, .. } = err else {
        panic!("expected an assembly failure");
    };
    assert!(matches!(*source, UberizeError::UnsafePath(_)));
    assert!(!dir.path().join("escape.txt").exists());
}
