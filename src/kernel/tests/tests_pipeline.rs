#![allow(clippy::unwrap_used)]
use std::path::PathBuf;

use crate::kernel::{validate_files, Kernel};

use super::helpers::{fixture, node_data, write_file, NODE_SCHEMA};

#[test]
fn test_validation_pipeline_reports_per_file() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let good = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><attr name="weight" type="u32" val="3"/></obj>"#,
    );
    let bad = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><attr name="weight" type="u32" val="oops"/></obj>"#,
    );
    let unresolved = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><rel name="next" class="Node" id="ghost"/></obj>"#,
    );
    let paths: Vec<PathBuf> = [
        write_file(&f.dir, "good.data.xml", &good),
        write_file(&f.dir, "bad.data.xml", &bad),
        write_file(&f.dir, "unresolved.data.xml", &unresolved),
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect();

    let base = Kernel::default();
    let reports = validate_files(&base, &paths, 3).unwrap();

    assert_eq!(reports.len(), 3);
    let by_name = |name: &str| {
        reports
            .iter()
            .find(|r| r.file.file_name().is_some_and(|f| f == name))
            .unwrap()
    };
    assert!(by_name("good.data.xml").is_clean());
    assert!(!by_name("bad.data.xml").is_clean());
    assert!(by_name("unresolved.data.xml").diagnostics.contains("ghost"));
}

#[test]
fn test_workers_share_no_state_with_the_base() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let data = node_data("nodes.schema.xml", r#"<obj class="Node" id="a"/>"#);
    let path = write_file(&f.dir, "d.data.xml", &data);

    let base = Kernel::default();
    let reports = validate_files(&base, &[PathBuf::from(path)], 2).unwrap();
    assert!(reports[0].is_clean());
    // the parent kernel saw none of the load
    assert_eq!(base.number_of_classes(), 0);
    assert_eq!(base.number_of_objects(), 0);
}
