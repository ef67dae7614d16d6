#![allow(clippy::unwrap_used, dead_code)]
//! Shared fixtures for the integration suite.

use std::path::PathBuf;

use tempfile::TempDir;

pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.display().to_string()
}

pub fn path_of(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Schema header + classes wrapped into a complete schema document.
pub fn schema_file(classes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="ASCII"?>

<!-- oks-schema version 2.2 -->

<oks-schema>

<info name="" type="" num-of-items="1" oks-format="schema" oks-version="test" created-by="tester" created-on="host" creation-time="20240101T000000" last-modified-by="tester" last-modified-on="host" last-modification-time="20240101T000000"/>

{classes}
</oks-schema>
"#
    )
}

/// Data header (with optional includes) + objects wrapped into a
/// complete data document.
pub fn data_file(includes: &[&str], objects: &str) -> String {
    let include_block = if includes.is_empty() {
        String::new()
    } else {
        let files: String = includes
            .iter()
            .map(|path| format!(" <file path=\"{path}\"/>\n"))
            .collect();
        format!("<include>\n{files}</include>\n")
    };
    format!(
        r#"<?xml version="1.0" encoding="ASCII"?>

<!-- oks-data version 2.2 -->

<oks-data>

<info name="" type="" num-of-items="1" oks-format="data" oks-version="test" created-by="tester" created-on="host" creation-time="20240101T000000" last-modified-by="tester" last-modified-on="host" last-modification-time="20240101T000000"/>

{include_block}
{objects}
</oks-data>
"#
    )
}
