#![allow(clippy::unwrap_used)]
//! Shared fixtures for the kernel tests.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::KernelConfig;
use crate::file::FileId;
use crate::kernel::Kernel;
use crate::schema::{Attribute, ClassId, HighCardinality, LowCardinality, Relationship};
use crate::value::Kind;

/// A kernel with one fresh schema and one fresh data file in a
/// temporary directory. The directory guard must outlive the kernel.
pub(crate) struct Fixture {
    pub dir: TempDir,
    pub kernel: Kernel,
    pub schema: FileId,
    pub data: FileId,
}

pub(crate) fn fixture() -> Fixture {
    fixture_with(KernelConfig::default())
}

pub(crate) fn fixture_with(config: KernelConfig) -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut kernel = Kernel::new(config);
    let schema_path = dir.path().join("core.schema.xml");
    let data_path = dir.path().join("core.data.xml");
    let schema = kernel.new_schema(&schema_path.display().to_string()).unwrap();
    let data = kernel.new_data(&data_path.display().to_string(), "", "").unwrap();
    Fixture {
        dir,
        kernel,
        schema,
        data,
    }
}

impl Fixture {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// `Module` with a ranged `slots` attribute and a `label` string.
    pub fn module_class(&mut self) -> ClassId {
        let class = self.kernel.create_class(self.schema, "Module").unwrap();
        self.kernel
            .add_attribute(
                class,
                Attribute::new("slots", Kind::U32)
                    .unwrap()
                    .with_range("1..64")
                    .unwrap()
                    .with_init_value("1"),
            )
            .unwrap();
        self.kernel
            .add_attribute(class, Attribute::new("label", Kind::String).unwrap())
            .unwrap();
        class
    }

    /// `Chassis --slots--> Module`, composite-exclusive-dependent.
    pub fn chassis_class(&mut self) -> ClassId {
        let class = self.kernel.create_class(self.schema, "Chassis").unwrap();
        self.kernel
            .add_relationship(
                class,
                Relationship::new("modules", "Module", LowCardinality::Zero, HighCardinality::Many)
                    .unwrap()
                    .with_composite(true, true, true),
            )
            .unwrap();
        class
    }
}

/// Write a file and return its path as a string.
pub(crate) fn write_file(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.display().to_string()
}

pub(crate) const NODE_SCHEMA: &str = r#"<?xml version="1.0" encoding="ASCII"?>

<!-- oks-schema version 2.2 -->

<!DOCTYPE oks-schema [
  <!ELEMENT oks-schema (info, (include)?, (comments)?, (class)+)>
]>

<oks-schema>

<info name="nodes" type="test" num-of-items="1" oks-format="schema" oks-version="test" created-by="tester" created-on="host" creation-time="20240101T000000" last-modified-by="tester" last-modified-on="host" last-modification-time="20240101T000000"/>

<class name="Node">
  <attribute name="weight" type="u32" init-value="1"/>
  <relationship name="next" class-type="Node" low-cc="zero" high-cc="one" is-composite="no" is-exclusive="no" is-dependent="no"/>
</class>

</oks-schema>
"#;

/// One data file over [`NODE_SCHEMA`] with objects and a reference.
pub(crate) fn node_data(include: &str, objects: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="ASCII"?>

<!-- oks-data version 2.2 -->

<oks-data>

<info name="" type="" num-of-items="1" oks-format="data" oks-version="test" created-by="tester" created-on="host" creation-time="20240101T000000" last-modified-by="tester" last-modified-on="host" last-modification-time="20240101T000000"/>

<include>
 <file path="{include}"/>
</include>

{objects}
</oks-data>
"#
    )
}
