#![allow(clippy::unwrap_used)]
use crate::kernel::Kernel;
use crate::value::Value;

use super::helpers::{fixture, node_data, write_file, NODE_SCHEMA};

#[test]
fn test_deferred_binding_across_files() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let first = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><rel name="next" class="Node" id="b"/></obj>"#,
    );
    let second = node_data("nodes.schema.xml", r#"<obj class="Node" id="b"/>"#);
    let first_path = write_file(&f.dir, "f1.xml", &first);
    let second_path = write_file(&f.dir, "f2.xml", &second);

    let mut kernel = Kernel::default();
    kernel.load_data(&first_path, false).unwrap();

    // before the second file arrives the reference is a deferred uid
    let class = kernel.find_class("Node").unwrap();
    let a = kernel.find_object(class, "a", false).unwrap();
    assert!(matches!(
        kernel.get_relationship_value(a, "next").unwrap(),
        Value::Uid { .. } | Value::Uid2 { .. }
    ));

    kernel.load_data(&second_path, false).unwrap();
    kernel.bind_objects();

    let b = kernel.find_object(class, "b", false).unwrap();
    assert_eq!(
        kernel.get_relationship_value(a, "next").unwrap(),
        &Value::ObjectRef(b)
    );
    assert_eq!(kernel.object(b).unwrap().id(), "b");
    assert!(kernel.get_bind_objects_status().is_empty());
}

#[test]
fn test_unresolved_reference_is_reported_not_thrown() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><rel name="next" class="Node" id="missing"/></obj>"#,
    );
    let path = write_file(&f.dir, "f1.xml", &data);

    let mut kernel = Kernel::default();
    kernel.load_data(&path, true).unwrap();

    let status = kernel.get_bind_objects_status();
    assert!(status.contains("missing"), "status: {status}");

    // the object stays loaded with its deferred value
    let class = kernel.find_class("Node").unwrap();
    let a = kernel.find_object(class, "a", false).unwrap();
    assert!(matches!(
        kernel.get_relationship_value(a, "next").unwrap(),
        Value::Uid { .. }
    ));
}

#[test]
fn test_bind_resolves_subclass_instances() {
    let f = fixture();
    let schema = r#"<?xml version="1.0" encoding="ASCII"?>
<oks-schema>
<info name="" type="" num-of-items="2" oks-format="schema" oks-version="t" created-by="t" created-on="h" creation-time="20240101T000000" last-modified-by="t" last-modified-on="h" last-modification-time="20240101T000000"/>
<class name="Node">
  <relationship name="next" class-type="Node" low-cc="zero" high-cc="one" is-composite="no" is-exclusive="no" is-dependent="no"/>
</class>
<class name="SuperNode">
  <superclass name="Node"/>
</class>
</oks-schema>
"#;
    write_file(&f.dir, "nodes.schema.xml", schema);
    // the reference names the base class, the object is a subclass instance
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><rel name="next" class="Node" id="s"/></obj>
<obj class="SuperNode" id="s"/>"#,
    );
    let path = write_file(&f.dir, "f1.xml", &data);

    let mut kernel = Kernel::default();
    kernel.load_data(&path, true).unwrap();
    assert!(kernel.get_bind_objects_status().is_empty());

    let node = kernel.find_class("Node").unwrap();
    let supernode = kernel.find_class("SuperNode").unwrap();
    let a = kernel.find_object(node, "a", false).unwrap();
    let s = kernel.find_object(supernode, "s", false).unwrap();
    assert_eq!(
        kernel.get_relationship_value(a, "next").unwrap(),
        &Value::ObjectRef(s)
    );
}

#[test]
fn test_bind_reports_class_type_mismatch() {
    let f = fixture();
    let schema = r#"<?xml version="1.0" encoding="ASCII"?>
<oks-schema>
<info name="" type="" num-of-items="2" oks-format="schema" oks-version="t" created-by="t" created-on="h" creation-time="20240101T000000" last-modified-by="t" last-modified-on="h" last-modification-time="20240101T000000"/>
<class name="Node">
  <relationship name="next" class-type="Node" low-cc="zero" high-cc="one" is-composite="no" is-exclusive="no" is-dependent="no"/>
</class>
<class name="Other"/>
</oks-schema>
"#;
    write_file(&f.dir, "nodes.schema.xml", schema);
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><rel name="next" class="Other" id="o"/></obj>
<obj class="Other" id="o"/>"#,
    );
    let path = write_file(&f.dir, "f1.xml", &data);

    let mut kernel = Kernel::default();
    kernel.load_data(&path, true).unwrap();

    let status = kernel.get_bind_objects_status();
    assert!(status.contains("not derived"), "status: {status}");
    // the slot keeps its deferred value
    let node = kernel.find_class("Node").unwrap();
    let a = kernel.find_object(node, "a", false).unwrap();
    assert!(matches!(
        kernel.get_relationship_value(a, "next").unwrap(),
        Value::Uid { .. }
    ));
}
