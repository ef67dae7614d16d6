#![allow(clippy::unwrap_used)]
use std::sync::{Arc, Mutex};

use crate::kernel::Kernel;
use crate::schema::ReloadBatch;
use crate::value::Value;

use super::helpers::{fixture, node_data, write_file, NODE_SCHEMA};

fn collect_batches(kernel: &mut Kernel) -> Arc<Mutex<Vec<ReloadBatch>>> {
    let seen: Arc<Mutex<Vec<ReloadBatch>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    kernel.subscribe_reload(move |batch| {
        sink.lock().unwrap().push(batch.clone());
    });
    seen
}

#[test]
fn test_reload_of_unmodified_file_is_a_no_op() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><attr name="weight" type="u32" val="3"/></obj>"#,
    );
    let path = write_file(&f.dir, "r.data.xml", &data);

    let mut kernel = Kernel::default();
    let file = kernel.load_data(&path, true).unwrap();
    let class = kernel.find_class("Node").unwrap();
    let a = kernel.find_object(class, "a", false).unwrap();

    let batches = collect_batches(&mut kernel);
    kernel.reload_data(&[file], true).unwrap();

    assert!(batches.lock().unwrap().is_empty(), "no-op reload notifies nobody");
    // same pointer identity
    assert_eq!(kernel.find_object(class, "a", false), Some(a));
}

#[test]
fn test_reload_applies_the_difference_in_place() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="keep"><attr name="weight" type="u32" val="1"/></obj>
<obj class="Node" id="change"><attr name="weight" type="u32" val="1"/></obj>
<obj class="Node" id="drop"/>"#,
    );
    let path = write_file(&f.dir, "r.data.xml", &data);

    let mut kernel = Kernel::default();
    let file = kernel.load_data(&path, true).unwrap();
    let class = kernel.find_class("Node").unwrap();
    let keep = kernel.find_object(class, "keep", false).unwrap();
    let change = kernel.find_object(class, "change", false).unwrap();
    let dropped = kernel.find_object(class, "drop", false).unwrap();

    // the file changes externally: one object modified, one removed,
    // one added
    let updated = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="keep"><attr name="weight" type="u32" val="1"/></obj>
<obj class="Node" id="change"><attr name="weight" type="u32" val="9"/></obj>
<obj class="Node" id="fresh"/>"#,
    );
    std::fs::write(&path, updated).unwrap();

    let batches = collect_batches(&mut kernel);
    kernel.reload_data(&[file], true).unwrap();

    // unchanged object: same handle
    assert_eq!(kernel.find_object(class, "keep", false), Some(keep));
    // changed object: same handle, new value
    assert_eq!(kernel.find_object(class, "change", false), Some(change));
    assert_eq!(
        kernel.get_attribute_value(change, "weight").unwrap(),
        &Value::U32(9)
    );
    // removed object: gone, handle dangles
    assert!(kernel.is_dangling_object(dropped));
    assert_eq!(kernel.find_object(class, "drop", false), None);
    // added object: present
    assert!(kernel.find_object(class, "fresh", false).is_some());

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 1, "one batch per affected class");
    let batch = &batches[0];
    assert_eq!(batch.class, "Node");
    assert_eq!(batch.modified, vec![change]);
    assert_eq!(batch.removed, vec!["drop"]);
    assert_eq!(batch.created.len(), 1);
}

#[test]
fn test_reload_unbinds_references_to_removed_objects() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let stable = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a"><rel name="next" class="Node" id="b"/></obj>"#,
    );
    let volatile = node_data("nodes.schema.xml", r#"<obj class="Node" id="b"/>"#);
    let stable_path = write_file(&f.dir, "stable.xml", &stable);
    let volatile_path = write_file(&f.dir, "volatile.xml", &volatile);

    let mut kernel = Kernel::default();
    kernel.load_data(&stable_path, false).unwrap();
    let volatile_file = kernel.load_data(&volatile_path, false).unwrap();
    kernel.bind_objects();

    // "b" disappears from the second file
    let emptied = node_data("nodes.schema.xml", "");
    std::fs::write(&volatile_path, emptied).unwrap();
    kernel.reload_data(&[volatile_file], true).unwrap();

    let class = kernel.find_class("Node").unwrap();
    let a = kernel.find_object(class, "a", false).unwrap();
    assert_eq!(
        kernel.get_relationship_value(a, "next").unwrap(),
        &Value::Uid2 {
            class: "Node".into(),
            id: "b".into()
        }
    );
    let status = kernel.get_bind_objects_status();
    assert!(status.contains('b'), "status: {status}");
}
