#![allow(clippy::unwrap_used)]
use crate::config::KernelConfig;
use crate::error::OksError;
use crate::file::{lock_sidecar_path, FileStatus};
use crate::kernel::Kernel;
use crate::value::Value;

use super::helpers::{fixture, node_data, write_file, NODE_SCHEMA};

#[test]
fn test_load_schema_from_xml() {
    let f = fixture();
    let path = write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let mut kernel = Kernel::default();
    let file = kernel.load_schema(&path).unwrap();

    let class = kernel.find_class("Node").expect("Node class loaded");
    let c = kernel.class(class).unwrap();
    assert_eq!(c.file(), file);
    assert_eq!(c.all_attributes().len(), 1);
    assert_eq!(c.all_relationships().len(), 1);
    assert_eq!(kernel.file(file).unwrap().number_of_items, 1);
    assert_eq!(kernel.file(file).unwrap().status(), FileStatus::NotModified);
}

#[test]
fn test_load_data_with_include_and_bind() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a">
 <attr name="weight" type="u32" val="3"/>
 <rel name="next" class="Node" id="b"/>
</obj>
<obj class="Node" id="b"/>
"#,
    );
    let path = write_file(&f.dir, "nodes.data.xml", &data);

    let mut kernel = Kernel::default();
    let file = kernel.load_data(&path, true).unwrap();

    let class = kernel.find_class("Node").unwrap();
    let a = kernel.find_object(class, "a", false).unwrap();
    let b = kernel.find_object(class, "b", false).unwrap();
    assert_eq!(
        kernel.get_attribute_value(a, "weight").unwrap(),
        &Value::U32(3)
    );
    assert_eq!(
        kernel.get_relationship_value(a, "next").unwrap(),
        &Value::ObjectRef(b)
    );
    assert!(kernel.get_bind_objects_status().is_empty());
    // the schema include was loaded implicitly
    assert_eq!(kernel.schema_files().len(), 1);
    assert_eq!(kernel.file(file).unwrap().include_files(), ["nodes.schema.xml"]);
}

#[test]
fn test_missing_include_is_file_not_found() {
    let f = fixture();
    let data = node_data("no-such.schema.xml", "");
    let path = write_file(&f.dir, "broken.data.xml", &data);
    let mut kernel = Kernel::default();
    let error = kernel.load_data(&path, true).unwrap_err();
    assert!(matches!(error, OksError::FileNotFound(_)));
    assert!(kernel.data_files().is_empty(), "failed load leaves nothing");
}

#[test]
fn test_bad_value_aborts_the_file() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="a">
 <attr name="weight" type="u32" val="not-a-number"/>
</obj>
"#,
    );
    let path = write_file(&f.dir, "bad.data.xml", &data);
    let mut kernel = Kernel::default();
    let error = kernel.load_data(&path, true).unwrap_err();
    assert!(matches!(error, OksError::BadFileData { .. }), "{error}");
    assert_eq!(kernel.number_of_objects(), 0);
    assert_eq!(kernel.load_errors().len(), 1);
    // the schema include survives: sibling files continue to work
    assert!(kernel.find_class("Node").is_some());
}

#[test]
fn test_save_then_load_round_trip() {
    let mut f = fixture();
    let module = f.module_class();
    f.kernel.set_active_data(f.data).unwrap();
    let object = f.kernel.create_object(module, Some("m1")).unwrap();
    f.kernel
        .set_attribute_value(object, "slots", Value::U32(12))
        .unwrap();
    f.kernel
        .set_attribute_value(object, "label", Value::String("crate <3>".into()))
        .unwrap();
    f.kernel.file_mut(f.data).unwrap().set_logical_name("lab").unwrap();
    f.kernel
        .file_mut(f.data)
        .unwrap()
        .add_comment("first save", "tester")
        .unwrap();
    f.kernel
        .file_mut(f.data)
        .unwrap()
        .add_include_file("core.schema.xml")
        .unwrap();

    f.kernel.save_schema(f.schema).unwrap();
    f.kernel.save_data(f.data).unwrap();
    assert_eq!(f.kernel.file(f.data).unwrap().status(), FileStatus::NotModified);

    let mut reloaded = Kernel::default();
    let file = reloaded
        .load_data(&f.path("core.data.xml").display().to_string(), true)
        .unwrap();

    let class = reloaded.find_class("Module").unwrap();
    let object = reloaded.find_object(class, "m1", false).unwrap();
    assert_eq!(
        reloaded.get_attribute_value(object, "slots").unwrap(),
        &Value::U32(12)
    );
    assert_eq!(
        reloaded.get_attribute_value(object, "label").unwrap(),
        &Value::String("crate <3>".into())
    );
    let descriptor = reloaded.file(file).unwrap();
    assert_eq!(descriptor.logical_name, "lab");
    assert_eq!(descriptor.include_files(), ["core.schema.xml"]);
    assert_eq!(descriptor.comments().len(), 1);
    let comment = descriptor.comments().values().next().unwrap();
    assert_eq!(comment.text, "first save");
}

#[test]
fn test_extended_save_round_trips_too() {
    let mut f = fixture();
    let module = f.module_class();
    f.kernel.set_active_data(f.data).unwrap();
    let object = f.kernel.create_object(module, Some("m1")).unwrap();
    f.kernel
        .set_attribute_value(object, "slots", Value::U32(5))
        .unwrap();
    f.kernel
        .file_mut(f.data)
        .unwrap()
        .add_include_file("core.schema.xml")
        .unwrap();
    f.kernel.save_schema(f.schema).unwrap();
    f.kernel.save_data_extended(f.data).unwrap();

    let mut reloaded = Kernel::default();
    reloaded
        .load_data(&f.path("core.data.xml").display().to_string(), true)
        .unwrap();
    let class = reloaded.find_class("Module").unwrap();
    let object = reloaded.find_object(class, "m1", false).unwrap();
    assert_eq!(
        reloaded.get_attribute_value(object, "slots").unwrap(),
        &Value::U32(5)
    );
}

#[test]
fn test_read_only_file_refuses_save() {
    let mut f = fixture();
    f.kernel.save_schema(f.schema).unwrap();
    // drop our lock, then flip the file read-only on disk
    f.kernel.file_mut(f.schema).unwrap().unlock().unwrap();
    let path = f.path("core.schema.xml");
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_readonly(true);
    std::fs::set_permissions(&path, permissions).unwrap();

    let mut kernel = Kernel::default();
    let file = kernel.load_schema(&path.display().to_string()).unwrap();
    assert!(kernel.file(file).unwrap().is_read_only());
    let error = kernel.save_schema(file).unwrap_err();
    assert!(matches!(error, OksError::FileReadOnly(_)));

    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    std::fs::set_permissions(&path, permissions).unwrap();
}

#[test]
fn test_lock_sidecar_lifecycle() {
    let mut f = fixture();
    let path = f.path("core.schema.xml");
    let sidecar = lock_sidecar_path(&path);
    // new files hold their lock from creation
    assert!(f.kernel.file(f.schema).unwrap().is_locked());
    assert!(sidecar.exists());
    let holder = f.kernel.file(f.schema).unwrap().lock_holder().unwrap();
    assert!(holder.starts_with("process "), "holder line: {holder}");

    f.kernel.file_mut(f.schema).unwrap().unlock().unwrap();
    assert!(!sidecar.exists());
}

#[test]
fn test_foreign_lock_blocks_writers() {
    let mut f = fixture();
    f.kernel.save_data(f.data).unwrap();
    let path = f.path("core.data.xml");

    // second kernel sees the holder and cannot lock
    let mut other = Kernel::default();
    let file = other.load_data(&path.display().to_string(), true).unwrap();
    let error = other.file_mut(file).unwrap().lock().unwrap_err();
    match error {
        OksError::FileLocked { holder, .. } => {
            assert!(holder.contains("process "), "holder: {holder}");
        }
        other => panic!("expected FileLocked, got {other:?}"),
    }

    // first kernel releases; the second can now lock and save
    f.kernel.file_mut(f.data).unwrap().unlock().unwrap();
    other.file_mut(file).unwrap().lock().unwrap();
    other.save_data(file).unwrap();
}

#[test]
fn test_external_modification_is_detected() {
    let mut f = fixture();
    f.kernel.save_data(f.data).unwrap();
    assert_eq!(f.kernel.file(f.data).unwrap().status(), FileStatus::NotModified);

    // another process rewrites the file with a different timestamp
    let path = f.path("core.data.xml");
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents).unwrap();
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(later).unwrap();
    drop(file);

    assert_eq!(
        f.kernel.file(f.data).unwrap().status(),
        FileStatus::ExternallyModified
    );
    f.kernel.update_status_of_file(f.data).unwrap();
    assert_eq!(f.kernel.file(f.data).unwrap().status(), FileStatus::NotModified);
}

#[test]
fn test_close_data_unbinds_cross_file_references() {
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
    let second_file = kernel.load_data(&second_path, false).unwrap();
    kernel.bind_objects();

    let class = kernel.find_class("Node").unwrap();
    let a = kernel.find_object(class, "a", false).unwrap();
    kernel.close_data(second_file, true).unwrap();

    assert_eq!(
        kernel.get_relationship_value(a, "next").unwrap(),
        &Value::Uid2 {
            class: "Node".into(),
            id: "b".into()
        }
    );
    assert_eq!(kernel.find_object(class, "b", false), None);
}

#[test]
fn test_duplicated_objects_policies() {
    let f = fixture();
    write_file(&f.dir, "nodes.schema.xml", NODE_SCHEMA);
    let data = node_data(
        "nodes.schema.xml",
        r#"<obj class="Node" id="x"/>
<obj class="Node" id="x"/>
"#,
    );
    let path = write_file(&f.dir, "dup.data.xml", &data);

    // default policy rejects
    let mut strict = Kernel::default();
    assert!(strict.load_data(&path, true).is_err());

    // keep-first warns and drops the second
    let mut config = KernelConfig::default();
    config.duplicated_objects = crate::config::DuplicatedObjectsPolicy::KeepFirst;
    let mut lenient = Kernel::new(config);
    lenient.load_data(&path, true).unwrap();
    assert_eq!(lenient.number_of_objects(), 1);

    // auto-rename keeps both and marks the duplicate
    let mut config = KernelConfig::default();
    config.duplicated_objects = crate::config::DuplicatedObjectsPolicy::AutoRename;
    let mut renaming = Kernel::new(config);
    renaming.load_data(&path, true).unwrap();
    assert_eq!(renaming.number_of_objects(), 2);
    let class = renaming.find_class("Node").unwrap();
    let renamed = renaming.find_object(class, "x-1", false).unwrap();
    assert!(renaming.object(renamed).unwrap().is_duplicated());
}

#[test]
fn test_alias_table_round_trip_in_compact_save() {
    let mut f = fixture();
    let module = f.module_class();
    f.kernel.set_active_data(f.data).unwrap();
    f.kernel.create_object(module, Some("m1")).unwrap();
    f.kernel.create_object(module, Some("m2")).unwrap();
    f.kernel
        .file_mut(f.data)
        .unwrap()
        .add_include_file("core.schema.xml")
        .unwrap();
    f.kernel.save_schema(f.schema).unwrap();
    f.kernel.save_data(f.data).unwrap();

    let text = std::fs::read_to_string(f.path("core.data.xml")).unwrap();
    assert!(text.contains("class=\"@Module\""), "first occurrence: {text}");
    assert!(text.contains("class=\"0\""), "alias afterwards: {text}");

    let mut reloaded = Kernel::default();
    reloaded
        .load_data(&f.path("core.data.xml").display().to_string(), true)
        .unwrap();
    let class = reloaded.find_class("Module").unwrap();
    assert!(reloaded.find_object(class, "m1", false).is_some());
    assert!(reloaded.find_object(class, "m2", false).is_some());
}
