#![allow(clippy::unwrap_used)]
use tempfile::TempDir;

use crate::kernel::Kernel;
use crate::object::ObjectId;
use crate::query::{PathExpression, QueryPath};
use crate::schema::{Attribute, HighCardinality, LowCardinality, Relationship};
use crate::value::Kind;

struct Topology {
    _dir: TempDir,
    kernel: Kernel,
    room: ObjectId,
    rack: ObjectId,
    host: ObjectId,
}

/// `Room.R1 --contains--> Rack.K3 --contains--> Host.h1`.
fn topology() -> Topology {
    let dir = TempDir::new().unwrap();
    let mut kernel = Kernel::default();
    let schema = kernel
        .new_schema(&dir.path().join("p.schema.xml").display().to_string())
        .unwrap();
    let data = kernel
        .new_data(&dir.path().join("p.data.xml").display().to_string(), "", "")
        .unwrap();

    // Room, Rack and Host share a base so one relationship covers all
    let item = kernel.create_class(schema, "Item").unwrap();
    kernel
        .add_attribute(item, Attribute::new("tag", Kind::String).unwrap())
        .unwrap();
    kernel
        .add_relationship(
            item,
            Relationship::new("contains", "Item", LowCardinality::Zero, HighCardinality::Many)
                .unwrap(),
        )
        .unwrap();
    for name in ["Room", "Rack", "Host"] {
        let class = kernel.create_class(schema, name).unwrap();
        kernel.add_super_class(class, "Item").unwrap();
    }

    kernel.set_active_data(data).unwrap();
    let room_class = kernel.find_class("Room").unwrap();
    let rack_class = kernel.find_class("Rack").unwrap();
    let host_class = kernel.find_class("Host").unwrap();
    let room = kernel.create_object(room_class, Some("R1")).unwrap();
    let rack = kernel.create_object(rack_class, Some("K3")).unwrap();
    let host = kernel.create_object(host_class, Some("h1")).unwrap();
    kernel.add_relationship_value(room, "contains", rack).unwrap();
    kernel.add_relationship_value(rack, "contains", host).unwrap();

    Topology {
        _dir: dir,
        kernel,
        room,
        rack,
        host,
    }
}

#[test]
fn test_nested_path_search_to_arbitrary_depth() {
    let t = topology();
    let query = QueryPath::parse("(path-to \"h1@Host\" (nested \"contains\"))", &t.kernel).unwrap();
    let path = t.kernel.find_path(t.room, &query).unwrap();
    assert_eq!(path, vec![t.room, t.rack, t.host]);
}

#[test]
fn test_direct_path_is_exactly_one_hop_per_level() {
    let t = topology();
    // one direct level reaches the rack but not the host
    let one_level = QueryPath::new(
        t.rack,
        PathExpression {
            nested: false,
            rel_names: vec!["contains".into()],
            next: None,
        },
    );
    assert_eq!(
        t.kernel.find_path(t.room, &one_level).unwrap(),
        vec![t.room, t.rack]
    );

    let to_host_one_level = QueryPath::new(
        t.host,
        PathExpression {
            nested: false,
            rel_names: vec!["contains".into()],
            next: None,
        },
    );
    assert!(t.kernel.find_path(t.room, &to_host_one_level).is_none());

    // two chained direct levels reach the host
    let query = QueryPath::parse(
        "(path-to \"h1@Host\" (direct \"contains\" (direct \"contains\")))",
        &t.kernel,
    )
    .unwrap();
    assert_eq!(
        t.kernel.find_path(t.room, &query).unwrap(),
        vec![t.room, t.rack, t.host]
    );
}

#[test]
fn test_cycles_do_not_loop_the_traversal() {
    let mut t = topology();
    // close a cycle: host contains room
    t.kernel
        .add_relationship_value(t.host, "contains", t.room)
        .unwrap();
    let host_class = t.kernel.find_class("Host").unwrap();
    t.kernel.create_object(host_class, Some("h2")).unwrap();

    let query = QueryPath::parse("(path-to \"h2@Host\" (nested \"contains\"))", &t.kernel).unwrap();
    assert!(t.kernel.find_path(t.room, &query).is_none());
}

#[test]
fn test_parse_rejects_malformed_queries() {
    let t = topology();
    assert!(QueryPath::parse("(path-to \"h1@Host\")", &t.kernel).is_err());
    assert!(QueryPath::parse("(path-to \"h1\" (nested \"contains\"))", &t.kernel).is_err());
    assert!(QueryPath::parse("(path-to \"nope@Host\" (nested \"x\"))", &t.kernel).is_err());
    assert!(QueryPath::parse("(walk-to \"h1@Host\" (nested \"x\"))", &t.kernel).is_err());
}

#[test]
fn test_display_round_trip() {
    let t = topology();
    let query = QueryPath::parse(
        "(path-to \"h1@Host\" (direct \"a\" \"b\" (nested \"n\")))",
        &t.kernel,
    )
    .unwrap();
    assert_eq!(query.start.to_string(), "(direct \"a\" \"b\" (nested \"n\"))");
}
