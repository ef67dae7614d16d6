#![allow(clippy::unwrap_used)]
use crate::base::Arena;
use crate::object::{Obj, ObjectId, Rcr};
use crate::schema::ClassId;
use crate::value::Value;

fn scratch_class() -> ClassId {
    let mut arena: Arena<(), ClassId> = Arena::new();
    arena.insert(())
}

fn scratch_object(class: ClassId, file_arena: &mut Arena<(), crate::file::FileId>) -> Obj {
    Obj {
        class,
        id: "x".into(),
        values: vec![Value::Uid2Unset],
        rcrs: Vec::new(),
        file: file_arena.insert(()),
        duplicated_index: None,
    }
}

#[test]
fn test_add_rcr_deduplicates() {
    let class = scratch_class();
    let mut files = Arena::new();
    let mut child = scratch_object(class, &mut files);

    let mut parents: Arena<(), ObjectId> = Arena::new();
    let parent = parents.insert(());

    child.add_rcr(parent, &"holds".into());
    child.add_rcr(parent, &"holds".into());
    assert_eq!(child.reverse_composite_rels().len(), 1);
    assert_eq!(
        child.reverse_composite_rels()[0],
        Rcr {
            parent,
            relationship: "holds".into()
        }
    );
    assert!(child.is_composite_parented());

    child.remove_rcr(parent, &"holds".into());
    assert!(!child.is_composite_parented());
}
