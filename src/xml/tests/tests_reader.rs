#![allow(clippy::unwrap_used)]
use crate::xml::{TagKind, XmlReader, XmlWriter};

const DOC: &str = r#"<?xml version="1.0" encoding="ASCII"?>

<!-- a comment anywhere a tag may start -->
<oks-data>
  <info name="x" type=""/>
  <obj class="A" id="first">
    <attr name="value" type="s32" val="42"/>
  </obj>
</oks-data>
"#;

#[test]
fn test_tag_stream() {
    let mut reader = XmlReader::new("d.xml", DOC);
    let root = reader.next_tag().unwrap().unwrap();
    assert_eq!(root.kind, TagKind::Start);
    assert_eq!(root.name, "oks-data");

    let info = reader.next_tag().unwrap().unwrap();
    assert_eq!(info.kind, TagKind::Empty);
    assert_eq!(info.attr("name"), Some("x"));

    let obj = reader.next_tag().unwrap().unwrap();
    assert!(obj.is_start_of("obj"));
    assert_eq!(obj.attr("class"), Some("A"));
    assert_eq!(obj.attr("id"), Some("first"));

    let attr = reader.next_tag().unwrap().unwrap();
    assert_eq!(attr.attr("val"), Some("42"));

    assert!(reader.next_tag().unwrap().unwrap().is_end_of("obj"));
    assert!(reader.next_tag().unwrap().unwrap().is_end_of("oks-data"));
    assert!(reader.next_tag().unwrap().is_none());
}

#[test]
fn test_positions_are_line_and_column() {
    let mut reader = XmlReader::new("d.xml", DOC);
    // consume up to <obj …>
    for _ in 0..2 {
        reader.next_tag().unwrap();
    }
    let obj = reader.next_tag().unwrap().unwrap();
    let pos = reader.line_col(obj.offset);
    assert_eq!(pos.line, 6);
}

#[test]
fn test_store_and_restore_position() {
    let mut reader = XmlReader::new("d.xml", DOC);
    reader.next_tag().unwrap(); // <oks-data>
    reader.store_position();
    let first = reader.next_tag().unwrap().unwrap();
    assert_eq!(first.name, "info");
    reader.restore_position();
    let again = reader.next_tag().unwrap().unwrap();
    assert_eq!(again.name, "info");
}

#[test]
fn test_attribute_entities_are_unescaped() {
    let doc = r#"<obj id="a&lt;b&amp;c&#xA;"/>"#;
    let mut reader = XmlReader::new("d.xml", doc);
    let tag = reader.next_tag().unwrap().unwrap();
    assert_eq!(tag.attr("id"), Some("a<b&c\n"));
}

#[test]
fn test_foreign_entity_is_bad_file_data() {
    let doc = r#"<obj id="&copy;"/>"#;
    let mut reader = XmlReader::new("d.xml", doc);
    assert!(reader.next_tag().is_err());
}

#[test]
fn test_internal_dtd_subset_is_skipped() {
    let doc = "<?xml version=\"1.0\" encoding=\"ASCII\"?>\n\
               <!DOCTYPE oks-data [\n  <!ELEMENT info EMPTY>\n  <!ATTLIST info name CDATA #IMPLIED>\n]>\n\
               <oks-data>\n</oks-data>\n";
    let mut reader = XmlReader::new("d.xml", doc);
    let root = reader.next_tag().unwrap().unwrap();
    assert!(root.is_start_of("oks-data"));
}

#[test]
fn test_writer_mirror() {
    let mut writer = XmlWriter::new(Vec::new());
    writer.put_start_tag("attr").unwrap();
    writer.put_attribute("name", "a<b").unwrap();
    writer.put_numeric_attribute("num", 3).unwrap();
    writer.put_end_tag().unwrap();
    let text = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(text, "<attr name=\"a&lt;b\" num=\"3\"/>\n");
}
