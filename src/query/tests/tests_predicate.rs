#![allow(clippy::unwrap_used)]
use tempfile::TempDir;

use crate::error::OksError;
use crate::kernel::Kernel;
use crate::object::ObjectId;
use crate::query::{CompareOp, Comparator, Query, QueryExpr};
use crate::schema::{Attribute, ClassId, HighCardinality, LowCardinality, Relationship};
use crate::value::{Kind, Value};

struct Fixture {
    _dir: TempDir,
    kernel: Kernel,
    host: ClassId,
    hosts: Vec<ObjectId>,
}

/// Hosts with a numeric `cpu` attribute, a `name`, and a `peers`
/// relationship. cpu values: 1, 2, 3, 4.
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut kernel = Kernel::default();
    let schema = kernel
        .new_schema(&dir.path().join("q.schema.xml").display().to_string())
        .unwrap();
    let data = kernel
        .new_data(&dir.path().join("q.data.xml").display().to_string(), "", "")
        .unwrap();

    let host = kernel.create_class(schema, "Host").unwrap();
    kernel
        .add_attribute(host, Attribute::new("cpu", Kind::U32).unwrap())
        .unwrap();
    kernel
        .add_attribute(host, Attribute::new("name", Kind::String).unwrap())
        .unwrap();
    kernel
        .add_relationship(
            host,
            Relationship::new("peers", "Host", LowCardinality::Zero, HighCardinality::Many)
                .unwrap(),
        )
        .unwrap();

    kernel.set_active_data(data).unwrap();
    let mut hosts = Vec::new();
    for i in 1..=4u32 {
        let object = kernel
            .create_object(host, Some(&format!("host-{i:03}")))
            .unwrap();
        kernel
            .set_attribute_value(object, "cpu", Value::U32(i))
            .unwrap();
        kernel
            .set_attribute_value(object, "name", Value::String(format!("host-{i:03}")))
            .unwrap();
        hosts.push(object);
    }
    Fixture {
        _dir: dir,
        kernel,
        host,
        hosts,
    }
}

fn cpu_query(op: CompareOp, value: u32) -> Query {
    Query::new(
        false,
        QueryExpr::Comparator(Comparator::new("cpu", Value::U32(value), op)),
    )
}

#[test]
fn test_comparator_scan() {
    let f = fixture();
    let result = f.kernel.execute_query(f.host, &cpu_query(CompareOp::GreaterOrEqual, 3)).unwrap();
    assert_eq!(result, vec![f.hosts[2], f.hosts[3]]);
}

#[test]
fn test_comparator_with_index_matches_scan() {
    let mut f = fixture();
    let scan = f
        .kernel
        .execute_query(f.host, &cpu_query(CompareOp::Less, 3))
        .unwrap();
    f.kernel.build_index(f.host, "cpu").unwrap();
    let indexed = f
        .kernel
        .execute_query(f.host, &cpu_query(CompareOp::Less, 3))
        .unwrap();
    let sorted = |mut v: Vec<ObjectId>| {
        v.sort();
        v
    };
    assert_eq!(sorted(scan), sorted(indexed));
}

#[test]
fn test_two_constraint_conjunction_uses_the_index() {
    let mut f = fixture();
    f.kernel.build_index(f.host, "cpu").unwrap();
    let query = Query::new(
        false,
        QueryExpr::And(vec![
            QueryExpr::Comparator(Comparator::new("cpu", Value::U32(2), CompareOp::GreaterOrEqual)),
            QueryExpr::Comparator(Comparator::new("cpu", Value::U32(3), CompareOp::LessOrEqual)),
        ]),
    );
    let mut result = f.kernel.execute_query(f.host, &query).unwrap();
    result.sort();
    let mut expected = vec![f.hosts[1], f.hosts[2]];
    expected.sort();
    assert_eq!(result, expected);
}

#[test]
fn test_or_not_combinators() {
    let f = fixture();
    let query = Query::new(
        false,
        QueryExpr::Not(Box::new(QueryExpr::Or(vec![
            QueryExpr::Comparator(Comparator::new("cpu", Value::U32(1), CompareOp::Equal)),
            QueryExpr::Comparator(Comparator::new("cpu", Value::U32(4), CompareOp::Equal)),
        ]))),
    );
    let result = f.kernel.execute_query(f.host, &query).unwrap();
    assert_eq!(result, vec![f.hosts[1], f.hosts[2]]);
}

#[test]
fn test_and_with_single_operand_is_bad_syntax() {
    let f = fixture();
    let query = Query::new(
        false,
        QueryExpr::And(vec![QueryExpr::Comparator(Comparator::new(
            "cpu",
            Value::U32(1),
            CompareOp::Equal,
        ))]),
    );
    assert!(f.kernel.execute_query(f.host, &query).is_err());
}

#[test]
fn test_regex_comparator_and_cache_invalidation() {
    let f = fixture();
    let mut expr = QueryExpr::Comparator(Comparator::new(
        "name",
        Value::String("^host-00[12]$".into()),
        CompareOp::RegExp,
    ));

    let hits = |kernel: &Kernel, expr: &QueryExpr| -> Vec<ObjectId> {
        f.hosts
            .iter()
            .copied()
            .filter(|o| kernel.satisfies_query(*o, expr).unwrap())
            .collect()
    };
    assert_eq!(hits(&f.kernel, &expr), vec![f.hosts[0], f.hosts[1]]);

    // changing the value drops the compiled pattern; the next run
    // compiles the new one
    if let QueryExpr::Comparator(comparator) = &mut expr {
        comparator.set_value(Value::String("^host-004$".into()));
    }
    assert_eq!(hits(&f.kernel, &expr), vec![f.hosts[3]]);
}

#[test]
fn test_object_id_comparator() {
    let f = fixture();
    let query = Query::new(
        false,
        QueryExpr::Comparator(Comparator::object_id(
            Value::String("host-002".into()),
            CompareOp::Equal,
        )),
    );
    let result = f.kernel.execute_query(f.host, &query).unwrap();
    assert_eq!(result, vec![f.hosts[1]]);
}

#[test]
fn test_relationship_some_and_all() {
    let mut f = fixture();
    // host-001 peers: host-002 (cpu 2), host-003 (cpu 3)
    f.kernel
        .add_relationship_value(f.hosts[0], "peers", f.hosts[1])
        .unwrap();
    f.kernel
        .add_relationship_value(f.hosts[0], "peers", f.hosts[2])
        .unwrap();

    let some_over_2 = Query::new(
        false,
        QueryExpr::Relationship {
            name: "peers".into(),
            all: false,
            expr: Box::new(QueryExpr::Comparator(Comparator::new(
                "cpu",
                Value::U32(3),
                CompareOp::Equal,
            ))),
        },
    );
    assert_eq!(
        f.kernel.execute_query(f.host, &some_over_2).unwrap(),
        vec![f.hosts[0]]
    );

    let all_over_2 = Query::new(
        false,
        QueryExpr::Relationship {
            name: "peers".into(),
            all: true,
            expr: Box::new(QueryExpr::Comparator(Comparator::new(
                "cpu",
                Value::U32(2),
                CompareOp::GreaterOrEqual,
            ))),
        },
    );
    // only host-001 has peers at all; empty lists never satisfy
    assert_eq!(
        f.kernel.execute_query(f.host, &all_over_2).unwrap(),
        vec![f.hosts[0]]
    );
}

#[test]
fn test_unresolved_reference_aborts_the_query() {
    let mut f = fixture();
    f.kernel
        .set_relationship_uid(f.hosts[0], "peers", "Host", "ghost")
        .unwrap_err();
    // single-value form refused on the multi-value relationship; build
    // the deferred value through a multi-value slot instead
    let class = f.host;
    let info = f.kernel.data_info(class, "peers").unwrap();
    {
        let kernel = &mut f.kernel;
        let object = f.hosts[0];
        let slot = kernel.object_mut(object).unwrap().values.get_mut(info.offset).unwrap();
        *slot = Value::List(vec![Value::Uid2 {
            class: "Host".into(),
            id: "ghost".into(),
        }]);
    }

    let query = Query::new(
        false,
        QueryExpr::Relationship {
            name: "peers".into(),
            all: false,
            expr: Box::new(QueryExpr::Comparator(Comparator::new(
                "cpu",
                Value::U32(1),
                CompareOp::Equal,
            ))),
        },
    );
    let error = f.kernel.execute_query(f.host, &query).unwrap_err();
    assert!(matches!(error, OksError::UnresolvedDuringQuery(_)));
}

#[test]
fn test_subclass_cone_search() {
    let mut f = fixture();
    let schema = f.kernel.get_active_schema().unwrap();
    let blade = f.kernel.create_class(schema, "Blade").unwrap();
    f.kernel.add_super_class(blade, "Host").unwrap();
    let extra = f.kernel.create_object(blade, Some("blade-1")).unwrap();
    f.kernel
        .set_attribute_value(extra, "cpu", Value::U32(9))
        .unwrap();

    let wide = Query::new(
        true,
        QueryExpr::Comparator(Comparator::new("cpu", Value::U32(4), CompareOp::Greater)),
    );
    assert_eq!(f.kernel.execute_query(f.host, &wide).unwrap(), vec![extra]);

    let narrow = Query::new(
        false,
        QueryExpr::Comparator(Comparator::new("cpu", Value::U32(4), CompareOp::Greater)),
    );
    assert!(f.kernel.execute_query(f.host, &narrow).unwrap().is_empty());
}
