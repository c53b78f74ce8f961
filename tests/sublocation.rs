mod common;

use std::sync::Arc;

use common::{MemoryGraph, add_rule, answer, answer_set, location_schema, session};
use resolvent::parser::parse_query;

fn setup() -> (resolvent::interface::Session<resolvent::schema::MemorySchema>, MemoryGraph) {
    let session = session(location_schema());
    let graph = MemoryGraph::new(Arc::clone(session.schema()))
        .entity("london", "city")
        .entity("uk", "country")
        .entity("alice", "person")
        .relation("r1", "resides", &[("subject-location", "london"), ("located-subject", "alice")])
        .relation("s1", "sublocate", &[("member-location", "london"), ("container-location", "uk")]);
    (session, graph)
}

#[test]
fn expands_relation_by_rule_body() {
    let (session, _) = setup();
    let expansion = session.expand_str("match ($x, $y) isa sublocate;").expect("expands");
    assert_eq!(
        expansion.query().to_string(),
        "match {($x, $y) isa sublocate;} or {(subject-location: $x, located-subject: $y) isa resides;};"
    );
    assert_eq!(expansion.stats().expansions, 1);
    assert_eq!(expansion.stats().dnf_size, 2);
}

#[test]
fn expanded_query_finds_inferred_answers() {
    let (session, graph) = setup();
    let query = parse_query("match (member-location: $x, container-location: $y) isa sublocate;").expect("parses");
    let answers = answer_set(session.resolve(&query, &graph).expect("resolves"));
    assert_eq!(
        answers,
        [
            answer(&[("$x", "london"), ("$y", "uk")]),
            answer(&[("$x", "london"), ("$y", "alice")]),
        ]
        .into_iter()
        .collect()
    );

    // without rules only the stored relation answers
    let stored = answer_set(resolvent::interface::Executor::execute(&graph, &query).expect("executes"));
    assert_eq!(stored.len(), 1);
}

#[test]
fn player_types_must_fit_the_relation() {
    let (session, _) = setup();
    // a person plays no role of sublocate
    let expansion = session
        .expand_str("match $x isa person; ($x, $y) isa sublocate;")
        .expect("expands");
    assert_eq!(expansion.stats().expansions, 0);

    // a city plays them through its supertype
    let expansion = session
        .expand_str("match $x isa city; ($x, $y) isa sublocate;")
        .expect("expands");
    assert_eq!(expansion.stats().expansions, 1);
}

#[test]
fn player_values_must_agree() {
    let schema = location_schema();
    add_rule(
        &schema,
        "london-sublocation",
        "(subject-location: $l, located-subject: $p) isa resides; $l id 'london';",
        "(member-location: $l, container-location: $p) isa sublocate;",
    );
    let session = common::session(schema);

    let expansion = session
        .expand_str("match (member-location: $x, container-location: $y) isa sublocate; $x id 'paris';")
        .expect("expands");
    assert_eq!(expansion.stats().expansions, 1);
    assert!(!expansion.query().to_string().contains("london"));

    let expansion = session
        .expand_str("match (member-location: $x, container-location: $y) isa sublocate; $x id 'london';")
        .expect("expands");
    assert_eq!(expansion.stats().expansions, 2);
}

#[test]
fn infers_roles_of_unlabelled_castings() {
    let (session, _) = setup();
    let expansion = session
        .expand_str("match $p isa person; $l isa city; ($p, $l) isa resides;")
        .expect("expands");
    // resides is not concluded by any rule
    assert_eq!(expansion.stats().expansions, 0);

    let schema = location_schema();
    add_rule(
        &schema,
        "residence",
        "(member-location: $c, container-location: $s) isa sublocate; $s isa person;",
        "(subject-location: $c, located-subject: $s) isa resides;",
    );
    let session = common::session(schema);
    let expansion = session
        .expand_str("match $p isa person; $l isa city; ($p, $l) isa resides; select $p, $l;")
        .expect("expands");
    // the person takes located-subject, the city subject-location
    let text = expansion.query().to_string();
    assert!(
        text.contains("(member-location: $l, container-location: $p) isa sublocate"),
        "{}",
        text
    );
}

#[test]
fn expansion_sits_in_the_branch_of_its_atom() {
    let (session, _) = setup();
    let expansion = session
        .expand_str("match $x isa city; {($x, $y) isa sublocate;} or {$x has name 'London';};")
        .expect("expands");
    assert_eq!(
        expansion.query().to_string(),
        "match $x isa city; {{($x, $y) isa sublocate;} or {(subject-location: $x, located-subject: $y) isa resides;};} or {$x has name 'London';};"
    );
    assert_eq!(expansion.stats().dnf_size, 3);
}
