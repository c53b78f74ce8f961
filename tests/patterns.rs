use resolvent::ResolventError;
use resolvent::datatype::{Comparator, Literal, Predicate};
use resolvent::parser::{parse_patterns, parse_query};
use resolvent::pattern::{MatchQuery, Pattern, VarPattern};
use resolvent::query::Conjunction;

fn roundtrip(text: &str) -> String {
    let query = parse_query(text).expect("query parses");
    let conjunction = Conjunction::from_query(&query).expect("conjunction builds");
    MatchQuery::new(conjunction.pattern(), conjunction.select()).to_string()
}

#[test]
fn renders_parsed_query_unchanged() {
    let text = "match $x isa person, has age <9; ($x, $y) isa sublocate; select $x;";
    assert_eq!(parse_query(text).expect("parses").to_string(), text);
    assert_eq!(roundtrip(text), text);
}

#[test]
fn rendering_unexpanded_conjunction_is_idempotent() {
    let text = "match $y isa country; {$y has name 'Poland';} or {$y has name 'England';};";
    let once = roundtrip(text);
    assert_eq!(once, text);
    assert_eq!(roundtrip(&once), once);
}

#[test]
fn splits_fragments_into_single_property_atoms() {
    let query = parse_query("match $x isa person, has age <9, has name $n;").expect("parses");
    let conjunction = Conjunction::from_query(&query).expect("builds");
    assert_eq!(conjunction.len(), 3);
    assert_eq!(conjunction.types().into_iter().collect::<Vec<_>>(), vec!["age", "name", "person"]);
    assert_eq!(conjunction.type_of_name("$x"), Some("person"));
    assert_eq!(conjunction.var_type_map().get("$n").map(String::as_str), Some("name"));
}

#[test]
fn duplicate_atoms_are_kept_once() {
    let query = parse_query("match $x isa person; $x isa person; $x has name $n;").expect("parses");
    let conjunction = Conjunction::from_query(&query).expect("builds");
    assert_eq!(conjunction.len(), 2);
}

#[test]
fn parses_predicates() {
    let pattern = parse_patterns(
        "$n value contains 'ola'; $m value /^K.*/; $a value >=18; $b value != 'x\\'y'; $c id 'london';",
    )
    .expect("parses");
    let predicates: Vec<Predicate> = pattern
        .dnf()
        .remove(0)
        .into_iter()
        .flat_map(|f| f.predicates().to_vec())
        .collect();
    assert_eq!(
        predicates,
        vec![
            Predicate::Value(Comparator::Contains, Literal::string("ola")),
            Predicate::Value(Comparator::Regex, Literal::string("^K.*")),
            Predicate::Value(Comparator::Gte, Literal::number(18)),
            Predicate::Value(Comparator::Neq, Literal::string("x'y")),
            Predicate::Id("london".to_owned()),
        ]
    );
}

#[test]
fn predicates_test_values() {
    assert!(Predicate::Value(Comparator::Lt, Literal::number(10)).test(&Literal::number(9)));
    assert!(!Predicate::Value(Comparator::Lt, Literal::number(10)).test(&Literal::parse("10.0")));
    assert!(Predicate::eq(Literal::parse("10.00")).test(&Literal::number(10)));
    assert!(Predicate::Value(Comparator::Regex, Literal::string("^Lon")).test(&Literal::string("London")));
    assert!(!Predicate::Value(Comparator::Gt, Literal::number(1)).test(&Literal::string("2")));
}

#[test]
fn disjunction_counts_alternatives() {
    let query = parse_query(
        "match $x isa person; {$x has name 'a';} or {$x has name 'b';}; {$y isa city;} or {$y isa country;} or {$y isa location;};",
    )
    .expect("parses");
    assert_eq!(query.pattern().dnf_size(), 6);
    assert_eq!(query.pattern().dnf().len(), 6);
}

#[test]
fn builds_patterns_programmatically() {
    let fragment = VarPattern::anonymous()
        .with_casting(Some("member-location"), "$x")
        .with_casting(None, "$y")
        .with_isa("sublocate");
    let query = MatchQuery::new(Pattern::and(vec![fragment.into()]), vec!["$x".to_owned()]);
    assert_eq!(query.to_string(), "match (member-location: $x, $y) isa sublocate; select $x;");
    assert_eq!(query.projection(), vec!["$x".to_owned()]);
}

#[test]
fn reports_parse_errors_with_position() {
    let error = parse_query("match\n$x isa person;\n$y isa ;").expect_err("missing label");
    match error {
        ResolventError::Parse { line, col, .. } => {
            assert_eq!(line, Some(3));
            assert!(col.is_some());
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!("match $x;".parse::<MatchQuery>().is_err());
}
