use std::path::PathBuf;
use std::sync::Arc;

use resolvent::ResolventError;
use resolvent::compat::types_compatible;
use resolvent::config::ReasonerConfig;
use resolvent::interface::Session;
use resolvent::schema::{MemorySchema, Schema, TypeKind};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn setup() -> MemorySchema {
    MemorySchema::load(&fixture("locations.toml")).expect("schema loads")
}

#[test]
fn loads_types_and_rules() {
    let schema = setup();
    assert_eq!(schema.type_count(), 11);
    assert_eq!(schema.rule_count(), 2);
    assert_eq!(schema.get_type("resides").map(|t| t.kind()), Some(TypeKind::Relation));
    assert_eq!(schema.supertypes("city"), vec!["location".to_owned()]);
    assert_eq!(schema.subtypes("location"), vec!["city".to_owned(), "country".to_owned()]);
    assert_eq!(
        schema.roles_of("sublocate"),
        vec!["member-location".to_owned(), "container-location".to_owned()]
    );
    assert!(schema.relates("sublocate", "member-location"));
    assert!(schema.plays("city", "member-location"));
    assert!(!schema.plays("person", "member-location"));
    assert_eq!(schema.rules_of_conclusion("sublocate").len(), 2);
}

#[test]
fn type_compatibility_is_symmetric() {
    let schema = setup();
    for (a, b) in [("city", "country"), ("person", "city"), ("person", "person"), ("location", "city")] {
        for relation in ["resides", "sublocate"] {
            assert_eq!(
                types_compatible(&schema, a, b, relation),
                types_compatible(&schema, b, a, relation),
                "{} / {} in {}",
                a,
                b,
                relation
            );
        }
    }
    assert!(types_compatible(&schema, "person", "city", "resides"));
    assert!(!types_compatible(&schema, "person", "city", "sublocate"));
}

#[test]
fn loaded_schema_expands_queries() {
    let session = Session::new(Arc::new(setup()), ReasonerConfig::default().with_max_depth(1));
    let expansion = session.expand_str("match ($x, $y) isa sublocate;").expect("expands");
    assert_eq!(expansion.stats().expansions, 2);
    assert_eq!(expansion.stats().truncated, 1);
}

#[test]
fn undeclared_types_are_rejected() {
    match MemorySchema::load(&fixture("broken.toml")) {
        Err(ResolventError::UnknownType(message)) => assert!(message.contains("location"), "{}", message),
        other => panic!("unexpected {:?}", other.map(|s| s.type_count())),
    }
    assert!(matches!(
        MemorySchema::load(&fixture("missing.toml")),
        Err(ResolventError::Config(_))
    ));
}

#[test]
fn reads_reasoner_config() {
    let config = ReasonerConfig::load(Some(fixture("resolvent.toml").as_path())).expect("config loads");
    assert_eq!(config.max_depth, 3);
    assert_eq!(config.max_steps, 500);
    assert_eq!(config.log_filter, "info");

    let tuned = ReasonerConfig::default().with_max_depth(2).with_max_steps(10);
    assert_eq!((tuned.max_depth, tuned.max_steps), (2, 10));
    assert_eq!(ReasonerConfig::default().max_depth, 5);
    assert_eq!(ReasonerConfig::default().max_steps, 10_000);

    assert!(matches!(
        ReasonerConfig::load(Some(fixture("missing.toml").as_path())),
        Err(ResolventError::Config(_))
    ));
}
