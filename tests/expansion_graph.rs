use resolvent::ResolventError;
use resolvent::expansion::ExpansionGraph;
use resolvent::parser::parse_patterns;
use resolvent::query::Conjunction;

fn conjunction(text: &str) -> Conjunction {
    Conjunction::new(&parse_patterns(text).expect("parses")).expect("builds")
}

#[test]
fn attaching_is_idempotent() {
    let mut graph = ExpansionGraph::new();
    let root = graph.insert(conjunction("($x, $y) isa sublocate;"));
    let child = graph.insert(conjunction("(subject-location: $x, located-subject: $y) isa resides;"));
    let atom = graph.get(root).expect("root").atoms().next().map(|(id, _)| id).expect("atom");
    assert!(graph.expand_atom_by_query(root, atom, child).expect("attaches"));
    assert!(!graph.expand_atom_by_query(root, atom, child).expect("attaches"));
    assert_eq!(graph.expansion_count(), 1);
    assert_eq!(
        graph.render(root).expect("renders").to_string(),
        "{($x, $y) isa sublocate;} or {(subject-location: $x, located-subject: $y) isa resides;};"
    );
}

#[test]
fn deep_copy_shares_nothing() {
    let mut graph = ExpansionGraph::new();
    let root = graph.insert(conjunction("($x, $y) isa sublocate;"));
    let child = graph.insert(conjunction("(subject-location: $x, located-subject: $y) isa resides;"));
    let atom = graph.get(root).expect("root").atoms().next().map(|(id, _)| id).expect("atom");
    graph.expand_atom_by_query(root, atom, child).expect("attaches");

    let copy = graph.deep_copy(root).expect("copies");
    assert_ne!(copy, root);
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.render(copy).expect("renders"), graph.render(root).expect("renders"));
    let copied_child = graph.get(copy).expect("copy").atom(atom).expect("atom").expansions()[0];
    assert_ne!(copied_child, child);
}

#[test]
fn cycles_are_refused() {
    let mut graph = ExpansionGraph::new();
    let root = graph.insert(conjunction("($x, $y) isa sublocate;"));
    let atom = graph.get(root).expect("root").atoms().next().map(|(id, _)| id).expect("atom");
    graph.expand_atom_by_query(root, atom, root).expect("attaches");
    assert!(matches!(graph.render(root), Err(ResolventError::CyclicExpansion(_))));
    assert!(matches!(graph.deep_copy(root), Err(ResolventError::CyclicExpansion(_))));
}

#[test]
fn unknown_parents_are_reported() {
    let mut big = ExpansionGraph::new();
    big.insert(conjunction("$x isa city;"));
    big.insert(conjunction("$x isa city;"));
    let far = big.insert(conjunction("$x isa city;"));

    let mut small = ExpansionGraph::new();
    let only = small.insert(conjunction("$x isa city; $y isa country; $z isa person;"));
    assert!(matches!(small.get(far), Err(ResolventError::MissingParent(_))));
    assert!(matches!(small.render(far), Err(ResolventError::MissingParent(_))));

    let (third, _) = small
        .get(only)
        .expect("only")
        .atoms()
        .nth(2)
        .map(|(id, a)| (id, a.clone()))
        .expect("third atom");
    let lonely = conjunction("$x isa city;");
    assert!(matches!(lonely.atom(third), Err(ResolventError::MissingParent(_))));
    assert!(matches!(lonely.atomic_query(third), Err(ResolventError::MissingParent(_))));
    assert!(matches!(
        small.expand_atom_by_query(only, third, far),
        Err(ResolventError::MissingParent(_))
    ));
}

#[test]
fn atomic_query_keeps_constraints_on_its_variables() {
    let c = conjunction("$x isa city; ($x, $y) isa sublocate; $y id 'uk'; $z isa person;");
    let (relation, _) = c.atoms().find(|(_, a)| a.is_relation()).expect("relation");
    let atomic = c.atomic_query(relation).expect("atomic query");
    assert_eq!(atomic.pattern().to_string(), "($x, $y) isa sublocate; $x isa city; $y id 'uk';");
}

#[test]
fn atoms_know_their_disjunction() {
    let c = conjunction("$x isa city; {$x has name 'a';} or {$x has name 'b';};");
    let mut atoms = c.atoms().map(|(id, _)| id);
    let city = atoms.next().expect("city");
    let name = atoms.next().expect("name");
    assert!(c.enclosing_disjunction(city).is_none());
    assert_eq!(
        c.enclosing_disjunction(name).expect("disjunction").to_string(),
        "{$x has name 'a';} or {$x has name 'b';};"
    );
}

#[test]
fn same_atom_in_different_branches_is_kept_twice() {
    let c = conjunction("{$x isa city;} or {$x isa city; $x has name 'a';};");
    assert_eq!(c.len(), 3);
    assert_eq!(c.atoms_of_type("city").len(), 2);
}

#[test]
fn atom_keys_compare_across_conjunctions() {
    let a = conjunction("$x isa city; ($x, $y) isa sublocate;");
    let b = conjunction("($x, $y) isa sublocate; $z isa person;");
    let key = |c: &Conjunction| {
        c.atoms()
            .find(|(_, atom)| atom.is_relation())
            .map(|(_, atom)| atom.key(c.vars()))
            .expect("relation")
    };
    assert_eq!(key(&a), key(&b));
    assert_eq!(key(&a).var_name, "$x$y");
}
