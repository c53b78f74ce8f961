#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use resolvent::config::ReasonerConfig;
use resolvent::datatype::{Literal, Predicate};
use resolvent::interface::{Answer, Executor, Session};
use resolvent::pattern::{HasTarget, MatchQuery, VarPattern};
use resolvent::schema::{MemorySchema, Rule, Schema, SchemaType};
use resolvent::Result;

/// Locations, people living in them, and the rules linking residence to sublocation.
pub fn location_schema() -> MemorySchema {
    let schema = MemorySchema::new();
    for role in [
        "subject-location",
        "located-subject",
        "member-location",
        "container-location",
    ] {
        schema.define(SchemaType::role(role));
    }
    schema.define(SchemaType::entity("location").playing(&[
        "subject-location",
        "member-location",
        "container-location",
    ]));
    schema.define(SchemaType::entity("city").sub("location"));
    schema.define(SchemaType::entity("country").sub("location"));
    schema.define(SchemaType::entity("person").playing(&["located-subject"]));
    schema.define(SchemaType::relation("resides").relating(&["subject-location", "located-subject"]));
    schema.define(SchemaType::relation("sublocate").relating(&["member-location", "container-location"]));
    for attribute in ["name", "age", "status"] {
        schema.define(SchemaType::attribute(attribute));
    }
    schema.add_rule(
        Rule::parse(
            "sublocation",
            "(subject-location: $x, located-subject: $x1) isa resides;",
            "(member-location: $x, container-location: $x1) isa sublocate;",
        )
        .expect("rule parses"),
    );
    schema
}

pub fn session(schema: MemorySchema) -> Session<MemorySchema> {
    Session::new(Arc::new(schema), ReasonerConfig::default())
}

pub fn session_with(schema: MemorySchema, config: ReasonerConfig) -> Session<MemorySchema> {
    Session::new(Arc::new(schema), config)
}

pub fn add_rule(schema: &MemorySchema, id: &str, when: &str, then: &str) {
    schema.add_rule(Rule::parse(id, when, then).expect("rule parses"));
}

pub fn answer(pairs: &[(&str, &str)]) -> Answer {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn answer_set(answers: Vec<Answer>) -> BTreeSet<Answer> {
    answers.into_iter().collect()
}

// ------------- MemoryGraph -------------
#[derive(Debug, Clone, PartialEq)]
enum Bound {
    Concept(String),
    Value(Literal),
}
impl Bound {
    fn render(&self) -> String {
        match self {
            Bound::Concept(id) => id.clone(),
            Bound::Value(Literal::Str(s)) => s.clone(),
            Bound::Value(l) => l.to_string(),
        }
    }
}

type Binding = BTreeMap<String, Bound>;

/// Naive pattern matcher over a handful of facts, good enough to compare answer sets.
pub struct MemoryGraph {
    schema: Arc<MemorySchema>,
    entities: Vec<(String, String)>,
    relations: Vec<(String, String, Vec<(String, String)>)>,
    attributes: Vec<(String, String, Literal)>,
}

impl MemoryGraph {
    pub fn new(schema: Arc<MemorySchema>) -> Self {
        Self {
            schema,
            entities: Vec::new(),
            relations: Vec::new(),
            attributes: Vec::new(),
        }
    }
    pub fn entity(mut self, id: &str, type_id: &str) -> Self {
        self.entities.push((id.to_owned(), type_id.to_owned()));
        self
    }
    pub fn relation(mut self, id: &str, type_id: &str, castings: &[(&str, &str)]) -> Self {
        let castings = castings.iter().map(|(r, p)| (r.to_string(), p.to_string())).collect();
        self.relations.push((id.to_owned(), type_id.to_owned(), castings));
        self
    }
    pub fn attribute(mut self, owner: &str, attribute: &str, value: Literal) -> Self {
        self.attributes.push((owner.to_owned(), attribute.to_owned(), value));
        self
    }

    fn type_of(&self, id: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|(e, _)| e == id)
            .map(|(_, t)| t.as_str())
            .or_else(|| self.relations.iter().find(|(r, _, _)| r == id).map(|(_, t, _)| t.as_str()))
    }

    fn bind(binding: &Binding, var: &str, value: Bound) -> Option<Binding> {
        match binding.get(var) {
            Some(existing) if *existing != value => None,
            Some(_) => Some(binding.clone()),
            None => {
                let mut extended = binding.clone();
                extended.insert(var.to_owned(), value);
                Some(extended)
            }
        }
    }

    fn match_fragment(&self, fragment: &VarPattern, binding: &Binding) -> Vec<Binding> {
        let mut out = Vec::new();
        if fragment.is_relation() {
            for (id, type_id, castings) in &self.relations {
                if let Some(isa) = fragment.isa() {
                    if !self.schema.is_subtype(type_id, isa) {
                        continue;
                    }
                }
                let start = match fragment.var() {
                    Some(v) => Self::bind(binding, v, Bound::Concept(id.clone())),
                    None => Some(binding.clone()),
                };
                if let Some(start) = start {
                    self.assign_castings(fragment, 0, castings, &mut vec![false; castings.len()], start, &mut out);
                }
            }
            return out;
        }
        let Some(var) = fragment.var() else { return out };
        if let Some(isa) = fragment.isa() {
            let ids = self
                .entities
                .iter()
                .map(|(id, t)| (id, t))
                .chain(self.relations.iter().map(|(id, t, _)| (id, t)));
            for (id, t) in ids {
                if self.schema.is_subtype(t, isa) {
                    out.extend(Self::bind(binding, var, Bound::Concept(id.clone())));
                }
            }
        } else if let Some(has) = fragment.has().first() {
            for (owner, attribute, value) in &self.attributes {
                if attribute != has.attribute() {
                    continue;
                }
                let Some(owned) = Self::bind(binding, var, Bound::Concept(owner.clone())) else { continue };
                match has.target() {
                    HasTarget::Var(v) => out.extend(Self::bind(&owned, v, Bound::Value(value.clone()))),
                    HasTarget::Value(p) if p.test(value) => out.push(owned),
                    HasTarget::Value(_) => (),
                }
            }
        } else if let Some(predicate) = fragment.predicates().first() {
            match (predicate, binding.get(var)) {
                (Predicate::Id(id), None) => {
                    if self.type_of(id).is_some() {
                        out.extend(Self::bind(binding, var, Bound::Concept(id.clone())));
                    }
                }
                (Predicate::Id(id), Some(Bound::Concept(bound))) if bound == id => out.push(binding.clone()),
                (Predicate::Value(..), Some(Bound::Value(v))) if predicate.test(v) => out.push(binding.clone()),
                _ => (),
            }
        }
        out
    }

    fn assign_castings(
        &self,
        fragment: &VarPattern,
        index: usize,
        castings: &[(String, String)],
        used: &mut Vec<bool>,
        binding: Binding,
        out: &mut Vec<Binding>,
    ) {
        let Some(casting) = fragment.castings().get(index) else {
            out.push(binding);
            return;
        };
        for (i, (role, player)) in castings.iter().enumerate() {
            if used[i] {
                continue;
            }
            if let Some(wanted) = casting.role() {
                if !self.schema.is_subtype(role, wanted) {
                    continue;
                }
            }
            if let Some(next) = Self::bind(&binding, casting.player(), Bound::Concept(player.clone())) {
                used[i] = true;
                self.assign_castings(fragment, index + 1, castings, used, next, out);
                used[i] = false;
            }
        }
    }
}

impl Executor for MemoryGraph {
    fn execute(&self, query: &MatchQuery) -> Result<Vec<Answer>> {
        let projection = query.projection();
        let mut answers = BTreeSet::new();
        for conjunct in query.pattern().dnf() {
            let mut fragments: Vec<VarPattern> = conjunct.iter().flat_map(|f| f.fragments()).collect();
            // value filters need their variable bound first
            fragments.sort_by_key(|f| !f.is_relation() && f.isa().is_none() && f.has().is_empty());
            let mut bindings = vec![Binding::new()];
            for fragment in &fragments {
                bindings = bindings.iter().flat_map(|b| self.match_fragment(fragment, b)).collect();
            }
            for binding in bindings {
                let answer: Answer = projection
                    .iter()
                    .filter_map(|v| binding.get(v).map(|b| (v.clone(), b.render())))
                    .collect();
                answers.insert(answer);
            }
        }
        Ok(answers.into_iter().collect())
    }
}
