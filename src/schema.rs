//! Schema: types, their hierarchy, role declarations and the rules concluding them.
//!
//! The resolver only ever talks to the [`Schema`] trait. [`MemorySchema`] is
//! the in-memory implementation used by the binary and the tests; its
//! constructs are owned by "keeper" structures handing out `Arc`s so that the
//! same type or rule is shared rather than copied.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use serde::Deserialize;

use crate::error::{ResolventError, Result};
use crate::parser::parse_patterns;
use crate::pattern::Pattern;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Schema -------------
/// Read access to types and rules, as needed by query expansion.
pub trait Schema: Send + Sync {
    fn get_type(&self, label: &str) -> Option<Arc<SchemaType>>;
    /// Proper supertypes of `label`, nearest first.
    fn supertypes(&self, label: &str) -> Vec<String>;
    /// Proper subtypes of `label`, in label order.
    fn subtypes(&self, label: &str) -> Vec<String>;
    fn rules_of_conclusion(&self, label: &str) -> Vec<Arc<Rule>>;
    fn rules(&self) -> Vec<Arc<Rule>>;
    /// Bumped on every change, so that derived caches know when to recompile.
    fn revision(&self) -> u64;

    fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.supertypes(sub).iter().any(|s| s == sup)
    }
    fn plays(&self, label: &str, role: &str) -> bool {
        self.lineage(label)
            .iter()
            .filter_map(|t| self.get_type(t))
            .any(|t| t.plays().iter().any(|r| r == role))
    }
    fn relates(&self, relation: &str, role: &str) -> bool {
        self.roles_of(relation).iter().any(|r| r == role)
    }
    fn roles_of(&self, relation: &str) -> Vec<String> {
        let mut roles = Vec::new();
        for t in self.lineage(relation).iter().filter_map(|t| self.get_type(t)) {
            for role in t.relates() {
                if !roles.contains(role) {
                    roles.push(role.clone());
                }
            }
        }
        roles
    }
    /// The type itself followed by its supertypes.
    fn lineage(&self, label: &str) -> Vec<String> {
        let mut lineage = vec![label.to_owned()];
        lineage.extend(self.supertypes(label));
        lineage
    }
}

// ------------- SchemaType -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Entity,
    Relation,
    Attribute,
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaType {
    label: String,
    kind: TypeKind,
    sup: Option<String>,
    plays: Vec<String>,
    relates: Vec<String>,
}

impl SchemaType {
    pub fn new(label: &str, kind: TypeKind) -> Self {
        Self {
            label: label.to_owned(),
            kind,
            sup: None,
            plays: Vec::new(),
            relates: Vec::new(),
        }
    }
    pub fn entity(label: &str) -> Self {
        Self::new(label, TypeKind::Entity)
    }
    pub fn relation(label: &str) -> Self {
        Self::new(label, TypeKind::Relation)
    }
    pub fn attribute(label: &str) -> Self {
        Self::new(label, TypeKind::Attribute)
    }
    pub fn role(label: &str) -> Self {
        Self::new(label, TypeKind::Role)
    }
    pub fn sub(mut self, sup: &str) -> Self {
        self.sup = Some(sup.to_owned());
        self
    }
    pub fn playing(mut self, roles: &[&str]) -> Self {
        self.plays.extend(roles.iter().map(|r| r.to_string()));
        self
    }
    pub fn relating(mut self, roles: &[&str]) -> Self {
        self.relates.extend(roles.iter().map(|r| r.to_string()));
        self
    }
    // It's intentional to encapsulate the fields in the struct
    // and only expose them using "getters", because this yields
    // true immutability for types after they are kept.
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn kind(&self) -> TypeKind {
        self.kind
    }
    pub fn sup(&self) -> Option<&str> {
        self.sup.as_deref()
    }
    pub fn plays(&self) -> &[String] {
        &self.plays
    }
    pub fn relates(&self) -> &[String] {
        &self.relates
    }
}

#[derive(Debug, Default)]
pub struct TypeKeeper {
    kept: HashMap<String, Arc<SchemaType>, OtherHasher>,
}
impl TypeKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn keep(&mut self, schema_type: SchemaType) -> (Arc<SchemaType>, bool) {
        match self.kept.entry(schema_type.label.clone()) {
            Entry::Vacant(e) => (Arc::clone(e.insert(Arc::new(schema_type))), false),
            Entry::Occupied(e) => (Arc::clone(e.get()), true),
        }
    }
    pub fn get(&self, label: &str) -> Option<Arc<SchemaType>> {
        self.kept.get(label).map(Arc::clone)
    }
    pub fn labels(&self) -> BTreeSet<String> {
        self.kept.keys().cloned().collect()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Rule -------------
/// An inference rule `when <body> then <head>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    id: String,
    when: Pattern,
    then: Pattern,
}

impl Rule {
    pub fn new(id: &str, when: Pattern, then: Pattern) -> Self {
        Self {
            id: id.to_owned(),
            when,
            then,
        }
    }
    /// Builds a rule from its textual body and head.
    pub fn parse(id: &str, when: &str, then: &str) -> Result<Self> {
        Ok(Self::new(id, parse_patterns(when)?, parse_patterns(then)?))
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn when(&self) -> &Pattern {
        &self.when
    }
    pub fn then(&self) -> &Pattern {
        &self.then
    }
    /// Every type the head concludes. A well formed rule concludes exactly one.
    pub fn conclusion_types(&self) -> BTreeSet<String> {
        types_in(&self.then)
    }
    pub fn hypothesis_types(&self) -> BTreeSet<String> {
        types_in(&self.when)
    }
}

fn types_in(pattern: &Pattern) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    for conjunct in pattern.dnf() {
        for fragment in conjunct {
            if let Some(isa) = fragment.isa() {
                types.insert(isa.to_owned());
            }
            for has in fragment.has() {
                types.insert(has.attribute().to_owned());
            }
        }
    }
    types
}

#[derive(Debug, Default)]
pub struct RuleKeeper {
    kept: HashMap<String, Arc<Rule>, OtherHasher>,
    by_conclusion: HashMap<String, Vec<Arc<Rule>>, OtherHasher>,
}
impl RuleKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn keep(&mut self, rule: Rule) -> (Arc<Rule>, bool) {
        if let Some(kept) = self.kept.get(rule.id()) {
            return (Arc::clone(kept), true);
        }
        let rule = Arc::new(rule);
        for conclusion in rule.conclusion_types() {
            self.by_conclusion
                .entry(conclusion)
                .or_default()
                .push(Arc::clone(&rule));
        }
        self.kept.insert(rule.id().to_owned(), Arc::clone(&rule));
        (rule, false)
    }
    pub fn release(&mut self, id: &str) -> Option<Arc<Rule>> {
        let rule = self.kept.remove(id)?;
        for rules in self.by_conclusion.values_mut() {
            rules.retain(|r| r.id() != id);
        }
        Some(rule)
    }
    pub fn concluding(&self, label: &str) -> Vec<Arc<Rule>> {
        let mut rules = self.by_conclusion.get(label).cloned().unwrap_or_default();
        rules.sort_by(|a, b| a.id().cmp(b.id()));
        rules
    }
    pub fn all(&self) -> Vec<Arc<Rule>> {
        let mut rules: Vec<Arc<Rule>> = self.kept.values().map(Arc::clone).collect();
        rules.sort_by(|a, b| a.id().cmp(b.id()));
        rules
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- MemorySchema -------------
#[derive(Debug, Default)]
pub struct MemorySchema {
    type_keeper: RwLock<TypeKeeper>,
    rule_keeper: RwLock<RuleKeeper>,
    revision: AtomicU64,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the type, returning the kept instance and whether it was already known.
    pub fn define(&self, schema_type: SchemaType) -> (Arc<SchemaType>, bool) {
        let kept = write(&self.type_keeper).keep(schema_type);
        if !kept.1 {
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
        kept
    }

    pub fn add_rule(&self, rule: Rule) -> (Arc<Rule>, bool) {
        let kept = write(&self.rule_keeper).keep(rule);
        if !kept.1 {
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
        kept
    }

    pub fn remove_rule(&self, id: &str) -> Option<Arc<Rule>> {
        let released = write(&self.rule_keeper).release(id);
        if released.is_some() {
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
        released
    }

    /// Checks that every referenced supertype, role and rule type is declared.
    pub fn validate(&self) -> Result<()> {
        let types = read(&self.type_keeper);
        for label in types.labels() {
            let Some(t) = types.get(&label) else { continue };
            let referenced = t
                .sup()
                .into_iter()
                .chain(t.plays().iter().map(String::as_str))
                .chain(t.relates().iter().map(String::as_str));
            for other in referenced {
                if types.get(other).is_none() {
                    return Err(ResolventError::UnknownType(format!(
                        "{} (referenced by {})",
                        other, label
                    )));
                }
            }
        }
        for rule in read(&self.rule_keeper).all() {
            for label in rule.conclusion_types().into_iter().chain(rule.hypothesis_types()) {
                if types.get(&label).is_none() {
                    return Err(ResolventError::UnknownType(format!(
                        "{} (referenced by rule {})",
                        label,
                        rule.id()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn from_definition(definition: SchemaDefinition) -> Result<Self> {
        let schema = Self::new();
        for (label, t) in definition.types {
            let mut schema_type = SchemaType::new(&label, t.kind);
            schema_type.sup = t.sub;
            schema_type.plays = t.plays;
            schema_type.relates = t.relates;
            schema.define(schema_type);
        }
        for r in definition.rules {
            schema.add_rule(Rule::parse(&r.id, &r.when, &r.then)?);
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Reads a schema definition file (TOML, JSON or YAML, by extension).
    pub fn load(path: &Path) -> Result<Self> {
        let definition = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize::<SchemaDefinition>()?;
        Self::from_definition(definition)
    }

    pub fn type_count(&self) -> usize {
        read(&self.type_keeper).len()
    }
    pub fn rule_count(&self) -> usize {
        read(&self.rule_keeper).len()
    }
}

impl Schema for MemorySchema {
    fn get_type(&self, label: &str) -> Option<Arc<SchemaType>> {
        read(&self.type_keeper).get(label)
    }
    fn supertypes(&self, label: &str) -> Vec<String> {
        let types = read(&self.type_keeper);
        let mut supertypes = Vec::new();
        let mut current = types.get(label).and_then(|t| t.sup().map(str::to_owned));
        while let Some(sup) = current {
            if sup == label || supertypes.contains(&sup) {
                break;
            }
            current = types.get(&sup).and_then(|t| t.sup().map(str::to_owned));
            supertypes.push(sup);
        }
        supertypes
    }
    fn subtypes(&self, label: &str) -> Vec<String> {
        let labels = read(&self.type_keeper).labels();
        labels
            .into_iter()
            .filter(|l| l != label && self.supertypes(l).iter().any(|s| s == label))
            .collect()
    }
    fn rules_of_conclusion(&self, label: &str) -> Vec<Arc<Rule>> {
        read(&self.rule_keeper).concluding(label)
    }
    fn rules(&self) -> Vec<Arc<Rule>> {
        read(&self.rule_keeper).all()
    }
    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

// A poisoned keeper is still structurally sound, since every mutation is a single insert or remove.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}
fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ------------- SchemaDefinition -------------
/// File form of a schema, e.g.
///
/// ```toml
/// [types.person]
/// kind = "entity"
/// plays = ["located-subject"]
///
/// [[rules]]
/// id = "sublocation"
/// when = "(subject-location: $x, located-subject: $x1) isa resides;"
/// then = "(member-location: $x, container-location: $x1) isa sublocate;"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub types: BTreeMap<String, TypeDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeDefinition {
    pub kind: TypeKind,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub plays: Vec<String>,
    #[serde(default)]
    pub relates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub when: String,
    pub then: String,
}
