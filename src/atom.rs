//! Atoms: the smallest resolvable units of a conjunction.
//!
//! Variables are interned per conjunction: an [`Atom`] refers to [`VarId`]s
//! and the owning [`VarTable`] maps them to display names. Renaming a
//! variable therefore rewrites one table entry and leaves every atom, and
//! its identity, untouched.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use bimap::BiMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::datatype::Predicate;
use crate::error::{ResolventError, Result};
use crate::expansion::ConjId;
use crate::pattern::{HasTarget, VarPattern};

lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"^\$[A-Za-z0-9_-]+$").expect("variable regex");
}

// ------------- VarId -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interned variable names of one conjunction.
#[derive(Debug, Clone, Default)]
pub struct VarTable {
    names: BiMap<VarId, String>,
    next: u32,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the index for `name`, allocating one if the name is new.
    pub fn intern(&mut self, name: &str) -> Result<VarId> {
        if let Some(id) = self.names.get_by_right(name) {
            return Ok(*id);
        }
        if !VARIABLE.is_match(name) {
            return Err(ResolventError::MalformedAtom(format!("invalid variable name '{}'", name)));
        }
        let id = VarId(self.next);
        self.next += 1;
        self.names.insert(id, name.to_owned());
        Ok(id)
    }
    pub fn id(&self, name: &str) -> Option<VarId> {
        self.names.get_by_right(name).copied()
    }
    /// The display name of `id`; empty for an index this table never handed out.
    pub fn name(&self, id: VarId) -> &str {
        self.names.get_by_left(&id).map(String::as_str).unwrap_or("")
    }
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_right(name)
    }
    /// Points `id` at a new display name. The caller makes sure the name is free.
    pub(crate) fn rename(&mut self, id: VarId, to: &str) {
        self.names.insert(id, to.to_owned());
    }
    pub fn names(&self) -> BTreeSet<String> {
        self.names.right_values().cloned().collect()
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Derives a name from `name` by appending its own stem (`$x` becomes `$xx`,
/// then `$xxx`) until `taken` rejects it no longer.
pub fn fresh_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let stem = name.trim_start_matches('$');
    let stem = if stem.is_empty() { "v" } else { stem };
    let mut candidate = format!("{}{}", name, stem);
    while taken(&candidate) {
        candidate.push_str(stem);
    }
    candidate
}

// ------------- Atom -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomKind {
    Type,
    Relation,
    Resource,
    ValuePredicate,
}

/// A role-player pair with the player interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RolePlayer {
    role: Option<String>,
    player: VarId,
}
impl RolePlayer {
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
    pub fn player(&self) -> VarId {
        self.player
    }
}

/// One resolvable constraint. Atoms are created by [`Atom::classify`] and
/// owned by a conjunction; equality and hashing cover the type, the variables
/// and the value, never the attached expansions.
#[derive(Debug, Clone)]
pub struct Atom {
    kind: AtomKind,
    var: Option<VarId>,
    type_id: Option<String>,
    predicate: Option<Predicate>,
    value_var: Option<VarId>,
    players: Vec<RolePlayer>,
    expansions: Vec<ConjId>,
}

impl Atom {
    /// Builds the atom for a single-property fragment, interning its variables.
    pub fn classify(fragment: &VarPattern, vars: &mut VarTable) -> Result<Atom> {
        if fragment.property_count() != 1 {
            return Err(ResolventError::MalformedAtom(format!(
                "'{}' carries {} properties, expected exactly one",
                fragment,
                fragment.property_count()
            )));
        }
        let var = fragment.var().map(|v| vars.intern(v)).transpose()?;
        let mut atom = Atom {
            kind: AtomKind::Type,
            var,
            type_id: None,
            predicate: None,
            value_var: None,
            players: Vec::new(),
            expansions: Vec::new(),
        };
        if fragment.is_relation() {
            atom.kind = AtomKind::Relation;
            atom.type_id = fragment.isa().map(str::to_owned);
            for casting in fragment.castings() {
                atom.players.push(RolePlayer {
                    role: casting.role().map(str::to_owned),
                    player: vars.intern(casting.player())?,
                });
            }
            return Ok(atom);
        }
        if atom.var.is_none() {
            return Err(ResolventError::MalformedAtom(format!(
                "'{}' is not rooted in a variable",
                fragment
            )));
        }
        if let Some(isa) = fragment.isa() {
            atom.type_id = Some(isa.to_owned());
        } else if let Some(has) = fragment.has().first() {
            atom.kind = AtomKind::Resource;
            atom.type_id = Some(has.attribute().to_owned());
            match has.target() {
                HasTarget::Var(v) => atom.value_var = Some(vars.intern(v)?),
                HasTarget::Value(p) => atom.predicate = Some(p.clone()),
            }
        } else if let Some(predicate) = fragment.predicates().first() {
            atom.kind = AtomKind::ValuePredicate;
            atom.predicate = Some(predicate.clone());
        }
        Ok(atom)
    }

    pub fn kind(&self) -> AtomKind {
        self.kind
    }
    /// True for atoms carrying a schema type, i.e. the ones rules can conclude.
    pub fn is_type(&self) -> bool {
        self.kind != AtomKind::ValuePredicate
    }
    pub fn is_relation(&self) -> bool {
        self.kind == AtomKind::Relation
    }
    pub fn is_resource(&self) -> bool {
        self.kind == AtomKind::Resource
    }
    pub fn is_value_predicate(&self) -> bool {
        self.kind == AtomKind::ValuePredicate
    }
    pub fn type_id(&self) -> Option<&str> {
        self.type_id.as_deref()
    }
    pub fn var(&self) -> Option<VarId> {
        self.var
    }
    pub fn value_var(&self) -> Option<VarId> {
        self.value_var
    }
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }
    pub fn players(&self) -> &[RolePlayer] {
        &self.players
    }
    pub fn expansions(&self) -> &[ConjId] {
        &self.expansions
    }

    /// Adds an expansion unless it is already attached.
    pub(crate) fn add_expansion(&mut self, child: ConjId) -> bool {
        if self.expansions.contains(&child) {
            return false;
        }
        self.expansions.push(child);
        true
    }
    pub(crate) fn set_expansions(&mut self, expansions: Vec<ConjId>) {
        self.expansions = expansions;
    }

    /// Every variable the atom mentions, in order of appearance.
    pub fn var_ids(&self) -> Vec<VarId> {
        let mut ids: Vec<VarId> = self.var.into_iter().collect();
        ids.extend(self.players.iter().map(|p| p.player));
        ids.extend(self.value_var);
        ids
    }
    pub fn contains_var(&self, id: VarId) -> bool {
        self.var_ids().contains(&id)
    }

    /// The variable name; an anonymous relation is named by its players.
    pub fn var_name(&self, vars: &VarTable) -> String {
        match self.var {
            Some(id) => vars.name(id).to_owned(),
            None => self.players.iter().map(|p| vars.name(p.player)).collect(),
        }
    }

    /// Identity of the atom independent of the table its variables live in.
    pub fn key(&self, vars: &VarTable) -> AtomKey {
        AtomKey {
            type_id: self.type_id.clone().unwrap_or_default(),
            var_name: self.var_name(vars),
            value: self.predicate.as_ref().map(|p| p.to_string()).unwrap_or_default(),
        }
    }

    /// Renders the atom back into a fragment.
    pub fn pattern(&self, vars: &VarTable) -> VarPattern {
        let mut fragment = match self.var {
            Some(id) => VarPattern::named(vars.name(id)),
            None => VarPattern::anonymous(),
        };
        for p in &self.players {
            fragment = fragment.with_casting(p.role(), vars.name(p.player));
        }
        match self.kind {
            AtomKind::Type | AtomKind::Relation => {
                if let Some(t) = &self.type_id {
                    fragment = fragment.with_isa(t);
                }
            }
            AtomKind::Resource => {
                let attribute = self.type_id.as_deref().unwrap_or_default();
                fragment = match (self.value_var, &self.predicate) {
                    (Some(v), _) => fragment.with_has_var(attribute, vars.name(v)),
                    (None, Some(p)) => fragment.with_has_value(attribute, p.clone()),
                    (None, None) => fragment,
                };
            }
            AtomKind::ValuePredicate => {
                if let Some(p) = &self.predicate {
                    fragment = fragment.with_predicate(p.clone());
                }
            }
        }
        fragment
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        (self.kind, &self.type_id, self.var, self.value_var, &self.predicate, &self.players)
            == (other.kind, &other.type_id, other.var, other.value_var, &other.predicate, &other.players)
    }
}
impl Eq for Atom {}
impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.type_id.hash(state);
        self.var.hash(state);
        self.value_var.hash(state);
        self.predicate.hash(state);
        self.players.hash(state);
    }
}

/// Name-based identity, comparable across conjunctions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomKey {
    pub type_id: String,
    pub var_name: String,
    pub value: String,
}
