//! Conjunction: a pattern decomposed into atoms, plus the overlay of
//! expansions attached to them during resolution.
//!
//! The atoms keep the layout of the pattern they were extracted from (the
//! `Shape`), so that an atom extracted from inside a disjunction is
//! rendered, together with its expansions, back into the same branch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::convert::Infallible;

use crate::atom::{Atom, AtomKind, VarId, VarTable, fresh_name};
use crate::datatype::Predicate;
use crate::error::{ResolventError, Result};
use crate::expansion::ConjId;
use crate::pattern::{MatchQuery, Pattern, VarPattern};
use crate::schema::OtherHasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(usize);

impl AtomId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    Fragment(Vec<AtomId>),
    Conjunction(Vec<Shape>),
    Disjunction(Vec<Shape>),
}

#[derive(Debug, Clone)]
pub struct Conjunction {
    vars: VarTable,
    atoms: Vec<Atom>,
    shape: Shape,
    type_index: HashMap<String, Vec<AtomId>, OtherHasher>,
    // atom -> path through the shape to its innermost enclosing disjunction
    disjunction_of: HashMap<AtomId, Vec<usize>, OtherHasher>,
    // atom -> path to the disjunction branch it sits in
    branch_of: HashMap<AtomId, Vec<usize>, OtherHasher>,
    select: Vec<VarId>,
    origin: Option<String>,
}

impl Conjunction {
    pub fn new(pattern: &Pattern) -> Result<Self> {
        let mut conjunction = Self {
            vars: VarTable::new(),
            atoms: Vec::new(),
            shape: Shape::Conjunction(Vec::new()),
            type_index: HashMap::default(),
            disjunction_of: HashMap::default(),
            branch_of: HashMap::default(),
            select: Vec::new(),
            origin: None,
        };
        let root = match pattern {
            Pattern::Conjunction(_) => pattern.clone(),
            other => Pattern::Conjunction(vec![other.clone()]),
        };
        conjunction.shape = conjunction.build(&root, &mut Vec::new(), None, None)?;
        Ok(conjunction)
    }

    pub fn from_query(query: &MatchQuery) -> Result<Self> {
        let mut conjunction = Self::new(query.pattern())?;
        for name in query.select() {
            let id = conjunction.vars.intern(name)?;
            conjunction.select.push(id);
        }
        Ok(conjunction)
    }

    fn build(
        &mut self,
        pattern: &Pattern,
        path: &mut Vec<usize>,
        enclosing: Option<&[usize]>,
        branch: Option<&[usize]>,
    ) -> Result<Shape> {
        match pattern {
            Pattern::Var(fragment) => {
                let mut ids = Vec::new();
                for single in fragment.fragments() {
                    let atom = Atom::classify(&single, &mut self.vars)?;
                    let scope = enclosing.zip(branch).map(|(d, b)| (d.to_vec(), b.to_vec()));
                    if let Some(id) = self.push_atom(atom, scope) {
                        ids.push(id);
                    }
                }
                Ok(Shape::Fragment(ids))
            }
            Pattern::Conjunction(parts) => {
                let mut children = Vec::with_capacity(parts.len());
                for (i, part) in parts.iter().enumerate() {
                    path.push(i);
                    children.push(self.build(part, path, enclosing, branch)?);
                    path.pop();
                }
                Ok(Shape::Conjunction(children))
            }
            Pattern::Disjunction(branches) => {
                let here = path.clone();
                let mut children = Vec::with_capacity(branches.len());
                for (i, branch) in branches.iter().enumerate() {
                    path.push(i);
                    let within = path.clone();
                    children.push(self.build(branch, path, Some(here.as_slice()), Some(within.as_slice()))?);
                    path.pop();
                }
                Ok(Shape::Disjunction(children))
            }
        }
    }

    // Skips atoms already present in the same disjunction branch (or at top level).
    fn push_atom(&mut self, atom: Atom, scope: Option<(Vec<usize>, Vec<usize>)>) -> Option<AtomId> {
        let branch = scope.as_ref().map(|(_, b)| b);
        let duplicate = self
            .atoms
            .iter()
            .enumerate()
            .any(|(i, a)| *a == atom && self.branch_of.get(&AtomId(i)) == branch);
        if duplicate {
            return None;
        }
        let id = AtomId(self.atoms.len());
        if atom.is_type() {
            if let Some(t) = atom.type_id() {
                self.type_index.entry(t.to_owned()).or_default().push(id);
            }
        }
        if let Some((disjunction, branch)) = scope {
            self.disjunction_of.insert(id, disjunction);
            self.branch_of.insert(id, branch);
        }
        self.atoms.push(atom);
        Some(id)
    }

    /// Adds a top-level fragment. Returns the new atom ids, leaving out duplicates.
    pub fn add_atom(&mut self, fragment: &VarPattern) -> Result<Vec<AtomId>> {
        let mut ids = Vec::new();
        for single in fragment.fragments() {
            let atom = Atom::classify(&single, &mut self.vars)?;
            if let Some(id) = self.push_atom(atom, None) {
                ids.push(id);
            }
        }
        if let Shape::Conjunction(children) = &mut self.shape {
            children.push(Shape::Fragment(ids.clone()));
        }
        Ok(ids)
    }

    // ------------- Accessors -------------
    pub fn atoms(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter().enumerate().map(|(i, a)| (AtomId(i), a))
    }
    pub fn atom(&self, id: AtomId) -> Result<&Atom> {
        self.atoms
            .get(id.0)
            .ok_or_else(|| ResolventError::MissingParent(format!("atom {} is not part of this conjunction", id.0)))
    }
    pub(crate) fn atom_mut(&mut self, id: AtomId) -> Result<&mut Atom> {
        self.atoms
            .get_mut(id.0)
            .ok_or_else(|| ResolventError::MissingParent(format!("atom {} is not part of this conjunction", id.0)))
    }
    pub fn len(&self) -> usize {
        self.atoms.len()
    }
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
    /// Type-bearing atoms of the given type.
    pub fn atoms_of_type(&self, type_id: &str) -> Vec<AtomId> {
        self.type_index.get(type_id).cloned().unwrap_or_default()
    }
    pub fn types(&self) -> BTreeSet<String> {
        self.type_index.keys().cloned().collect()
    }
    pub fn vars(&self) -> &VarTable {
        &self.vars
    }
    pub fn var_names(&self) -> BTreeSet<String> {
        self.vars.names()
    }
    pub fn var_id(&self, name: &str) -> Option<VarId> {
        self.vars.id(name)
    }
    pub fn var_name(&self, id: VarId) -> &str {
        self.vars.name(id)
    }
    pub fn select(&self) -> Vec<String> {
        self.select.iter().map(|id| self.vars.name(*id).to_owned()).collect()
    }
    /// The rule whose body this conjunction was instantiated from.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
    pub(crate) fn set_origin(&mut self, rule: &str) {
        self.origin = Some(rule.to_owned());
    }

    /// The first value or id constraint placed directly on `var`.
    pub fn value_of(&self, var: VarId) -> Option<&Predicate> {
        self.atoms
            .iter()
            .filter(|a| a.is_value_predicate() && a.var() == Some(var))
            .find_map(|a| a.predicate())
    }
    pub fn value_of_name(&self, name: &str) -> Option<&Predicate> {
        self.var_id(name).and_then(|id| self.value_of(id))
    }
    /// The value a resource atom is constrained to, inline or through its value variable.
    pub fn resource_value(&self, atom: AtomId) -> Option<&Predicate> {
        let atom = self.atoms.get(atom.0)?;
        atom.predicate()
            .or_else(|| atom.value_var().and_then(|v| self.value_of(v)))
    }
    /// The type a type atom assigns to `var`.
    pub fn type_of(&self, var: VarId) -> Option<&str> {
        self.atoms
            .iter()
            .filter(|a| a.kind() == AtomKind::Type && a.var() == Some(var))
            .find_map(|a| a.type_id())
    }
    pub fn type_of_name(&self, name: &str) -> Option<&str> {
        self.var_id(name).and_then(|id| self.type_of(id))
    }
    /// Known type of every typed variable: type atoms, attribute value
    /// variables and named relations.
    pub fn var_type_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for atom in &self.atoms {
            let (var, t) = match (atom.kind(), atom.type_id()) {
                (AtomKind::Type | AtomKind::Relation, Some(t)) => (atom.var(), t),
                (AtomKind::Resource, Some(t)) => (atom.value_var(), t),
                _ => continue,
            };
            if let Some(var) = var {
                map.entry(self.vars.name(var).to_owned()).or_insert_with(|| t.to_owned());
            }
        }
        map
    }

    /// The disjunction the atom was extracted from, if any.
    pub fn enclosing_disjunction(&self, atom: AtomId) -> Option<Pattern> {
        let path = self.disjunction_of.get(&atom)?;
        let mut shape = &self.shape;
        for step in path {
            shape = match shape {
                Shape::Conjunction(children) | Shape::Disjunction(children) => children.get(*step)?,
                Shape::Fragment(_) => return None,
            };
        }
        let rendered = self.render_shape(shape, &mut |_| Ok::<_, Infallible>(None));
        match rendered {
            Ok(mut parts) => parts.pop(),
            Err(never) => match never {},
        }
    }

    // ------------- Renaming -------------
    /// Renames `from` to `to` in every atom. If `to` is already bound here,
    /// that variable first moves aside to `to` extended by its own stem
    /// (`$y` becomes `$yy`), so the two never merge.
    pub fn change_var_name(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let Some(source) = self.vars.id(from) else { return };
        if let Some(occupant) = self.vars.id(to) {
            let displaced = fresh_name(to, |n| self.vars.contains(n) || n == from);
            self.vars.rename(occupant, &displaced);
        }
        self.vars.rename(source, to);
    }

    /// Swaps two variable names, routing through a temporary name.
    pub fn exchange_var_names(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        let temp = fresh_name("$temp", |n| self.vars.contains(n));
        self.change_var_name(a, &temp);
        self.change_var_name(b, a);
        self.change_var_name(&temp, b);
    }

    /// Applies a whole substitution at once, so chains such as
    /// `$a -> $b, $b -> $c` do not feed into each other. Targets bound to a
    /// variable outside the substitution are moved aside first.
    pub fn rename_all(&mut self, mapping: &BTreeMap<String, String>) {
        let sources: Vec<(VarId, &str)> = mapping
            .iter()
            .filter(|(from, to)| from != to)
            .filter_map(|(from, to)| self.vars.id(from).map(|id| (id, to.as_str())))
            .collect();
        if sources.is_empty() {
            return;
        }
        let moving: BTreeSet<VarId> = sources.iter().map(|(id, _)| *id).collect();
        for (_, to) in &sources {
            if let Some(occupant) = self.vars.id(to) {
                if !moving.contains(&occupant) {
                    let displaced = fresh_name(to, |n| self.vars.contains(n) || mapping.contains_key(n) || mapping.values().any(|v| v == n));
                    self.vars.rename(occupant, &displaced);
                }
            }
        }
        // park every source first, so a target freed by another source is free when written
        let parked: Vec<(VarId, String)> = sources
            .iter()
            .enumerate()
            .map(|(i, (id, to))| {
                let temp = fresh_name(&format!("$parked{}", i), |n| self.vars.contains(n));
                self.vars.rename(*id, &temp);
                (*id, to.to_string())
            })
            .collect();
        for (id, to) in parked {
            // two sources sharing a target: the later one moves aside
            let name = if self.vars.contains(&to) {
                fresh_name(&to, |n| self.vars.contains(n))
            } else {
                to
            };
            self.vars.rename(id, &name);
        }
    }

    // ------------- Derived queries -------------
    /// A standalone conjunction holding the atom plus the value predicates
    /// and type atoms constraining its variables.
    pub fn atomic_query(&self, atom: AtomId) -> Result<Conjunction> {
        let target = self.atom(atom)?;
        let mut parts = vec![Pattern::Var(target.pattern(&self.vars))];
        for (id, other) in self.atoms() {
            if id == atom {
                continue;
            }
            let constrains = matches!(other.kind(), AtomKind::Type | AtomKind::ValuePredicate)
                && other.var().is_some_and(|v| target.contains_var(v));
            if constrains {
                parts.push(Pattern::Var(other.pattern(&self.vars)));
            }
        }
        Conjunction::new(&Pattern::Conjunction(parts))
    }

    // ------------- Rendering -------------
    /// The pattern this conjunction stands for, ignoring expansions.
    pub fn pattern(&self) -> Pattern {
        match self.render_with(&mut |_| Ok::<_, Infallible>(None)) {
            Ok(pattern) => pattern,
            Err(never) => match never {},
        }
    }

    /// Renders the conjunction, asking `expand` for the expansion pattern of each atom.
    pub(crate) fn render_with<E>(
        &self,
        expand: &mut dyn FnMut(AtomId) -> std::result::Result<Option<Pattern>, E>,
    ) -> std::result::Result<Pattern, E> {
        let mut parts = self.render_shape(&self.shape, expand)?;
        Ok(parts.pop().unwrap_or(Pattern::Conjunction(Vec::new())))
    }

    fn render_shape<E>(
        &self,
        shape: &Shape,
        expand: &mut dyn FnMut(AtomId) -> std::result::Result<Option<Pattern>, E>,
    ) -> std::result::Result<Vec<Pattern>, E> {
        match shape {
            Shape::Fragment(ids) => {
                let mut plain: Option<VarPattern> = None;
                let mut expanded = Vec::new();
                for id in ids {
                    let Some(atom) = self.atoms.get(id.0) else { continue };
                    let fragment = atom.pattern(&self.vars);
                    match expand(*id)? {
                        Some(alternatives) => expanded.push(alternatives),
                        None => match plain.as_mut() {
                            Some(p) => p.merge(fragment),
                            None => plain = Some(fragment),
                        },
                    }
                }
                let mut parts: Vec<Pattern> = plain.into_iter().map(Pattern::Var).collect();
                parts.extend(expanded);
                Ok(parts)
            }
            Shape::Conjunction(children) => {
                let mut parts = Vec::new();
                for child in children {
                    parts.extend(self.render_shape(child, expand)?);
                }
                Ok(vec![Pattern::Conjunction(parts)])
            }
            Shape::Disjunction(children) => {
                let mut branches = Vec::with_capacity(children.len());
                for child in children {
                    let mut parts = self.render_shape(child, expand)?;
                    let branch = match (child, parts.len()) {
                        (Shape::Conjunction(_), 1) => parts.pop().unwrap_or(Pattern::Conjunction(Vec::new())),
                        _ => Pattern::Conjunction(parts),
                    };
                    branches.push(branch);
                }
                Ok(vec![Pattern::Disjunction(branches)])
            }
        }
    }

    /// Every expansion attached to any atom.
    pub fn expansion_ids(&self) -> Vec<(AtomId, ConjId)> {
        self.atoms()
            .flat_map(|(id, atom)| atom.expansions().iter().map(move |c| (id, *c)))
            .collect()
    }
}
