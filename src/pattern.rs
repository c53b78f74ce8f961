//! Pattern trees: the input and the output of query expansion.
//!
//! A [`Pattern`] is a tree of conjunctions and disjunctions whose leaves are
//! [`VarPattern`]s, fragments rooted in a single variable such as
//! `$x isa person, has age <10` or `(located-subject: $x, subject-location: $y) isa resides`.
//! [`MatchQuery`] wraps a pattern with an optional `select` projection and
//! renders the concrete syntax accepted by [`crate::parser`].

use std::collections::BTreeSet;
use std::fmt;

use crate::datatype::Predicate;

// ------------- Casting -------------
/// A role-player pair inside a relation pattern. The role is a hint and may
/// be left out, in which case it is inferred (or left unconstrained).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Casting {
    role: Option<String>,
    player: String,
}
impl Casting {
    pub fn new(role: Option<&str>, player: &str) -> Self {
        Self {
            role: role.map(str::to_owned),
            player: player.to_owned(),
        }
    }
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
    pub fn player(&self) -> &str {
        &self.player
    }
}
impl fmt::Display for Casting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.role {
            Some(role) => write!(f, "{}: {}", role, self.player),
            None => write!(f, "{}", self.player),
        }
    }
}

// ------------- Has -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HasTarget {
    Var(String),
    Value(Predicate),
}

/// An attribute ownership, either bound to a variable or constrained inline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Has {
    attribute: String,
    target: HasTarget,
}
impl Has {
    pub fn new(attribute: &str, target: HasTarget) -> Self {
        Self {
            attribute: attribute.to_owned(),
            target,
        }
    }
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
    pub fn target(&self) -> &HasTarget {
        &self.target
    }
}
impl fmt::Display for Has {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.target {
            HasTarget::Var(v) => write!(f, "has {} {}", self.attribute, v),
            HasTarget::Value(p) => write!(f, "has {} {}", self.attribute, p),
        }
    }
}

// ------------- VarPattern -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VarPattern {
    var: Option<String>,
    castings: Vec<Casting>,
    isa: Option<String>,
    has: Vec<Has>,
    predicates: Vec<Predicate>,
}

impl VarPattern {
    pub fn named(var: &str) -> Self {
        Self {
            var: Some(var.to_owned()),
            ..Self::default()
        }
    }
    pub fn anonymous() -> Self {
        Self::default()
    }
    pub fn with_isa(mut self, label: &str) -> Self {
        self.isa = Some(label.to_owned());
        self
    }
    pub fn with_casting(mut self, role: Option<&str>, player: &str) -> Self {
        self.castings.push(Casting::new(role, player));
        self
    }
    pub fn with_has_var(mut self, attribute: &str, var: &str) -> Self {
        self.has.push(Has::new(attribute, HasTarget::Var(var.to_owned())));
        self
    }
    pub fn with_has_value(mut self, attribute: &str, predicate: Predicate) -> Self {
        self.has.push(Has::new(attribute, HasTarget::Value(predicate)));
        self
    }
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
    pub(crate) fn with_has(mut self, has: Has) -> Self {
        self.has.push(has);
        self
    }

    pub fn var(&self) -> Option<&str> {
        self.var.as_deref()
    }
    pub fn castings(&self) -> &[Casting] {
        &self.castings
    }
    pub fn isa(&self) -> Option<&str> {
        self.isa.as_deref()
    }
    pub fn has(&self) -> &[Has] {
        &self.has
    }
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
    pub fn is_relation(&self) -> bool {
        !self.castings.is_empty()
    }
    /// Number of properties carried; castings count once together with the `isa`
    /// they are typed by.
    pub fn property_count(&self) -> usize {
        let head = usize::from(!self.castings.is_empty() || self.isa.is_some());
        head + self.has.len() + self.predicates.len()
    }

    /// Splits the fragment into single-property fragments, each rooted in the
    /// same variable. A relation keeps its castings and `isa` together.
    pub fn fragments(&self) -> Vec<VarPattern> {
        let rooted = || VarPattern {
            var: self.var.clone(),
            ..VarPattern::default()
        };
        let mut out = Vec::new();
        if !self.castings.is_empty() || self.isa.is_some() {
            let mut head = rooted();
            head.castings = self.castings.clone();
            head.isa = self.isa.clone();
            out.push(head);
        }
        for has in &self.has {
            out.push(rooted().with_has(has.clone()));
        }
        for predicate in &self.predicates {
            out.push(rooted().with_predicate(predicate.clone()));
        }
        if out.is_empty() {
            out.push(self.clone());
        }
        out
    }

    /// Folds the properties of another fragment rooted in the same variable into this one.
    pub fn merge(&mut self, other: VarPattern) {
        if self.var.is_none() {
            self.var = other.var;
        }
        self.castings.extend(other.castings);
        if self.isa.is_none() {
            self.isa = other.isa;
        }
        self.has.extend(other.has);
        self.predicates.extend(other.predicates);
    }

    pub fn var_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        if let Some(v) = &self.var {
            names.insert(v.clone());
        }
        for c in &self.castings {
            names.insert(c.player.clone());
        }
        for h in &self.has {
            if let HasTarget::Var(v) = &h.target {
                names.insert(v.clone());
            }
        }
        names
    }
}

impl fmt::Display for VarPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut head = Vec::new();
        if let Some(v) = &self.var {
            head.push(v.clone());
        }
        if !self.castings.is_empty() {
            let castings: Vec<String> = self.castings.iter().map(|c| c.to_string()).collect();
            head.push(format!("({})", castings.join(", ")));
        }
        let mut properties = Vec::new();
        if let Some(isa) = &self.isa {
            properties.push(format!("isa {}", isa));
        }
        for has in &self.has {
            properties.push(has.to_string());
        }
        for predicate in &self.predicates {
            match predicate {
                Predicate::Id(_) => properties.push(predicate.to_string()),
                Predicate::Value(..) => properties.push(format!("value {}", predicate)),
            }
        }
        write!(f, "{}", head.join(" "))?;
        if !properties.is_empty() {
            if !head.is_empty() {
                write!(f, " ")?;
            }
            write!(f, "{}", properties.join(", "))?;
        }
        Ok(())
    }
}

// ------------- Pattern -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    Var(VarPattern),
    Conjunction(Vec<Pattern>),
    Disjunction(Vec<Pattern>),
}

impl Pattern {
    pub fn and(patterns: Vec<Pattern>) -> Self {
        Pattern::Conjunction(patterns)
    }
    pub fn or(patterns: Vec<Pattern>) -> Self {
        Pattern::Disjunction(patterns)
    }

    /// Flattens the tree into disjunctive normal form: every inner vector is
    /// one alternative conjunction of fragments.
    pub fn dnf(&self) -> Vec<Vec<VarPattern>> {
        match self {
            Pattern::Var(v) => vec![vec![v.clone()]],
            Pattern::Disjunction(branches) => branches.iter().flat_map(|b| b.dnf()).collect(),
            Pattern::Conjunction(parts) => {
                let mut acc: Vec<Vec<VarPattern>> = vec![Vec::new()];
                for part in parts {
                    let alternatives = part.dnf();
                    let mut next = Vec::with_capacity(acc.len() * alternatives.len());
                    for prefix in &acc {
                        for alternative in &alternatives {
                            let mut joined = prefix.clone();
                            joined.extend(alternative.iter().cloned());
                            next.push(joined);
                        }
                    }
                    acc = next;
                }
                acc
            }
        }
    }

    /// Number of alternatives `dnf` would produce, without building them.
    pub fn dnf_size(&self) -> usize {
        match self {
            Pattern::Var(_) => 1,
            Pattern::Disjunction(branches) => branches.iter().fold(0, |n, b| n.saturating_add(b.dnf_size())),
            Pattern::Conjunction(parts) => parts.iter().fold(1, |n, p| n.saturating_mul(p.dnf_size())),
        }
    }

    pub fn var_names(&self) -> BTreeSet<String> {
        match self {
            Pattern::Var(v) => v.var_names(),
            Pattern::Conjunction(ps) | Pattern::Disjunction(ps) => {
                ps.iter().flat_map(|p| p.var_names()).collect()
            }
        }
    }

    fn fmt_element(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pattern::Var(v) => write!(f, "{}", v),
            Pattern::Conjunction(_) => {
                write!(f, "{{")?;
                self.fmt_body(f)?;
                write!(f, "}}")
            }
            Pattern::Disjunction(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, " or ")?;
                    }
                    write!(f, "{{")?;
                    branch.fmt_body(f)?;
                    write!(f, "}}")?;
                }
                Ok(())
            }
        }
    }

    fn fmt_body(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pattern::Conjunction(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    part.fmt_element(f)?;
                    write!(f, ";")?;
                }
                Ok(())
            }
            other => {
                other.fmt_element(f)?;
                write!(f, ";")
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_body(f)
    }
}

impl From<VarPattern> for Pattern {
    fn from(v: VarPattern) -> Self {
        Pattern::Var(v)
    }
}

// ------------- MatchQuery -------------
/// A `match` query: a pattern plus the variables to project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    pattern: Pattern,
    select: Vec<String>,
    answer_vars: Vec<String>,
}

impl MatchQuery {
    pub fn new(pattern: Pattern, select: Vec<String>) -> Self {
        Self { pattern, select, answer_vars: Vec::new() }
    }
    /// Pins the variables answers are projected onto when nothing is selected.
    pub fn with_answer_vars(mut self, vars: impl IntoIterator<Item = String>) -> Self {
        self.answer_vars = vars.into_iter().collect();
        self
    }
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
    /// Explicitly selected variables; empty means every named variable.
    pub fn select(&self) -> &[String] {
        &self.select
    }
    /// The variables an answer is projected onto.
    pub fn projection(&self) -> Vec<String> {
        if !self.select.is_empty() {
            self.select.clone()
        } else if !self.answer_vars.is_empty() {
            self.answer_vars.clone()
        } else {
            self.pattern.var_names().into_iter().collect()
        }
    }
}

impl fmt::Display for MatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "match {}", self.pattern)?;
        if !self.select.is_empty() {
            write!(f, " select {};", self.select.join(", "))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for MatchQuery {
    type Err = crate::error::ResolventError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse_query(s)
    }
}
