//! The resolver: rewrites a query so that every atom some rule can conclude
//! is joined by the bodies of those rules as alternatives.
//!
//! Expansion is iterative. Two parallel stacks hold the conjunction waiting
//! for an expansion and the (atom, rule) candidate to apply to it; each pop
//! instantiates the rule body, unifies it with the atom, attaches it and
//! pushes the body's own candidates. Depth and step budgets keep recursive
//! rule sets finite.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::compat::rule_applicable;
use crate::config::ReasonerConfig;
use crate::error::{ResolventError, Result};
use crate::expansion::{ConjId, ExpansionGraph};
use crate::memory::WorkingMemory;
use crate::pattern::MatchQuery;
use crate::query::{AtomId, Conjunction};
use crate::schema::{Rule, Schema};
use crate::unify::unify;

/// A rule that may explain one atom of a conjunction.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub atom: AtomId,
    pub rule: Arc<Rule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionStats {
    pub steps: usize,
    pub expansions: usize,
    pub max_depth_reached: usize,
    pub truncated: usize,
    pub dnf_size: usize,
}

/// The expanded query together with what it took to build it.
#[derive(Debug, Clone)]
pub struct Expansion {
    query: MatchQuery,
    stats: ExpansionStats,
}
impl Expansion {
    pub fn query(&self) -> &MatchQuery {
        &self.query
    }
    pub fn stats(&self) -> &ExpansionStats {
        &self.stats
    }
    pub fn into_query(self) -> MatchQuery {
        self.query
    }
}

pub struct Resolver<'a, S: Schema + ?Sized> {
    schema: &'a S,
    memory: &'a WorkingMemory,
    config: ReasonerConfig,
}

impl<'a, S: Schema + ?Sized> Resolver<'a, S> {
    pub fn new(schema: &'a S, memory: &'a WorkingMemory, config: ReasonerConfig) -> Self {
        Self { schema, memory, config }
    }

    pub fn expand(&self, query: &MatchQuery) -> Result<Expansion> {
        let started = Instant::now();
        let mut graph = ExpansionGraph::new();
        let root = graph.insert(Conjunction::from_query(query)?);
        let mut stats = self.expand_graph(&mut graph, root)?;
        let query = graph.render_query(root)?;
        stats.dnf_size = query.pattern().dnf_size();
        info!(
            ms = started.elapsed().as_secs_f64() * 1000.0,
            steps = stats.steps,
            expansions = stats.expansions,
            depth = stats.max_depth_reached,
            dnf = stats.dnf_size,
            "expansion complete"
        );
        Ok(Expansion { query, stats })
    }

    /// Expands `root` of `graph` in place.
    pub fn expand_graph(&self, graph: &mut ExpansionGraph, root: ConjId) -> Result<ExpansionStats> {
        let mut stats = ExpansionStats::default();
        let mut scope: BTreeSet<String> = graph.get(root)?.var_names();
        let mut conjunctions: Vec<(ConjId, usize)> = Vec::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        if self.config.max_depth > 0 {
            for candidate in self.candidates(graph.get(root)?, None)?.into_iter().rev() {
                conjunctions.push((root, 0));
                candidates.push(candidate);
            }
        }

        while let (Some((parent, depth)), Some(candidate)) = (conjunctions.pop(), candidates.pop()) {
            stats.steps += 1;
            if stats.steps > self.config.max_steps {
                warn!(max_steps = self.config.max_steps, "expansion budget exceeded");
                return Err(ResolventError::ExpansionBudgetExceeded { steps: self.config.max_steps });
            }
            let compiled = self.memory.compile(self.schema, &candidate.rule)?;
            let mut head = compiled.head().clone();
            let mut body = compiled.body().clone();
            let unifier = unify(
                self.schema,
                graph.get(parent)?,
                candidate.atom,
                &mut head,
                compiled.head_atom(),
                &mut body,
                &scope,
            )?;
            scope.extend(body.var_names());
            body.set_origin(compiled.id());
            let child = graph.insert(body);
            graph.expand_atom_by_query(parent, candidate.atom, child)?;
            stats.expansions += 1;

            let child_depth = depth + 1;
            stats.max_depth_reached = stats.max_depth_reached.max(child_depth);
            debug!(
                rule = compiled.id(),
                %parent,
                %child,
                depth = child_depth,
                mapping = ?unifier.mapping,
                "rule applied"
            );

            let next = self.candidates(graph.get(child)?, Some(compiled.id()))?;
            if child_depth >= self.config.max_depth {
                if !next.is_empty() {
                    stats.truncated += 1;
                }
                continue;
            }
            for candidate in next.into_iter().rev() {
                conjunctions.push((child, child_depth));
                candidates.push(candidate);
            }
        }

        if stats.truncated > 0 {
            warn!(
                max_depth = self.config.max_depth,
                truncated = stats.truncated,
                "expansion depth limit reached, deeper rule applications left out"
            );
        }
        Ok(stats)
    }

    /// Rules that may explain some atom of `conjunction`. A conjunction
    /// instantiated from `origin` does not get `origin` again for an atom
    /// whose only applicable rule is `origin` itself.
    pub fn candidates(&self, conjunction: &Conjunction, origin: Option<&str>) -> Result<Vec<Candidate>> {
        let mut out = Vec::new();
        for (atom_id, atom) in conjunction.atoms() {
            if !atom.is_type() {
                continue;
            }
            let Some(type_id) = atom.type_id().filter(|t| !t.is_empty()) else { continue };
            let mut applicable = Vec::new();
            for rule in self.schema.rules_of_conclusion(type_id) {
                let compiled = self.memory.compile(self.schema, &rule)?;
                if rule_applicable(self.schema, conjunction, atom_id, &compiled)? {
                    applicable.push(rule);
                }
            }
            if let (Some(origin), [only]) = (origin, applicable.as_slice()) {
                if only.id() == origin {
                    trace!(rule = origin, atom = atom_id.index(), "self-loop suppressed");
                    continue;
                }
            }
            out.extend(applicable.into_iter().map(|rule| Candidate { atom: atom_id, rule }));
        }
        Ok(out)
    }
}
