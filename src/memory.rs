//! Working memory: rule bodies and heads compiled into conjunctions once and
//! handed out as private copies.
//!
//! One [`WorkingMemory`] is shared by every expansion running against the
//! same session. Lookups take the read lock; compiling a missing rule takes
//! the write lock and re-checks before inserting. The whole cache is dropped
//! when the schema revision moves on.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{ResolventError, Result};
use crate::query::{AtomId, Conjunction};
use crate::schema::{OtherHasher, Rule, Schema};

// ------------- CompiledRule -------------
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Arc<Rule>,
    body: Conjunction,
    head: Conjunction,
    conclusion: String,
    head_atom: AtomId,
}

impl CompiledRule {
    pub fn compile(rule: &Arc<Rule>) -> Result<Self> {
        let types = rule.conclusion_types();
        if types.len() > 1 {
            return Err(ResolventError::AmbiguousRuleConclusion {
                rule: rule.id().to_owned(),
                types: types.into_iter().collect(),
            });
        }
        let conclusion = types.into_iter().next().ok_or_else(|| {
            ResolventError::MalformedAtom(format!("rule {} concludes no type", rule.id()))
        })?;
        let head = Conjunction::new(rule.then())?;
        let body = Conjunction::new(rule.when())?;
        let head_atom = head.atoms_of_type(&conclusion).first().copied().ok_or_else(|| {
            ResolventError::MalformedAtom(format!("rule {} has no atom of type {}", rule.id(), conclusion))
        })?;
        Ok(Self {
            rule: Arc::clone(rule),
            body,
            head,
            conclusion,
            head_atom,
        })
    }
    pub fn id(&self) -> &str {
        self.rule.id()
    }
    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }
    pub fn body(&self) -> &Conjunction {
        &self.body
    }
    pub fn head(&self) -> &Conjunction {
        &self.head
    }
    /// The single type the rule concludes.
    pub fn conclusion(&self) -> &str {
        &self.conclusion
    }
    /// The head atom carrying the conclusion type.
    pub fn head_atom(&self) -> AtomId {
        self.head_atom
    }
}

// ------------- WorkingMemory -------------
#[derive(Debug, Default)]
struct Compiled {
    revision: Option<u64>,
    rules: HashMap<String, Arc<CompiledRule>, OtherHasher>,
}

#[derive(Debug, Default)]
pub struct WorkingMemory {
    compiled: RwLock<Compiled>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled form of `rule`, compiling it on first use.
    pub fn compile<S: Schema + ?Sized>(&self, schema: &S, rule: &Arc<Rule>) -> Result<Arc<CompiledRule>> {
        let revision = schema.revision();
        {
            let compiled = self.compiled.read().map_err(|e| ResolventError::Lock(e.to_string()))?;
            if compiled.revision == Some(revision) {
                if let Some(kept) = compiled.rules.get(rule.id()) {
                    return Ok(Arc::clone(kept));
                }
            }
        }
        let fresh = Arc::new(CompiledRule::compile(rule)?);
        let mut compiled = self.compiled.write().map_err(|e| ResolventError::Lock(e.to_string()))?;
        match compiled.revision {
            Some(kept) if kept > revision => return Ok(fresh),
            Some(kept) if kept == revision => (),
            _ => {
                if !compiled.rules.is_empty() {
                    debug!(revision, dropped = compiled.rules.len(), "working memory invalidated");
                }
                compiled.rules.clear();
                compiled.revision = Some(revision);
            }
        }
        let kept = compiled
            .rules
            .entry(rule.id().to_owned())
            .or_insert_with(|| {
                debug!(rule = rule.id(), revision, "rule compiled");
                Arc::clone(&fresh)
            });
        Ok(Arc::clone(kept))
    }

    /// A private copy of the rule's body, free to be renamed and expanded.
    pub fn body<S: Schema + ?Sized>(&self, schema: &S, rule: &Arc<Rule>) -> Result<Conjunction> {
        Ok(self.compile(schema, rule)?.body().clone())
    }

    pub fn invalidate(&self) -> Result<()> {
        let mut compiled = self.compiled.write().map_err(|e| ResolventError::Lock(e.to_string()))?;
        compiled.rules.clear();
        compiled.revision = None;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.compiled.read().map_err(|e| ResolventError::Lock(e.to_string()))?.rules.len())
    }
}
