//! Session and executor interface.
//!
//! A [`Session`] binds a schema, the working memory compiled from its rules
//! and the expansion settings. It is the one owner of the working memory, so
//! every expansion running through the same session (from any number of
//! threads) shares compiled rule bodies, and dropping the session drops them.
//!
//! Evaluating an expanded query against stored data is the job of an
//! [`Executor`], which lives outside this crate.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ReasonerConfig;
use crate::error::Result;
use crate::memory::WorkingMemory;
use crate::parser::parse_query;
use crate::pattern::MatchQuery;
use crate::resolver::{Expansion, Resolver};
use crate::schema::Schema;

/// One answer: selected variable name to concept id (or value, for attribute variables).
pub type Answer = BTreeMap<String, String>;

/// Evaluates (expanded) match queries against stored data.
pub trait Executor {
    fn execute(&self, query: &MatchQuery) -> Result<Vec<Answer>>;
}

pub struct Session<S: Schema> {
    schema: Arc<S>,
    memory: WorkingMemory,
    config: ReasonerConfig,
}

impl<S: Schema> Session<S> {
    pub fn new(schema: Arc<S>, config: ReasonerConfig) -> Self {
        Self {
            schema,
            memory: WorkingMemory::new(),
            config,
        }
    }
    pub fn schema(&self) -> &Arc<S> {
        &self.schema
    }
    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }
    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }
    pub fn resolver(&self) -> Resolver<'_, S> {
        Resolver::new(self.schema.as_ref(), &self.memory, self.config.clone())
    }

    pub fn expand(&self, query: &MatchQuery) -> Result<Expansion> {
        self.resolver().expand(query)
    }

    pub fn expand_str(&self, text: &str) -> Result<Expansion> {
        self.expand(&parse_query(text)?)
    }

    /// Expands `query` and hands the result to `executor`.
    pub fn resolve<E: Executor + ?Sized>(&self, query: &MatchQuery, executor: &E) -> Result<Vec<Answer>> {
        let expansion = self.expand(query)?;
        debug!(query = %expansion.query(), "executing expanded query");
        executor.execute(expansion.query())
    }
}
