//! Resolvent – query expansion by backward chaining over inference rules.
//!
//! Given a `match` query and a schema holding rules of the form
//! `when <body> then <head>`, Resolvent rewrites the query so that every atom
//! some rule can conclude is joined, as a disjunction, by the bodies of those
//! rules. The rewritten query can then be handed to any executor that knows
//! how to match patterns against stored data; answers that only follow from
//! the rules are found without materialising them.
//!
//! ```text
//! rule:   (subject-location: $x, located-subject: $x1) isa resides
//!           => (member-location: $x, container-location: $x1) isa sublocate
//! query:  match ($x, $y) isa sublocate;
//! result: match {($x, $y) isa sublocate;}
//!            or {(subject-location: $x, located-subject: $y) isa resides;};
//! ```
//!
//! ## Modules
//! * [`pattern`] – Pattern trees (`Pattern`, `VarPattern`, `MatchQuery`) and their rendering.
//! * [`datatype`] – Literals and value predicates.
//! * [`parser`] – A `pest` parser for queries and rule patterns (grammar in `pattern.pest`).
//! * [`schema`] – The [`schema::Schema`] trait plus the in-memory, file-loadable [`schema::MemorySchema`].
//! * [`atom`] – Atoms and the interned variables they refer to.
//! * [`query`] – [`query::Conjunction`], a pattern decomposed into atoms.
//! * [`expansion`] – The graph owning every conjunction of one expansion, and its renderer.
//! * [`compat`] – Checks deciding whether a rule may explain an atom.
//! * [`unify`] – Variable unification between an atom and a rule instance.
//! * [`memory`] – Working memory of compiled rule bodies shared across expansions.
//! * [`resolver`] – The stack-based expansion loop.
//! * [`interface`] – [`interface::Session`] and the [`interface::Executor`] seam.
//! * [`config`] – Expansion budgets and logging defaults.
//!
//! ## Budgets
//! Recursive rule sets have no finite expansion. The resolver stops attaching
//! deeper rule applications at `max_depth` (a deliberate truncation, logged as
//! a warning and counted in the returned statistics) and gives up with
//! [`error::ResolventError::ExpansionBudgetExceeded`] after `max_steps` rule
//! applications.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use resolvent::config::ReasonerConfig;
//! use resolvent::interface::Session;
//! use resolvent::schema::{MemorySchema, Rule, SchemaType};
//!
//! let schema = MemorySchema::new();
//! for role in ["subject-location", "located-subject", "member-location", "container-location"] {
//!     schema.define(SchemaType::role(role));
//! }
//! schema.define(SchemaType::relation("resides").relating(&["subject-location", "located-subject"]));
//! schema.define(SchemaType::relation("sublocate").relating(&["member-location", "container-location"]));
//! schema.add_rule(Rule::parse(
//!     "sublocation",
//!     "(subject-location: $x, located-subject: $x1) isa resides;",
//!     "(member-location: $x, container-location: $x1) isa sublocate;",
//! ).unwrap());
//!
//! let session = Session::new(Arc::new(schema), ReasonerConfig::default());
//! let expansion = session.expand_str("match ($x, $y) isa sublocate;").unwrap();
//! assert_eq!(
//!     expansion.query().to_string(),
//!     "match {($x, $y) isa sublocate;} or {(subject-location: $x, located-subject: $y) isa resides;};"
//! );
//! ```

pub mod atom;
pub mod compat;
pub mod config;
pub mod datatype;
pub mod error;
pub mod expansion;
pub mod interface;
pub mod memory;
pub mod parser;
pub mod pattern;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod unify;

pub use error::{ResolventError, Result};
