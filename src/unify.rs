//! Variable unification between a parent atom and a freshly instantiated rule.
//!
//! The rule's head atom is lined up with the parent atom: head variables are
//! renamed to the parent's variables (by role for relations, by position for
//! types and attributes) and every other rule variable that would clash with
//! a variable already in use is moved to a fresh name.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::atom::fresh_name;
use crate::compat::role_players;
use crate::error::Result;
use crate::query::{AtomId, Conjunction};
use crate::schema::Schema;

/// What a unification did, for logging and inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unifier {
    /// Rule variable to the parent variable it now shares.
    pub mapping: BTreeMap<String, String>,
    /// Rule variables moved aside to avoid capturing a parent variable.
    pub renamed: BTreeMap<String, String>,
}

/// Renames `head` and `body` of a rule instance so that the head atom speaks
/// about the same variables as `parent_atom`, and nothing else in the rule
/// instance shares a name with `parent` or with `scope`.
pub fn unify<S: Schema + ?Sized>(
    schema: &S,
    parent: &Conjunction,
    parent_atom: AtomId,
    head: &mut Conjunction,
    head_atom: AtomId,
    body: &mut Conjunction,
    scope: &BTreeSet<String>,
) -> Result<Unifier> {
    let target = parent.atom(parent_atom)?;
    let conclusion = head.atom(head_atom)?;

    let mut mapping: BTreeMap<String, String> = BTreeMap::new();
    if target.is_relation() {
        let parent_roles = role_players(schema, parent, target, parent);
        let child_roles = role_players(schema, head, conclusion, body);
        let mut allocated: BTreeSet<String> = BTreeSet::new();
        for (role, child_var) in &child_roles {
            if let Some(parent_var) = parent_roles.get(role) {
                if !allocated.contains(parent_var) && !mapping.contains_key(child_var) {
                    mapping.insert(child_var.clone(), parent_var.clone());
                    allocated.insert(parent_var.clone());
                }
            }
        }
        // players left over on either side pair up in casting order
        let mut open_parent = target
            .players()
            .iter()
            .map(|p| parent.var_name(p.player()).to_owned())
            .filter(|v| !allocated.contains(v));
        for p in conclusion.players() {
            let child_var = head.var_name(p.player()).to_owned();
            if mapping.contains_key(&child_var) {
                continue;
            }
            match open_parent.next() {
                Some(parent_var) => {
                    mapping.insert(child_var, parent_var);
                }
                None => break,
            }
        }
        if let (Some(p), Some(c)) = (target.var(), conclusion.var()) {
            mapping.insert(head.var_name(c).to_owned(), parent.var_name(p).to_owned());
        }
    } else {
        if let (Some(p), Some(c)) = (target.var(), conclusion.var()) {
            mapping.insert(head.var_name(c).to_owned(), parent.var_name(p).to_owned());
        }
        if let (Some(p), Some(c)) = (target.value_var(), conclusion.value_var()) {
            mapping.insert(head.var_name(c).to_owned(), parent.var_name(p).to_owned());
        }
    }

    let shared: BTreeSet<String> = mapping.values().cloned().collect();
    let protected: BTreeSet<String> = parent.var_names().into_iter().chain(scope.iter().cloned()).collect();
    let taken = |name: &str, head: &Conjunction, body: &Conjunction, extra: &BTreeSet<String>| {
        protected.contains(name) || head.vars().contains(name) || body.vars().contains(name) || extra.contains(name)
    };

    // a target already used by an unrelated rule variable moves aside first
    let mut renamed: BTreeMap<String, String> = BTreeMap::new();
    let mut chosen: BTreeSet<String> = shared.clone();
    for parent_var in &shared {
        let bound = head.vars().contains(parent_var) || body.vars().contains(parent_var);
        if bound && !mapping.contains_key(parent_var) {
            let fresh = fresh_name(parent_var, |n| taken(n, &*head, &*body, &chosen));
            head.change_var_name(parent_var, &fresh);
            body.change_var_name(parent_var, &fresh);
            chosen.insert(fresh.clone());
            renamed.insert(parent_var.clone(), fresh);
        }
    }

    mapping.retain(|from, to| *from != *to);
    let swaps: Vec<(String, String)> = mapping
        .iter()
        .filter(|(from, to)| from < to && mapping.get(*to) == Some(*from))
        .map(|(from, to)| (from.clone(), to.clone()))
        .collect();
    for (a, b) in &swaps {
        head.exchange_var_names(a, b);
        body.exchange_var_names(a, b);
    }
    let rest: BTreeMap<String, String> = mapping
        .iter()
        .filter(|(from, _)| !swaps.iter().any(|(a, b)| a == *from || b == *from))
        .map(|(from, to)| (from.clone(), to.clone()))
        .collect();
    head.rename_all(&rest);
    body.rename_all(&rest);

    // anything else clashing with the parent or the open scope gets a fresh name
    let remaining: BTreeSet<String> = head.var_names().into_iter().chain(body.var_names()).collect();
    for name in remaining {
        if shared.contains(&name) || !protected.contains(&name) {
            continue;
        }
        let fresh = fresh_name(&name, |n| taken(n, &*head, &*body, &chosen));
        head.change_var_name(&name, &fresh);
        body.change_var_name(&name, &fresh);
        chosen.insert(fresh.clone());
        renamed.insert(name, fresh);
    }

    trace!(?mapping, ?renamed, "unified");
    Ok(Unifier { mapping, renamed })
}
