//! Compatibility checks deciding whether a rule may explain an atom.
//!
//! All checks are pure: they look at the parent conjunction, the compiled
//! rule and the schema, and never change any of them.

use std::collections::BTreeMap;

use tracing::trace;

use crate::atom::{Atom, AtomKind};
use crate::error::Result;
use crate::memory::CompiledRule;
use crate::query::{AtomId, Conjunction};
use crate::schema::Schema;

/// Role label to player variable name for a relation atom of `conjunction`.
///
/// Castings without a role are assigned the single open role of the relation
/// type that the player's known type (looked up in `types`) can play; when
/// there is no such single role the casting stays unconstrained.
pub fn role_players<S: Schema + ?Sized>(
    schema: &S,
    conjunction: &Conjunction,
    atom: &Atom,
    types: &Conjunction,
) -> BTreeMap<String, String> {
    let mut roles = BTreeMap::new();
    let mut unlabelled = Vec::new();
    for p in atom.players() {
        let name = conjunction.var_name(p.player()).to_owned();
        match p.role() {
            Some(role) => {
                roles.insert(role.to_owned(), name);
            }
            None => unlabelled.push(name),
        }
    }
    let Some(relation) = atom.type_id() else { return roles };
    let declared = schema.roles_of(relation);
    for name in unlabelled {
        let Some(player_type) = types.type_of_name(&name) else { continue };
        let open: Vec<&String> = declared
            .iter()
            .filter(|r| !roles.contains_key(*r) && schema.plays(player_type, r))
            .collect();
        if let [role] = open.as_slice() {
            roles.insert((*role).clone(), name);
        }
    }
    roles
}

/// Whether instances of `label` can take any role of `relation`.
pub fn can_play_in<S: Schema + ?Sized>(schema: &S, label: &str, relation: &str) -> bool {
    schema.roles_of(relation).iter().any(|role| schema.plays(label, role))
}

/// Two types may co-occur in `relation` only if each can play some role the
/// relation declares. Symmetric in `a` and `b`.
pub fn types_compatible<S: Schema + ?Sized>(schema: &S, a: &str, b: &str, relation: &str) -> bool {
    can_play_in(schema, a, relation) && can_play_in(schema, b, relation)
}

/// Base test for a relation atom: every pair of known player types must be
/// able to co-occur in `relation`.
pub fn players_compatible<S: Schema + ?Sized>(
    schema: &S,
    parent: &Conjunction,
    atom: &Atom,
    relation: &str,
) -> bool {
    let known: Vec<&str> = atom
        .players()
        .iter()
        .filter_map(|p| parent.type_of(p.player()))
        .collect();
    match known.as_slice() {
        [] => true,
        [only] => can_play_in(schema, only, relation),
        _ => known.iter().enumerate().all(|(i, a)| {
            known[i + 1..].iter().all(|b| types_compatible(schema, a, b, relation))
        }),
    }
}

/// Attribute values agree, or at least one side leaves the value open.
pub fn resource_compatible(parent: &Conjunction, atom: AtomId, rule: &CompiledRule) -> bool {
    let parent_value = parent.resource_value(atom);
    let head = rule.head();
    let child_value = head.resource_value(rule.head_atom()).or_else(|| {
        head.atom(rule.head_atom())
            .ok()
            .and_then(|a| a.value_var())
            .and_then(|v| rule.body().value_of_name(head.var_name(v)))
    });
    match (parent_value, child_value) {
        (Some(p), Some(c)) => p == c,
        _ => true,
    }
}

/// For every role both sides constrain, the player types must be equal or in
/// a sub/super relationship (either direction), and values placed on the
/// players must agree when both sides set one.
pub fn relation_compatible<S: Schema + ?Sized>(
    schema: &S,
    parent: &Conjunction,
    atom: &Atom,
    rule: &CompiledRule,
) -> bool {
    let Ok(head_atom) = rule.head().atom(rule.head_atom()) else { return false };
    let parent_roles = role_players(schema, parent, atom, parent);
    let child_roles = role_players(schema, rule.head(), head_atom, rule.body());
    for (role, parent_var) in &parent_roles {
        let Some(child_var) = child_roles.get(role) else { continue };
        let parent_type = parent.type_of_name(parent_var);
        let child_type = rule.body().type_of_name(child_var);
        if let (Some(p), Some(c)) = (parent_type, child_type) {
            if !(schema.is_subtype(p, c) || schema.is_subtype(c, p)) {
                trace!(role = %role, parent_type = p, child_type = c, "player types disagree");
                return false;
            }
        }
        let parent_value = parent.value_of_name(parent_var);
        let child_value = rule.body().value_of_name(child_var);
        if let (Some(p), Some(c)) = (parent_value, child_value) {
            if p != c {
                trace!(role = %role, parent_value = %p, child_value = %c, "player values disagree");
                return false;
            }
        }
    }
    true
}

/// Whether `rule` may be attached as an expansion of `atom`.
pub fn rule_applicable<S: Schema + ?Sized>(
    schema: &S,
    parent: &Conjunction,
    atom: AtomId,
    rule: &CompiledRule,
) -> Result<bool> {
    let target = parent.atom(atom)?;
    if target.type_id() != Some(rule.conclusion()) {
        return Ok(false);
    }
    let applicable = match target.kind() {
        AtomKind::Relation => {
            players_compatible(schema, parent, target, rule.conclusion())
                && relation_compatible(schema, parent, target, rule)
        }
        AtomKind::Resource => resource_compatible(parent, atom, rule),
        AtomKind::Type => true,
        AtomKind::ValuePredicate => false,
    };
    trace!(rule = rule.id(), atom = atom.index(), applicable, "compatibility checked");
    Ok(applicable)
}
