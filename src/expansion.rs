//! The expansion graph owns every conjunction created while expanding one
//! query. Expansions are attached by [`ConjId`], so a conjunction could in
//! principle be attached below itself; rendering refuses such cycles.

use std::fmt;

use tracing::trace;

use crate::error::{ResolventError, Result};
use crate::pattern::{MatchQuery, Pattern};
use crate::query::{AtomId, Conjunction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConjId(usize);

impl fmt::Display for ConjId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct ExpansionGraph {
    nodes: Vec<Conjunction>,
}

impl ExpansionGraph {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, conjunction: Conjunction) -> ConjId {
        self.nodes.push(conjunction);
        ConjId(self.nodes.len() - 1)
    }
    pub fn get(&self, id: ConjId) -> Result<&Conjunction> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| ResolventError::MissingParent(format!("conjunction {} is not in the graph", id)))
    }
    fn get_mut(&mut self, id: ConjId) -> Result<&mut Conjunction> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| ResolventError::MissingParent(format!("conjunction {} is not in the graph", id)))
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attaches `child` as an alternative way of satisfying `atom` of `parent`.
    /// Attaching the same child twice is a no-op; returns whether anything changed.
    pub fn expand_atom_by_query(&mut self, parent: ConjId, atom: AtomId, child: ConjId) -> Result<bool> {
        self.get(child)?;
        let added = self.get_mut(parent)?.atom_mut(atom)?.add_expansion(child);
        trace!(%parent, atom = atom.index(), %child, added, "expansion attached");
        Ok(added)
    }

    /// Renders `root` with every expansion nested as a disjunction next to the
    /// atom it explains.
    pub fn render(&self, root: ConjId) -> Result<Pattern> {
        let mut path = Vec::new();
        self.render_node(root, &mut path)
    }

    fn render_node(&self, id: ConjId, path: &mut Vec<ConjId>) -> Result<Pattern> {
        if path.contains(&id) {
            let cycle: Vec<String> = path.iter().chain(Some(&id)).map(|c| c.to_string()).collect();
            return Err(ResolventError::CyclicExpansion(cycle.join(" -> ")));
        }
        let node = self.get(id)?;
        path.push(id);
        let rendered = node.render_with::<ResolventError>(&mut |atom_id| {
            let atom = node.atom(atom_id)?;
            if atom.expansions().is_empty() {
                return Ok(None);
            }
            let mut branches = vec![Pattern::Conjunction(vec![Pattern::Var(atom.pattern(node.vars()))])];
            for child in atom.expansions() {
                branches.push(self.render_node(*child, path)?);
            }
            Ok(Some(Pattern::Disjunction(branches)))
        });
        path.pop();
        rendered
    }

    /// Renders `root` as a match query. Answers stay projected onto the root's
    /// own variables, so rule-body variables never reach them.
    pub fn render_query(&self, root: ConjId) -> Result<MatchQuery> {
        let pattern = self.render(root)?;
        let node = self.get(root)?;
        Ok(MatchQuery::new(pattern, node.select()).with_answer_vars(node.var_names()))
    }

    /// Copies the subtree below `id` into fresh nodes sharing nothing with the source.
    pub fn deep_copy(&mut self, id: ConjId) -> Result<ConjId> {
        let mut path = Vec::new();
        self.copy_node(id, &mut path)
    }

    fn copy_node(&mut self, id: ConjId, path: &mut Vec<ConjId>) -> Result<ConjId> {
        if path.contains(&id) {
            return Err(ResolventError::CyclicExpansion(format!("{} is reachable from itself", id)));
        }
        path.push(id);
        let mut copy = self.get(id)?.clone();
        let attached = copy.expansion_ids();
        let mut remapped: Vec<(AtomId, ConjId)> = Vec::with_capacity(attached.len());
        for (atom, child) in attached {
            remapped.push((atom, self.copy_node(child, path)?));
        }
        path.pop();
        let atom_ids: Vec<AtomId> = copy.atoms().map(|(a, _)| a).collect();
        for atom in atom_ids {
            let children = remapped.iter().filter(|(a, _)| *a == atom).map(|(_, c)| *c).collect();
            copy.atom_mut(atom)?.set_expansions(children);
        }
        Ok(self.insert(copy))
    }

    /// Total number of attached expansions.
    pub fn expansion_count(&self) -> usize {
        self.nodes.iter().map(|n| n.expansion_ids().len()).sum()
    }
}
