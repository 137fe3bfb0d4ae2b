//! core::graph
//!
//! In-memory stack topology: a forest of branches rooted at the trunk,
//! plus pure navigation and fuzzy lookup. Mutation (Intent→Plan compilation)
//! lives in `engine::plan`; this module only answers questions about the
//! shape of the tree as currently known to the Metadata Store.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::core::types::BranchName;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("branch not found: {0}")]
    NotFound(String),

    #[error("cycle detected starting at {0}")]
    CycleDetected(String),

    #[error("branch {0} already has a parent")]
    AlreadyHasParent(String),
}

/// Where a fuzzy `find` match came from, used to break ties and to explain
/// ambiguous results to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
}

/// A flat arena keyed by branch name: `parents` maps a branch to its parent
/// (absent for the trunk), `children` maps a branch to an ordered list of
/// its children in the order they were recorded (spec invariant I3).
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    trunk: Option<BranchName>,
    parents: HashMap<BranchName, BranchName>,
    children: HashMap<BranchName, Vec<BranchName>>,
    known: HashSet<BranchName>,
}

impl StackGraph {
    pub fn new(trunk: BranchName) -> Self {
        let mut known = HashSet::new();
        known.insert(trunk.clone());
        Self {
            trunk: Some(trunk),
            parents: HashMap::new(),
            children: HashMap::new(),
            known,
        }
    }

    pub fn trunk(&self) -> Option<&BranchName> {
        self.trunk.as_ref()
    }

    pub fn contains(&self, branch: &BranchName) -> bool {
        self.known.contains(branch)
    }

    /// Register `child` under `parent`, appended at the end of `parent`'s
    /// existing children (preserving sibling order per I3).
    pub fn add_edge(&mut self, parent: BranchName, child: BranchName) -> Result<(), GraphError> {
        if self.parents.contains_key(&child) {
            return Err(GraphError::AlreadyHasParent(child.to_string()));
        }
        self.known.insert(parent.clone());
        self.known.insert(child.clone());
        self.children.entry(parent.clone()).or_default().push(child.clone());
        self.parents.insert(child.clone(), parent.clone());

        if self.has_cycle_from(&child) {
            // Roll back: this edge would create a cycle.
            self.parents.remove(&child);
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| c != &child);
            }
            return Err(GraphError::CycleDetected(child.to_string()));
        }
        Ok(())
    }

    /// Remove `branch` from the tree, detaching it from its parent's child
    /// list. Does not touch `branch`'s own children — callers are expected to
    /// re-parent or remove them first per the spec's Delete semantics.
    pub fn remove_node(&mut self, branch: &BranchName) {
        if let Some(parent) = self.parents.remove(branch) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| c != branch);
            }
        }
        self.children.remove(branch);
        self.known.remove(branch);
    }

    /// Re-parent `branch` under `new_parent`, appending at the end of the
    /// new parent's sibling list.
    pub fn reparent(&mut self, branch: &BranchName, new_parent: BranchName) {
        if let Some(old_parent) = self.parents.get(branch).cloned() {
            if let Some(siblings) = self.children.get_mut(&old_parent) {
                siblings.retain(|c| c != branch);
            }
        }
        self.children.entry(new_parent.clone()).or_default().push(branch.clone());
        self.parents.insert(branch.clone(), new_parent);
    }

    pub fn parent(&self, branch: &BranchName) -> Option<&BranchName> {
        self.parents.get(branch)
    }

    /// Ordered children, in the stored sibling order (I3).
    pub fn children(&self, branch: &BranchName) -> &[BranchName] {
        self.children.get(branch).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The siblings of `branch` (children of its parent, excluding itself),
    /// in stored order. Empty for the trunk.
    pub fn siblings(&self, branch: &BranchName) -> Vec<BranchName> {
        match self.parents.get(branch) {
            Some(parent) => self
                .children(parent)
                .iter()
                .filter(|c| *c != branch)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_root(&self, branch: &BranchName) -> bool {
        self.trunk.as_ref() == Some(branch)
    }

    pub fn has_cycle_from(&self, start: &BranchName) -> bool {
        let mut visited = HashSet::new();
        let mut current = start.clone();
        loop {
            if !visited.insert(current.clone()) {
                return true;
            }
            match self.parents.get(&current) {
                Some(parent) => current = parent.clone(),
                None => return false,
            }
        }
    }

    /// All descendants of `branch` (not including itself), in BFS order
    /// with sibling order preserved at each level (I3).
    pub fn descendants(&self, branch: &BranchName) -> Vec<BranchName> {
        let mut result = Vec::new();
        let mut queue: VecDeque<BranchName> = self.children(branch).iter().cloned().collect();
        while let Some(b) = queue.pop_front() {
            result.push(b.clone());
            queue.extend(self.children(&b).iter().cloned());
        }
        result
    }

    /// Ancestors of `branch`, nearest first, ending at (and including) the
    /// trunk.
    pub fn ancestors(&self, branch: &BranchName) -> Vec<BranchName> {
        let mut result = Vec::new();
        let mut current = branch.clone();
        while let Some(parent) = self.parents.get(&current) {
            result.push(parent.clone());
            current = parent.clone();
        }
        result
    }

    pub fn depth(&self, branch: &BranchName) -> usize {
        self.ancestors(branch).len()
    }

    /// The deepest descendant reached by always following the last-recorded
    /// child (stable, deterministic "top of stack" per spec §4.3).
    pub fn top_of(&self, branch: &BranchName) -> BranchName {
        let mut current = branch.clone();
        while let Some(child) = self.children(&current).last() {
            current = child.clone();
        }
        current
    }

    /// The trunk-most ancestor that is not the trunk itself, i.e. the base
    /// of the stack `branch` belongs to. Returns `branch` itself if it is a
    /// direct child of the trunk or is the trunk.
    pub fn bottom_of(&self, branch: &BranchName) -> BranchName {
        if self.is_root(branch) {
            return branch.clone();
        }
        let mut current = branch.clone();
        loop {
            match self.parent(&current) {
                Some(parent) if !self.is_root(parent) => current = parent.clone(),
                _ => return current,
            }
        }
    }

    /// All known branches, in deterministic (depth, then lexicographic)
    /// topological order with the trunk first.
    pub fn topological_order(&self) -> Vec<BranchName> {
        let mut branches: Vec<BranchName> = self.known.iter().cloned().collect();
        branches.sort_by(|a, b| {
            let da = self.depth(a);
            let db = self.depth(b);
            da.cmp(&db).then_with(|| a.as_str().cmp(b.as_str()))
        });
        branches
    }

    /// Fuzzy lookup: exact match wins outright; otherwise all prefix matches;
    /// otherwise all substring matches. Returns the match kind alongside the
    /// matching names so the caller can report ambiguity.
    pub fn find(&self, query: &str) -> (MatchKind, Vec<BranchName>) {
        for b in &self.known {
            if b.as_str() == query {
                return (MatchKind::Exact, vec![b.clone()]);
            }
        }
        let prefix: Vec<BranchName> = self
            .known
            .iter()
            .filter(|b| b.as_str().starts_with(query))
            .cloned()
            .collect();
        if !prefix.is_empty() {
            let mut sorted = prefix;
            sorted.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            return (MatchKind::Prefix, sorted);
        }
        let substring: Vec<BranchName> = self
            .known
            .iter()
            .filter(|b| b.as_str().contains(query))
            .cloned()
            .collect();
        let mut sorted = substring;
        sorted.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        (MatchKind::Substring, sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn sample_graph() -> StackGraph {
        let mut g = StackGraph::new(b("main"));
        g.add_edge(b("main"), b("feature-a")).unwrap();
        g.add_edge(b("feature-a"), b("feature-b")).unwrap();
        g.add_edge(b("feature-a"), b("feature-c")).unwrap();
        g
    }

    #[test]
    fn children_preserve_insertion_order() {
        let g = sample_graph();
        assert_eq!(g.children(&b("feature-a")), &[b("feature-b"), b("feature-c")]);
    }

    #[test]
    fn siblings_excludes_self() {
        let g = sample_graph();
        assert_eq!(g.siblings(&b("feature-b")), vec![b("feature-c")]);
    }

    #[test]
    fn ancestors_and_depth() {
        let g = sample_graph();
        assert_eq!(g.ancestors(&b("feature-b")), vec![b("feature-a"), b("main")]);
        assert_eq!(g.depth(&b("feature-b")), 2);
    }

    #[test]
    fn descendants_bfs() {
        let g = sample_graph();
        let mut d = g.descendants(&b("main"));
        d.sort_by(|a, b2| a.as_str().cmp(b2.as_str()));
        assert_eq!(d, vec![b("feature-a"), b("feature-b"), b("feature-c")]);
    }

    #[test]
    fn top_of_follows_last_child() {
        let g = sample_graph();
        assert_eq!(g.top_of(&b("main")), b("feature-c"));
    }

    #[test]
    fn bottom_of_stops_above_trunk() {
        let g = sample_graph();
        assert_eq!(g.bottom_of(&b("feature-b")), b("feature-a"));
        assert_eq!(g.bottom_of(&b("feature-a")), b("feature-a"));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut g = sample_graph();
        assert!(g.add_edge(b("feature-b"), b("feature-a")).is_err());
    }

    #[test]
    fn find_exact_beats_prefix_and_substring() {
        let g = sample_graph();
        let (kind, matches) = g.find("feature-a");
        assert_eq!(kind, MatchKind::Exact);
        assert_eq!(matches, vec![b("feature-a")]);

        let (kind, matches) = g.find("feature-");
        assert_eq!(kind, MatchKind::Prefix);
        assert_eq!(matches.len(), 3);

        let (kind, matches) = g.find("-b");
        assert_eq!(kind, MatchKind::Substring);
        assert_eq!(matches, vec![b("feature-b")]);
    }

    #[test]
    fn topological_order_is_deterministic() {
        let g = sample_graph();
        let order = g.topological_order();
        assert_eq!(order[0], b("main"));
        assert_eq!(order[1], b("feature-a"));
    }
}
