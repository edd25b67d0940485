use std::sync::atomic::{AtomicUsize, Ordering};

use index_vec::IndexVec;

use crate::node::{Node, NodeId, NodeKind};
use crate::variable::{VarId, Variable};

/// The mutable NNF DAG plus the variable table, addressed by stable
/// `NodeId`/`VarId` handles so the rest of the engine never holds a raw
/// pointer across a mutation. Deleted nodes leave a tombstone (`None`)
/// behind rather than shifting indices, so that `FaultHandle`s recorded
/// elsewhere never dangle silently.
pub struct Graph {
    nodes: IndexVec<NodeId, Option<Node>>,
    vars: IndexVec<VarId, Variable>,
    root: Option<NodeId>,
    node_counter: AtomicUsize,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            nodes: IndexVec::new(),
            vars: IndexVec::new(),
            root: None,
            node_counter: AtomicUsize::new(0),
        }
    }

    fn new_node_id(&self) -> NodeId {
        NodeId::new(self.node_counter.fetch_add(1, Ordering::Relaxed))
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.node_mut(root).parent = None;
        self.root = Some(root);
        self.update_level(root, 0);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id].as_ref().expect("access to a freed node")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id].as_mut().expect("access to a freed node")
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id).map_or(false, |slot| slot.is_some())
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id]
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn all_var_ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.vars.len()).map(VarId::new)
    }

    pub fn num_live_nodes(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn new_var(&mut self) -> VarId {
        let id = VarId::new(self.vars.len());
        self.vars.push(Variable::new(id));
        id
    }

    /// Creates a fresh literal node and registers it in its variable's
    /// occurrence list.
    pub fn literal_node(&mut self, var: VarId, positive: bool) -> NodeId {
        let id = self.new_node_id();
        self.nodes.insert(id, Some(Node::new_literal(var, positive)));
        if positive {
            self.vars[var].pos_occurrences.push(id);
        } else {
            self.vars[var].neg_occurrences.push(id);
        }
        id
    }

    pub fn and_node(&mut self, children: Vec<NodeId>) -> NodeId {
        self.operator_node(NodeKind::And, children)
    }

    pub fn or_node(&mut self, children: Vec<NodeId>) -> NodeId {
        self.operator_node(NodeKind::Or, children)
    }

    /// Builds a fresh operator node over `children`, reordering so literal
    /// children precede operator children, and wires parent links and the
    /// initial `size_subformula`/`level` on both the new node and its
    /// children.
    fn operator_node(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        let mut ordered = children;
        ordered.sort_by_key(|c| !self.node(*c).is_literal());
        let id = self.new_node_id();
        let size = 1 + ordered
            .iter()
            .map(|c| self.node(*c).size_subformula)
            .sum::<u32>();
        for child in &ordered {
            self.node_mut(*child).parent = Some(id);
        }
        let mut node = Node::new_operator(kind, ordered);
        node.size_subformula = size;
        self.nodes.insert(id, Some(node));
        id
    }

    /// Detaches `node` from its parent's child list without freeing it,
    /// and propagates the resulting size delta upward. The node itself
    /// keeps its own subtree intact and becomes a new orphan root
    /// candidate for the caller to relink or free.
    pub fn unlink_node(&mut self, node: NodeId) {
        let parent = self.node(node).parent;
        if let Some(parent_id) = parent {
            let delta = self.node(node).size_subformula;
            {
                let parent_node = self.node_mut(parent_id);
                parent_node.children.retain(|&c| c != node);
            }
            self.node_mut(node).parent = None;
            self.update_size_subformula(parent_id, -(delta as i64));
        }
    }

    /// Appends `node` as a new child of `parent`, preserving the
    /// literal-before-operator ordering, and updates sizes/levels.
    pub fn add_node_to_child_list(&mut self, parent: NodeId, node: NodeId) {
        debug_assert!(!self.node(parent).is_literal());
        let delta = self.node(node).size_subformula;
        let is_literal = self.node(node).is_literal();
        self.node_mut(node).parent = Some(parent);
        let insert_at = if is_literal {
            0
        } else {
            self.node(parent).children.len()
        };
        self.node_mut(parent).children.insert(insert_at, node);
        self.update_size_subformula(parent, delta as i64);
        let parent_level = self.node(parent).level;
        self.update_level(node, parent_level + 1);
    }

    /// Recomputes `level` for `root` and its whole subtree from a known
    /// parent level.
    pub fn update_level(&mut self, root: NodeId, level: u32) {
        self.node_mut(root).level = level;
        let children = self.node(root).children.clone();
        for child in children {
            self.update_level(child, level + 1);
        }
    }

    /// Adds `delta` to `node.size_subformula` and to every ancestor up to
    /// the root.
    pub fn update_size_subformula(&mut self, node: NodeId, delta: i64) {
        let mut current = Some(node);
        while let Some(id) = current {
            let size = &mut self.node_mut(id).size_subformula;
            *size = (*size as i64 + delta).max(1) as u32;
            current = self.node(id).parent;
        }
    }

    /// Collapses runs of the same operator kind in `node`'s own child
    /// list (AND-of-AND, OR-of-OR) and merges `node` into its parent if
    /// `node` has a single child left. Local, single level only.
    pub fn simplify_one_level(&mut self, node: NodeId) {
        if self.node(node).is_literal() {
            return;
        }
        let kind = self.node(node).kind;
        let children = self.node(node).children.clone();
        let mut flattened = Vec::with_capacity(children.len());
        for child in children {
            if !self.node(child).is_literal() && self.node(child).kind == kind {
                let grandchildren = self.node(child).children.clone();
                for gc in grandchildren {
                    self.node_mut(gc).parent = Some(node);
                    flattened.push(gc);
                }
                self.free_node(child);
            } else {
                flattened.push(child);
            }
        }
        flattened.sort_by_key(|c| !self.node(*c).is_literal());
        self.node_mut(node).children = flattened;
        self.recompute_size_subformula(node);
        if self.node(node).num_children() == 1 {
            self.merge_parent(node);
        }
    }

    fn recompute_size_subformula(&mut self, node: NodeId) {
        let size = 1 + self
            .node(node)
            .children
            .clone()
            .iter()
            .map(|c| self.node(*c).size_subformula)
            .sum::<u32>();
        self.node_mut(node).size_subformula = size;
    }

    /// Collapses a single-child operator `node` with its parent: `node`'s
    /// sole child takes `node`'s place in `node`'s parent's child list.
    /// If `node` is the root, its child becomes the new root.
    pub fn merge_parent(&mut self, node: NodeId) {
        if self.node(node).is_literal() || self.node(node).num_children() != 1 {
            return;
        }
        let only_child = self.node(node).children[0];
        match self.node(node).parent {
            None => {
                self.node_mut(only_child).parent = None;
                self.free_node_keep_subtree(node);
                self.set_root(only_child);
            }
            Some(parent) => {
                let idx = self
                    .node(parent)
                    .children
                    .iter()
                    .position(|&c| c == node)
                    .expect("node must be a child of its recorded parent");
                self.node_mut(parent).children[idx] = only_child;
                self.node_mut(only_child).parent = Some(parent);
                let parent_level = self.node(parent).level;
                self.free_node_keep_subtree(node);
                self.update_level(only_child, parent_level + 1);
                self.recompute_size_subformula(parent);
            }
        }
    }

    /// Removes `root` and its whole subtree, detaching it from its parent
    /// first. Literal nodes are also scrubbed from their variable's
    /// occurrence lists.
    pub fn remove_and_free_subformula(&mut self, root: NodeId) {
        self.unlink_node(root);
        self.free_subtree(root);
    }

    fn free_subtree(&mut self, node: NodeId) {
        let children = self.node(node).children.clone();
        if let Some((var, positive)) = self.node(node).literal() {
            if positive {
                self.vars[var].pos_occurrences.retain(|&n| n != node);
            } else {
                self.vars[var].neg_occurrences.retain(|&n| n != node);
            }
        }
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[node] = None;
    }

    /// Frees just the `node` record, leaving its subtree (and the
    /// occurrence lists of any literals in it) untouched. Used when a
    /// single operator wrapper disappears but its children are being
    /// relinked elsewhere.
    fn free_node_keep_subtree(&mut self, node: NodeId) {
        self.nodes[node] = None;
    }

    fn free_node(&mut self, node: NodeId) {
        self.nodes[node] = None;
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_keeps_literals_before_operators() {
        let mut g = Graph::new();
        let a = g.new_var();
        let b = g.new_var();
        let lit_a = g.literal_node(a, true);
        let inner = g.or_node(vec![]);
        let lit_b = g.literal_node(b, true);
        let and_node = g.and_node(vec![inner, lit_a, lit_b]);
        let children = &g.node(and_node).children;
        assert!(children[0] == lit_a || children[0] == lit_b);
        assert!(children[1] == lit_a || children[1] == lit_b);
        assert_eq!(children[2], inner);
    }

    #[test]
    fn size_subformula_matches_children() {
        let mut g = Graph::new();
        let a = g.new_var();
        let b = g.new_var();
        let lit_a = g.literal_node(a, true);
        let lit_b = g.literal_node(b, false);
        let root = g.and_node(vec![lit_a, lit_b]);
        g.set_root(root);
        assert_eq!(g.node(root).size_subformula, 3);
    }

    #[test]
    fn unlink_updates_ancestor_sizes() {
        let mut g = Graph::new();
        let a = g.new_var();
        let b = g.new_var();
        let c = g.new_var();
        let lit_a = g.literal_node(a, true);
        let lit_b = g.literal_node(b, true);
        let inner = g.and_node(vec![lit_a, lit_b]);
        let lit_c = g.literal_node(c, true);
        let root = g.or_node(vec![inner, lit_c]);
        g.set_root(root);
        assert_eq!(g.node(root).size_subformula, 5);
        g.unlink_node(inner);
        assert_eq!(g.node(root).size_subformula, 2);
        assert!(g.node(inner).parent.is_none());
    }

    #[test]
    fn remove_and_free_subformula_clears_occurrences() {
        let mut g = Graph::new();
        let a = g.new_var();
        let lit_a = g.literal_node(a, true);
        let lit_a2 = g.literal_node(a, true);
        let root = g.and_node(vec![lit_a, lit_a2]);
        g.set_root(root);
        g.remove_and_free_subformula(lit_a);
        assert_eq!(g.var(a).pos_occurrences, vec![lit_a2]);
        assert!(!g.is_live(lit_a));
    }

    #[test]
    fn merge_parent_collapses_single_child_chain() {
        let mut g = Graph::new();
        let a = g.new_var();
        let lit_a = g.literal_node(a, true);
        let inner = g.and_node(vec![lit_a]);
        let b = g.new_var();
        let lit_b = g.literal_node(b, true);
        let root = g.or_node(vec![inner, lit_b]);
        g.set_root(root);
        g.merge_parent(inner);
        assert_eq!(g.node(root).children.len(), 2);
        assert!(g.node(root).children.contains(&lit_a));
    }
}
