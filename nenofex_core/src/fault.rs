use crate::graph::Graph;
use crate::info::{HandleId, PassArena};
use crate::node::NodeId;
use crate::propagate::{assign_variable, Conflict, PropagationState};
use crate::subformula::ChangedSubformula;

/// Stuck-at-0 applies to an AND node or to a literal sitting under an OR
/// parent; stuck-at-1 applies to an OR node or to a literal under an AND
/// parent. The fault's "detecting value" is the opposite polarity: the
/// sensitised node must be driven to that value for the fault's effect to
/// be observable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckAt {
    Zero,
    One,
}

impl StuckAt {
    pub fn detecting_value(self) -> bool {
        match self {
            StuckAt::Zero => true,
            StuckAt::One => false,
        }
    }

    /// Determines the natural stuck-at type of `node` given its own kind
    /// and (for literals) its parent's kind.
    pub fn natural_for(graph: &Graph, node: NodeId) -> StuckAt {
        let n = graph.node(node);
        if n.is_and() {
            return StuckAt::Zero;
        }
        if n.is_or() {
            return StuckAt::One;
        }
        match n.parent {
            Some(parent) if graph.node(parent).is_and() => StuckAt::One,
            _ => StuckAt::Zero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOrder {
    DepthFirst,
    BreadthFirst,
    BottomUp,
}

/// Walks the changed_subformula region and returns every participating
/// node in the requested order. Default ordering (bottom-up) visits
/// literals first, then internal nodes from the leaves toward the LCA,
/// which empirically maximises early deletions.
pub fn collect_region_nodes(graph: &Graph, selector: &ChangedSubformula, order: CollectionOrder) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    for &child in selector.children() {
        collect_subtree(graph, child, order, &mut nodes);
    }
    nodes.push(selector.lca());
    if order == CollectionOrder::BottomUp {
        // leaves-first-per-subtree is already achieved by post-order
        // recursion; the LCA itself is the last (most internal) node.
    }
    nodes
}

fn collect_subtree(graph: &Graph, root: NodeId, order: CollectionOrder, out: &mut Vec<NodeId>) {
    match order {
        CollectionOrder::DepthFirst | CollectionOrder::BottomUp => {
            for &child in &graph.node(root).children {
                collect_subtree(graph, child, order, out);
            }
            out.push(root);
        }
        CollectionOrder::BreadthFirst => {
            let mut frontier = vec![root];
            while !frontier.is_empty() {
                let mut next = Vec::new();
                for node in frontier {
                    out.push(node);
                    next.extend(graph.node(node).children.iter().cloned());
                }
                frontier = next;
            }
        }
    }
}

/// Sensitises the stuck-at fault at `candidate`: drives the node (or its
/// participating literal children, for an operator candidate) to the
/// fault's detecting value. Returns `Err(Conflict)` immediately when an
/// assignment contradicts one already present (a direct redundancy
/// witness requiring no further propagation).
pub fn sensitize_fault(
    graph: &mut Graph,
    state: &mut PropagationState,
    candidate: NodeId,
    stuck_at: StuckAt,
) -> Result<(), Conflict> {
    let detecting = stuck_at.detecting_value();
    if let Some((var, positive)) = graph.node(candidate).literal() {
        let var_value = if positive { detecting } else { !detecting };
        return assign_variable(graph, state, var, var_value);
    }
    for &child in graph.node(candidate).children.clone().iter() {
        if let Some((var, positive)) = graph.node(child).literal() {
            let var_value = if positive { detecting } else { !detecting };
            assign_variable(graph, state, var, var_value)?;
        }
    }
    Ok(())
}

/// Marks the ancestor chain from `candidate` up to (not including) the
/// subformula LCA as on-path, and forces every off-path literal child of
/// an on-path OR (resp. AND) ancestor to false (resp. true) so the
/// fault's effect is forced to propagate unobstructed along the path. A
/// clash with an already-opposite assignment is returned as an immediate
/// conflict (direct redundancy witness).
pub fn mark_path_and_collect_off_path(
    graph: &mut Graph,
    arena: &mut PassArena,
    state: &mut PropagationState,
    candidate: NodeId,
    lca: NodeId,
) -> Result<Vec<NodeId>, Conflict> {
    let mut path = Vec::new();
    let mut current = candidate;
    loop {
        if let Some(info) = arena.info_mut(current) {
            info.on_path = true;
        }
        path.push(current);
        if current == lca {
            break;
        }
        let parent = match graph.node(current).parent {
            Some(p) => p,
            None => break,
        };
        let non_dominating = !graph.node(parent).kind.dominating_value();
        for &sibling in graph.node(parent).children.clone().iter() {
            if sibling == current {
                continue;
            }
            if let Some((var, positive)) = graph.node(sibling).literal() {
                let var_value = if positive { non_dominating } else { !non_dominating };
                assign_variable(graph, state, var, var_value)?;
            }
        }
        current = parent;
        if current == lca {
            if let Some(info) = arena.info_mut(current) {
                info.on_path = true;
            }
            path.push(current);
            break;
        }
    }
    Ok(path)
}

pub fn unmark_path(arena: &mut PassArena, path: &[NodeId]) {
    for &node in path {
        if let Some(info) = arena.info_mut(node) {
            info.on_path = false;
        }
    }
}

/// Rolls back every variable and node assignment made while testing one
/// candidate, leaving the arena ready for the next candidate in the
/// queue.
pub fn reset_touched(graph: &mut Graph, arena: &mut PassArena, state: &PropagationState) {
    for &var in state.touched_vars() {
        graph.var_mut(var).reset_assignment();
    }
    for &node in state.touched_nodes() {
        if let Some(info) = arena.info_mut(node) {
            info.reset_transient();
        }
    }
    for &(node, original) in state.counter_baseline() {
        if let Some(info) = arena.info_mut(node) {
            info.unassigned_children = original;
            info.watcher = Some(0);
        }
    }
}

pub fn mark_fault_node_as_deleted(arena: &mut PassArena, handle: HandleId) {
    arena.mark_deleted(handle);
}
