use crate::fault::{collect_region_nodes, reset_touched, sensitize_fault, CollectionOrder, StuckAt};
use crate::graph::Graph;
use crate::info::PassArena;
use crate::node::{NodeId, NodeKind};
use crate::propagate::{propagate, Budget, PropagationOutcome, PropagationState};
use crate::subformula::ChangedSubformula;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalFlowOutcome {
    /// An implication was found and the graph was rewritten.
    Rewritten,
    /// Propagation finished without conflict but no reliable ancestor
    /// shared the candidate's trial value.
    NoImplication,
    /// The trial assignment conflicted immediately or during
    /// propagation; no information to act on for this candidate.
    NoEffect,
    Cutoff,
}

/// Tries global flow at `candidate`: sensitise a trial value, propagate
/// without path marking, then search for the highest reliable ancestor
/// sharing that value. Only implications of the form "AND above becomes
/// true" or "OR above becomes false" are ever turned into a rewrite,
/// since any other direction would require introducing a negation and
/// break the NNF invariant. Returns whether the graph was mutated.
pub fn try_global_flow(
    graph: &mut Graph,
    arena: &mut PassArena,
    selector: &ChangedSubformula,
    candidate: NodeId,
    budget: &mut Budget,
) -> GlobalFlowOutcome {
    let trial_value = StuckAt::natural_for(graph, candidate).detecting_value();
    let mut state = PropagationState::new();

    if sensitize_fault(graph, &mut state, candidate, as_stuck_at(trial_value)).is_err() {
        reset_touched(graph, arena, &state);
        return GlobalFlowOutcome::NoEffect;
    }

    match propagate(graph, arena, &mut state, budget) {
        PropagationOutcome::Conflict => {
            reset_touched(graph, arena, &state);
            GlobalFlowOutcome::NoEffect
        }
        PropagationOutcome::Cutoff => {
            reset_touched(graph, arena, &state);
            GlobalFlowOutcome::Cutoff
        }
        PropagationOutcome::Done => {
            let witness = find_highest_implication(graph, arena, candidate, selector.lca());
            reset_touched(graph, arena, &state);
            match witness {
                Some(w) if is_rewritable_direction(graph, w, trial_value) => {
                    apply_rewrite(graph, arena, selector, candidate, w);
                    GlobalFlowOutcome::Rewritten
                }
                _ => GlobalFlowOutcome::NoImplication,
            }
        }
    }
}

/// The `StuckAt` whose detecting value is exactly `value`, used to drive
/// a trial sensitisation to `value` via the same machinery fault
/// sensitisation uses.
fn as_stuck_at(value: bool) -> StuckAt {
    if value {
        StuckAt::Zero
    } else {
        StuckAt::One
    }
}

/// Walks from `candidate`'s grandparent toward `lca`, returning the
/// highest ancestor whose forced value matches `candidate`'s and which
/// is reliable: an ancestor forced to its dominating value (OR true /
/// AND false) is always reliable (any one child suffices); an ancestor
/// forced to its non-dominating value (AND true / OR false) is reliable
/// only when every one of its children participates in the pass.
fn find_highest_implication(graph: &Graph, arena: &PassArena, candidate: NodeId, lca: NodeId) -> Option<NodeId> {
    let value = arena.info(candidate)?.assignment.as_bool()?;
    let parent = graph.node(candidate).parent?;
    let mut current = graph.node(parent).parent;
    let mut highest = None;
    while let Some(node) = current {
        if let Some(info) = arena.info(node) {
            if info.assignment.as_bool() == Some(value) {
                let dominating = graph.node(node).kind.dominating_value();
                let reliable = value == dominating || info.restricted.is_none();
                if reliable {
                    highest = Some(node);
                }
            }
        }
        if node == lca {
            break;
        }
        current = graph.node(node).parent;
    }
    highest
}

/// Only "AND above becomes true" and "OR above becomes false" rewrite
/// without introducing a negation; the opposite directions are real
/// implications but are left unexploited.
fn is_rewritable_direction(graph: &Graph, witness: NodeId, value: bool) -> bool {
    let kind = graph.node(witness).kind;
    (kind.is_and() && value) || (kind.is_or() && !value)
}

/// Relinks `candidate` under the insertion point implied by `witness`'s
/// location relative to the subformula, per the four-location rewrite
/// table: graph root (new opposite-kind root), subformula LCA
/// (candidate joins LCA's parent), direct child of the LCA (candidate
/// joins the LCA itself), or a deeper ancestor (candidate joins the
/// witness's own parent).
fn apply_rewrite(
    graph: &mut Graph,
    arena: &mut PassArena,
    selector: &ChangedSubformula,
    candidate: NodeId,
    witness: NodeId,
) {
    graph.unlink_node(candidate);

    let root = graph.root();
    let is_root_case = Some(witness) == root;
    let lca_not_root = witness == selector.lca() && !is_root_case;
    let insertion_point = if is_root_case {
        let opposite_kind = if graph.node(witness).is_and() {
            NodeKind::Or
        } else {
            NodeKind::And
        };
        let new_root = match opposite_kind {
            NodeKind::And => graph.and_node(vec![witness, candidate]),
            _ => graph.or_node(vec![witness, candidate]),
        };
        graph.set_root(new_root);
        if !arena.has_info(new_root) {
            let _ = arena.try_alloc(new_root, graph.node(new_root).num_children() as u32, None);
        }
        new_root
    } else if witness == selector.lca() {
        match graph.node(witness).parent {
            Some(lca_parent) => lca_parent,
            None => witness,
        }
    } else if graph.node(witness).parent == Some(selector.lca()) {
        selector.lca()
    } else {
        graph.node(witness).parent.unwrap_or(witness)
    };

    if !is_root_case {
        graph.add_node_to_child_list(insertion_point, candidate);
        graph.simplify_one_level(insertion_point);
        if let Some(parent) = graph.node(insertion_point).parent {
            graph.simplify_one_level(parent);
        }
    }

    if !arena.has_info(candidate) {
        let _ = arena.try_alloc(candidate, graph.node(candidate).num_children() as u32, None);
    }

    // Subformula LCA (not root): the insertion point is the LCA's parent,
    // which may have other children outside the region under optimisation.
    // Restrict its participating set to exactly the LCA and the relocated
    // candidate so later reliability checks on it don't assume untracked
    // siblings are assigned.
    if lca_not_root && graph.is_live(insertion_point) {
        let lca = selector.lca();
        if graph.node(insertion_point).children.contains(&lca)
            && graph.node(insertion_point).children.contains(&candidate)
        {
            let lca_handle = arena.handle_of(lca);
            let candidate_handle = arena.handle_of(candidate);
            if let (Some(lh), Some(ch)) = (lca_handle, candidate_handle) {
                let watcher_list = vec![lh, ch];
                if arena.has_info(insertion_point) {
                    if let Some(info) = arena.info_mut(insertion_point) {
                        info.restricted = Some(watcher_list);
                        info.needs_cleanup = false;
                        info.unassigned_children = 2;
                        info.watcher = Some(0);
                    }
                } else {
                    let _ = arena.try_alloc(insertion_point, 2, Some(watcher_list));
                }
            }
        }
    }
}

/// Drives global flow to saturation over the region, same rotation
/// policy as redundancy removal.
pub fn run_global_flow_phase(
    graph: &mut Graph,
    arena: &mut PassArena,
    selector: &ChangedSubformula,
    budget: &mut Budget,
    order: CollectionOrder,
) -> (usize, bool) {
    let mut candidates = collect_region_nodes(graph, selector, order);
    let mut rewritten_total = 0usize;

    loop {
        let mut rewritten_this_sweep = 0usize;
        let mut next_round = Vec::new();
        for node in candidates {
            if !graph.is_live(node) || !arena.has_info(node) {
                continue;
            }
            if budget.cutoff {
                return (rewritten_total, true);
            }
            match try_global_flow(graph, arena, selector, node, budget) {
                GlobalFlowOutcome::Rewritten => {
                    rewritten_this_sweep += 1;
                    rewritten_total += 1;
                }
                GlobalFlowOutcome::Cutoff => return (rewritten_total, true),
                GlobalFlowOutcome::NoImplication | GlobalFlowOutcome::NoEffect => {
                    next_round.push(node);
                }
            }
        }
        if rewritten_this_sweep == 0 || !graph.is_live(selector.lca()) {
            break;
        }
        candidates = next_round;
    }
    (rewritten_total, false)
}
