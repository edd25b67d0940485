use std::collections::VecDeque;

use crate::fault::{
    mark_fault_node_as_deleted, mark_path_and_collect_off_path, sensitize_fault, unmark_path,
    CollectionOrder, StuckAt,
};
use crate::fault::{collect_region_nodes, reset_touched};
use crate::graph::Graph;
use crate::info::{HandleId, PassArena};
use crate::node::NodeId;
use crate::propagate::{propagate, Budget, PropagationOutcome, PropagationState};
use crate::subformula::ChangedSubformula;

/// Outcome of testing one fault candidate for redundancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedundancyOutcome {
    /// The candidate is redundant: its subtree can be deleted and
    /// replaced by its parent's neutral element without changing
    /// satisfiability.
    Redundant,
    /// Sensitisation produced nothing to propagate (a clash was found
    /// immediately while collecting off-path constraints); the
    /// candidate is kept but no further state needs rolling back beyond
    /// the path marks.
    NonRedundantRestricted,
    /// Propagation saturated without conflict: the fault is observable
    /// and the candidate is definitely not redundant.
    NonRedundant,
    /// The propagation budget was exceeded mid-test; the candidate is
    /// kept (conservatively) and the sticky cutoff flag is set.
    NonRedundantBudgetExhausted,
}

/// Tests whether `candidate` (with its natural stuck-at type) is
/// redundant within `selector`'s region, mutating the graph by deleting
/// it when it is.
pub fn test_is_redundant(
    graph: &mut Graph,
    arena: &mut PassArena,
    selector: &ChangedSubformula,
    candidate: NodeId,
    handle: HandleId,
    budget: &mut Budget,
) -> RedundancyOutcome {
    let stuck_at = StuckAt::natural_for(graph, candidate);
    let mut state = PropagationState::new();

    if sensitize_fault(graph, &mut state, candidate, stuck_at).is_err() {
        finish_redundant(graph, arena, &state, candidate, handle);
        return RedundancyOutcome::Redundant;
    }

    let path = match mark_path_and_collect_off_path(graph, arena, &mut state, candidate, selector.lca()) {
        Ok(p) => p,
        Err(_) => {
            finish_redundant(graph, arena, &state, candidate, handle);
            return RedundancyOutcome::Redundant;
        }
    };

    if !state.has_pending() {
        unmark_path(arena, &path);
        reset_touched(graph, arena, &state);
        return RedundancyOutcome::NonRedundantRestricted;
    }

    match propagate(graph, arena, &mut state, budget) {
        PropagationOutcome::Conflict => {
            unmark_path(arena, &path);
            finish_redundant(graph, arena, &state, candidate, handle);
            RedundancyOutcome::Redundant
        }
        PropagationOutcome::Cutoff => {
            unmark_path(arena, &path);
            reset_touched(graph, arena, &state);
            RedundancyOutcome::NonRedundantBudgetExhausted
        }
        PropagationOutcome::Done => {
            unmark_path(arena, &path);
            reset_touched(graph, arena, &state);
            RedundancyOutcome::NonRedundant
        }
    }
}

fn finish_redundant(
    graph: &mut Graph,
    arena: &mut PassArena,
    state: &PropagationState,
    candidate: NodeId,
    handle: HandleId,
) {
    reset_touched(graph, arena, state);
    graph.remove_and_free_subformula(candidate);
    mark_fault_node_as_deleted(arena, handle);
}

/// Drives redundancy removal to saturation over the whole region: the
/// fault queue is rotated between a primary and a secondary queue; any
/// pass that deletes at least one candidate triggers another sweep of
/// the survivors, until a sweep deletes nothing, the region disappears,
/// or the budget is exhausted.
pub fn run_redundancy_phase(
    graph: &mut Graph,
    arena: &mut PassArena,
    selector: &ChangedSubformula,
    budget: &mut Budget,
    order: CollectionOrder,
) -> (usize, bool) {
    let mut primary: VecDeque<(NodeId, HandleId)> = collect_region_nodes(graph, selector, order)
        .into_iter()
        .filter_map(|n| arena.handle_of(n).map(|h| (n, h)))
        .collect();
    let mut deleted_total = 0usize;

    loop {
        let mut secondary = VecDeque::new();
        let mut deleted_this_sweep = 0usize;
        while let Some((node, handle)) = primary.pop_front() {
            if arena.handle(handle).deleted || arena.handle(handle).skip {
                continue;
            }
            if budget.cutoff {
                return (deleted_total, true);
            }
            match test_is_redundant(graph, arena, selector, node, handle, budget) {
                RedundancyOutcome::Redundant => {
                    deleted_this_sweep += 1;
                    deleted_total += 1;
                }
                RedundancyOutcome::NonRedundantBudgetExhausted => {
                    return (deleted_total, true);
                }
                RedundancyOutcome::NonRedundant | RedundancyOutcome::NonRedundantRestricted => {
                    secondary.push_back((node, handle));
                }
            }
        }
        if deleted_this_sweep == 0 || !graph.is_live(selector.lca()) {
            break;
        }
        primary = secondary;
    }
    (deleted_total, false)
}
