use std::collections::VecDeque;

use crate::graph::Graph;
use crate::info::PassArena;
use crate::node::NodeId;
use crate::variable::{Assignment, VarId};

/// Expected outcome of a sensitisation: the assignment contradicts one
/// already forced onto the same variable, or the propagation engine
/// derived contradictory values on the same node. Never a runtime bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationOutcome {
    Done,
    Conflict,
    Cutoff,
}

/// Sticky step counter shared by one phase of one pass. Once `used`
/// exceeds `limit` the phase must stop; the flag survives until the
/// driver explicitly starts a new phase.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub limit: u32,
    pub used: u32,
    pub cutoff: bool,
}

impl Budget {
    pub fn new(limit: u32) -> Self {
        Budget {
            limit,
            used: 0,
            cutoff: false,
        }
    }

    fn tick(&mut self) -> bool {
        self.used += 1;
        if self.used > self.limit {
            self.cutoff = true;
        }
        !self.cutoff
    }
}

/// The FIFO queue of variable assignments awaiting forward propagation,
/// plus the list of variables touched this sensitisation (needed to
/// unwind state on a non-redundant/non-implying outcome).
pub struct PropagationState {
    queue: VecDeque<(VarId, bool)>,
    touched_vars: Vec<VarId>,
    touched_nodes: Vec<NodeId>,
    /// First-seen `unassigned_children` value for every node whose
    /// counter this sensitisation decremented, so a non-redundant or
    /// non-implying outcome can restore it exactly rather than
    /// recomputing from scratch.
    counter_baseline: Vec<(NodeId, u32)>,
}

impl PropagationState {
    pub fn new() -> Self {
        PropagationState {
            queue: VecDeque::new(),
            touched_vars: Vec::new(),
            touched_nodes: Vec::new(),
            counter_baseline: Vec::new(),
        }
    }

    pub fn touched_vars(&self) -> &[VarId] {
        &self.touched_vars
    }

    pub fn touched_nodes(&self) -> &[NodeId] {
        &self.touched_nodes
    }

    pub fn counter_baseline(&self) -> &[(NodeId, u32)] {
        &self.counter_baseline
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    fn record_counter_baseline(&mut self, node: NodeId, current: u32) {
        if !self.counter_baseline.iter().any(|(n, _)| *n == node) {
            self.counter_baseline.push((node, current));
        }
    }
}

impl Default for PropagationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Assigns `var` to `value`. Returns conflict if `var` is already
/// assigned to the opposite value; a no-op if already assigned to the
/// same value; otherwise records the assignment and enqueues it for
/// forward propagation.
pub fn assign_variable(
    graph: &mut Graph,
    state: &mut PropagationState,
    var: VarId,
    value: bool,
) -> Result<(), Conflict> {
    let current = graph.var(var).assignment;
    match current.as_bool() {
        Some(existing) if existing != value => Err(Conflict),
        Some(_) => Ok(()),
        None => {
            graph.var_mut(var).assignment = Assignment::from_bool(value);
            state.touched_vars.push(var);
            state.queue.push_back((var, value));
            Ok(())
        }
    }
}

/// Drains the propagation queue. Each dequeued variable assignment is
/// forward-propagated through every literal occurrence of that variable
/// that participates in the current region (tracked via `arena`). Stops
/// early on conflict or on exceeding `budget`.
pub fn propagate(
    graph: &mut Graph,
    arena: &mut PassArena,
    state: &mut PropagationState,
    budget: &mut Budget,
) -> PropagationOutcome {
    while let Some((var, value)) = state.queue.pop_front() {
        let occurrences: Vec<NodeId> = graph
            .var(var)
            .occurrences(true)
            .iter()
            .cloned()
            .filter(|n| arena.has_info(*n))
            .collect();
        for lit_node in occurrences {
            match forward_step(graph, arena, state, budget, lit_node, value) {
                Ok(true) => {}
                Ok(false) => return PropagationOutcome::Cutoff,
                Err(Conflict) => return PropagationOutcome::Conflict,
            }
        }
        let neg_occurrences: Vec<NodeId> = graph
            .var(var)
            .occurrences(false)
            .iter()
            .cloned()
            .filter(|n| arena.has_info(*n))
            .collect();
        for lit_node in neg_occurrences {
            match forward_step(graph, arena, state, budget, lit_node, !value) {
                Ok(true) => {}
                Ok(false) => return PropagationOutcome::Cutoff,
                Err(Conflict) => return PropagationOutcome::Conflict,
            }
        }
    }
    PropagationOutcome::Done
}

/// Forward-propagates the fact that `node` now evaluates to `value`, up
/// through ancestors as far as the consequence is determined. Tail
/// iterative: continuing at the parent when its own value becomes
/// determined is a loop, not a recursive call.
fn forward_step(
    graph: &mut Graph,
    arena: &mut PassArena,
    state: &mut PropagationState,
    budget: &mut Budget,
    mut node: NodeId,
    mut value: bool,
) -> Result<bool, Conflict> {
    loop {
        if !budget.tick() {
            return Ok(false);
        }
        if let Some(info) = arena.info_mut(node) {
            if info.assignment.is_assigned() {
                if info.assignment.as_bool() != Some(value) {
                    return Err(Conflict);
                }
                return Ok(true);
            }
            info.assignment = Assignment::from_bool(value);
        }
        state.touched_nodes.push(node);

        let parent = match graph.node(node).parent {
            Some(p) => p,
            None => return Ok(true),
        };
        if !arena.has_info(parent) {
            return Ok(true);
        }
        let dominating = graph.node(parent).kind.dominating_value();
        let already_assigned = arena.info(parent).unwrap().assignment.is_assigned();
        if already_assigned {
            let parent_value = arena.info(parent).unwrap().assignment.as_bool();
            if value == dominating && parent_value != Some(dominating) {
                return Err(Conflict);
            }
            return Ok(true);
        }

        if value == dominating {
            node = parent;
            value = dominating;
            continue;
        }

        let before = arena.info(parent).unwrap().unassigned_children;
        state.record_counter_baseline(parent, before);
        let remaining = {
            let info = arena.info_mut(parent).unwrap();
            info.unassigned_children = info.unassigned_children.saturating_sub(1);
            info.unassigned_children
        };
        update_watcher(graph, arena, parent);
        match remaining {
            0 => {
                node = parent;
                value = !dominating;
                continue;
            }
            _ => return Ok(true),
        }
    }
}

/// Forces `node` to `target_value` from above (not derived from its own
/// children). If `node` is a literal, this assigns its variable. If
/// `node` is an operator forced to its dominating value (OR true / AND
/// false) with exactly one unassigned participating child left, that
/// child is the only way to satisfy the forced value and is itself
/// force-propagated. If forced to the non-dominating value, every
/// participating child must independently take the non-dominating value.
/// Driven over an explicit stack rather than the call stack, since a
/// chain of forced single-child operators can run as deep as the graph.
pub fn backward_force(
    graph: &mut Graph,
    arena: &mut PassArena,
    state: &mut PropagationState,
    budget: &mut Budget,
    node: NodeId,
    target_value: bool,
) -> Result<bool, Conflict> {
    let mut stack: Vec<(NodeId, bool)> = vec![(node, target_value)];

    while let Some((node, target_value)) = stack.pop() {
        if !budget.tick() {
            return Ok(false);
        }
        if let Some((var, positive)) = graph.node(node).literal() {
            let var_value = if positive { target_value } else { !target_value };
            assign_variable(graph, state, var, var_value)?;
            continue;
        }

        if let Some(info) = arena.info(node) {
            if info.assignment.is_assigned() {
                if info.assignment.as_bool() == Some(target_value) {
                    continue;
                }
                return Err(Conflict);
            }
        }
        if let Some(info) = arena.info_mut(node) {
            info.assignment = Assignment::from_bool(target_value);
        }
        state.touched_nodes.push(node);

        let dominating = graph.node(node).kind.dominating_value();
        if target_value == dominating {
            if arena.info(node).unwrap().unassigned_children == 1 {
                if let Some(only_child) = single_unassigned_child(graph, arena, node) {
                    stack.push((only_child, dominating));
                }
            }
            continue;
        }

        let children = participating_children(graph, arena, node);
        for child in children {
            stack.push((child, !dominating));
        }
    }
    Ok(true)
}

fn participating_children(graph: &Graph, arena: &PassArena, node: NodeId) -> Vec<NodeId> {
    match arena.info(node).and_then(|i| i.restricted.as_ref()) {
        Some(list) => list
            .iter()
            .filter(|h| arena.handle(**h).is_usable())
            .map(|h| arena.handle(*h).node)
            .collect(),
        None => graph.node(node).children.clone(),
    }
}

fn single_unassigned_child(graph: &Graph, arena: &PassArena, node: NodeId) -> Option<NodeId> {
    participating_children(graph, arena, node)
        .into_iter()
        .find(|&c| !arena.info(c).map_or(true, |i| i.assignment.is_assigned()))
}

/// Scans forward from the node's cached watcher position to find the
/// next unassigned participating child, compacting a restricted list
/// marked `needs_cleanup` along the way. Leaves `watcher` at `None` once
/// no unassigned child remains.
fn update_watcher(graph: &mut Graph, arena: &mut PassArena, node: NodeId) {
    let needs_cleanup = arena.info(node).map_or(false, |i| i.needs_cleanup);
    if needs_cleanup {
        let current = arena.info(node).and_then(|i| i.restricted.clone());
        if let Some(list) = current {
            let filtered: Vec<_> = list
                .into_iter()
                .filter(|h| arena.handle(*h).is_usable())
                .collect();
            if let Some(info) = arena.info_mut(node) {
                info.restricted = Some(filtered);
            }
        }
        if let Some(info) = arena.info_mut(node) {
            info.needs_cleanup = false;
        }
    }
    let children = participating_children(graph, arena, node);
    if children.is_empty() {
        if let Some(info) = arena.info_mut(node) {
            info.watcher = None;
        }
        return;
    }
    let start = arena.info(node).and_then(|i| i.watcher).unwrap_or(0) % children.len();
    let mut found = None;
    for offset in 0..children.len() {
        let idx = (start + offset) % children.len();
        let child = children[idx];
        let assigned = arena
            .info(child)
            .map_or(false, |i| i.assignment.is_assigned());
        if !assigned {
            found = Some(idx);
            break;
        }
    }
    if let Some(info) = arena.info_mut(node) {
        info.watcher = found;
    }
}
