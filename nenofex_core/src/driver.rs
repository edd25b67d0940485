use itertools::Itertools;

use crate::config::Config;
use crate::graph::Graph;
use crate::globalflow::run_global_flow_phase;
use crate::info::PassArena;
use crate::node::NodeId;
use crate::propagate::Budget;
use crate::redundancy::run_redundancy_phase;
use crate::subformula::ChangedSubformula;
use crate::variable::VarId;

/// Default propagation budget for a region of `size` participating
/// nodes, used whenever the caller has not overridden it via
/// `Config::propagation_limit`.
pub fn default_propagation_limit(size: usize) -> u32 {
    match size {
        0..=800 => 1_500_000,
        801..=1_000 => 1_200_000,
        1_001..=1_500 => 800_000,
        1_501..=2_000 => 700_000,
        2_001..=3_000 => 600_000,
        3_001..=4_000 => 500_000,
        4_001..=6_000 => 300_000,
        6_001..=8_000 => 200_000,
        8_001..=10_000 => 100_000,
        10_001..=12_000 => 50_000,
        _ => 10_000,
    }
}

/// Summary of one `run_pass` call, surfaced to callers (and, in the CLI,
/// to `--show-opt-info` JSON output).
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub redundancies_removed: usize,
    pub implications_applied: usize,
    pub atpg_cutoff: bool,
    pub global_flow_cutoff: bool,
    pub arena_exhausted: bool,
    pub affected_variables: Vec<VarId>,
}

impl PassReport {
    pub fn changed(&self) -> bool {
        self.redundancies_removed > 0 || self.implications_applied > 0
    }
}

/// Runs one pass over `selector`'s region: allocate the fault-info
/// arena, then alternate global-flow and redundancy-removal phases
/// until neither produces further change or its budget is exhausted.
/// Returns a report and the graph mutated in place; on arena exhaustion
/// the pass aborts and keeps whatever changes were already applied.
pub fn run_pass(graph: &mut Graph, selector: &ChangedSubformula, config: &Config) -> PassReport {
    let mut report = PassReport::default();

    let region_size = region_node_count(graph, selector);
    let mut arena = PassArena::with_capacity(region_size);

    if !initialise_arena(graph, &mut arena, selector) {
        report.arena_exhausted = true;
        return report;
    }

    let limit = config
        .propagation_limit
        .unwrap_or_else(|| default_propagation_limit(region_size));

    loop {
        let mut round_changed = false;

        if !config.no_global_flow {
            let mut gf_budget = Budget::new(limit);
            let (count, cutoff) = run_global_flow_phase(
                graph,
                &mut arena,
                selector,
                &mut gf_budget,
                config.collection_order,
            );
            report.implications_applied += count;
            if cutoff {
                report.global_flow_cutoff = true;
            }
            if count > 0 {
                round_changed = true;
            }
        }

        if !graph.is_live(selector.lca()) {
            break;
        }

        if !config.no_atpg {
            let mut atpg_budget = Budget::new(limit);
            let (count, cutoff) = run_redundancy_phase(
                graph,
                &mut arena,
                selector,
                &mut atpg_budget,
                config.collection_order,
            );
            report.redundancies_removed += count;
            if cutoff {
                report.atpg_cutoff = true;
            }
            if count > 0 {
                round_changed = true;
            }
        }

        if !round_changed || !graph.is_live(selector.lca()) {
            break;
        }
        if report.atpg_cutoff || report.global_flow_cutoff {
            break;
        }
    }

    if graph.is_live(selector.lca()) {
        report.affected_variables = mark_affected_scope_variables(graph, selector);
    }

    report
}

fn region_node_count(graph: &Graph, selector: &ChangedSubformula) -> usize {
    fn count(graph: &Graph, node: NodeId) -> usize {
        1 + graph
            .node(node)
            .children
            .iter()
            .map(|&c| count(graph, c))
            .sum::<usize>()
    }
    1 + selector.children().iter().map(|&c| count(graph, c)).sum::<usize>()
}

fn initialise_arena(graph: &Graph, arena: &mut PassArena, selector: &ChangedSubformula) -> bool {
    // Every node below the LCA participates in full: only the LCA
    // itself may restrict its child list (per the subformula selector).
    fn visit(graph: &Graph, arena: &mut PassArena, node: NodeId) -> bool {
        let child_ids = graph.node(node).children.clone();
        for &child in &child_ids {
            if !visit(graph, arena, child) {
                return false;
            }
        }
        arena.try_alloc(node, child_ids.len() as u32, None).is_some()
    }

    for &child in selector.children() {
        if !visit(graph, arena, child) {
            return false;
        }
    }
    let lca_is_restricted = selector.is_restricted();
    let lca_children = if lca_is_restricted {
        Some(selector.children().to_vec())
    } else {
        None
    };
    let restricted_handles = lca_children.map(|ids| {
        ids.into_iter()
            .filter_map(|n| arena.handle_of(n))
            .collect_vec()
    });
    let lca_count = restricted_handles
        .as_ref()
        .map(|h| h.len())
        .unwrap_or_else(|| graph.node(selector.lca()).children.len());
    arena
        .try_alloc(selector.lca(), lca_count as u32, restricted_handles)
        .is_some()
}

/// Marks every variable occurring in the region for outer-driver
/// rescoring, matching the source's
/// `mark_affected_scope_variables_for_cost_update` bulk-mark from the
/// subformula LCA up to the root.
fn mark_affected_scope_variables(graph: &Graph, selector: &ChangedSubformula) -> Vec<VarId> {
    fn collect(graph: &Graph, node: NodeId, out: &mut Vec<VarId>) {
        if let Some((var, _)) = graph.node(node).literal() {
            out.push(var);
        }
        for &child in &graph.node(node).children {
            collect(graph, child, out);
        }
    }
    let mut vars = Vec::new();
    collect(graph, selector.lca(), &mut vars);
    vars.sort_by_key(|v| v.index());
    vars.dedup();
    vars
}
