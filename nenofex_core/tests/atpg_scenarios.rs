use nenofex_core::builder::Builder;
use nenofex_core::config::Config;
use nenofex_core::driver::run_pass;
use nenofex_core::subformula::ChangedSubformula;

fn build(text: &str) -> (nenofex_core::Graph, nenofex_core::NodeId) {
    let (graph, root, _vars) = Builder::new().parse(text).expect("valid test formula");
    (graph, root)
}

fn whole_selector(graph: &nenofex_core::Graph, root: nenofex_core::NodeId) -> ChangedSubformula {
    ChangedSubformula::whole(root, graph.node(root).children.clone())
}

/// `(a ∧ ¬a) ∨ b` — the AND subtree is a stuck-at-0 fault; one pass
/// deletes it, leaving just `b`.
#[test]
fn redundant_and_subtree_is_deleted() {
    let (mut graph, root) = build("or(and(a, not(a)), b)");
    let selector = whole_selector(&graph, root);
    let report = run_pass(&mut graph, &selector, &Config::default());

    assert!(report.redundancies_removed >= 1);
    assert!(!report.atpg_cutoff);
    assert!(!report.arena_exhausted);

    let new_root = graph.root().unwrap();
    assert!(graph.node(new_root).is_literal());
}

/// `((a ∧ b) ∨ c) ∧ ((a ∧ b) ∨ d)` — global flow and redundancy removal
/// together should reduce the node count by at least 2 relative to the
/// unsimplified tree.
#[test]
fn shared_conjunction_is_factored_and_reduced() {
    let (mut graph, root) = build("and(or(and(a, b), c), or(and(a, b), d))");
    let before = graph.num_live_nodes();
    let selector = whole_selector(&graph, root);
    let _report = run_pass(&mut graph, &selector, &Config::default());
    let after = graph.num_live_nodes();

    assert!(after + 2 <= before, "before={before} after={after}");
}

/// `((x ∨ y) ∧ z) ∧ x` — `x` at the top forces the inner `x ∨ y` to be
/// true regardless of `y`; global flow should relink `x` and redundancy
/// removal should delete the now-interior `x ∨ y`.
#[test]
fn top_level_literal_implies_and_simplifies_interior_or() {
    let (mut graph, root) = build("and(and(or(x, y), z), x)");
    let before = graph.num_live_nodes();
    let selector = whole_selector(&graph, root);
    let report = run_pass(&mut graph, &selector, &Config::default());
    let after = graph.num_live_nodes();

    assert!(report.changed());
    assert!(after < before);
}

/// Once simplification leaves an operator node with a single child, the
/// merge collapses it and `size_subformula` drops by exactly the size of
/// the removed wrapper.
#[test]
fn single_child_merge_has_exact_size_delta() {
    let mut graph = nenofex_core::Graph::new();
    let v = graph.new_var();
    let lit = graph.literal_node(v, true);
    let inner = graph.and_node(vec![lit]);
    let w = graph.new_var();
    let lit_w = graph.literal_node(w, true);
    let root = graph.or_node(vec![inner, lit_w]);
    graph.set_root(root);

    let size_before = graph.node(root).size_subformula;
    graph.merge_parent(inner);
    let size_after = graph.node(root).size_subformula;

    // the `inner` AND wrapper (1 node) disappears, its literal child
    // stays, so the total subtree shrinks by exactly 1.
    assert_eq!(size_before - size_after, 1);
}

/// A pass over a region where nothing is redundant and no implication
/// exists must complete without applying any changes and without
/// exceeding its budget.
#[test]
fn saturated_pass_on_non_redundant_region_makes_no_changes() {
    let (mut graph, root) = build("and(a, b, c, d, e)");
    let selector = whole_selector(&graph, root);
    let report = run_pass(&mut graph, &selector, &Config::default());

    assert!(!report.changed());
    assert!(!report.atpg_cutoff);
    assert!(!report.global_flow_cutoff);
}

/// Running the pass driver twice in a row without intervening expansion
/// must yield zero changes on the second call (idempotence under
/// saturation).
#[test]
fn second_pass_over_same_region_is_idempotent() {
    let (mut graph, root) = build("or(and(a, not(a)), b)");
    let selector = whole_selector(&graph, root);
    let _first = run_pass(&mut graph, &selector, &Config::default());

    let root_after_first = graph.root().unwrap();
    let selector2 = whole_selector(&graph, root_after_first);
    let second = run_pass(&mut graph, &selector2, &Config::default());

    assert!(!second.changed());
}

/// A propagation budget low enough to be exceeded mid-pass must produce
/// exactly one cutoff flag while preserving any rewrites already
/// committed, and must fully reset transient assignment state.
#[test]
fn tight_budget_sets_cutoff_and_resets_state() {
    let (mut graph, root) = build("and(a, b, c, d, e, f, g, h)");
    let selector = whole_selector(&graph, root);
    let mut config = Config::default();
    config.propagation_limit = Some(0);

    let report = run_pass(&mut graph, &selector, &config);

    assert!(report.atpg_cutoff || report.global_flow_cutoff);
    for var in graph.all_var_ids() {
        assert!(graph.var(var).assignment == nenofex_core::variable::Assignment::Undefined);
    }
}
