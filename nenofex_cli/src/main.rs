use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::Parser;
use nenofex_core::builder::Builder;
use nenofex_core::config::Config;
use nenofex_core::driver::run_pass;
use nenofex_core::fault::CollectionOrder;
use nenofex_core::subformula::ChangedSubformula;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Runs ATPG-style redundancy removal and global-flow simplification over an NNF formula."
)]
struct Arguments {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser, Clone, Debug)]
enum Command {
    #[clap(about = "Outputs information about the NNF graph built from an input formula.")]
    Info(InfoCommand),
    #[clap(about = "Runs ATPG redundancy removal and global-flow simplification over the whole formula.")]
    Simplify(SimplifyCommand),
}

#[derive(Parser, Debug, Clone)]
struct InfoCommand {
    /// Input file containing the formula in the and(...)/or(...)/not(...) text format.
    #[arg(short, long, required = true)]
    input: String,
}

#[derive(Parser, Debug, Clone)]
struct SimplifyCommand {
    /// Input file containing the formula in the and(...)/or(...)/not(...) text format.
    #[arg(short, long, required = true)]
    input: String,
    /// Disables the ATPG redundancy-removal phase.
    #[arg(long, default_value_t = false)]
    no_atpg: bool,
    /// Disables the global-flow implication phase.
    #[arg(long, default_value_t = false)]
    no_global_flow: bool,
    /// Overrides the size-dependent default propagation budget.
    #[arg(long)]
    propagation_limit: Option<u32>,
    /// Prints a per-pass JSON summary (fault counts, cutoffs) as the pass runs.
    #[arg(long, default_value_t = false)]
    show_opt_info: bool,
}

fn read_formula(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read '{}': {}", path, e))
}

fn graph_info(command: InfoCommand) {
    let text = read_formula(&command.input);
    let (graph, root, vars) = Builder::new()
        .parse(&text)
        .expect("formula text must parse in NNF and(...)/or(...)/not(...) form");
    let path = Path::new(command.input.as_str());
    let model_name = path.file_name().and_then(|n| n.to_str());
    println!(
        "{}",
        json!({
            "model": model_name,
            "num_vars": vars.len(),
            "num_nodes": graph.num_live_nodes(),
            "root_size_subformula": graph.node(root).size_subformula,
        })
    );
}

fn simplify(command: SimplifyCommand) {
    let text = read_formula(&command.input);
    let (mut graph, root, _vars) = Builder::new()
        .parse(&text)
        .expect("formula text must parse in NNF and(...)/or(...)/not(...) form");

    let config = Config {
        no_atpg: command.no_atpg,
        no_global_flow: command.no_global_flow,
        propagation_limit: command.propagation_limit,
        opt_subgraph_limit: None,
        show_opt_info: command.show_opt_info,
        collection_order: CollectionOrder::BottomUp,
    };

    let before_nodes = graph.num_live_nodes();
    let selector = ChangedSubformula::whole(root, graph.node(root).children.clone());
    let time_start = Instant::now();
    let report = run_pass(&mut graph, &selector, &config);
    let duration = time_start.elapsed();
    let after_nodes = graph.num_live_nodes();

    if config.show_opt_info {
        println!(
            "{}",
            json!({
                "redundancies_removed": report.redundancies_removed,
                "implications_applied": report.implications_applied,
                "atpg_cutoff": report.atpg_cutoff,
                "global_flow_cutoff": report.global_flow_cutoff,
                "arena_exhausted": report.arena_exhausted,
                "affected_variables": report.affected_variables.len(),
            })
        );
    }

    println!(
        "{}",
        json!({
            "nodes_before": before_nodes,
            "nodes_after": after_nodes,
            "changed": report.changed(),
            "duration": format!("{:?}", duration),
        })
    );
}

fn main() {
    let arguments = Arguments::parse();
    match arguments.command {
        Command::Info(command) => graph_info(command),
        Command::Simplify(command) => simplify(command),
    }
}
