use crate::fault::CollectionOrder;

/// Read-once-per-pass configuration flags. Mirrors the handful of
/// command-line switches nenofex exposes for its ATPG/global-flow phase;
/// the outer QBF expansion driver is out of scope here, so only the
/// flags the core itself consults are modelled.
#[derive(Debug, Clone)]
pub struct Config {
    pub no_atpg: bool,
    pub no_global_flow: bool,
    pub propagation_limit: Option<u32>,
    pub opt_subgraph_limit: Option<u32>,
    pub show_opt_info: bool,
    pub collection_order: CollectionOrder,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            no_atpg: false,
            no_global_flow: false,
            propagation_limit: None,
            opt_subgraph_limit: None,
            show_opt_info: false,
            collection_order: CollectionOrder::BottomUp,
        }
    }
}
